mod attribute;
mod filter;
mod record;

pub use attribute::*;
pub use filter::*;
pub use record::*;
