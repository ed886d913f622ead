mod common;
mod records;

pub use records::SqliteRecordRepo;
