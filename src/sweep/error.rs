use thiserror::Error;

use crate::{db::DbError, models::FilterError};

#[derive(Debug, Error)]
pub enum SweepError {
    /// A required input is missing or invalid. Raised before any scan.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Store error: {0}")]
    Store(#[from] DbError),

    /// A registered keep-set hook failed; nothing was deleted.
    #[error("Keep-set hook '{hook}' failed: {message}")]
    Hook { hook: String, message: String },

    /// The scan was interrupted; nothing was deleted against its results.
    #[error("Scan cancelled before completion")]
    Cancelled,

    #[error("Delete chunk of {len} ids exceeds the limit of {max}")]
    ChunkTooLarge { len: usize, max: usize },
}

impl From<FilterError> for SweepError {
    fn from(err: FilterError) -> Self {
        SweepError::Configuration(err.to_string())
    }
}

pub type SweepResult<T> = Result<T, SweepError>;
