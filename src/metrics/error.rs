//! ACWR error types.

use chrono::NaiveDate;
use thiserror::Error;

use crate::storage::database::DatabaseError;

/// Errors that can occur while computing ACWR snapshots.
#[derive(Debug, Error)]
pub enum AcwrError {
    /// Range end precedes its start.
    #[error("Invalid range: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    /// Half-life must be a positive number of days.
    #[error("Invalid half-life: {0} days")]
    InvalidHalfLife(f64),

    /// Chunk size must be at least one day.
    #[error("Invalid chunk size: {0} days")]
    InvalidChunk(u32),

    /// Storage failed; every day before `resume_from` is committed.
    #[error("Storage error (resume from {resume_from}): {source}")]
    Storage {
        resume_from: NaiveDate,
        #[source]
        source: DatabaseError,
    },
}

impl AcwrError {
    /// First date that still needs processing, if the failure was partial.
    pub fn resume_from(&self) -> Option<NaiveDate> {
        match self {
            AcwrError::Storage { resume_from, .. } => Some(*resume_from),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            AcwrError::Storage { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

/// Result type for ACWR operations.
pub type AcwrResult<T> = Result<T, AcwrError>;
