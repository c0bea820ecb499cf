//! Load ledger error types.

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::storage::database::DatabaseError;

/// Rejected input, caught before anything reaches the aggregator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Exertion score outside 0.0..=10.0 (or not a number).
    #[error("Exertion must be between 0.0 and 10.0, got {0}")]
    ExertionOutOfRange(f32),

    /// Exertion is recorded to one decimal place.
    #[error("Exertion must have at most one decimal place, got {0}")]
    ExertionPrecision(f32),

    /// Duration not within one calendar day.
    #[error("Duration must be between 1 and {max} minutes, got {got}")]
    InvalidDuration { got: i64, max: u32 },

    /// External load samples are non-negative.
    #[error("External load must be a non-negative number, got {0}")]
    NegativeExternalLoad(f64),

    /// Session end precedes its start.
    #[error("Session {0} ends before it starts")]
    SessionEndsBeforeStart(Uuid),
}

/// Errors raised by the ledger, aggregator and external load intake.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Training session {0} is not registered")]
    SessionNotFound(Uuid),

    #[error("Session load already recorded for athlete {athlete_id} in session {session_id}")]
    DuplicateRecord { athlete_id: Uuid, session_id: Uuid },

    #[error("No session load for athlete {athlete_id} in session {session_id}")]
    RecordNotFound { athlete_id: Uuid, session_id: Uuid },

    #[error("Recompute worker stopped before handling {athlete_id} on {date}")]
    WorkerStopped { athlete_id: Uuid, date: NaiveDate },

    #[error("Recompute worker panicked")]
    WorkerPanicked,

    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
}

impl LoadError {
    /// Whether the caller may retry the same mutation.
    pub fn is_retryable(&self) -> bool {
        match self {
            LoadError::Storage(e) => e.is_retryable(),
            LoadError::WorkerStopped { .. } => true,
            _ => false,
        }
    }
}

/// Result type for ledger operations.
pub type LoadResult<T> = Result<T, LoadError>;
