//! Session load ledger and daily load aggregation.
//!
//! - Training session registry (dates that loads are booked to)
//! - Session RPE ledger with per-mutation recompute
//! - Daily load aggregator (total replacement)
//! - External load intake
//! - Single-writer recompute worker

pub mod aggregator;
pub mod error;
pub mod external;
pub mod ledger;
pub mod sessions;
pub mod types;
pub mod worker;

pub use aggregator::DailyLoadAggregator;
pub use error::{LoadError, LoadResult, ValidationError};
pub use external::ExternalLoadIntake;
pub use ledger::{LedgerUpdate, SessionLoadLedger};
pub use sessions::SessionRegistry;
pub use types::{
    DailyLoad, Exertion, ExternalLoadSample, ExternalProvider, LoadSource, SessionLoad,
    SessionLoadEvent, SessionType, TrainingSession,
};
pub use worker::{RecomputeRequest, RecomputeWorker, WorkerStats};
