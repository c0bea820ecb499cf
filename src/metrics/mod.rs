//! Acute:chronic workload ratio.
//!
//! Exponentially weighted acute and chronic loads per athlete per day,
//! persisted as one snapshot per (athlete, date, source).

pub mod acwr;
pub mod batch;
pub mod engine;
pub mod error;

pub use acwr::{AcwrCalculator, AcwrSnapshot, AcwrState, AcwrStatus};
pub use batch::{AthleteFailure, AthleteRun, BatchReport, BatchRunner, NightlyScheduler};
pub use engine::AcwrEngine;
pub use error::{AcwrError, AcwrResult};
