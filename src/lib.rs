//! Loadwatch - athlete workload monitoring
//!
//! Records session RPE loads, rolls them into daily totals and derives the
//! acute:chronic workload ratio for each athlete and day.

pub mod load;
pub mod metrics;
pub mod storage;

// Re-export commonly used types
pub use load::{DailyLoad, LoadSource, SessionLoadLedger, TrainingSession};
pub use metrics::{AcwrEngine, AcwrSnapshot};
pub use storage::{AppConfig, Database};
