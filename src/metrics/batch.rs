//! Multi-athlete ACWR batch runs and the nightly scheduler.
//!
//! Athletes are independent, so each one runs on its own blocking task with
//! its own connection. A semaphore bounds how many run at once. Failures are
//! collected per athlete and never stop the rest of the batch.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDate, Utc};
use tokio::sync::Semaphore;
use uuid::Uuid;

use super::engine::AcwrEngine;
use super::error::AcwrError;
use crate::load::types::LoadSource;
use crate::storage::config::{AcwrSettings, AppConfig, StorageSettings};
use crate::storage::{Database, DatabaseError, LoadStore};

/// Athlete whose range was written in full.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AthleteRun {
    pub athlete_id: Uuid,
    pub days_written: usize,
}

/// Athlete whose run stopped early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AthleteFailure {
    pub athlete_id: Uuid,
    pub error: String,
    /// First day not committed, when the failure happened mid-range.
    pub resume_from: Option<NaiveDate>,
}

/// Outcome of one batch.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub completed: Vec<AthleteRun>,
    pub failed: Vec<AthleteFailure>,
    /// Failure that stopped the batch before any athlete ran.
    pub error: Option<String>,
}

impl BatchReport {
    fn aborted(error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.failed.is_empty()
    }

    fn merge(&mut self, other: BatchReport) {
        self.completed.extend(other.completed);
        self.failed.extend(other.failed);
        if self.error.is_none() {
            self.error = other.error;
        }
    }
}

/// Runs the ACWR engine for many athletes in parallel.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    db_path: PathBuf,
    storage: StorageSettings,
    acwr: AcwrSettings,
    max_parallel: usize,
}

impl BatchRunner {
    pub fn new(db_path: PathBuf, storage: StorageSettings, acwr: AcwrSettings, max_parallel: usize) -> Self {
        Self {
            db_path,
            storage,
            acwr,
            max_parallel: max_parallel.max(1),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.database_path(),
            config.storage.clone(),
            config.acwr.clone(),
            config.batch.max_parallel_athletes,
        )
    }

    /// Athletes with at least one daily load row.
    pub async fn athletes(&self) -> Result<Vec<Uuid>, DatabaseError> {
        let path = self.db_path.clone();
        let timeout = self.storage.busy_timeout();

        tokio::task::spawn_blocking(move || {
            let db = Database::open_with_timeout(&path, timeout)?;
            LoadStore::new(db.connection()).athletes_with_daily_loads()
        })
        .await
        .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?
    }

    /// Compute `start..=end` for every athlete in `athletes`.
    pub async fn run(
        &self,
        athletes: &[Uuid],
        start: NaiveDate,
        end: NaiveDate,
        source: LoadSource,
    ) -> BatchReport {
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let mut handles = Vec::with_capacity(athletes.len());

        for athlete_id in athletes.iter().copied() {
            let semaphore = Arc::clone(&semaphore);
            let path = self.db_path.clone();
            let timeout = self.storage.busy_timeout();
            let settings = self.acwr.clone();

            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                tokio::task::spawn_blocking(move || {
                    run_athlete(&path, timeout, &settings, athlete_id, start, end, source)
                })
                .await
            });
            handles.push((athlete_id, handle));
        }

        let mut report = BatchReport::default();
        for (athlete_id, handle) in handles {
            match handle.await {
                Ok(Ok(Ok(days_written))) => report.completed.push(AthleteRun {
                    athlete_id,
                    days_written,
                }),
                Ok(Ok(Err(e))) => {
                    tracing::warn!(%athlete_id, error = %e, "ACWR run failed");
                    report.failed.push(AthleteFailure {
                        athlete_id,
                        error: e.to_string(),
                        resume_from: e.resume_from(),
                    });
                }
                Ok(Err(e)) | Err(e) => {
                    tracing::error!(%athlete_id, error = %e, "ACWR task aborted");
                    report.failed.push(AthleteFailure {
                        athlete_id,
                        error: e.to_string(),
                        resume_from: None,
                    });
                }
            }
        }

        tracing::info!(
            %source,
            %start,
            %end,
            completed = report.completed.len(),
            failed = report.failed.len(),
            "Batch finished"
        );

        report
    }
}

fn run_athlete(
    path: &std::path::Path,
    timeout: Duration,
    settings: &AcwrSettings,
    athlete_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
    source: LoadSource,
) -> Result<usize, AcwrError> {
    let db = Database::open_with_timeout(path, timeout).map_err(|e| AcwrError::Storage {
        resume_from: start,
        source: e,
    })?;
    let engine = AcwrEngine::new(db.connection(), settings)?;
    Ok(engine.compute_range(&athlete_id, start, end, source)?.len())
}

/// Recomputes a trailing window for every athlete on a fixed interval.
pub struct NightlyScheduler {
    runner: BatchRunner,
    sources: Vec<LoadSource>,
    lookback_days: u32,
    interval: Duration,
}

impl NightlyScheduler {
    pub fn new(runner: BatchRunner, sources: Vec<LoadSource>, lookback_days: u32, interval: Duration) -> Self {
        Self {
            runner,
            sources,
            lookback_days,
            interval,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            BatchRunner::from_config(config),
            config.acwr.sources.clone(),
            config.batch.lookback_days,
            Duration::from_secs(config.batch.interval_hours.max(1) * 3600),
        )
    }

    /// One pass over `today - lookback_days ..= today` for every source.
    pub async fn run_once(&self, today: NaiveDate) -> BatchReport {
        let start = today
            .checked_sub_days(Days::new(self.lookback_days as u64))
            .unwrap_or(NaiveDate::MIN);

        let athletes = match self.runner.athletes().await {
            Ok(athletes) => athletes,
            Err(e) => {
                tracing::error!(error = %e, "Could not list athletes");
                return BatchReport::aborted(e);
            }
        };

        let mut report = BatchReport::default();
        for source in &self.sources {
            report.merge(self.runner.run(&athletes, start, today, *source).await);
        }
        report
    }

    /// Run on every interval tick until `shutdown` resolves.
    ///
    /// The first tick fires immediately.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: std::future::Future<Output = ()>,
    {
        let mut timer = tokio::time::interval(self.interval);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    let report = self.run_once(Utc::now().date_naive()).await;
                    if let Some(error) = &report.error {
                        tracing::warn!(%error, "Scheduled run aborted");
                    } else if !report.is_success() {
                        tracing::warn!(failed = report.failed.len(), "Scheduled run had failures");
                    }
                }
                _ = &mut shutdown => {
                    tracing::info!("Scheduler shutting down");
                    break;
                }
            }
        }
    }
}
