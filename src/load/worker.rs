//! Single-writer recompute worker.
//!
//! Recompute requests are funneled through one channel into one thread that
//! owns its own database connection and applies them in arrival order. Each
//! recompute holds the database write lock, so it serializes with ledger
//! writers on other connections. Delivery is at-least-once: because a
//! recompute replaces the day's total, a duplicated request just writes the
//! same row again.

use std::thread::JoinHandle;

use chrono::NaiveDate;
use crossbeam::channel::{Receiver, Sender};
use rusqlite::Connection;
use uuid::Uuid;

use super::aggregator::DailyLoadAggregator;
use super::error::{LoadError, LoadResult};
use crate::storage::{Database, LoadStore};

/// Day to rebuild from its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecomputeRequest {
    /// Rebuild `internal_load` from the ledger.
    Internal { athlete_id: Uuid, date: NaiveDate },
    /// Rebuild `external_load` from provider samples.
    External { athlete_id: Uuid, date: NaiveDate },
}

impl RecomputeRequest {
    pub fn athlete_id(&self) -> Uuid {
        match self {
            RecomputeRequest::Internal { athlete_id, .. }
            | RecomputeRequest::External { athlete_id, .. } => *athlete_id,
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            RecomputeRequest::Internal { date, .. } | RecomputeRequest::External { date, .. } => {
                *date
            }
        }
    }
}

/// Counters reported when the worker shuts down.
#[derive(Debug, Clone, Default)]
pub struct WorkerStats {
    /// Requests applied successfully.
    pub processed: usize,
    /// Requests that failed, with the error text. Safe to resubmit.
    pub failed: Vec<(RecomputeRequest, String)>,
}

/// Background recompute worker.
pub struct RecomputeWorker {
    sender: Sender<RecomputeRequest>,
    handle: JoinHandle<(Database, WorkerStats)>,
}

impl RecomputeWorker {
    /// Start the worker; it takes ownership of `db` until [`finish`](Self::finish).
    pub fn spawn(db: Database) -> Self {
        let (sender, receiver) = crossbeam::channel::unbounded();
        let handle = std::thread::spawn(move || run(db, receiver));

        tracing::info!("Recompute worker started");

        Self { sender, handle }
    }

    /// Queue a recompute.
    pub fn submit(&self, request: RecomputeRequest) -> LoadResult<()> {
        self.sender
            .send(request)
            .map_err(|e| LoadError::WorkerStopped {
                athlete_id: e.0.athlete_id(),
                date: e.0.date(),
            })
    }

    /// Queue both columns of every day that has ledger or provider data.
    pub fn submit_rebuild(&self, source: &Connection) -> LoadResult<usize> {
        let keys = LoadStore::new(source).load_keys()?;
        for (athlete_id, date) in &keys {
            self.submit(RecomputeRequest::Internal {
                athlete_id: *athlete_id,
                date: *date,
            })?;
            self.submit(RecomputeRequest::External {
                athlete_id: *athlete_id,
                date: *date,
            })?;
        }

        tracing::info!(days = keys.len(), "Queued daily load rebuild");

        Ok(keys.len() * 2)
    }

    /// Drain the queue, stop the worker and hand back its database.
    pub fn finish(self) -> LoadResult<(Database, WorkerStats)> {
        let Self { sender, handle } = self;
        drop(sender);

        let (db, stats) = handle.join().map_err(|_| LoadError::WorkerPanicked)?;

        tracing::info!(
            processed = stats.processed,
            failed = stats.failed.len(),
            "Recompute worker stopped"
        );

        Ok((db, stats))
    }
}

fn run(db: Database, receiver: Receiver<RecomputeRequest>) -> (Database, WorkerStats) {
    let mut stats = WorkerStats::default();

    for request in receiver.iter() {
        let aggregator = DailyLoadAggregator::new(db.connection());
        let result = match request {
            RecomputeRequest::Internal { athlete_id, date } => {
                aggregator.recompute(&athlete_id, date)
            }
            RecomputeRequest::External { athlete_id, date } => {
                aggregator.recompute_external(&athlete_id, date)
            }
        };

        match result {
            Ok(_) => stats.processed += 1,
            Err(e) => {
                tracing::warn!(?request, error = %e, "Recompute failed");
                stats.failed.push((request, e.to_string()));
            }
        }
    }

    (db, stats)
}
