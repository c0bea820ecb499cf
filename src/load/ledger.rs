//! Session load ledger.
//!
//! The ledger is the source of truth for internal load. Every mutation
//! recomputes the owning day's total inside the same write transaction, so
//! the daily row never disagrees with the committed ledger and concurrent
//! writers for the same day are serialized by the database write lock.

use rusqlite::Connection;
use uuid::Uuid;

use super::aggregator::DailyLoadAggregator;
use super::error::{LoadError, LoadResult};
use super::types::{validate_duration, DailyLoad, Exertion, SessionLoad, SessionLoadEvent};
use crate::storage::database::{immediate_transaction, DatabaseError};
use crate::storage::LoadStore;

/// How a write treats an existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Create,
    Correct,
    Upsert,
}

/// Outcome of a ledger mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerUpdate {
    /// Stored record; `None` after a delete.
    pub record: Option<SessionLoad>,
    /// Recomputed totals of the owning day.
    pub daily: DailyLoad,
}

/// Ledger of per-session RPE records.
pub struct SessionLoadLedger<'a> {
    conn: &'a Connection,
}

impl<'a> SessionLoadLedger<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Record a new session load. Fails if one already exists.
    ///
    /// `duration_min` defaults to the session's scheduled length.
    pub fn submit(
        &self,
        athlete_id: Uuid,
        session_id: Uuid,
        exertion: f32,
        duration_min: Option<i64>,
    ) -> LoadResult<LedgerUpdate> {
        self.write(athlete_id, session_id, exertion, duration_min, WriteMode::Create)
    }

    /// Correct an existing session load. Fails if none exists.
    pub fn correct(
        &self,
        athlete_id: Uuid,
        session_id: Uuid,
        exertion: f32,
        duration_min: Option<i64>,
    ) -> LoadResult<LedgerUpdate> {
        self.write(athlete_id, session_id, exertion, duration_min, WriteMode::Correct)
    }

    /// Create or correct, for replayed events.
    pub fn upsert(
        &self,
        athlete_id: Uuid,
        session_id: Uuid,
        exertion: f32,
        duration_min: Option<i64>,
    ) -> LoadResult<LedgerUpdate> {
        self.write(athlete_id, session_id, exertion, duration_min, WriteMode::Upsert)
    }

    /// Delete a session load and reset the day's total accordingly.
    pub fn delete(&self, athlete_id: Uuid, session_id: Uuid) -> LoadResult<LedgerUpdate> {
        self.remove(athlete_id, session_id, false)
    }

    /// Apply an event from the scheduling system.
    ///
    /// Events may be delivered more than once: a repeated delete recomputes
    /// the session's day and succeeds.
    pub fn apply(&self, event: &SessionLoadEvent) -> LoadResult<LedgerUpdate> {
        match event {
            SessionLoadEvent::Upsert {
                athlete_id,
                session_id,
                exertion,
                duration_min,
            } => self.upsert(*athlete_id, *session_id, *exertion, *duration_min),
            SessionLoadEvent::Delete {
                athlete_id,
                session_id,
            } => self.remove(*athlete_id, *session_id, true),
        }
    }

    /// Look up a record.
    pub fn get(&self, athlete_id: &Uuid, session_id: &Uuid) -> LoadResult<Option<SessionLoad>> {
        Ok(LoadStore::new(self.conn).get_session_load(athlete_id, session_id)?)
    }

    fn remove(&self, athlete_id: Uuid, session_id: Uuid, missing_ok: bool) -> LoadResult<LedgerUpdate> {
        let tx = immediate_transaction(self.conn)?;
        let store = LoadStore::new(&tx);

        let date = match store.get_session_load(&athlete_id, &session_id)? {
            Some(existing) => {
                store.delete_session_load(&athlete_id, &session_id)?;
                existing.session_date
            }
            None if missing_ok => store
                .get_session(&session_id)?
                .ok_or(LoadError::SessionNotFound(session_id))?
                .date(),
            None => {
                return Err(LoadError::RecordNotFound {
                    athlete_id,
                    session_id,
                })
            }
        };

        let daily = DailyLoadAggregator::new(&tx).recompute(&athlete_id, date)?;

        tx.commit()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        tracing::info!(
            %athlete_id,
            %session_id,
            %date,
            internal_load = daily.internal_load,
            "Deleted session load"
        );

        Ok(LedgerUpdate {
            record: None,
            daily,
        })
    }

    fn write(
        &self,
        athlete_id: Uuid,
        session_id: Uuid,
        exertion: f32,
        duration_min: Option<i64>,
        mode: WriteMode,
    ) -> LoadResult<LedgerUpdate> {
        let exertion = Exertion::new(exertion)?;
        if let Some(minutes) = duration_min {
            validate_duration(minutes)?;
        }

        let tx = immediate_transaction(self.conn)?;
        let store = LoadStore::new(&tx);

        let session = store
            .get_session(&session_id)?
            .ok_or(LoadError::SessionNotFound(session_id))?;
        let duration = validate_duration(duration_min.unwrap_or_else(|| session.scheduled_minutes()))?;
        let record = SessionLoad::new(athlete_id, &session, exertion, duration);

        let exists = store.get_session_load(&athlete_id, &session_id)?.is_some();
        match (mode, exists) {
            (WriteMode::Create, true) => {
                return Err(LoadError::DuplicateRecord {
                    athlete_id,
                    session_id,
                })
            }
            (WriteMode::Correct, false) => {
                return Err(LoadError::RecordNotFound {
                    athlete_id,
                    session_id,
                })
            }
            (_, true) => {
                store.update_session_load(&record)?;
            }
            (_, false) => store.insert_session_load(&record)?,
        }

        let daily = DailyLoadAggregator::new(&tx).recompute(&athlete_id, record.session_date)?;

        tx.commit()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        tracing::info!(
            %athlete_id,
            %session_id,
            date = %record.session_date,
            load = record.load,
            internal_load = daily.internal_load,
            "Recorded session load"
        );

        Ok(LedgerUpdate {
            record: Some(record),
            daily,
        })
    }
}
