//! Training session registry.
//!
//! Sessions belong to the scheduling system; the registry keeps the copy the
//! ledger needs to book loads to a calendar date. Moving a session to another
//! date moves its loads with it.

use rusqlite::Connection;
use uuid::Uuid;

use super::aggregator::DailyLoadAggregator;
use super::error::{LoadError, LoadResult};
use super::types::{DailyLoad, TrainingSession};
use crate::storage::database::{immediate_transaction, DatabaseError};
use crate::storage::LoadStore;

/// Registry of training sessions known to the ledger.
pub struct SessionRegistry<'a> {
    conn: &'a Connection,
}

impl<'a> SessionRegistry<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Register or update a session.
    ///
    /// Returns the daily rows recomputed because the session changed date.
    pub fn register(&self, session: &TrainingSession) -> LoadResult<Vec<DailyLoad>> {
        session.validate()?;

        let tx = immediate_transaction(self.conn)?;
        let store = LoadStore::new(&tx);

        let previous = store.get_session(&session.id)?;
        store.upsert_session(session)?;

        let mut touched = Vec::new();
        if let Some(previous) = previous.filter(|p| p.date() != session.date()) {
            let aggregator = DailyLoadAggregator::new(&tx);
            for athlete_id in store.athletes_for_session(&session.id)? {
                touched.push(aggregator.recompute(&athlete_id, previous.date())?);
                touched.push(aggregator.recompute(&athlete_id, session.date())?);
            }

            tracing::info!(
                session_id = %session.id,
                from = %previous.date(),
                to = %session.date(),
                athletes = touched.len() / 2,
                "Session rescheduled"
            );
        }

        tx.commit()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        Ok(touched)
    }

    /// Remove a session together with its ledger records.
    pub fn remove(&self, session_id: Uuid) -> LoadResult<Vec<DailyLoad>> {
        let tx = immediate_transaction(self.conn)?;
        let store = LoadStore::new(&tx);

        let session = store
            .get_session(&session_id)?
            .ok_or(LoadError::SessionNotFound(session_id))?;
        let athletes = store.athletes_for_session(&session_id)?;

        for athlete_id in &athletes {
            store.delete_session_load(athlete_id, &session_id)?;
        }
        store.delete_session(&session_id)?;

        let aggregator = DailyLoadAggregator::new(&tx);
        let mut touched = Vec::with_capacity(athletes.len());
        for athlete_id in &athletes {
            touched.push(aggregator.recompute(athlete_id, session.date())?);
        }

        tx.commit()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        tracing::info!(%session_id, athletes = athletes.len(), "Session removed");

        Ok(touched)
    }

    pub fn get(&self, session_id: &Uuid) -> LoadResult<Option<TrainingSession>> {
        Ok(LoadStore::new(self.conn).get_session(session_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::ledger::SessionLoadLedger;
    use crate::storage::Database;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    fn session_on(d: u32) -> TrainingSession {
        let start = Utc.with_ymd_and_hms(2024, 1, d, 16, 0, 0).unwrap();
        TrainingSession::new("Match prep", start, start + Duration::minutes(60))
    }

    fn internal(db: &Database, athlete: &Uuid, date: NaiveDate) -> u32 {
        LoadStore::new(db.connection())
            .get_daily_load(athlete, date)
            .unwrap()
            .map(|d| d.internal_load)
            .unwrap_or(0)
    }

    #[test]
    fn test_reschedule_moves_load_between_days() {
        let db = Database::open_in_memory().unwrap();
        let registry = SessionRegistry::new(db.connection());
        let ledger = SessionLoadLedger::new(db.connection());
        let athlete = Uuid::new_v4();

        let mut session = session_on(10);
        registry.register(&session).unwrap();
        ledger.submit(athlete, session.id, 5.0, Some(60)).unwrap();
        let old_date = session.date();

        session.starts_at += Duration::days(2);
        session.ends_at += Duration::days(2);
        let touched = registry.register(&session).unwrap();

        assert_eq!(touched.len(), 2);
        assert_eq!(internal(&db, &athlete, old_date), 0);
        assert_eq!(internal(&db, &athlete, session.date()), 300);
    }

    #[test]
    fn test_same_day_update_touches_nothing() {
        let db = Database::open_in_memory().unwrap();
        let registry = SessionRegistry::new(db.connection());
        let ledger = SessionLoadLedger::new(db.connection());

        let mut session = session_on(10);
        registry.register(&session).unwrap();
        ledger.submit(Uuid::new_v4(), session.id, 5.0, Some(60)).unwrap();

        session.title = "Match prep (moved indoors)".to_string();
        session.starts_at += Duration::hours(1);
        session.ends_at += Duration::hours(1);
        assert!(registry.register(&session).unwrap().is_empty());
        assert_eq!(registry.get(&session.id).unwrap().unwrap().title, session.title);
    }

    #[test]
    fn test_remove_clears_loads() {
        let db = Database::open_in_memory().unwrap();
        let registry = SessionRegistry::new(db.connection());
        let ledger = SessionLoadLedger::new(db.connection());
        let athletes = [Uuid::new_v4(), Uuid::new_v4()];

        let session = session_on(12);
        registry.register(&session).unwrap();
        for athlete in &athletes {
            ledger.submit(*athlete, session.id, 6.0, Some(60)).unwrap();
        }

        let touched = registry.remove(session.id).unwrap();
        assert_eq!(touched.len(), 2);
        for athlete in &athletes {
            assert_eq!(internal(&db, athlete, session.date()), 0);
        }
        assert!(registry.get(&session.id).unwrap().is_none());
        assert!(matches!(
            registry.remove(session.id),
            Err(LoadError::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_backwards_session_rejected() {
        let db = Database::open_in_memory().unwrap();
        let registry = SessionRegistry::new(db.connection());

        let mut session = session_on(10);
        session.ends_at = session.starts_at - Duration::minutes(5);
        assert!(matches!(
            registry.register(&session),
            Err(LoadError::Validation(_))
        ));
    }
}
