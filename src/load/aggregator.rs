//! Daily load aggregation.
//!
//! A day's totals are always rebuilt from the ledger (or the external
//! samples) and written over the previous value, never adjusted by a delta.
//! Running a recompute twice, or out of order, leaves the same row.
//!
//! The sum and the write must see the same ledger state. Inside a caller's
//! transaction the caller holds that guarantee; otherwise the aggregator
//! takes the database write lock for the duration of the recompute.

use chrono::NaiveDate;
use rusqlite::Connection;
use uuid::Uuid;

use super::types::DailyLoad;
use crate::storage::database::{immediate_transaction, DatabaseError};
use crate::storage::LoadStore;

/// Rebuilds per-athlete daily totals.
pub struct DailyLoadAggregator<'a> {
    conn: &'a Connection,
}

impl<'a> DailyLoadAggregator<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Replace `internal_load` for (athlete, date) with the ledger sum.
    pub fn recompute(&self, athlete_id: &Uuid, date: NaiveDate) -> Result<DailyLoad, DatabaseError> {
        self.locked(|store| {
            let total = store.sum_session_loads(athlete_id, date)?;
            store.upsert_internal_load(athlete_id, date, total)?;

            tracing::debug!(%athlete_id, %date, internal_load = total, "Recomputed internal load");

            reload(store, athlete_id, date)
        })
    }

    /// Replace `external_load` for (athlete, date) with the rounded sample sum.
    pub fn recompute_external(
        &self,
        athlete_id: &Uuid,
        date: NaiveDate,
    ) -> Result<DailyLoad, DatabaseError> {
        self.locked(|store| {
            let sum = store.sum_external_samples(athlete_id, date)?;
            let total = u32::try_from(sum.round() as i64).map_err(|_| {
                DatabaseError::ConstraintViolation(format!("External load out of range: {}", sum))
            })?;
            store.upsert_external_load(athlete_id, date, total)?;

            tracing::debug!(%athlete_id, %date, external_load = total, "Recomputed external load");

            reload(store, athlete_id, date)
        })
    }

    /// Run `f` under the write lock, joining the caller's transaction if one is open.
    fn locked<T>(
        &self,
        f: impl FnOnce(&LoadStore<'_>) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        if !self.conn.is_autocommit() {
            return f(&LoadStore::new(self.conn));
        }

        let tx = immediate_transaction(self.conn)?;
        let result = f(&LoadStore::new(&tx))?;
        tx.commit()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
        Ok(result)
    }
}

fn reload(store: &LoadStore<'_>, athlete_id: &Uuid, date: NaiveDate) -> Result<DailyLoad, DatabaseError> {
    store
        .get_daily_load(athlete_id, date)?
        .ok_or_else(|| DatabaseError::NotFound(format!("daily load {} {}", athlete_id, date)))
}
