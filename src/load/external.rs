//! External load intake.
//!
//! Wearable and GPS providers deliver one value per athlete, date and
//! provider. Samples roll into `DailyLoad::external_load` by the same
//! total-replacement rule as session loads.

use rusqlite::Connection;

use super::aggregator::DailyLoadAggregator;
use super::error::LoadResult;
use super::types::{DailyLoad, ExternalLoadSample};
use crate::storage::database::{immediate_transaction, DatabaseError};
use crate::storage::LoadStore;

/// Records external load samples.
pub struct ExternalLoadIntake<'a> {
    conn: &'a Connection,
}

impl<'a> ExternalLoadIntake<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Store a sample (replacing the provider's previous value for the day)
    /// and recompute the day's external total.
    pub fn record(&self, sample: &ExternalLoadSample) -> LoadResult<DailyLoad> {
        sample.validate()?;

        let tx = immediate_transaction(self.conn)?;
        LoadStore::new(&tx).upsert_external_sample(sample)?;
        let daily = DailyLoadAggregator::new(&tx).recompute_external(&sample.athlete_id, sample.date)?;
        tx.commit()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        tracing::debug!(
            athlete_id = %sample.athlete_id,
            date = %sample.date,
            provider = sample.provider.as_str(),
            external_load = daily.external_load,
            "Recorded external load"
        );

        Ok(daily)
    }
}
