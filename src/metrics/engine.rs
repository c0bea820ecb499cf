//! ACWR engine.
//!
//! Walks an athlete's daily loads from `start` to `end` inclusive, one day
//! at a time, and writes a snapshot for every day. Days without a daily row
//! count as zero load so gaps still decay the averages. Every run starts
//! from zero acute and chronic load; choose an earlier start to warm up.

use std::collections::HashMap;

use chrono::{Days, NaiveDate};
use rusqlite::Connection;
use uuid::Uuid;

use super::acwr::{AcwrCalculator, AcwrSnapshot, AcwrState};
use super::error::{AcwrError, AcwrResult};
use crate::load::types::LoadSource;
use crate::storage::config::AcwrSettings;
use crate::storage::database::DatabaseError;
use crate::storage::{LoadStore, SnapshotStore};

/// Computes and persists ACWR snapshots for one athlete at a time.
pub struct AcwrEngine<'a> {
    conn: &'a Connection,
    calculator: AcwrCalculator,
    chunk_days: u32,
    warm_up_days: u32,
}

impl<'a> AcwrEngine<'a> {
    pub fn new(conn: &'a Connection, settings: &AcwrSettings) -> AcwrResult<Self> {
        if settings.chunk_days == 0 {
            return Err(AcwrError::InvalidChunk(settings.chunk_days));
        }

        Ok(Self {
            conn,
            calculator: AcwrCalculator::with_half_lives(
                settings.acute_half_life_days,
                settings.chronic_half_life_days,
            )?,
            chunk_days: settings.chunk_days,
            warm_up_days: settings.warm_up_days,
        })
    }

    pub fn calculator(&self) -> &AcwrCalculator {
        &self.calculator
    }

    /// First date of a run from `start` whose ratio has a full warm-up behind it.
    pub fn trusted_from(&self, start: NaiveDate) -> NaiveDate {
        start
            .checked_add_days(Days::new(self.warm_up_days as u64))
            .unwrap_or(NaiveDate::MAX)
    }

    /// Compute and upsert one snapshot per day of `start..=end`.
    ///
    /// Days are written in transactions of at most `chunk_days`. On a storage
    /// failure the error names the first day of the failed chunk; all days
    /// before it are committed.
    pub fn compute_range(
        &self,
        athlete_id: &Uuid,
        start: NaiveDate,
        end: NaiveDate,
        source: LoadSource,
    ) -> AcwrResult<Vec<AcwrSnapshot>> {
        if start > end {
            return Err(AcwrError::InvalidRange { start, end });
        }

        let total_days = (end - start).num_days() as usize + 1;
        let mut written = Vec::with_capacity(total_days);
        let mut state = AcwrState::default();
        let mut chunk_start = Some(start);

        while let Some(first) = chunk_start.filter(|d| *d <= end) {
            let last = first
                .checked_add_days(Days::new(self.chunk_days as u64 - 1))
                .map_or(end, |d| d.min(end));

            let (chunk, next_state) = self
                .process_chunk(athlete_id, first, last, source, state)
                .map_err(|source| AcwrError::Storage {
                    resume_from: first,
                    source,
                })?;

            state = next_state;
            written.extend(chunk);
            chunk_start = last.succ_opt();
        }

        tracing::info!(
            %athlete_id,
            %source,
            %start,
            %end,
            days = written.len(),
            "Computed ACWR range"
        );

        Ok(written)
    }

    fn process_chunk(
        &self,
        athlete_id: &Uuid,
        first: NaiveDate,
        last: NaiveDate,
        source: LoadSource,
        mut state: AcwrState,
    ) -> Result<(Vec<AcwrSnapshot>, AcwrState), DatabaseError> {
        let loads: HashMap<NaiveDate, u32> = LoadStore::new(self.conn)
            .daily_loads_in_range(athlete_id, first, last)?
            .into_iter()
            .map(|daily| (daily.date, daily.value(source)))
            .collect();

        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
        let store = SnapshotStore::new(&tx);

        let mut chunk = Vec::with_capacity((last - first).num_days() as usize + 1);
        for date in first.iter_days().take_while(|d| *d <= last) {
            let load = loads.get(&date).copied().unwrap_or(0);
            state = self.calculator.step(state, load as f64);

            let snapshot = AcwrSnapshot {
                athlete_id: *athlete_id,
                date,
                source,
                acute: state.acute,
                chronic: state.chronic,
                ratio: state.ratio(),
            };
            store.upsert(&snapshot)?;
            chunk.push(snapshot);
        }

        tx.commit()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        tracing::debug!(%athlete_id, %first, %last, "Committed ACWR chunk");

        Ok((chunk, state))
    }
}
