//! ACWR snapshot storage operations.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::load::types::LoadSource;
use crate::metrics::acwr::AcwrSnapshot;
use crate::storage::database::{date_from_sql, date_to_sql, DatabaseError};

/// Store for the ACWR time series.
pub struct SnapshotStore<'a> {
    conn: &'a Connection,
}

impl<'a> SnapshotStore<'a> {
    /// Create a new snapshot store with the given connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create or overwrite the snapshot for (athlete, date, source).
    pub fn upsert(&self, snapshot: &AcwrSnapshot) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                r#"
                INSERT INTO acwr_snapshots (athlete_id, date, source, acute, chronic, ratio)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(athlete_id, date, source) DO UPDATE SET
                    acute = excluded.acute,
                    chronic = excluded.chronic,
                    ratio = excluded.ratio
                "#,
                params![
                    snapshot.athlete_id.to_string(),
                    date_to_sql(snapshot.date),
                    snapshot.source.as_str(),
                    snapshot.acute,
                    snapshot.chronic,
                    snapshot.ratio,
                ],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    /// Snapshots in a date range (inclusive), ordered by date.
    pub fn range(
        &self,
        athlete_id: &Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
        source: LoadSource,
    ) -> Result<Vec<AcwrSnapshot>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT date, acute, chronic, ratio FROM acwr_snapshots
                 WHERE athlete_id = ?1 AND source = ?2 AND date >= ?3 AND date <= ?4
                 ORDER BY date",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(
                params![
                    athlete_id.to_string(),
                    source.as_str(),
                    date_to_sql(start_date),
                    date_to_sql(end_date),
                ],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, f64>(3)?,
                    ))
                },
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut snapshots = Vec::new();
        for row in rows {
            let (date, acute, chronic, ratio) =
                row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            snapshots.push(AcwrSnapshot {
                athlete_id: *athlete_id,
                date: date_from_sql(&date)?,
                source,
                acute,
                chronic,
                ratio,
            });
        }

        Ok(snapshots)
    }

    /// Most recent snapshot for an athlete and source.
    pub fn latest(
        &self,
        athlete_id: &Uuid,
        source: LoadSource,
    ) -> Result<Option<AcwrSnapshot>, DatabaseError> {
        let row = self
            .conn
            .query_row(
                "SELECT date, acute, chronic, ratio FROM acwr_snapshots
                 WHERE athlete_id = ?1 AND source = ?2
                 ORDER BY date DESC LIMIT 1",
                params![athlete_id.to_string(), source.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, f64>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        match row {
            Some((date, acute, chronic, ratio)) => Ok(Some(AcwrSnapshot {
                athlete_id: *athlete_id,
                date: date_from_sql(&date)?,
                source,
                acute,
                chronic,
                ratio,
            })),
            None => Ok(None),
        }
    }

    /// Number of stored snapshots for an athlete and source.
    pub fn count(&self, athlete_id: &Uuid, source: LoadSource) -> Result<usize, DatabaseError> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM acwr_snapshots WHERE athlete_id = ?1 AND source = ?2",
                params![athlete_id.to_string(), source.as_str()],
                |row| row.get(0),
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(count as usize)
    }
}
