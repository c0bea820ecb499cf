//! Load data storage operations.
//!
//! Provides persistence for:
//! - Training sessions (as registered by the scheduling system)
//! - Session RPE ledger records
//! - Daily load roll-ups
//! - External load samples

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::load::types::{
    DailyLoad, Exertion, ExternalLoadSample, SessionLoad, SessionType, TrainingSession,
};
use crate::storage::database::{date_from_sql, date_to_sql, uuid_from_sql, DatabaseError};

/// Store for the load ledger and its daily roll-ups.
pub struct LoadStore<'a> {
    conn: &'a Connection,
}

impl<'a> LoadStore<'a> {
    /// Create a new load store with the given connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    // ========== Training Sessions ==========

    /// Insert or update a training session.
    pub fn upsert_session(&self, session: &TrainingSession) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();

        self.conn
            .execute(
                r#"
                INSERT INTO training_sessions
                    (id, session_type, title, starts_at, ends_at, session_date, location, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                ON CONFLICT(id) DO UPDATE SET
                    session_type = excluded.session_type,
                    title = excluded.title,
                    starts_at = excluded.starts_at,
                    ends_at = excluded.ends_at,
                    session_date = excluded.session_date,
                    location = excluded.location,
                    updated_at = excluded.updated_at
                "#,
                params![
                    session.id.to_string(),
                    session.session_type.as_str(),
                    session.title,
                    session.starts_at.to_rfc3339(),
                    session.ends_at.to_rfc3339(),
                    date_to_sql(session.date()),
                    session.location,
                    now,
                ],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    /// Get a training session by ID.
    pub fn get_session(&self, id: &Uuid) -> Result<Option<TrainingSession>, DatabaseError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, session_type, title, starts_at, ends_at, location
                 FROM training_sessions WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok(SessionRow {
                        id: row.get(0)?,
                        session_type: row.get(1)?,
                        title: row.get(2)?,
                        starts_at: row.get(3)?,
                        ends_at: row.get(4)?,
                        location: row.get(5)?,
                    })
                },
            )
            .optional()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        row.map(SessionRow::into_session).transpose()
    }

    /// Delete a training session. Its ledger records must already be gone.
    pub fn delete_session(&self, id: &Uuid) -> Result<bool, DatabaseError> {
        let affected = self
            .conn
            .execute(
                "DELETE FROM training_sessions WHERE id = ?1",
                params![id.to_string()],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(affected > 0)
    }

    /// Athletes holding a ledger record for the session.
    pub fn athletes_for_session(&self, session_id: &Uuid) -> Result<Vec<Uuid>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT athlete_id FROM session_loads WHERE session_id = ?1 ORDER BY athlete_id",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(params![session_id.to_string()], |row| row.get::<_, String>(0))
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut athletes = Vec::new();
        for row in rows {
            let id = row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            athletes.push(uuid_from_sql(&id)?);
        }

        Ok(athletes)
    }

    // ========== Session Load Ledger ==========

    /// Load one ledger record, with the owning session's date.
    pub fn get_session_load(
        &self,
        athlete_id: &Uuid,
        session_id: &Uuid,
    ) -> Result<Option<SessionLoad>, DatabaseError> {
        let row = self
            .conn
            .query_row(
                "SELECT sl.exertion_tenths, sl.duration_min, sl.load, ts.session_date
                 FROM session_loads sl
                 JOIN training_sessions ts ON ts.id = sl.session_id
                 WHERE sl.athlete_id = ?1 AND sl.session_id = ?2",
                params![athlete_id.to_string(), session_id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, u8>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, u32>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let Some((tenths, duration_min, load, date)) = row else {
            return Ok(None);
        };

        let exertion = Exertion::from_tenths(tenths)
            .map_err(|e| DatabaseError::DeserializationError(e.to_string()))?;

        Ok(Some(SessionLoad {
            athlete_id: *athlete_id,
            session_id: *session_id,
            session_date: date_from_sql(&date)?,
            exertion,
            duration_min,
            load,
        }))
    }

    /// Insert a new ledger record.
    pub fn insert_session_load(&self, record: &SessionLoad) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();

        self.conn
            .execute(
                "INSERT INTO session_loads
                    (athlete_id, session_id, exertion_tenths, duration_min, load, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    record.athlete_id.to_string(),
                    record.session_id.to_string(),
                    record.exertion.tenths(),
                    record.duration_min,
                    record.load,
                    now,
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, msg)
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    DatabaseError::ConstraintViolation(msg.unwrap_or_else(|| err.to_string()))
                }
                other => DatabaseError::QueryFailed(other.to_string()),
            })?;

        Ok(())
    }

    /// Overwrite an existing ledger record. Returns false if none existed.
    pub fn update_session_load(&self, record: &SessionLoad) -> Result<bool, DatabaseError> {
        let now = Utc::now().to_rfc3339();

        let affected = self
            .conn
            .execute(
                "UPDATE session_loads
                 SET exertion_tenths = ?3, duration_min = ?4, load = ?5, updated_at = ?6
                 WHERE athlete_id = ?1 AND session_id = ?2",
                params![
                    record.athlete_id.to_string(),
                    record.session_id.to_string(),
                    record.exertion.tenths(),
                    record.duration_min,
                    record.load,
                    now,
                ],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(affected > 0)
    }

    /// Delete a ledger record. Returns false if none existed.
    pub fn delete_session_load(
        &self,
        athlete_id: &Uuid,
        session_id: &Uuid,
    ) -> Result<bool, DatabaseError> {
        let affected = self
            .conn
            .execute(
                "DELETE FROM session_loads WHERE athlete_id = ?1 AND session_id = ?2",
                params![athlete_id.to_string(), session_id.to_string()],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(affected > 0)
    }

    /// Sum of ledger loads for an athlete's sessions on a date.
    pub fn sum_session_loads(
        &self,
        athlete_id: &Uuid,
        date: NaiveDate,
    ) -> Result<u32, DatabaseError> {
        self.conn
            .query_row(
                "SELECT COALESCE(SUM(sl.load), 0)
                 FROM session_loads sl
                 JOIN training_sessions ts ON ts.id = sl.session_id
                 WHERE sl.athlete_id = ?1 AND ts.session_date = ?2",
                params![athlete_id.to_string(), date_to_sql(date)],
                |row| row.get(0),
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))
    }

    /// Every (athlete, date) pair the ledger or external samples touch.
    pub fn load_keys(&self) -> Result<Vec<(Uuid, NaiveDate)>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT sl.athlete_id, ts.session_date
                FROM session_loads sl
                JOIN training_sessions ts ON ts.id = sl.session_id
                UNION
                SELECT athlete_id, date FROM external_load_samples
                UNION
                SELECT athlete_id, date FROM daily_loads
                ORDER BY 1, 2
                "#,
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut keys = Vec::new();
        for row in rows {
            let (athlete, date) = row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            keys.push((uuid_from_sql(&athlete)?, date_from_sql(&date)?));
        }

        Ok(keys)
    }

    // ========== Daily Loads ==========

    /// Replace the internal load for a date, creating the row if absent.
    pub fn upsert_internal_load(
        &self,
        athlete_id: &Uuid,
        date: NaiveDate,
        total: u32,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();

        self.conn
            .execute(
                r#"
                INSERT INTO daily_loads (athlete_id, date, internal_load, external_load, updated_at)
                VALUES (?1, ?2, ?3, 0, ?4)
                ON CONFLICT(athlete_id, date) DO UPDATE SET
                    internal_load = excluded.internal_load,
                    updated_at = excluded.updated_at
                "#,
                params![athlete_id.to_string(), date_to_sql(date), total, now],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    /// Replace the external load for a date, creating the row if absent.
    pub fn upsert_external_load(
        &self,
        athlete_id: &Uuid,
        date: NaiveDate,
        total: u32,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();

        self.conn
            .execute(
                r#"
                INSERT INTO daily_loads (athlete_id, date, internal_load, external_load, updated_at)
                VALUES (?1, ?2, 0, ?3, ?4)
                ON CONFLICT(athlete_id, date) DO UPDATE SET
                    external_load = excluded.external_load,
                    updated_at = excluded.updated_at
                "#,
                params![athlete_id.to_string(), date_to_sql(date), total, now],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    /// Load the daily totals for one date.
    pub fn get_daily_load(
        &self,
        athlete_id: &Uuid,
        date: NaiveDate,
    ) -> Result<Option<DailyLoad>, DatabaseError> {
        let result = self.conn.query_row(
            "SELECT internal_load, external_load FROM daily_loads
             WHERE athlete_id = ?1 AND date = ?2",
            params![athlete_id.to_string(), date_to_sql(date)],
            |row| {
                Ok(DailyLoad {
                    athlete_id: *athlete_id,
                    date,
                    internal_load: row.get(0)?,
                    external_load: row.get(1)?,
                })
            },
        );

        match result {
            Ok(load) => Ok(Some(load)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }

    /// Load the daily rows present in a date range (inclusive), ordered by date.
    ///
    /// Days without a row are absent from the result.
    pub fn daily_loads_in_range(
        &self,
        athlete_id: &Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<DailyLoad>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT date, internal_load, external_load FROM daily_loads
                 WHERE athlete_id = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(
                params![
                    athlete_id.to_string(),
                    date_to_sql(start_date),
                    date_to_sql(end_date)
                ],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, u32>(2)?,
                    ))
                },
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut results = Vec::new();
        for row in rows {
            let (date_str, internal_load, external_load) =
                row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            results.push(DailyLoad {
                athlete_id: *athlete_id,
                date: date_from_sql(&date_str)?,
                internal_load,
                external_load,
            });
        }

        Ok(results)
    }

    /// Athletes with at least one daily load row.
    pub fn athletes_with_daily_loads(&self) -> Result<Vec<Uuid>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT athlete_id FROM daily_loads ORDER BY athlete_id")
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut athletes = Vec::new();
        for row in rows {
            let id = row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            athletes.push(uuid_from_sql(&id)?);
        }

        Ok(athletes)
    }

    // ========== External Load Samples ==========

    /// Insert or replace one provider's sample for a date.
    pub fn upsert_external_sample(&self, sample: &ExternalLoadSample) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();

        self.conn
            .execute(
                r#"
                INSERT INTO external_load_samples (athlete_id, date, provider, value, recorded_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(athlete_id, date, provider) DO UPDATE SET
                    value = excluded.value,
                    recorded_at = excluded.recorded_at
                "#,
                params![
                    sample.athlete_id.to_string(),
                    date_to_sql(sample.date),
                    sample.provider.as_str(),
                    sample.value,
                    now,
                ],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    /// Sum of external samples for an athlete on a date.
    pub fn sum_external_samples(
        &self,
        athlete_id: &Uuid,
        date: NaiveDate,
    ) -> Result<f64, DatabaseError> {
        self.conn
            .query_row(
                "SELECT COALESCE(SUM(value), 0.0) FROM external_load_samples
                 WHERE athlete_id = ?1 AND date = ?2",
                params![athlete_id.to_string(), date_to_sql(date)],
                |row| row.get(0),
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))
    }
}

/// Intermediate struct for reading session rows from database.
struct SessionRow {
    id: String,
    session_type: String,
    title: String,
    starts_at: String,
    ends_at: String,
    location: Option<String>,
}

impl SessionRow {
    fn into_session(self) -> Result<TrainingSession, DatabaseError> {
        let session_type = self
            .session_type
            .parse::<SessionType>()
            .map_err(DatabaseError::DeserializationError)?;

        let starts_at = DateTime::parse_from_rfc3339(&self.starts_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                DatabaseError::DeserializationError(format!("Invalid starts_at date: {}", e))
            })?;

        let ends_at = DateTime::parse_from_rfc3339(&self.ends_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                DatabaseError::DeserializationError(format!("Invalid ends_at date: {}", e))
            })?;

        Ok(TrainingSession {
            id: uuid_from_sql(&self.id)?,
            session_type,
            title: self.title,
            starts_at,
            ends_at,
            location: self.location,
        })
    }
}
