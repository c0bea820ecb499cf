//! Database operations using rusqlite.
//!
//! Owns the SQLite connection, applies schema migrations and provides the
//! shared date/UUID column conversions used by the stores.

use crate::storage::schema::{CURRENT_VERSION, MIGRATION_V1_TO_V2, SCHEMA, SCHEMA_VERSION_TABLE};
use chrono::NaiveDate;
use rusqlite::{Connection, Result as SqliteResult, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Default time a writer waits on a locked database before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Column format for calendar dates.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Database wrapper for SQLite operations.
pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open or create a database, waiting up to `busy_timeout` on contended locks.
    pub fn open_with_timeout(path: &Path, busy_timeout: Duration) -> Result<Self, DatabaseError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DatabaseError::IoError(e.to_string()))?;
            }
        }

        let conn =
            Connection::open(path).map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        conn.busy_timeout(busy_timeout)
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        // WAL lets the batch readers run while the ledger writes
        let _mode: String = conn
            .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let db = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        db.initialize()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let db = Self { conn, path: None };
        db.initialize()?;

        Ok(db)
    }

    /// Initialize the database schema.
    fn initialize(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        // Create schema version table
        self.conn
            .execute_batch(SCHEMA_VERSION_TABLE)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

        // Check current version
        let current_version = self.get_schema_version()?;

        if current_version < CURRENT_VERSION {
            self.migrate(current_version)?;
        }

        Ok(())
    }

    /// Get the current schema version.
    fn get_schema_version(&self) -> Result<i32, DatabaseError> {
        let result: SqliteResult<i32> = self.conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        );

        match result {
            Ok(version) => Ok(version),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }

    /// Run database migrations.
    fn migrate(&self, from_version: i32) -> Result<(), DatabaseError> {
        if from_version < 1 {
            self.conn
                .execute_batch(SCHEMA)
                .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
            self.record_version(1)?;
        }

        if from_version < 2 {
            self.conn
                .execute_batch(MIGRATION_V1_TO_V2)
                .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
            self.record_version(2)?;
        }

        tracing::info!(
            "Database migrated from version {} to {}",
            from_version,
            CURRENT_VERSION
        );

        Ok(())
    }

    fn record_version(&self, version: i32) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?, datetime('now'))",
                [version],
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(())
    }

    /// Get a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Path of the database file, `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Begin a write transaction that takes the database write lock up front.
///
/// Concurrent writers queue on the lock (bounded by the busy timeout) instead
/// of interleaving their read-modify-write of the same daily row.
pub fn immediate_transaction(conn: &Connection) -> Result<Transaction<'_>, DatabaseError> {
    Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))
}

/// Format a calendar date for a TEXT column.
pub(crate) fn date_to_sql(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a calendar date read from a TEXT column.
pub(crate) fn date_from_sql(value: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| DatabaseError::DeserializationError(format!("Invalid date {}: {}", value, e)))
}

/// Parse a UUID read from a TEXT column.
pub(crate) fn uuid_from_sql(value: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(value)
        .map_err(|e| DatabaseError::DeserializationError(format!("Invalid UUID: {}", e)))
}

/// Database errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

impl DatabaseError {
    /// Whether retrying the same operation may succeed.
    ///
    /// Storage-level failures (locks, I/O, lost connections) are transient;
    /// constraint and decoding failures will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DatabaseError::ConnectionFailed(_)
                | DatabaseError::IoError(_)
                | DatabaseError::QueryFailed(_)
                | DatabaseError::TransactionFailed(_)
        )
    }
}
