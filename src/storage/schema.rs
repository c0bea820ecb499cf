//! Database schema definitions for loadwatch.

/// SQL schema for creating all database tables.
pub const SCHEMA: &str = r#"
-- Training sessions supplied by the scheduling system
CREATE TABLE IF NOT EXISTS training_sessions (
    id TEXT PRIMARY KEY,
    session_type TEXT NOT NULL DEFAULT 'TECHNICAL',
    title TEXT NOT NULL,
    starts_at TEXT NOT NULL,
    ends_at TEXT NOT NULL,
    session_date TEXT NOT NULL,
    location TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_training_sessions_date ON training_sessions(session_date);

-- Session RPE ledger (one record per athlete and session)
CREATE TABLE IF NOT EXISTS session_loads (
    athlete_id TEXT NOT NULL,
    session_id TEXT NOT NULL REFERENCES training_sessions(id),
    exertion_tenths INTEGER NOT NULL CHECK (exertion_tenths BETWEEN 0 AND 100),
    duration_min INTEGER NOT NULL CHECK (duration_min > 0),
    load INTEGER NOT NULL CHECK (load >= 0),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (athlete_id, session_id)
);

CREATE INDEX IF NOT EXISTS idx_session_loads_session ON session_loads(session_id);

-- Per-athlete daily roll-up
CREATE TABLE IF NOT EXISTS daily_loads (
    athlete_id TEXT NOT NULL,
    date TEXT NOT NULL,
    internal_load INTEGER NOT NULL DEFAULT 0 CHECK (internal_load >= 0),
    external_load INTEGER NOT NULL DEFAULT 0 CHECK (external_load >= 0),
    updated_at TEXT NOT NULL,
    PRIMARY KEY (athlete_id, date)
);

-- External load samples from wearable providers
CREATE TABLE IF NOT EXISTS external_load_samples (
    athlete_id TEXT NOT NULL,
    date TEXT NOT NULL,
    provider TEXT NOT NULL,
    value REAL NOT NULL CHECK (value >= 0),
    recorded_at TEXT NOT NULL,
    PRIMARY KEY (athlete_id, date, provider)
);

-- ACWR snapshots, one per athlete, day and source
CREATE TABLE IF NOT EXISTS acwr_snapshots (
    athlete_id TEXT NOT NULL,
    date TEXT NOT NULL,
    source TEXT NOT NULL,
    acute REAL NOT NULL,
    chronic REAL NOT NULL,
    ratio REAL NOT NULL,
    PRIMARY KEY (athlete_id, date, source)
);
"#;

/// SQL for the schema version table.
pub const SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
"#;

/// Current schema version.
pub const CURRENT_VERSION: i32 = 2;

/// Migration from v1 to v2: per-source snapshot lookups for dashboards.
pub const MIGRATION_V1_TO_V2: &str = r#"
CREATE INDEX IF NOT EXISTS idx_acwr_snapshots_source_date ON acwr_snapshots(athlete_id, source, date);
"#;
