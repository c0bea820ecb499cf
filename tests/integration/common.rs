//! Shared fixtures.

use chrono::{NaiveDate, TimeZone, Utc};
use loadwatch::load::{SessionRegistry, TrainingSession};
use loadwatch::storage::Database;

pub fn day(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, d).unwrap()
}

/// Register a session starting at 10:00 UTC on `date`.
pub fn session_on(db: &Database, date: NaiveDate, minutes: i64) -> TrainingSession {
    let start = Utc
        .from_utc_datetime(&date.and_hms_opt(10, 0, 0).unwrap());
    let session = TrainingSession::new("Team training", start, start + chrono::Duration::minutes(minutes));
    SessionRegistry::new(db.connection()).register(&session).unwrap();
    session
}
