//! Integration tests from ledger events through to stored ACWR snapshots.

use chrono::Days;
use loadwatch::load::{LoadError, SessionLoadEvent, SessionLoadLedger, SessionRegistry};
use loadwatch::metrics::{AcwrEngine, AcwrStatus};
use loadwatch::storage::{AcwrSettings, Database, LoadStore, SnapshotStore};
use loadwatch::LoadSource;
use uuid::Uuid;

use crate::common::{day, session_on};

/// Test the three-day scenario driven from ledger events.
#[test]
fn test_events_to_snapshots() {
    let db = Database::open_in_memory().unwrap();
    let athlete = Uuid::new_v4();
    let first = session_on(&db, day(1, 1), 60);
    let third = session_on(&db, day(1, 3), 60);

    let ledger = SessionLoadLedger::new(db.connection());
    let events = [
        SessionLoadEvent::Upsert {
            athlete_id: athlete,
            session_id: first.id,
            exertion: 5.0,
            duration_min: None,
        },
        SessionLoadEvent::Upsert {
            athlete_id: athlete,
            session_id: third.id,
            exertion: 5.0,
            duration_min: Some(60),
        },
    ];
    for event in &events {
        ledger.apply(event).unwrap();
    }

    let engine = AcwrEngine::new(db.connection(), &AcwrSettings::default()).unwrap();
    let snapshots = engine
        .compute_range(&athlete, day(1, 1), day(1, 3), LoadSource::Internal)
        .unwrap();

    assert_eq!(snapshots.len(), 3);
    let ratios: Vec<f64> = snapshots.iter().map(|s| s.ratio).collect();
    assert!((ratios[0] - 3.85567).abs() < 1e-4);
    assert!((ratios[1] - 3.57970).abs() < 1e-4);
    assert!((ratios[2] - 3.59616).abs() < 1e-4);

    // Day 2 has no daily row at all
    let store = LoadStore::new(db.connection());
    assert!(store.get_daily_load(&athlete, day(1, 2)).unwrap().is_none());
}

/// Test that rescheduling a session moves its load and the next run sees it.
#[test]
fn test_reschedule_moves_load() {
    let db = Database::open_in_memory().unwrap();
    let athlete = Uuid::new_v4();
    let mut session = session_on(&db, day(2, 10), 90);

    let ledger = SessionLoadLedger::new(db.connection());
    ledger.submit(athlete, session.id, 6.5, None).unwrap();

    let moved_by = Days::new(2);
    session.starts_at = session.starts_at + chrono::Duration::days(2);
    session.ends_at = session.ends_at + chrono::Duration::days(2);
    SessionRegistry::new(db.connection()).register(&session).unwrap();

    let store = LoadStore::new(db.connection());
    let old = store.get_daily_load(&athlete, day(2, 10)).unwrap().unwrap();
    let new = store
        .get_daily_load(&athlete, day(2, 10).checked_add_days(moved_by).unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(old.internal_load, 0);
    assert_eq!(new.internal_load, 585);

    let engine = AcwrEngine::new(db.connection(), &AcwrSettings::default()).unwrap();
    let snapshots = engine
        .compute_range(&athlete, day(2, 10), day(2, 12), LoadSource::Internal)
        .unwrap();
    assert_eq!(snapshots[0].acute, 0.0);
    assert_eq!(snapshots[1].acute, 0.0);
    assert!(snapshots[2].acute > 0.0);
}

/// Test that rejected input leaves no trace downstream.
#[test]
fn test_invalid_events_rejected() {
    let db = Database::open_in_memory().unwrap();
    let athlete = Uuid::new_v4();
    let session = session_on(&db, day(3, 1), 60);
    let ledger = SessionLoadLedger::new(db.connection());

    for (exertion, duration) in [(10.5, Some(60)), (-1.0, Some(60)), (5.0, Some(0)), (f32::NAN, Some(30))] {
        let err = ledger.submit(athlete, session.id, exertion, duration).unwrap_err();
        assert!(matches!(err, LoadError::Validation(_)));
        assert!(!err.is_retryable());
    }

    let unknown = ledger.submit(athlete, Uuid::new_v4(), 5.0, Some(60)).unwrap_err();
    assert!(matches!(unknown, LoadError::SessionNotFound(_)));

    let store = LoadStore::new(db.connection());
    assert!(store.get_daily_load(&athlete, day(3, 1)).unwrap().is_none());
}

/// Test that a sustained spike after a steady block is flagged.
#[test]
fn test_spike_is_flagged() {
    let db = Database::open_in_memory().unwrap();
    let athlete = Uuid::new_v4();
    let ledger = SessionLoadLedger::new(db.connection());

    let start = day(1, 1);
    for (i, date) in start.iter_days().take(127).enumerate() {
        let session = session_on(&db, date, 60);
        let exertion = if i < 120 { 5.0 } else { 10.0 };
        let minutes = if i < 120 { 60 } else { 100 };
        ledger.submit(athlete, session.id, exertion, Some(minutes)).unwrap();
    }

    let engine = AcwrEngine::new(db.connection(), &AcwrSettings::default()).unwrap();
    let snapshots = engine
        .compute_range(&athlete, start, day(5, 6), LoadSource::Internal)
        .unwrap();
    assert_eq!(snapshots.len(), 127);

    let steady = &snapshots[119];
    assert_eq!(steady.status(), AcwrStatus::Optimal);
    let last = snapshots.last().unwrap();
    assert_eq!(last.status(), AcwrStatus::HighRisk);

    let latest = SnapshotStore::new(db.connection())
        .latest(&athlete, LoadSource::Internal)
        .unwrap()
        .unwrap();
    assert_eq!(&latest, last);
}

/// Test that a file database is shared by separate connections.
#[test]
fn test_file_database_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("loads.db");
    let athlete = Uuid::new_v4();

    {
        let db = Database::open(&path).unwrap();
        let session = session_on(&db, day(4, 1), 45);
        SessionLoadLedger::new(db.connection())
            .submit(athlete, session.id, 8.0, None)
            .unwrap();
    }

    let db = Database::open(&path).unwrap();
    let daily = LoadStore::new(db.connection())
        .get_daily_load(&athlete, day(4, 1))
        .unwrap()
        .unwrap();
    assert_eq!(daily.internal_load, 360);
}
