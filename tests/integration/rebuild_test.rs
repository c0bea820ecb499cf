//! Integration tests for rebuilding daily loads through the recompute worker.

use loadwatch::load::{
    ExternalLoadIntake, ExternalLoadSample, ExternalProvider, RecomputeWorker, SessionLoadLedger,
};
use loadwatch::storage::{Database, LoadStore};
use uuid::Uuid;

use crate::common::{day, session_on};

/// Test that a full rebuild restores every daily row from its inputs.
#[test]
fn test_rebuild_from_ledger_and_samples() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rebuild.db");
    let athlete = Uuid::new_v4();

    let reader = Database::open(&path).unwrap();
    let ledger = SessionLoadLedger::new(reader.connection());
    let morning = session_on(&reader, day(5, 1), 60);
    let evening = session_on(&reader, day(5, 1), 30);
    ledger.submit(athlete, morning.id, 7.0, None).unwrap();
    ledger.submit(athlete, evening.id, 4.5, None).unwrap();

    ExternalLoadIntake::new(reader.connection())
        .record(&ExternalLoadSample {
            athlete_id: athlete,
            date: day(5, 2),
            provider: ExternalProvider::Catapult,
            value: 612.5,
        })
        .unwrap();

    // Corrupt both days behind the ledger's back
    let store = LoadStore::new(reader.connection());
    store.upsert_internal_load(&athlete, day(5, 1), 1).unwrap();
    store.upsert_external_load(&athlete, day(5, 2), 1).unwrap();

    let worker = RecomputeWorker::spawn(Database::open(&path).unwrap());
    let queued = worker.submit_rebuild(reader.connection()).unwrap();
    let (_, stats) = worker.finish().unwrap();

    assert_eq!(queued, 4);
    assert_eq!(stats.processed, 4);
    assert!(stats.failed.is_empty());

    let first = store.get_daily_load(&athlete, day(5, 1)).unwrap().unwrap();
    let second = store.get_daily_load(&athlete, day(5, 2)).unwrap().unwrap();
    assert_eq!((first.internal_load, first.external_load), (555, 0));
    assert_eq!((second.internal_load, second.external_load), (0, 613));
}

/// Test that a rebuild of an empty database queues nothing.
#[test]
fn test_rebuild_empty_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.db");

    let reader = Database::open(&path).unwrap();
    let worker = RecomputeWorker::spawn(Database::open(&path).unwrap());
    assert_eq!(worker.submit_rebuild(reader.connection()).unwrap(), 0);

    let (db, stats) = worker.finish().unwrap();
    assert_eq!(stats.processed, 0);
    assert!(LoadStore::new(db.connection())
        .athletes_with_daily_loads()
        .unwrap()
        .is_empty());
}
