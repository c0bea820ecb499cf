//! Integration tests for concurrent writers to the same athlete and day.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use loadwatch::load::{
    DailyLoadAggregator, RecomputeRequest, RecomputeWorker, SessionLoadLedger, TrainingSession,
};
use loadwatch::storage::{Database, LoadStore};
use uuid::Uuid;

use crate::common::{day, session_on};

const SESSIONS: usize = 120;
const LOCK_WAIT: Duration = Duration::from_secs(30);

fn open(path: &Path) -> Database {
    Database::open_with_timeout(path, LOCK_WAIT).unwrap()
}

fn sessions(path: &Path) -> Vec<TrainingSession> {
    let db = Database::open(path).unwrap();
    (0..SESSIONS).map(|_| session_on(&db, day(6, 3), 60)).collect()
}

fn assert_day_matches_ledger(path: &Path, athlete: &Uuid) {
    let db = Database::open(path).unwrap();
    let store = LoadStore::new(db.connection());
    let daily = store.get_daily_load(athlete, day(6, 3)).unwrap().unwrap();
    let ledger_sum = store.sum_session_loads(athlete, day(6, 3)).unwrap();

    assert_eq!(ledger_sum, (SESSIONS * 300) as u32);
    assert_eq!(daily.internal_load, ledger_sum);
}

/// Test that standalone recomputes on another connection never write a stale total.
#[test]
fn test_recompute_loop_alongside_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("concurrent.db");
    let athlete = Uuid::new_v4();
    let sessions = sessions(&path);

    let stop = Arc::new(AtomicBool::new(false));
    let recomputer = {
        let stop = Arc::clone(&stop);
        let path = path.clone();
        std::thread::spawn(move || {
            let db = open(&path);
            let aggregator = DailyLoadAggregator::new(db.connection());
            let mut runs = 0usize;
            loop {
                aggregator.recompute(&athlete, day(6, 3)).unwrap();
                runs += 1;
                if stop.load(Ordering::Relaxed) {
                    break runs;
                }
            }
        })
    };

    let db = open(&path);
    let ledger = SessionLoadLedger::new(db.connection());
    for session in &sessions {
        ledger.submit(athlete, session.id, 5.0, None).unwrap();
    }
    stop.store(true, Ordering::Relaxed);

    assert!(recomputer.join().unwrap() > 0);
    assert_day_matches_ledger(&path, &athlete);
}

/// Test that queued worker recomputes interleaved with ledger writes keep the day exact.
#[test]
fn test_worker_alongside_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("concurrent.db");
    let athlete = Uuid::new_v4();
    let sessions = sessions(&path);

    let worker = RecomputeWorker::spawn(open(&path));
    let db = open(&path);
    let ledger = SessionLoadLedger::new(db.connection());
    for session in &sessions {
        worker
            .submit(RecomputeRequest::Internal {
                athlete_id: athlete,
                date: day(6, 3),
            })
            .unwrap();
        ledger.submit(athlete, session.id, 5.0, None).unwrap();
    }

    let (_, stats) = worker.finish().unwrap();
    assert!(stats.failed.is_empty());
    assert_eq!(stats.processed, SESSIONS);
    assert_day_matches_ledger(&path, &athlete);
}

/// Test that two ledgers on separate connections serialize writes to one day.
#[test]
fn test_two_ledgers_same_day() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("concurrent.db");
    let athlete = Uuid::new_v4();
    let sessions = sessions(&path);
    let (left, right) = sessions.split_at(SESSIONS / 2);

    std::thread::scope(|scope| {
        for half in [left, right] {
            let path = &path;
            scope.spawn(move || {
                let db = open(path);
                let ledger = SessionLoadLedger::new(db.connection());
                for session in half {
                    ledger.submit(athlete, session.id, 5.0, None).unwrap();
                }
            });
        }
    });

    assert_day_matches_ledger(&path, &athlete);
}
