//! Integration tests for parallel batch runs and the scheduler.

use std::path::Path;
use std::time::Duration;

use loadwatch::metrics::{AcwrEngine, BatchRunner, NightlyScheduler};
use loadwatch::storage::{AcwrSettings, Database, LoadStore, SnapshotStore, StorageSettings};
use loadwatch::LoadSource;
use uuid::Uuid;

use crate::common::day;

fn seed_athletes(path: &Path, count: usize) -> Vec<Uuid> {
    let db = Database::open(path).unwrap();
    let store = LoadStore::new(db.connection());

    let mut athletes: Vec<Uuid> = (0..count).map(|_| Uuid::new_v4()).collect();
    athletes.sort();
    for (n, athlete) in athletes.iter().enumerate() {
        for (i, date) in day(1, 1).iter_days().take(60).enumerate() {
            if (i + n) % 4 == 3 {
                continue;
            }
            let load = 150 + ((i * 31 + n * 17) % 450) as u32;
            store.upsert_internal_load(athlete, date, load).unwrap();
        }
    }
    athletes
}

fn runner(path: &Path, max_parallel: usize) -> BatchRunner {
    BatchRunner::new(
        path.to_path_buf(),
        StorageSettings::default(),
        AcwrSettings {
            chunk_days: 10,
            ..AcwrSettings::default()
        },
        max_parallel,
    )
}

/// Test that a parallel batch writes what sequential runs write.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_matches_sequential() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("batch.db");
    let athletes = seed_athletes(&path, 6);

    let report = runner(&path, 3)
        .run(&athletes, day(1, 1), day(2, 29), LoadSource::Internal)
        .await;

    assert!(report.is_success(), "{:?}", report.failed);
    assert_eq!(report.completed.len(), 6);
    assert!(report.completed.iter().all(|run| run.days_written == 60));

    let db = Database::open(&path).unwrap();
    let engine = AcwrEngine::new(db.connection(), &AcwrSettings::default()).unwrap();
    let store = SnapshotStore::new(db.connection());
    for athlete in &athletes {
        let stored = store
            .range(athlete, day(1, 1), day(2, 29), LoadSource::Internal)
            .unwrap();
        let sequential = engine
            .compute_range(athlete, day(1, 1), day(2, 29), LoadSource::Internal)
            .unwrap();
        assert_eq!(stored, sequential);
    }
}

/// Test that an invalid range fails every athlete without a resume point.
#[tokio::test]
async fn test_batch_reports_failures() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("batch.db");
    let athletes = seed_athletes(&path, 2);

    let report = runner(&path, 2)
        .run(&athletes, day(3, 1), day(2, 1), LoadSource::Internal)
        .await;

    assert!(!report.is_success());
    assert!(report.completed.is_empty());
    assert_eq!(report.failed.len(), 2);
    assert!(report.failed.iter().all(|f| f.resume_from.is_none()));
}

/// Test that the batch runner lists every athlete with loads.
#[tokio::test]
async fn test_runner_lists_athletes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("batch.db");
    let athletes = seed_athletes(&path, 3);

    let mut listed = runner(&path, 1).athletes().await.unwrap();
    listed.sort();
    assert_eq!(listed, athletes);
}

/// Test one scheduler pass over the lookback window for both sources.
#[tokio::test]
async fn test_scheduler_run_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("batch.db");
    let athletes = seed_athletes(&path, 2);

    let scheduler = NightlyScheduler::new(
        runner(&path, 2),
        vec![LoadSource::Internal, LoadSource::External],
        13,
        Duration::from_secs(3600),
    );
    let report = scheduler.run_once(day(2, 14)).await;

    assert!(report.is_success());
    assert_eq!(report.completed.len(), 4);
    assert!(report.completed.iter().all(|run| run.days_written == 14));

    let db = Database::open(&path).unwrap();
    let store = SnapshotStore::new(db.connection());
    for athlete in &athletes {
        assert_eq!(store.count(athlete, LoadSource::Internal).unwrap(), 14);
        let external = store
            .range(athlete, day(2, 1), day(2, 14), LoadSource::External)
            .unwrap();
        assert!(external.iter().all(|s| s.ratio == 0.0));
    }
}

/// Test that an unreachable database fails the scheduled run.
#[tokio::test]
async fn test_scheduler_reports_unreachable_database() {
    let dir = tempfile::tempdir().unwrap();
    // A regular file where the database directory should be
    let blocker = dir.path().join("not_a_dir");
    std::fs::write(&blocker, b"").unwrap();

    let scheduler = NightlyScheduler::new(
        runner(&blocker.join("batch.db"), 1),
        vec![LoadSource::Internal],
        7,
        Duration::from_secs(3600),
    );
    let report = scheduler.run_once(day(2, 14)).await;

    assert!(!report.is_success());
    assert!(report.error.is_some());
    assert!(report.completed.is_empty());
    assert!(report.failed.is_empty());
}

/// Test that the scheduler stops when shutdown resolves.
#[tokio::test]
async fn test_scheduler_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("batch.db");
    seed_athletes(&path, 1);

    let scheduler = NightlyScheduler::new(
        runner(&path, 1),
        vec![LoadSource::Internal],
        7,
        Duration::from_secs(3600),
    );

    let finished = tokio::time::timeout(
        Duration::from_secs(30),
        scheduler.run_until(tokio::time::sleep(Duration::from_millis(50))),
    )
    .await;
    assert!(finished.is_ok());
}
