//! Unit coverage for the worker pool.

use std::{sync::Arc, time::Duration};

use kinfolio_core::{
    EntityKind, IncrementTask, MemoryExpiringCache, QueueError, ScoredEntity, TaskQueue,
    test_support::MemoryStore,
};
use kinfolio_scorer::{IncrementError, IncrementHandler, IncrementOutcome, ReadCountIncrementer};
use rstest::{fixture, rstest};

use crate::{RetryPolicy, WorkerConfig, WorkerError, WorkerPool, WorkerReport};

const FAST_RETRY: RetryPolicy = RetryPolicy {
    max_attempts: 3,
    initial_backoff: Duration::from_millis(1),
    max_backoff: Duration::from_millis(5),
};

#[fixture]
fn store() -> Arc<MemoryStore> {
    let store = MemoryStore::default();
    for id in 1..=3 {
        store.insert(
            EntityKind::Page,
            ScoredEntity::new(id, 0.0).expect("valid page"),
        );
    }
    store.insert(
        EntityKind::Song,
        ScoredEntity::new(9, 0.0).expect("valid song"),
    );
    Arc::new(store)
}

fn spawn_pool(store: &Arc<MemoryStore>, workers: usize) -> WorkerPool {
    let incrementer = ReadCountIncrementer::new(Arc::clone(store), MemoryExpiringCache::default());
    WorkerPool::spawn(
        incrementer,
        WorkerConfig::with_workers(workers).with_retry(FAST_RETRY),
    )
    .expect("spawn pool")
}

#[rstest]
#[tokio::test]
async fn drains_every_task_before_shutdown(store: Arc<MemoryStore>) {
    let pool = spawn_pool(&store, 3);
    let queue = pool.queue();
    for id in 1..=3 {
        queue
            .enqueue(IncrementTask::new(EntityKind::Page, id))
            .expect("enqueue");
    }
    queue
        .enqueue(IncrementTask::new(EntityKind::Page, 42))
        .expect("enqueue");

    let report = pool.shutdown().await.expect("shutdown");

    assert_eq!(report.applied, 3);
    assert_eq!(report.missing, 1);
    assert_eq!(report.completed(), 4);
    for id in 1..=3 {
        assert_eq!(store.read_count(EntityKind::Page, id), Some(1.0));
    }
}

#[rstest]
#[tokio::test]
async fn transient_failures_are_retried(store: Arc<MemoryStore>) {
    let pool = spawn_pool(&store, 1);
    store.fail_next(1);
    pool.queue()
        .enqueue(IncrementTask::new(EntityKind::Page, 1))
        .expect("enqueue");

    let report = pool.shutdown().await.expect("shutdown");

    assert_eq!(report.retried, 1);
    assert_eq!(report.applied, 1);
    assert_eq!(store.read_count(EntityKind::Page, 1), Some(1.0));
}

#[rstest]
#[tokio::test]
async fn exhausted_retries_are_counted_as_failures(store: Arc<MemoryStore>) {
    let pool = spawn_pool(&store, 1);
    store.fail_next(10);
    pool.queue()
        .enqueue(IncrementTask::new(EntityKind::Page, 1))
        .expect("enqueue");

    let report = pool.shutdown().await.expect("shutdown");

    assert_eq!(
        report,
        WorkerReport {
            retried: 2,
            failed: 1,
            ..WorkerReport::default()
        }
    );
    assert_eq!(store.read_count(EntityKind::Page, 1), Some(0.0));
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_song_plays_count_once(store: Arc<MemoryStore>) {
    let pool = spawn_pool(&store, 4);
    let queue = pool.queue();
    for _ in 0..10 {
        queue
            .enqueue(IncrementTask::new(EntityKind::Song, 9))
            .expect("enqueue");
    }

    let report = pool.shutdown().await.expect("shutdown");

    assert_eq!(report.applied, 1);
    assert_eq!(report.deduplicated, 9);
}

#[rstest]
#[tokio::test]
async fn queue_rejects_tasks_after_shutdown(store: Arc<MemoryStore>) {
    let pool = spawn_pool(&store, 1);
    let queue = pool.queue();
    pool.shutdown().await.expect("shutdown");

    let task = IncrementTask::new(EntityKind::Page, 1);
    assert_eq!(queue.enqueue(task), Err(QueueError::Closed { task }));
}

#[rstest]
fn spawning_outside_a_runtime_fails(store: Arc<MemoryStore>) {
    let incrementer = ReadCountIncrementer::new(store, MemoryExpiringCache::default());
    let err = WorkerPool::spawn(incrementer, WorkerConfig::default()).expect_err("no runtime");
    assert!(matches!(err, WorkerError::NoRuntime { .. }));
}

struct PanickingHandler;

impl IncrementHandler for PanickingHandler {
    fn handle(&self, task: IncrementTask) -> Result<IncrementOutcome, IncrementError> {
        panic!("handler exploded on {task}");
    }
}

#[rstest]
#[tokio::test]
async fn handler_panics_fail_the_task_not_the_pool() {
    let pool = WorkerPool::spawn(PanickingHandler, WorkerConfig::with_workers(1))
        .expect("spawn pool");
    pool.queue()
        .enqueue(IncrementTask::new(EntityKind::Book, 1))
        .expect("enqueue");

    let report = pool.shutdown().await.expect("shutdown");

    assert_eq!(report.failed, 1);
}

#[rstest]
fn reports_serialise_as_flat_json() {
    let report = WorkerReport {
        applied: 2,
        ..WorkerReport::default()
    };
    let json = serde_json::to_string(&report).expect("serialise");
    assert_eq!(
        json,
        r#"{"applied":2,"unchanged":0,"deduplicated":0,"missing":0,"retried":0,"failed":0}"#
    );
}
