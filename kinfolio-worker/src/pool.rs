//! Tokio worker pool draining an in-process increment queue.

use std::sync::{Arc, Mutex, PoisonError};

use kinfolio_core::{IncrementTask, QueueError, TaskQueue};
use kinfolio_scorer::IncrementHandler;
use log::{debug, error, warn};
use tokio::{
    runtime::Handle,
    sync::{Mutex as AsyncMutex, mpsc},
    task::JoinHandle,
};

use crate::{RetryPolicy, WorkerConfig, WorkerError, WorkerReport, report::Stats};

type SharedReceiver = Arc<AsyncMutex<mpsc::UnboundedReceiver<IncrementTask>>>;

/// Cloneable sending half of a [`WorkerPool`].
///
/// Enqueueing never blocks. Once the pool shuts down every clone rejects new
/// tasks with [`QueueError::Closed`].
#[derive(Debug, Clone)]
pub struct QueueHandle {
    sender: Arc<Mutex<Option<mpsc::UnboundedSender<IncrementTask>>>>,
}

impl QueueHandle {
    fn close(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

impl TaskQueue for QueueHandle {
    fn enqueue(&self, task: IncrementTask) -> Result<(), QueueError> {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(live) = guard.as_ref() else {
            return Err(QueueError::Closed { task });
        };
        live.send(task).map_err(|rejected| QueueError::Closed { task: rejected.0 })
    }
}

/// A fixed set of Tokio tasks executing increments with retry.
///
/// Delivery is at least once: a task that fails transiently is attempted
/// again after a backoff until the [`RetryPolicy`] is exhausted. Failures are
/// logged and counted, never returned to whoever enqueued the task.
///
/// # Examples
///
/// ```
/// use kinfolio_core::{EntityKind, IncrementTask, MemoryExpiringCache, ScoredEntity, TaskQueue};
/// use kinfolio_core::test_support::MemoryStore;
/// use kinfolio_scorer::ReadCountIncrementer;
/// use kinfolio_worker::{WorkerConfig, WorkerPool};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Arc::new(MemoryStore::with_entities(
///     EntityKind::Page,
///     [ScoredEntity::new(1, 0.0)?],
/// ));
/// let incrementer = ReadCountIncrementer::new(Arc::clone(&store), MemoryExpiringCache::default());
/// let pool = WorkerPool::spawn(incrementer, WorkerConfig::with_workers(2))?;
///
/// pool.queue().enqueue(IncrementTask::new(EntityKind::Page, 1))?;
/// let report = pool.shutdown().await?;
///
/// assert_eq!(report.applied, 1);
/// assert_eq!(store.read_count(EntityKind::Page, 1), Some(1.0));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct WorkerPool {
    queue: QueueHandle,
    workers: Vec<JoinHandle<()>>,
    stats: Arc<Stats>,
}

impl WorkerPool {
    /// Start `config.workers` workers driving `handler`.
    ///
    /// Must be called from within a Tokio runtime. The handler runs on
    /// Tokio's blocking thread pool so synchronous storage never stalls the
    /// async workers.
    ///
    /// # Errors
    /// Returns [`WorkerError`] when the configuration is invalid or no
    /// runtime is available.
    pub fn spawn<H>(handler: H, config: WorkerConfig) -> Result<Self, WorkerError>
    where
        H: IncrementHandler + 'static,
    {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|source| WorkerError::NoRuntime { source })?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let receiver: SharedReceiver = Arc::new(AsyncMutex::new(receiver));
        let handler = Arc::new(handler);
        let stats = Arc::new(Stats::default());

        let workers = (0..config.workers)
            .map(|index| {
                let worker = Worker {
                    index,
                    handler: Arc::clone(&handler),
                    receiver: Arc::clone(&receiver),
                    stats: Arc::clone(&stats),
                    retry: config.retry,
                };
                runtime.spawn(worker.run())
            })
            .collect();

        debug!("started {} increment workers", config.workers);
        Ok(Self {
            queue: QueueHandle {
                sender: Arc::new(Mutex::new(Some(sender))),
            },
            workers,
            stats,
        })
    }

    /// A handle for enqueueing tasks.
    #[must_use]
    pub fn queue(&self) -> QueueHandle {
        self.queue.clone()
    }

    /// Totals so far; tasks still in flight are not included.
    #[must_use]
    pub fn report(&self) -> WorkerReport {
        self.stats.snapshot()
    }

    /// Close the queue, finish every task already enqueued and stop.
    ///
    /// # Errors
    /// Returns [`WorkerError::Join`] when a worker panicked.
    pub async fn shutdown(self) -> Result<WorkerReport, WorkerError> {
        self.queue.close();
        for worker in self.workers {
            worker
                .await
                .map_err(|source| WorkerError::Join { source })?;
        }
        let report = self.stats.snapshot();
        debug!("increment workers stopped: {report:?}");
        Ok(report)
    }
}

struct Worker<H: ?Sized> {
    index: usize,
    handler: Arc<H>,
    receiver: SharedReceiver,
    stats: Arc<Stats>,
    retry: RetryPolicy,
}

impl<H: IncrementHandler + ?Sized + 'static> Worker<H> {
    async fn run(self) {
        loop {
            let next = self.receiver.lock().await.recv().await;
            let Some(task) = next else {
                break;
            };
            self.process(task).await;
        }
        debug!("increment worker {} drained the queue", self.index);
    }

    async fn process(&self, task: IncrementTask) {
        let mut attempt = 1_u32;
        loop {
            let handler = Arc::clone(&self.handler);
            let result = tokio::task::spawn_blocking(move || handler.handle(task)).await;
            match result {
                Ok(Ok(outcome)) => {
                    debug!("{task}: {outcome:?}");
                    self.stats.record(&outcome);
                    return;
                }
                Ok(Err(err)) if err.is_transient() && self.retry.allows_retry(attempt) => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        "{task}: attempt {attempt}/{} failed ({err}); retrying in {delay:?}",
                        self.retry.max_attempts
                    );
                    self.stats.record_retry();
                    tokio::time::sleep(delay).await;
                    attempt = attempt.saturating_add(1);
                }
                Ok(Err(err)) => {
                    error!("{task}: giving up after {attempt} attempt(s): {err}");
                    self.stats.record_failure();
                    return;
                }
                Err(join_err) => {
                    error!("{task}: handler panicked: {join_err}");
                    self.stats.record_failure();
                    return;
                }
            }
        }
    }
}
