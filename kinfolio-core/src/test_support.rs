//! Test-only, in-memory implementations of the core seams used by unit and
//! behaviour tests.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use crate::{
    Clock, EntityKind, IncrementTask, QueueError, RecordStore, ScoredEntity, StoreError, TaskQueue,
};

/// Error injected by [`MemoryStore::fail_next`].
#[derive(Debug, thiserror::Error)]
#[error("injected storage failure")]
pub struct InjectedFailure;

type Tables = HashMap<EntityKind, BTreeMap<u64, ScoredEntity>>;

/// In-memory `RecordStore` used in tests.
///
/// Queries perform linear scans and are intended only for small datasets.
/// [`fail_next`](Self::fail_next) makes the following operations fail with a
/// transient backend error, which exercises retry paths.
#[derive(Default, Debug)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    failures: AtomicUsize,
}

impl MemoryStore {
    /// Create a store holding `entities` of one kind.
    pub fn with_entities<I>(kind: EntityKind, entities: I) -> Self
    where
        I: IntoIterator<Item = ScoredEntity>,
    {
        let store = Self::default();
        for entity in entities {
            store.insert(kind, entity);
        }
        store
    }

    /// Insert or replace an entity.
    pub fn insert(&self, kind: EntityKind, entity: ScoredEntity) {
        self.tables()
            .entry(kind)
            .or_default()
            .insert(entity.id, entity);
    }

    /// Remove an entity, simulating a deletion between enqueue and execution.
    pub fn remove(&self, kind: EntityKind, id: u64) {
        if let Some(table) = self.tables().get_mut(&kind) {
            table.remove(&id);
        }
    }

    /// Current read count of an entity, if it exists.
    pub fn read_count(&self, kind: EntityKind, id: u64) -> Option<f64> {
        self.tables()
            .get(&kind)
            .and_then(|table| table.get(&id))
            .map(|entity| entity.read_count)
    }

    /// Make the next `count` operations fail with a transient error.
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_failure(&self, operation: &'static str) -> Result<(), StoreError> {
        let injected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok();
        if injected {
            return Err(StoreError::backend(operation, InjectedFailure));
        }
        Ok(())
    }

    fn with_entity<F>(&self, kind: EntityKind, id: u64, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut ScoredEntity),
    {
        let mut tables = self.tables();
        let entity = tables
            .get_mut(&kind)
            .and_then(|table| table.get_mut(&id))
            .ok_or(StoreError::NotFound { kind, id })?;
        apply(entity);
        Ok(())
    }
}

impl RecordStore for MemoryStore {
    fn get(&self, kind: EntityKind, id: u64) -> Result<Option<ScoredEntity>, StoreError> {
        self.check_failure("fetch entity")?;
        Ok(self
            .tables()
            .get(&kind)
            .and_then(|table| table.get(&id))
            .cloned())
    }

    fn count(&self, kind: EntityKind) -> Result<u64, StoreError> {
        self.check_failure("count entities")?;
        let len = self.tables().get(&kind).map_or(0, BTreeMap::len);
        u64::try_from(len).map_err(|source| StoreError::backend("count entities", source))
    }

    fn count_below(&self, kind: EntityKind, read_count: f64) -> Result<u64, StoreError> {
        self.check_failure("count lower entities")?;
        let below = self.tables().get(&kind).map_or(0, |table| {
            table
                .values()
                .filter(|entity| entity.read_count < read_count)
                .count()
        });
        u64::try_from(below).map_err(|source| StoreError::backend("count lower entities", source))
    }

    fn top_ids_by_read_count(
        &self,
        kind: EntityKind,
        limit: usize,
    ) -> Result<Vec<u64>, StoreError> {
        self.check_failure("rank entities")?;
        let tables = self.tables();
        let mut ranked: Vec<&ScoredEntity> = tables
            .get(&kind)
            .map(|table| table.values().collect())
            .unwrap_or_default();
        ranked.sort_by(|a, b| {
            b.read_count
                .total_cmp(&a.read_count)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(ranked.into_iter().take(limit).map(|entity| entity.id).collect())
    }

    fn read_counts(&self, kind: EntityKind) -> Result<Vec<f64>, StoreError> {
        self.check_failure("read counts")?;
        Ok(self
            .tables()
            .get(&kind)
            .map(|table| table.values().map(|entity| entity.read_count).collect())
            .unwrap_or_default())
    }

    #[expect(
        clippy::float_arithmetic,
        reason = "the in-memory store adds deltas directly"
    )]
    fn increment_read_count(
        &self,
        kind: EntityKind,
        id: u64,
        delta: f64,
    ) -> Result<(), StoreError> {
        self.check_failure("increment read count")?;
        self.with_entity(kind, id, |entity| entity.read_count += delta)
    }

    fn update_read_count(
        &self,
        kind: EntityKind,
        id: u64,
        read_count: f64,
    ) -> Result<(), StoreError> {
        self.check_failure("update read count")?;
        self.with_entity(kind, id, |entity| entity.read_count = read_count)
    }
}

/// Shared, manually advanced [`Clock`].
///
/// Clones observe the same time, so a test can hand one clone to a cache and
/// keep another to move time forward.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<SystemTime>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at(UNIX_EPOCH + Duration::from_secs(1_700_000_000))
    }
}

impl ManualClock {
    /// Create a clock frozen at `now`.
    pub fn at(now: SystemTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now = now.checked_add(by).unwrap_or(*now);
    }

    /// The time `days` whole days before now.
    pub fn days_ago(&self, days: u64) -> SystemTime {
        let now = self.now();
        now.checked_sub(Duration::from_secs(days.saturating_mul(86_400)))
            .unwrap_or(now)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `TaskQueue` that records every task and never executes any.
#[derive(Debug, Default)]
pub struct RecordingQueue {
    tasks: Mutex<Vec<IncrementTask>>,
    closed: std::sync::atomic::AtomicBool,
}

impl RecordingQueue {
    /// Tasks enqueued so far, in order.
    pub fn tasks(&self) -> Vec<IncrementTask> {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reject every subsequent enqueue.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl TaskQueue for RecordingQueue {
    fn enqueue(&self, task: IncrementTask) -> Result<(), QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed { task });
        }
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task);
        Ok(())
    }
}
