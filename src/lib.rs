//! Facade crate for Kinfolio read-count rankings.
//!
//! This crate re-exports the core domain types and the ranking services, and
//! exposes the SQLite backends and the worker pool behind feature flags.

#![forbid(unsafe_code)]

pub use kinfolio_core::{
    CacheError, Clock, EntityKind, ExpiringCache, IncrementTask, MemoryExpiringCache, QueueError,
    RecordStore, ScoredEntity, ScoredEntityError, StoreError, SystemClock, TaskQueue,
};
pub use kinfolio_scorer::{
    IncrementError, IncrementHandler, IncrementOutcome, PolicySet, PopularEntity,
    PopularityError, PopularityService, RankPolicy, RankTier, ReadCountIncrementer,
};

#[cfg(feature = "store-sqlite")]
pub use kinfolio_core::{SqliteExpiringCache, SqliteRecordStore, SqliteRecordStoreError};

#[cfg(feature = "test-support")]
pub use kinfolio_core::test_support;

#[cfg(feature = "worker")]
pub use kinfolio_worker::{
    QueueHandle, RetryPolicy, WorkerConfig, WorkerError, WorkerPool, WorkerReport,
};
