//! Core domain types for the Kinfolio read-count ranking engine.
//!
//! Books, pages and songs all carry a `read_count` score that grows as family
//! members view or play them. This crate defines the shared vocabulary used by
//! the scorer and worker crates: the [`ScoredEntity`] record, the
//! [`RecordStore`] persistence seam, the [`ExpiringCache`] used to suppress
//! duplicate work, the [`Clock`] used for age and expiry calculations, and the
//! [`IncrementTask`] descriptor handed to a [`TaskQueue`].
//!
//! Constructors return `Result` to surface invalid input early.

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod cache;
pub mod clock;
mod entity;
pub mod queue;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
pub mod test_support;

pub use cache::{CacheError, ExpiringCache, MemoryExpiringCache, marker_key};
pub use clock::{Clock, SystemClock};
pub use entity::{EntityKind, ParseEntityKindError, ScoredEntity, ScoredEntityError};
pub use queue::{IncrementTask, QueueError, TaskQueue};
pub use store::{RecordStore, StoreError};

#[cfg(feature = "store-sqlite")]
pub use cache::SqliteExpiringCache;
#[cfg(feature = "store-sqlite")]
pub use store::{SqliteRecordStore, SqliteRecordStoreError};
