//! Persistence seam for scored entities.
//!
//! The `RecordStore` trait exposes exactly the queries the ranking subsystem
//! needs: point reads, population counts, an ordered top-N snapshot, and two
//! write paths. One store serves every [`EntityKind`]; each call names the
//! kind it targets.

use thiserror::Error;

use crate::{EntityKind, ScoredEntity, ScoredEntityError};

#[cfg(feature = "store-sqlite")]
mod sqlite;

#[cfg(feature = "store-sqlite")]
pub use sqlite::{SqliteRecordStore, SqliteRecordStoreError};

/// Boxed source error carried by [`StoreError::Backend`].
pub type BackendError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by [`RecordStore`] operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced entity does not exist.
    #[error("{kind} {id} does not exist")]
    NotFound {
        /// Kind that was queried.
        kind: EntityKind,
        /// Missing identifier.
        id: u64,
    },
    /// A persisted row violates the entity invariants.
    #[error("stored {kind} {id} is invalid: {source}")]
    InvalidRecord {
        /// Kind of the offending row.
        kind: EntityKind,
        /// Identifier of the offending row.
        id: u64,
        /// Validation failure.
        #[source]
        source: ScoredEntityError,
    },
    /// The backend failed to execute the operation.
    #[error("record store failed to {operation}: {source}")]
    Backend {
        /// Description of the failed operation.
        operation: &'static str,
        /// Underlying backend failure.
        #[source]
        source: BackendError,
    },
}

impl StoreError {
    /// Wrap a backend failure.
    pub fn backend<E>(operation: &'static str, source: E) -> Self
    where
        E: Into<BackendError>,
    {
        Self::Backend {
            operation,
            source: source.into(),
        }
    }

    /// Report whether retrying the operation may succeed.
    ///
    /// Connection and I/O failures are transient. Missing entities and
    /// corrupt rows will fail the same way on every attempt.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }
}

/// Read and write access to the `read_count` of books, pages and songs.
///
/// Implementations must be thread-safe so a pool of workers can share one
/// store.
///
/// # Examples
///
/// ```rust
/// use kinfolio_core::{EntityKind, RecordStore, ScoredEntity, SqliteRecordStore};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = SqliteRecordStore::open_in_memory()?;
/// store.insert(EntityKind::Book, &ScoredEntity::new(1, 4.0)?)?;
/// store.insert(EntityKind::Book, &ScoredEntity::new(2, 9.0)?)?;
///
/// assert_eq!(store.count(EntityKind::Book)?, 2);
/// assert_eq!(store.top_ids_by_read_count(EntityKind::Book, 1)?, vec![2]);
///
/// store.increment_read_count(EntityKind::Book, 1, 1.0)?;
/// let book = store.get(EntityKind::Book, 1)?.expect("book exists");
/// assert_eq!(book.read_count, 5.0);
/// # Ok(())
/// # }
/// ```
pub trait RecordStore: Send + Sync {
    /// Fetch a single entity, or `None` when it does not exist.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the backend cannot be read.
    fn get(&self, kind: EntityKind, id: u64) -> Result<Option<ScoredEntity>, StoreError>;

    /// Count every entity of `kind`.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the backend cannot be read.
    fn count(&self, kind: EntityKind) -> Result<u64, StoreError>;

    /// Count entities of `kind` whose read count is strictly below
    /// `read_count`.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the backend cannot be read.
    fn count_below(&self, kind: EntityKind, read_count: f64) -> Result<u64, StoreError>;

    /// Return up to `limit` identifiers ordered by read count, highest first.
    ///
    /// Ties are broken by ascending identifier so repeated snapshots of an
    /// unchanged population agree.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the backend cannot be read.
    fn top_ids_by_read_count(&self, kind: EntityKind, limit: usize)
    -> Result<Vec<u64>, StoreError>;

    /// Return the read count of every entity of `kind`, in any order.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the backend cannot be read.
    fn read_counts(&self, kind: EntityKind) -> Result<Vec<f64>, StoreError>;

    /// Atomically add `delta` to an entity's read count in place.
    ///
    /// Concurrent calls for the same entity must never lose an update.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] when the entity does not exist and
    /// [`StoreError::Backend`] when the write fails.
    fn increment_read_count(&self, kind: EntityKind, id: u64, delta: f64)
    -> Result<(), StoreError>;

    /// Overwrite an entity's read count.
    ///
    /// Kept for read-then-write callers; the incrementer only uses
    /// [`increment_read_count`](Self::increment_read_count).
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] when the entity does not exist and
    /// [`StoreError::Backend`] when the write fails.
    fn update_read_count(&self, kind: EntityKind, id: u64, read_count: f64)
    -> Result<(), StoreError>;
}

macro_rules! forward_record_store {
    ($($pointer:ty),+) => {$(
        impl<S: RecordStore + ?Sized> RecordStore for $pointer {
            fn get(&self, kind: EntityKind, id: u64) -> Result<Option<ScoredEntity>, StoreError> {
                (**self).get(kind, id)
            }

            fn count(&self, kind: EntityKind) -> Result<u64, StoreError> {
                (**self).count(kind)
            }

            fn count_below(&self, kind: EntityKind, read_count: f64) -> Result<u64, StoreError> {
                (**self).count_below(kind, read_count)
            }

            fn top_ids_by_read_count(
                &self,
                kind: EntityKind,
                limit: usize,
            ) -> Result<Vec<u64>, StoreError> {
                (**self).top_ids_by_read_count(kind, limit)
            }

            fn read_counts(&self, kind: EntityKind) -> Result<Vec<f64>, StoreError> {
                (**self).read_counts(kind)
            }

            fn increment_read_count(
                &self,
                kind: EntityKind,
                id: u64,
                delta: f64,
            ) -> Result<(), StoreError> {
                (**self).increment_read_count(kind, id, delta)
            }

            fn update_read_count(
                &self,
                kind: EntityKind,
                id: u64,
                read_count: f64,
            ) -> Result<(), StoreError> {
                (**self).update_read_count(kind, id, read_count)
            }
        }
    )+};
}

forward_record_store!(&S, std::sync::Arc<S>);
