//! Error types raised while ranking and incrementing read counts.
#![forbid(unsafe_code)]

use kinfolio_core::{CacheError, StoreError};
use thiserror::Error;

/// Errors raised while computing popularity percentiles.
#[derive(Debug, Error)]
pub enum PopularityError {
    /// Reading the population from the record store failed.
    #[error("failed to read the population: {source}")]
    Store {
        /// Source error from the record store.
        #[from]
        source: StoreError,
    },
}

/// Errors raised while applying a read-count increment.
///
/// A missing entity is not an error: it surfaces as
/// [`IncrementOutcome::Missing`](crate::IncrementOutcome::Missing).
#[derive(Debug, Error)]
pub enum IncrementError {
    /// Reading or writing the entity failed.
    #[error("record store failure: {source}")]
    Store {
        /// Source error from the record store.
        #[from]
        source: StoreError,
    },
    /// The dedup marker could not be set or released.
    #[error("dedup cache failure: {source}")]
    Cache {
        /// Source error from the expiring cache.
        #[from]
        source: CacheError,
    },
}

impl IncrementError {
    /// Report whether the surrounding queue should retry the task.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Store { source } => source.is_transient(),
            Self::Cache { .. } => true,
        }
    }
}
