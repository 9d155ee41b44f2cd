//! Read-count ranking for Kinfolio books, pages and songs.
//!
//! The crate provides two complementary capabilities:
//! - **Popularity percentiles** convert a raw `read_count` into a `0..=100`
//!   rank relative to every entity of the same kind. The single-entity path
//!   issues two counting queries; the batch path used when rendering a list
//!   fetches the population once, sorts it, and binary-searches per item.
//! - **Rank-aware increments** apply one "viewed" or "played" signal to an
//!   entity. The delta depends on where the entity currently sits in the
//!   top-N snapshot of its kind and, for songs, on how old it is. Songs are
//!   additionally throttled by a short-lived dedup marker.
//!
//! # Examples
//!
//! ```
//! use kinfolio_core::{EntityKind, MemoryExpiringCache, ScoredEntity};
//! use kinfolio_core::test_support::MemoryStore;
//! use kinfolio_scorer::{IncrementOutcome, ReadCountIncrementer};
//!
//! # fn main() -> Result<(), kinfolio_scorer::IncrementError> {
//! let store = MemoryStore::with_entities(
//!     EntityKind::Page,
//!     [ScoredEntity::new(1, 0.0).expect("valid page")],
//! );
//! let incrementer = ReadCountIncrementer::new(&store, MemoryExpiringCache::default());
//!
//! let outcome = incrementer.increment(EntityKind::Page, 1)?;
//! assert!(matches!(outcome, IncrementOutcome::Applied { .. }));
//! assert_eq!(store.read_count(EntityKind::Page, 1), Some(1.0));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod error;
mod incrementer;
mod popularity;
mod types;

pub use error::{IncrementError, PopularityError};
pub use incrementer::{IncrementHandler, IncrementOutcome, ReadCountIncrementer, age_in_days};
pub use popularity::{PopularityService, count_below_sorted, percentile};
pub use types::{
    AgeTier, AgeTiers, PolicySet, PopularEntity, RankPolicy, RankTier, SONG_DEDUP_TTL,
    UnrankedIncrement,
};

#[cfg(test)]
mod tests;
