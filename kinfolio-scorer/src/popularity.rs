//! Percentile ranking of read counts within one entity kind.
#![forbid(unsafe_code)]

use kinfolio_core::{EntityKind, RecordStore, ScoredEntity};
use log::debug;

use crate::{PopularEntity, PopularityError};

/// Convert a count of strictly lower entities into a `0..=100` percentile.
///
/// `total` is the size of the whole population. An empty population yields
/// `0` and a population of one yields `100`. Otherwise the result is
/// `100 * lower / (total - 1)` rounded half up, clamped to `100`.
///
/// # Examples
///
/// ```
/// use kinfolio_scorer::percentile;
///
/// assert_eq!(percentile(0, 0), 0);
/// assert_eq!(percentile(0, 1), 100);
/// assert_eq!(percentile(1, 3), 50);
/// assert_eq!(percentile(1, 4), 33);
/// assert_eq!(percentile(2, 4), 67);
/// ```
#[must_use]
pub fn percentile(lower: u64, total: u64) -> u8 {
    match total {
        0 => 0,
        1 => 100,
        _ => {
            let span = u128::from(total.saturating_sub(1));
            let scaled = u128::from(lower).saturating_mul(200).saturating_add(span);
            let rounded = scaled.checked_div(span.saturating_mul(2)).unwrap_or(0);
            u8::try_from(rounded.min(100)).unwrap_or(100)
        }
    }
}

/// Count the values in ascending `sorted` that are strictly below `value`.
///
/// Runs a lower-bound binary search, so equal values never count.
#[must_use]
pub fn count_below_sorted(sorted: &[f64], value: f64) -> usize {
    sorted.partition_point(|candidate| *candidate < value)
}

/// Computes popularity percentiles against a [`RecordStore`].
///
/// The service holds no state beyond the borrowed store; every call reads the
/// current population.
///
/// # Examples
///
/// ```
/// use kinfolio_core::{EntityKind, ScoredEntity};
/// use kinfolio_core::test_support::MemoryStore;
/// use kinfolio_scorer::PopularityService;
///
/// # fn main() -> Result<(), kinfolio_scorer::PopularityError> {
/// let store = MemoryStore::with_entities(
///     EntityKind::Book,
///     [1.0, 5.0, 9.0].into_iter().zip(1..).map(|(count, id)| {
///         ScoredEntity::new(id, count).expect("valid book")
///     }),
/// );
/// let service = PopularityService::new(&store);
/// let middle = ScoredEntity::new(2, 5.0).expect("valid book");
///
/// assert_eq!(service.calculate_popularity(EntityKind::Book, &middle)?, 50);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PopularityService<'a, S: ?Sized> {
    store: &'a S,
}

impl<S: ?Sized> Clone for PopularityService<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: ?Sized> Copy for PopularityService<'_, S> {}

impl<'a, S: RecordStore + ?Sized> PopularityService<'a, S> {
    /// Create a service reading from `store`.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Percentile of `entity` among every entity of `kind`.
    ///
    /// Issues a population count and, for populations larger than one, a
    /// count of entities with a strictly lower read count.
    ///
    /// # Errors
    /// Returns [`PopularityError::Store`] when either query fails.
    pub fn calculate_popularity(
        &self,
        kind: EntityKind,
        entity: &ScoredEntity,
    ) -> Result<u8, PopularityError> {
        let total = self.store.count(kind)?;
        if total <= 1 {
            return Ok(percentile(0, total));
        }
        let lower = self.store.count_below(kind, entity.read_count)?;
        Ok(percentile(lower, total))
    }

    /// Annotate every entity in `collection` with its percentile.
    ///
    /// The whole population of `kind` is read and sorted once, then each item
    /// is placed with a binary search. Items receive exactly the value
    /// [`calculate_popularity`](Self::calculate_popularity) would return for
    /// them. The order of `collection` is preserved.
    ///
    /// # Errors
    /// Returns [`PopularityError::Store`] when the population cannot be read.
    pub fn add_popularity_to_collection(
        &self,
        kind: EntityKind,
        collection: Vec<ScoredEntity>,
    ) -> Result<Vec<PopularEntity>, PopularityError> {
        if collection.is_empty() {
            return Ok(Vec::new());
        }
        let total = self.store.count(kind)?;
        let sorted = if total > 1 {
            let mut counts = self.store.read_counts(kind)?;
            counts.sort_by(f64::total_cmp);
            counts
        } else {
            Vec::new()
        };
        debug!(
            "ranking {} {kind} entities against a population of {total}",
            collection.len()
        );
        Ok(collection
            .into_iter()
            .map(|entity| {
                let lower = u64::try_from(count_below_sorted(&sorted, entity.read_count))
                    .unwrap_or(u64::MAX);
                PopularEntity {
                    popularity_percentage: percentile(lower, total),
                    entity,
                }
            })
            .collect())
    }
}
