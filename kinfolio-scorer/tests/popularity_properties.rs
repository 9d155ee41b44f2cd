//! Property-based tests for popularity percentiles.
//!
//! # Invariants tested
//!
//! - **Bounds:** every percentile lies in `0..=100`.
//! - **Monotonicity:** a strictly lower read count never ranks higher.
//! - **Batch/single agreement:** the sorted batch path and the counting path
//!   assign every entity the same percentile.

use kinfolio_core::{EntityKind, ScoredEntity, test_support::MemoryStore};
use kinfolio_scorer::{PopularityService, percentile};
use proptest::prelude::*;

fn population_strategy() -> impl Strategy<Value = Vec<u16>> {
    prop::collection::vec(0_u16..=50, 1..40)
}

fn store_with(counts: &[u16]) -> (MemoryStore, Vec<ScoredEntity>) {
    let entities: Vec<ScoredEntity> = (1_u64..)
        .zip(counts)
        .map(|(id, count)| ScoredEntity::new(id, f64::from(*count)).expect("valid entity"))
        .collect();
    let store = MemoryStore::with_entities(EntityKind::Song, entities.iter().cloned());
    (store, entities)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: percentiles stay within bounds for any consistent counts.
    #[test]
    fn percentile_is_bounded(
        (total, lower) in (0_u64..100_000).prop_flat_map(|total| (Just(total), 0..=total)),
    ) {
        prop_assert!(percentile(lower, total) <= 100);
    }

    /// Property: strictly lower read counts never receive a higher percentile.
    #[test]
    fn percentile_is_monotonic(counts in population_strategy()) {
        let (store, entities) = store_with(&counts);
        let service = PopularityService::new(&store);
        for a in &entities {
            for b in &entities {
                if a.read_count < b.read_count {
                    let pa = service.calculate_popularity(EntityKind::Song, a).expect("rank a");
                    let pb = service.calculate_popularity(EntityKind::Song, b).expect("rank b");
                    prop_assert!(pa <= pb, "{} ranked {pa} above {} at {pb}", a.id, b.id);
                }
            }
        }
    }

    /// Property: the batch path matches the single-entity path.
    #[test]
    fn batch_agrees_with_single(counts in population_strategy()) {
        let (store, entities) = store_with(&counts);
        let service = PopularityService::new(&store);
        let ranked = service
            .add_popularity_to_collection(EntityKind::Song, entities.clone())
            .expect("rank collection");
        prop_assert_eq!(ranked.len(), entities.len());
        for item in ranked {
            let single = service
                .calculate_popularity(EntityKind::Song, &item.entity)
                .expect("rank single");
            prop_assert_eq!(single, item.popularity_percentage);
        }
    }

    /// Property: the lowest read count ranks at 0 once there is competition.
    #[test]
    fn minimum_ranks_at_zero(counts in population_strategy()) {
        prop_assume!(counts.len() > 1);
        let (store, entities) = store_with(&counts);
        let service = PopularityService::new(&store);
        let bottom = entities
            .iter()
            .min_by(|a, b| a.read_count.total_cmp(&b.read_count))
            .expect("non-empty population");
        prop_assert_eq!(
            service.calculate_popularity(EntityKind::Song, bottom).expect("rank bottom"),
            0
        );
    }
}
