//! Unit coverage for percentile and policy helpers.
#![forbid(unsafe_code)]

use std::time::Duration;

use kinfolio_core::{EntityKind, ScoredEntity, test_support::MemoryStore};
use rstest::rstest;

use crate::{
    AgeTier, AgeTiers, PolicySet, PopularityService, RankPolicy, RankTier, UnrankedIncrement,
    count_below_sorted, percentile,
};

#[rstest]
#[case(0, 0, 0)]
#[case(0, 1, 100)]
#[case(0, 5, 0)]
#[case(4, 5, 100)]
#[case(1, 3, 50)]
#[case(1, 8, 14)]
#[case(1, 200, 1)]
#[case(199, 200, 100)]
fn percentile_rounds_half_up(#[case] lower: u64, #[case] total: u64, #[case] expected: u8) {
    assert_eq!(percentile(lower, total), expected);
}

#[rstest]
fn percentile_clamps_inconsistent_counts() {
    assert_eq!(percentile(10, 3), 100);
    assert_eq!(percentile(u64::MAX, u64::MAX), 100);
}

#[rstest]
fn count_below_sorted_ignores_ties() {
    let sorted = [0.0, 1.0, 1.0, 1.0, 4.5];
    assert_eq!(count_below_sorted(&sorted, 1.0), 1);
    assert_eq!(count_below_sorted(&sorted, 0.0), 0);
    assert_eq!(count_below_sorted(&sorted, 9.0), 5);
    assert_eq!(count_below_sorted(&[], 3.0), 0);
}

#[rstest]
#[case(0, 3.0)]
#[case(7, 3.0)]
#[case(8, 2.0)]
#[case(30, 2.0)]
#[case(31, 1.5)]
#[case(60, 1.5)]
#[case(61, 1.2)]
#[case(90, 1.2)]
#[case(91, 1.0)]
fn standard_age_tiers(#[case] age_days: u64, #[case] expected: f64) {
    assert_eq!(AgeTiers::standard().bonus_for(age_days), expected);
}

#[rstest]
fn age_tiers_sort_their_rows() {
    let tiers = AgeTiers::new(
        vec![
            AgeTier {
                max_age_days: 30,
                bonus: 2.0,
            },
            AgeTier {
                max_age_days: 1,
                bonus: 5.0,
            },
        ],
        0.5,
    );
    assert_eq!(tiers.bonus_for(0), 5.0);
    assert_eq!(tiers.bonus_for(2), 2.0);
    assert_eq!(tiers.bonus_for(31), 0.5);
}

#[rstest]
fn books_freeze_the_top_three() {
    let policy = RankPolicy::books_and_pages();
    let top: Vec<u64> = (1..=15).collect();
    assert_eq!(policy.classify(3, &top), RankTier::Frozen { rank: 3 });
    assert_eq!(policy.classify(4, &top), RankTier::Ranked { rank: 4 });
    assert_eq!(policy.classify(16, &top), RankTier::Unranked);
    assert_eq!(policy.delta_for(RankTier::Frozen { rank: 1 }, 0), 0.0);
    assert_eq!(policy.delta_for(RankTier::Unranked, 400), 1.0);
}

#[rstest]
fn songs_never_freeze() {
    let policy = RankPolicy::songs();
    assert_eq!(policy.classify(7, &[7, 8]), RankTier::Ranked { rank: 1 });
    assert_eq!(policy.delta_for(RankTier::Ranked { rank: 1 }, 400), 0.1);
    assert_eq!(policy.delta_for(RankTier::Unranked, 45), 1.5);
    assert_eq!(policy.dedup_ttl, Some(Duration::from_secs(300)));
    assert!(policy.cold_start.is_none());
}

#[rstest]
fn policy_set_selects_by_kind() {
    let policies = PolicySet::default();
    assert_eq!(policies.get(EntityKind::Book), &RankPolicy::books_and_pages());
    assert_eq!(policies.get(EntityKind::Page), &RankPolicy::books_and_pages());
    assert!(matches!(
        policies.get(EntityKind::Song).unranked,
        UnrankedIncrement::AgeTiers(_)
    ));
}

#[rstest]
fn empty_collection_skips_the_store() {
    let store = MemoryStore::default();
    store.fail_next(1);
    let service = PopularityService::new(&store);
    let ranked = service
        .add_popularity_to_collection(EntityKind::Page, Vec::new())
        .expect("empty collection");
    assert!(ranked.is_empty());
}

#[rstest]
fn store_failures_surface_as_errors() {
    let store = MemoryStore::default();
    store.fail_next(1);
    let service = PopularityService::new(&store);
    let entity = ScoredEntity::new(1, 1.0).expect("valid page");
    assert!(service.calculate_popularity(EntityKind::Page, &entity).is_err());
}

#[rstest]
fn popular_entities_serialise_flat() {
    let store = MemoryStore::with_entities(
        EntityKind::Book,
        [ScoredEntity::new(1, 2.0).expect("valid book")],
    );
    let ranked = PopularityService::new(&store)
        .add_popularity_to_collection(
            EntityKind::Book,
            vec![ScoredEntity::new(1, 2.0).expect("valid book")],
        )
        .expect("ranked");
    let json = serde_json::to_value(&ranked).expect("serialise");
    assert_eq!(json[0]["id"], 1);
    assert_eq!(json[0]["popularity_percentage"], 100);
}
