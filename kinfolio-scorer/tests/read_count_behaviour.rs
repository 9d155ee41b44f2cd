//! Behavioural coverage for rank-aware read-count increments.

use std::{sync::Arc, time::Duration};

use kinfolio_core::{
    EntityKind, MemoryExpiringCache, ScoredEntity,
    test_support::{ManualClock, MemoryStore},
};
use kinfolio_scorer::{IncrementOutcome, ReadCountIncrementer};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

const AGED_SONGS: [(u64, u64); 5] = [(101, 5), (102, 20), (103, 45), (104, 75), (105, 120)];

type Incrementer =
    ReadCountIncrementer<Arc<MemoryStore>, MemoryExpiringCache<ManualClock>, ManualClock>;

/// Scenario state shared between steps.
struct ReadCountWorld {
    store: Arc<MemoryStore>,
    clock: ManualClock,
    incrementer: Incrementer,
}

#[fixture]
fn world() -> ReadCountWorld {
    let store = Arc::new(MemoryStore::default());
    let clock = ManualClock::default();
    let incrementer = ReadCountIncrementer::new(
        Arc::clone(&store),
        MemoryExpiringCache::with_clock(clock.clone()),
    )
    .with_clock(clock.clone());
    ReadCountWorld {
        store,
        clock,
        incrementer,
    }
}

impl ReadCountWorld {
    fn increment(&self, kind: EntityKind, id: u64) -> IncrementOutcome {
        self.incrementer
            .increment(kind, id)
            .unwrap_or_else(|err| panic!("increment {kind} {id}: {err}"))
    }

    #[expect(
        clippy::float_arithmetic,
        reason = "assertions compare floating-point read counts"
    )]
    fn assert_read_count(&self, kind: EntityKind, id: u64, expected: f64) {
        let actual = self
            .store
            .read_count(kind, id)
            .unwrap_or_else(|| panic!("{kind} {id} should exist"));
        assert!(
            (actual - expected).abs() < 1e-9,
            "{kind} {id}: expected read count {expected}, found {actual}"
        );
    }

    fn seed_popular_songs(&self) {
        for id in 1..=20_u64 {
            let count = f64::from(u32::try_from(210 - 10 * id).expect("small count"));
            let song = ScoredEntity::new(id, count)
                .expect("valid song")
                .with_created_at(self.clock.days_ago(1_000));
            self.store.insert(EntityKind::Song, song);
        }
    }

    fn seed_new_song(&self, id: u64, age_days: u64) {
        let song = ScoredEntity::new(id, 0.0)
            .expect("valid song")
            .with_created_at(self.clock.days_ago(age_days));
        self.store.insert(EntityKind::Song, song);
    }
}

#[given("page 1 with read count 0")]
fn unread_page(world: &ReadCountWorld) {
    world
        .store
        .insert(EntityKind::Page, ScoredEntity::new(1, 0.0).expect("valid page"));
}

#[given("20 books scored from 100 down to 5")]
fn twenty_books(world: &ReadCountWorld) {
    for id in 1..=20_u64 {
        let count = f64::from(u32::try_from(105 - 5 * id).expect("small count"));
        world
            .store
            .insert(EntityKind::Book, ScoredEntity::new(id, count).expect("valid book"));
    }
}

#[given("20 popular songs and a new song 100 created 5 days ago")]
fn popular_and_new_song(world: &ReadCountWorld) {
    world.seed_popular_songs();
    world.seed_new_song(100, 5);
}

#[given("20 popular songs and unplayed songs aged 5, 20, 45, 75 and 120 days")]
fn popular_and_aged_songs(world: &ReadCountWorld) {
    world.seed_popular_songs();
    for (id, age_days) in AGED_SONGS {
        world.seed_new_song(id, age_days);
    }
}

#[when("page 1 is viewed")]
fn view_page_one(world: &ReadCountWorld) {
    world.increment(EntityKind::Page, 1);
}

#[when("book 1 is viewed")]
fn view_book_one(world: &ReadCountWorld) {
    let outcome = world.increment(EntityKind::Book, 1);
    assert!(matches!(outcome, IncrementOutcome::Unchanged { .. }));
}

#[when("book 10 is viewed")]
fn view_book_ten(world: &ReadCountWorld) {
    world.increment(EntityKind::Book, 10);
}

#[when("book 16 is viewed")]
fn view_book_sixteen(world: &ReadCountWorld) {
    world.increment(EntityKind::Book, 16);
}

#[when("song 100 is played twice within a minute")]
fn play_song_twice(world: &ReadCountWorld) {
    world.increment(EntityKind::Song, 100);
    world.clock.advance(Duration::from_secs(30));
    assert_eq!(
        world.increment(EntityKind::Song, 100),
        IncrementOutcome::Deduplicated
    );
}

#[when("each aged song is played once")]
fn play_aged_songs(world: &ReadCountWorld) {
    for (id, _) in AGED_SONGS {
        world.increment(EntityKind::Song, id);
    }
}

#[when("song 1 is played")]
fn play_song_one(world: &ReadCountWorld) {
    world.increment(EntityKind::Song, 1);
}

#[when("song 100 is played, five minutes pass, and it is played again")]
fn play_song_after_expiry(world: &ReadCountWorld) {
    world.increment(EntityKind::Song, 100);
    world.clock.advance(Duration::from_secs(5 * 60));
    let outcome = world.increment(EntityKind::Song, 100);
    assert!(matches!(outcome, IncrementOutcome::Applied { .. }));
}

#[then("page 1 has read count 1")]
fn page_one_is_one(world: &ReadCountWorld) {
    world.assert_read_count(EntityKind::Page, 1, 1.0);
}

#[then("book 1 has read count 100")]
fn book_one_unchanged(world: &ReadCountWorld) {
    world.assert_read_count(EntityKind::Book, 1, 100.0);
}

#[then("book 10 has read count 55.1")]
fn book_ten_bumped(world: &ReadCountWorld) {
    world.assert_read_count(EntityKind::Book, 10, 55.1);
}

#[then("book 16 has read count 26")]
fn book_sixteen_bumped(world: &ReadCountWorld) {
    world.assert_read_count(EntityKind::Book, 16, 26.0);
}

#[then("song 100 has read count 3")]
fn song_counted_once(world: &ReadCountWorld) {
    world.assert_read_count(EntityKind::Song, 100, 3.0);
}

#[then("the aged songs score 3.0, 2.0, 1.5, 1.2 and 1.0")]
fn aged_song_scores(world: &ReadCountWorld) {
    let expected = [3.0, 2.0, 1.5, 1.2, 1.0];
    for ((id, _), score) in AGED_SONGS.into_iter().zip(expected) {
        world.assert_read_count(EntityKind::Song, id, score);
    }
}

#[then("song 1 has read count 200.1")]
fn song_one_bumped(world: &ReadCountWorld) {
    world.assert_read_count(EntityKind::Song, 1, 200.1);
}

#[then("song 100 has read count 6")]
fn song_counted_twice(world: &ReadCountWorld) {
    world.assert_read_count(EntityKind::Song, 100, 6.0);
}

#[scenario(path = "tests/features/read_count.feature", index = 0)]
fn cold_start(world: ReadCountWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/read_count.feature", index = 1)]
fn top_three_freeze(world: ReadCountWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/read_count.feature", index = 2)]
fn ranked_books_grow_slowly(world: ReadCountWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/read_count.feature", index = 3)]
fn unranked_books_grow_by_one(world: ReadCountWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/read_count.feature", index = 4)]
fn song_dedup(world: ReadCountWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/read_count.feature", index = 5)]
fn song_age_tiers(world: ReadCountWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/read_count.feature", index = 6)]
fn song_top_twenty(world: ReadCountWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/read_count.feature", index = 7)]
fn song_dedup_expiry(world: ReadCountWorld) {
    let _ = world;
}
