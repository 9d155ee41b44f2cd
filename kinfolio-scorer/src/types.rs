//! Public configuration and output types for ranking and incrementing.
#![forbid(unsafe_code)]

use std::time::Duration;

use kinfolio_core::{EntityKind, ScoredEntity};
use serde::Serialize;

/// How long a song's dedup marker suppresses repeat increments.
pub const SONG_DEDUP_TTL: Duration = Duration::from_secs(5 * 60);

/// An entity annotated with its popularity percentile.
///
/// Produced for display; the persisted entity is not modified.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopularEntity {
    /// The entity as read from the store.
    #[serde(flatten)]
    pub entity: ScoredEntity,
    /// Percentile rank in `0..=100` among all entities of the same kind.
    pub popularity_percentage: u8,
}

/// One row of an age bonus table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgeTier {
    /// Inclusive upper bound on the entity's age in whole days.
    pub max_age_days: u64,
    /// Increment applied when the age falls within this tier.
    pub bonus: f64,
}

/// Age-based increments for entities outside the ranked set.
///
/// Tiers are checked from youngest to oldest; the first tier whose
/// `max_age_days` is at least the entity's age wins. Older entities receive
/// the fallback bonus.
///
/// # Examples
///
/// ```
/// use kinfolio_scorer::AgeTiers;
///
/// let tiers = AgeTiers::standard();
/// assert_eq!(tiers.bonus_for(7), 3.0);
/// assert_eq!(tiers.bonus_for(8), 2.0);
/// assert_eq!(tiers.bonus_for(365), 1.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AgeTiers {
    tiers: Vec<AgeTier>,
    fallback: f64,
}

impl AgeTiers {
    /// Build a table from `tiers` and the bonus for anything older.
    #[must_use]
    pub fn new(mut tiers: Vec<AgeTier>, fallback: f64) -> Self {
        tiers.sort_by_key(|tier| tier.max_age_days);
        Self { tiers, fallback }
    }

    /// The song bonus table: fresh uploads get the biggest push.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(
            vec![
                AgeTier {
                    max_age_days: 7,
                    bonus: 3.0,
                },
                AgeTier {
                    max_age_days: 30,
                    bonus: 2.0,
                },
                AgeTier {
                    max_age_days: 60,
                    bonus: 1.5,
                },
                AgeTier {
                    max_age_days: 90,
                    bonus: 1.2,
                },
            ],
            1.0,
        )
    }

    /// Bonus for an entity `age_days` whole days old.
    #[must_use]
    pub fn bonus_for(&self, age_days: u64) -> f64 {
        self.tiers
            .iter()
            .find(|tier| age_days <= tier.max_age_days)
            .map_or(self.fallback, |tier| tier.bonus)
    }
}

/// Increment applied to entities outside the top-N snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum UnrankedIncrement {
    /// The same increment regardless of age.
    Flat(f64),
    /// An increment chosen by the entity's age.
    AgeTiers(AgeTiers),
}

/// Where an entity sat when its increment was computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "tier", rename_all = "snake_case")]
pub enum RankTier {
    /// First ever view; ranking was not consulted.
    ColdStart,
    /// Within the frozen head of the ranking (1-based `rank`).
    Frozen {
        /// Position in the snapshot, starting at 1.
        rank: usize,
    },
    /// Within the top-N snapshot but below the frozen head.
    Ranked {
        /// Position in the snapshot, starting at 1.
        rank: usize,
    },
    /// Outside the top-N snapshot.
    Unranked,
}

/// Parameters of the rank-aware increment for one entity kind.
///
/// Books and pages share [`RankPolicy::books_and_pages`]; songs use
/// [`RankPolicy::songs`]. The two differ on purpose: books and pages stop
/// growing once they reach the top three, while songs keep a small flat
/// increment in the top twenty and reward newness outside it.
#[derive(Debug, Clone, PartialEq)]
pub struct RankPolicy {
    /// Size of the ranking snapshot.
    pub top_n: usize,
    /// Number of leading ranks that receive `frozen_increment`.
    pub freeze_top: usize,
    /// Increment for the frozen head of the ranking.
    pub frozen_increment: f64,
    /// Increment for the rest of the snapshot.
    pub ranked_increment: f64,
    /// Increment for everything outside the snapshot.
    pub unranked: UnrankedIncrement,
    /// Increment for never-viewed entities, skipping the ranking query.
    pub cold_start: Option<f64>,
    /// Lifetime of the marker suppressing repeat increments, when throttled.
    pub dedup_ttl: Option<Duration>,
}

impl RankPolicy {
    /// Policy shared by books and pages.
    #[must_use]
    pub const fn books_and_pages() -> Self {
        Self {
            top_n: 15,
            freeze_top: 3,
            frozen_increment: 0.0,
            ranked_increment: 0.1,
            unranked: UnrankedIncrement::Flat(1.0),
            cold_start: Some(1.0),
            dedup_ttl: None,
        }
    }

    /// Policy for songs.
    #[must_use]
    pub fn songs() -> Self {
        Self {
            top_n: 20,
            freeze_top: 0,
            frozen_increment: 0.0,
            ranked_increment: 0.1,
            unranked: UnrankedIncrement::AgeTiers(AgeTiers::standard()),
            cold_start: None,
            dedup_ttl: Some(SONG_DEDUP_TTL),
        }
    }

    /// Default policy for `kind`.
    #[must_use]
    pub fn for_kind(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Book | EntityKind::Page => Self::books_and_pages(),
            EntityKind::Song => Self::songs(),
        }
    }

    /// Place `id` within the `top_ids` snapshot.
    #[must_use]
    pub fn classify(&self, id: u64, top_ids: &[u64]) -> RankTier {
        match top_ids.iter().position(|candidate| *candidate == id) {
            Some(index) if index < self.freeze_top => RankTier::Frozen { rank: index + 1 },
            Some(index) => RankTier::Ranked { rank: index + 1 },
            None => RankTier::Unranked,
        }
    }

    /// Increment owed to an entity in `tier` that is `age_days` old.
    #[must_use]
    pub fn delta_for(&self, tier: RankTier, age_days: u64) -> f64 {
        match tier {
            RankTier::ColdStart => self.cold_start.unwrap_or(0.0),
            RankTier::Frozen { .. } => self.frozen_increment,
            RankTier::Ranked { .. } => self.ranked_increment,
            RankTier::Unranked => match &self.unranked {
                UnrankedIncrement::Flat(bonus) => *bonus,
                UnrankedIncrement::AgeTiers(tiers) => tiers.bonus_for(age_days),
            },
        }
    }
}

/// The policy for each entity kind.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicySet {
    /// Policy applied to books.
    pub book: RankPolicy,
    /// Policy applied to pages.
    pub page: RankPolicy,
    /// Policy applied to songs.
    pub song: RankPolicy,
}

impl Default for PolicySet {
    fn default() -> Self {
        Self {
            book: RankPolicy::for_kind(EntityKind::Book),
            page: RankPolicy::for_kind(EntityKind::Page),
            song: RankPolicy::for_kind(EntityKind::Song),
        }
    }
}

impl PolicySet {
    /// Policy for `kind`.
    #[must_use]
    pub const fn get(&self, kind: EntityKind) -> &RankPolicy {
        match kind {
            EntityKind::Book => &self.book,
            EntityKind::Page => &self.page,
            EntityKind::Song => &self.song,
        }
    }
}
