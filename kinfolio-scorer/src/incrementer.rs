//! Rank-aware read-count increments.
//!
//! One [`ReadCountIncrementer`] serves every entity kind. The behaviour that
//! differs between books, pages and songs lives entirely in the
//! [`RankPolicy`] selected for the kind.
#![forbid(unsafe_code)]

use std::{sync::Arc, time::SystemTime};

use kinfolio_core::{
    Clock, EntityKind, ExpiringCache, IncrementTask, RecordStore, StoreError, SystemClock,
    marker_key,
};
use log::{debug, info, warn};

use crate::{IncrementError, PolicySet, RankPolicy, RankTier};

const SECONDS_PER_DAY: u64 = 86_400;

/// Result of handling one increment signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IncrementOutcome {
    /// The read count grew by `delta`.
    Applied {
        /// Why this delta was chosen.
        tier: RankTier,
        /// Amount added to the read count.
        delta: f64,
    },
    /// The policy assigned no increment, as for the frozen top ranks.
    Unchanged {
        /// Where the entity sat in the ranking.
        tier: RankTier,
    },
    /// A live dedup marker suppressed the increment.
    Deduplicated,
    /// The entity no longer exists.
    Missing,
}

/// Executes increment tasks pulled from a queue.
pub trait IncrementHandler: Send + Sync {
    /// Apply the increment described by `task`.
    ///
    /// # Errors
    /// Returns [`IncrementError`] when storage or the dedup cache fails. Use
    /// [`IncrementError::is_transient`] to decide whether to retry.
    fn handle(&self, task: IncrementTask) -> Result<IncrementOutcome, IncrementError>;
}

impl<H: IncrementHandler + ?Sized> IncrementHandler for Arc<H> {
    fn handle(&self, task: IncrementTask) -> Result<IncrementOutcome, IncrementError> {
        (**self).handle(task)
    }
}

/// Whole days between `created_at` and `now`, rounded down.
///
/// A missing creation time, or one in the future, counts as zero days.
///
/// # Examples
///
/// ```
/// use std::time::{Duration, UNIX_EPOCH};
/// use kinfolio_scorer::age_in_days;
///
/// let now = UNIX_EPOCH + Duration::from_secs(10 * 86_400);
/// let created = UNIX_EPOCH + Duration::from_secs(86_400 + 1);
/// assert_eq!(age_in_days(Some(created), now), 8);
/// assert_eq!(age_in_days(None, now), 0);
/// ```
#[must_use]
pub fn age_in_days(created_at: Option<SystemTime>, now: SystemTime) -> u64 {
    created_at
        .and_then(|created| now.duration_since(created).ok())
        .map_or(0, |age| {
            age.as_secs().checked_div(SECONDS_PER_DAY).unwrap_or(0)
        })
}

/// Applies rank-aware increments through a [`RecordStore`].
///
/// Each call re-reads the entity and a fresh top-N snapshot, so concurrent
/// increments of different entities see slightly stale rankings. The delta
/// itself is always written with
/// [`RecordStore::increment_read_count`], so concurrent increments of the
/// same entity never lose an update.
///
/// Kinds whose policy sets a `dedup_ttl` are throttled through the
/// [`ExpiringCache`]. When a transient failure follows a successful marker
/// set, the marker is released again so the queue's retry is not mistaken
/// for a duplicate.
#[derive(Debug)]
pub struct ReadCountIncrementer<S, C, K = SystemClock> {
    store: S,
    cache: C,
    clock: K,
    policies: PolicySet,
}

impl<S: RecordStore, C: ExpiringCache> ReadCountIncrementer<S, C> {
    /// Create an incrementer with the default policies and the system clock.
    pub fn new(store: S, cache: C) -> Self {
        Self {
            store,
            cache,
            clock: SystemClock,
            policies: PolicySet::default(),
        }
    }
}

impl<S, C, K> ReadCountIncrementer<S, C, K> {
    /// Replace the clock used to compute entity ages.
    pub fn with_clock<K2: Clock>(self, clock: K2) -> ReadCountIncrementer<S, C, K2> {
        ReadCountIncrementer {
            store: self.store,
            cache: self.cache,
            clock,
            policies: self.policies,
        }
    }

    /// Replace the per-kind policies.
    #[must_use]
    pub fn with_policies(mut self, policies: PolicySet) -> Self {
        self.policies = policies;
        self
    }

    /// The store increments are written to.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The policies in force.
    pub const fn policies(&self) -> &PolicySet {
        &self.policies
    }
}

impl<S: RecordStore, C: ExpiringCache, K: Clock> ReadCountIncrementer<S, C, K> {
    /// Apply one "viewed" or "played" signal to entity `id` of `kind`.
    ///
    /// # Errors
    /// Returns [`IncrementError`] when the store or the dedup cache fails.
    /// A missing entity is reported as [`IncrementOutcome::Missing`].
    pub fn increment(&self, kind: EntityKind, id: u64) -> Result<IncrementOutcome, IncrementError> {
        let policy = self.policies.get(kind);
        let marker = match policy.dedup_ttl {
            Some(ttl) => {
                let key = marker_key(kind, id);
                if !self.cache.set_if_absent(&key, ttl)? {
                    info!("skipping {kind} {id}: already counted within {ttl:?}");
                    return Ok(IncrementOutcome::Deduplicated);
                }
                Some(key)
            }
            None => None,
        };

        let result = self.apply(kind, id, policy);
        if let (Err(err), Some(key)) = (&result, &marker)
            && err.is_transient()
            && let Err(release_err) = self.cache.release(key)
        {
            warn!("failed to release dedup marker {key} after {err}: {release_err}");
        }
        result
    }

    fn apply(
        &self,
        kind: EntityKind,
        id: u64,
        policy: &RankPolicy,
    ) -> Result<IncrementOutcome, IncrementError> {
        let Some(entity) = self.store.get(kind, id)? else {
            info!("{kind} {id} no longer exists; dropping increment");
            return Ok(IncrementOutcome::Missing);
        };

        let tier = if policy.cold_start.is_some() && entity.is_unread() {
            RankTier::ColdStart
        } else {
            let top_ids = self.store.top_ids_by_read_count(kind, policy.top_n)?;
            policy.classify(id, &top_ids)
        };
        let age_days = age_in_days(entity.created_at, self.clock.now());
        let delta = policy.delta_for(tier, age_days);

        if !delta.is_finite() || delta <= 0.0 {
            debug!("{kind} {id} is {tier:?}; read count stays at {}", entity.read_count);
            return Ok(IncrementOutcome::Unchanged { tier });
        }

        if let Err(err) = self.store.increment_read_count(kind, id, delta) {
            return match err {
                StoreError::NotFound { .. } => {
                    info!("{kind} {id} was deleted before its increment landed");
                    Ok(IncrementOutcome::Missing)
                }
                other => Err(other.into()),
            };
        }
        debug!("{kind} {id} is {tier:?} at {age_days} days old; added {delta}");
        Ok(IncrementOutcome::Applied { tier, delta })
    }
}

impl<S: RecordStore, C: ExpiringCache, K: Clock> IncrementHandler
    for ReadCountIncrementer<S, C, K>
{
    fn handle(&self, task: IncrementTask) -> Result<IncrementOutcome, IncrementError> {
        self.increment(task.kind, task.id)
    }
}
