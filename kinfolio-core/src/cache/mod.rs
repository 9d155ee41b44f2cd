//! Expiring markers used to suppress duplicate increments.
//!
//! A marker is a short-lived key. Setting it is an atomic check-and-set: the
//! caller learns in one step whether it created the marker or found a live
//! one already in place, so two workers can never both pass the check.

use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, SystemTime},
};

use thiserror::Error;

use crate::{Clock, EntityKind, SystemClock};

#[cfg(feature = "store-sqlite")]
mod sqlite;

#[cfg(feature = "store-sqlite")]
pub use sqlite::SqliteExpiringCache;

/// Errors raised by [`ExpiringCache`] implementations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache backend could not be reached or failed the operation.
    #[error("expiring cache failed to {operation}: {source}")]
    Backend {
        /// Description of the failed operation.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl CacheError {
    /// Wrap a backend failure.
    pub fn backend<E>(operation: &'static str, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self::Backend {
            operation,
            source: source.into(),
        }
    }
}

/// Shared key/marker store with per-key expiry.
pub trait ExpiringCache: Send + Sync {
    /// Create `key` with the given time to live unless a live marker exists.
    ///
    /// Returns `true` when this call created the marker and `false` when an
    /// unexpired marker was already present. Expired markers count as absent.
    ///
    /// # Errors
    /// Returns [`CacheError`] when the backend fails.
    fn set_if_absent(&self, key: &str, ttl: Duration) -> Result<bool, CacheError>;

    /// Remove `key` so the next [`set_if_absent`](Self::set_if_absent)
    /// succeeds.
    ///
    /// # Errors
    /// Returns [`CacheError`] when the backend fails.
    fn release(&self, key: &str) -> Result<(), CacheError>;
}

impl<C: ExpiringCache + ?Sized> ExpiringCache for std::sync::Arc<C> {
    fn set_if_absent(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        (**self).set_if_absent(key, ttl)
    }

    fn release(&self, key: &str) -> Result<(), CacheError> {
        (**self).release(key)
    }
}

impl<C: ExpiringCache + ?Sized> ExpiringCache for &C {
    fn set_if_absent(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        (**self).set_if_absent(key, ttl)
    }

    fn release(&self, key: &str) -> Result<(), CacheError> {
        (**self).release(key)
    }
}

/// Build the marker key guarding increments of one entity.
///
/// # Examples
///
/// ```
/// use kinfolio_core::{EntityKind, marker_key};
///
/// assert_eq!(marker_key(EntityKind::Song, 42), "read-count:song:42");
/// ```
#[must_use]
pub fn marker_key(kind: EntityKind, id: u64) -> String {
    format!("read-count:{kind}:{id}")
}

/// Process-local [`ExpiringCache`].
///
/// Suitable when every worker lives in one process. Expired markers are
/// pruned lazily on each write.
#[derive(Debug)]
pub struct MemoryExpiringCache<C = SystemClock> {
    markers: Mutex<HashMap<String, SystemTime>>,
    clock: C,
}

impl Default for MemoryExpiringCache<SystemClock> {
    fn default() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<C: Clock> MemoryExpiringCache<C> {
    /// Create an empty cache reading time from `clock`.
    pub fn with_clock(clock: C) -> Self {
        Self {
            markers: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Number of markers that have not yet expired.
    ///
    /// # Errors
    /// Returns [`CacheError`] when the marker map is poisoned.
    pub fn live_markers(&self) -> Result<usize, CacheError> {
        let now = self.clock.now();
        let markers = self.lock()?;
        Ok(markers.values().filter(|expiry| **expiry > now).count())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, SystemTime>>, CacheError> {
        self.markers
            .lock()
            .map_err(|_| CacheError::backend("lock marker map", PoisonedMarkers))
    }
}

#[derive(Debug, Error)]
#[error("marker map mutex was poisoned")]
struct PoisonedMarkers;

impl<C: Clock> ExpiringCache for MemoryExpiringCache<C> {
    fn set_if_absent(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        let now = self.clock.now();
        let expires_at = now.checked_add(ttl).unwrap_or(now);
        let mut markers = self.lock()?;
        markers.retain(|_, expiry| *expiry > now);
        if markers.contains_key(key) {
            return Ok(false);
        }
        markers.insert(key.to_owned(), expires_at);
        Ok(true)
    }

    fn release(&self, key: &str) -> Result<(), CacheError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ManualClock;
    use rstest::{fixture, rstest};

    const TTL: Duration = Duration::from_secs(300);

    #[fixture]
    fn clock() -> ManualClock {
        ManualClock::default()
    }

    #[rstest]
    fn second_set_within_ttl_is_rejected(clock: ManualClock) {
        let cache = MemoryExpiringCache::with_clock(clock);
        assert!(cache.set_if_absent("k", TTL).expect("first set"));
        assert!(!cache.set_if_absent("k", TTL).expect("second set"));
    }

    #[rstest]
    fn marker_expires_after_ttl(clock: ManualClock) {
        let cache = MemoryExpiringCache::with_clock(clock.clone());
        assert!(cache.set_if_absent("k", TTL).expect("first set"));
        clock.advance(Duration::from_secs(299));
        assert!(!cache.set_if_absent("k", TTL).expect("still live"));
        clock.advance(Duration::from_secs(1));
        assert!(cache.set_if_absent("k", TTL).expect("expired"));
    }

    #[rstest]
    fn keys_are_independent(clock: ManualClock) {
        let cache = MemoryExpiringCache::with_clock(clock);
        assert!(cache.set_if_absent("a", TTL).expect("set a"));
        assert!(cache.set_if_absent("b", TTL).expect("set b"));
        assert_eq!(cache.live_markers().expect("count"), 2);
    }

    #[rstest]
    fn release_allows_immediate_reuse(clock: ManualClock) {
        let cache = MemoryExpiringCache::with_clock(clock);
        assert!(cache.set_if_absent("k", TTL).expect("set"));
        cache.release("k").expect("release");
        assert!(cache.set_if_absent("k", TTL).expect("set again"));
    }

    #[rstest]
    fn concurrent_setters_have_one_winner() {
        let cache = std::sync::Arc::new(MemoryExpiringCache::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shared = std::sync::Arc::clone(&cache);
                std::thread::spawn(move || shared.set_if_absent("song", TTL).expect("set"))
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|handle| handle.join().expect("join"))
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
