//! Wall-clock access for age and expiry calculations.

use std::time::SystemTime;

/// Source of the current time.
///
/// Song age bonuses and dedup marker expiry both depend on "now". Routing
/// those reads through a trait keeps the calculations deterministic in tests.
pub trait Clock: Send + Sync {
    /// Return the current time.
    fn now(&self) -> SystemTime;
}

/// [`Clock`] backed by [`SystemTime::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> SystemTime {
        (**self).now()
    }
}
