//! SQLite-backed expiring markers shared between processes.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Mutex,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use rusqlite::{Connection, params};

use crate::{Clock, SystemClock};

use super::{CacheError, ExpiringCache};

/// [`ExpiringCache`] persisted in a `cache_markers` table.
///
/// The check-and-set is one `INSERT … ON CONFLICT DO UPDATE … WHERE` statement:
/// the conflicting row is only overwritten when it has expired, and the
/// affected-row count tells the caller whether it won. Workers in separate
/// processes that open the same database therefore share markers. Expired
/// rows are purged on every claim so the table only holds live markers.
pub struct SqliteExpiringCache<C = SystemClock> {
    connection: Mutex<Connection>,
    location: PathBuf,
    clock: C,
}

impl<C> fmt::Debug for SqliteExpiringCache<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteExpiringCache")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl SqliteExpiringCache<SystemClock> {
    /// Open the marker table in the database at `path`.
    ///
    /// # Errors
    /// Returns [`CacheError`] when the database cannot be opened or the table
    /// cannot be created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        Self::open_with_clock(path, SystemClock)
    }
}

impl<C: Clock> SqliteExpiringCache<C> {
    /// Open the marker table, reading time from `clock`.
    ///
    /// # Errors
    /// Returns [`CacheError`] when the database cannot be opened or the table
    /// cannot be created.
    pub fn open_with_clock<P: AsRef<Path>>(path: P, clock: C) -> Result<Self, CacheError> {
        let location = path.as_ref().to_path_buf();
        let connection = Connection::open(&location)
            .map_err(|source| CacheError::backend("open marker database", source))?;
        connection
            .busy_timeout(Duration::from_secs(5))
            .map_err(|source| CacheError::backend("configure busy timeout", source))?;
        connection
            .execute(
                "CREATE TABLE IF NOT EXISTS cache_markers (
                    key TEXT PRIMARY KEY,
                    expires_at_ms INTEGER NOT NULL
                )",
                [],
            )
            .map_err(|source| CacheError::backend("create marker table", source))?;
        Ok(Self {
            connection: Mutex::new(connection),
            location,
            clock,
        })
    }

    fn now_ms(&self) -> Result<i64, CacheError> {
        millis_since_epoch(self.clock.now())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CacheError> {
        self.connection
            .lock()
            .map_err(|_| CacheError::backend("lock marker connection", "mutex poisoned"))
    }
}

impl<C: Clock> ExpiringCache for SqliteExpiringCache<C> {
    fn set_if_absent(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        let now = self.now_ms()?;
        let ttl_ms = i64::try_from(ttl.as_millis())
            .map_err(|source| CacheError::backend("convert marker ttl", source))?;
        let expires_at = now.saturating_add(ttl_ms);
        let connection = self.lock()?;
        connection
            .execute("DELETE FROM cache_markers WHERE expires_at_ms <= ?1", [now])
            .map_err(|source| CacheError::backend("purge expired markers", source))?;
        let changed = connection
            .execute(
                "INSERT INTO cache_markers (key, expires_at_ms) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET expires_at_ms = excluded.expires_at_ms
                 WHERE cache_markers.expires_at_ms <= ?3",
                params![key, expires_at, now],
            )
            .map_err(|source| CacheError::backend("set marker", source))?;
        Ok(changed == 1)
    }

    fn release(&self, key: &str) -> Result<(), CacheError> {
        self.lock()?
            .execute("DELETE FROM cache_markers WHERE key = ?1", [key])
            .map_err(|source| CacheError::backend("release marker", source))?;
        Ok(())
    }
}

fn millis_since_epoch(at: SystemTime) -> Result<i64, CacheError> {
    let since = at
        .duration_since(UNIX_EPOCH)
        .map_err(|source| CacheError::backend("read clock", source))?;
    i64::try_from(since.as_millis()).map_err(|source| CacheError::backend("read clock", source))
}
