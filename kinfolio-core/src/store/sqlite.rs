//! SQLite-backed record store for books, pages and songs.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use log::debug;
use rusqlite::{Connection, OptionalExtension, Row, params};
use thiserror::Error;

use crate::{EntityKind, ScoredEntity};

use super::{RecordStore, StoreError};

/// How long a write waits for another connection's lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Error raised while opening or preparing the SQLite database.
#[derive(Debug, Error)]
pub enum SqliteRecordStoreError {
    /// Opening the SQLite database failed.
    #[error("failed to open SQLite database at {path}: {source}")]
    OpenDatabase {
        /// Location of the SQLite database on disk.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// Creating the entity tables failed.
    #[error("failed to create the {table} table: {source}")]
    CreateSchema {
        /// Table being created.
        table: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// Seeding an entity failed.
    #[error("failed to insert {kind} {id}: {source}")]
    Insert {
        /// Kind of the entity being inserted.
        kind: EntityKind,
        /// Identifier of the entity being inserted.
        id: u64,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// An entity field could not be represented in SQLite.
    #[error("{field} of {kind} {id} cannot be stored in SQLite")]
    OutOfRange {
        /// Kind of the entity being inserted.
        kind: EntityKind,
        /// Identifier of the entity being inserted.
        id: u64,
        /// Offending field.
        field: &'static str,
    },
    /// Generic SQLite error when reading rows.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Error used when a worker panicked while holding the connection.
#[derive(Debug, Error)]
#[error("SQLite connection mutex was poisoned")]
struct PoisonedConnection;

/// Record store backed by a single SQLite connection.
///
/// The connection sits behind a mutex so the store can be shared across
/// worker threads. Every increment is a single `UPDATE` that adds the delta
/// in place, so concurrent increments of one entity never lose an update.
pub struct SqliteRecordStore {
    connection: Mutex<Connection>,
    location: Option<PathBuf>,
}

impl fmt::Debug for SqliteRecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteRecordStore")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl SqliteRecordStore {
    /// Open (or create) the database at `path` and ensure the entity tables
    /// exist.
    ///
    /// # Errors
    /// Returns [`SqliteRecordStoreError`] when the database cannot be opened
    /// or the schema cannot be created.
    pub fn open<P>(path: P) -> Result<Self, SqliteRecordStoreError>
    where
        P: AsRef<Path>,
    {
        let database_path = path.as_ref();
        let connection =
            Connection::open(database_path).map_err(|source| {
                SqliteRecordStoreError::OpenDatabase {
                    path: database_path.to_path_buf(),
                    source,
                }
            })?;
        connection
            .busy_timeout(BUSY_TIMEOUT)
            .map_err(|source| SqliteRecordStoreError::OpenDatabase {
                path: database_path.to_path_buf(),
                source,
            })?;
        Self::with_connection(connection, Some(database_path.to_path_buf()))
    }

    /// Create a private in-memory database with the entity tables.
    ///
    /// # Errors
    /// Returns [`SqliteRecordStoreError`] when the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, SqliteRecordStoreError> {
        let connection =
            Connection::open_in_memory().map_err(|source| SqliteRecordStoreError::OpenDatabase {
                path: PathBuf::from(":memory:"),
                source,
            })?;
        Self::with_connection(connection, None)
    }

    fn with_connection(
        connection: Connection,
        location: Option<PathBuf>,
    ) -> Result<Self, SqliteRecordStoreError> {
        initialise_schema(&connection)?;
        debug!("opened record store at {location:?}");
        Ok(Self {
            connection: Mutex::new(connection),
            location,
        })
    }

    /// Location of the underlying database, or `None` when in memory.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Insert or replace an entity.
    ///
    /// # Errors
    /// Returns [`SqliteRecordStoreError`] when the row cannot be written.
    pub fn insert(
        &self,
        kind: EntityKind,
        entity: &ScoredEntity,
    ) -> Result<(), SqliteRecordStoreError> {
        let id = id_to_sql(entity.id).ok_or(SqliteRecordStoreError::OutOfRange {
            kind,
            id: entity.id,
            field: "id",
        })?;
        let created_at = entity
            .created_at
            .map(|at| {
                system_time_to_secs(at).ok_or(SqliteRecordStoreError::OutOfRange {
                    kind,
                    id: entity.id,
                    field: "created_at",
                })
            })
            .transpose()?;
        let connection = self.lock()?;
        let sql = format!(
            "INSERT OR REPLACE INTO {} (id, read_count, created_at) VALUES (?1, ?2, ?3)",
            kind.table()
        );
        connection
            .execute(&sql, params![id, entity.read_count, created_at])
            .map_err(|source| SqliteRecordStoreError::Insert {
                kind,
                id: entity.id,
                source,
            })?;
        Ok(())
    }

    /// List every entity of `kind`, highest read count first.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the rows cannot be read or violate the
    /// entity invariants.
    pub fn list(&self, kind: EntityKind) -> Result<Vec<ScoredEntity>, StoreError> {
        let connection = self.lock()?;
        let sql = format!(
            "SELECT id, read_count, created_at FROM {} ORDER BY read_count DESC, id ASC",
            kind.table()
        );
        let mut statement = connection
            .prepare(&sql)
            .map_err(|source| StoreError::backend("prepare entity listing", source))?;
        let mut rows = statement
            .query([])
            .map_err(|source| StoreError::backend("list entities", source))?;
        let mut entities = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|source| StoreError::backend("read entity row", source))?
        {
            entities.push(entity_from_row(kind, row)?);
        }
        Ok(entities)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.connection
            .lock()
            .map_err(|_| StoreError::backend("lock connection", PoisonedConnection))
    }

    fn write(
        &self,
        kind: EntityKind,
        id: u64,
        sql: &str,
        value: f64,
        operation: &'static str,
    ) -> Result<(), StoreError> {
        let Some(sql_id) = id_to_sql(id) else {
            return Err(StoreError::NotFound { kind, id });
        };
        let connection = self.lock()?;
        let changed = connection
            .execute(sql, params![value, sql_id])
            .map_err(|source| StoreError::backend(operation, source))?;
        if changed == 0 {
            return Err(StoreError::NotFound { kind, id });
        }
        Ok(())
    }
}

impl RecordStore for SqliteRecordStore {
    fn get(&self, kind: EntityKind, id: u64) -> Result<Option<ScoredEntity>, StoreError> {
        let Some(sql_id) = id_to_sql(id) else {
            return Ok(None);
        };
        let connection = self.lock()?;
        let sql = format!(
            "SELECT id, read_count, created_at FROM {} WHERE id = ?1",
            kind.table()
        );
        let raw = connection
            .query_row(&sql, [sql_id], RawEntity::from_row)
            .optional()
            .map_err(|source| StoreError::backend("fetch entity", source))?;
        raw.map(|entity| entity.into_entity(kind)).transpose()
    }

    fn count(&self, kind: EntityKind) -> Result<u64, StoreError> {
        let connection = self.lock()?;
        let sql = format!("SELECT COUNT(*) FROM {}", kind.table());
        let count: i64 = connection
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|source| StoreError::backend("count entities", source))?;
        u64::try_from(count).map_err(|source| StoreError::backend("count entities", source))
    }

    fn count_below(&self, kind: EntityKind, read_count: f64) -> Result<u64, StoreError> {
        let connection = self.lock()?;
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE COALESCE(read_count, 0) < ?1",
            kind.table()
        );
        let count: i64 = connection
            .query_row(&sql, [read_count], |row| row.get(0))
            .map_err(|source| StoreError::backend("count lower entities", source))?;
        u64::try_from(count).map_err(|source| StoreError::backend("count lower entities", source))
    }

    fn top_ids_by_read_count(
        &self,
        kind: EntityKind,
        limit: usize,
    ) -> Result<Vec<u64>, StoreError> {
        let sql_limit =
            i64::try_from(limit).map_err(|source| StoreError::backend("rank entities", source))?;
        let connection = self.lock()?;
        let sql = format!(
            "SELECT id FROM {} ORDER BY COALESCE(read_count, 0) DESC, id ASC LIMIT ?1",
            kind.table()
        );
        let mut statement = connection
            .prepare(&sql)
            .map_err(|source| StoreError::backend("prepare ranking query", source))?;
        let ids = statement
            .query_map([sql_limit], |row| row.get::<_, u64>(0))
            .map_err(|source| StoreError::backend("rank entities", source))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| StoreError::backend("read ranking row", source))?;
        Ok(ids)
    }

    fn read_counts(&self, kind: EntityKind) -> Result<Vec<f64>, StoreError> {
        let connection = self.lock()?;
        let sql = format!("SELECT COALESCE(read_count, 0) FROM {}", kind.table());
        let mut statement = connection
            .prepare(&sql)
            .map_err(|source| StoreError::backend("prepare read count query", source))?;
        let counts = statement
            .query_map([], |row| row.get::<_, f64>(0))
            .map_err(|source| StoreError::backend("read counts", source))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| StoreError::backend("read count row", source))?;
        Ok(counts)
    }

    fn increment_read_count(
        &self,
        kind: EntityKind,
        id: u64,
        delta: f64,
    ) -> Result<(), StoreError> {
        let sql = format!(
            "UPDATE {} SET read_count = COALESCE(read_count, 0) + ?1 WHERE id = ?2",
            kind.table()
        );
        self.write(kind, id, &sql, delta, "increment read count")
    }

    fn update_read_count(
        &self,
        kind: EntityKind,
        id: u64,
        read_count: f64,
    ) -> Result<(), StoreError> {
        let sql = format!("UPDATE {} SET read_count = ?1 WHERE id = ?2", kind.table());
        self.write(kind, id, &sql, read_count, "update read count")
    }
}

fn initialise_schema(connection: &Connection) -> Result<(), SqliteRecordStoreError> {
    for kind in EntityKind::ALL {
        let table = kind.table();
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY,
                read_count REAL NOT NULL DEFAULT 0 CHECK (read_count >= 0),
                created_at INTEGER
            )"
        );
        connection
            .execute(&sql, [])
            .map_err(|source| SqliteRecordStoreError::CreateSchema { table, source })?;
        let index = format!(
            "CREATE INDEX IF NOT EXISTS {table}_read_count_idx ON {table} (read_count DESC)"
        );
        connection
            .execute(&index, [])
            .map_err(|source| SqliteRecordStoreError::CreateSchema { table, source })?;
    }
    Ok(())
}

/// Row as read from SQLite, before validation.
struct RawEntity {
    id: u64,
    read_count: Option<f64>,
    created_at: Option<i64>,
}

impl RawEntity {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            read_count: row.get(1)?,
            created_at: row.get(2)?,
        })
    }

    fn into_entity(self, kind: EntityKind) -> Result<ScoredEntity, StoreError> {
        let entity = ScoredEntity::new(self.id, self.read_count.unwrap_or(0.0)).map_err(
            |source| StoreError::InvalidRecord {
                kind,
                id: self.id,
                source,
            },
        )?;
        Ok(match self.created_at.and_then(secs_to_system_time) {
            Some(created_at) => entity.with_created_at(created_at),
            None => entity,
        })
    }
}

fn entity_from_row(kind: EntityKind, row: &Row<'_>) -> Result<ScoredEntity, StoreError> {
    RawEntity::from_row(row)
        .map_err(|source| StoreError::backend("decode entity row", source))?
        .into_entity(kind)
}

fn id_to_sql(id: u64) -> Option<i64> {
    i64::try_from(id).ok()
}

fn system_time_to_secs(at: SystemTime) -> Option<i64> {
    match at.duration_since(UNIX_EPOCH) {
        Ok(since) => i64::try_from(since.as_secs()).ok(),
        Err(before) => i64::try_from(before.duration().as_secs())
            .ok()
            .map(|secs| -secs),
    }
}

fn secs_to_system_time(secs: i64) -> Option<SystemTime> {
    let magnitude = Duration::from_secs(secs.unsigned_abs());
    if secs >= 0 {
        UNIX_EPOCH.checked_add(magnitude)
    } else {
        UNIX_EPOCH.checked_sub(magnitude)
    }
}
