//! Error types emitted by the Kinfolio CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use kinfolio_core::{CacheError, EntityKind, QueueError, SqliteRecordStoreError, StoreError};
use kinfolio_scorer::PopularityError;
use kinfolio_worker::WorkerError;
use thiserror::Error;

/// Errors emitted by the Kinfolio CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Flag name without leading dashes.
        field: &'static str,
        /// Environment variable that can supply the value.
        env: &'static str,
    },
    /// Opening the record store failed.
    #[error("failed to open record store at {path:?}: {source}")]
    OpenStore {
        /// Database location.
        path: Utf8PathBuf,
        /// Underlying store error.
        #[source]
        source: Box<SqliteRecordStoreError>,
    },
    /// Opening the dedup marker cache failed.
    #[error("failed to open marker cache at {path:?}: {source}")]
    OpenCache {
        /// Database location.
        path: Utf8PathBuf,
        /// Underlying cache error.
        #[source]
        source: CacheError,
    },
    /// The requested entity does not exist.
    #[error("{kind} {id} does not exist")]
    EntityNotFound {
        /// Kind that was queried.
        kind: EntityKind,
        /// Missing identifier.
        id: u64,
    },
    /// Reading the record store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Computing popularity failed.
    #[error(transparent)]
    Popularity(#[from] PopularityError),
    /// Building the async runtime failed.
    #[error("failed to start the async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// Starting or stopping the worker pool failed.
    #[error(transparent)]
    Worker(#[from] WorkerError),
    /// A task could not be enqueued.
    #[error(transparent)]
    Enqueue(#[from] QueueError),
    /// Serializing command output failed.
    #[error("failed to serialize output: {0}")]
    SerialiseOutput(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
