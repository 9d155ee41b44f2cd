//! Increment command: drive view or play signals through a worker pool.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use kinfolio_core::{EntityKind, IncrementTask, SqliteExpiringCache, TaskQueue};
use kinfolio_scorer::ReadCountIncrementer;
use kinfolio_worker::{RetryPolicy, WorkerConfig, WorkerPool, WorkerReport};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use tokio::runtime::Builder;

use crate::output::write_json;
use crate::{
    ARG_DATABASE, ARG_ID, ARG_KIND, ARG_MAX_ATTEMPTS, ARG_TIMES, ARG_WORKERS, CliError,
    ENV_INCREMENT_ID, ENV_INCREMENT_KIND, database_or_default, open_store,
};

/// CLI arguments for the `increment` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "increment",
    long_about = "Record one or more views (books, pages) or plays (songs) of a \
                 single entity. Each signal is queued and applied by a pool of \
                 workers using the rank-aware increment rules; repeated song \
                 plays inside the dedup window count once. Prints a JSON report \
                 of the outcomes.",
    about = "Apply rank-aware read-count increments"
)]
#[ortho_config(prefix = "KINFOLIO")]
pub(crate) struct IncrementArgs {
    /// SQLite database holding books, pages and songs.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Entity kind: book, page, or song.
    #[arg(long = ARG_KIND, value_name = "kind")]
    #[serde(default)]
    pub(crate) kind: Option<EntityKind>,
    /// Identifier of the entity that was viewed or played.
    #[arg(long = ARG_ID, value_name = "id")]
    #[serde(default)]
    pub(crate) id: Option<u64>,
    /// Number of signals to enqueue (defaults to 1).
    #[arg(long = ARG_TIMES, value_name = "n")]
    #[serde(default)]
    pub(crate) times: Option<usize>,
    /// Number of concurrent workers (defaults to 4).
    #[arg(long = ARG_WORKERS, value_name = "n")]
    #[serde(default)]
    pub(crate) workers: Option<usize>,
    /// Attempts per task before it is reported as failed (defaults to 3).
    #[arg(long = ARG_MAX_ATTEMPTS, value_name = "n")]
    #[serde(default)]
    pub(crate) max_attempts: Option<u32>,
}

impl IncrementArgs {
    pub(crate) fn into_config(self) -> Result<IncrementConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        IncrementConfig::try_from(merged)
    }
}

/// Resolved `increment` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IncrementConfig {
    pub(crate) database: Utf8PathBuf,
    pub(crate) task: IncrementTask,
    pub(crate) times: usize,
    pub(crate) worker: WorkerConfig,
}

impl TryFrom<IncrementArgs> for IncrementConfig {
    type Error = CliError;

    fn try_from(args: IncrementArgs) -> Result<Self, Self::Error> {
        let kind = args.kind.ok_or(CliError::MissingArgument {
            field: ARG_KIND,
            env: ENV_INCREMENT_KIND,
        })?;
        let id = args.id.ok_or(CliError::MissingArgument {
            field: ARG_ID,
            env: ENV_INCREMENT_ID,
        })?;

        let defaults = WorkerConfig::default();
        let retry = RetryPolicy {
            max_attempts: args.max_attempts.unwrap_or(defaults.retry.max_attempts),
            ..defaults.retry
        };
        let worker = WorkerConfig::with_workers(args.workers.unwrap_or(defaults.workers))
            .with_retry(retry);

        Ok(Self {
            database: database_or_default(args.database),
            task: IncrementTask::new(kind, id),
            times: args.times.unwrap_or(1),
            worker,
        })
    }
}

pub(crate) fn run_increment_with(
    args: IncrementArgs,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let config = args.into_config()?;
    let report = execute_increment(&config)?;
    write_json(writer, &report)
}

pub(crate) fn execute_increment(config: &IncrementConfig) -> Result<WorkerReport, CliError> {
    let store = open_store(&config.database)?;
    let cache = SqliteExpiringCache::open(config.database.as_std_path()).map_err(|source| {
        CliError::OpenCache {
            path: config.database.clone(),
            source,
        }
    })?;
    let incrementer = ReadCountIncrementer::new(store, cache);

    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    runtime.block_on(drive_pool(incrementer, config))
}

async fn drive_pool<S, C>(
    incrementer: ReadCountIncrementer<S, C>,
    config: &IncrementConfig,
) -> Result<WorkerReport, CliError>
where
    S: kinfolio_core::RecordStore + 'static,
    C: kinfolio_core::ExpiringCache + 'static,
{
    let pool = WorkerPool::spawn(incrementer, config.worker)?;
    enqueue_signals(&pool.queue(), config.task, config.times)?;
    Ok(pool.shutdown().await?)
}

/// Hand `times` copies of `task` to `queue` without waiting on any of them.
pub(crate) fn enqueue_signals(
    queue: &dyn TaskQueue,
    task: IncrementTask,
    times: usize,
) -> Result<(), CliError> {
    for _ in 0..times {
        queue.enqueue(task)?;
    }
    log::debug!("queued {times} x {task}");
    Ok(())
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<IncrementConfig, CliError> {
    let merged = IncrementArgs::merge_from_layers(layers).map_err(CliError::from)?;
    IncrementConfig::try_from(merged)
}
