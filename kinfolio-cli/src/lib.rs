//! Command-line interface for operating Kinfolio read-count rankings.
#![forbid(unsafe_code)]

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use kinfolio_core::SqliteRecordStore;

mod error;
mod increment;
mod output;
mod popularity;
mod top;

pub use error::CliError;

use increment::{IncrementArgs, run_increment_with};
use popularity::{PopularityArgs, run_popularity_with};
use top::{TopArgs, run_top_with};

pub(crate) const ARG_DATABASE: &str = "database";
pub(crate) const ARG_KIND: &str = "kind";
pub(crate) const ARG_ID: &str = "id";
pub(crate) const ARG_TIMES: &str = "times";
pub(crate) const ARG_WORKERS: &str = "workers";
pub(crate) const ARG_MAX_ATTEMPTS: &str = "max-attempts";
pub(crate) const ARG_LIMIT: &str = "limit";
pub(crate) const ENV_INCREMENT_KIND: &str = "KINFOLIO_CMDS_INCREMENT_KIND";
pub(crate) const ENV_INCREMENT_ID: &str = "KINFOLIO_CMDS_INCREMENT_ID";
pub(crate) const ENV_POPULARITY_KIND: &str = "KINFOLIO_CMDS_POPULARITY_KIND";
pub(crate) const ENV_TOP_KIND: &str = "KINFOLIO_CMDS_TOP_KIND";
pub(crate) const DEFAULT_DATABASE: &str = "kinfolio.db";

/// Run the Kinfolio CLI with the current process arguments and environment.
///
/// # Errors
/// Returns [`CliError`] when parsing, configuration or the command fails.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let mut stdout = std::io::stdout().lock();
    dispatch(cli.command, &mut stdout)
}

fn dispatch(command: Command, writer: &mut dyn Write) -> Result<(), CliError> {
    match command {
        Command::Increment(args) => run_increment_with(args, writer),
        Command::Popularity(args) => run_popularity_with(args, writer),
        Command::Top(args) => run_top_with(args, writer),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "kinfolio",
    about = "Inspect and drive read-count rankings for books, pages and songs",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply rank-aware increments through a worker pool.
    Increment(IncrementArgs),
    /// Report popularity percentiles.
    Popularity(PopularityArgs),
    /// Show the current ranking snapshot.
    Top(TopArgs),
}

pub(crate) fn database_or_default(database: Option<Utf8PathBuf>) -> Utf8PathBuf {
    database.unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATABASE))
}

pub(crate) fn open_store(path: &Utf8Path) -> Result<SqliteRecordStore, CliError> {
    SqliteRecordStore::open(path.as_std_path()).map_err(|source| CliError::OpenStore {
        path: path.to_path_buf(),
        source: Box::new(source),
    })
}

#[cfg(test)]
mod tests;
