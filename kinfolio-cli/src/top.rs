//! Top command: show the ranking snapshot the incrementer would consult.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use kinfolio_core::{EntityKind, RecordStore, ScoredEntity};
use kinfolio_scorer::{PolicySet, RankTier};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::output::write_json;
use crate::{
    ARG_DATABASE, ARG_KIND, ARG_LIMIT, CliError, ENV_TOP_KIND, database_or_default, open_store,
};

/// CLI arguments for the `top` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "top",
    long_about = "List the most-read entities of a kind in ranking order, with \
                 the increment tier each one currently falls into. The limit \
                 defaults to the size of the ranking snapshot for the kind.",
    about = "Show the current ranking snapshot"
)]
#[ortho_config(prefix = "KINFOLIO")]
pub(crate) struct TopArgs {
    /// SQLite database holding books, pages and songs.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Entity kind: book, page, or song.
    #[arg(long = ARG_KIND, value_name = "kind")]
    #[serde(default)]
    pub(crate) kind: Option<EntityKind>,
    /// Number of entries to list.
    #[arg(long = ARG_LIMIT, value_name = "n")]
    #[serde(default)]
    pub(crate) limit: Option<usize>,
}

impl TopArgs {
    pub(crate) fn into_config(self) -> Result<TopConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        TopConfig::try_from(merged)
    }
}

/// Resolved `top` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TopConfig {
    pub(crate) database: Utf8PathBuf,
    pub(crate) kind: EntityKind,
    pub(crate) limit: usize,
}

impl TryFrom<TopArgs> for TopConfig {
    type Error = CliError;

    fn try_from(args: TopArgs) -> Result<Self, Self::Error> {
        let kind = args.kind.ok_or(CliError::MissingArgument {
            field: ARG_KIND,
            env: ENV_TOP_KIND,
        })?;
        let limit = args
            .limit
            .unwrap_or_else(|| PolicySet::default().get(kind).top_n);
        Ok(Self {
            database: database_or_default(args.database),
            kind,
            limit,
        })
    }
}

/// One row of the `top` output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct TopEntry {
    /// 1-based position in the listing.
    pub(crate) position: usize,
    #[serde(flatten)]
    pub(crate) tier: RankTier,
    #[serde(flatten)]
    pub(crate) entity: ScoredEntity,
}

pub(crate) fn run_top_with(args: TopArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    let store = open_store(&config.database)?;
    let entries = ranking(&store, config.kind, config.limit)?;
    write_json(writer, &entries)
}

/// Entries ranked by read count, tiered against the kind's snapshot.
pub(crate) fn ranking<S>(
    store: &S,
    kind: EntityKind,
    limit: usize,
) -> Result<Vec<TopEntry>, CliError>
where
    S: RecordStore + ?Sized,
{
    let policies = PolicySet::default();
    let policy = policies.get(kind);
    let ids = store.top_ids_by_read_count(kind, limit)?;
    let snapshot: Vec<u64> = ids.iter().copied().take(policy.top_n).collect();

    let mut entries = Vec::with_capacity(ids.len());
    for id in ids {
        // Rows deleted between the two queries are skipped.
        let Some(entity) = store.get(kind, id)? else {
            continue;
        };
        entries.push(TopEntry {
            position: entries.len() + 1,
            tier: policy.classify(id, &snapshot),
            entity,
        });
    }
    Ok(entries)
}
