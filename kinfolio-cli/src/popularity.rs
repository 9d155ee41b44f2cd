//! Popularity command: report percentile ranks.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use kinfolio_core::{EntityKind, RecordStore};
use kinfolio_scorer::{PopularEntity, PopularityService};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::output::write_json;
use crate::{
    ARG_DATABASE, ARG_ID, ARG_KIND, CliError, ENV_POPULARITY_KIND, database_or_default, open_store,
};

/// CLI arguments for the `popularity` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "popularity",
    long_about = "Report how an entity's read count compares with every other \
                 entity of the same kind, as a percentile between 0 and 100. \
                 Without --id, every entity of the kind is listed.",
    about = "Report popularity percentiles"
)]
#[ortho_config(prefix = "KINFOLIO")]
pub(crate) struct PopularityArgs {
    /// SQLite database holding books, pages and songs.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Entity kind: book, page, or song.
    #[arg(long = ARG_KIND, value_name = "kind")]
    #[serde(default)]
    pub(crate) kind: Option<EntityKind>,
    /// Report a single entity instead of the whole kind.
    #[arg(long = ARG_ID, value_name = "id")]
    #[serde(default)]
    pub(crate) id: Option<u64>,
}

impl PopularityArgs {
    pub(crate) fn into_config(self) -> Result<PopularityConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        PopularityConfig::try_from(merged)
    }
}

/// Resolved `popularity` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PopularityConfig {
    pub(crate) database: Utf8PathBuf,
    pub(crate) kind: EntityKind,
    pub(crate) id: Option<u64>,
}

impl TryFrom<PopularityArgs> for PopularityConfig {
    type Error = CliError;

    fn try_from(args: PopularityArgs) -> Result<Self, Self::Error> {
        let kind = args.kind.ok_or(CliError::MissingArgument {
            field: ARG_KIND,
            env: ENV_POPULARITY_KIND,
        })?;
        Ok(Self {
            database: database_or_default(args.database),
            kind,
            id: args.id,
        })
    }
}

pub(crate) fn run_popularity_with(
    args: PopularityArgs,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let config = args.into_config()?;
    let store = open_store(&config.database)?;
    let service = PopularityService::new(&store);

    match config.id {
        Some(id) => {
            let entity = store
                .get(config.kind, id)?
                .ok_or(CliError::EntityNotFound {
                    kind: config.kind,
                    id,
                })?;
            let popularity_percentage = service.calculate_popularity(config.kind, &entity)?;
            write_json(
                writer,
                &PopularEntity {
                    entity,
                    popularity_percentage,
                },
            )
        }
        None => {
            let entities = store.list(config.kind)?;
            let ranked = service.add_popularity_to_collection(config.kind, entities)?;
            write_json(writer, &ranked)
        }
    }
}
