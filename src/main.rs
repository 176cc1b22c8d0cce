//! wof-sqlite-index: index Who's On First feature records into SQLite.

use anyhow::Context as _;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use wof_sqlite_index::IndexConfig;

#[derive(Parser, Debug)]
#[command(name = "wof-sqlite-index", version, about)]
struct Cli {
    /// TOML config file. Flags given on the command line override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// How sources are enumerated: repo://, directory://, file:// or filelist://
    #[arg(long)]
    iterator_uri: Option<String>,

    /// SQLite database path, or :memory:
    #[arg(long)]
    database_uri: Option<String>,

    /// Index all tables (except the 'search' table which you need to specify explicitly)
    #[arg(long)]
    all: bool,

    /// Index the 'ancestors' table
    #[arg(long)]
    ancestors: bool,

    /// Index the 'concordances' table
    #[arg(long)]
    concordances: bool,

    /// Index the 'geojson' table
    #[arg(long)]
    geojson: bool,

    /// Index the 'names' table
    #[arg(long)]
    names: bool,

    /// Index the 'rtree' table
    #[arg(long)]
    rtree: bool,

    /// Index the 'properties' table
    #[arg(long)]
    properties: bool,

    /// Index the 'search' table (SQLite FTS5)
    #[arg(long)]
    search: bool,

    /// Index the 'spr' table
    #[arg(long)]
    spr: bool,

    /// Index the 'supersedes' table
    #[arg(long)]
    supersedes: bool,

    /// Index the tables needed for spatial lookups (rtree, geojson, properties, spr)
    #[arg(long)]
    spatial_tables: bool,

    /// Enable performance pragmas at the expense of possible (unlikely) database corruption
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    live_hard_die_fast: Option<bool>,

    /// Display timings during and after indexing
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    timings: Option<bool>,

    /// Optimize the database before closing the connection
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    optimize: Option<bool>,

    /// Index alt geometries
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    index_alt_files: Option<bool>,

    /// Fail the run when an alt geometry cannot be loaded
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    strict_alt_files: Option<bool>,

    /// Index the records related to a feature (wof:belongsto, wof:involves, wof:depicts).
    /// Alt files for relations are not indexed.
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    index_relations: Option<bool>,

    /// Reader URI (fs:///path, a local path, or an http(s) base URL) for related records
    #[arg(long)]
    index_relations_reader_uri: Option<String>,

    /// Fail instead of skipping when a related record cannot be read
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    strict_relations: Option<bool>,

    /// The number of documents to index concurrently
    #[arg(long)]
    processes: Option<usize>,

    /// Sources to index, interpreted according to --iterator-uri
    #[arg(required = true)]
    sources: Vec<String>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<(IndexConfig, Vec<String>)> {
        let mut config = match &self.config {
            Some(path) => IndexConfig::load(path)?,
            None => IndexConfig::default(),
        };

        if let Some(uri) = self.iterator_uri {
            config.iterator_uri = uri;
        }
        if let Some(uri) = self.database_uri {
            config.database_uri = uri;
        }
        if let Some(processes) = self.processes {
            config.processes = processes;
        }

        let tables = &mut config.tables;
        tables.all |= self.all;
        tables.ancestors |= self.ancestors;
        tables.concordances |= self.concordances;
        tables.geojson |= self.geojson;
        tables.names |= self.names;
        tables.rtree |= self.rtree;
        tables.properties |= self.properties;
        tables.search |= self.search;
        tables.spr |= self.spr;
        tables.supersedes |= self.supersedes;
        tables.spatial_tables |= self.spatial_tables;

        let flags = [
            (self.live_hard_die_fast, &mut config.live_hard_die_fast),
            (self.timings, &mut config.timings),
            (self.optimize, &mut config.optimize),
            (self.index_alt_files, &mut config.index_alt_files),
            (self.strict_alt_files, &mut config.strict_alt_files),
            (self.index_relations, &mut config.relations.enabled),
            (self.strict_relations, &mut config.relations.strict),
        ];
        for (flag, value) in flags {
            if let Some(flag) = flag {
                *value = flag;
            }
        }

        if let Some(uri) = self.index_relations_reader_uri {
            config.relations.reader_uri = Some(uri);
        }

        Ok((config, self.sources))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (config, sources) = Cli::parse().into_config()?;

    let stats = wof_sqlite_index::app::run(&config, &sources)
        .await
        .with_context(|| format!("failed to index sources in {} mode", config.iterator_uri))?;

    if config.timings {
        tracing::info!(
            indexed = stats.indexed,
            relations_indexed = stats.relations_indexed,
            elapsed = ?stats.elapsed,
            "time to index all"
        );
    }

    Ok(())
}
