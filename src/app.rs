//! Wires a configuration into a complete indexing run.

use crate::admission::{AdmissionOptions, Admitter};
use crate::config::IndexConfig;
use crate::db::{Database, DatabaseOptions};
use crate::error::Result;
use crate::indexer::{FeatureIndexer, IndexStats, IndexerOptions};
use crate::iterate::IteratorMode;
use crate::reader::new_reader;
use crate::relations::{RelationResolver, ResolverOptions};

use std::sync::Arc;

/// Open the database, create the selected tables and index `sources`.
///
/// Ctrl-C cancels the run; documents already being written finish first.
pub async fn run(config: &IndexConfig, sources: &[String]) -> Result<IndexStats> {
    config.validate()?;
    let mode: IteratorMode = config.iterator_uri.parse()?;

    let db = Database::connect(
        &config.database_uri,
        &DatabaseOptions {
            live_hard_die_fast: config.live_hard_die_fast,
            max_connections: pool_size(config.processes),
        },
    )
    .await?;

    let tables = config.tables.build(config.index_alt_files);
    tables.setup(&db).await?;

    tracing::info!(
        database = db.uri(),
        tables = ?tables.names(),
        %mode,
        processes = config.processes,
        relations = config.relations.enabled,
        "starting indexing run"
    );

    let admitter = Admitter::new(AdmissionOptions {
        index_alt_files: config.index_alt_files,
        strict_alt_files: config.strict_alt_files,
    });

    let mut indexer = FeatureIndexer::new(
        db.clone(),
        tables,
        admitter,
        IndexerOptions {
            processes: config.processes,
            timings: config.timings,
        },
    );

    if config.relations.enabled {
        let uri = config.relations.reader_uri.as_deref().unwrap_or_default();
        let reader = new_reader(uri)?;
        let resolver = RelationResolver::new(
            db.clone(),
            reader,
            ResolverOptions {
                strict: config.relations.strict,
            },
        );
        indexer = indexer.with_resolver(Arc::new(resolver));
    }

    let indexer = Arc::new(indexer);

    let cancel = indexer.cancel_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, finishing documents in flight");
            cancel.cancel();
        }
    });

    let result = indexer.index_uris(mode, sources).await;
    interrupt.abort();

    if config.optimize {
        db.optimize().await;
    }
    db.close().await;

    result
}

fn pool_size(processes: usize) -> u32 {
    u32::try_from(processes).unwrap_or(u32::MAX)
}
