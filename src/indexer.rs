//! Indexing engine: admit each candidate, write it to every table, then
//! resolve its relations, with a bounded number of documents in flight.

use crate::admission::{Admission, Admitter};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::iterate::{IteratorMode, discover};
use crate::relations::{RelationResolver, ResolveStats};
use crate::tables::TableSet;

use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const PROGRESS_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct IndexerOptions {
    /// Documents processed concurrently.
    pub processes: usize,
    /// Log progress periodically and a timing summary at the end.
    pub timings: bool,
}

impl Default for IndexerOptions {
    fn default() -> Self {
        Self {
            processes: 4,
            timings: false,
        }
    }
}

/// Statistics from an indexing run.
#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    pub discovered: usize,
    pub indexed: usize,
    /// Not indexable and not an error (alt records, cancellation).
    pub skipped: usize,
    /// Failed admission or could not be read.
    pub rejected: usize,
    pub relations_indexed: usize,
    pub relations_missing: usize,
    pub elapsed: Duration,
}

enum Outcome {
    Indexed(ResolveStats),
    Skipped,
    Rejected,
}

#[derive(Default)]
struct Progress {
    indexed: AtomicUsize,
}

/// Drives one indexing run over a fixed database and table set.
pub struct FeatureIndexer {
    db: Database,
    tables: TableSet,
    admitter: Admitter,
    resolver: Option<Arc<RelationResolver>>,
    options: IndexerOptions,
    cancel: CancellationToken,
    progress: Progress,
}

impl FeatureIndexer {
    pub fn new(db: Database, tables: TableSet, admitter: Admitter, options: IndexerOptions) -> Self {
        Self {
            db,
            tables,
            admitter,
            resolver: None,
            options,
            cancel: CancellationToken::new(),
            progress: Progress::default(),
        }
    }

    /// Follow relations of every indexed record through `resolver`.
    pub fn with_resolver(mut self, resolver: Arc<RelationResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Token that stops the run. Documents already in flight finish; nothing new starts.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Enumerate `sources` according to `mode` and index everything found.
    pub async fn index_uris(
        self: &Arc<Self>,
        mode: IteratorMode,
        sources: &[String],
    ) -> Result<IndexStats> {
        let sources = sources.to_vec();
        let paths = tokio::task::spawn_blocking(move || discover(mode, &sources))
            .await
            .map_err(|error| anyhow::anyhow!("source discovery failed: {error}"))?;
        self.index_paths(paths).await
    }

    /// Index the given documents.
    ///
    /// The first fatal error cancels the run: in-flight documents complete,
    /// queued ones are skipped, and the error is returned once everything has
    /// drained. Rows written before the failure stay in the database.
    pub async fn index_paths(self: &Arc<Self>, paths: Vec<PathBuf>) -> Result<IndexStats> {
        let started = Instant::now();
        let mut stats = IndexStats {
            discovered: paths.len(),
            ..IndexStats::default()
        };

        let progress_task = self.options.timings.then(|| self.spawn_progress(started));

        let mut results = futures::stream::iter(paths)
            .map(|path| {
                let indexer = self.clone();
                tokio::spawn(async move {
                    let outcome = indexer.index_path(&path).await;
                    (path, outcome)
                })
            })
            .buffer_unordered(self.options.processes.max(1));

        let mut first_error: Option<Error> = None;

        while let Some(joined) = results.next().await {
            let (path, outcome) = match joined {
                Ok(result) => result,
                Err(error) => {
                    self.cancel.cancel();
                    first_error.get_or_insert_with(|| {
                        anyhow::anyhow!("indexing task failed: {error}").into()
                    });
                    continue;
                }
            };

            match outcome {
                Ok(Outcome::Indexed(relations)) => {
                    stats.indexed += 1;
                    stats.relations_indexed += relations.indexed;
                    stats.relations_missing += relations.missing;
                }
                Ok(Outcome::Skipped) => stats.skipped += 1,
                Ok(Outcome::Rejected) => stats.rejected += 1,
                Err(error) => {
                    tracing::error!(path = %path.display(), %error, "failed to index document, stopping");
                    self.cancel.cancel();
                    first_error.get_or_insert(error);
                }
            }
        }

        if let Some(handle) = progress_task {
            handle.abort();
        }

        stats.elapsed = started.elapsed();

        if let Some(error) = first_error {
            return Err(error);
        }

        let relations_claimed = self
            .resolver
            .as_ref()
            .map_or(0, |resolver| resolver.seen().claimed());

        tracing::info!(
            discovered = stats.discovered,
            indexed = stats.indexed,
            skipped = stats.skipped,
            rejected = stats.rejected,
            relations_indexed = stats.relations_indexed,
            relations_missing = stats.relations_missing,
            relations_claimed,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "indexing complete"
        );

        Ok(stats)
    }

    async fn index_path(&self, path: &std::path::Path) -> Result<Outcome> {
        if self.cancel.is_cancelled() {
            return Ok(Outcome::Skipped);
        }

        let shown = path.display().to_string();

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(error) => {
                tracing::warn!(path = %shown, %error, "failed to read document");
                return Ok(Outcome::Rejected);
            }
        };

        let feature = match self.admitter.admit(&self.cancel, &shown, bytes) {
            Admission::Accepted(feature) => feature,
            Admission::Skipped => return Ok(Outcome::Skipped),
            Admission::Rejected(error) => {
                tracing::warn!(%error, "skipping document");
                return Ok(Outcome::Rejected);
            }
            Admission::Fatal(error) => return Err(error.into()),
        };

        self.tables.index(&self.db, &feature).await?;
        self.progress.indexed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(id = feature.id(), path = %shown, "indexed document");

        let relations = match &self.resolver {
            Some(resolver) => resolver.resolve(&self.cancel, &feature, &self.tables).await?,
            None => ResolveStats::default(),
        };

        Ok(Outcome::Indexed(relations))
    }

    fn spawn_progress(self: &Arc<Self>, started: Instant) -> tokio::task::JoinHandle<()> {
        let indexer = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PROGRESS_INTERVAL);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = indexer.cancel.cancelled() => break,
                    _ = interval.tick() => {
                        tracing::info!(
                            indexed = indexer.progress.indexed.load(Ordering::Relaxed),
                            elapsed_secs = started.elapsed().as_secs(),
                            "indexing progress"
                        );
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::AdmissionOptions;
    use crate::db::DatabaseOptions;
    use crate::tables::{GeoJsonTable, NamesTable};

    async fn indexer(tables: TableSet) -> (Database, Arc<FeatureIndexer>) {
        let db = Database::connect(":memory:", &DatabaseOptions::default())
            .await
            .expect("connect");
        tables.setup(&db).await.expect("setup");
        let indexer = FeatureIndexer::new(
            db.clone(),
            tables,
            Admitter::new(AdmissionOptions::default()),
            IndexerOptions::default(),
        );
        (db, Arc::new(indexer))
    }

    fn write(dir: &std::path::Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).expect("write fixture");
        path
    }

    #[tokio::test]
    async fn rejected_documents_do_not_stop_the_run() {
        let temp = tempfile::tempdir().expect("tempdir");
        let good = write(
            temp.path(),
            "1.geojson",
            r#"{"properties":{"wof:id":1},"geometry":{"type":"Point","coordinates":[0,0]}}"#,
        );
        let no_geometry = write(temp.path(), "2.geojson", r#"{"properties":{"wof:id":2}}"#);
        let not_json = write(temp.path(), "3.geojson", "nope");
        let missing = temp.path().join("4.geojson");

        let (db, indexer) = indexer(TableSet::new(vec![Arc::new(GeoJsonTable::new(false))])).await;
        let stats = indexer
            .index_paths(vec![good, no_geometry, not_json, missing])
            .await
            .expect("index");

        assert_eq!(stats.discovered, 4);
        assert_eq!(stats.indexed, 1);
        assert_eq!(stats.rejected, 3);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM geojson")
            .fetch_one(db.pool())
            .await
            .expect("count");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn table_failure_fails_the_run() {
        let temp = tempfile::tempdir().expect("tempdir");
        let good = write(
            temp.path(),
            "1.geojson",
            r#"{"properties":{"wof:id":1},"geometry":{"type":"Point","coordinates":[0,0]}}"#,
        );

        // Tables are deliberately not set up, so the first write fails.
        let db = Database::connect(":memory:", &DatabaseOptions::default())
            .await
            .expect("connect");
        let indexer = Arc::new(FeatureIndexer::new(
            db,
            TableSet::new(vec![Arc::new(NamesTable::new())]),
            Admitter::default(),
            IndexerOptions::default(),
        ));

        let result = indexer.index_paths(vec![good]).await;
        assert!(matches!(result, Err(Error::Db(_))));
        assert!(indexer.cancel_token().is_cancelled());
    }

    #[tokio::test]
    async fn unreadable_alt_file_does_not_fail_the_run() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("100");
        std::fs::create_dir_all(&dir).expect("mkdir");
        write(
            &dir,
            "100.geojson",
            r#"{"properties":{"wof:id":100},"geometry":{"type":"Point","coordinates":[0,0]}}"#,
        );
        write(&dir, "100-alt-osm.geojson", "garbage");

        let (db, indexer) = indexer(TableSet::new(vec![Arc::new(GeoJsonTable::new(false))])).await;
        let stats = indexer
            .index_uris(
                IteratorMode::Directory,
                &[temp.path().to_string_lossy().to_string()],
            )
            .await
            .expect("index");

        assert_eq!(stats.discovered, 2);
        assert_eq!(stats.indexed, 1);
        assert_eq!(stats.skipped, 1);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM geojson")
            .fetch_one(db.pool())
            .await
            .expect("count");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn cancelled_run_indexes_nothing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let good = write(
            temp.path(),
            "1.geojson",
            r#"{"properties":{"wof:id":1},"geometry":{"type":"Point","coordinates":[0,0]}}"#,
        );

        let (_db, indexer) = indexer(TableSet::new(vec![Arc::new(GeoJsonTable::new(false))])).await;
        indexer.cancel_token().cancel();

        let stats = indexer.index_paths(vec![good]).await.expect("index");
        assert_eq!(stats.indexed, 0);
        assert_eq!(stats.skipped, 1);
    }
}
