//! Fetches and indexes the records a just-indexed feature refers to.

use super::exists::ExistenceCheck;
use super::extract::extract_relations;
use super::seen::SeenSet;
use crate::db::Database;
use crate::error::Result;
use crate::feature::Feature;
use crate::reader::{Reader, read_all};
use crate::tables::TableSet;
use crate::uri;

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct ResolverOptions {
    /// Abort resolution when a related record cannot be fetched, instead of
    /// logging and moving on.
    pub strict: bool,
}

/// What one `resolve` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveStats {
    /// Related records written to the tables.
    pub indexed: usize,
    /// Related records skipped because they could not be fetched.
    pub missing: usize,
}

/// Resolves one level of relations for each indexed record.
///
/// One resolver is built per run and shared by every worker; its seen-set is
/// what keeps two workers from fetching the same related record.
pub struct RelationResolver {
    db: Database,
    reader: Arc<dyn Reader>,
    seen: SeenSet,
    existence: ExistenceCheck,
    options: ResolverOptions,
}

impl RelationResolver {
    pub fn new(db: Database, reader: Arc<dyn Reader>, options: ResolverOptions) -> Self {
        Self {
            existence: ExistenceCheck::new(db.clone()),
            db,
            reader,
            seen: SeenSet::new(),
            options,
        }
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    /// Index the records `feature` refers to through `tables`.
    ///
    /// Database errors always abort. Fetch errors abort in strict mode and
    /// are skipped otherwise. Nothing is written until every claimed relation
    /// has been fetched, and no transaction is held while fetching.
    pub async fn resolve(
        &self,
        cancel: &CancellationToken,
        feature: &Feature,
        tables: &TableSet,
    ) -> Result<ResolveStats> {
        let mut stats = ResolveStats::default();

        if cancel.is_cancelled() {
            return Ok(stats);
        }

        let relations = extract_relations(feature.document()?);
        if relations.is_empty() {
            return Ok(stats);
        }

        let mut to_index = Vec::new();

        for id in relations {
            if !self.seen.test_and_mark(id) {
                continue;
            }

            if self.existence.exists(id).await? {
                continue;
            }

            if cancel.is_cancelled() {
                return Ok(stats);
            }

            let rel_path = uri::id_to_rel_path(id)?;

            let body = match read_all(self.reader.as_ref(), &rel_path).await {
                Ok(body) => body,
                Err(error) if !self.options.strict => {
                    tracing::warn!(
                        parent = feature.id(),
                        id,
                        rel_path,
                        reader = %self.reader.describe(),
                        %error,
                        "failed to read related record, strict mode is disabled so skipping"
                    );
                    stats.missing += 1;
                    continue;
                }
                Err(error) => return Err(error.into()),
            };

            to_index.push(Feature::fetched(id, body));
        }

        for related in &to_index {
            tables.index(&self.db, related).await?;
            stats.indexed += 1;
            tracing::debug!(parent = feature.id(), id = related.id(), "indexed related record");
        }

        Ok(stats)
    }
}
