//! Destination tables.
//!
//! Every table exposes the same capability: take one feature and write its
//! slice of the data. Each write runs in its own transaction and replaces
//! whatever the table already held for that record, so indexing the same
//! record twice leaves the same rows.

pub mod ancestors;
pub mod concordances;
pub mod geojson;
pub mod names;
pub mod properties;
pub mod rtree;
pub mod search;
pub mod spr;
pub mod supersedes;

pub use ancestors::AncestorsTable;
pub use concordances::ConcordancesTable;
pub use geojson::GeoJsonTable;
pub use names::NamesTable;
pub use properties::PropertiesTable;
pub use rtree::RTreeTable;
pub use search::SearchTable;
pub use spr::SprTable;
pub use supersedes::SupersedesTable;

use crate::db::Database;
use crate::error::{DbError, Result};
use crate::feature::{Feature, Properties};

use async_trait::async_trait;
use std::sync::Arc;

/// A destination table.
#[async_trait]
pub trait Table: Send + Sync {
    fn name(&self) -> &str;

    /// Whether alternate-geometry records are written to this table.
    fn indexes_alt_files(&self) -> bool {
        false
    }

    /// Create the table and its indexes if they do not exist.
    async fn setup(&self, db: &Database) -> std::result::Result<(), DbError>;

    /// Write one record. Must be safe to call concurrently for distinct records.
    async fn index_record(&self, db: &Database, feature: &Feature) -> Result<()>;
}

/// The configured tables, in the order records are written to them.
#[derive(Clone, Default)]
pub struct TableSet {
    tables: Vec<Arc<dyn Table>>,
}

impl TableSet {
    pub fn new(tables: Vec<Arc<dyn Table>>) -> Self {
        Self { tables }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tables.iter().map(|table| table.name()).collect()
    }

    /// Create every table.
    pub async fn setup(&self, db: &Database) -> std::result::Result<(), DbError> {
        for table in &self.tables {
            table.setup(db).await?;
            tracing::debug!(table = table.name(), "table ready");
        }
        Ok(())
    }

    /// Write one record to every table in order, stopping at the first failure.
    ///
    /// Earlier tables' writes are not rolled back when a later table fails.
    pub async fn index(&self, db: &Database, feature: &Feature) -> Result<()> {
        for table in &self.tables {
            if feature.is_alt() && !table.indexes_alt_files() {
                continue;
            }
            table.index_record(db, feature).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for TableSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// `wof:lastmodified`, or 0 when absent.
pub(crate) fn lastmodified(properties: &Properties<'_>) -> i64 {
    properties.i64("wof:lastmodified").unwrap_or(0)
}

/// Alt label as stored in key columns: empty for primary records.
pub(crate) fn alt_key(feature: &Feature) -> &str {
    feature.alt_label().unwrap_or("")
}

pub(crate) fn setup_error(table: &str) -> impl FnOnce(sqlx::Error) -> DbError + '_ {
    move |source| DbError::Setup {
        table: table.to_string(),
        source,
    }
}

pub(crate) fn write_error(table: &str, id: i64) -> impl FnOnce(sqlx::Error) -> DbError + '_ {
    move |source| DbError::Write {
        table: table.to_string(),
        id,
        source,
    }
}

/// Run each statement in turn, for `CREATE ... IF NOT EXISTS` batches.
pub(crate) async fn execute_all(
    db: &Database,
    table: &str,
    statements: &[&str],
) -> std::result::Result<(), DbError> {
    for statement in statements {
        sqlx::query(statement)
            .execute(db.pool())
            .await
            .map_err(setup_error(table))?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::admission::{Admission, AdmissionOptions, Admitter};
    use crate::db::DatabaseOptions;
    use tokio_util::sync::CancellationToken;

    pub async fn memory_db() -> Database {
        Database::connect(":memory:", &DatabaseOptions::default())
            .await
            .expect("connect in-memory database")
    }

    pub fn feature(body: &str) -> Feature {
        feature_at("test.geojson", body, false)
    }

    pub fn feature_at(path: &str, body: &str, alt: bool) -> Feature {
        let admitter = Admitter::new(AdmissionOptions {
            index_alt_files: alt,
            strict_alt_files: true,
        });
        match admitter.admit(&CancellationToken::new(), path, body.as_bytes().to_vec()) {
            Admission::Accepted(feature) => feature,
            other => panic!("fixture was not admitted: {other:?}"),
        }
    }

    pub async fn count(db: &Database, sql: &str) -> i64 {
        sqlx::query_scalar(sql)
            .fetch_one(db.pool())
            .await
            .expect("count query")
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn alt_records_only_reach_alt_aware_tables() {
        let db = memory_db().await;
        let tables = TableSet::new(vec![
            Arc::new(GeoJsonTable::new(true)),
            Arc::new(NamesTable::new()),
        ]);
        tables.setup(&db).await.expect("setup");

        let alt = feature_at(
            "100-alt-osm.geojson",
            r#"{"properties":{"wof:id":100,"src:alt_label":"osm","name:eng_x_preferred":["Alt"]},
                "geometry":{"type":"Point","coordinates":[0,0]}}"#,
            true,
        );
        tables.index(&db, &alt).await.expect("index alt");

        assert_eq!(count(&db, "SELECT COUNT(*) FROM geojson").await, 1);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM names").await, 0);
    }

    #[test]
    fn table_set_reports_names_in_order() {
        let tables = TableSet::new(vec![
            Arc::new(GeoJsonTable::new(false)),
            Arc::new(SprTable::new(false)),
        ]);
        assert_eq!(tables.names(), vec!["geojson", "spr"]);
        assert!(!tables.is_empty());
    }
}
