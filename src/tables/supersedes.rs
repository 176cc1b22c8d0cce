//! The `supersedes` table: supersession edges between records.

use super::{Table, execute_all, lastmodified, write_error};
use crate::db::Database;
use crate::error::{DbError, Result};
use crate::feature::{Feature, as_integer};

use async_trait::async_trait;

const TABLE_NAME: &str = "supersedes";

#[derive(Debug, Clone, Default)]
pub struct SupersedesTable;

impl SupersedesTable {
    pub fn new() -> Self {
        Self
    }
}

/// `(superseded_id, superseded_by_id)` edges touching this record.
///
/// `wof:supersedes` lists older records this one replaces;
/// `wof:superseded_by` lists newer records replacing this one.
pub fn supersession_edges(feature: &Feature) -> Result<Vec<(i64, i64)>> {
    let properties = feature.properties()?;
    let id = feature.id();
    let ids = |key: &str| -> Vec<i64> {
        properties
            .list(key)
            .into_iter()
            .filter_map(as_integer)
            .filter(|other| *other > 0)
            .collect()
    };

    let mut edges: Vec<(i64, i64)> = ids("wof:supersedes")
        .into_iter()
        .map(|older| (older, id))
        .collect();
    edges.extend(ids("wof:superseded_by").into_iter().map(|newer| (id, newer)));
    Ok(edges)
}

#[async_trait]
impl Table for SupersedesTable {
    fn name(&self) -> &str {
        TABLE_NAME
    }

    async fn setup(&self, db: &Database) -> std::result::Result<(), DbError> {
        execute_all(
            db,
            TABLE_NAME,
            &[
                "CREATE TABLE IF NOT EXISTS supersedes (
                    id INTEGER NOT NULL,
                    superseded_id INTEGER NOT NULL,
                    superseded_by_id INTEGER NOT NULL,
                    lastmodified INTEGER
                )",
                "CREATE INDEX IF NOT EXISTS supersedes_by_id ON supersedes (id)",
                "CREATE INDEX IF NOT EXISTS supersedes_by_edge ON supersedes (superseded_id, superseded_by_id)",
            ],
        )
        .await
    }

    async fn index_record(&self, db: &Database, feature: &Feature) -> Result<()> {
        let edges = supersession_edges(feature)?;
        let lastmod = lastmodified(&feature.properties()?);
        let id = feature.id();

        let mut tx = db
            .pool()
            .begin()
            .await
            .map_err(write_error(TABLE_NAME, id))?;

        sqlx::query("DELETE FROM supersedes WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(write_error(TABLE_NAME, id))?;

        for (superseded_id, superseded_by_id) in edges {
            sqlx::query(
                "INSERT INTO supersedes (id, superseded_id, superseded_by_id, lastmodified) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(id)
            .bind(superseded_id)
            .bind(superseded_by_id)
            .bind(lastmod)
            .execute(&mut *tx)
            .await
            .map_err(write_error(TABLE_NAME, id))?;
        }

        tx.commit().await.map_err(write_error(TABLE_NAME, id))?;
        Ok(())
    }
}
