//! The `ancestors` table: `(id, ancestor)` pairs from a record's hierarchies.

use super::{Table, execute_all, lastmodified, write_error};
use crate::db::Database;
use crate::error::{DbError, Result};
use crate::feature::{Feature, as_integer};

use async_trait::async_trait;
use std::collections::BTreeSet;

const TABLE_NAME: &str = "ancestors";

#[derive(Debug, Clone, Default)]
pub struct AncestorsTable;

impl AncestorsTable {
    pub fn new() -> Self {
        Self
    }
}

/// Distinct `(ancestor_id, ancestor_placetype)` pairs from `wof:hierarchy`.
///
/// Each hierarchy is an object like `{"country_id": 85633793, "region_id": ...}`.
/// The record itself and non-positive placeholders are left out.
pub fn hierarchy_ancestors(feature: &Feature) -> Result<BTreeSet<(i64, String)>> {
    let properties = feature.properties()?;
    let mut ancestors = BTreeSet::new();

    for hierarchy in properties.list("wof:hierarchy") {
        let Some(hierarchy) = hierarchy.as_object() else {
            continue;
        };

        for (key, value) in hierarchy {
            let Some(placetype) = key.strip_suffix("_id") else {
                continue;
            };
            let Some(ancestor_id) = as_integer(value) else {
                continue;
            };
            if ancestor_id <= 0 || ancestor_id == feature.id() {
                continue;
            }
            ancestors.insert((ancestor_id, placetype.to_string()));
        }
    }

    Ok(ancestors)
}

#[async_trait]
impl Table for AncestorsTable {
    fn name(&self) -> &str {
        TABLE_NAME
    }

    async fn setup(&self, db: &Database) -> std::result::Result<(), DbError> {
        execute_all(
            db,
            TABLE_NAME,
            &[
                "CREATE TABLE IF NOT EXISTS ancestors (
                    id INTEGER NOT NULL,
                    ancestor_id INTEGER NOT NULL,
                    ancestor_placetype TEXT,
                    lastmodified INTEGER
                )",
                "CREATE INDEX IF NOT EXISTS ancestors_by_id ON ancestors (id, ancestor_placetype, lastmodified)",
                "CREATE INDEX IF NOT EXISTS ancestors_by_ancestor ON ancestors (ancestor_id, ancestor_placetype, lastmodified)",
            ],
        )
        .await
    }

    async fn index_record(&self, db: &Database, feature: &Feature) -> Result<()> {
        let ancestors = hierarchy_ancestors(feature)?;
        let lastmod = lastmodified(&feature.properties()?);
        let id = feature.id();

        let mut tx = db
            .pool()
            .begin()
            .await
            .map_err(write_error(TABLE_NAME, id))?;

        sqlx::query("DELETE FROM ancestors WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(write_error(TABLE_NAME, id))?;

        for (ancestor_id, placetype) in &ancestors {
            sqlx::query(
                "INSERT INTO ancestors (id, ancestor_id, ancestor_placetype, lastmodified) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(id)
            .bind(*ancestor_id)
            .bind(placetype)
            .bind(lastmod)
            .execute(&mut *tx)
            .await
            .map_err(write_error(TABLE_NAME, id))?;
        }

        tx.commit().await.map_err(write_error(TABLE_NAME, id))?;
        Ok(())
    }
}
