//! The `search` table: an FTS5 index over names.
//!
//! Slow to build compared to the other tables, which is why `--all` leaves
//! it out.

use super::names::localized_names;
use super::{Table, execute_all, lastmodified, write_error};
use crate::db::Database;
use crate::error::{DbError, Result};
use crate::feature::Feature;

use async_trait::async_trait;

const TABLE_NAME: &str = "search";

#[derive(Debug, Clone, Default)]
pub struct SearchTable;

impl SearchTable {
    pub fn new() -> Self {
        Self
    }
}

/// Searchable text for one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchDocument {
    pub name: String,
    pub names_all: String,
    pub names_preferred: String,
    pub names_variant: String,
    pub names_colloquial: String,
}

impl SearchDocument {
    pub fn from_feature(feature: &Feature) -> Result<Self> {
        let properties = feature.properties()?;
        let name = properties.str("wof:name").unwrap_or_default().to_string();

        let mut all = vec![name.clone()];
        let mut preferred = Vec::new();
        let mut variant = Vec::new();
        let mut colloquial = Vec::new();

        for localized in localized_names(feature)? {
            match localized.privateuse.as_str() {
                "preferred" => preferred.push(localized.name.clone()),
                "variant" => variant.push(localized.name.clone()),
                "colloquial" => colloquial.push(localized.name.clone()),
                _ => {}
            }
            all.push(localized.name);
        }

        for list in [&mut all, &mut preferred, &mut variant, &mut colloquial] {
            list.retain(|name| !name.is_empty());
            list.sort();
            list.dedup();
        }

        Ok(Self {
            name,
            names_all: all.join(" "),
            names_preferred: preferred.join(" "),
            names_variant: variant.join(" "),
            names_colloquial: colloquial.join(" "),
        })
    }
}

#[async_trait]
impl Table for SearchTable {
    fn name(&self) -> &str {
        TABLE_NAME
    }

    async fn setup(&self, db: &Database) -> std::result::Result<(), DbError> {
        execute_all(
            db,
            TABLE_NAME,
            &["CREATE VIRTUAL TABLE IF NOT EXISTS search USING fts5 (
                id UNINDEXED,
                placetype,
                name,
                names_all,
                names_preferred,
                names_variant,
                names_colloquial,
                is_current UNINDEXED,
                lastmodified UNINDEXED
            )"],
        )
        .await
    }

    async fn index_record(&self, db: &Database, feature: &Feature) -> Result<()> {
        let document = SearchDocument::from_feature(feature)?;
        let properties = feature.properties()?;
        let id = feature.id();

        let mut tx = db
            .pool()
            .begin()
            .await
            .map_err(write_error(TABLE_NAME, id))?;

        sqlx::query("DELETE FROM search WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(write_error(TABLE_NAME, id))?;

        sqlx::query(
            "INSERT INTO search (id, placetype, name, names_all, names_preferred, names_variant, \
             names_colloquial, is_current, lastmodified) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(properties.str("wof:placetype").unwrap_or_default())
        .bind(&document.name)
        .bind(&document.names_all)
        .bind(&document.names_preferred)
        .bind(&document.names_variant)
        .bind(&document.names_colloquial)
        .bind(properties.i64("mz:is_current").unwrap_or(-1))
        .bind(lastmodified(&properties))
        .execute(&mut *tx)
        .await
        .map_err(write_error(TABLE_NAME, id))?;

        tx.commit().await.map_err(write_error(TABLE_NAME, id))?;
        Ok(())
    }
}
