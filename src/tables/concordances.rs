//! The `concordances` table: identifiers for the same place in other datasets.

use super::{Table, execute_all, lastmodified, write_error};
use crate::db::Database;
use crate::error::{DbError, Result};
use crate::feature::Feature;

use async_trait::async_trait;
use serde_json::Value;

const TABLE_NAME: &str = "concordances";

#[derive(Debug, Clone, Default)]
pub struct ConcordancesTable;

impl ConcordancesTable {
    pub fn new() -> Self {
        Self
    }
}

/// `(source, other_id)` pairs from `wof:concordances`, e.g. `("gn:id", "5391959")`.
pub fn concordances(feature: &Feature) -> Result<Vec<(String, String)>> {
    let properties = feature.properties()?;
    let Some(map) = properties.object("wof:concordances") else {
        return Ok(Vec::new());
    };

    Ok(map
        .iter()
        .filter_map(|(source, value)| {
            let other_id = match value {
                Value::String(s) if !s.is_empty() => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            Some((source.clone(), other_id))
        })
        .collect())
}

#[async_trait]
impl Table for ConcordancesTable {
    fn name(&self) -> &str {
        TABLE_NAME
    }

    async fn setup(&self, db: &Database) -> std::result::Result<(), DbError> {
        execute_all(
            db,
            TABLE_NAME,
            &[
                "CREATE TABLE IF NOT EXISTS concordances (
                    id INTEGER NOT NULL,
                    other_id TEXT NOT NULL,
                    other_source TEXT NOT NULL,
                    lastmodified INTEGER
                )",
                "CREATE INDEX IF NOT EXISTS concordances_by_id ON concordances (id, lastmodified)",
                "CREATE INDEX IF NOT EXISTS concordances_by_other ON concordances (other_source, other_id)",
            ],
        )
        .await
    }

    async fn index_record(&self, db: &Database, feature: &Feature) -> Result<()> {
        let rows = concordances(feature)?;
        let lastmod = lastmodified(&feature.properties()?);
        let id = feature.id();

        let mut tx = db
            .pool()
            .begin()
            .await
            .map_err(write_error(TABLE_NAME, id))?;

        sqlx::query("DELETE FROM concordances WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(write_error(TABLE_NAME, id))?;

        for (source, other_id) in &rows {
            sqlx::query(
                "INSERT INTO concordances (id, other_id, other_source, lastmodified) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(id)
            .bind(other_id)
            .bind(source)
            .bind(lastmod)
            .execute(&mut *tx)
            .await
            .map_err(write_error(TABLE_NAME, id))?;
        }

        tx.commit().await.map_err(write_error(TABLE_NAME, id))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::test_support::*;

    #[tokio::test]
    async fn stores_string_and_numeric_concordances() {
        let db = memory_db().await;
        let table = ConcordancesTable::new();
        table.setup(&db).await.expect("setup");

        let record = feature(
            r#"{"properties":{"wof:id":85922583,
                "wof:concordances":{"gn:id":5391959,"wd:id":"Q62","qs:id":""}},
                "geometry":{"type":"Point","coordinates":[0,0]}}"#,
        );
        table.index_record(&db, &record).await.expect("index");

        assert_eq!(count(&db, "SELECT COUNT(*) FROM concordances").await, 2);
        let other: String = sqlx::query_scalar(
            "SELECT other_id FROM concordances WHERE other_source = 'gn:id'",
        )
        .fetch_one(db.pool())
        .await
        .expect("gn:id");
        assert_eq!(other, "5391959");
    }
}
