//! The `properties` table: a record's full property bag as JSON.

use super::{Table, alt_key, execute_all, lastmodified, write_error};
use crate::db::Database;
use crate::error::{DbError, Result};
use crate::feature::Feature;

use async_trait::async_trait;

const TABLE_NAME: &str = "properties";

#[derive(Debug, Clone)]
pub struct PropertiesTable {
    index_alt_files: bool,
}

impl PropertiesTable {
    pub fn new(index_alt_files: bool) -> Self {
        Self { index_alt_files }
    }
}

#[async_trait]
impl Table for PropertiesTable {
    fn name(&self) -> &str {
        TABLE_NAME
    }

    fn indexes_alt_files(&self) -> bool {
        self.index_alt_files
    }

    async fn setup(&self, db: &Database) -> std::result::Result<(), DbError> {
        execute_all(
            db,
            TABLE_NAME,
            &[
                "CREATE TABLE IF NOT EXISTS properties (
                    id INTEGER NOT NULL,
                    body TEXT NOT NULL,
                    is_alt BOOLEAN NOT NULL DEFAULT 0,
                    alt_label TEXT NOT NULL DEFAULT '',
                    lastmodified INTEGER NOT NULL DEFAULT 0,
                    PRIMARY KEY (id, alt_label)
                )",
                "CREATE INDEX IF NOT EXISTS properties_by_lastmod ON properties (lastmodified)",
            ],
        )
        .await
    }

    async fn index_record(&self, db: &Database, feature: &Feature) -> Result<()> {
        let properties = feature.properties()?;
        let body = match properties.raw() {
            Some(map) => serde_json::Value::Object(map.clone()).to_string(),
            None => "{}".to_string(),
        };

        sqlx::query(
            "INSERT OR REPLACE INTO properties (id, body, is_alt, alt_label, lastmodified) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(feature.id())
        .bind(body)
        .bind(feature.is_alt())
        .bind(alt_key(feature))
        .bind(lastmodified(&properties))
        .execute(db.pool())
        .await
        .map_err(write_error(TABLE_NAME, feature.id()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::test_support::*;

    #[tokio::test]
    async fn stores_properties_as_json() {
        let db = memory_db().await;
        let table = PropertiesTable::new(false);
        table.setup(&db).await.expect("setup");

        let feature = feature(
            r#"{"properties":{"wof:id":5,"wof:name":"Five"},"geometry":{"type":"Point","coordinates":[0,0]}}"#,
        );
        table.index_record(&db, &feature).await.expect("index");

        let body: String = sqlx::query_scalar("SELECT body FROM properties WHERE id = 5")
            .fetch_one(db.pool())
            .await
            .expect("body");
        let parsed: serde_json::Value = serde_json::from_str(&body).expect("json");
        assert_eq!(parsed["wof:name"], "Five");
    }
}
