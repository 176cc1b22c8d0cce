//! The `geojson` table: the raw document for every record.
//!
//! This is the table the relation resolver consults to decide whether a
//! record is already indexed.

use super::{Table, alt_key, execute_all, lastmodified, write_error};
use crate::db::Database;
use crate::error::{DbError, Result};
use crate::feature::Feature;

use async_trait::async_trait;

pub const GEOJSON_TABLE_NAME: &str = "geojson";

#[derive(Debug, Clone)]
pub struct GeoJsonTable {
    index_alt_files: bool,
}

impl GeoJsonTable {
    pub fn new(index_alt_files: bool) -> Self {
        Self { index_alt_files }
    }
}

#[async_trait]
impl Table for GeoJsonTable {
    fn name(&self) -> &str {
        GEOJSON_TABLE_NAME
    }

    fn indexes_alt_files(&self) -> bool {
        self.index_alt_files
    }

    async fn setup(&self, db: &Database) -> std::result::Result<(), DbError> {
        execute_all(
            db,
            GEOJSON_TABLE_NAME,
            &[
                "CREATE TABLE IF NOT EXISTS geojson (
                    id INTEGER NOT NULL,
                    body TEXT NOT NULL,
                    is_alt BOOLEAN NOT NULL DEFAULT 0,
                    alt_label TEXT NOT NULL DEFAULT '',
                    lastmodified INTEGER NOT NULL DEFAULT 0,
                    PRIMARY KEY (id, alt_label)
                )",
                "CREATE INDEX IF NOT EXISTS geojson_by_lastmod ON geojson (lastmodified)",
                "CREATE INDEX IF NOT EXISTS geojson_by_alt ON geojson (id, is_alt)",
            ],
        )
        .await
    }

    async fn index_record(&self, db: &Database, feature: &Feature) -> Result<()> {
        // The body is stored verbatim; only lastmodified needs the parsed form.
        let lastmod = lastmodified(&feature.properties()?);
        let body = String::from_utf8_lossy(feature.bytes());

        sqlx::query(
            "INSERT OR REPLACE INTO geojson (id, body, is_alt, alt_label, lastmodified) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(feature.id())
        .bind(body.as_ref())
        .bind(feature.is_alt())
        .bind(alt_key(feature))
        .bind(lastmod)
        .execute(db.pool())
        .await
        .map_err(write_error(GEOJSON_TABLE_NAME, feature.id()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::test_support::*;

    #[tokio::test]
    async fn reindexing_replaces_the_row() {
        let db = memory_db().await;
        let table = GeoJsonTable::new(false);
        table.setup(&db).await.expect("setup");
        table.setup(&db).await.expect("setup is idempotent");

        let first = feature(
            r#"{"properties":{"wof:id":1,"wof:lastmodified":10},"geometry":{"type":"Point","coordinates":[0,0]}}"#,
        );
        let second = feature(
            r#"{"properties":{"wof:id":1,"wof:lastmodified":20},"geometry":{"type":"Point","coordinates":[1,1]}}"#,
        );

        table.index_record(&db, &first).await.expect("first");
        table.index_record(&db, &second).await.expect("second");

        assert_eq!(count(&db, "SELECT COUNT(*) FROM geojson").await, 1);
        assert_eq!(
            count(&db, "SELECT lastmodified FROM geojson WHERE id = 1").await,
            20
        );

        let body: String = sqlx::query_scalar("SELECT body FROM geojson WHERE id = 1")
            .fetch_one(db.pool())
            .await
            .expect("body");
        assert_eq!(body.as_bytes(), second.bytes());
    }

    #[tokio::test]
    async fn unparseable_fetched_body_fails_the_write() {
        let db = memory_db().await;
        let table = GeoJsonTable::new(false);
        table.setup(&db).await.expect("setup");

        let broken = Feature::fetched(7, b"<html>".to_vec());
        assert!(table.index_record(&db, &broken).await.is_err());
        assert_eq!(count(&db, "SELECT COUNT(*) FROM geojson").await, 0);
    }
}
