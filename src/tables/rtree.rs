//! The `rtree` table: bounding boxes in an SQLite R*Tree for spatial lookups.
//!
//! Multi-part geometries get one box per part so a query window between the
//! parts of, say, an island chain does not match.

use super::{Table, alt_key, execute_all, lastmodified, write_error};
use crate::db::Database;
use crate::error::{DbError, Result};
use crate::feature::{Feature, bounding_box};

use async_trait::async_trait;
use serde_json::{Value, json};

const TABLE_NAME: &str = "rtree";

#[derive(Debug, Clone)]
pub struct RTreeTable {
    index_alt_files: bool,
}

impl RTreeTable {
    pub fn new(index_alt_files: bool) -> Self {
        Self { index_alt_files }
    }
}

/// One box per geometry part, as `(min_x, min_y, max_x, max_y)`.
pub fn part_boxes(geometry: &Value) -> Vec<(f64, f64, f64, f64)> {
    match geometry.get("type").and_then(Value::as_str) {
        Some("MultiPolygon") => geometry
            .get("coordinates")
            .and_then(Value::as_array)
            .map(|polygons| {
                polygons
                    .iter()
                    .filter_map(|rings| {
                        bounding_box(&json!({ "type": "Polygon", "coordinates": rings }))
                    })
                    .collect()
            })
            .unwrap_or_default(),
        Some("GeometryCollection") => geometry
            .get("geometries")
            .and_then(Value::as_array)
            .map(|members| members.iter().flat_map(part_boxes).collect())
            .unwrap_or_default(),
        _ => bounding_box(geometry).into_iter().collect(),
    }
}

#[async_trait]
impl Table for RTreeTable {
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
            &["CREATE VIRTUAL TABLE IF NOT EXISTS rtree USING rtree (
                id,
                min_x, max_x,
                min_y, max_y,
                +wof_id INTEGER,
                +is_alt TINYINT,
                +alt_label TEXT,
                +lastmodified INTEGER
            )"],
        )
        .await
    }

    async fn index_record(&self, db: &Database, feature: &Feature) -> Result<()> {
        let boxes = part_boxes(feature.geometry()?);
        let lastmod = lastmodified(&feature.properties()?);
        let id = feature.id();

        let mut tx = db
            .pool()
            .begin()
            .await
            .map_err(write_error(TABLE_NAME, id))?;

        sqlx::query("DELETE FROM rtree WHERE wof_id = ? AND alt_label = ?")
            .bind(id)
            .bind(alt_key(feature))
            .execute(&mut *tx)
            .await
            .map_err(write_error(TABLE_NAME, id))?;

        for (min_x, min_y, max_x, max_y) in boxes {
            sqlx::query(
                "INSERT INTO rtree (min_x, max_x, min_y, max_y, wof_id, is_alt, alt_label, lastmodified) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(min_x)
            .bind(max_x)
            .bind(min_y)
            .bind(max_y)
            .bind(id)
            .bind(feature.is_alt())
            .bind(alt_key(feature))
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

    const ISLANDS: &str = r#"{
        "properties": { "wof:id": 77 },
        "geometry": {
            "type": "MultiPolygon",
            "coordinates": [
                [[[0, 0], [1, 0], [1, 1], [0, 0]]],
                [[[10, 10], [11, 10], [11, 11], [10, 10]]]
            ]
        }
    }"#;

    #[test]
    fn multipolygons_get_a_box_per_part() {
        let geometry: Value = serde_json::from_str::<Value>(ISLANDS).expect("json")["geometry"].clone();
        assert_eq!(
            part_boxes(&geometry),
            vec![(0.0, 0.0, 1.0, 1.0), (10.0, 10.0, 11.0, 11.0)]
        );
    }

    #[tokio::test]
    async fn boxes_are_queryable_by_window() {
        let db = memory_db().await;
        let table = RTreeTable::new(false);
        table.setup(&db).await.expect("setup");

        let record = feature(ISLANDS);
        table.index_record(&db, &record).await.expect("index");
        table.index_record(&db, &record).await.expect("reindex");

        assert_eq!(count(&db, "SELECT COUNT(*) FROM rtree WHERE wof_id = 77").await, 2);
        assert_eq!(
            count(
                &db,
                "SELECT COUNT(*) FROM rtree WHERE min_x <= 5 AND max_x >= 4 AND min_y <= 5 AND max_y >= 4"
            )
            .await,
            0
        );
        assert_eq!(
            count(
                &db,
                "SELECT COUNT(*) FROM rtree WHERE min_x <= 10.5 AND max_x >= 10.5 AND min_y <= 10.5 AND max_y >= 10.5"
            )
            .await,
            1
        );
    }
}
