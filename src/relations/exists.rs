//! Existence check against the destination `geojson` table.

use crate::db::Database;
use crate::error::DbError;
use crate::tables::geojson::GEOJSON_TABLE_NAME;

/// Answers "is this id already indexed?" from the `geojson` table.
///
/// Each check is a single read on the shared pool, so it sees every write
/// committed earlier in the run.
#[derive(Debug, Clone)]
pub struct ExistenceCheck {
    db: Database,
    sql: String,
}

impl ExistenceCheck {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            sql: format!("SELECT COUNT(id) FROM {GEOJSON_TABLE_NAME} WHERE id = ?"),
        }
    }

    pub async fn exists(&self, id: i64) -> Result<bool, DbError> {
        let count: i64 = sqlx::query_scalar(&self.sql)
            .bind(id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::test_support::*;
    use crate::tables::{GeoJsonTable, Table};

    #[tokio::test]
    async fn observes_rows_written_earlier_in_the_run() {
        let db = memory_db().await;
        let table = GeoJsonTable::new(false);
        table.setup(&db).await.expect("setup");

        let check = ExistenceCheck::new(db.clone());
        assert!(!check.exists(200).await.expect("exists"));

        let record = feature(
            r#"{"properties":{"wof:id":200},"geometry":{"type":"Point","coordinates":[0,0]}}"#,
        );
        table.index_record(&db, &record).await.expect("index");

        assert!(check.exists(200).await.expect("exists"));
    }

    #[tokio::test]
    async fn missing_table_is_a_database_error() {
        let db = memory_db().await;
        let check = ExistenceCheck::new(db);
        assert!(check.exists(1).await.is_err());
    }
}
