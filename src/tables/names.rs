//! The `names` table: one row per localized name.
//!
//! Names come from `name:{language}_x_{kind}` properties, for example
//! `name:eng_x_preferred` or `name:fra_x_variant`, each holding a list.

use super::{Table, execute_all, lastmodified, write_error};
use crate::db::Database;
use crate::error::{DbError, Result};
use crate::feature::Feature;

use async_trait::async_trait;
use serde_json::Value;

const TABLE_NAME: &str = "names";

#[derive(Debug, Clone, Default)]
pub struct NamesTable;

impl NamesTable {
    pub fn new() -> Self {
        Self
    }
}

/// A single localized name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalizedName {
    pub language: String,
    pub script: String,
    pub privateuse: String,
    pub name: String,
}

/// Every localized name on a feature.
pub fn localized_names(feature: &Feature) -> Result<Vec<LocalizedName>> {
    let mut names = Vec::new();

    for (key, value) in feature.properties()?.with_prefix("name:") {
        let Some((tag, privateuse)) = key["name:".len()..].split_once("_x_") else {
            continue;
        };
        let (language, script) = tag.split_once('_').unwrap_or((tag, ""));

        let values: Vec<&str> = match value {
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
            Value::String(s) => vec![s.as_str()],
            _ => Vec::new(),
        };

        for name in values.into_iter().filter(|name| !name.trim().is_empty()) {
            names.push(LocalizedName {
                language: language.to_string(),
                script: script.to_string(),
                privateuse: privateuse.to_string(),
                name: name.to_string(),
            });
        }
    }

    Ok(names)
}

#[async_trait]
impl Table for NamesTable {
    fn name(&self) -> &str {
        TABLE_NAME
    }

    async fn setup(&self, db: &Database) -> std::result::Result<(), DbError> {
        execute_all(
            db,
            TABLE_NAME,
            &[
                "CREATE TABLE IF NOT EXISTS names (
                    id INTEGER NOT NULL,
                    placetype TEXT,
                    country TEXT,
                    language TEXT,
                    script TEXT,
                    privateuse TEXT,
                    name TEXT,
                    lastmodified INTEGER
                )",
                "CREATE INDEX IF NOT EXISTS names_by_id ON names (id)",
                "CREATE INDEX IF NOT EXISTS names_by_name ON names (name, placetype, country)",
                "CREATE INDEX IF NOT EXISTS names_by_language ON names (language, privateuse, name)",
            ],
        )
        .await
    }

    async fn index_record(&self, db: &Database, feature: &Feature) -> Result<()> {
        let properties = feature.properties()?;
        let names = localized_names(feature)?;
        let placetype = properties.str("wof:placetype").unwrap_or_default();
        let country = properties.str("wof:country").unwrap_or_default();
        let lastmod = lastmodified(&properties);
        let id = feature.id();

        let mut tx = db
            .pool()
            .begin()
            .await
            .map_err(write_error(TABLE_NAME, id))?;

        sqlx::query("DELETE FROM names WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(write_error(TABLE_NAME, id))?;

        for name in &names {
            sqlx::query(
                "INSERT INTO names (id, placetype, country, language, script, privateuse, name, lastmodified) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind(placetype)
            .bind(country)
            .bind(&name.language)
            .bind(&name.script)
            .bind(&name.privateuse)
            .bind(&name.name)
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

    const MONTREAL: &str = r#"{
        "properties": {
            "wof:id": 101736545,
            "wof:placetype": "locality",
            "wof:country": "CA",
            "wof:name": "Montreal",
            "name:eng_x_preferred": ["Montreal"],
            "name:fra_x_preferred": ["Montréal"],
            "name:fra_x_variant": ["Ville-Marie", ""],
            "name:zho_hant_x_preferred": "蒙特婁"
        },
        "geometry": { "type": "Point", "coordinates": [-73.6, 45.5] }
    }"#;

    #[test]
    fn parses_language_script_and_kind() {
        let names = localized_names(&feature(MONTREAL)).expect("names");
        assert_eq!(names.len(), 4);
        assert!(names.contains(&LocalizedName {
            language: "zho".into(),
            script: "hant".into(),
            privateuse: "preferred".into(),
            name: "蒙特婁".into(),
        }));
        assert!(names.iter().all(|name| !name.name.is_empty()));
    }

    #[tokio::test]
    async fn reindexing_does_not_duplicate_names() {
        let db = memory_db().await;
        let table = NamesTable::new();
        table.setup(&db).await.expect("setup");

        let montreal = feature(MONTREAL);
        table.index_record(&db, &montreal).await.expect("index");
        table.index_record(&db, &montreal).await.expect("reindex");

        assert_eq!(count(&db, "SELECT COUNT(*) FROM names").await, 4);
        assert_eq!(
            count(&db, "SELECT COUNT(*) FROM names WHERE language = 'fra'").await,
            2
        );
    }
}
