//! The `spr` table: one "standard place response" row per record.
//!
//! A flat summary (name, placetype, centroid, bounding box, lifecycle flags)
//! suitable for spatial lookups without parsing the full document.

use super::{Table, alt_key, execute_all, lastmodified, write_error};
use crate::db::Database;
use crate::error::{DbError, Result};
use crate::feature::{Feature, Properties, as_integer, bounding_box};

use async_trait::async_trait;

const TABLE_NAME: &str = "spr";

/// Date values WOF uses for "unknown" or "still going".
const UNKNOWN_DATES: &[&str] = &["", "u", "uuuu", "open", ".."];

#[derive(Debug, Clone)]
pub struct SprTable {
    index_alt_files: bool,
}

impl SprTable {
    pub fn new(index_alt_files: bool) -> Self {
        Self { index_alt_files }
    }
}

/// Flattened place summary.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardPlace {
    pub id: i64,
    pub parent_id: i64,
    pub name: String,
    pub placetype: String,
    pub country: String,
    pub repo: String,
    pub latitude: f64,
    pub longitude: f64,
    pub min_latitude: f64,
    pub min_longitude: f64,
    pub max_latitude: f64,
    pub max_longitude: f64,
    pub is_current: i64,
    pub is_deprecated: bool,
    pub is_ceased: bool,
    pub is_superseded: bool,
    pub is_superseding: bool,
    pub superseded_by: String,
    pub supersedes: String,
    pub belongs_to: String,
    pub lastmodified: i64,
}

impl StandardPlace {
    pub fn from_feature(feature: &Feature) -> Result<Self> {
        let properties = feature.properties()?;
        let geometry = feature.geometry()?;

        let (min_x, min_y, max_x, max_y) = declared_bbox(&properties)
            .or_else(|| bounding_box(geometry))
            .unwrap_or_default();

        let latitude = properties
            .f64("lbl:latitude")
            .or_else(|| properties.f64("geom:latitude"))
            .unwrap_or((min_y + max_y) / 2.0);
        let longitude = properties
            .f64("lbl:longitude")
            .or_else(|| properties.f64("geom:longitude"))
            .unwrap_or((min_x + max_x) / 2.0);

        let superseded_by = id_list(&properties, "wof:superseded_by");
        let supersedes = id_list(&properties, "wof:supersedes");

        Ok(Self {
            id: feature.id(),
            parent_id: properties.i64("wof:parent_id").unwrap_or(-1),
            name: properties.str("wof:name").unwrap_or_default().to_string(),
            placetype: properties.str("wof:placetype").unwrap_or_default().to_string(),
            country: properties.str("wof:country").unwrap_or_default().to_string(),
            repo: properties.str("wof:repo").unwrap_or_default().to_string(),
            latitude,
            longitude,
            min_latitude: min_y,
            min_longitude: min_x,
            max_latitude: max_y,
            max_longitude: max_x,
            is_current: properties.i64("mz:is_current").unwrap_or(-1),
            is_deprecated: is_known_date(&properties, "edtf:deprecated"),
            is_ceased: is_known_date(&properties, "edtf:cessation"),
            is_superseded: !superseded_by.is_empty(),
            is_superseding: !supersedes.is_empty(),
            superseded_by: join_ids(&superseded_by),
            supersedes: join_ids(&supersedes),
            belongs_to: join_ids(&id_list(&properties, "wof:belongsto")),
            lastmodified: lastmodified(&properties),
        })
    }
}

fn declared_bbox(properties: &Properties<'_>) -> Option<(f64, f64, f64, f64)> {
    let raw = properties.str("geom:bbox")?;
    let values: Vec<f64> = raw
        .split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect();
    match values.as_slice() {
        [min_x, min_y, max_x, max_y] => Some((*min_x, *min_y, *max_x, *max_y)),
        _ => None,
    }
}

fn is_known_date(properties: &Properties<'_>, key: &str) -> bool {
    properties
        .str(key)
        .is_some_and(|value| !UNKNOWN_DATES.contains(&value.trim()))
}

fn id_list(properties: &Properties<'_>, key: &str) -> Vec<i64> {
    properties
        .list(key)
        .into_iter()
        .filter_map(as_integer)
        .collect()
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait]
impl Table for SprTable {
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
                "CREATE TABLE IF NOT EXISTS spr (
                    id INTEGER NOT NULL,
                    parent_id INTEGER,
                    name TEXT,
                    placetype TEXT,
                    country TEXT,
                    repo TEXT,
                    latitude REAL,
                    longitude REAL,
                    min_latitude REAL,
                    min_longitude REAL,
                    max_latitude REAL,
                    max_longitude REAL,
                    is_current INTEGER,
                    is_deprecated INTEGER,
                    is_ceased INTEGER,
                    is_superseded INTEGER,
                    is_superseding INTEGER,
                    superseded_by TEXT,
                    supersedes TEXT,
                    belongsto TEXT,
                    is_alt BOOLEAN NOT NULL DEFAULT 0,
                    alt_label TEXT NOT NULL DEFAULT '',
                    lastmodified INTEGER,
                    PRIMARY KEY (id, alt_label)
                )",
                "CREATE INDEX IF NOT EXISTS spr_by_lastmod ON spr (lastmodified)",
                "CREATE INDEX IF NOT EXISTS spr_by_parent ON spr (parent_id, is_current, lastmodified)",
                "CREATE INDEX IF NOT EXISTS spr_by_placetype ON spr (placetype, is_current, lastmodified)",
                "CREATE INDEX IF NOT EXISTS spr_by_country ON spr (country, placetype, is_current, lastmodified)",
                "CREATE INDEX IF NOT EXISTS spr_by_name ON spr (name, placetype, is_current, lastmodified)",
                "CREATE INDEX IF NOT EXISTS spr_by_centroid ON spr (latitude, longitude, is_current, lastmodified)",
            ],
        )
        .await
    }

    async fn index_record(&self, db: &Database, feature: &Feature) -> Result<()> {
        let place = StandardPlace::from_feature(feature)?;

        sqlx::query(
            "INSERT OR REPLACE INTO spr (
                id, parent_id, name, placetype, country, repo,
                latitude, longitude, min_latitude, min_longitude, max_latitude, max_longitude,
                is_current, is_deprecated, is_ceased, is_superseded, is_superseding,
                superseded_by, supersedes, belongsto, is_alt, alt_label, lastmodified
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(place.id)
        .bind(place.parent_id)
        .bind(&place.name)
        .bind(&place.placetype)
        .bind(&place.country)
        .bind(&place.repo)
        .bind(place.latitude)
        .bind(place.longitude)
        .bind(place.min_latitude)
        .bind(place.min_longitude)
        .bind(place.max_latitude)
        .bind(place.max_longitude)
        .bind(place.is_current)
        .bind(place.is_deprecated)
        .bind(place.is_ceased)
        .bind(place.is_superseded)
        .bind(place.is_superseding)
        .bind(&place.superseded_by)
        .bind(&place.supersedes)
        .bind(&place.belongs_to)
        .bind(feature.is_alt())
        .bind(alt_key(feature))
        .bind(place.lastmodified)
        .execute(db.pool())
        .await
        .map_err(write_error(TABLE_NAME, feature.id()))?;

        Ok(())
    }
}
