//! Run configuration.
//!
//! Values come from an optional TOML file; command-line flags that were
//! given explicitly override it (see `main.rs`).

use crate::error::ConfigError;
use crate::tables::{
    AncestorsTable, ConcordancesTable, GeoJsonTable, NamesTable, PropertiesTable, RTreeTable,
    SearchTable, SprTable, SupersedesTable, Table, TableSet,
};

use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

/// Everything needed for one indexing run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// How source arguments are enumerated, e.g. `repo://` or `directory://`.
    pub iterator_uri: String,
    /// SQLite database path, or `:memory:`.
    pub database_uri: String,
    /// Documents indexed concurrently.
    pub processes: usize,
    pub live_hard_die_fast: bool,
    /// Run `PRAGMA optimize` before closing.
    pub optimize: bool,
    pub timings: bool,
    pub index_alt_files: bool,
    pub strict_alt_files: bool,
    pub tables: TableSelection,
    pub relations: RelationsConfig,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            iterator_uri: "repo://".into(),
            database_uri: ":memory:".into(),
            processes: default_processes(),
            live_hard_die_fast: true,
            optimize: true,
            timings: false,
            index_alt_files: false,
            strict_alt_files: true,
            tables: TableSelection::default(),
            relations: RelationsConfig::default(),
        }
    }
}

fn default_processes() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() * 2)
        .unwrap_or(8)
}

/// Which tables to write.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TableSelection {
    /// Every table except `search`.
    pub all: bool,
    /// The tables spatial lookups need: `rtree`, `geojson`, `properties`, `spr`.
    pub spatial_tables: bool,
    pub ancestors: bool,
    pub concordances: bool,
    pub geojson: bool,
    pub names: bool,
    pub rtree: bool,
    pub properties: bool,
    pub search: bool,
    pub spr: bool,
    pub supersedes: bool,
}

impl TableSelection {
    /// Apply `all` and `spatial_tables` to the individual toggles.
    pub fn expanded(&self) -> Self {
        let mut tables = self.clone();

        if tables.spatial_tables {
            tables.rtree = true;
            tables.geojson = true;
            tables.properties = true;
            tables.spr = true;
        }

        if tables.all {
            tables.ancestors = true;
            tables.concordances = true;
            tables.geojson = true;
            tables.names = true;
            tables.rtree = true;
            tables.properties = true;
            tables.spr = true;
            tables.supersedes = true;
        }

        tables
    }

    /// Build the selected tables in write order.
    pub fn build(&self, index_alt_files: bool) -> TableSet {
        let selected = self.expanded();
        let mut tables: Vec<Arc<dyn Table>> = Vec::new();

        if selected.geojson {
            tables.push(Arc::new(GeoJsonTable::new(index_alt_files)));
        }
        if selected.supersedes {
            tables.push(Arc::new(SupersedesTable::new()));
        }
        if selected.rtree {
            tables.push(Arc::new(RTreeTable::new(index_alt_files)));
        }
        if selected.properties {
            tables.push(Arc::new(PropertiesTable::new(index_alt_files)));
        }
        if selected.spr {
            tables.push(Arc::new(SprTable::new(index_alt_files)));
        }
        if selected.names {
            tables.push(Arc::new(NamesTable::new()));
        }
        if selected.ancestors {
            tables.push(Arc::new(AncestorsTable::new()));
        }
        if selected.concordances {
            tables.push(Arc::new(ConcordancesTable::new()));
        }
        if selected.search {
            tables.push(Arc::new(SearchTable::new()));
        }

        TableSet::new(tables)
    }
}

/// Relation following.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RelationsConfig {
    /// Index records referenced by `wof:belongsto`, `wof:involves` and `wof:depicts`.
    pub enabled: bool,
    /// Reader URI related records are fetched from.
    pub reader_uri: Option<String>,
    /// Fail instead of skipping when a related record cannot be fetched.
    pub strict: bool,
}

impl IndexConfig {
    /// Load a TOML config file. Keys left out keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let tables = self.tables.expanded();

        if self.tables.build(self.index_alt_files).is_empty() {
            return Err(ConfigError::Invalid(
                "no tables selected; pass --all or one or more table flags".into(),
            ));
        }

        if self.processes == 0 {
            return Err(ConfigError::Invalid("processes must be at least 1".into()));
        }

        if self.relations.enabled {
            if self
                .relations
                .reader_uri
                .as_deref()
                .is_none_or(|uri| uri.trim().is_empty())
            {
                return Err(ConfigError::Invalid(
                    "indexing relations requires a reader URI".into(),
                ));
            }
            if !tables.geojson {
                return Err(ConfigError::Invalid(
                    "indexing relations requires the geojson table".into(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn all_leaves_out_search() {
        let selection = TableSelection {
            all: true,
            ..TableSelection::default()
        };
        assert_eq!(
            selection.build(false).names(),
            vec![
                "geojson",
                "supersedes",
                "rtree",
                "properties",
                "spr",
                "names",
                "ancestors",
                "concordances"
            ]
        );
    }

    #[test]
    fn spatial_tables_expand() {
        let selection = TableSelection {
            spatial_tables: true,
            ..TableSelection::default()
        };
        assert_eq!(
            selection.build(false).names(),
            vec!["geojson", "rtree", "properties", "spr"]
        );
    }

    #[test]
    fn parses_partial_toml() {
        let config = IndexConfig::from_toml(indoc! {r#"
            database_uri = "/tmp/wof.db"
            processes = 3

            [tables]
            geojson = true
            names = true

            [relations]
            enabled = true
            reader_uri = "https://data.whosonfirst.org"
        "#})
        .expect("parse");

        assert_eq!(config.database_uri, "/tmp/wof.db");
        assert_eq!(config.processes, 3);
        assert_eq!(config.iterator_uri, "repo://");
        assert!(config.optimize);
        assert!(config.strict_alt_files);
        assert!(!config.relations.strict);
        assert_eq!(config.tables.build(false).names(), vec!["geojson", "names"]);
        config.validate().expect("valid");
    }

    #[test]
    fn validation_catches_unusable_configs() {
        let mut config = IndexConfig::default();
        assert!(config.validate().is_err());

        config.tables.names = true;
        config.validate().expect("names alone is fine");

        config.relations.enabled = true;
        config.relations.reader_uri = Some("fs:///data".into());
        assert!(config.validate().is_err(), "relations need the geojson table");

        config.tables.geojson = true;
        config.validate().expect("valid");

        config.relations.reader_uri = None;
        assert!(config.validate().is_err(), "relations need a reader");
    }
}
