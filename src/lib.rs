//! Index Who's On First feature records into SQLite.
//!
//! Candidate documents are enumerated from a source tree, admitted if they
//! carry a numeric id and a supported geometry, and written to a configurable
//! set of denormalized tables. Optionally the records each document refers to
//! (`wof:belongsto`, `wof:involves`, `wof:depicts`) are fetched and indexed
//! too, exactly once per run.

pub mod admission;
pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod feature;
pub mod indexer;
pub mod iterate;
pub mod reader;
pub mod relations;
pub mod tables;
pub mod uri;

pub use admission::{Admission, AdmissionOptions, Admitter};
pub use config::IndexConfig;
pub use db::{Database, DatabaseOptions};
pub use error::{Error, Result};
pub use feature::Feature;
pub use indexer::{FeatureIndexer, IndexStats, IndexerOptions};
pub use iterate::IteratorMode;
pub use reader::{Reader, new_reader};
pub use relations::{RelationResolver, ResolverOptions, SeenSet};
pub use tables::{Table, TableSet};
