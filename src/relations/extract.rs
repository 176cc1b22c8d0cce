//! Relation id extraction.

use crate::feature::{Properties, as_integer};

use serde_json::Value;
use std::collections::HashSet;

/// The relation properties that are followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    BelongsTo,
    Involves,
    Depicts,
}

impl Relation {
    pub const ALL: [Relation; 3] = [Relation::BelongsTo, Relation::Involves, Relation::Depicts];

    /// Property key holding this relation's ids.
    pub fn property(&self) -> &'static str {
        match self {
            Relation::BelongsTo => "wof:belongsto",
            Relation::Involves => "wof:involves",
            Relation::Depicts => "wof:depicts",
        }
    }

    /// Positive ids listed under this relation. A missing property yields none.
    pub fn ids(&self, properties: &Properties<'_>) -> impl Iterator<Item = i64> {
        properties
            .list(self.property())
            .into_iter()
            .filter_map(as_integer)
            .filter(|id| *id > 0)
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.property())
    }
}

/// Distinct positive relation ids referenced by a document.
///
/// Zero and negative values are placeholders upstream and never refer to a
/// record, so they are dropped here.
pub fn extract_relations(document: &Value) -> HashSet<i64> {
    let properties = Properties::of(document);
    Relation::ALL
        .iter()
        .flat_map(|relation| relation.ids(&properties))
        .collect()
}
