//! Relation closure: index the records a feature points at.
//!
//! After a record is written, its `wof:belongsto`, `wof:involves` and
//! `wof:depicts` ids are collected, filtered against what this run has already
//! claimed and what the database already holds, fetched from a reader and
//! written to every configured table.
//!
//! Only one level is followed. Records fetched this way are indexed but their
//! own relations are not walked.

pub mod exists;
pub mod extract;
pub mod resolver;
pub mod seen;

pub use exists::ExistenceCheck;
pub use extract::{Relation, extract_relations};
pub use resolver::{RelationResolver, ResolveStats, ResolverOptions};
pub use seen::SeenSet;
