//! Run-scoped record of relation ids already claimed by some worker.

use parking_lot::Mutex;
use std::collections::HashSet;

/// Ids claimed during one indexing run.
///
/// Grows for the life of the run and is never persisted; a new run starts
/// empty and relies on the database existence check instead.
#[derive(Debug, Default)]
pub struct SeenSet {
    ids: Mutex<HashSet<i64>>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id`. Returns `true` for exactly one caller per id; everyone
    /// else gets `false` and must skip it.
    pub fn test_and_mark(&self, id: i64) -> bool {
        self.ids.lock().insert(id)
    }

    /// Number of ids claimed so far.
    pub fn claimed(&self) -> usize {
        self.ids.lock().len()
    }
}
