//! Seen-set for article identifiers.
//!
//! The listing is re-read after every scroll, so most cards show up many
//! times. [`Deduplicator`] decides which ones are new:
//!
//! - [`Deduplicator::mark`] records an id and reports whether it was new
//! - [`Deduplicator::note_duplicate`] counts a repeat found inside a single
//!   snapshot; cards carried over from an earlier scroll are skipped
//!   without counting
//!
//! One instance lives for a whole run. It is not reset between the listing
//! and enrichment phases, so `unique_count() + duplicates()` is the number
//! of cards found.

use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
    duplicates: usize,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Record `id`. Returns `true` if it was new.
    pub fn mark(&mut self, id: &str) -> bool {
        self.seen.insert(id.to_string())
    }

    /// Count a rejected repeat.
    pub fn note_duplicate(&mut self) {
        self.duplicates += 1;
    }

    /// Unique identifiers seen so far.
    pub fn unique_count(&self) -> usize {
        self.seen.len()
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }
}
