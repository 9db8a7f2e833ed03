//! Append-only crawl worklist with a read cursor.

use crate::endpoint::{Endpoint, Fingerprint, FingerprintScope, fingerprint_with};
use std::collections::HashSet;

/// Growing FIFO of discovered endpoints.
///
/// Entries are never removed. The cursor only moves forward and will reach
/// entries appended after draining began. At most one endpoint per
/// fingerprint is ever admitted.
#[derive(Debug, Default)]
pub struct Frontier {
    entries: Vec<Endpoint>,
    fingerprints: HashSet<Fingerprint>,
    cursor: usize,
    scope: FingerprintScope,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scope(scope: FingerprintScope) -> Self {
        Self {
            scope,
            ..Self::default()
        }
    }

    pub fn is_known(&self, endpoint: &Endpoint) -> bool {
        self.fingerprints
            .contains(&fingerprint_with(endpoint, self.scope))
    }

    /// Appends `endpoint` unless its fingerprint is already present.
    pub fn push(&mut self, endpoint: Endpoint) -> bool {
        if !self.fingerprints.insert(fingerprint_with(&endpoint, self.scope)) {
            return false;
        }
        self.entries.push(endpoint);
        true
    }

    /// Returns how many of `endpoints` were admitted.
    pub fn extend(&mut self, endpoints: impl IntoIterator<Item = Endpoint>) -> usize {
        endpoints
            .into_iter()
            .filter(|endpoint| self.push(endpoint.clone()))
            .count()
    }

    /// Next unvisited entry, advancing the cursor.
    pub fn next_entry(&mut self) -> Option<Endpoint> {
        let entry = self.entries.get(self.cursor).cloned()?;
        self.cursor += 1;
        Some(entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Endpoint] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Endpoint> {
        self.entries
    }
}
