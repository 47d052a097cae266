//! In-memory sets of already-delivered identities.
//!
//! Seeded from persisted state at the start of a run. Entries are only ever
//! added during a run; identities recorded since seeding are tracked
//! separately so the state layer can persist just the new ones.

use std::collections::HashSet;

#[derive(Debug, Default, Clone)]
pub struct DedupStore {
    events: HashSet<String>,
    documents: HashSet<String>,
    new_events: Vec<String>,
    new_documents: Vec<String>,
}

impl DedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store seeded with identities from earlier runs.
    pub fn seeded<E, D>(events: E, documents: D) -> Self
    where
        E: IntoIterator<Item = String>,
        D: IntoIterator<Item = String>,
    {
        Self {
            events: events.into_iter().collect(),
            documents: documents.into_iter().collect(),
            new_events: Vec::new(),
            new_documents: Vec::new(),
        }
    }

    pub fn has_event(&self, id: &str) -> bool {
        self.events.contains(id)
    }

    pub fn record_event(&mut self, id: &str) {
        if self.events.insert(id.to_string()) {
            self.new_events.push(id.to_string());
        }
    }

    pub fn has_document(&self, id: &str) -> bool {
        self.documents.contains(id)
    }

    pub fn record_document(&mut self, id: &str) {
        if self.documents.insert(id.to_string()) {
            self.new_documents.push(id.to_string());
        }
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Event identities recorded since seeding, in recording order.
    pub fn new_events(&self) -> &[String] {
        &self.new_events
    }

    /// Document identities recorded since seeding, in recording order.
    pub fn new_documents(&self) -> &[String] {
        &self.new_documents
    }
}
