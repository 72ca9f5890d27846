//! Name-keyed registry of connection records.
//!
//! The registry holds the single resolved view of every connection source.
//! It is rebuilt wholesale by [`ConnectionRegistry::merge`], never patched
//! incrementally, so readers either see the previous resolved map or the
//! complete new one, with nothing in between.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::record::{ConnectionRecord, DEFAULT_SSH_PORT, RecordSource, expand_tilde};

/// The resolved name->record map plus acceptance order.
#[derive(Debug, Default)]
struct Resolved {
    /// Records in acceptance order (priority, then source order).
    records: Vec<ConnectionRecord>,
    /// Name -> index into `records`.
    index: HashMap<String, usize>,
}

impl Resolved {
    /// Accept one record if it is complete and its name is still free.
    ///
    /// Port and key-path normalization happen here so that everything stored
    /// in the resolved map is directly usable.
    fn accept(&mut self, mut record: ConnectionRecord) {
        if !record.is_complete() {
            warn!(
                name = %record.name,
                source = %record.source,
                "skipping connection record with missing name/host/username"
            );
            return;
        }
        if self.index.contains_key(&record.name) {
            debug!(
                name = %record.name,
                source = %record.source,
                "discarding lower-priority definition"
            );
            return;
        }

        normalize(&mut record);
        self.index.insert(record.name.clone(), self.records.len());
        self.records.push(record);
    }

    fn insert_or_replace(&mut self, record: ConnectionRecord) {
        match self.index.get(&record.name) {
            Some(&i) => self.records[i] = record,
            None => {
                self.index.insert(record.name.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    fn remove(&mut self, name: &str) -> bool {
        let Some(removed) = self.index.remove(name) else {
            return false;
        };
        self.records.remove(removed);
        // Indices after the removed slot shifted down by one.
        for index in self.index.values_mut() {
            if *index > removed {
                *index -= 1;
            }
        }
        true
    }
}

fn normalize(record: &mut ConnectionRecord) {
    if record.port == 0 {
        record.port = DEFAULT_SSH_PORT;
    }
    if let Some(path) = &record.private_key_path {
        record.private_key_path = Some(expand_tilde(path));
    }
}

/// Merged view of all connection sources.
///
/// Shared, read-mostly state: `get`/`list` take the read lock, `merge` builds
/// the full replacement before swapping it in under the write lock.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    inner: RwLock<Resolved>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience for callers that share the registry across tasks.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Rebuild the resolved map from `sources`, highest priority first.
    ///
    /// For a name defined by several sources the record from the first source
    /// that defines it wins verbatim; later definitions are discarded whole.
    /// Invalid entries are skipped with a diagnostic; the merge itself never
    /// fails, and merging the same input twice yields the same state.
    pub fn merge(&self, sources: &[Vec<ConnectionRecord>]) {
        let mut next = Resolved::default();
        for source in sources {
            for record in source {
                next.accept(record.clone());
            }
        }
        debug!(accepted = next.records.len(), "registry merge complete");
        *self.inner.write() = next;
    }

    /// Look up a record by its exact, case-sensitive name.
    pub fn get(&self, name: &str) -> Option<ConnectionRecord> {
        let inner = self.inner.read();
        inner.index.get(name).map(|&i| inner.records[i].clone())
    }

    /// All resolved records in acceptance order.
    pub fn list(&self) -> Vec<ConnectionRecord> {
        self.inner.read().records.clone()
    }

    /// Insert or overwrite a record directly, bypassing merge precedence.
    ///
    /// The record is tagged `Manual` regardless of what it claimed; a later
    /// full reload re-establishes merge precedence.
    pub fn add_manual(&self, mut record: ConnectionRecord) {
        record.source = RecordSource::Manual;
        normalize(&mut record);
        debug!(name = %record.name, "adding manual connection");
        self.inner.write().insert_or_replace(record);
    }

    /// Remove a manually-added record.
    ///
    /// Returns `false` (leaving the registry unchanged) when the name is
    /// absent or resolves to a non-manual record.
    pub fn remove_manual(&self, name: &str) -> bool {
        let mut inner = self.inner.write();
        let is_manual = match inner.index.get(name) {
            Some(&i) => inner.records[i].source == RecordSource::Manual,
            None => return false,
        };
        if !is_manual {
            warn!(name, "refusing to remove non-manual connection");
            return false;
        }
        inner.remove(name)
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }
}
