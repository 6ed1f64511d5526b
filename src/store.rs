//! Covenant document storage and external adapter seams.
//!
//! Provides the trait-based storage abstraction the kernel consumes and an
//! in-memory implementation. Stores are keyed by document id and emit
//! change events synchronously during the mutating call. The `Clock` trait
//! is the injection point for time-dependent callers; kernel functions also
//! accept an explicit instant for deterministic tests.

use crate::covenant::CovenantDocument;
use crate::PactumError;
use std::collections::HashMap;
use tracing::debug;

/// A change notification emitted by a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Put { id: String },
    Delete { id: String },
}

/// Handle returned by `on_event`, used to unsubscribe.
pub type ListenerId = u64;

/// Optional predicate fields for `list`.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub issuer_id: Option<String>,
    pub beneficiary_id: Option<String>,
}

impl ListFilter {
    fn matches(&self, doc: &CovenantDocument) -> bool {
        self.issuer_id
            .as_ref()
            .is_none_or(|id| doc.issuer.id == *id)
            && self
                .beneficiary_id
                .as_ref()
                .is_none_or(|id| doc.beneficiary.id == *id)
    }
}

/// Trait for covenant document storage.
///
/// Implementations must support basic CRUD operations plus listing,
/// counting, and synchronous change events. Documents are keyed by their
/// unique `id` field.
pub trait Store {
    /// Store a covenant document, keyed by its ID; overwrites any existing
    /// document with the same ID. Fires a `Put` event.
    fn put(&mut self, doc: CovenantDocument) -> Result<(), PactumError>;

    /// Retrieve a covenant document by ID.
    fn get(&self, id: &str) -> Result<Option<&CovenantDocument>, PactumError>;

    /// Delete a covenant document by ID.
    ///
    /// Returns `Ok(true)` if the document existed and was deleted. Fires a
    /// `Delete` event only if the document existed.
    fn delete(&mut self, id: &str) -> Result<bool, PactumError>;

    /// List stored documents, optionally filtered.
    fn list(&self, filter: Option<&ListFilter>) -> Vec<&CovenantDocument>;

    /// Check whether a document with the given ID exists.
    fn has(&self, id: &str) -> bool;

    /// Return the number of stored documents.
    fn count(&self) -> u64;

    /// Remove all stored documents. Does not fire per-document events.
    fn clear(&mut self);

    /// Subscribe to change events; returns a handle for `off_event`.
    fn on_event(&mut self, listener: Box<dyn Fn(&StoreEvent) + Send + Sync>) -> ListenerId;

    /// Unsubscribe a listener. Returns `true` if it was registered.
    fn off_event(&mut self, id: ListenerId) -> bool;
}

/// The clock seam consumed by time-dependent callers.
pub trait Clock {
    fn now(&self) -> chrono::DateTime<chrono::Utc>;
}

/// Wall-clock implementation of [`Clock`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        chrono::Utc::now()
    }
}

/// In-memory covenant store backed by a `HashMap`.
///
/// Suitable for testing and single-process use cases. Not persistent
/// across restarts and not thread-safe (wrap in a `Mutex` if needed).
#[derive(Default)]
pub struct MemoryStore {
    documents: HashMap<String, CovenantDocument>,
    listeners: Vec<(ListenerId, Box<dyn Fn(&StoreEvent) + Send + Sync>)>,
    next_listener_id: ListenerId,
}

impl MemoryStore {
    /// Create a new, empty `MemoryStore`.
    pub fn new() -> Self {
        Self::default()
    }

    fn emit(&self, event: StoreEvent) {
        for (_, listener) in &self.listeners {
            listener(&event);
        }
    }
}

impl Store for MemoryStore {
    fn put(&mut self, doc: CovenantDocument) -> Result<(), PactumError> {
        if doc.id.is_empty() {
            return Err(PactumError::Storage(
                "Document ID cannot be empty".to_string(),
            ));
        }
        let id = doc.id.clone();
        self.documents.insert(id.clone(), doc);
        debug!(%id, "stored covenant");
        self.emit(StoreEvent::Put { id });
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<&CovenantDocument>, PactumError> {
        Ok(self.documents.get(id))
    }

    fn delete(&mut self, id: &str) -> Result<bool, PactumError> {
        let existed = self.documents.remove(id).is_some();
        if existed {
            debug!(%id, "deleted covenant");
            self.emit(StoreEvent::Delete { id: id.to_string() });
        }
        Ok(existed)
    }

    fn list(&self, filter: Option<&ListFilter>) -> Vec<&CovenantDocument> {
        self.documents
            .values()
            .filter(|doc| filter.is_none_or(|f| f.matches(doc)))
            .collect()
    }

    fn has(&self, id: &str) -> bool {
        self.documents.contains_key(id)
    }

    fn count(&self) -> u64 {
        self.documents.len() as u64
    }

    fn clear(&mut self) {
        self.documents.clear();
    }

    fn on_event(&mut self, listener: Box<dyn Fn(&StoreEvent) + Send + Sync>) -> ListenerId {
        let id = self.next_listener_id;
        self.next_listener_id += 1;
        self.listeners.push((id, listener));
        id
    }

    fn off_event(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }
}
