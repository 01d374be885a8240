//! # Named Graph Container
//!
//! The mutable RDF graph a store hands out to callers.
//!
//! A [`NamedGraph`] handle is shared (`Arc`) and internally locked: a handle
//! returned from a store is a live reference into that store's cache, so
//! external mutation through the handle is visible to the store and can
//! trigger auto-sync side effects.
//!
//! ## Change Notification
//!
//! Every mutation collapses to one [`GraphChange`] notification, delivered
//! to registered [`ChangeObserver`]s *after* the content lock is released.
//! Observers may therefore read the graph from inside the callback (the
//! durability listener snapshots it; the index applies the change
//! incrementally) without deadlocking, and notification runs inline on the
//! mutating thread.

use crate::types::{GraphSnapshot, Triple};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// =============================================================================
// CHANGE EVENTS
// =============================================================================

/// A mutation of a named graph, as delivered to observers.
///
/// A mutation of any shape (single triple, batch, prefix update) collapses
/// to exactly one event; listeners that only care *that* something changed
/// (the durability trigger) can ignore the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphChange {
    /// Triples that were added (only those actually new to the graph).
    Inserted(Vec<Triple>),
    /// Triples that were removed (only those actually present).
    Removed(Vec<Triple>),
    /// The namespace-prefix mapping changed; the triple set did not.
    PrefixesChanged,
}

/// A passive observer attached to a graph.
///
/// Invoked inline on the mutating thread, after the mutation is applied and
/// the content lock is released. Implementations must be cheap and safe to
/// invoke repeatedly.
pub trait ChangeObserver: Send + Sync {
    fn graph_changed(&self, graph: &NamedGraph, change: &GraphChange);
}

// =============================================================================
// NAMED GRAPH
// =============================================================================

/// Triple set plus prefix map, guarded together.
#[derive(Debug, Default)]
struct GraphContent {
    triples: BTreeSet<Triple>,
    prefixes: BTreeMap<String, String>,
}

/// A mutable RDF graph addressed by a URI-shaped name.
pub struct NamedGraph {
    name: String,
    content: RwLock<GraphContent>,
    observers: RwLock<Vec<Arc<dyn ChangeObserver>>>,
}

impl std::fmt::Debug for NamedGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedGraph")
            .field("name", &self.name)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl NamedGraph {
    /// Create an empty graph with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: RwLock::new(GraphContent::default()),
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Rehydrate a graph from a persisted snapshot. No notifications fire.
    #[must_use]
    pub fn from_snapshot(name: impl Into<String>, snapshot: GraphSnapshot) -> Self {
        let graph = Self::new(name);
        {
            let mut content = graph.write_content();
            content.triples = snapshot.triples.into_iter().collect();
            content.prefixes = snapshot.prefixes;
        }
        graph
    }

    /// The graph's name (URI-shaped, unique within its store).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    // Lock poisoning is absorbed: every critical section leaves the content
    // in a consistent state, so the data behind a poisoned lock is valid.
    fn read_content(&self) -> RwLockReadGuard<'_, GraphContent> {
        self.content.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_content(&self) -> RwLockWriteGuard<'_, GraphContent> {
        self.content.write().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // READ OPERATIONS
    // =========================================================================

    /// Number of triples in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read_content().triples.len()
    }

    /// Whether the graph holds no triples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read_content().triples.is_empty()
    }

    /// Whether the graph contains the given triple.
    #[must_use]
    pub fn contains(&self, triple: &Triple) -> bool {
        self.read_content().triples.contains(triple)
    }

    /// All triples, in deterministic order.
    #[must_use]
    pub fn triples(&self) -> Vec<Triple> {
        self.read_content().triples.iter().cloned().collect()
    }

    /// The namespace-prefix mapping (prefix -> namespace IRI).
    #[must_use]
    pub fn prefixes(&self) -> BTreeMap<String, String> {
        self.read_content().prefixes.clone()
    }

    /// Snapshot the current content for persistence or transfer.
    #[must_use]
    pub fn snapshot(&self) -> GraphSnapshot {
        let content = self.read_content();
        GraphSnapshot {
            triples: content.triples.iter().cloned().collect(),
            prefixes: content.prefixes.clone(),
        }
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    /// Insert a triple. Returns `true` if the triple was not already
    /// present; observers are notified only in that case.
    pub fn insert(&self, triple: Triple) -> bool {
        let inserted = self.write_content().triples.insert(triple.clone());
        if inserted {
            self.notify(&GraphChange::Inserted(vec![triple]));
        }
        inserted
    }

    /// Remove a triple. Returns `true` if it was present; observers are
    /// notified only in that case.
    pub fn remove(&self, triple: &Triple) -> bool {
        let removed = self.write_content().triples.remove(triple);
        if removed {
            self.notify(&GraphChange::Removed(vec![triple.clone()]));
        }
        removed
    }

    /// Bulk-insert triples. One notification fires, carrying only the
    /// triples that were actually new.
    pub fn extend(&self, triples: impl IntoIterator<Item = Triple>) {
        let inserted: Vec<Triple> = {
            let mut content = self.write_content();
            triples
                .into_iter()
                .filter(|t| content.triples.insert(t.clone()))
                .collect()
        };
        if !inserted.is_empty() {
            self.notify(&GraphChange::Inserted(inserted));
        }
    }

    /// Set one prefix binding.
    pub fn set_prefix(&self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.write_content()
            .prefixes
            .insert(prefix.into(), namespace.into());
        self.notify(&GraphChange::PrefixesChanged);
    }

    /// Replace the whole prefix mapping (used when a store re-applies an
    /// input graph's prefixes onto the persisted copy). One notification.
    pub fn set_prefixes(&self, prefixes: BTreeMap<String, String>) {
        self.write_content().prefixes = prefixes;
        self.notify(&GraphChange::PrefixesChanged);
    }

    // =========================================================================
    // OBSERVERS
    // =========================================================================

    /// Attach an observer. Registering the same observer twice is a no-op,
    /// so toggling auto-sync repeatedly never double-fires.
    pub fn register_observer(&self, observer: Arc<dyn ChangeObserver>) {
        let mut observers = self
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if !observers.iter().any(|o| Arc::ptr_eq(o, &observer)) {
            observers.push(observer);
        }
    }

    /// Detach an observer. Detaching never alters graph content.
    pub fn unregister_observer(&self, observer: &Arc<dyn ChangeObserver>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|o| !Arc::ptr_eq(o, observer));
    }

    /// Detach all observers (store close / graph removal).
    pub fn clear_observers(&self) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn notify(&self, change: &GraphChange) {
        // Snapshot the observer list so an observer can re-enter the graph
        // (or the list) without holding this lock.
        let observers: Vec<Arc<dyn ChangeObserver>> = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in observers {
            observer.graph_changed(self, change);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Term;
    use std::sync::Mutex;

    fn triple(n: u32) -> Triple {
        Triple::new(
            Term::iri(format!("http://ex/s{n}")),
            Term::iri("http://ex/p"),
            Term::literal(format!("v{n}")),
        )
    }

    #[derive(Default)]
    struct Recorder {
        changes: Mutex<Vec<GraphChange>>,
    }

    impl ChangeObserver for Recorder {
        fn graph_changed(&self, _graph: &NamedGraph, change: &GraphChange) {
            self.changes
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(change.clone());
        }
    }

    impl Recorder {
        fn take(&self) -> Vec<GraphChange> {
            std::mem::take(&mut *self.changes.lock().unwrap_or_else(PoisonError::into_inner))
        }
    }

    #[test]
    fn insert_and_remove_notify_once() {
        let graph = NamedGraph::new("http://ex/g");
        let recorder = Arc::new(Recorder::default());
        graph.register_observer(recorder.clone());

        let t = triple(1);
        assert!(graph.insert(t.clone()));
        assert_eq!(recorder.take(), vec![GraphChange::Inserted(vec![t.clone()])]);

        // Duplicate insert: no change, no notification.
        assert!(!graph.insert(t.clone()));
        assert!(recorder.take().is_empty());

        assert!(graph.remove(&t));
        assert_eq!(recorder.take(), vec![GraphChange::Removed(vec![t.clone()])]);

        // Removing an absent triple is silent.
        assert!(!graph.remove(&t));
        assert!(recorder.take().is_empty());
    }

    #[test]
    fn extend_collapses_to_one_notification() {
        let graph = NamedGraph::new("http://ex/g");
        graph.insert(triple(1));

        let recorder = Arc::new(Recorder::default());
        graph.register_observer(recorder.clone());

        graph.extend(vec![triple(1), triple(2), triple(3)]);

        let changes = recorder.take();
        assert_eq!(changes.len(), 1);
        // Only the genuinely new triples appear in the event.
        assert_eq!(
            changes[0],
            GraphChange::Inserted(vec![triple(2), triple(3)])
        );
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn observer_can_read_graph_reentrantly() {
        struct LenReader {
            seen: Mutex<usize>,
        }
        impl ChangeObserver for LenReader {
            fn graph_changed(&self, graph: &NamedGraph, _change: &GraphChange) {
                // Must not deadlock: the content lock is released before
                // notification.
                *self.seen.lock().unwrap_or_else(PoisonError::into_inner) = graph.len();
            }
        }

        let graph = NamedGraph::new("http://ex/g");
        let reader = Arc::new(LenReader {
            seen: Mutex::new(0),
        });
        graph.register_observer(reader.clone());

        graph.insert(triple(1));
        assert_eq!(*reader.seen.lock().unwrap_or_else(PoisonError::into_inner), 1);
    }

    #[test]
    fn duplicate_registration_is_ignored() {
        let graph = NamedGraph::new("http://ex/g");
        let recorder = Arc::new(Recorder::default());
        graph.register_observer(recorder.clone());
        graph.register_observer(recorder.clone());

        graph.insert(triple(1));
        assert_eq!(recorder.take().len(), 1);
    }

    #[test]
    fn unregister_detaches_without_touching_content() {
        let graph = NamedGraph::new("http://ex/g");
        let recorder = Arc::new(Recorder::default());
        let handle: Arc<dyn ChangeObserver> = recorder.clone();
        graph.register_observer(handle.clone());

        graph.insert(triple(1));
        graph.unregister_observer(&handle);
        graph.insert(triple(2));

        assert_eq!(recorder.take().len(), 1);
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn snapshot_roundtrip_preserves_content() {
        let graph = NamedGraph::new("http://ex/g");
        graph.insert(triple(2));
        graph.insert(triple(1));
        graph.set_prefix("ex", "http://ex/");

        let snapshot = graph.snapshot();
        let restored = NamedGraph::from_snapshot("http://ex/g", snapshot.clone());

        assert_eq!(restored.triples(), graph.triples());
        assert_eq!(restored.prefixes(), graph.prefixes());
        // Snapshots of equal content are equal (sorted triples).
        assert_eq!(restored.snapshot(), snapshot);
    }

    #[test]
    fn prefix_updates_notify() {
        let graph = NamedGraph::new("http://ex/g");
        let recorder = Arc::new(Recorder::default());
        graph.register_observer(recorder.clone());

        graph.set_prefix("ex", "http://ex/");
        assert_eq!(recorder.take(), vec![GraphChange::PrefixesChanged]);
        assert_eq!(graph.prefixes().get("ex").map(String::as_str), Some("http://ex/"));
    }
}
