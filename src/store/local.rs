//! # Embedded Local Store
//!
//! File-backed named-graph store: a redb [`Dataset`] for durability, an
//! in-memory graph cache that is authoritative for liveness, and a
//! [`GraphIndex`] kept in step with every cached graph.
//!
//! Opening a store restores and indexes every persisted graph, so after
//! construction the cache and the durable layer agree. A cache miss with a
//! surviving durable record can then only mean a bug, and is surfaced as
//! [`StoreError::ConsistencyViolation`].
//!
//! Durability policy: with auto-sync off, mutations made through graph
//! handles stay in memory until [`GraphStore::sync`] (or `close`). With
//! auto-sync on, a [`SyncListener`] re-persists a graph on every mutation.

use crate::formats::{ParserRegistry, RdfFormat};
use crate::graph::{ChangeObserver, GraphChange, NamedGraph};
use crate::index::GraphIndex;
use crate::storage::Dataset;
use crate::store::GraphStore;
use crate::types::{GraphSnapshot, StoreError, TransactionMode};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

type GraphCache = BTreeMap<String, Arc<NamedGraph>>;

// =============================================================================
// SYNC LISTENER
// =============================================================================

/// Durability trigger: re-persists a graph's snapshot on every change
/// notification. Attached to cached graphs while auto-sync is enabled.
pub struct SyncListener {
    dataset: Arc<Dataset>,
}

impl ChangeObserver for SyncListener {
    fn graph_changed(&self, graph: &NamedGraph, _change: &GraphChange) {
        // Observer callbacks cannot propagate; a failed auto-sync write is
        // logged and the next sync() retries the full snapshot anyway.
        if let Err(e) = self.dataset.put_named(graph.name(), &graph.snapshot()) {
            tracing::warn!(graph = graph.name(), error = %e, "auto-sync persist failed");
        }
    }
}

// =============================================================================
// LOCAL STORE
// =============================================================================

/// Embedded persistent named-graph store.
pub struct LocalStore {
    name: String,
    directory: PathBuf,
    dataset: Arc<Dataset>,
    cache: RwLock<GraphCache>,
    index: Arc<GraphIndex>,
    parsers: ParserRegistry,
    sync_listener: Arc<SyncListener>,
    auto_sync: AtomicBool,
    closed: AtomicBool,
}

impl LocalStore {
    /// Open (or create) the store rooted at `directory`, restoring and
    /// indexing every persisted graph.
    pub fn open(
        name: impl Into<String>,
        directory: impl Into<PathBuf>,
        parsers: ParserRegistry,
    ) -> Result<Arc<Self>, StoreError> {
        let started = Instant::now();
        let name = name.into();
        let directory = directory.into();
        let dataset = Arc::new(Dataset::open(&directory)?);

        let store = Arc::new(Self {
            name,
            directory,
            sync_listener: Arc::new(SyncListener {
                dataset: dataset.clone(),
            }),
            dataset,
            cache: RwLock::new(BTreeMap::new()),
            index: Arc::new(GraphIndex::new()),
            parsers,
            auto_sync: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        });

        for graph_name in store.dataset.list_names()? {
            if let Some(snapshot) = store.dataset.get_named(&graph_name)? {
                let graph = Arc::new(NamedGraph::from_snapshot(&graph_name, snapshot));
                store.index.index_graph(&graph);
                graph.register_observer(store.index.clone());
                store.cache_mut().insert(graph_name, graph);
            }
        }

        tracing::info!(
            store = %store.name,
            graphs = store.cache_ref().len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "local store restored"
        );
        Ok(store)
    }

    fn cache_ref(&self) -> RwLockReadGuard<'_, GraphCache> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn cache_mut(&self) -> RwLockWriteGuard<'_, GraphCache> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Index a freshly cached graph and attach the store's listeners.
    fn wire(&self, graph: &Arc<NamedGraph>) {
        self.index.index_graph(graph);
        graph.register_observer(self.index.clone());
        if self.auto_sync.load(Ordering::SeqCst) {
            graph.register_observer(self.sync_listener.clone());
        }
    }

    fn snapshots(&self) -> BTreeMap<String, GraphSnapshot> {
        self.cache_ref()
            .iter()
            .map(|(name, graph)| (name.clone(), graph.snapshot()))
            .collect()
    }
}

impl GraphStore for LocalStore {
    fn create_graph(&self, name: &str) -> Result<Arc<NamedGraph>, StoreError> {
        if let Some(existing) = self.cache_ref().get(name).cloned() {
            tracing::debug!(store = %self.name, graph = name, "graph already exists");
            return Ok(existing);
        }

        let graph = Arc::new(NamedGraph::new(name));
        // Persist before touching cache or index: a failed create leaves
        // no partial graph.
        self.dataset.put_named(name, &graph.snapshot())?;
        self.wire(&graph);
        self.cache_mut().insert(name.to_string(), graph.clone());
        Ok(graph)
    }

    fn create_graph_from_file(
        &self,
        name: &str,
        base_iri: Option<&str>,
        path: &Path,
        format: RdfFormat,
    ) -> Result<Arc<NamedGraph>, StoreError> {
        if let Some(existing) = self.cache_ref().get(name).cloned() {
            tracing::debug!(store = %self.name, graph = name, "graph already exists");
            return Ok(existing);
        }

        let parser = self.parsers.parser_for(format)?;
        let mut file = File::open(path)
            .map_err(|e| StoreError::NotFound(format!("{}: {e}", path.display())))?;
        let snapshot = parser.parse(&mut file, base_iri)?;

        tracing::debug!(
            store = %self.name,
            graph = name,
            triples = snapshot.len(),
            %format,
            "graph loaded from file"
        );

        let graph = Arc::new(NamedGraph::from_snapshot(name, snapshot));
        self.dataset.put_named(name, &graph.snapshot())?;
        self.wire(&graph);
        self.cache_mut().insert(name.to_string(), graph.clone());
        Ok(graph)
    }

    fn add_graph(&self, name: &str, graph: &NamedGraph) -> Result<Arc<NamedGraph>, StoreError> {
        let snapshot = graph.snapshot();
        self.dataset.put_named(name, &snapshot)?;

        // A replaced cached copy is detached so stale handles stop feeding
        // the index and the sync listener.
        if let Some(old) = self.cache_mut().remove(name) {
            old.clear_observers();
        }

        let wired = Arc::new(NamedGraph::from_snapshot(name, snapshot));
        self.wire(&wired);
        self.cache_mut().insert(name.to_string(), wired.clone());
        Ok(wired)
    }

    fn get_graph(&self, name: &str) -> Result<Option<Arc<NamedGraph>>, StoreError> {
        if let Some(graph) = self.cache_ref().get(name).cloned() {
            return Ok(Some(graph));
        }
        if self.dataset.get_named(name)?.is_some() {
            return Err(StoreError::ConsistencyViolation(format!(
                "graph '{name}' has a durable record but no cached copy"
            )));
        }
        Ok(None)
    }

    fn has_graph(&self, name: &str) -> bool {
        self.cache_ref().contains_key(name)
    }

    fn list_graph_names(&self) -> Vec<String> {
        self.cache_ref().keys().cloned().collect()
    }

    fn remove_graph(&self, name: &str) -> Result<(), StoreError> {
        let Some(graph) = self.cache_ref().get(name).cloned() else {
            return Ok(());
        };
        // Unindex and detach first, evict, delete the durable record last.
        // A crash before the final delete leaves a durable record that the
        // next open restores as a normal graph.
        self.index.remove_graph(name);
        graph.clear_observers();
        self.cache_mut().remove(name);
        self.dataset.remove_named(name)?;
        tracing::debug!(store = %self.name, graph = name, "graph removed");
        Ok(())
    }

    fn update_index(&self) -> Result<(), StoreError> {
        for graph in self.cache_ref().values() {
            self.index.index_graph(graph);
        }
        Ok(())
    }

    fn update_graph_index(&self, name: &str) -> Result<(), StoreError> {
        match self.cache_ref().get(name) {
            Some(graph) => {
                self.index.index_graph(graph);
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("graph '{name}' is not cached"))),
        }
    }

    fn search(&self, text: &str) -> Vec<String> {
        self.index.search(text)
    }

    // redb commits atomically per operation, so explicit brackets have
    // nothing to scope over. Kept as no-ops so both backends share one
    // calling convention.
    fn begin_transaction(&self, _mode: TransactionMode) -> Result<(), StoreError> {
        Ok(())
    }

    fn commit(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn end_transaction(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn sync(&self) -> Result<(), StoreError> {
        self.dataset.put_all(&self.snapshots())
    }

    fn set_auto_sync(&self, enabled: bool) -> Result<(), StoreError> {
        let was = self.auto_sync.swap(enabled, Ordering::SeqCst);
        if was == enabled {
            return Ok(());
        }
        let listener: Arc<dyn ChangeObserver> = self.sync_listener.clone();
        for graph in self.cache_ref().values() {
            if enabled {
                graph.register_observer(listener.clone());
            } else {
                graph.unregister_observer(&listener);
            }
        }
        tracing::info!(store = %self.name, enabled, "auto-sync toggled");
        Ok(())
    }

    fn is_auto_sync(&self) -> bool {
        self.auto_sync.load(Ordering::SeqCst)
    }

    fn store_name(&self) -> &str {
        &self.name
    }

    fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.dataset.put_all(&self.snapshots())?;
        for graph in self.cache_ref().values() {
            graph.clear_observers();
        }
        self.dataset.close();
        tracing::info!(store = %self.name, "local store closed");
        Ok(())
    }

    fn remove_store(&self) -> Result<(), StoreError> {
        self.close()?;
        self.cache_mut().clear();
        std::fs::remove_dir_all(&self.directory)?;
        tracing::info!(store = %self.name, "local store removed");
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
