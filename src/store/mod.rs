//! # Store Backends
//!
//! The backend-neutral [`GraphStore`] contract and its two implementations:
//! [`LocalStore`] (embedded, redb-backed) and [`RemoteStore`] (networked,
//! behind an injected protocol client).
//!
//! Both backends share the same cache-authoritative semantics: the
//! in-memory cache is the source of truth for liveness, the durable layer
//! for content across restarts, and the two converge after every successful
//! mutating call.

pub mod local;
pub mod remote;

pub use local::LocalStore;
pub use remote::{RemoteClient, RemoteConfig, RemoteConnector, RemoteStore, StoreDescriptor};

use crate::formats::RdfFormat;
use crate::graph::NamedGraph;
use crate::types::{StoreError, TransactionMode};
use std::path::Path;
use std::sync::Arc;

/// Uniform contract over named-graph store backends.
///
/// All methods take `&self`: stores are shared behind `Arc` and use
/// interior mutability, so a handle obtained from the registry can be used
/// from any thread.
///
/// Graph handles returned by `create_graph`/`get_graph`/`add_graph` are
/// live references into the store's cache. Mutating a handle mutates the
/// cached graph, and (with auto-sync enabled) the durable copy.
pub trait GraphStore: Send + Sync {
    /// Create an empty named graph, or return the existing one. Idempotent:
    /// an existing graph is returned unchanged, never overwritten.
    fn create_graph(&self, name: &str) -> Result<Arc<NamedGraph>, StoreError>;

    /// Create a named graph from an ontology source file. Idempotent on an
    /// existing name (the file is not even opened). `NotFound` when the
    /// path cannot be opened, `Format` on parse failure; a failed create
    /// leaves no partial graph behind.
    fn create_graph_from_file(
        &self,
        name: &str,
        base_iri: Option<&str>,
        path: &Path,
        format: RdfFormat,
    ) -> Result<Arc<NamedGraph>, StoreError>;

    /// Unconditionally (re)persist a graph's content under `name`,
    /// re-applying its prefix mapping and re-indexing it. Any previously
    /// cached copy is replaced and detached from the store's listeners.
    /// Callers must continue with the *returned* handle; the input graph is
    /// not wired to the store.
    fn add_graph(&self, name: &str, graph: &NamedGraph) -> Result<Arc<NamedGraph>, StoreError>;

    /// Fetch a cached graph. A cache miss with a surviving durable record
    /// is a `ConsistencyViolation` (surfaced loudly, never repaired).
    fn get_graph(&self, name: &str) -> Result<Option<Arc<NamedGraph>>, StoreError>;

    /// Cache membership only; never consults the durable layer.
    fn has_graph(&self, name: &str) -> bool;

    /// Names of all cached graphs, in deterministic order.
    fn list_graph_names(&self) -> Vec<String>;

    /// Remove a graph: unindex, detach listeners, evict from cache, then
    /// delete the durable record. No-op when the name is not cached.
    fn remove_graph(&self, name: &str) -> Result<(), StoreError>;

    /// Full re-index of every cached graph.
    fn update_index(&self) -> Result<(), StoreError>;

    /// Full re-index of one graph; `NotFound` for an unknown name.
    fn update_graph_index(&self, name: &str) -> Result<(), StoreError>;

    /// Names of graphs whose indexed literals contain every token of
    /// `text`.
    fn search(&self, text: &str) -> Vec<String>;

    /// Open a transaction bracket. The local backend is atomic per call
    /// and treats brackets as no-ops; the remote backend delegates to its
    /// client.
    fn begin_transaction(&self, mode: TransactionMode) -> Result<(), StoreError>;

    /// Commit the current bracket.
    fn commit(&self) -> Result<(), StoreError>;

    /// Close the current bracket. Remote mutations run `end` unconditionally,
    /// success or failure.
    fn end_transaction(&self) -> Result<(), StoreError>;

    /// Persist every cached graph durably, atomically where the backend
    /// allows it. Idempotent.
    fn sync(&self) -> Result<(), StoreError>;

    /// Enable or disable automatic durability: while enabled, every graph
    /// mutation re-persists that graph immediately. Applies to all
    /// currently cached graphs and to graphs created afterwards;
    /// non-retroactive for mutations made while disabled.
    fn set_auto_sync(&self, enabled: bool) -> Result<(), StoreError>;

    /// Whether auto-sync is currently enabled.
    fn is_auto_sync(&self) -> bool;

    /// The store's registry name.
    fn store_name(&self) -> &str;

    /// Sync, detach listeners, and release the backend handle. Idempotent;
    /// durable operations afterwards report `BackendUnavailable`.
    fn close(&self) -> Result<(), StoreError>;

    /// Close, then erase the store's durable footprint (local: the store
    /// directory; remote: the descriptor file).
    fn remove_store(&self) -> Result<(), StoreError>;
}
