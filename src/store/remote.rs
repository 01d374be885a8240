//! # Remote Networked Store
//!
//! Named-graph store backed by a remote server behind the [`RemoteClient`]
//! seam. The wire protocol is a collaborator concern: the registry injects
//! a [`RemoteConnector`] and this module never sees bytes on the network.
//!
//! Connecting writes a descriptor file (`name#serverURL#username#password`)
//! next to the registry's other remote descriptors, so a later process can
//! reconnect the same store. The descriptor is rewritten verbatim on every
//! connect; a failed write aborts the connect.
//!
//! Unlike the embedded backend, remote mutations are bracketed: every write
//! runs inside `begin(Write)` / `commit`, with `end` issued unconditionally
//! through a drop guard, commit or not.

use crate::formats::{ParserRegistry, RdfFormat};
use crate::graph::{ChangeObserver, GraphChange, NamedGraph};
use crate::index::GraphIndex;
use crate::store::GraphStore;
use crate::types::{GraphSnapshot, StoreError, TransactionMode};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

type GraphCache = BTreeMap<String, Arc<NamedGraph>>;

// =============================================================================
// PROTOCOL SEAM
// =============================================================================

/// Wire-level operations a remote named-graph server must provide.
///
/// Implementations are injected through a [`RemoteConnector`]; every method
/// maps protocol failures to [`StoreError::BackendUnavailable`] or
/// [`StoreError::Io`] as appropriate.
pub trait RemoteClient: Send + Sync {
    fn list_names(&self) -> Result<Vec<String>, StoreError>;
    fn get_named(&self, name: &str) -> Result<Option<GraphSnapshot>, StoreError>;
    fn put_named(&self, name: &str, snapshot: &GraphSnapshot) -> Result<(), StoreError>;
    fn remove_named(&self, name: &str) -> Result<(), StoreError>;
    /// Open a transaction bracket on the server.
    fn begin(&self, mode: TransactionMode) -> Result<(), StoreError>;
    fn commit(&self) -> Result<(), StoreError>;
    /// Close the current bracket. Must be safe to call whether or not the
    /// bracket committed.
    fn end(&self) -> Result<(), StoreError>;
    /// Force server-side durability of previous writes.
    fn flush(&self) -> Result<(), StoreError>;
    fn close(&self) -> Result<(), StoreError>;
}

/// Factory for [`RemoteClient`]s, injected into the registry.
pub trait RemoteConnector: Send + Sync {
    fn connect(&self, config: &RemoteConfig) -> Result<Arc<dyn RemoteClient>, StoreError>;
}

/// Connection parameters for a remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub server_url: String,
    pub username: String,
    pub password: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8890/sparql".to_string(),
            username: "dba".to_string(),
            password: "dba".to_string(),
        }
    }
}

// =============================================================================
// DESCRIPTOR CODEC
// =============================================================================

const SEPARATOR: char = '#';

/// On-disk record of a remote store: `name#serverURL#username#password`.
///
/// Fields must not contain `#`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreDescriptor {
    pub name: String,
    pub config: RemoteConfig,
}

impl StoreDescriptor {
    /// Serialize to the descriptor line.
    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{}{SEPARATOR}{}{SEPARATOR}{}{SEPARATOR}{}",
            self.name, self.config.server_url, self.config.username, self.config.password
        )
    }

    /// Parse a descriptor line; exactly four `#`-separated fields.
    pub fn parse(line: &str) -> Result<Self, StoreError> {
        let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split(SEPARATOR).collect();
        let [name, server_url, username, password] = fields.as_slice() else {
            return Err(StoreError::Format(format!(
                "malformed store descriptor: expected 4 '#'-separated fields, found {}",
                fields.len()
            )));
        };
        if name.is_empty() {
            return Err(StoreError::Format(
                "malformed store descriptor: empty store name".to_string(),
            ));
        }
        Ok(Self {
            name: (*name).to_string(),
            config: RemoteConfig {
                server_url: (*server_url).to_string(),
                username: (*username).to_string(),
                password: (*password).to_string(),
            },
        })
    }

    /// Read and parse a descriptor file.
    pub fn read(path: &Path) -> Result<Self, StoreError> {
        let line = std::fs::read_to_string(path)?;
        Self::parse(&line)
    }
}

// =============================================================================
// SYNC LISTENER / TXN GUARD
// =============================================================================

/// Remote durability trigger: ships the changed graph and flushes.
#[derive(Clone)]
struct RemoteSyncListener {
    client: Arc<dyn RemoteClient>,
}

impl ChangeObserver for RemoteSyncListener {
    fn graph_changed(&self, graph: &NamedGraph, _change: &GraphChange) {
        let result = self
            .client
            .put_named(graph.name(), &graph.snapshot())
            .and_then(|()| self.client.flush());
        if let Err(e) = result {
            tracing::warn!(graph = graph.name(), error = %e, "auto-sync upload failed");
        }
    }
}

/// Issues `end` on drop, so the bracket closes on both the success and the
/// error path.
struct TxnGuard<'a> {
    client: &'a dyn RemoteClient,
}

impl Drop for TxnGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.client.end() {
            tracing::warn!(error = %e, "transaction end failed");
        }
    }
}

// =============================================================================
// REMOTE STORE
// =============================================================================

/// Networked named-graph store with local cache and index.
///
/// Cache and index semantics match [`crate::store::LocalStore`]: the
/// connect-time warm-up plays the role of restart restoration, and the
/// store maintains its own lexical index over cached graphs.
pub struct RemoteStore {
    name: String,
    descriptor_path: PathBuf,
    client: Arc<dyn RemoteClient>,
    cache: RwLock<GraphCache>,
    index: Arc<GraphIndex>,
    parsers: ParserRegistry,
    sync_listener: Arc<RemoteSyncListener>,
    auto_sync: AtomicBool,
    closed: AtomicBool,
}

impl std::fmt::Debug for RemoteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStore")
            .field("name", &self.name)
            .field("descriptor_path", &self.descriptor_path)
            .finish_non_exhaustive()
    }
}

impl RemoteStore {
    /// Connect to the remote server, write the descriptor file, and warm
    /// the cache from the server's graph listing.
    pub fn connect(
        name: impl Into<String>,
        config: RemoteConfig,
        connector: &dyn RemoteConnector,
        descriptor_path: impl Into<PathBuf>,
        parsers: ParserRegistry,
    ) -> Result<Arc<Self>, StoreError> {
        let name = name.into();
        let descriptor_path = descriptor_path.into();
        let client = connector.connect(&config)?;

        let descriptor = StoreDescriptor {
            name: name.clone(),
            config,
        };
        std::fs::write(&descriptor_path, descriptor.encode())?;

        let store = Arc::new(Self {
            name,
            descriptor_path,
            sync_listener: Arc::new(RemoteSyncListener {
                client: client.clone(),
            }),
            client,
            cache: RwLock::new(BTreeMap::new()),
            index: Arc::new(GraphIndex::new()),
            parsers,
            auto_sync: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        });

        for graph_name in store.client.list_names()? {
            if let Some(snapshot) = store.client.get_named(&graph_name)? {
                let graph = Arc::new(NamedGraph::from_snapshot(&graph_name, snapshot));
                store.index.index_graph(&graph);
                graph.register_observer(store.index.clone());
                store.cache_mut().insert(graph_name, graph);
            }
        }

        tracing::info!(
            store = %store.name,
            server = %descriptor.config.server_url,
            graphs = store.cache_ref().len(),
            "remote store connected"
        );
        Ok(store)
    }

    fn cache_ref(&self) -> RwLockReadGuard<'_, GraphCache> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn cache_mut(&self) -> RwLockWriteGuard<'_, GraphCache> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::BackendUnavailable(format!(
                "remote store '{}' is closed",
                self.name
            )));
        }
        Ok(())
    }

    /// Run a remote mutation inside a write bracket. `end` always fires.
    fn with_write<T>(
        &self,
        op: impl FnOnce(&dyn RemoteClient) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        self.ensure_open()?;
        self.client.begin(TransactionMode::Write)?;
        let _guard = TxnGuard {
            client: &*self.client,
        };
        let value = op(&*self.client)?;
        self.client.commit()?;
        Ok(value)
    }

    fn wire(&self, graph: &Arc<NamedGraph>) {
        self.index.index_graph(graph);
        graph.register_observer(self.index.clone());
        if self.auto_sync.load(Ordering::SeqCst) {
            graph.register_observer(self.sync_listener.clone());
        }
    }
}

impl GraphStore for RemoteStore {
    fn create_graph(&self, name: &str) -> Result<Arc<NamedGraph>, StoreError> {
        if let Some(existing) = self.cache_ref().get(name).cloned() {
            tracing::debug!(store = %self.name, graph = name, "graph already exists");
            return Ok(existing);
        }

        let graph = Arc::new(NamedGraph::new(name));
        self.with_write(|client| client.put_named(name, &graph.snapshot()))?;
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

        let graph = Arc::new(NamedGraph::from_snapshot(name, snapshot));
        self.with_write(|client| client.put_named(name, &graph.snapshot()))?;
        self.wire(&graph);
        self.cache_mut().insert(name.to_string(), graph.clone());
        Ok(graph)
    }

    fn add_graph(&self, name: &str, graph: &NamedGraph) -> Result<Arc<NamedGraph>, StoreError> {
        let snapshot = graph.snapshot();
        self.with_write(|client| client.put_named(name, &snapshot))?;

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
        self.ensure_open()?;
        if self.client.get_named(name)?.is_some() {
            return Err(StoreError::ConsistencyViolation(format!(
                "graph '{name}' exists on the server but has no cached copy"
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
        self.index.remove_graph(name);
        graph.clear_observers();
        self.cache_mut().remove(name);
        self.with_write(|client| client.remove_named(name))?;
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

    fn begin_transaction(&self, mode: TransactionMode) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.client.begin(mode)
    }

    fn commit(&self) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.client.commit()
    }

    fn end_transaction(&self) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.client.end()
    }

    fn sync(&self) -> Result<(), StoreError> {
        let snapshots: Vec<(String, GraphSnapshot)> = self
            .cache_ref()
            .iter()
            .map(|(name, graph)| (name.clone(), graph.snapshot()))
            .collect();
        self.with_write(|client| {
            for (name, snapshot) in &snapshots {
                client.put_named(name, snapshot)?;
            }
            Ok(())
        })?;
        self.client.flush()
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
        // Final upload happens before the closed flag blocks the client.
        let snapshots: Vec<(String, GraphSnapshot)> = self
            .cache_ref()
            .iter()
            .map(|(name, graph)| (name.clone(), graph.snapshot()))
            .collect();
        self.client.begin(TransactionMode::Write)?;
        {
            let _guard = TxnGuard {
                client: &*self.client,
            };
            for (name, snapshot) in &snapshots {
                self.client.put_named(name, snapshot)?;
            }
            self.client.commit()?;
        }
        self.client.flush()?;
        for graph in self.cache_ref().values() {
            graph.clear_observers();
        }
        self.client.close()?;
        tracing::info!(store = %self.name, "remote store closed");
        Ok(())
    }

    fn remove_store(&self) -> Result<(), StoreError> {
        self.close()?;
        self.cache_mut().clear();
        std::fs::remove_file(&self.descriptor_path)?;
        tracing::info!(store = %self.name, "remote store removed");
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::types::{Term, Triple};
    use std::sync::Mutex;

    fn labeled(graph: &NamedGraph, label: &str) {
        graph.insert(Triple::new(
            Term::iri("http://ex/s"),
            Term::iri("http://www.w3.org/2000/01/rdf-schema#label"),
            Term::literal(label),
        ));
    }

    /// In-memory server double that records the call sequence.
    #[derive(Default)]
    struct MockClient {
        graphs: Mutex<BTreeMap<String, GraphSnapshot>>,
        calls: Mutex<Vec<String>>,
        fail_commit: AtomicBool,
    }

    impl MockClient {
        fn record(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl RemoteClient for MockClient {
        fn list_names(&self) -> Result<Vec<String>, StoreError> {
            Ok(self.graphs.lock().unwrap().keys().cloned().collect())
        }

        fn get_named(&self, name: &str) -> Result<Option<GraphSnapshot>, StoreError> {
            Ok(self.graphs.lock().unwrap().get(name).cloned())
        }

        fn put_named(&self, name: &str, snapshot: &GraphSnapshot) -> Result<(), StoreError> {
            self.record(&format!("put {name}"));
            self.graphs
                .lock()
                .unwrap()
                .insert(name.to_string(), snapshot.clone());
            Ok(())
        }

        fn remove_named(&self, name: &str) -> Result<(), StoreError> {
            self.record(&format!("remove {name}"));
            self.graphs.lock().unwrap().remove(name);
            Ok(())
        }

        fn begin(&self, _mode: TransactionMode) -> Result<(), StoreError> {
            self.record("begin");
            Ok(())
        }

        fn commit(&self) -> Result<(), StoreError> {
            self.record("commit");
            if self.fail_commit.load(Ordering::SeqCst) {
                return Err(StoreError::BackendUnavailable("commit refused".to_string()));
            }
            Ok(())
        }

        fn end(&self) -> Result<(), StoreError> {
            self.record("end");
            Ok(())
        }

        fn flush(&self) -> Result<(), StoreError> {
            self.record("flush");
            Ok(())
        }

        fn close(&self) -> Result<(), StoreError> {
            self.record("close");
            Ok(())
        }
    }

    struct MockConnector {
        client: Arc<MockClient>,
    }

    impl RemoteConnector for MockConnector {
        fn connect(&self, _config: &RemoteConfig) -> Result<Arc<dyn RemoteClient>, StoreError> {
            Ok(self.client.clone())
        }
    }

    fn connect(
        dir: &Path,
        client: Arc<MockClient>,
    ) -> Arc<RemoteStore> {
        let connector = MockConnector { client };
        RemoteStore::connect(
            "default",
            RemoteConfig::default(),
            &connector,
            dir.join("default"),
            ParserRegistry::new(),
        )
        .expect("connect")
    }

    #[test]
    fn descriptor_round_trip() {
        let descriptor = StoreDescriptor {
            name: "default".to_string(),
            config: RemoteConfig {
                server_url: "http://rdf.example:8890/sparql".to_string(),
                username: "alice".to_string(),
                password: "s3cret".to_string(),
            },
        };
        let line = descriptor.encode();
        assert_eq!(line, "default#http://rdf.example:8890/sparql#alice#s3cret");
        assert_eq!(StoreDescriptor::parse(&line).unwrap(), descriptor);
    }

    #[test]
    fn descriptor_rejects_wrong_field_count() {
        assert!(matches!(
            StoreDescriptor::parse("only#three#fields"),
            Err(StoreError::Format(_))
        ));
        assert!(matches!(
            StoreDescriptor::parse("#url#user#pass"),
            Err(StoreError::Format(_))
        ));
    }

    #[test]
    fn connect_writes_descriptor_and_warms_cache() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MockClient::default());
        let mut warm = GraphSnapshot::new();
        warm.triples.push(Triple::new(
            Term::iri("http://ex/s"),
            Term::iri("http://ex/p"),
            Term::literal("pre-existing"),
        ));
        client
            .graphs
            .lock()
            .unwrap()
            .insert("http://ex/g".to_string(), warm);

        let store = connect(dir.path(), client);

        let written = StoreDescriptor::read(&dir.path().join("default")).unwrap();
        assert_eq!(written.name, "default");
        assert_eq!(written.config, RemoteConfig::default());

        assert!(store.has_graph("http://ex/g"));
        // Warmed graphs are indexed, matching local restore semantics.
        assert_eq!(store.search("pre-existing"), vec!["http://ex/g"]);
    }

    #[test]
    fn mutations_are_bracketed_with_unconditional_end() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MockClient::default());
        let store = connect(dir.path(), client.clone());

        store.create_graph("http://ex/g").unwrap();
        assert_eq!(
            client.calls(),
            vec!["begin", "put http://ex/g", "commit", "end"]
        );
    }

    #[test]
    fn failed_commit_still_ends_the_bracket() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MockClient::default());
        let store = connect(dir.path(), client.clone());

        client.fail_commit.store(true, Ordering::SeqCst);
        assert!(store.create_graph("http://ex/g").is_err());
        assert_eq!(
            client.calls(),
            vec!["begin", "put http://ex/g", "commit", "end"]
        );
        // The failed create left no cached graph behind.
        assert!(!store.has_graph("http://ex/g"));
    }

    #[test]
    fn auto_sync_uploads_and_flushes() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MockClient::default());
        let store = connect(dir.path(), client.clone());

        let graph = store.create_graph("http://ex/g").unwrap();
        store.set_auto_sync(true).unwrap();
        labeled(&graph, "shipped");

        let calls = client.calls();
        assert!(calls.ends_with(&["put http://ex/g".to_string(), "flush".to_string()]));
        assert_eq!(
            client.graphs.lock().unwrap().get("http://ex/g").unwrap().len(),
            1
        );
    }

    #[test]
    fn remove_store_deletes_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MockClient::default());
        let store = connect(dir.path(), client.clone());

        store.remove_store().unwrap();
        assert!(!dir.path().join("default").exists());
        assert!(client.calls().contains(&"close".to_string()));
    }

    #[test]
    fn closed_store_reports_backend_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MockClient::default());
        let store = connect(dir.path(), client);

        store.close().unwrap();
        store.close().unwrap();
        assert!(matches!(
            store.create_graph("http://ex/g"),
            Err(StoreError::BackendUnavailable(_))
        ));
    }
}
