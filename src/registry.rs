//! # Store Registry
//!
//! Process directory of stores, keyed by `(kind, name)`. The registry is
//! the only constructor of stores: it owns the root directory layout
//! (`<root>/local/` holds one sub-directory per embedded store,
//! `<root>/remote/` one descriptor file per remote store) and reconstructs
//! every previously created store when reopened on the same root.
//!
//! A registry is an explicitly constructed value, not process-global state;
//! two registries on different roots are fully independent.

use crate::formats::ParserRegistry;
use crate::store::{
    GraphStore, LocalStore, RemoteConfig, RemoteConnector, RemoteStore, StoreDescriptor,
};
use crate::types::StoreError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Name used when a store is created with a blank or omitted name.
pub const DEFAULT_STORE_NAME: &str = "default";

/// Backend kind of a registered store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StoreKind {
    /// Embedded, file-backed store.
    Local,
    /// Networked store behind a protocol client.
    Remote,
}

type LocalStores = BTreeMap<String, Arc<LocalStore>>;
type RemoteStores = BTreeMap<String, Arc<RemoteStore>>;

/// Directory of named-graph stores rooted at one filesystem path.
///
/// Store names become filesystem entries (a local store's directory, a
/// remote store's descriptor file), so they must be valid single path
/// components.
pub struct StoreRegistry {
    local_root: PathBuf,
    remote_root: PathBuf,
    locals: RwLock<LocalStores>,
    remotes: RwLock<RemoteStores>,
    connector: Option<Arc<dyn RemoteConnector>>,
    parsers: ParserRegistry,
}

impl std::fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("local_root", &self.local_root)
            .field("remote_root", &self.remote_root)
            .finish_non_exhaustive()
    }
}

fn normalized(name: Option<&str>) -> String {
    match name {
        Some(n) if !n.trim().is_empty() => n.to_string(),
        _ => DEFAULT_STORE_NAME.to_string(),
    }
}

impl StoreRegistry {
    /// Open a registry with no remote capability: existing local stores are
    /// reconstructed; a leftover remote descriptor is fatal, since the
    /// store it names cannot be brought back.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::open_with(root, None, ParserRegistry::new())
    }

    /// Open a registry that can create and reconnect remote stores through
    /// `connector`.
    pub fn open_with_connector(
        root: impl Into<PathBuf>,
        connector: Arc<dyn RemoteConnector>,
    ) -> Result<Self, StoreError> {
        Self::open_with(root, Some(connector), ParserRegistry::new())
    }

    /// Full constructor: optional remote connector plus the parser registry
    /// handed to every store (callers register RDF/XML or Turtle parsers
    /// here).
    pub fn open_with(
        root: impl Into<PathBuf>,
        connector: Option<Arc<dyn RemoteConnector>>,
        parsers: ParserRegistry,
    ) -> Result<Self, StoreError> {
        let root = root.into();
        let local_root = root.join("local");
        let remote_root = root.join("remote");
        std::fs::create_dir_all(&local_root)?;
        std::fs::create_dir_all(&remote_root)?;

        let registry = Self {
            local_root,
            remote_root,
            locals: RwLock::new(BTreeMap::new()),
            remotes: RwLock::new(BTreeMap::new()),
            connector,
            parsers,
        };
        registry.reconstruct()?;
        Ok(registry)
    }

    /// Bring back every store left on disk by a previous process.
    fn reconstruct(&self) -> Result<(), StoreError> {
        for entry in std::fs::read_dir(&self.local_root)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let store = LocalStore::open(&name, entry.path(), self.parsers.clone())?;
            self.locals_mut().insert(name, store);
        }

        for entry in std::fs::read_dir(&self.remote_root)? {
            let entry = entry?;
            if !entry.path().is_file() {
                continue;
            }
            let descriptor = StoreDescriptor::read(&entry.path())?;
            let Some(connector) = &self.connector else {
                return Err(StoreError::BackendUnavailable(format!(
                    "remote store '{}' is on record but no connector was provided",
                    descriptor.name
                )));
            };
            let store = RemoteStore::connect(
                &descriptor.name,
                descriptor.config,
                &**connector,
                entry.path(),
                self.parsers.clone(),
            )?;
            self.remotes_mut().insert(descriptor.name, store);
        }

        tracing::info!(
            local = self.locals_ref().len(),
            remote = self.remotes_ref().len(),
            "store registry opened"
        );
        Ok(())
    }

    fn locals_ref(&self) -> RwLockReadGuard<'_, LocalStores> {
        self.locals.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn locals_mut(&self) -> RwLockWriteGuard<'_, LocalStores> {
        self.locals.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn remotes_ref(&self) -> RwLockReadGuard<'_, RemoteStores> {
        self.remotes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn remotes_mut(&self) -> RwLockWriteGuard<'_, RemoteStores> {
        self.remotes.write().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // CREATION
    // =========================================================================

    /// Create (or return) the local store with the given name; blank or
    /// omitted names mean [`DEFAULT_STORE_NAME`].
    pub fn create_local_store(&self, name: Option<&str>) -> Result<Arc<LocalStore>, StoreError> {
        let name = normalized(name);
        if let Some(existing) = self.locals_ref().get(&name).cloned() {
            tracing::debug!(store = %name, "local store already exists");
            return Ok(existing);
        }
        let store = LocalStore::open(&name, self.local_root.join(&name), self.parsers.clone())?;
        self.locals_mut().insert(name, store.clone());
        Ok(store)
    }

    /// Create (or return) the remote store with the given name, connecting
    /// through the registry's connector. `BackendUnavailable` without one.
    pub fn create_remote_store(
        &self,
        name: Option<&str>,
        config: RemoteConfig,
    ) -> Result<Arc<RemoteStore>, StoreError> {
        let name = normalized(name);
        if let Some(existing) = self.remotes_ref().get(&name).cloned() {
            tracing::debug!(store = %name, "remote store already exists");
            return Ok(existing);
        }
        let Some(connector) = &self.connector else {
            return Err(StoreError::BackendUnavailable(
                "registry has no remote connector".to_string(),
            ));
        };
        let store = RemoteStore::connect(
            &name,
            config,
            &**connector,
            self.remote_root.join(&name),
            self.parsers.clone(),
        )?;
        self.remotes_mut().insert(name, store.clone());
        Ok(store)
    }

    /// Kind-dispatched creation; remote stores use the default connection
    /// parameters.
    pub fn create_store(
        &self,
        kind: StoreKind,
        name: Option<&str>,
    ) -> Result<Arc<dyn GraphStore>, StoreError> {
        match kind {
            StoreKind::Local => Ok(self.create_local_store(name)?),
            StoreKind::Remote => Ok(self.create_remote_store(name, RemoteConfig::default())?),
        }
    }

    // =========================================================================
    // LOOKUP
    // =========================================================================

    /// Backend-neutral lookup.
    #[must_use]
    pub fn get_store(&self, kind: StoreKind, name: &str) -> Option<Arc<dyn GraphStore>> {
        let name = normalized(Some(name));
        match kind {
            StoreKind::Local => self
                .locals_ref()
                .get(&name)
                .cloned()
                .map(|s| s as Arc<dyn GraphStore>),
            StoreKind::Remote => self
                .remotes_ref()
                .get(&name)
                .cloned()
                .map(|s| s as Arc<dyn GraphStore>),
        }
    }

    /// Typed lookup of a local store.
    #[must_use]
    pub fn get_local_store(&self, name: &str) -> Option<Arc<LocalStore>> {
        self.locals_ref().get(&normalized(Some(name))).cloned()
    }

    /// Typed lookup of a remote store.
    #[must_use]
    pub fn get_remote_store(&self, name: &str) -> Option<Arc<RemoteStore>> {
        self.remotes_ref().get(&normalized(Some(name))).cloned()
    }

    /// Names of all registered stores of one kind.
    #[must_use]
    pub fn list_store_names(&self, kind: StoreKind) -> Vec<String> {
        match kind {
            StoreKind::Local => self.locals_ref().keys().cloned().collect(),
            StoreKind::Remote => self.remotes_ref().keys().cloned().collect(),
        }
    }

    // =========================================================================
    // REMOVAL
    // =========================================================================

    /// Unregister a store and erase its durable footprint (local: the store
    /// directory; remote: the descriptor file). No-op for unknown names.
    pub fn remove_store(&self, kind: StoreKind, name: &str) -> Result<(), StoreError> {
        let name = normalized(Some(name));
        match kind {
            StoreKind::Local => {
                if let Some(store) = self.locals_mut().remove(&name) {
                    store.remove_store()?;
                    tracing::info!(store = %name, "local store unregistered");
                }
            }
            StoreKind::Remote => {
                if let Some(store) = self.remotes_mut().remove(&name) {
                    store.remove_store()?;
                    tracing::info!(store = %name, "remote store unregistered");
                }
            }
        }
        Ok(())
    }

    /// Close every registered store without erasing anything.
    pub fn close(&self) -> Result<(), StoreError> {
        for store in self.locals_ref().values() {
            store.close()?;
        }
        for store in self.remotes_ref().values() {
            store.close()?;
        }
        Ok(())
    }

    /// The registry's local-store root (each store keeps a sub-directory
    /// here).
    #[must_use]
    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    /// The registry's remote-descriptor root.
    #[must_use]
    pub fn remote_root(&self) -> &Path {
        &self.remote_root
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::store::RemoteClient;
    use crate::types::{GraphSnapshot, StoreError, TransactionMode};
    use std::sync::Mutex;

    /// Connector whose clients share one in-memory server, so a
    /// reconstructed store sees the graphs an earlier store uploaded.
    #[derive(Default)]
    struct InMemoryServer {
        graphs: Mutex<BTreeMap<String, GraphSnapshot>>,
    }

    impl RemoteClient for InMemoryServer {
        fn list_names(&self) -> Result<Vec<String>, StoreError> {
            Ok(self.graphs.lock().unwrap().keys().cloned().collect())
        }
        fn get_named(&self, name: &str) -> Result<Option<GraphSnapshot>, StoreError> {
            Ok(self.graphs.lock().unwrap().get(name).cloned())
        }
        fn put_named(&self, name: &str, snapshot: &GraphSnapshot) -> Result<(), StoreError> {
            self.graphs
                .lock()
                .unwrap()
                .insert(name.to_string(), snapshot.clone());
            Ok(())
        }
        fn remove_named(&self, name: &str) -> Result<(), StoreError> {
            self.graphs.lock().unwrap().remove(name);
            Ok(())
        }
        fn begin(&self, _mode: TransactionMode) -> Result<(), StoreError> {
            Ok(())
        }
        fn commit(&self) -> Result<(), StoreError> {
            Ok(())
        }
        fn end(&self) -> Result<(), StoreError> {
            Ok(())
        }
        fn flush(&self) -> Result<(), StoreError> {
            Ok(())
        }
        fn close(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    struct ServerConnector {
        server: Arc<InMemoryServer>,
        seen: Mutex<Vec<RemoteConfig>>,
    }

    impl ServerConnector {
        fn new(server: Arc<InMemoryServer>) -> Arc<Self> {
            Arc::new(Self {
                server,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl RemoteConnector for ServerConnector {
        fn connect(&self, config: &RemoteConfig) -> Result<Arc<dyn RemoteClient>, StoreError> {
            self.seen.lock().unwrap().push(config.clone());
            Ok(self.server.clone())
        }
    }

    #[test]
    fn bootstrap_creates_both_roots() {
        let dir = tempfile::tempdir().unwrap();
        let registry = StoreRegistry::open(dir.path().join("stores")).unwrap();
        assert!(registry.local_root().is_dir());
        assert!(registry.remote_root().is_dir());
    }

    #[test]
    fn blank_and_omitted_names_default() {
        let dir = tempfile::tempdir().unwrap();
        let registry = StoreRegistry::open(dir.path()).unwrap();

        let a = registry.create_local_store(None).unwrap();
        let b = registry.create_local_store(Some("  ")).unwrap();
        let c = registry.create_local_store(Some(DEFAULT_STORE_NAME)).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, &c));
        assert_eq!(a.store_name(), "default");
    }

    #[test]
    fn create_is_idempotent_per_kind() {
        let dir = tempfile::tempdir().unwrap();
        let server = Arc::new(InMemoryServer::default());
        let registry =
            StoreRegistry::open_with_connector(dir.path(), ServerConnector::new(server)).unwrap();

        let local = registry.create_store(StoreKind::Local, Some("mixed")).unwrap();
        let remote = registry.create_store(StoreKind::Remote, Some("mixed")).unwrap();

        // Same name, different kinds: two distinct stores.
        assert!(registry.get_local_store("mixed").is_some());
        assert!(registry.get_remote_store("mixed").is_some());
        assert_eq!(local.store_name(), remote.store_name());

        let again = registry.create_local_store(Some("mixed")).unwrap();
        assert!(Arc::ptr_eq(
            &registry.get_local_store("mixed").unwrap(),
            &again
        ));
    }

    #[test]
    fn local_stores_are_reconstructed_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let registry = StoreRegistry::open(dir.path()).unwrap();
            let store = registry.create_local_store(Some("ontologies")).unwrap();
            store.create_graph("http://ex/g").unwrap();
            registry.close().unwrap();
        }

        let reopened = StoreRegistry::open(dir.path()).unwrap();
        assert_eq!(
            reopened.list_store_names(StoreKind::Local),
            vec!["ontologies"]
        );
        let store = reopened.get_local_store("ontologies").unwrap();
        assert!(store.has_graph("http://ex/g"));
    }

    #[test]
    fn remote_stores_reconnect_from_descriptors() {
        let dir = tempfile::tempdir().unwrap();
        let server = Arc::new(InMemoryServer::default());
        let config = RemoteConfig {
            server_url: "http://rdf.example:8890/sparql".to_string(),
            username: "alice".to_string(),
            password: "s3cret".to_string(),
        };

        {
            let registry = StoreRegistry::open_with_connector(
                dir.path(),
                ServerConnector::new(server.clone()),
            )
            .unwrap();
            let store = registry
                .create_remote_store(Some("triples-prod"), config.clone())
                .unwrap();
            store.create_graph("http://ex/g").unwrap();
            registry.close().unwrap();
        }

        let connector = ServerConnector::new(server);
        let reopened =
            StoreRegistry::open_with_connector(dir.path(), connector.clone()).unwrap();
        // Reconnect used the credentials persisted in the descriptor.
        assert_eq!(connector.seen.lock().unwrap().as_slice(), &[config]);

        let store = reopened.get_remote_store("triples-prod").unwrap();
        assert!(store.has_graph("http://ex/g"));
    }

    #[test]
    fn descriptor_without_connector_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let server = Arc::new(InMemoryServer::default());
        {
            let registry = StoreRegistry::open_with_connector(
                dir.path(),
                ServerConnector::new(server),
            )
            .unwrap();
            registry
                .create_remote_store(None, RemoteConfig::default())
                .unwrap();
            registry.close().unwrap();
        }

        assert!(matches!(
            StoreRegistry::open(dir.path()),
            Err(StoreError::BackendUnavailable(_))
        ));
    }

    #[test]
    fn create_remote_without_connector_fails() {
        let dir = tempfile::tempdir().unwrap();
        let registry = StoreRegistry::open(dir.path()).unwrap();
        assert!(matches!(
            registry.create_remote_store(None, RemoteConfig::default()),
            Err(StoreError::BackendUnavailable(_))
        ));
    }

    #[test]
    fn removed_store_does_not_come_back() {
        let dir = tempfile::tempdir().unwrap();
        {
            let registry = StoreRegistry::open(dir.path()).unwrap();
            registry.create_local_store(Some("transient")).unwrap();
            registry.remove_store(StoreKind::Local, "transient").unwrap();
            assert!(registry.get_local_store("transient").is_none());
            // Unknown name: no-op.
            registry.remove_store(StoreKind::Local, "transient").unwrap();
        }

        let reopened = StoreRegistry::open(dir.path()).unwrap();
        assert!(reopened.list_store_names(StoreKind::Local).is_empty());
    }
}
