//! # ontostore
//!
//! A uniform abstraction over heterogeneous RDF named-graph backends.
//!
//! Two backends satisfy one [`GraphStore`] contract:
//! - [`LocalStore`] — embedded and file-backed (redb), graphs restored and
//!   indexed on open
//! - [`RemoteStore`] — a networked store behind an injected
//!   [`RemoteConnector`], reconnected from on-disk descriptors
//!
//! Shared semantics across both:
//! - **Cache-authoritative liveness**: the in-memory cache decides which
//!   graphs exist; the durable layer carries content across restarts. The
//!   two converge after every successful mutating call, and divergence is
//!   surfaced loudly as a `ConsistencyViolation`.
//! - **Live graph handles**: stores hand out `Arc<NamedGraph>` references
//!   into their cache; mutations through a handle feed the store's lexical
//!   index and (with auto-sync enabled) its durability listener.
//! - **Manual or automatic durability**: buffered mutations persist on
//!   `sync()`/`close()`, or immediately while auto-sync is on.
//!
//! Stores are created and reconstructed exclusively through a
//! [`StoreRegistry`] rooted at a filesystem path.
//!
//! ## Example
//!
//! ```no_run
//! use ontostore::{GraphStore, StoreRegistry, Term, Triple};
//!
//! # fn main() -> Result<(), ontostore::StoreError> {
//! let registry = StoreRegistry::open("/var/lib/myapp/stores")?;
//! let store = registry.create_local_store(None)?;
//!
//! let graph = store.create_graph("http://example.org/ontology")?;
//! graph.insert(Triple::new(
//!     Term::iri("http://example.org/thing"),
//!     Term::iri("http://www.w3.org/2000/01/rdf-schema#label"),
//!     Term::literal("a labeled thing"),
//! ));
//! store.sync()?;
//!
//! assert_eq!(store.search("labeled"), vec!["http://example.org/ontology"]);
//! # Ok(())
//! # }
//! ```

// =============================================================================
// MODULES
// =============================================================================

pub mod formats;
pub mod graph;
pub mod index;
pub mod registry;
pub mod storage;
pub mod store;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{GraphSnapshot, Literal, StoreError, Term, TransactionMode, Triple};

// =============================================================================
// RE-EXPORTS: Graphs and Index
// =============================================================================

pub use graph::{ChangeObserver, GraphChange, NamedGraph};
pub use index::GraphIndex;

// =============================================================================
// RE-EXPORTS: Stores and Registry
// =============================================================================

pub use registry::{DEFAULT_STORE_NAME, StoreKind, StoreRegistry};
pub use storage::Dataset;
pub use store::{
    GraphStore, LocalStore, RemoteClient, RemoteConfig, RemoteConnector, RemoteStore,
    StoreDescriptor,
};

// =============================================================================
// RE-EXPORTS: Formats
// =============================================================================

pub use formats::{Parser, ParserRegistry, RdfFormat, ntriples::NTriplesParser};
