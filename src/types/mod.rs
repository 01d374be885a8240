//! # Core Type Definitions
//!
//! All core types for the ontostore named-graph substrate:
//! - RDF terms (`Term`, `Literal`) and statements (`Triple`)
//! - Persistence/wire form of a graph (`GraphSnapshot`)
//! - Transaction scoping (`TransactionMode`)
//! - Error types (`StoreError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module implement `Ord`, so graphs and indexes can be
//! kept in `BTreeMap`/`BTreeSet` with deterministic iteration order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

// =============================================================================
// RDF TERMS
// =============================================================================

/// An RDF literal: a lexical form with an optional language tag or an
/// optional datatype IRI. Per the RDF abstract syntax a literal carries at
/// most one of the two.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Literal {
    /// The lexical form.
    pub lexical: String,
    /// Language tag (e.g. `"en"`), exclusive with `datatype`.
    pub language: Option<String>,
    /// Datatype IRI, exclusive with `language`.
    pub datatype: Option<String>,
}

impl Literal {
    /// A plain literal with no language tag or datatype.
    #[must_use]
    pub fn plain(lexical: impl Into<String>) -> Self {
        Self {
            lexical: lexical.into(),
            language: None,
            datatype: None,
        }
    }

    /// A language-tagged literal.
    #[must_use]
    pub fn lang(lexical: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            lexical: lexical.into(),
            language: Some(language.into()),
            datatype: None,
        }
    }

    /// A datatyped literal.
    #[must_use]
    pub fn typed(lexical: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            lexical: lexical.into(),
            language: None,
            datatype: Some(datatype.into()),
        }
    }
}

/// A node in an RDF statement: an IRI, a blank node, or a literal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Term {
    /// An IRI reference.
    Iri(String),
    /// A blank node with its local label (without the `_:` prefix).
    Blank(String),
    /// A literal value.
    Literal(Literal),
}

impl Term {
    /// Create an IRI term.
    #[must_use]
    pub fn iri(s: impl Into<String>) -> Self {
        Self::Iri(s.into())
    }

    /// Create a blank-node term.
    #[must_use]
    pub fn blank(s: impl Into<String>) -> Self {
        Self::Blank(s.into())
    }

    /// Create a plain-literal term.
    #[must_use]
    pub fn literal(s: impl Into<String>) -> Self {
        Self::Literal(Literal::plain(s))
    }

    /// The literal lexical form, if this term is a literal.
    #[must_use]
    pub fn lexical(&self) -> Option<&str> {
        match self {
            Self::Literal(lit) => Some(&lit.lexical),
            _ => None,
        }
    }

    /// Whether this term is a literal.
    #[must_use]
    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }
}

// =============================================================================
// TRIPLE
// =============================================================================

/// A subject-predicate-object statement.
///
/// Well-formed RDF restricts subjects to IRIs/blank nodes and predicates to
/// IRIs; the built-in N-Triples parser only produces well-formed triples,
/// and the container does not re-validate hand-built ones.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl Triple {
    /// Create a new triple.
    #[must_use]
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
}

// =============================================================================
// GRAPH SNAPSHOT
// =============================================================================

/// Serializable form of a named graph's content: its triple set plus its
/// namespace-prefix mapping.
///
/// This is the payload persisted in the durable dataset (postcard-encoded)
/// and shipped to the remote client. Triples are kept sorted so the same
/// content always encodes to the same bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub triples: Vec<Triple>,
    /// prefix -> namespace IRI
    pub prefixes: BTreeMap<String, String>,
}

impl GraphSnapshot {
    /// Create an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of triples in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    /// Whether the snapshot holds no triples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }
}

// =============================================================================
// TRANSACTION MODE
// =============================================================================

/// Scope of a transaction bracket on a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TransactionMode {
    /// Read-only scope.
    Read,
    /// Read-write scope.
    Write,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors surfaced by stores, the registry, and their collaborators.
///
/// Construction-time failures (`BackendUnavailable`, `Io` during registry
/// bootstrap) are unrecoverable and abort initialization. Per-operation
/// failures (`NotFound`, `Format`) leave store state untouched.
/// `ConsistencyViolation` signals a bug, not a recoverable condition.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A requested source file or graph is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// An ontology source could not be parsed.
    #[error("format error: {0}")]
    Format(String),

    /// The in-memory cache and the durable store diverged. Loud by design:
    /// this is never silently repaired.
    #[error("cache/durable-store consistency violation: {0}")]
    ConsistencyViolation(String),

    /// The durable dataset or remote connection cannot be opened or has
    /// been closed.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn literal_constructors_are_exclusive() {
        let plain = Literal::plain("hello");
        assert!(plain.language.is_none() && plain.datatype.is_none());

        let lang = Literal::lang("hello", "en");
        assert_eq!(lang.language.as_deref(), Some("en"));
        assert!(lang.datatype.is_none());

        let typed = Literal::typed("42", "http://www.w3.org/2001/XMLSchema#integer");
        assert!(typed.language.is_none());
        assert!(typed.datatype.is_some());
    }

    #[test]
    fn term_lexical_only_for_literals() {
        assert_eq!(Term::literal("x").lexical(), Some("x"));
        assert_eq!(Term::iri("http://ex/a").lexical(), None);
        assert_eq!(Term::blank("b0").lexical(), None);
    }

    #[test]
    fn triples_order_deterministically() {
        let t1 = Triple::new(
            Term::iri("http://ex/a"),
            Term::iri("http://ex/p"),
            Term::literal("1"),
        );
        let t2 = Triple::new(
            Term::iri("http://ex/b"),
            Term::iri("http://ex/p"),
            Term::literal("2"),
        );

        let mut set = BTreeSet::new();
        set.insert(t2.clone());
        set.insert(t1.clone());

        let ordered: Vec<_> = set.into_iter().collect();
        assert_eq!(ordered, vec![t1, t2]);
    }

    #[test]
    fn snapshot_starts_empty() {
        let snapshot = GraphSnapshot::new();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.len(), 0);
    }
}
