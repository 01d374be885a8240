//! # RDF Serialization Formats
//!
//! Format tags for ontology sources, the pluggable [`Parser`] seam, and the
//! [`ParserRegistry`] that maps one to the other.
//!
//! Parsing is a collaborator concern: stores look a parser up by format and
//! feed it the opened source. Only N-Triples ships built in (see
//! [`ntriples`]); RDF/XML, Turtle and N3 are expected to be registered by
//! the embedding application.

pub mod ntriples;

use crate::types::{GraphSnapshot, StoreError};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::str::FromStr;
use std::sync::Arc;

// =============================================================================
// FORMAT TAGS
// =============================================================================

/// Serialization format of an ontology source file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RdfFormat {
    /// RDF/XML (`"RDF/XML"`), the conventional default for `.rdf`/`.owl`.
    #[default]
    RdfXml,
    /// Turtle (`"TTL"`).
    Turtle,
    /// N-Triples (`"N-TRIPLES"`).
    NTriples,
    /// Notation3 (`"N3"`).
    N3,
}

impl RdfFormat {
    /// The conventional tag string for this format.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::RdfXml => "RDF/XML",
            Self::Turtle => "TTL",
            Self::NTriples => "N-TRIPLES",
            Self::N3 => "N3",
        }
    }
}

impl fmt::Display for RdfFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for RdfFormat {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RDF/XML" => Ok(Self::RdfXml),
            "TTL" => Ok(Self::Turtle),
            "N-TRIPLES" => Ok(Self::NTriples),
            "N3" => Ok(Self::N3),
            other => Err(StoreError::Format(format!(
                "unknown RDF format tag: {other}"
            ))),
        }
    }
}

// =============================================================================
// PARSER SEAM
// =============================================================================

/// A parser for one RDF serialization.
///
/// Parsers are pure: they read a source to completion and return a
/// [`GraphSnapshot`], never touching store state, so a parse failure leaves
/// no partial graph behind.
pub trait Parser: Send + Sync {
    /// Parse a source into a snapshot. `base_iri` resolves relative IRIs
    /// for formats that allow them; parsers for absolute-only formats
    /// ignore it.
    fn parse(
        &self,
        reader: &mut dyn Read,
        base_iri: Option<&str>,
    ) -> Result<GraphSnapshot, StoreError>;
}

/// Format -> parser lookup.
///
/// The default registry carries the built-in N-Triples parser; all other
/// formats must be registered by the caller. Looking up an unregistered
/// format is a [`StoreError::Format`].
#[derive(Clone)]
pub struct ParserRegistry {
    parsers: BTreeMap<RdfFormat, Arc<dyn Parser>>,
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("formats", &self.parsers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        let mut parsers: BTreeMap<RdfFormat, Arc<dyn Parser>> = BTreeMap::new();
        parsers.insert(
            RdfFormat::NTriples,
            Arc::new(ntriples::NTriplesParser) as Arc<dyn Parser>,
        );
        Self { parsers }
    }
}

impl ParserRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the parser for a format.
    pub fn register(&mut self, format: RdfFormat, parser: Arc<dyn Parser>) {
        self.parsers.insert(format, parser);
    }

    /// The parser for a format, or a `Format` error when none is registered.
    pub fn parser_for(&self, format: RdfFormat) -> Result<Arc<dyn Parser>, StoreError> {
        self.parsers.get(&format).cloned().ok_or_else(|| {
            StoreError::Format(format!("no parser registered for format {format}"))
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
