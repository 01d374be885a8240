//! # Lexical Graph Index
//!
//! A full-text index over the literal terms of registered named graphs.
//! Tokens map to the graphs that contain them, with occurrence counts so
//! that removing one of several triples sharing a token does not evict the
//! token while the others remain.
//!
//! The index maintains itself two ways:
//! - **Full re-index**: [`GraphIndex::index_graph`] purges a graph's entries
//!   and rescans its current content (used on restore and on explicit
//!   index-update requests).
//! - **Incremental**: the index is a [`ChangeObserver`]; graphs it is
//!   registered for feed it insert/remove deltas as they happen.
//!
//! Only literal objects are indexed. Tokenization is lowercase,
//! whitespace-split; punctuation inside a token is kept as-is.

use crate::graph::{ChangeObserver, GraphChange, NamedGraph};
use crate::types::Triple;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock};

/// token -> graph name -> occurrence count
type TokenTable = BTreeMap<String, BTreeMap<String, u64>>;

/// Change-synchronized lexical index over literal terms.
///
/// Shared behind an `Arc`; all methods take `&self`.
#[derive(Debug, Default)]
pub struct GraphIndex {
    entries: RwLock<TokenTable>,
    /// Graphs whose change notifications this index consumes.
    registered: RwLock<BTreeSet<String>>,
}

/// Lowercased whitespace tokens of a literal's lexical form.
fn tokenize(lexical: &str) -> impl Iterator<Item = String> + '_ {
    lexical.split_whitespace().map(str::to_lowercase)
}

impl GraphIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries_mut(&self) -> std::sync::RwLockWriteGuard<'_, TokenTable> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // REGISTRATION
    // =========================================================================

    /// Mark a graph as index-maintained: future change notifications for it
    /// are applied incrementally.
    pub fn register(&self, graph_name: &str) {
        self.registered
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(graph_name.to_string());
    }

    /// Stop maintaining a graph. Its existing entries are untouched;
    /// callers pair this with [`GraphIndex::remove_graph`] when the graph
    /// itself goes away.
    pub fn unregister(&self, graph_name: &str) {
        self.registered
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(graph_name);
    }

    /// Whether a graph's changes are being consumed.
    #[must_use]
    pub fn is_registered(&self, graph_name: &str) -> bool {
        self.registered
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(graph_name)
    }

    // =========================================================================
    // MAINTENANCE
    // =========================================================================

    /// Full re-index of one graph: purge all its entries, then scan its
    /// current triple set. Also registers the graph.
    pub fn index_graph(&self, graph: &NamedGraph) {
        self.register(graph.name());
        let triples = graph.triples();
        let mut entries = self.entries_mut();
        purge(&mut entries, graph.name());
        for triple in &triples {
            add_triple(&mut entries, graph.name(), triple);
        }
    }

    /// Drop every entry for a graph and unregister it (graph removal).
    pub fn remove_graph(&self, graph_name: &str) {
        self.unregister(graph_name);
        purge(&mut self.entries_mut(), graph_name);
    }

    /// Apply one change delta to a graph's entries.
    pub fn apply(&self, graph_name: &str, change: &GraphChange) {
        let mut entries = self.entries_mut();
        match change {
            GraphChange::Inserted(triples) => {
                for triple in triples {
                    add_triple(&mut entries, graph_name, triple);
                }
            }
            GraphChange::Removed(triples) => {
                for triple in triples {
                    remove_triple(&mut entries, graph_name, triple);
                }
            }
            GraphChange::PrefixesChanged => {}
        }
    }

    // =========================================================================
    // LOOKUP
    // =========================================================================

    /// Names of graphs whose literals contain every token of `text`
    /// (case-insensitive). Deterministic order; empty query matches nothing.
    #[must_use]
    pub fn search(&self, text: &str) -> Vec<String> {
        let tokens: Vec<String> = tokenize(text).collect();
        if tokens.is_empty() {
            return Vec::new();
        }
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut result: Option<BTreeSet<String>> = None;
        for token in &tokens {
            let graphs: BTreeSet<String> = entries
                .get(token)
                .map(|per_graph| per_graph.keys().cloned().collect())
                .unwrap_or_default();
            result = Some(match result {
                None => graphs,
                Some(acc) => acc.intersection(&graphs).cloned().collect(),
            });
        }
        result.unwrap_or_default().into_iter().collect()
    }
}

fn purge(entries: &mut TokenTable, graph_name: &str) {
    entries.retain(|_, per_graph| {
        per_graph.remove(graph_name);
        !per_graph.is_empty()
    });
}

fn add_triple(entries: &mut TokenTable, graph_name: &str, triple: &Triple) {
    if let Some(lexical) = triple.object.lexical() {
        for token in tokenize(lexical) {
            *entries
                .entry(token)
                .or_default()
                .entry(graph_name.to_string())
                .or_insert(0) += 1;
        }
    }
}

fn remove_triple(entries: &mut TokenTable, graph_name: &str, triple: &Triple) {
    if let Some(lexical) = triple.object.lexical() {
        for token in tokenize(lexical) {
            if let Some(per_graph) = entries.get_mut(&token) {
                if let Some(count) = per_graph.get_mut(graph_name) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        per_graph.remove(graph_name);
                    }
                }
                if per_graph.is_empty() {
                    entries.remove(&token);
                }
            }
        }
    }
}

/// Incremental maintenance: deltas from registered graphs are applied as
/// they arrive. Notifications from unregistered graphs are ignored.
impl ChangeObserver for GraphIndex {
    fn graph_changed(&self, graph: &NamedGraph, change: &GraphChange) {
        if self.is_registered(graph.name()) {
            self.apply(graph.name(), change);
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
    use std::sync::Arc;

    fn labeled(graph: &NamedGraph, label: &str) -> Triple {
        let t = Triple::new(
            Term::iri("http://ex/s"),
            Term::iri("http://www.w3.org/2000/01/rdf-schema#label"),
            Term::literal(label),
        );
        graph.insert(t.clone());
        t
    }

    #[test]
    fn indexed_literal_is_searchable() {
        let graph = NamedGraph::new("http://ex/g1");
        labeled(&graph, "lexical-literal appears here");

        let index = GraphIndex::new();
        index.index_graph(&graph);

        assert_eq!(index.search("lexical-literal"), vec!["http://ex/g1"]);
        // Case-insensitive.
        assert_eq!(index.search("LEXICAL-LITERAL"), vec!["http://ex/g1"]);
        assert!(index.search("absent").is_empty());
        assert!(index.search("").is_empty());
    }

    #[test]
    fn non_literal_objects_are_not_indexed() {
        let graph = NamedGraph::new("http://ex/g1");
        graph.insert(Triple::new(
            Term::iri("http://ex/s"),
            Term::iri("http://ex/p"),
            Term::iri("http://ex/not-indexed"),
        ));

        let index = GraphIndex::new();
        index.index_graph(&graph);
        assert!(index.search("http://ex/not-indexed").is_empty());
    }

    #[test]
    fn incremental_updates_follow_registered_graphs() {
        let graph = NamedGraph::new("http://ex/g1");
        let index = Arc::new(GraphIndex::new());
        index.index_graph(&graph);
        graph.register_observer(index.clone());

        let t = labeled(&graph, "incoming");
        assert_eq!(index.search("incoming"), vec!["http://ex/g1"]);

        graph.remove(&t);
        assert!(index.search("incoming").is_empty());
    }

    #[test]
    fn unregistered_graph_changes_are_ignored() {
        let graph = NamedGraph::new("http://ex/g1");
        let index = Arc::new(GraphIndex::new());
        graph.register_observer(index.clone());

        labeled(&graph, "ghost");
        assert!(index.search("ghost").is_empty());
    }

    #[test]
    fn shared_tokens_survive_partial_removal() {
        let graph = NamedGraph::new("http://ex/g1");
        let index = Arc::new(GraphIndex::new());
        index.index_graph(&graph);
        graph.register_observer(index.clone());

        let first = labeled(&graph, "shared token");
        graph.insert(Triple::new(
            Term::iri("http://ex/s2"),
            Term::iri("http://ex/p"),
            Term::literal("shared elsewhere"),
        ));

        graph.remove(&first);
        // "shared" still lives in the second triple.
        assert_eq!(index.search("shared"), vec!["http://ex/g1"]);
        assert!(index.search("token").is_empty());
    }

    #[test]
    fn multi_token_search_intersects() {
        let g1 = NamedGraph::new("http://ex/g1");
        labeled(&g1, "alpha beta");
        let g2 = NamedGraph::new("http://ex/g2");
        labeled(&g2, "alpha gamma");

        let index = GraphIndex::new();
        index.index_graph(&g1);
        index.index_graph(&g2);

        assert_eq!(index.search("alpha"), vec!["http://ex/g1", "http://ex/g2"]);
        assert_eq!(index.search("alpha beta"), vec!["http://ex/g1"]);
        assert!(index.search("beta gamma").is_empty());
    }

    #[test]
    fn reindex_purges_stale_entries() {
        let graph = NamedGraph::new("http://ex/g1");
        let stale = labeled(&graph, "stale");

        let index = GraphIndex::new();
        index.index_graph(&graph);
        assert_eq!(index.search("stale"), vec!["http://ex/g1"]);

        // Mutate without the observer wired, then re-index.
        graph.remove(&stale);
        labeled(&graph, "fresh");
        index.index_graph(&graph);

        assert!(index.search("stale").is_empty());
        assert_eq!(index.search("fresh"), vec!["http://ex/g1"]);
    }

    #[test]
    fn remove_graph_drops_entries_and_registration() {
        let graph = NamedGraph::new("http://ex/g1");
        labeled(&graph, "transient");

        let index = GraphIndex::new();
        index.index_graph(&graph);
        assert!(index.is_registered("http://ex/g1"));

        index.remove_graph("http://ex/g1");
        assert!(!index.is_registered("http://ex/g1"));
        assert!(index.search("transient").is_empty());
    }
}
