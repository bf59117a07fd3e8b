//! Narrow query interface to the external triple store
//!
//! The engine asks four questions of the store: the neighbourhood of a set
//! of entry points, label matches, name resolution, and per-type counts.
//! `SparqlTripleStore` renders those questions as the SPARQL shapes in
//! [`super::sparql`] against any endpoint that can run a SELECT;
//! `MemoryTripleStore` answers them from an in-memory triple list.

use super::sparql;
use super::triple::{vocab, Triple};
use crate::graph::{NodeKind, Uri};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};

/// Errors from triple-store operations.
#[derive(Debug, thiserror::Error)]
pub enum TripleStoreError {
    #[error("query failed: {0}")]
    Query(String),
    #[error("store unreachable: {0}")]
    Connection(String),
}

/// A node matched by label
#[derive(Debug, Clone)]
pub struct LabelMatch {
    pub uri: Uri,
    pub kind: NodeKind,
    pub label: String,
    pub content: Option<String>,
}

/// A resolved entity name
#[derive(Debug, Clone)]
pub struct ResolvedName {
    pub uri: Uri,
    pub label: String,
}

/// The four query shapes the engine needs from a triple store.
#[async_trait]
pub trait TripleQueries: Send + Sync {
    /// All triples touching the entry points (subject or object membership).
    async fn neighborhood(&self, entry_points: &[Uri]) -> Result<Vec<Triple>, TripleStoreError>;

    /// Nodes of the given kinds whose label matches a term,
    /// case-insensitive equality or containment.
    async fn label_search(
        &self,
        terms: &[String],
        kinds: &[NodeKind],
    ) -> Result<Vec<LabelMatch>, TripleStoreError>;

    /// Per-name label resolution, at most `limit` candidates each.
    async fn resolve_names(
        &self,
        names: &[String],
        limit: usize,
    ) -> Result<HashMap<String, Vec<ResolvedName>>, TripleStoreError>;

    /// Distinct-subject counts per declared type.
    async fn kind_counts(&self) -> Result<HashMap<NodeKind, u64>, TripleStoreError>;
}

/// A backend able to execute a SPARQL SELECT and return bindings keyed by
/// projection variable (without the leading `?`).
#[async_trait]
pub trait SparqlEndpoint: Send + Sync {
    async fn select(
        &self,
        sparql: &str,
    ) -> Result<Vec<HashMap<String, String>>, TripleStoreError>;
}

/// [`TripleQueries`] over any [`SparqlEndpoint`]
pub struct SparqlTripleStore<E> {
    endpoint: E,
}

impl<E: SparqlEndpoint> SparqlTripleStore<E> {
    pub fn new(endpoint: E) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl<E: SparqlEndpoint> TripleQueries for SparqlTripleStore<E> {
    async fn neighborhood(&self, entry_points: &[Uri]) -> Result<Vec<Triple>, TripleStoreError> {
        if entry_points.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self.endpoint.select(&sparql::graph_fetch(entry_points)).await?;
        Ok(rows
            .into_iter()
            .filter_map(|mut row| {
                Some(Triple::new(
                    row.remove("subject")?,
                    row.remove("predicate")?,
                    row.remove("object")?,
                ))
            })
            .collect())
    }

    async fn label_search(
        &self,
        terms: &[String],
        kinds: &[NodeKind],
    ) -> Result<Vec<LabelMatch>, TripleStoreError> {
        if terms.is_empty() || kinds.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self
            .endpoint
            .select(&sparql::label_lookup(terms, kinds))
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|mut row| {
                let uri = row.remove("uri")?;
                let kind = row
                    .get("type")
                    .and_then(|t| NodeKind::from_type_uri(t))
                    .unwrap_or(NodeKind::Unknown);
                Some(LabelMatch {
                    uri: uri.into(),
                    kind,
                    label: row.remove("label").unwrap_or_default(),
                    content: row.remove("content"),
                })
            })
            .collect())
    }

    async fn resolve_names(
        &self,
        names: &[String],
        limit: usize,
    ) -> Result<HashMap<String, Vec<ResolvedName>>, TripleStoreError> {
        let mut resolved = HashMap::with_capacity(names.len());
        for name in names {
            let rows = self
                .endpoint
                .select(&sparql::name_resolution(name, limit))
                .await?;
            let candidates = rows
                .into_iter()
                .filter_map(|mut row| {
                    Some(ResolvedName {
                        uri: row.remove("uri")?.into(),
                        label: row.remove("label").unwrap_or_default(),
                    })
                })
                .collect();
            resolved.insert(name.clone(), candidates);
        }
        Ok(resolved)
    }

    async fn kind_counts(&self) -> Result<HashMap<NodeKind, u64>, TripleStoreError> {
        let rows = self.endpoint.select(&sparql::type_statistics()).await?;
        let mut counts = HashMap::new();
        for row in rows {
            let Some(kind) = row.get("type").and_then(|t| NodeKind::from_type_uri(t)) else {
                continue;
            };
            let count = row
                .get("count")
                .and_then(|c| c.parse::<u64>().ok())
                .unwrap_or(0);
            *counts.entry(kind).or_insert(0) += count;
        }
        Ok(counts)
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// In-memory [`TripleQueries`] over a triple list, for tests and the CLI.
///
/// A failing variant is available so orchestrator tests can exercise the
/// absorb-and-continue path.
pub struct MemoryTripleStore {
    triples: Vec<Triple>,
    fail: bool,
}

impl MemoryTripleStore {
    pub fn new(triples: Vec<Triple>) -> Self {
        Self {
            triples,
            fail: false,
        }
    }

    /// A store whose every query fails.
    pub fn failing() -> Self {
        Self {
            triples: Vec::new(),
            fail: true,
        }
    }

    fn guard(&self) -> Result<(), TripleStoreError> {
        if self.fail {
            Err(TripleStoreError::Connection(
                "store configured to fail".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    fn kind_of(&self, subject: &str) -> NodeKind {
        let types: Vec<&str> = self
            .triples
            .iter()
            .filter(|t| t.subject == subject && t.is_type_declaration())
            .map(|t| t.object.as_str())
            .collect();
        NodeKind::from_rdf_types(&types)
    }

    fn content_of(&self, subject: &str) -> Option<String> {
        self.triples
            .iter()
            .find(|t| t.subject == subject && t.predicate == vocab::HAS_CONTENT)
            .map(|t| t.object.clone())
    }
}

fn label_matches(label: &str, term: &str) -> bool {
    let label = label.to_lowercase();
    let term = term.to_lowercase();
    label == term || label.contains(&term)
}

#[async_trait]
impl TripleQueries for MemoryTripleStore {
    async fn neighborhood(&self, entry_points: &[Uri]) -> Result<Vec<Triple>, TripleStoreError> {
        self.guard()?;
        let entries: BTreeSet<&str> = entry_points.iter().map(Uri::as_str).collect();

        // Relationship nodes with an endpoint in the entry set
        let relationship_subjects: BTreeSet<&str> = self
            .triples
            .iter()
            .filter(|t| {
                (t.predicate == vocab::HAS_SOURCE_ENTITY
                    || t.predicate == vocab::HAS_TARGET_ENTITY)
                    && entries.contains(t.object.as_str())
            })
            .map(|t| t.subject.as_str())
            .collect();

        // Everything those relationships mention, plus the entries
        let mut mentioned: BTreeSet<&str> = entries.clone();
        for t in &self.triples {
            if relationship_subjects.contains(t.subject.as_str())
                && (t.predicate == vocab::HAS_SOURCE_ENTITY
                    || t.predicate == vocab::HAS_TARGET_ENTITY)
            {
                mentioned.insert(t.object.as_str());
            }
        }

        Ok(self
            .triples
            .iter()
            .filter(|t| {
                entries.contains(t.subject.as_str())
                    || entries.contains(t.object.as_str())
                    || relationship_subjects.contains(t.subject.as_str())
                    || (t.is_type_declaration() && mentioned.contains(t.subject.as_str()))
            })
            .cloned()
            .collect())
    }

    async fn label_search(
        &self,
        terms: &[String],
        kinds: &[NodeKind],
    ) -> Result<Vec<LabelMatch>, TripleStoreError> {
        self.guard()?;
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut matches = Vec::new();

        for t in &self.triples {
            if t.predicate != vocab::RDFS_LABEL && t.predicate != vocab::SKOS_PREF_LABEL {
                continue;
            }
            if seen.contains(t.subject.as_str()) {
                continue;
            }
            if !terms.iter().any(|term| label_matches(&t.object, term)) {
                continue;
            }
            let kind = self.kind_of(&t.subject);
            if !kinds.contains(&kind) {
                continue;
            }
            seen.insert(&t.subject);
            matches.push(LabelMatch {
                uri: t.subject.as_str().into(),
                kind,
                label: t.object.clone(),
                content: self.content_of(&t.subject),
            });
        }
        Ok(matches)
    }

    async fn resolve_names(
        &self,
        names: &[String],
        limit: usize,
    ) -> Result<HashMap<String, Vec<ResolvedName>>, TripleStoreError> {
        self.guard()?;
        let mut resolved = HashMap::with_capacity(names.len());
        for name in names {
            let mut seen: BTreeSet<&str> = BTreeSet::new();
            let mut candidates = Vec::new();
            for t in &self.triples {
                if candidates.len() >= limit {
                    break;
                }
                if t.predicate != vocab::RDFS_LABEL && t.predicate != vocab::SKOS_PREF_LABEL {
                    continue;
                }
                if label_matches(&t.object, name) && seen.insert(&t.subject) {
                    candidates.push(ResolvedName {
                        uri: t.subject.as_str().into(),
                        label: t.object.clone(),
                    });
                }
            }
            resolved.insert(name.clone(), candidates);
        }
        Ok(resolved)
    }

    async fn kind_counts(&self) -> Result<HashMap<NodeKind, u64>, TripleStoreError> {
        self.guard()?;
        let mut per_kind: HashMap<NodeKind, BTreeSet<&str>> = HashMap::new();
        for t in &self.triples {
            if !t.is_type_declaration() {
                continue;
            }
            if let Some(kind) = NodeKind::from_type_uri(&t.object) {
                per_kind.entry(kind).or_default().insert(&t.subject);
            }
        }
        Ok(per_kind
            .into_iter()
            .map(|(kind, subjects)| (kind, subjects.len() as u64))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> MemoryTripleStore {
        MemoryTripleStore::new(vec![
            Triple::new("e:alpha", vocab::RDF_TYPE, "http://purl.org/stuff/ragno/Entity"),
            Triple::new("e:alpha", vocab::RDFS_LABEL, "Alpha"),
            Triple::new("e:alpha", vocab::HAS_CONTENT, "about alpha"),
            Triple::new("e:beta", vocab::RDF_TYPE, "http://purl.org/stuff/ragno/Entity"),
            Triple::new("e:beta", vocab::SKOS_PREF_LABEL, "Beta"),
            Triple::new("a:1", vocab::RDF_TYPE, "http://purl.org/stuff/ragno/Attribute"),
            Triple::new("a:1", vocab::RDFS_LABEL, "alphabet"),
            Triple::new("r:1", vocab::HAS_SOURCE_ENTITY, "e:alpha"),
            Triple::new("r:1", vocab::HAS_TARGET_ENTITY, "e:beta"),
            Triple::new("r:1", vocab::HAS_WEIGHT, "1.0"),
        ])
    }

    #[tokio::test]
    async fn neighborhood_pulls_relationships_and_types() {
        let store = fixture();
        let triples = store.neighborhood(&["e:alpha".into()]).await.unwrap();

        // The reified relationship and both endpoint type declarations come back
        assert!(triples
            .iter()
            .any(|t| t.subject == "r:1" && t.predicate == vocab::HAS_TARGET_ENTITY));
        assert!(triples
            .iter()
            .any(|t| t.subject == "e:beta" && t.is_type_declaration()));

        // Enough to rebuild the graph around the entry point
        let graph = crate::graph::Graph::build(&triples, true);
        assert_eq!(graph.edge_count(), 1);
    }

    #[tokio::test]
    async fn label_search_is_case_insensitive_and_typed() {
        let store = fixture();
        let matches = store
            .label_search(&["ALPHA".to_string()], &[NodeKind::Entity])
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].uri, Uri::from("e:alpha"));
        assert_eq!(matches[0].content.as_deref(), Some("about alpha"));

        // Containment also matches, and the Attribute surface is separate
        let matches = store
            .label_search(&["alpha".to_string()], &[NodeKind::Entity, NodeKind::Attribute])
            .await
            .unwrap();
        assert_eq!(matches.len(), 2);
    }

    #[tokio::test]
    async fn resolve_names_limits_candidates() {
        let store = fixture();
        let resolved = store
            .resolve_names(&["alpha".to_string()], 1)
            .await
            .unwrap();
        assert_eq!(resolved["alpha"].len(), 1);
    }

    #[tokio::test]
    async fn kind_counts_count_distinct_subjects() {
        let store = fixture();
        let counts = store.kind_counts().await.unwrap();
        assert_eq!(counts[&NodeKind::Entity], 2);
        assert_eq!(counts[&NodeKind::Attribute], 1);
    }

    #[tokio::test]
    async fn failing_store_fails_every_shape() {
        let store = MemoryTripleStore::failing();
        assert!(store.neighborhood(&["e:a".into()]).await.is_err());
        assert!(store
            .label_search(&["x".to_string()], &[NodeKind::Entity])
            .await
            .is_err());
        assert!(store.kind_counts().await.is_err());
    }
}
