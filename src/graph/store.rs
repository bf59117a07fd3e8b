//! In-memory graph store built from a triple stream
//!
//! Arena layout: nodes and edges live in indexable vectors and adjacency is
//! expressed as index sets, so analytics iterate without chasing pointers.
//! A graph is immutable once built; any number of analytics runs may share
//! one by reference.

use super::edge::GraphEdge;
use super::node::{GraphNode, NodeKind, Uri};
use crate::rdf::{vocab, Triple};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// The in-memory retrieval graph
///
/// Adjacency is stored per node as an ordered set of neighbour indices, so
/// iteration order (and therefore tie-breaking in analytics) is
/// deterministic within a single build.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<GraphNode>,
    index: HashMap<Uri, usize>,
    edges: Vec<GraphEdge>,
    /// Forward adjacency; mirrored at insert time when `undirected` is set
    adjacency: Vec<BTreeSet<usize>>,
    /// Reverse adjacency, kept for symmetric walks over directed builds
    rev_adjacency: Vec<BTreeSet<usize>>,
    in_degree: Vec<usize>,
    out_degree: Vec<usize>,
    /// Forward edge weights; lookups fall back over `(u,v)`, `(v,u)`, 1.0
    weights: HashMap<(usize, usize), f64>,
    undirected: bool,
}

impl Graph {
    /// Create an empty graph
    pub fn new(undirected: bool) -> Self {
        Self {
            undirected,
            ..Default::default()
        }
    }

    /// Build a graph from a triple stream.
    ///
    /// Two passes: the first collects typed nodes (any recognised ragno
    /// type), the second collects reified relationships
    /// (`hasSourceEntity`/`hasTargetEntity`/`hasWeight`). Relationships
    /// whose endpoints are missing are dropped, not fatal; an advisory
    /// count is logged. Non-numeric weights default to 1.0.
    pub fn build(triples: &[Triple], undirected: bool) -> Self {
        let mut graph = Self::new(undirected);

        // Pass 1: typed nodes. The first recognised type wins.
        for t in triples {
            if !t.is_type_declaration() {
                continue;
            }
            if let Some(kind) = NodeKind::from_type_uri(&t.object) {
                graph.add_node(GraphNode::new(t.subject.as_str(), kind));
            }
        }

        // Pass 2: node text and reified relationships. BTreeMap keeps the
        // relationship insertion order stable across runs.
        let mut relationships: BTreeMap<&str, RelationshipParts> = BTreeMap::new();
        for t in triples {
            match t.predicate.as_str() {
                vocab::HAS_CONTENT => {
                    if let Some(&i) = graph.index.get(&Uri::from(t.subject.as_str())) {
                        graph.nodes[i].content = Some(t.object.clone());
                    }
                }
                vocab::HAS_SUMMARY => {
                    if let Some(&i) = graph.index.get(&Uri::from(t.subject.as_str())) {
                        graph.nodes[i].summary = Some(t.object.clone());
                    }
                }
                vocab::HAS_SOURCE_ENTITY => {
                    relationships.entry(&t.subject).or_default().source = Some(&t.object);
                }
                vocab::HAS_TARGET_ENTITY => {
                    relationships.entry(&t.subject).or_default().target = Some(&t.object);
                }
                vocab::HAS_WEIGHT => {
                    relationships.entry(&t.subject).or_default().weight =
                        t.object.parse::<f64>().ok().filter(|w| w.is_finite() && *w >= 0.0);
                }
                _ => {}
            }
        }

        let mut skipped = 0usize;
        for (rel_uri, parts) in relationships {
            let (Some(source), Some(target)) = (parts.source, parts.target) else {
                skipped += 1;
                continue;
            };
            let weight = parts.weight.unwrap_or(1.0);
            if !graph.add_edge(
                &Uri::from(source),
                &Uri::from(target),
                weight,
                Some(Uri::from(rel_uri)),
            ) {
                skipped += 1;
            }
        }

        if skipped > 0 {
            debug!(skipped, "dropped relationships with missing parts or endpoints");
        }

        graph
    }

    /// Insert a node.
    ///
    /// Inserting an identifier that already exists is a no-op returning the
    /// existing arena index.
    pub fn add_node(&mut self, node: GraphNode) -> usize {
        if let Some(&i) = self.index.get(&node.uri) {
            return i;
        }
        let i = self.nodes.len();
        self.index.insert(node.uri.clone(), i);
        self.nodes.push(node);
        self.adjacency.push(BTreeSet::new());
        self.rev_adjacency.push(BTreeSet::new());
        self.in_degree.push(0);
        self.out_degree.push(0);
        i
    }

    /// Insert an edge between two existing nodes.
    ///
    /// Returns `false` (dropping the edge) when either endpoint is absent.
    /// When the graph is undirected the reverse direction is also inserted
    /// into the adjacency structure.
    pub fn add_edge(
        &mut self,
        source: &Uri,
        target: &Uri,
        weight: f64,
        relationship: Option<Uri>,
    ) -> bool {
        let (Some(&s), Some(&t)) = (self.index.get(source), self.index.get(target)) else {
            return false;
        };

        let mut edge = GraphEdge::new(s, t).with_weight(weight);
        if let Some(rel) = relationship {
            edge = edge.with_relationship(rel);
        }
        self.edges.push(edge);

        self.adjacency[s].insert(t);
        self.rev_adjacency[t].insert(s);
        if self.undirected {
            self.adjacency[t].insert(s);
            self.rev_adjacency[s].insert(t);
        }
        self.out_degree[s] += 1;
        self.in_degree[t] += 1;

        // Parallel relationships between the same pair keep the strongest weight.
        let slot = self.weights.entry((s, t)).or_insert(weight);
        if weight > *slot {
            *slot = weight;
        }
        true
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_undirected(&self) -> bool {
        self.undirected
    }

    pub fn contains(&self, uri: &Uri) -> bool {
        self.index.contains_key(uri)
    }

    /// Arena index for a node identifier
    pub fn node_index(&self, uri: &Uri) -> Option<usize> {
        self.index.get(uri).copied()
    }

    /// Node at an arena index
    pub fn node(&self, index: usize) -> &GraphNode {
        &self.nodes[index]
    }

    /// All nodes in arena order
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter()
    }

    /// All edges in insertion order
    pub fn edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter()
    }

    /// Neighbour identifiers of a node; empty on unknown identifiers.
    pub fn neighbours<'a>(&'a self, uri: &Uri) -> impl Iterator<Item = &'a Uri> + 'a {
        let indices = self
            .index
            .get(uri)
            .map(|&i| &self.adjacency[i])
            .into_iter()
            .flatten();
        indices.map(move |&i| &self.nodes[i].uri)
    }

    /// Neighbour indices as built (forward, plus mirror when undirected)
    pub fn neighbour_indices(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.adjacency[index].iter().copied()
    }

    /// Neighbour indices of the mirrored adjacency (union of both
    /// directions), used by structural analytics and symmetric walks.
    pub fn symmetric_neighbours(&self, index: usize) -> BTreeSet<usize> {
        self.adjacency[index]
            .union(&self.rev_adjacency[index])
            .copied()
            .collect()
    }

    /// Weight of the edge `(u,v)` or `(v,u)` if present, else 1.0.
    pub fn edge_weight(&self, u: &Uri, v: &Uri) -> f64 {
        match (self.index.get(u), self.index.get(v)) {
            (Some(&ui), Some(&vi)) => self.edge_weight_between(ui, vi),
            _ => 1.0,
        }
    }

    /// Index variant of [`Graph::edge_weight`].
    pub fn edge_weight_between(&self, u: usize, v: usize) -> f64 {
        self.weights
            .get(&(u, v))
            .or_else(|| self.weights.get(&(v, u)))
            .copied()
            .unwrap_or(1.0)
    }

    /// Degree in the adjacency structure as built
    pub fn degree(&self, index: usize) -> usize {
        self.adjacency[index].len()
    }

    pub fn in_degree(&self, index: usize) -> usize {
        self.in_degree[index]
    }

    pub fn out_degree(&self, index: usize) -> usize {
        self.out_degree[index]
    }

    /// Sum of all edge weights
    pub fn total_edge_weight(&self) -> f64 {
        self.edges.iter().map(|e| e.weight).sum()
    }

    /// Induced subgraph over the given arena indices.
    ///
    /// Node URIs and kinds are preserved; edges survive only when both
    /// endpoints are members.
    pub fn subgraph(&self, members: &[usize]) -> Graph {
        let member_set: BTreeSet<usize> = members.iter().copied().collect();
        let mut sub = Graph::new(self.undirected);
        for &i in &member_set {
            sub.add_node(self.nodes[i].clone());
        }
        for edge in &self.edges {
            if member_set.contains(&edge.source) && member_set.contains(&edge.target) {
                sub.add_edge(
                    &self.nodes[edge.source].uri,
                    &self.nodes[edge.target].uri,
                    edge.weight,
                    edge.relationship.clone(),
                );
            }
        }
        sub
    }
}

#[derive(Default)]
struct RelationshipParts<'a> {
    source: Option<&'a str>,
    target: Option<&'a str>,
    weight: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity_type(uri: &str) -> Triple {
        Triple::new(uri, vocab::RDF_TYPE, "http://purl.org/stuff/ragno/Entity")
    }

    fn relationship(rel: &str, src: &str, tgt: &str) -> Vec<Triple> {
        vec![
            Triple::new(rel, vocab::HAS_SOURCE_ENTITY, src),
            Triple::new(rel, vocab::HAS_TARGET_ENTITY, tgt),
        ]
    }

    #[test]
    fn build_collects_nodes_then_edges() {
        let mut triples = vec![entity_type("e:a"), entity_type("e:b")];
        triples.extend(relationship("r:1", "e:a", "e:b"));
        triples.push(Triple::new("r:1", vocab::HAS_WEIGHT, "0.5"));

        let graph = Graph::build(&triples, false);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.edge_weight(&"e:a".into(), &"e:b".into()), 0.5);
    }

    #[test]
    fn duplicate_node_insert_is_noop() {
        let mut graph = Graph::new(false);
        let first = graph.add_node(GraphNode::new("e:a", NodeKind::Entity));
        let second = graph.add_node(GraphNode::new("e:a", NodeKind::Entity));
        assert_eq!(first, second);
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn edges_with_missing_endpoints_are_dropped() {
        let mut triples = vec![entity_type("e:a")];
        triples.extend(relationship("r:1", "e:a", "e:ghost"));

        let graph = Graph::build(&triples, false);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn non_numeric_weight_defaults_to_one() {
        let mut triples = vec![entity_type("e:a"), entity_type("e:b")];
        triples.extend(relationship("r:1", "e:a", "e:b"));
        triples.push(Triple::new("r:1", vocab::HAS_WEIGHT, "heavy"));

        let graph = Graph::build(&triples, false);
        assert_eq!(graph.edge_weight(&"e:a".into(), &"e:b".into()), 1.0);
    }

    #[test]
    fn undirected_build_mirrors_adjacency() {
        let mut triples = vec![entity_type("e:a"), entity_type("e:b")];
        triples.extend(relationship("r:1", "e:a", "e:b"));

        let directed = Graph::build(&triples, false);
        let undirected = Graph::build(&triples, true);

        let b: Uri = "e:b".into();
        assert_eq!(directed.neighbours(&b).count(), 0);
        assert_eq!(undirected.neighbours(&b).count(), 1);
    }

    #[test]
    fn neighbours_of_unknown_node_is_empty() {
        let graph = Graph::build(&[entity_type("e:a")], false);
        assert_eq!(graph.neighbours(&"e:ghost".into()).count(), 0);
    }

    #[test]
    fn edge_weight_checks_both_directions_then_defaults() {
        let mut triples = vec![entity_type("e:a"), entity_type("e:b"), entity_type("e:c")];
        triples.extend(relationship("r:1", "e:a", "e:b"));
        triples.push(Triple::new("r:1", vocab::HAS_WEIGHT, "2.5"));

        let graph = Graph::build(&triples, false);
        assert_eq!(graph.edge_weight(&"e:b".into(), &"e:a".into()), 2.5);
        assert_eq!(graph.edge_weight(&"e:a".into(), &"e:c".into()), 1.0);
    }

    #[test]
    fn content_and_summary_attach_to_existing_nodes() {
        let triples = vec![
            entity_type("e:a"),
            Triple::new("e:a", vocab::HAS_CONTENT, "alpha text"),
            Triple::new("e:ghost", vocab::HAS_CONTENT, "orphan"),
        ];
        let graph = Graph::build(&triples, false);
        let i = graph.node_index(&"e:a".into()).unwrap();
        assert_eq!(graph.node(i).content.as_deref(), Some("alpha text"));
    }

    #[test]
    fn subgraph_keeps_internal_edges_only() {
        let mut triples = vec![entity_type("e:a"), entity_type("e:b"), entity_type("e:c")];
        triples.extend(relationship("r:1", "e:a", "e:b"));
        triples.extend(relationship("r:2", "e:b", "e:c"));

        let graph = Graph::build(&triples, false);
        let a = graph.node_index(&"e:a".into()).unwrap();
        let b = graph.node_index(&"e:b".into()).unwrap();

        let sub = graph.subgraph(&[a, b]);
        assert_eq!(sub.node_count(), 2);
        assert_eq!(sub.edge_count(), 1);
    }

    #[test]
    fn mixed_kind_nodes_are_collected() {
        let triples = vec![
            entity_type("e:a"),
            Triple::new("u:1", vocab::RDF_TYPE, "http://purl.org/stuff/ragno/Unit"),
            Triple::new("x:1", vocab::RDF_TYPE, "http://example.org/Other"),
        ];
        let graph = Graph::build(&triples, false);
        assert_eq!(graph.node_count(), 2);
        let u = graph.node_index(&"u:1".into()).unwrap();
        assert_eq!(graph.node(u).kind, NodeKind::Unit);
    }
}
