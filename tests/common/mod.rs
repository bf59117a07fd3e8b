//! Shared helpers for integration scenarios
#![allow(dead_code)]

use ragno::graph::{Graph, GraphNode, NodeKind, Uri};
use ragno::rdf::{vocab, Triple};

/// Type declaration triple for an Entity node
pub fn entity(uri: &str) -> Triple {
    Triple::new(uri, vocab::RDF_TYPE, "http://purl.org/stuff/ragno/Entity")
}

/// `rdfs:label` triple
pub fn label(uri: &str, text: &str) -> Triple {
    Triple::new(uri, vocab::RDFS_LABEL, text)
}

/// Reified relationship triples with a weight
pub fn relationship(rel: &str, source: &str, target: &str, weight: f64) -> Vec<Triple> {
    vec![
        Triple::new(rel, vocab::HAS_SOURCE_ENTITY, source),
        Triple::new(rel, vocab::HAS_TARGET_ENTITY, target),
        Triple::new(rel, vocab::HAS_WEIGHT, weight.to_string()),
    ]
}

/// Build a graph holding a clique over `names`, all of one kind.
pub fn add_clique(graph: &mut Graph, names: &[&str], kind: NodeKind) {
    for name in names {
        graph.add_node(GraphNode::new(*name, kind));
    }
    for (i, a) in names.iter().enumerate() {
        for b in &names[i + 1..] {
            graph.add_edge(&Uri::from(*a), &Uri::from(*b), 1.0, None);
        }
    }
}
