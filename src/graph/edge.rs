//! Edge representation in the retrieval graph

use super::node::Uri;
use serde::{Deserialize, Serialize};

/// A graph edge between two arena slots
///
/// Endpoints are arena indices into the owning [`super::Graph`], not URIs;
/// adjacency stays pointer-free and iteration stays cache-friendly.
/// The RDF pattern reifies relationships as nodes, so an edge may carry a
/// reference back to the relationship node it was built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Arena index of the source node
    pub source: usize,
    /// Arena index of the target node
    pub target: usize,
    /// Non-negative weight (1.0 when the relationship carries none)
    pub weight: f64,
    /// URI of the reified relationship node, when known
    pub relationship: Option<Uri>,
}

impl GraphEdge {
    /// Create a new edge with the default weight
    pub fn new(source: usize, target: usize) -> Self {
        Self {
            source,
            target,
            weight: 1.0,
            relationship: None,
        }
    }

    /// Set the edge weight
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Set the reified relationship node
    pub fn with_relationship(mut self, relationship: impl Into<Uri>) -> Self {
        self.relationship = Some(relationship.into());
        self
    }
}
