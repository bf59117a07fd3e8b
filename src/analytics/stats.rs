//! Aggregate structural statistics for a graph

use crate::graph::{Graph, NodeKind};
use std::collections::HashMap;

/// Structural summary of a graph
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    /// Node counts per primary type tag
    pub kind_counts: HashMap<NodeKind, usize>,
    /// Edges over possible directed pairs
    pub density: f64,
    pub min_degree: usize,
    pub max_degree: usize,
    pub mean_degree: f64,
    /// Nodes with no neighbours in either direction
    pub isolated_count: usize,
    pub total_edge_weight: f64,
}

/// Compute aggregate statistics; empty graphs yield zeroed stats.
pub fn graph_stats(graph: &Graph) -> GraphStats {
    let n = graph.node_count();
    if n == 0 {
        return GraphStats::default();
    }

    let mut kind_counts: HashMap<NodeKind, usize> = HashMap::new();
    for node in graph.nodes() {
        *kind_counts.entry(node.kind).or_insert(0) += 1;
    }

    let degrees: Vec<usize> = (0..n).map(|i| graph.symmetric_neighbours(i).len()).collect();
    let isolated_count = degrees.iter().filter(|&&d| d == 0).count();
    let degree_sum: usize = degrees.iter().sum();

    let density = if n > 1 {
        graph.edge_count() as f64 / (n * (n - 1)) as f64
    } else {
        0.0
    };

    GraphStats {
        node_count: n,
        edge_count: graph.edge_count(),
        kind_counts,
        density,
        min_degree: degrees.iter().copied().min().unwrap_or(0),
        max_degree: degrees.iter().copied().max().unwrap_or(0),
        mean_degree: degree_sum as f64 / n as f64,
        isolated_count,
        total_edge_weight: graph.total_edge_weight(),
    }
}
