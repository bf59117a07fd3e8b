//! Structural analytics over the in-memory graph

mod betweenness;
mod components;
mod kcore;
mod leiden;
mod rng;
mod stats;

pub use betweenness::{betweenness_centrality, BetweennessResult};
pub use components::{connected_components, ComponentsResult};
pub use kcore::{kcore_decomposition, KCoreResult};
pub use leiden::{
    leiden_communities, Community, CommunityResult, CommunityStats, LeidenConfig,
};
pub use rng::Lcg;
pub use stats::{graph_stats, GraphStats};

use crate::cancel::CancelToken;
use crate::error::EngineResult;
use crate::graph::Graph;

/// Combined structural summary, the shape offline exploration consumes
#[derive(Debug, Clone, serde::Serialize)]
pub struct StructuralAnalysis {
    pub stats: GraphStats,
    pub kcore: KCoreResult,
    pub components: ComponentsResult,
    pub betweenness: BetweennessResult,
}

/// Run the full structural suite on one graph.
///
/// Each algorithm honours the cancellation token between rounds; empty
/// graphs produce empty sub-results without failing.
pub fn analyze_structure(graph: &Graph, cancel: &CancelToken) -> EngineResult<StructuralAnalysis> {
    Ok(StructuralAnalysis {
        stats: graph_stats(graph),
        kcore: kcore_decomposition(graph, cancel)?,
        components: connected_components(graph),
        betweenness: betweenness_centrality(graph, cancel)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphNode, NodeKind, Uri};

    #[test]
    fn full_suite_on_small_graph() {
        let mut graph = Graph::new(false);
        for uri in ["a", "b", "c"] {
            graph.add_node(GraphNode::new(uri, NodeKind::Entity));
        }
        graph.add_edge(&Uri::from("a"), &Uri::from("b"), 1.0, None);
        graph.add_edge(&Uri::from("b"), &Uri::from("c"), 1.0, None);

        let analysis = analyze_structure(&graph, &CancelToken::new()).unwrap();
        assert_eq!(analysis.stats.node_count, 3);
        assert_eq!(analysis.components.component_count(), 1);
        assert_eq!(analysis.kcore.max_core, 1);
        assert!(!analysis.betweenness.skipped);
    }

    #[test]
    fn full_suite_on_empty_graph() {
        let analysis = analyze_structure(&Graph::new(false), &CancelToken::new()).unwrap();
        assert_eq!(analysis.stats.node_count, 0);
        assert_eq!(analysis.components.component_count(), 0);
        assert!(analysis.kcore.core_numbers.is_empty());
    }
}
