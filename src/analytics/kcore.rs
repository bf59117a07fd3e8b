//! K-core decomposition by iterative peeling

use crate::cancel::CancelToken;
use crate::error::EngineResult;
use crate::graph::{Graph, Uri};
use std::collections::HashMap;

/// Result of a k-core decomposition
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct KCoreResult {
    /// Core number per node
    pub core_numbers: HashMap<Uri, usize>,
    /// Largest core number in the graph
    pub max_core: usize,
}

impl KCoreResult {
    /// Nodes whose core number is at least `k` (the k-core membership).
    pub fn core_members(&self, k: usize) -> Vec<&Uri> {
        let mut members: Vec<&Uri> = self
            .core_numbers
            .iter()
            .filter(|(_, &c)| c >= k)
            .map(|(uri, _)| uri)
            .collect();
        members.sort();
        members
    }
}

/// Decompose a graph into k-cores.
///
/// Iterative peeling over the mirrored adjacency: at each round the minimum
/// remaining degree raises the current k, and every node at or below k is
/// removed with that core number, decrementing its surviving neighbours.
/// Empty graphs yield an empty result. The token is checked between rounds.
pub fn kcore_decomposition(graph: &Graph, cancel: &CancelToken) -> EngineResult<KCoreResult> {
    let n = graph.node_count();
    if n == 0 {
        return Ok(KCoreResult::default());
    }

    let adjacency: Vec<Vec<usize>> = (0..n)
        .map(|i| graph.symmetric_neighbours(i).into_iter().collect())
        .collect();
    let mut degree: Vec<usize> = adjacency.iter().map(|a| a.len()).collect();
    let mut removed = vec![false; n];
    let mut core = vec![0usize; n];
    let mut remaining = n;
    let mut k = 0usize;

    while remaining > 0 {
        cancel.checkpoint()?;

        let min_degree = (0..n)
            .filter(|&i| !removed[i])
            .map(|i| degree[i])
            .min()
            .unwrap_or(0);
        if min_degree > k {
            k = min_degree;
        }

        // Peel everything at or below k, cascading in index order.
        let mut queue: Vec<usize> = (0..n)
            .filter(|&i| !removed[i] && degree[i] <= k)
            .collect();
        while let Some(i) = queue.pop() {
            if removed[i] {
                continue;
            }
            removed[i] = true;
            core[i] = k;
            remaining -= 1;
            for &j in &adjacency[i] {
                if !removed[j] {
                    degree[j] = degree[j].saturating_sub(1);
                    if degree[j] <= k {
                        queue.push(j);
                    }
                }
            }
        }
    }

    let core_numbers: HashMap<Uri, usize> = core
        .iter()
        .enumerate()
        .map(|(i, &c)| (graph.node(i).uri.clone(), c))
        .collect();
    let max_core = core.iter().copied().max().unwrap_or(0);

    Ok(KCoreResult {
        core_numbers,
        max_core,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphNode, NodeKind};

    fn entity_graph(nodes: &[&str], edges: &[(&str, &str)]) -> Graph {
        let mut graph = Graph::new(false);
        for uri in nodes {
            graph.add_node(GraphNode::new(*uri, NodeKind::Entity));
        }
        for (s, t) in edges {
            graph.add_edge(&Uri::from(*s), &Uri::from(*t), 1.0, None);
        }
        graph
    }

    #[test]
    fn complete_graph_on_four_nodes() {
        let graph = entity_graph(
            &["a", "b", "c", "d"],
            &[("a", "b"), ("a", "c"), ("a", "d"), ("b", "c"), ("b", "d"), ("c", "d")],
        );
        let result = kcore_decomposition(&graph, &CancelToken::new()).unwrap();
        assert_eq!(result.max_core, 3);
        for uri in ["a", "b", "c", "d"] {
            assert_eq!(result.core_numbers[&Uri::from(uri)], 3);
        }
    }

    #[test]
    fn removing_one_edge_drops_two_nodes_to_core_two() {
        // K4 minus the (c,d) edge: a and b keep degree 3, c and d fall to 2
        let graph = entity_graph(
            &["a", "b", "c", "d"],
            &[("a", "b"), ("a", "c"), ("a", "d"), ("b", "c"), ("b", "d")],
        );
        let result = kcore_decomposition(&graph, &CancelToken::new()).unwrap();
        assert_eq!(result.core_numbers[&Uri::from("a")], 2);
        assert_eq!(result.core_numbers[&Uri::from("b")], 2);
        assert_eq!(result.core_numbers[&Uri::from("c")], 2);
        assert_eq!(result.core_numbers[&Uri::from("d")], 2);
        assert_eq!(result.max_core, 2);
    }

    #[test]
    fn core_membership_has_min_degree_k() {
        // Triangle with a pendant node: triangle is the 2-core
        let graph = entity_graph(
            &["a", "b", "c", "tail"],
            &[("a", "b"), ("b", "c"), ("c", "a"), ("a", "tail")],
        );
        let result = kcore_decomposition(&graph, &CancelToken::new()).unwrap();
        let members = result.core_members(2);
        assert_eq!(members.len(), 3);
        assert!(!members.contains(&&Uri::from("tail")));
        // Every member must have >= 2 neighbours inside the member set
        for uri in &members {
            let inside = graph
                .neighbours(uri)
                .filter(|n| members.contains(&n))
                .count();
            assert!(inside >= 2);
        }
    }

    #[test]
    fn single_node_gets_core_zero() {
        let graph = entity_graph(&["lonely"], &[]);
        let result = kcore_decomposition(&graph, &CancelToken::new()).unwrap();
        assert_eq!(result.core_numbers[&Uri::from("lonely")], 0);
        assert_eq!(result.max_core, 0);
    }

    #[test]
    fn empty_graph_yields_empty_result() {
        let graph = Graph::new(false);
        let result = kcore_decomposition(&graph, &CancelToken::new()).unwrap();
        assert!(result.core_numbers.is_empty());
        assert_eq!(result.max_core, 0);
    }

    #[test]
    fn cancellation_aborts_between_rounds() {
        let graph = entity_graph(&["a", "b"], &[("a", "b")]);
        let token = CancelToken::new();
        token.cancel();
        assert!(kcore_decomposition(&graph, &token).is_err());
    }
}
