//! Betweenness centrality (Brandes' algorithm)

use crate::cancel::CancelToken;
use crate::error::EngineResult;
use crate::graph::{Graph, Uri};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Graphs above this node count skip centrality rather than block the run.
const SOFT_NODE_LIMIT: usize = 1000;

/// Result of a betweenness-centrality run
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct BetweennessResult {
    /// Normalised centrality per node; empty when skipped
    pub scores: HashMap<Uri, f64>,
    /// True when the graph exceeded the soft size limit
    pub skipped: bool,
}

impl BetweennessResult {
    /// Top-k nodes by centrality
    pub fn top_k(&self, k: usize) -> Vec<(Uri, f64)> {
        let mut sorted: Vec<_> = self.scores.iter().map(|(u, s)| (u.clone(), *s)).collect();
        sorted.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        sorted.truncate(k);
        sorted
    }
}

/// Compute betweenness centrality over the mirrored adjacency.
///
/// One BFS per source accumulating shortest-path counts, then a reverse
/// dependency pass (Brandes). Scores are normalised for undirected graphs
/// by `2/((n-1)(n-2))` when `n > 2`. Graphs above the soft limit return an
/// empty map with `skipped` set instead of blocking the caller. The token
/// is checked between sources.
pub fn betweenness_centrality(
    graph: &Graph,
    cancel: &CancelToken,
) -> EngineResult<BetweennessResult> {
    let n = graph.node_count();
    if n == 0 {
        return Ok(BetweennessResult::default());
    }
    if n > SOFT_NODE_LIMIT {
        debug!(nodes = n, limit = SOFT_NODE_LIMIT, "betweenness skipped");
        return Ok(BetweennessResult {
            scores: HashMap::new(),
            skipped: true,
        });
    }

    let adjacency: Vec<Vec<usize>> = (0..n)
        .map(|i| graph.symmetric_neighbours(i).into_iter().collect())
        .collect();

    let mut centrality = vec![0.0f64; n];

    for s in 0..n {
        cancel.checkpoint()?;

        // BFS from s: order of settlement, path counts, predecessors
        let mut order: Vec<usize> = Vec::with_capacity(n);
        let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut sigma = vec![0.0f64; n];
        let mut distance = vec![-1i64; n];
        sigma[s] = 1.0;
        distance[s] = 0;

        let mut queue = VecDeque::new();
        queue.push_back(s);
        while let Some(v) = queue.pop_front() {
            order.push(v);
            for &w in &adjacency[v] {
                if distance[w] < 0 {
                    distance[w] = distance[v] + 1;
                    queue.push_back(w);
                }
                if distance[w] == distance[v] + 1 {
                    sigma[w] += sigma[v];
                    predecessors[w].push(v);
                }
            }
        }

        // Accumulate dependencies in reverse settlement order
        let mut delta = vec![0.0f64; n];
        for &w in order.iter().rev() {
            for &v in &predecessors[w] {
                delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
            }
            if w != s {
                centrality[w] += delta[w];
            }
        }
    }

    let scale = if n > 2 {
        2.0 / ((n - 1) as f64 * (n - 2) as f64)
    } else {
        1.0
    };

    let scores = centrality
        .iter()
        .enumerate()
        .map(|(i, &c)| (graph.node(i).uri.clone(), c * scale))
        .collect();

    Ok(BetweennessResult {
        scores,
        skipped: false,
    })
}
