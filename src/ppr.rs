//! Personalized PageRank over entry-point nodes
//!
//! Power iteration with teleportation restricted to the entry points.
//! Walks are symmetric: the transition row for a node spans the mirrored
//! adjacency regardless of how the graph was built.

use crate::cancel::CancelToken;
use crate::error::EngineResult;
use crate::graph::{Graph, NodeKind, Uri};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Options for a PPR run
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PprOptions {
    /// Teleport probability α
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    /// Power-iteration cap
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Stop when the ℓ∞ change drops below this
    #[serde(default = "default_convergence")]
    pub convergence_threshold: f64,
    /// Size of the per-type rankings
    #[serde(default = "default_top_k")]
    pub top_k_per_type: usize,
}

fn default_alpha() -> f64 {
    0.15
}
fn default_max_iterations() -> usize {
    50
}
fn default_convergence() -> f64 {
    1e-6
}
fn default_top_k() -> usize {
    5
}

impl Default for PprOptions {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            max_iterations: default_max_iterations(),
            convergence_threshold: default_convergence(),
            top_k_per_type: default_top_k(),
        }
    }
}

impl PprOptions {
    /// Interactive preset: two iterations, enough to surface the
    /// immediate neighbourhood of the entry points.
    pub fn shallow() -> Self {
        Self {
            max_iterations: 2,
            ..Default::default()
        }
    }

    /// Offline-exploration preset
    pub fn deep() -> Self {
        Self {
            max_iterations: 10,
            ..Default::default()
        }
    }
}

/// A ranked node in a PPR result
#[derive(Debug, Clone, serde::Serialize)]
pub struct PprNode {
    pub uri: Uri,
    pub kind: NodeKind,
    pub score: f64,
}

/// A node whose neighbourhood spans multiple type tags
#[derive(Debug, Clone, serde::Serialize)]
pub struct BridgeNode {
    pub uri: Uri,
    pub kind: NodeKind,
    pub score: f64,
    /// Distinct neighbour tags, sorted
    pub connected_kinds: Vec<NodeKind>,
}

impl BridgeNode {
    /// Number of distinct neighbour tags this node connects
    pub fn bridge_score(&self) -> usize {
        self.connected_kinds.len()
    }
}

/// Result of a PPR run
///
/// Entry points are excluded from every ranking; they are high by
/// construction and carry no signal.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct PprResult {
    /// Normalised score per node (entry points included, sum = 1)
    pub scores: HashMap<Uri, f64>,
    /// Non-entry nodes in decreasing score order
    pub ranked: Vec<PprNode>,
    /// Per-type top-K of the ranked list
    pub per_kind: HashMap<NodeKind, Vec<PprNode>>,
    /// Cross-type bridges among the top 50, most-connective first
    pub cross_type_nodes: Vec<BridgeNode>,
    /// Iterations executed
    pub iterations: usize,
}

/// How many top-ranked nodes are inspected for cross-type bridging
const BRIDGE_CANDIDATES: usize = 50;

/// Run personalized PageRank from a set of entry points.
///
/// Entry points absent from the graph are ignored; an empty valid set
/// returns an empty result immediately. Dangling nodes redistribute
/// uniformly. The token is checked between iterations.
pub fn personalized_pagerank(
    graph: &Graph,
    entry_points: &[Uri],
    options: &PprOptions,
    cancel: &CancelToken,
) -> EngineResult<PprResult> {
    let n = graph.node_count();
    let entries: Vec<usize> = {
        let unique: BTreeSet<usize> = entry_points
            .iter()
            .filter_map(|uri| graph.node_index(uri))
            .collect();
        unique.into_iter().collect()
    };
    if n == 0 || entries.is_empty() {
        return Ok(PprResult::default());
    }

    // Symmetric transition rows with weights looked up in both directions
    let neighbours: Vec<Vec<(usize, f64)>> = (0..n)
        .map(|i| {
            graph
                .symmetric_neighbours(i)
                .into_iter()
                .map(|j| (j, graph.edge_weight_between(i, j)))
                .collect()
        })
        .collect();
    let row_weight: Vec<f64> = neighbours
        .iter()
        .map(|row| row.iter().map(|(_, w)| w).sum())
        .collect();

    let teleport = 1.0 / entries.len() as f64;
    let mut scores = vec![0.0f64; n];
    for &e in &entries {
        scores[e] = teleport;
    }

    let alpha = options.alpha;
    let mut iterations = 0;
    let mut next = vec![0.0f64; n];

    for _ in 0..options.max_iterations {
        cancel.checkpoint()?;
        iterations += 1;

        next.iter_mut().for_each(|x| *x = 0.0);
        let mut dangling = 0.0;
        for i in 0..n {
            if row_weight[i] > 0.0 {
                let share = scores[i] / row_weight[i];
                for &(j, w) in &neighbours[i] {
                    next[j] += share * w;
                }
            } else {
                dangling += scores[i];
            }
        }

        let dangling_share = dangling / n as f64;
        for (i, value) in next.iter_mut().enumerate() {
            let teleported = if entries.binary_search(&i).is_ok() {
                teleport
            } else {
                0.0
            };
            *value = (1.0 - alpha) * (*value + dangling_share) + alpha * teleported;
        }

        let delta = scores
            .iter()
            .zip(next.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f64, f64::max);
        std::mem::swap(&mut scores, &mut next);

        if delta < options.convergence_threshold {
            break;
        }
    }

    // Normalise to a probability vector
    let total: f64 = scores.iter().sum();
    if total > 0.0 {
        scores.iter_mut().for_each(|s| *s /= total);
    }
    debug!(iterations, entry_points = entries.len(), "ppr converged");

    Ok(build_result(graph, &entries, scores, iterations, options))
}

fn build_result(
    graph: &Graph,
    entries: &[usize],
    scores: Vec<f64>,
    iterations: usize,
    options: &PprOptions,
) -> PprResult {
    let entry_set: BTreeSet<usize> = entries.iter().copied().collect();

    let mut ranked: Vec<(usize, f64)> = scores
        .iter()
        .enumerate()
        .filter(|(i, _)| !entry_set.contains(i))
        .map(|(i, &s)| (i, s))
        .collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| graph.node(a.0).uri.cmp(&graph.node(b.0).uri))
    });

    let to_node = |&(i, score): &(usize, f64)| PprNode {
        uri: graph.node(i).uri.clone(),
        kind: graph.node(i).kind,
        score,
    };

    let mut per_kind: HashMap<NodeKind, Vec<PprNode>> = HashMap::new();
    for entry in &ranked {
        let node = to_node(entry);
        let bucket = per_kind.entry(node.kind).or_default();
        if bucket.len() < options.top_k_per_type {
            bucket.push(node);
        }
    }

    // Bridges: top candidates whose neighbourhoods span > 1 tag
    let mut cross_type_nodes: Vec<BridgeNode> = ranked
        .iter()
        .take(BRIDGE_CANDIDATES)
        .filter_map(|&(i, score)| {
            let kinds: BTreeSet<NodeKind> = graph
                .symmetric_neighbours(i)
                .into_iter()
                .map(|j| graph.node(j).kind)
                .collect();
            if kinds.len() > 1 {
                Some(BridgeNode {
                    uri: graph.node(i).uri.clone(),
                    kind: graph.node(i).kind,
                    score,
                    connected_kinds: kinds.into_iter().collect(),
                })
            } else {
                None
            }
        })
        .collect();
    cross_type_nodes.sort_by(|a, b| {
        b.bridge_score()
            .cmp(&a.bridge_score())
            .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| a.uri.cmp(&b.uri))
    });

    PprResult {
        scores: scores
            .into_iter()
            .enumerate()
            .map(|(i, s)| (graph.node(i).uri.clone(), s))
            .collect(),
        ranked: ranked.iter().map(to_node).collect(),
        per_kind,
        cross_type_nodes,
        iterations,
    }
}

/// Combine several PPR runs by averaging per-node scores.
///
/// Weights default to uniform; a weight slice shorter than the run list is
/// padded with 1.0. The combined map is renormalised to sum to 1.
pub fn combine_runs(runs: &[PprResult], weights: Option<&[f64]>) -> HashMap<Uri, f64> {
    let mut combined: HashMap<Uri, f64> = HashMap::new();
    if runs.is_empty() {
        return combined;
    }

    for (idx, run) in runs.iter().enumerate() {
        let weight = weights.and_then(|w| w.get(idx)).copied().unwrap_or(1.0);
        for (uri, score) in &run.scores {
            *combined.entry(uri.clone()).or_insert(0.0) += weight * score;
        }
    }

    let total: f64 = combined.values().sum();
    if total > 0.0 {
        combined.values_mut().for_each(|s| *s /= total);
    }
    combined
}
