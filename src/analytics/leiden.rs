//! Leiden community detection with modularity optimisation
//!
//! Outer loop of three phases: seeded local moving, connectivity
//! refinement, and meta-graph aggregation. Refinement is what separates
//! Leiden from Louvain: after local moving, any community whose induced
//! subgraph is disconnected is split, so every reported community is
//! internally connected.

use super::rng::Lcg;
use crate::cancel::CancelToken;
use crate::error::EngineResult;
use crate::graph::{Graph, Uri};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Configuration for a community-detection run
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LeidenConfig {
    /// Outer-loop cap
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Stop when outer-loop modularity improves by less than this
    #[serde(default = "default_convergence")]
    pub convergence_threshold: f64,
    /// Modularity resolution γ
    #[serde(default = "default_resolution")]
    pub resolution: f64,
    /// Communities smaller than this are dropped after detection
    #[serde(default = "default_min_community_size")]
    pub min_community_size: usize,
    /// PRNG seed; identical seeds reproduce assignments exactly
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_max_iterations() -> usize {
    10
}
fn default_convergence() -> f64 {
    1e-6
}
fn default_resolution() -> f64 {
    1.0
}
fn default_min_community_size() -> usize {
    3
}
fn default_seed() -> u64 {
    42
}

impl Default for LeidenConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            convergence_threshold: default_convergence(),
            resolution: default_resolution(),
            min_community_size: default_min_community_size(),
            seed: default_seed(),
        }
    }
}

/// A detected community
#[derive(Debug, Clone, serde::Serialize)]
pub struct Community {
    pub id: usize,
    pub members: Vec<Uri>,
}

/// Per-community edge statistics over the original graph
#[derive(Debug, Clone, serde::Serialize)]
pub struct CommunityStats {
    pub id: usize,
    pub size: usize,
    pub internal_edges: usize,
    pub external_edges: usize,
    pub internal_ratio: f64,
}

/// Result of a community-detection run
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CommunityResult {
    /// Community id per node; nodes in dropped communities are absent
    pub assignments: HashMap<Uri, usize>,
    /// Surviving communities, numbered densely from zero
    pub communities: Vec<Community>,
    pub stats: Vec<CommunityStats>,
    /// Modularity of the partition before small-community filtering
    pub modularity: f64,
    /// Outer iterations executed
    pub iterations: usize,
}

/// Detect communities by Leiden with modularity optimisation.
///
/// Empty graphs return a well-formed empty result. The token is checked
/// between outer iterations.
pub fn leiden_communities(
    graph: &Graph,
    config: &LeidenConfig,
    cancel: &CancelToken,
) -> EngineResult<CommunityResult> {
    if graph.is_empty() {
        return Ok(CommunityResult::default());
    }

    let mut rng = Lcg::new(config.seed);
    let mut work = WorkGraph::from_graph(graph);
    // Original node -> current work-graph node
    let mut node_of: Vec<usize> = (0..graph.node_count()).collect();

    let mut prev_modularity = f64::NEG_INFINITY;
    let mut final_membership: Vec<usize> = (0..graph.node_count()).collect();
    let mut iterations = 0;

    for _ in 0..config.max_iterations {
        cancel.checkpoint()?;
        iterations += 1;

        // Phase 1: local moving over singleton start
        let mut community: Vec<usize> = (0..work.n).collect();
        let improved = local_moving(&work, &mut community, config.resolution, &mut rng);

        // Phase 2: split disconnected communities
        refine_connectivity(&work, &mut community);

        let modularity = work.modularity(&community, config.resolution);
        for (orig, slot) in node_of.iter().enumerate() {
            final_membership[orig] = community[*slot];
        }

        let gain = modularity - prev_modularity;
        if !improved || (prev_modularity.is_finite() && gain < config.convergence_threshold) {
            prev_modularity = prev_modularity.max(modularity);
            break;
        }
        prev_modularity = modularity;

        // Phase 3: aggregate communities into a meta-graph and go again
        let (aggregated, meta_of) = work.aggregate(&community);
        for slot in node_of.iter_mut() {
            *slot = meta_of[community[*slot]];
        }
        work = aggregated;
    }

    if !prev_modularity.is_finite() {
        prev_modularity = 0.0;
    }
    debug!(iterations, modularity = prev_modularity, "community detection finished");
    Ok(finalize(graph, &final_membership, prev_modularity, iterations, config))
}

// ---------------------------------------------------------------------------
// Working representation
// ---------------------------------------------------------------------------

/// Undirected weighted multigraph the algorithm iterates on.
///
/// Aggregation folds intra-community weight into self loops; `strength`
/// counts self loops twice, matching the modularity null model.
struct WorkGraph {
    n: usize,
    adj: Vec<Vec<(usize, f64)>>,
    self_loops: Vec<f64>,
    strength: Vec<f64>,
    total_weight: f64,
}

impl WorkGraph {
    fn from_graph(graph: &Graph) -> Self {
        let n = graph.node_count();
        // Parallel edges between a pair collapse to their strongest weight,
        // matching Graph::edge_weight_between.
        let mut pairs: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        let mut self_loops: Vec<f64> = vec![0.0; n];
        for edge in graph.edges() {
            let (a, b) = if edge.source <= edge.target {
                (edge.source, edge.target)
            } else {
                (edge.target, edge.source)
            };
            if a == b {
                self_loops[a] = self_loops[a].max(edge.weight);
                continue;
            }
            let slot = pairs.entry((a, b)).or_insert(edge.weight);
            if edge.weight > *slot {
                *slot = edge.weight;
            }
        }
        Self::from_parts(n, pairs, self_loops)
    }

    fn from_parts(
        n: usize,
        pairs: BTreeMap<(usize, usize), f64>,
        self_loops: Vec<f64>,
    ) -> Self {
        let mut adj = vec![Vec::new(); n];
        let mut strength = vec![0.0; n];
        let mut total_weight = 0.0;
        for (&(a, b), &w) in &pairs {
            adj[a].push((b, w));
            adj[b].push((a, w));
            strength[a] += w;
            strength[b] += w;
            total_weight += w;
        }
        for (i, &w) in self_loops.iter().enumerate() {
            strength[i] += 2.0 * w;
            total_weight += w;
        }
        Self {
            n,
            adj,
            self_loops,
            strength,
            total_weight,
        }
    }

    /// Newman modularity `Q = Σ_c (e_c/m − γ(d_c/2m)²)`
    fn modularity(&self, community: &[usize], resolution: f64) -> f64 {
        let m = self.total_weight;
        if m <= 0.0 {
            return 0.0;
        }
        let ncomm = community.iter().copied().max().map_or(0, |c| c + 1);
        let mut internal = vec![0.0; ncomm];
        let mut degree = vec![0.0; ncomm];
        for v in 0..self.n {
            let c = community[v];
            degree[c] += self.strength[v];
            internal[c] += self.self_loops[v];
            for &(u, w) in &self.adj[v] {
                if u > v && community[u] == c {
                    internal[c] += w;
                }
            }
        }
        (0..ncomm)
            .map(|c| internal[c] / m - resolution * (degree[c] / (2.0 * m)).powi(2))
            .sum()
    }

    /// Collapse communities into meta-nodes, aggregating edge weight.
    /// Returns the meta-graph and the dense community-id → meta-node map.
    fn aggregate(&self, community: &[usize]) -> (WorkGraph, Vec<usize>) {
        let max_id = community.iter().copied().max().map_or(0, |c| c + 1);
        let mut meta_of = vec![usize::MAX; max_id];
        let mut next = 0;
        for &c in community {
            if meta_of[c] == usize::MAX {
                meta_of[c] = next;
                next += 1;
            }
        }

        let mut pairs: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        let mut self_loops = vec![0.0; next];
        for v in 0..self.n {
            let mv = meta_of[community[v]];
            self_loops[mv] += self.self_loops[v];
            for &(u, w) in &self.adj[v] {
                if u <= v {
                    continue;
                }
                let mu = meta_of[community[u]];
                if mu == mv {
                    self_loops[mv] += w;
                } else {
                    let (a, b) = if mv < mu { (mv, mu) } else { (mu, mv) };
                    *pairs.entry((a, b)).or_insert(0.0) += w;
                }
            }
        }

        (WorkGraph::from_parts(next, pairs, self_loops), meta_of)
    }
}

/// Inner pass cap for local moving
const MAX_LOCAL_PASSES: usize = 50;

/// Phase 1: greedy modularity-gain moves in seeded pseudo-random order.
/// Returns true when at least one node changed community.
fn local_moving(
    work: &WorkGraph,
    community: &mut [usize],
    resolution: f64,
    rng: &mut Lcg,
) -> bool {
    let m = work.total_weight;
    if m <= 0.0 {
        return false;
    }

    let mut comm_strength = vec![0.0; work.n];
    for v in 0..work.n {
        comm_strength[community[v]] += work.strength[v];
    }

    let mut improved = false;
    for _ in 0..MAX_LOCAL_PASSES {
        let mut order: Vec<usize> = (0..work.n).collect();
        rng.shuffle(&mut order);

        let mut moved = false;
        for &v in &order {
            // Weight from v into each neighbouring community; BTreeMap
            // iteration keeps tie-breaking deterministic.
            let mut to_comm: BTreeMap<usize, f64> = BTreeMap::new();
            for &(u, w) in &work.adj[v] {
                *to_comm.entry(community[u]).or_insert(0.0) += w;
            }

            let current = community[v];
            comm_strength[current] -= work.strength[v];

            let gain_of = |c: usize, link: f64, strengths: &[f64]| {
                link / m
                    - resolution * work.strength[v] * strengths[c] / (2.0 * m * m)
            };

            let mut best = current;
            let mut best_gain = gain_of(
                current,
                to_comm.get(&current).copied().unwrap_or(0.0),
                &comm_strength,
            );
            for (&c, &link) in &to_comm {
                if c == current {
                    continue;
                }
                let gain = gain_of(c, link, &comm_strength);
                if gain > best_gain {
                    best = c;
                    best_gain = gain;
                }
            }

            comm_strength[best] += work.strength[v];
            community[v] = best;
            if best != current {
                moved = true;
                improved = true;
            }
        }

        if !moved {
            break;
        }
    }
    improved
}

/// Phase 2: every community must be internally connected; components past
/// the first are moved to fresh community ids.
fn refine_connectivity(work: &WorkGraph, community: &mut [usize]) {
    let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for v in 0..work.n {
        members.entry(community[v]).or_default().push(v);
    }

    let mut next_id = community.iter().copied().max().map_or(0, |c| c + 1);
    for (_, nodes) in members {
        if nodes.len() < 2 {
            continue;
        }
        let parts = intra_components(work, &nodes, community);
        for extra in parts.into_iter().skip(1) {
            for v in extra {
                community[v] = next_id;
            }
            next_id += 1;
        }
    }
}

/// Connected components of a community's induced subgraph, in discovery
/// order starting from the lowest-numbered member.
fn intra_components(work: &WorkGraph, nodes: &[usize], community: &[usize]) -> Vec<Vec<usize>> {
    let cid = community[nodes[0]];
    let member: std::collections::HashSet<usize> = nodes.iter().copied().collect();
    let mut seen: std::collections::HashSet<usize> = std::collections::HashSet::new();
    let mut parts = Vec::new();

    for &start in nodes {
        if seen.contains(&start) {
            continue;
        }
        let mut stack = vec![start];
        let mut part = Vec::new();
        seen.insert(start);
        while let Some(v) = stack.pop() {
            part.push(v);
            for &(u, _) in &work.adj[v] {
                if community[u] == cid && member.contains(&u) && seen.insert(u) {
                    stack.push(u);
                }
            }
        }
        parts.push(part);
    }
    parts
}

/// Post-processing: drop undersized communities, renumber densely, and
/// compute per-community edge stats over the original graph.
fn finalize(
    graph: &Graph,
    membership: &[usize],
    modularity: f64,
    iterations: usize,
    config: &LeidenConfig,
) -> CommunityResult {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (node, &c) in membership.iter().enumerate() {
        groups.entry(c).or_default().push(node);
    }

    // Survivors ordered by size descending, then smallest member URI.
    let mut survivors: Vec<Vec<usize>> = groups
        .into_values()
        .filter(|g| g.len() >= config.min_community_size)
        .collect();
    survivors.sort_by(|a, b| {
        b.len()
            .cmp(&a.len())
            .then_with(|| graph.node(a[0]).uri.cmp(&graph.node(b[0]).uri))
    });

    let mut assignments = HashMap::new();
    let mut communities = Vec::with_capacity(survivors.len());
    let mut index_of = vec![usize::MAX; graph.node_count()];
    for (id, group) in survivors.iter().enumerate() {
        let mut members: Vec<Uri> = group.iter().map(|&i| graph.node(i).uri.clone()).collect();
        members.sort();
        for &i in group {
            index_of[i] = id;
            assignments.insert(graph.node(i).uri.clone(), id);
        }
        communities.push(Community { id, members });
    }

    let mut internal = vec![0usize; communities.len()];
    let mut external = vec![0usize; communities.len()];
    for edge in graph.edges() {
        let (cs, ct) = (index_of[edge.source], index_of[edge.target]);
        match (cs, ct) {
            (usize::MAX, usize::MAX) => {}
            (c, d) if c == d => internal[c] += 1,
            (c, d) => {
                if c != usize::MAX {
                    external[c] += 1;
                }
                if d != usize::MAX {
                    external[d] += 1;
                }
            }
        }
    }

    let stats = communities
        .iter()
        .map(|c| {
            let total = internal[c.id] + external[c.id];
            CommunityStats {
                id: c.id,
                size: c.members.len(),
                internal_edges: internal[c.id],
                external_edges: external[c.id],
                internal_ratio: if total > 0 {
                    internal[c.id] as f64 / total as f64
                } else {
                    0.0
                },
            }
        })
        .collect();

    CommunityResult {
        assignments,
        communities,
        stats,
        modularity,
        iterations,
    }
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

    fn two_triangles() -> Graph {
        entity_graph(
            &["a1", "a2", "a3", "b1", "b2", "b3"],
            &[
                ("a1", "a2"),
                ("a2", "a3"),
                ("a3", "a1"),
                ("b1", "b2"),
                ("b2", "b3"),
                ("b3", "b1"),
            ],
        )
    }

    #[test]
    fn two_disjoint_triangles_form_two_communities() {
        let config = LeidenConfig::default();
        let result = leiden_communities(&two_triangles(), &config, &CancelToken::new()).unwrap();

        assert_eq!(result.communities.len(), 2);
        let mut sizes: Vec<usize> = result.communities.iter().map(|c| c.members.len()).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![3, 3]);
        assert!((result.modularity - 0.5).abs() < 1e-9);

        // Triangle members stay together
        let a1 = result.assignments[&Uri::from("a1")];
        assert_eq!(result.assignments[&Uri::from("a2")], a1);
        assert_eq!(result.assignments[&Uri::from("a3")], a1);
        assert_ne!(result.assignments[&Uri::from("b1")], a1);
    }

    #[test]
    fn same_seed_reproduces_assignments() {
        let config = LeidenConfig {
            seed: 42,
            ..Default::default()
        };
        let graph = two_triangles();
        let first = leiden_communities(&graph, &config, &CancelToken::new()).unwrap();
        let second = leiden_communities(&graph, &config, &CancelToken::new()).unwrap();
        assert_eq!(first.assignments, second.assignments);
        assert_eq!(first.modularity, second.modularity);
    }

    #[test]
    fn communities_are_internally_connected() {
        // Barbell: two triangles joined by one bridge edge
        let mut graph = two_triangles();
        graph.add_edge(&Uri::from("a1"), &Uri::from("b1"), 1.0, None);

        let config = LeidenConfig::default();
        let result = leiden_communities(&graph, &config, &CancelToken::new()).unwrap();
        for community in &result.communities {
            let indices: Vec<usize> = community
                .members
                .iter()
                .map(|u| graph.node_index(u).unwrap())
                .collect();
            let sub = graph.subgraph(&indices);
            let comps = super::super::components::connected_components(&sub);
            assert_eq!(comps.component_count(), 1, "community must be connected");
        }
    }

    #[test]
    fn small_communities_are_dropped() {
        // A triangle plus an isolated pair: pair is below min size 3
        let graph = entity_graph(
            &["a1", "a2", "a3", "p1", "p2"],
            &[("a1", "a2"), ("a2", "a3"), ("a3", "a1"), ("p1", "p2")],
        );
        let result =
            leiden_communities(&graph, &LeidenConfig::default(), &CancelToken::new()).unwrap();
        assert_eq!(result.communities.len(), 1);
        assert!(!result.assignments.contains_key(&Uri::from("p1")));
        assert!(!result.assignments.contains_key(&Uri::from("p2")));
    }

    #[test]
    fn stats_count_internal_and_external_edges() {
        let mut graph = two_triangles();
        graph.add_edge(&Uri::from("a1"), &Uri::from("b1"), 1.0, None);
        let result =
            leiden_communities(&graph, &LeidenConfig::default(), &CancelToken::new()).unwrap();

        for stat in &result.stats {
            assert_eq!(stat.size, 3);
            assert_eq!(stat.internal_edges, 3);
            assert_eq!(stat.external_edges, 1);
            assert!((stat.internal_ratio - 0.75).abs() < 1e-9);
        }
    }

    #[test]
    fn empty_graph_returns_empty_result() {
        let result = leiden_communities(
            &Graph::new(false),
            &LeidenConfig::default(),
            &CancelToken::new(),
        )
        .unwrap();
        assert!(result.communities.is_empty());
        assert_eq!(result.modularity, 0.0);
    }

    #[test]
    fn single_node_is_dropped_below_min_size() {
        let graph = entity_graph(&["only"], &[]);
        let result =
            leiden_communities(&graph, &LeidenConfig::default(), &CancelToken::new()).unwrap();
        assert!(result.communities.is_empty());

        let keep_all = LeidenConfig {
            min_community_size: 1,
            ..Default::default()
        };
        let result = leiden_communities(&graph, &keep_all, &CancelToken::new()).unwrap();
        assert_eq!(result.communities.len(), 1);
        assert_eq!(result.communities[0].members.len(), 1);
    }

    #[test]
    fn cancellation_aborts_between_iterations() {
        let token = CancelToken::new();
        token.cancel();
        let err = leiden_communities(&two_triangles(), &LeidenConfig::default(), &token);
        assert!(err.is_err());
    }
}
