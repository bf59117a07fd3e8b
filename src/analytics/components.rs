//! Connected components via iterative DFS

use crate::graph::{Graph, Uri};
use std::collections::HashMap;

/// Result of a connected-components run
///
/// Components are sorted by size, largest first, and numbered in that
/// order, so component 0 is always the largest.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ComponentsResult {
    /// Component id per node
    pub component_of: HashMap<Uri, usize>,
    /// Member lists, sorted by size descending
    pub components: Vec<Vec<Uri>>,
}

impl ComponentsResult {
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Members of the largest component; empty for an empty graph.
    pub fn largest(&self) -> &[Uri] {
        self.components.first().map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Find connected components over the mirrored adjacency.
pub fn connected_components(graph: &Graph) -> ComponentsResult {
    let n = graph.node_count();
    let mut visited = vec![false; n];
    let mut components: Vec<Vec<usize>> = Vec::new();

    for start in 0..n {
        if visited[start] {
            continue;
        }
        let mut members = Vec::new();
        let mut stack = vec![start];
        visited[start] = true;
        while let Some(i) = stack.pop() {
            members.push(i);
            for j in graph.symmetric_neighbours(i) {
                if !visited[j] {
                    visited[j] = true;
                    stack.push(j);
                }
            }
        }
        members.sort_unstable();
        components.push(members);
    }

    // Largest first; size ties keep discovery order (stable sort).
    components.sort_by_key(|c| std::cmp::Reverse(c.len()));

    let mut component_of = HashMap::new();
    let mut uri_components = Vec::with_capacity(components.len());
    for (id, members) in components.iter().enumerate() {
        let uris: Vec<Uri> = members.iter().map(|&i| graph.node(i).uri.clone()).collect();
        for uri in &uris {
            component_of.insert(uri.clone(), id);
        }
        uri_components.push(uris);
    }

    ComponentsResult {
        component_of,
        components: uri_components,
    }
}
