//! Core graph data structures

mod edge;
mod node;
mod store;

pub use edge::GraphEdge;
pub use node::{GraphNode, NodeKind, Uri, TYPE_NAMESPACE};
pub use store::Graph;
