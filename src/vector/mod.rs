//! Approximate-nearest-neighbour vector index

mod index;
mod registry;
mod sidecar;

pub use index::{
    IndexStats, VectorHit, VectorIndex, VectorIndexOptions, VectorRecord, VectorSearchOptions,
};
pub use registry::IndexRegistry;
pub use sidecar::{MetadataEntry, Sidecar, SidecarStats, SIDECAR_VERSION};
