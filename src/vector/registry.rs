//! Shared vector indices keyed by path
//!
//! One index per on-disk location, shared by whoever holds the registry.
//! The registry itself is an explicitly-constructed value owned by the
//! application; the engine has no process-global state.

use super::index::{VectorIndex, VectorIndexOptions};
use crate::error::EngineResult;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Registry of open vector indices
#[derive(Debug, Default)]
pub struct IndexRegistry {
    indices: DashMap<PathBuf, Arc<VectorIndex>>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self {
            indices: DashMap::new(),
        }
    }

    /// Open the index at `index_path`, loading it from disk when a sidecar
    /// already exists, creating it fresh otherwise. Subsequent opens of
    /// the same path return the same shared index.
    pub fn open(
        &self,
        index_path: &Path,
        sidecar_path: &Path,
        options: VectorIndexOptions,
    ) -> EngineResult<Arc<VectorIndex>> {
        if let Some(existing) = self.indices.get(index_path) {
            return Ok(existing.clone());
        }

        let index = if sidecar_path.exists() {
            VectorIndex::load(index_path, sidecar_path)?
        } else {
            VectorIndex::new(options)?
        };
        let index = Arc::new(index);
        self.indices.insert(index_path.to_path_buf(), index.clone());
        Ok(index)
    }

    /// Already-open index for a path, if any.
    pub fn get(&self, index_path: &Path) -> Option<Arc<VectorIndex>> {
        self.indices.get(index_path).map(|r| r.clone())
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}
