//! Persistent HNSW vector index with type-aware filtering
//!
//! Cosine similarity over fixed-length f32 vectors, backed by `hnsw_rs`.
//! Vectors do not need to be pre-normalised; the distance functor handles
//! magnitude. Reads run concurrently; writes take the exclusive side of
//! the locks.
//!
//! # Deletion
//!
//! HNSW does not support removing points from the navigation graph. Remove
//! only drops the record's metadata and side-index entries and tombstones
//! the internal id; searches filter tombstoned ids out of the candidate
//! list. The graph point itself stays until the index is rebuilt.

use super::sidecar::{
    MetadataEntry, Sidecar, SidecarStats, UriIdEntry, VectorEntry, SIDECAR_VERSION,
};
use crate::error::{EngineError, EngineResult};
use crate::graph::{NodeKind, Uri};
use chrono::{DateTime, Utc};
use hnsw_rs::hnswio::HnswIo;
use hnsw_rs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Construction parameters; the dimension is immutable once built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorIndexOptions {
    pub dimension: usize,
    pub max_elements: usize,
    /// Graph connectivity (M)
    pub m: usize,
    /// Build-time candidate list size
    pub ef_construction: usize,
    /// Query-time candidate list size
    pub ef_search: usize,
    /// Recorded for format fidelity; the backend assigns layers internally
    pub seed: u64,
}

impl Default for VectorIndexOptions {
    fn default() -> Self {
        Self {
            dimension: 768,
            max_elements: 10_000,
            m: 16,
            ef_construction: 200,
            ef_search: 100,
            seed: 42,
        }
    }
}

/// A record to insert in a batch
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub uri: Uri,
    pub vector: Vec<f32>,
    pub kind: NodeKind,
    pub content: Option<String>,
}

/// Query-time options
#[derive(Debug, Clone, Default)]
pub struct VectorSearchOptions {
    /// Keep only records with this type tag
    pub kind: Option<NodeKind>,
    /// Keep only hits with at least this similarity
    pub threshold: Option<f32>,
}

/// One search hit, in decreasing similarity order
#[derive(Debug, Clone, Serialize)]
pub struct VectorHit {
    pub uri: Uri,
    pub kind: NodeKind,
    pub content: Option<String>,
    /// `1 − cosine_distance`
    pub similarity: f32,
}

/// Aggregate index statistics
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub total_nodes: usize,
    pub per_kind: HashMap<NodeKind, usize>,
    pub last_index_time: Option<DateTime<Utc>>,
    pub search_count: u64,
    pub avg_search_time_micros: u64,
}

/// Mutable bookkeeping guarded by one writer lock
struct IndexState {
    next_id: usize,
    uri_to_id: HashMap<Uri, usize>,
    id_to_uri: HashMap<usize, Uri>,
    metadata: HashMap<usize, MetadataEntry>,
    kind_index: HashMap<NodeKind, BTreeSet<usize>>,
    vectors: HashMap<usize, Vec<f32>>,
    tombstones: HashSet<usize>,
    last_index_time: Option<DateTime<Utc>>,
}

impl IndexState {
    fn empty() -> Self {
        Self {
            next_id: 0,
            uri_to_id: HashMap::new(),
            id_to_uri: HashMap::new(),
            metadata: HashMap::new(),
            kind_index: HashMap::new(),
            vectors: HashMap::new(),
            tombstones: HashSet::new(),
            last_index_time: None,
        }
    }
}

/// Over-fetch factor applied when a post-filter may discard candidates
const FILTER_FETCH_FACTOR: usize = 4;

/// Persistent approximate-nearest-neighbour index
pub struct VectorIndex {
    options: VectorIndexOptions,
    hnsw: RwLock<Hnsw<'static, f32, DistCosine>>,
    state: RwLock<IndexState>,
    search_count: AtomicU64,
    search_micros: AtomicU64,
}

impl VectorIndex {
    /// Create an empty index with the given options.
    pub fn new(options: VectorIndexOptions) -> EngineResult<Self> {
        if options.dimension == 0 {
            return Err(EngineError::InvalidInput(
                "vector dimension must be non-zero".to_string(),
            ));
        }
        let hnsw = Self::build_hnsw(&options);
        Ok(Self {
            options,
            hnsw: RwLock::new(hnsw),
            state: RwLock::new(IndexState::empty()),
            search_count: AtomicU64::new(0),
            search_micros: AtomicU64::new(0),
        })
    }

    fn build_hnsw(options: &VectorIndexOptions) -> Hnsw<'static, f32, DistCosine> {
        let nb_layer = 16
            .min((options.max_elements as f32).ln().trunc() as usize)
            .max(1);
        Hnsw::new(
            options.m,
            options.max_elements,
            nb_layer,
            options.ef_construction,
            DistCosine,
        )
    }

    pub fn options(&self) -> &VectorIndexOptions {
        &self.options
    }

    /// Number of active (non-tombstoned) records
    pub fn len(&self) -> usize {
        self.read_state().uri_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert one record.
    ///
    /// Inserting a URI that is already present returns the existing
    /// internal id without touching the graph. Ids are monotonic and never
    /// reused, including across removals.
    pub fn add_node(
        &self,
        uri: impl Into<Uri>,
        vector: Vec<f32>,
        kind: NodeKind,
        content: Option<String>,
    ) -> EngineResult<usize> {
        let uri = uri.into();
        if vector.len() != self.options.dimension {
            return Err(EngineError::InvalidInput(format!(
                "dimension mismatch: expected {}, got {}",
                self.options.dimension,
                vector.len()
            )));
        }

        let mut state = self.write_state();
        if let Some(&id) = state.uri_to_id.get(&uri) {
            return Ok(id);
        }
        if state.next_id >= self.options.max_elements {
            return Err(EngineError::InvalidInput(format!(
                "index at capacity ({})",
                self.options.max_elements
            )));
        }

        let id = state.next_id;
        state.next_id += 1;

        {
            let hnsw = self.hnsw.write().unwrap_or_else(|e| e.into_inner());
            hnsw.insert((vector.as_slice(), id));
        }

        state.uri_to_id.insert(uri.clone(), id);
        state.id_to_uri.insert(id, uri);
        state.metadata.insert(
            id,
            MetadataEntry {
                id,
                kind,
                content,
                timestamp: Utc::now(),
            },
        );
        state.kind_index.entry(kind).or_default().insert(id);
        state.vectors.insert(id, vector);
        state.last_index_time = Some(Utc::now());

        Ok(id)
    }

    /// Insert a batch, best-effort.
    ///
    /// Per-record failures are logged and skipped; ids of successful
    /// inserts are returned in input order with the gaps omitted.
    pub fn add_batch(&self, records: Vec<VectorRecord>) -> Vec<usize> {
        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            let uri = record.uri.clone();
            match self.add_node(record.uri, record.vector, record.kind, record.content) {
                Ok(id) => ids.push(id),
                Err(err) => warn!(uri = %uri, %err, "skipping record in batch insert"),
            }
        }
        ids
    }

    /// Approximate nearest neighbours of `query`, best first.
    ///
    /// Searching an empty index returns an empty list. When a type filter
    /// or tombstones can discard candidates the underlying search fetches
    /// extra candidates to keep recall up.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        opts: &VectorSearchOptions,
    ) -> EngineResult<Vec<VectorHit>> {
        if query.len() != self.options.dimension {
            return Err(EngineError::InvalidInput(format!(
                "dimension mismatch: expected {}, got {}",
                self.options.dimension,
                query.len()
            )));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let state = self.read_state();
        if state.uri_to_id.is_empty() {
            return Ok(Vec::new());
        }

        let inserted = state.next_id;
        let fetch = if opts.kind.is_some() || !state.tombstones.is_empty() {
            k.saturating_mul(FILTER_FETCH_FACTOR).min(inserted)
        } else {
            k.min(inserted)
        };
        let ef = self.options.ef_search.max(fetch);

        let neighbours = {
            let hnsw = self.hnsw.read().unwrap_or_else(|e| e.into_inner());
            hnsw.search(query, fetch, ef)
        };

        let mut hits = Vec::with_capacity(k);
        for neighbour in neighbours {
            let id = neighbour.d_id;
            if state.tombstones.contains(&id) {
                continue;
            }
            let Some(meta) = state.metadata.get(&id) else {
                continue;
            };
            if let Some(kind) = opts.kind {
                if meta.kind != kind {
                    continue;
                }
            }
            let similarity = 1.0 - neighbour.distance;
            if let Some(threshold) = opts.threshold {
                if similarity < threshold {
                    continue;
                }
            }
            let Some(uri) = state.id_to_uri.get(&id) else {
                continue;
            };
            hits.push(VectorHit {
                uri: uri.clone(),
                kind: meta.kind,
                content: meta.content.clone(),
                similarity,
            });
            if hits.len() >= k {
                break;
            }
        }
        drop(state);

        // Candidates come back distance-ordered; keep the contract explicit
        // after filtering.
        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.uri.cmp(&b.uri))
        });

        self.search_count.fetch_add(1, Ordering::Relaxed);
        self.search_micros
            .fetch_add(started.elapsed().as_micros() as u64, Ordering::Relaxed);

        Ok(hits)
    }

    /// One filtered search per requested type tag.
    pub fn search_by_kinds(
        &self,
        query: &[f32],
        kinds: &[NodeKind],
        k_per_kind: usize,
    ) -> EngineResult<HashMap<NodeKind, Vec<VectorHit>>> {
        let mut results = HashMap::with_capacity(kinds.len());
        for &kind in kinds {
            let hits = self.search(
                query,
                k_per_kind,
                &VectorSearchOptions {
                    kind: Some(kind),
                    threshold: None,
                },
            )?;
            results.insert(kind, hits);
        }
        Ok(results)
    }

    /// Nearest neighbours of a stored record, excluding the record itself.
    pub fn find_similar(
        &self,
        uri: &Uri,
        k: usize,
        opts: &VectorSearchOptions,
    ) -> EngineResult<Vec<VectorHit>> {
        let vector = {
            let state = self.read_state();
            let id = state
                .uri_to_id
                .get(uri)
                .copied()
                .ok_or_else(|| EngineError::NotFound(uri.to_string()))?;
            state.vectors.get(&id).cloned().ok_or_else(|| {
                EngineError::Internal(format!("record {} has no stored vector", uri))
            })?
        };

        let mut hits = self.search(&vector, k + 1, opts)?;
        hits.retain(|hit| &hit.uri != uri);
        hits.truncate(k);
        Ok(hits)
    }

    /// Tombstone a record.
    ///
    /// Metadata and side-index entries are removed; the HNSW graph point
    /// stays (see module docs) and searches filter it out. Returns whether
    /// the record was present.
    pub fn remove(&self, uri: &Uri) -> bool {
        let mut state = self.write_state();
        let Some(id) = state.uri_to_id.remove(uri) else {
            return false;
        };
        state.id_to_uri.remove(&id);
        state.vectors.remove(&id);
        if let Some(meta) = state.metadata.remove(&id) {
            if let Some(ids) = state.kind_index.get_mut(&meta.kind) {
                ids.remove(&id);
                if ids.is_empty() {
                    state.kind_index.remove(&meta.kind);
                }
            }
        }
        state.tombstones.insert(id);
        debug!(uri = %uri, id, "tombstoned vector record");
        true
    }

    /// Aggregate statistics snapshot.
    pub fn stats(&self) -> IndexStats {
        let state = self.read_state();
        let count = self.search_count.load(Ordering::Relaxed);
        let micros = self.search_micros.load(Ordering::Relaxed);
        IndexStats {
            total_nodes: state.uri_to_id.len(),
            per_kind: state
                .kind_index
                .iter()
                .map(|(&kind, ids)| (kind, ids.len()))
                .collect(),
            last_index_time: state.last_index_time,
            search_count: count,
            avg_search_time_micros: if count > 0 { micros / count } else { 0 },
        }
    }

    /// Persist the index: native binary dump plus the JSON sidecar.
    ///
    /// The dump derives its directory and basename from `index_path`; the
    /// library writes `<basename>.hnsw.graph` and `<basename>.hnsw.data`
    /// next to it.
    pub fn save(&self, index_path: &Path, sidecar_path: &Path) -> EngineResult<()> {
        let (dir, basename) = split_index_path(index_path)?;

        {
            let hnsw = self.hnsw.read().unwrap_or_else(|e| e.into_inner());
            hnsw.file_dump(&dir, &basename)
                .map_err(|e| EngineError::Internal(format!("hnsw dump failed: {}", e)))?;
        }

        let sidecar = self.to_sidecar();
        let file = File::create(sidecar_path)
            .map_err(|e| EngineError::Internal(format!("sidecar create failed: {}", e)))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &sidecar)
            .map_err(|e| EngineError::Internal(format!("sidecar write failed: {}", e)))?;

        info!(
            path = %index_path.display(),
            nodes = sidecar.stats.total_nodes,
            "vector index saved"
        );
        Ok(())
    }

    /// Load an index persisted by [`VectorIndex::save`].
    ///
    /// The graph file is reloaded by the library (corruption surfaces
    /// there); the sidecar is then cross-checked against it. Version or
    /// point-count disagreement is an `IndexCorrupt` error.
    pub fn load(index_path: &Path, sidecar_path: &Path) -> EngineResult<Self> {
        let file = File::open(sidecar_path)
            .map_err(|e| EngineError::IndexCorrupt(format!("sidecar open failed: {}", e)))?;
        let sidecar: Sidecar = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| EngineError::IndexCorrupt(format!("sidecar parse failed: {}", e)))?;

        if sidecar.version != SIDECAR_VERSION {
            return Err(EngineError::IndexCorrupt(format!(
                "sidecar version {} != supported {}",
                sidecar.version, SIDECAR_VERSION
            )));
        }
        for entry in &sidecar.vectors {
            if entry.values.len() != sidecar.options.dimension {
                return Err(EngineError::IndexCorrupt(format!(
                    "vector {} has length {}, index dimension is {}",
                    entry.id,
                    entry.values.len(),
                    sidecar.options.dimension
                )));
            }
        }

        let (dir, basename) = split_index_path(index_path)?;
        // The loader owns buffers the reloaded graph borrows from; leak it
        // so the graph can carry the index's 'static lifetime. One small
        // allocation per load.
        let loader: &'static mut HnswIo = Box::leak(Box::new(HnswIo::new(&dir, &basename)));
        let hnsw: Hnsw<'static, f32, DistCosine> = loader
            .load_hnsw()
            .map_err(|e| EngineError::IndexCorrupt(format!("hnsw reload failed: {}", e)))?;

        if hnsw.get_nb_point() != sidecar.next_internal_id {
            return Err(EngineError::IndexCorrupt(format!(
                "graph holds {} points, sidecar expects {}",
                hnsw.get_nb_point(),
                sidecar.next_internal_id
            )));
        }

        let index = Self {
            options: sidecar.options.clone(),
            hnsw: RwLock::new(hnsw),
            state: RwLock::new(Self::state_from_sidecar(&sidecar)),
            search_count: AtomicU64::new(sidecar.stats.search_count),
            search_micros: AtomicU64::new(
                sidecar.stats.search_count * sidecar.stats.avg_search_time_micros,
            ),
        };
        info!(
            path = %index_path.display(),
            nodes = sidecar.stats.total_nodes,
            "vector index loaded"
        );
        Ok(index)
    }

    fn to_sidecar(&self) -> Sidecar {
        let state = self.read_state();
        let stats = {
            let count = self.search_count.load(Ordering::Relaxed);
            let micros = self.search_micros.load(Ordering::Relaxed);
            SidecarStats {
                total_nodes: state.uri_to_id.len(),
                per_type: state
                    .kind_index
                    .iter()
                    .map(|(&kind, ids)| (kind, ids.len()))
                    .collect(),
                last_index_time: state.last_index_time,
                search_count: count,
                avg_search_time_micros: if count > 0 { micros / count } else { 0 },
            }
        };

        let mut uri_to_id: Vec<UriIdEntry> = state
            .uri_to_id
            .iter()
            .map(|(uri, &id)| UriIdEntry {
                uri: uri.clone(),
                id,
            })
            .collect();
        uri_to_id.sort_by_key(|e| e.id);

        let mut metadata: Vec<MetadataEntry> = state.metadata.values().cloned().collect();
        metadata.sort_by_key(|e| e.id);

        let mut vectors: Vec<VectorEntry> = state
            .vectors
            .iter()
            .map(|(&id, values)| VectorEntry {
                id,
                values: values.clone(),
            })
            .collect();
        vectors.sort_by_key(|e| e.id);

        let mut tombstones: Vec<usize> = state.tombstones.iter().copied().collect();
        tombstones.sort_unstable();

        Sidecar {
            version: SIDECAR_VERSION,
            options: self.options.clone(),
            next_internal_id: state.next_id,
            uri_to_id,
            metadata,
            type_index: state
                .kind_index
                .iter()
                .map(|(&kind, ids)| (kind, ids.iter().copied().collect()))
                .collect(),
            tombstones,
            vectors,
            stats,
        }
    }

    fn state_from_sidecar(sidecar: &Sidecar) -> IndexState {
        let mut state = IndexState::empty();
        state.next_id = sidecar.next_internal_id;
        for entry in &sidecar.uri_to_id {
            state.uri_to_id.insert(entry.uri.clone(), entry.id);
            state.id_to_uri.insert(entry.id, entry.uri.clone());
        }
        for meta in &sidecar.metadata {
            state.metadata.insert(meta.id, meta.clone());
        }
        for (&kind, ids) in &sidecar.type_index {
            state
                .kind_index
                .insert(kind, ids.iter().copied().collect());
        }
        for entry in &sidecar.vectors {
            state.vectors.insert(entry.id, entry.values.clone());
        }
        state.tombstones = sidecar.tombstones.iter().copied().collect();
        state.last_index_time = sidecar.stats.last_index_time;
        state
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, IndexState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, IndexState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("options", &self.options)
            .field("len", &self.len())
            .finish()
    }
}

/// Derive the dump directory and basename from the index path.
fn split_index_path(index_path: &Path) -> EngineResult<(std::path::PathBuf, String)> {
    let dir = index_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| std::path::PathBuf::from("."));
    let basename = index_path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| {
            EngineError::InvalidInput(format!("bad index path: {}", index_path.display()))
        })?;
    Ok((dir, basename.to_string()))
}
