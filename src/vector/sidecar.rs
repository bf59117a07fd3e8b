//! Sidecar document persisted next to the native HNSW dump
//!
//! The HNSW graph itself is persisted by the library in its native binary
//! layout and treated as opaque; everything the index needs to interpret
//! the graph (id mapping, type index, tombstones, counters, options) lives
//! in this JSON sidecar. The `vectors` table is carried too: the native
//! dump has no public per-id vector getter, and `find_similar` needs the
//! stored vector after a reload.

use super::index::VectorIndexOptions;
use crate::graph::{NodeKind, Uri};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sidecar format version; a mismatch on load is an `IndexCorrupt` error.
pub const SIDECAR_VERSION: u32 = 1;

/// One uri ↔ internal-id pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UriIdEntry {
    pub uri: Uri,
    pub id: usize,
}

/// Per-record metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataEntry {
    pub id: usize,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Stored vector values for one internal id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorEntry {
    pub id: usize,
    pub values: Vec<f32>,
}

/// Aggregate counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidecarStats {
    pub total_nodes: usize,
    pub per_type: HashMap<NodeKind, usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_index_time: Option<DateTime<Utc>>,
    pub search_count: u64,
    pub avg_search_time_micros: u64,
}

/// The full sidecar document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sidecar {
    pub version: u32,
    pub options: VectorIndexOptions,
    pub next_internal_id: usize,
    pub uri_to_id: Vec<UriIdEntry>,
    pub metadata: Vec<MetadataEntry>,
    pub type_index: HashMap<NodeKind, Vec<usize>>,
    #[serde(default)]
    pub tombstones: Vec<usize>,
    pub vectors: Vec<VectorEntry>,
    pub stats: SidecarStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names_are_camel_case() {
        let sidecar = Sidecar {
            version: SIDECAR_VERSION,
            options: VectorIndexOptions::default(),
            next_internal_id: 2,
            uri_to_id: vec![UriIdEntry {
                uri: "e:a".into(),
                id: 0,
            }],
            metadata: vec![MetadataEntry {
                id: 0,
                kind: NodeKind::Entity,
                content: None,
                timestamp: Utc::now(),
            }],
            type_index: HashMap::from([(NodeKind::Entity, vec![0])]),
            tombstones: vec![],
            vectors: vec![VectorEntry {
                id: 0,
                values: vec![0.1, 0.2],
            }],
            stats: SidecarStats::default(),
        };

        let json = serde_json::to_value(&sidecar).unwrap();
        assert!(json.get("nextInternalId").is_some());
        assert!(json.get("uriToId").is_some());
        assert!(json.get("typeIndex").is_some());
        assert!(json["stats"].get("avgSearchTimeMicros").is_some());
        assert_eq!(json["metadata"][0]["type"], "Entity");
    }

    #[test]
    fn round_trips_through_json() {
        let sidecar = Sidecar {
            version: SIDECAR_VERSION,
            options: VectorIndexOptions {
                dimension: 4,
                ..Default::default()
            },
            next_internal_id: 1,
            uri_to_id: vec![UriIdEntry {
                uri: "e:a".into(),
                id: 0,
            }],
            metadata: vec![],
            type_index: HashMap::new(),
            tombstones: vec![3],
            vectors: vec![],
            stats: SidecarStats::default(),
        };
        let text = serde_json::to_string(&sidecar).unwrap();
        let back: Sidecar = serde_json::from_str(&text).unwrap();
        assert_eq!(back.options.dimension, 4);
        assert_eq!(back.tombstones, vec![3]);
        assert_eq!(back.uri_to_id[0].uri, Uri::from("e:a"));
    }
}
