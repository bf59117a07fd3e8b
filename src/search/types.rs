//! Result envelope and source model for dual search

use crate::error::ErrorKind;
use crate::graph::{NodeKind, Uri};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Which retrieval path contributed to a result
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SearchSource {
    ExactMatch,
    VectorSimilarity,
    PprTraversal,
}

impl SearchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchSource::ExactMatch => "exact_match",
            SearchSource::VectorSimilarity => "vector_similarity",
            SearchSource::PprTraversal => "ppr_traversal",
        }
    }
}

/// One hit from a single retrieval source, before fusion
#[derive(Debug, Clone)]
pub struct SourceHit {
    pub uri: Uri,
    pub kind: NodeKind,
    pub content: Option<String>,
    pub score: f64,
}

/// A fused, ranked result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedResult {
    pub uri: Uri,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Strongest single-source contribution, unweighted
    pub score: f64,
    /// Weighted sum across sources
    pub combined_score: f64,
    /// Contributing sources, sorted
    pub sources: Vec<SearchSource>,
    /// Dense rank, starting at 1
    pub rank: usize,
    /// Raw per-source scores (side map; not part of the wire envelope)
    #[serde(skip)]
    pub source_scores: BTreeMap<SearchSource, f64>,
}

/// Why a retrieval source contributed nothing
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub source: SearchSource,
    pub kind: ErrorKind,
    pub message: String,
}

/// Terminal error for a query that produced no retrieval at all
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeError {
    pub kind: ErrorKind,
    pub message: String,
}

/// The response returned for every query, success or not
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchEnvelope {
    pub success: bool,
    pub query_id: Uuid,
    pub query: String,
    pub results: Vec<RankedResult>,
    /// Sources that returned at least one hit
    pub sources_used: Vec<SearchSource>,
    /// Sources that failed, with why
    pub diagnostics: Vec<Diagnostic>,
    /// Query-processing confidence in [0, 1]
    pub confidence: f64,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<EnvelopeError>,
}

impl SearchEnvelope {
    /// Envelope for a query that failed before retrieval.
    pub fn failed(query: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            query_id: Uuid::new_v4(),
            query: query.into(),
            results: Vec::new(),
            sources_used: Vec::new(),
            diagnostics: Vec::new(),
            confidence: 0.0,
            elapsed_ms: 0,
            error: Some(EnvelopeError {
                kind,
                message: message.into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&SearchSource::ExactMatch).unwrap(),
            "\"exact_match\""
        );
        assert_eq!(SearchSource::PprTraversal.as_str(), "ppr_traversal");
    }

    #[test]
    fn ranked_result_wire_shape() {
        let result = RankedResult {
            uri: "e:a".into(),
            kind: NodeKind::Entity,
            content: None,
            score: 1.0,
            combined_score: 1.8,
            sources: vec![SearchSource::ExactMatch, SearchSource::VectorSimilarity],
            rank: 1,
            source_scores: BTreeMap::new(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["type"], "Entity");
        assert!(json.get("combinedScore").is_some());
        assert!(json.get("sourceScores").is_none(), "side map stays off the wire");
        assert_eq!(json["sources"][0], "exact_match");
    }
}
