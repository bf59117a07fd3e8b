//! Typed engine configuration
//!
//! The orchestrator and its collaborators are built from these structs;
//! there is no process-global configuration. Fusion weights are required:
//! a document that omits one fails at load, it never defaults silently.

use crate::analytics::LeidenConfig;
use crate::error::{EngineError, EngineResult};
use crate::graph::NodeKind;
use crate::ppr::PprOptions;
use crate::vector::VectorIndexOptions;
use serde::{Deserialize, Serialize};

/// Per-source weights applied during fusion. All three are required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionWeights {
    pub exact: f64,
    pub vector: f64,
    pub ppr: f64,
}

impl FusionWeights {
    /// Equal weighting across sources
    pub fn uniform() -> Self {
        Self {
            exact: 1.0,
            vector: 1.0,
            ppr: 1.0,
        }
    }

    fn validate(&self) -> EngineResult<()> {
        for (name, value) in [
            ("exact", self.exact),
            ("vector", self.vector),
            ("ppr", self.ppr),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(EngineError::InvalidInput(format!(
                    "fusion weight '{}' must be a positive finite number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Dual-search orchestrator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Required fusion weights
    pub weights: FusionWeights,
    /// Entity cap for query processing
    #[serde(default = "default_max_query_entities")]
    pub max_query_entities: usize,
    /// Minimum similarity kept from the vector source
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// Results requested per type from the vector index
    #[serde(default = "default_vector_k")]
    pub vector_k: usize,
    /// Type tags searched in the vector index
    #[serde(default = "default_vector_kinds")]
    pub vector_kinds: Vec<NodeKind>,
    /// Type tags matched by the exact label lookup
    #[serde(default = "default_exact_kinds")]
    pub exact_kinds: Vec<NodeKind>,
    /// Add naive singular/plural variants of extracted entities
    #[serde(default = "default_expand_terms")]
    pub expand_terms: bool,
    /// Response-cache capacity (entries)
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Response-cache entry lifetime
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Deadline applied to each external port call
    #[serde(default = "default_port_deadline_ms")]
    pub port_deadline_ms: u64,
    /// Overall budget for one query; port calls get the smaller of this
    /// budget's remainder and the per-port deadline
    #[serde(default = "default_query_deadline_ms")]
    pub query_deadline_ms: u64,
}

fn default_max_query_entities() -> usize {
    5
}
fn default_similarity_threshold() -> f32 {
    0.7
}
fn default_vector_k() -> usize {
    10
}
fn default_vector_kinds() -> Vec<NodeKind> {
    vec![
        NodeKind::Entity,
        NodeKind::Unit,
        NodeKind::Attribute,
        NodeKind::TextElement,
    ]
}
fn default_exact_kinds() -> Vec<NodeKind> {
    vec![NodeKind::Entity, NodeKind::Attribute]
}
fn default_expand_terms() -> bool {
    true
}
fn default_cache_capacity() -> usize {
    256
}
fn default_cache_ttl_secs() -> u64 {
    300
}
fn default_port_deadline_ms() -> u64 {
    10_000
}
fn default_query_deadline_ms() -> u64 {
    30_000
}

impl SearchConfig {
    /// Search config with the given weights and defaults elsewhere.
    pub fn with_weights(weights: FusionWeights) -> Self {
        Self {
            weights,
            max_query_entities: default_max_query_entities(),
            similarity_threshold: default_similarity_threshold(),
            vector_k: default_vector_k(),
            vector_kinds: default_vector_kinds(),
            exact_kinds: default_exact_kinds(),
            expand_terms: default_expand_terms(),
            cache_capacity: default_cache_capacity(),
            cache_ttl_secs: default_cache_ttl_secs(),
            port_deadline_ms: default_port_deadline_ms(),
            query_deadline_ms: default_query_deadline_ms(),
        }
    }

    pub(crate) fn validate(&self) -> EngineResult<()> {
        self.weights.validate()?;
        if self.max_query_entities == 0 {
            return Err(EngineError::InvalidInput(
                "max_query_entities must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(EngineError::InvalidInput(format!(
                "similarity_threshold must be in [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.vector_kinds.is_empty() || self.exact_kinds.is_empty() {
            return Err(EngineError::InvalidInput(
                "vector_kinds and exact_kinds must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level engine configuration document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub search: SearchConfig,
    #[serde(default)]
    pub vector: VectorIndexOptions,
    #[serde(default)]
    pub ppr: PprOptions,
    #[serde(default)]
    pub leiden: LeidenConfig,
}

impl EngineConfig {
    /// Parse and validate a YAML configuration document.
    pub fn from_yaml_str(text: &str) -> EngineResult<Self> {
        let config: EngineConfig = serde_yaml::from_str(text)
            .map_err(|e| EngineError::InvalidInput(format!("config parse failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate ranges that serde cannot express.
    pub fn validate(&self) -> EngineResult<()> {
        self.search.validate()?;
        if self.vector.dimension == 0 {
            return Err(EngineError::InvalidInput(
                "vector dimension must be non-zero".to_string(),
            ));
        }
        if self.vector.max_elements == 0 {
            return Err(EngineError::InvalidInput(
                "vector max_elements must be non-zero".to_string(),
            ));
        }
        if !(self.ppr.alpha > 0.0 && self.ppr.alpha < 1.0) {
            return Err(EngineError::InvalidInput(format!(
                "ppr alpha must be in (0, 1), got {}",
                self.ppr.alpha
            )));
        }
        if self.leiden.resolution <= 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "leiden resolution must be positive, got {}",
                self.leiden.resolution
            )));
        }
        Ok(())
    }
}
