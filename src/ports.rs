//! Capability ports for the LLM and embedding back-ends
//!
//! The engine never talks to a model provider directly; it consumes two
//! narrow ports injected at construction. Production implementations wrap
//! whatever service the deployment uses; tests use the mocks below.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Errors from port operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("backend not available: {0}")]
    Unavailable(String),
    #[error("request failed: {0}")]
    Failed(String),
    #[error("response parse error: {0}")]
    Parse(String),
}

/// Generation knobs forwarded to the LLM backend.
#[derive(Debug, Clone, Default)]
pub struct LlmOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Port for text generation.
#[async_trait]
pub trait LlmPort: Send + Sync {
    /// Generate a completion for `prompt` given additional `context`.
    async fn generate_response(
        &self,
        prompt: &str,
        context: &str,
        options: &LlmOptions,
    ) -> Result<String, PortError>;
}

/// Port for text embedding.
///
/// Vectors are opaque fixed-length float sequences; their length must
/// match the vector index's dimension at query time.
#[async_trait]
pub trait EmbeddingPort: Send + Sync {
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, PortError>;
}

// ---------------------------------------------------------------------------
// Mocks
// ---------------------------------------------------------------------------

/// Mock LLM for tests — returns preconfigured responses in order, then
/// repeats the last one. An empty queue fails every call.
pub struct MockLlm {
    responses: Vec<Result<String, String>>,
    cursor: AtomicUsize,
}

impl MockLlm {
    /// A mock that always returns `response`.
    pub fn with_response(response: impl Into<String>) -> Self {
        Self {
            responses: vec![Ok(response.into())],
            cursor: AtomicUsize::new(0),
        }
    }

    /// A mock that returns each response in sequence.
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: responses.into_iter().map(Ok).collect(),
            cursor: AtomicUsize::new(0),
        }
    }

    /// A mock whose every call fails.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            responses: vec![Err(message.into())],
            cursor: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl LlmPort for MockLlm {
    async fn generate_response(
        &self,
        _prompt: &str,
        _context: &str,
        _options: &LlmOptions,
    ) -> Result<String, PortError> {
        if self.responses.is_empty() {
            return Err(PortError::Unavailable("no mock responses".to_string()));
        }
        let i = self
            .cursor
            .fetch_add(1, Ordering::Relaxed)
            .min(self.responses.len() - 1);
        match &self.responses[i] {
            Ok(text) => Ok(text.clone()),
            Err(message) => Err(PortError::Failed(message.clone())),
        }
    }
}

/// Mock embedder for tests.
///
/// Returns vectors registered per text; unregistered texts fall back to a
/// deterministic hash-derived vector so orchestrator tests do not need to
/// enumerate every query.
pub struct MockEmbedder {
    dimension: usize,
    fixed: HashMap<String, Vec<f32>>,
    fail: bool,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fixed: HashMap::new(),
            fail: false,
        }
    }

    /// Register an exact vector for a text.
    pub fn with_vector(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.fixed.insert(text.into(), vector);
        self
    }

    /// A mock whose every call fails.
    pub fn failing(dimension: usize) -> Self {
        Self {
            dimension,
            fixed: HashMap::new(),
            fail: true,
        }
    }

    fn hash_vector(&self, text: &str) -> Vec<f32> {
        // FNV-1a spread over the dimensions; stable across runs
        let mut vector = vec![0.0f32; self.dimension];
        let mut hash: u64 = 0xcbf29ce484222325;
        for (i, byte) in text.bytes().enumerate() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
            vector[i % self.dimension] += (hash % 1000) as f32 / 1000.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingPort for MockEmbedder {
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, PortError> {
        if self.fail {
            return Err(PortError::Unavailable("mock embedder offline".to_string()));
        }
        Ok(self
            .fixed
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.hash_vector(text)))
    }
}
