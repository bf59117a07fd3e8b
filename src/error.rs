//! Crate-wide error taxonomy
//!
//! One closed set of error kinds shared by every subsystem. Per-source
//! retrieval errors are absorbed by the orchestrator (the query proceeds
//! with the sources that succeeded); everything else propagates with `?`.

use thiserror::Error;

/// Errors that can occur in engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// Empty query, malformed parameters, dimension mismatch on insert
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Requested URI absent from the vector index or graph
    #[error("not found: {0}")]
    NotFound(String),

    /// A collaborator port (triple store, LLM, embedding) failed
    #[error("dependency failure in {port}: {source}")]
    Dependency {
        /// Which port failed (`triple_store`, `llm`, `embedding`)
        port: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Deadline exceeded on a port call or on the query as a whole
    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Cancellation signal observed
    #[error("cancelled")]
    Cancelled,

    /// Sidecar/graph disagreement or version mismatch on index load
    #[error("index corrupt: {0}")]
    IndexCorrupt(String),

    /// Invariant violation (should not happen in production)
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Wrap a port failure, preserving the underlying cause.
    pub fn dependency(
        port: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Dependency {
            port,
            source: Box::new(source),
        }
    }

    /// Stable machine-readable kind, used in result envelopes.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Dependency { .. } => ErrorKind::Dependency,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::IndexCorrupt(_) => ErrorKind::IndexCorrupt,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Machine-readable error kind for envelopes and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Dependency,
    Timeout,
    Cancelled,
    IndexCorrupt,
    Internal,
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
