//! Dual-search orchestration and score fusion

mod cache;
mod fusion;
mod orchestrator;
mod query;
mod types;

pub use cache::ResponseCache;
pub use fusion::{min_max_normalize, Fuser};
pub use orchestrator::DualSearch;
pub use query::{
    expand_terms, extraction_prompt, heuristic_entities, parse_entity_array,
    truncate_for_embedding, QueryAnalysis, MAX_EMBED_CHARS,
};
pub use types::{
    Diagnostic, EnvelopeError, RankedResult, SearchEnvelope, SearchSource, SourceHit,
};
