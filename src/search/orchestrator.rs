//! Dual-search orchestrator: query processing, parallel retrieval, fusion
//!
//! A query flows through three phases. Phase A turns free text into
//! entities, terms, and an embedding (falling back to heuristics when a
//! port misbehaves). Phase B runs exact label lookup, vector similarity,
//! and a shallow PPR traversal concurrently; each source absorbs its own
//! failure into a diagnostic. Phase C fuses per-URI scores linearly and
//! ranks. The envelope always comes back; cancellation and an empty query
//! are the only terminal failures.

use super::cache::ResponseCache;
use super::fusion::Fuser;
use super::query::{
    confidence, expand_terms, extraction_prompt, heuristic_entities, parse_entity_array,
    truncate_for_embedding, QueryAnalysis,
};
use super::types::{Diagnostic, SearchEnvelope, SearchSource, SourceHit};
use crate::cancel::CancelToken;
use crate::config::SearchConfig;
use crate::error::{EngineError, EngineResult, ErrorKind};
use crate::graph::{Graph, Uri};
use crate::ports::{EmbeddingPort, LlmOptions, LlmPort};
use crate::ppr::{personalized_pagerank, PprOptions};
use crate::rdf::TripleQueries;
use crate::vector::VectorIndex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

/// Candidates kept per entity name during URI resolution
const NAME_RESOLUTION_LIMIT: usize = 5;

/// The query orchestrator
///
/// Owns handles to its collaborators; everything is injected at
/// construction and never mutated afterwards.
pub struct DualSearch {
    triples: Arc<dyn TripleQueries>,
    llm: Arc<dyn LlmPort>,
    embedder: Arc<dyn EmbeddingPort>,
    vectors: Arc<VectorIndex>,
    config: SearchConfig,
    ppr_options: PprOptions,
    cache: ResponseCache,
}

impl DualSearch {
    /// Build an orchestrator. The configuration is validated here; missing
    /// or non-positive fusion weights are rejected.
    pub fn new(
        triples: Arc<dyn TripleQueries>,
        llm: Arc<dyn LlmPort>,
        embedder: Arc<dyn EmbeddingPort>,
        vectors: Arc<VectorIndex>,
        config: SearchConfig,
    ) -> EngineResult<Self> {
        config.validate()?;
        let cache = ResponseCache::new(
            config.cache_capacity,
            Duration::from_secs(config.cache_ttl_secs),
        );
        Ok(Self {
            triples,
            llm,
            embedder,
            vectors,
            config,
            ppr_options: PprOptions::shallow(),
            cache,
        })
    }

    /// Override the traversal depth (interactive queries default shallow).
    pub fn with_ppr_options(mut self, options: PprOptions) -> Self {
        self.ppr_options = options;
        self
    }

    fn budget(&self) -> QueryBudget {
        QueryBudget {
            started: Instant::now(),
            total: Duration::from_millis(self.config.query_deadline_ms),
            port: Duration::from_millis(self.config.port_deadline_ms),
        }
    }

    /// Answer a free-text query with a fused, ranked result envelope.
    pub async fn search(&self, query: &str, cancel: &CancelToken) -> SearchEnvelope {
        let started = Instant::now();
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return SearchEnvelope::failed(query, ErrorKind::InvalidInput, "empty query");
        }

        let key = ResponseCache::key_for(trimmed);
        if let Some(cached) = self.cache.get(&key) {
            debug!(query = trimmed, "response cache hit");
            return cached;
        }
        if cancel.is_cancelled() {
            return SearchEnvelope::failed(trimmed, ErrorKind::Cancelled, "query cancelled");
        }
        let budget = self.budget();

        // Phase A
        let analysis = match self.analyze(trimmed, &budget, cancel).await {
            Ok(analysis) => analysis,
            Err(err) => return SearchEnvelope::failed(trimmed, err.kind(), err.to_string()),
        };

        // Phase B: fan out, gather all, succeed-partial
        let (exact, vector, ppr) = tokio::join!(
            self.exact_search(&analysis, &budget, cancel),
            self.vector_search(&analysis),
            self.ppr_search(&analysis, &budget, cancel),
        );
        if cancel.is_cancelled() {
            return SearchEnvelope::failed(trimmed, ErrorKind::Cancelled, "query cancelled");
        }

        // Phase C
        let weights = &self.config.weights;
        let mut fuser = Fuser::new();
        let mut diagnostics = Vec::new();
        let mut sources_used = Vec::new();
        for (source, weight, outcome) in [
            (SearchSource::ExactMatch, weights.exact, exact),
            (SearchSource::VectorSimilarity, weights.vector, vector),
            (SearchSource::PprTraversal, weights.ppr, ppr),
        ] {
            match outcome {
                Ok(hits) => {
                    if !hits.is_empty() {
                        sources_used.push(source);
                    }
                    fuser.add(source, weight, &hits);
                }
                Err(err) => {
                    warn!(source = source.as_str(), %err, "retrieval source failed");
                    diagnostics.push(Diagnostic {
                        source,
                        kind: err.kind(),
                        message: err.to_string(),
                    });
                }
            }
        }

        let envelope = SearchEnvelope {
            success: true,
            query_id: Uuid::new_v4(),
            query: trimmed.to_string(),
            results: fuser.rank(),
            sources_used,
            diagnostics,
            confidence: analysis.confidence,
            elapsed_ms: started.elapsed().as_millis() as u64,
            error: None,
        };
        self.cache.insert(key, envelope.clone());
        envelope
    }

    /// Phase A: entities via the LLM (heuristic fallback), embedding via
    /// the embedding port (absent on failure), expansion, confidence.
    async fn analyze(
        &self,
        query: &str,
        budget: &QueryBudget,
        cancel: &CancelToken,
    ) -> EngineResult<QueryAnalysis> {
        cancel.checkpoint()?;

        let max = self.config.max_query_entities;
        let llm_options = LlmOptions {
            max_tokens: Some(256),
            temperature: Some(0.0),
        };
        let prompt = extraction_prompt(query);
        let window = budget.port_window().ok_or(EngineError::Timeout(budget.total))?;
        let mut entities = match timeout(
            window,
            self.llm.generate_response(&prompt, "", &llm_options),
        )
        .await
        {
            Ok(Ok(text)) => parse_entity_array(&text).unwrap_or_else(|| {
                debug!("unparseable entity response, falling back to heuristic");
                heuristic_entities(query, max)
            }),
            Ok(Err(err)) => {
                debug!(%err, "entity extraction failed, falling back to heuristic");
                heuristic_entities(query, max)
            }
            Err(_) => {
                debug!("entity extraction timed out, falling back to heuristic");
                heuristic_entities(query, max)
            }
        };
        entities.truncate(max);

        cancel.checkpoint()?;
        let window = budget.port_window().ok_or(EngineError::Timeout(budget.total))?;
        let embedding = match timeout(
            window,
            self.embedder.generate_embedding(truncate_for_embedding(query)),
        )
        .await
        {
            Ok(Ok(vector)) => Some(vector),
            Ok(Err(err)) => {
                debug!(%err, "embedding failed, proceeding without");
                None
            }
            Err(_) => {
                debug!("embedding timed out, proceeding without");
                None
            }
        };

        let terms = if self.config.expand_terms {
            expand_terms(&entities)
        } else {
            entities.clone()
        };
        let expansion_grew = terms.len() > entities.len();
        let confidence = confidence(entities.len(), embedding.is_some(), expansion_grew);

        Ok(QueryAnalysis {
            entities,
            terms,
            embedding,
            confidence,
        })
    }

    /// Exact label lookup; every match scores 1.0.
    async fn exact_search(
        &self,
        analysis: &QueryAnalysis,
        budget: &QueryBudget,
        cancel: &CancelToken,
    ) -> EngineResult<Vec<SourceHit>> {
        if analysis.terms.is_empty() {
            return Ok(Vec::new());
        }
        cancel.checkpoint()?;

        let window = budget.port_window().ok_or(EngineError::Timeout(budget.total))?;
        let matches = timeout(
            window,
            self.triples
                .label_search(&analysis.terms, &self.config.exact_kinds),
        )
        .await
        .map_err(|_| EngineError::Timeout(window))?
        .map_err(|e| EngineError::dependency("triple_store", e))?;

        Ok(matches
            .into_iter()
            .map(|m| SourceHit {
                uri: m.uri,
                kind: m.kind,
                content: m.content,
                score: 1.0,
            })
            .collect())
    }

    /// Typed vector similarity above the configured threshold. Purely
    /// in-memory; never suspends.
    async fn vector_search(&self, analysis: &QueryAnalysis) -> EngineResult<Vec<SourceHit>> {
        let Some(embedding) = &analysis.embedding else {
            return Ok(Vec::new());
        };

        let grouped = self.vectors.search_by_kinds(
            embedding,
            &self.config.vector_kinds,
            self.config.vector_k,
        )?;
        let mut hits: Vec<SourceHit> = grouped
            .into_values()
            .flatten()
            .filter(|hit| hit.similarity >= self.config.similarity_threshold)
            .map(|hit| SourceHit {
                uri: hit.uri,
                kind: hit.kind,
                content: hit.content,
                score: hit.similarity as f64,
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.uri.cmp(&b.uri))
        });
        Ok(hits)
    }

    /// Resolve entity names to URIs, pull their neighbourhood, and rank it
    /// with a shallow personalized PageRank.
    async fn ppr_search(
        &self,
        analysis: &QueryAnalysis,
        budget: &QueryBudget,
        cancel: &CancelToken,
    ) -> EngineResult<Vec<SourceHit>> {
        if analysis.entities.is_empty() {
            return Ok(Vec::new());
        }
        cancel.checkpoint()?;

        let window = budget.port_window().ok_or(EngineError::Timeout(budget.total))?;
        let resolved = timeout(
            window,
            self.triples
                .resolve_names(&analysis.entities, NAME_RESOLUTION_LIMIT),
        )
        .await
        .map_err(|_| EngineError::Timeout(window))?
        .map_err(|e| EngineError::dependency("triple_store", e))?;

        // Entry points in entity order so runs are reproducible
        let mut entry_points: Vec<Uri> = Vec::new();
        for name in &analysis.entities {
            for candidate in resolved.get(name).into_iter().flatten() {
                if !entry_points.contains(&candidate.uri) {
                    entry_points.push(candidate.uri.clone());
                }
            }
        }
        if entry_points.is_empty() {
            return Ok(Vec::new());
        }

        cancel.checkpoint()?;
        let window = budget.port_window().ok_or(EngineError::Timeout(budget.total))?;
        let triples = timeout(window, self.triples.neighborhood(&entry_points))
            .await
            .map_err(|_| EngineError::Timeout(window))?
            .map_err(|e| EngineError::dependency("triple_store", e))?;

        let graph = Graph::build(&triples, true);
        let result = personalized_pagerank(&graph, &entry_points, &self.ppr_options, cancel)?;

        Ok(result
            .ranked
            .iter()
            .map(|node| SourceHit {
                uri: node.uri.clone(),
                kind: node.kind,
                content: graph
                    .node_index(&node.uri)
                    .and_then(|i| graph.node(i).content.clone()),
                score: node.score,
            })
            .collect())
    }
}

/// Remaining time budget for one query
#[derive(Debug, Clone, Copy)]
struct QueryBudget {
    started: Instant,
    total: Duration,
    port: Duration,
}

impl QueryBudget {
    /// Window for the next port call: the smaller of the per-port deadline
    /// and what is left of the query budget. `None` once the budget is
    /// spent, which the caller reports as `Timeout`.
    fn port_window(&self) -> Option<Duration> {
        let remaining = self.total.checked_sub(self.started.elapsed())?;
        if remaining.is_zero() {
            return None;
        }
        Some(remaining.min(self.port))
    }
}

impl std::fmt::Debug for DualSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualSearch")
            .field("config", &self.config)
            .field("cached_responses", &self.cache.len())
            .finish()
    }
}
