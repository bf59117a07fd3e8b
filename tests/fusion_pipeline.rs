//! End-to-end dual-search scenarios: fusion ordering, partial failure,
//! and the no-entities boundary.

mod common;

use common::{entity, label, relationship};
use ragno::cancel::CancelToken;
use ragno::config::{FusionWeights, SearchConfig};
use ragno::error::ErrorKind;
use ragno::graph::{NodeKind, Uri};
use ragno::ports::{MockEmbedder, MockLlm};
use ragno::rdf::MemoryTripleStore;
use ragno::search::{DualSearch, SearchSource};
use ragno::vector::{VectorIndex, VectorIndexOptions};
use std::sync::Arc;

fn index_4d() -> Arc<VectorIndex> {
    Arc::new(
        VectorIndex::new(VectorIndexOptions {
            dimension: 4,
            max_elements: 100,
            ..Default::default()
        })
        .unwrap(),
    )
}

/// Exact finds E1 (1.0), vector scores E2 at 0.9 and E1 at 0.2, PPR from
/// E1 favours E2. Fused with uniform weights, E1 must still rank first.
#[tokio::test]
async fn fusion_orders_exact_match_first() {
    let mut triples = vec![entity("e:1"), entity("e:2")];
    triples.push(label("e:1", "Alpha"));
    triples.push(label("e:2", "Beta"));
    triples.extend(relationship("r:1", "e:1", "e:2", 1.0));
    let store = MemoryTripleStore::new(triples);

    // cos(query, e2) = 0.9, cos(query, e1) = 0.2
    let query_vec = vec![1.0, 0.0, 0.0, 0.0];
    let e1_vec = vec![0.2, (1.0f32 - 0.04).sqrt(), 0.0, 0.0];
    let e2_vec = vec![0.9, (1.0f32 - 0.81).sqrt(), 0.0, 0.0];

    let vectors = index_4d();
    vectors
        .add_node("e:1", e1_vec, NodeKind::Entity, None)
        .unwrap();
    vectors
        .add_node("e:2", e2_vec, NodeKind::Entity, None)
        .unwrap();

    let mut config = SearchConfig::with_weights(FusionWeights {
        exact: 1.0,
        vector: 1.0,
        ppr: 1.0,
    });
    config.similarity_threshold = 0.0;

    let search = DualSearch::new(
        Arc::new(store),
        Arc::new(MockLlm::with_response(r#"["Alpha"]"#)),
        Arc::new(MockEmbedder::new(4).with_vector("Alpha", query_vec)),
        vectors,
        config,
    )
    .unwrap();

    let envelope = search.search("Alpha", &CancelToken::new()).await;
    assert!(envelope.success);

    let first = &envelope.results[0];
    assert_eq!(first.uri, Uri::from("e:1"), "exact match must win");
    assert_eq!(first.rank, 1);
    // exact 1.0 + vector 0.2; PPR excludes its own entry point
    assert!((first.combined_score - 1.2).abs() < 1e-6);
    assert!(first.sources.contains(&SearchSource::ExactMatch));
    assert!(first.sources.contains(&SearchSource::VectorSimilarity));

    let second = &envelope.results[1];
    assert_eq!(second.uri, Uri::from("e:2"));
    assert!(second.combined_score > 0.9, "vector plus ppr contribution");
    assert!(second.combined_score < first.combined_score);
    assert!(second.sources.contains(&SearchSource::PprTraversal));

    // All three strategies contributed to the envelope
    assert_eq!(envelope.sources_used.len(), 3);
    assert!(envelope.diagnostics.is_empty());
}

/// Triple store down, vector path up: the query still succeeds on vector
/// results alone and the diagnostics name the dead source.
#[tokio::test]
async fn partial_failure_keeps_surviving_sources() {
    let vectors = index_4d();
    vectors
        .add_node("e:v", vec![1.0, 0.0, 0.0, 0.0], NodeKind::Entity, None)
        .unwrap();

    let search = DualSearch::new(
        Arc::new(MemoryTripleStore::failing()),
        Arc::new(MockLlm::with_response(r#"["test"]"#)),
        Arc::new(MockEmbedder::new(4).with_vector("test", vec![1.0, 0.0, 0.0, 0.0])),
        vectors,
        SearchConfig::with_weights(FusionWeights::uniform()),
    )
    .unwrap();

    let envelope = search.search("test", &CancelToken::new()).await;
    assert!(envelope.success);
    assert_eq!(envelope.sources_used, vec![SearchSource::VectorSimilarity]);
    assert_eq!(envelope.results[0].uri, Uri::from("e:v"));

    let exact_diag = envelope
        .diagnostics
        .iter()
        .find(|d| d.source == SearchSource::ExactMatch)
        .expect("exact_match failure reported");
    assert_eq!(exact_diag.kind, ErrorKind::Dependency);
}

/// No extractable entities but a valid embedding: exact and PPR return
/// nothing, vector similarity still answers.
#[tokio::test]
async fn embedding_only_query_still_searches_vectors() {
    let triples = vec![entity("e:1"), label("e:1", "Alpha")];
    let vectors = index_4d();
    vectors
        .add_node("e:1", vec![1.0, 0.0, 0.0, 0.0], NodeKind::Entity, None)
        .unwrap();

    // Every token is two characters, so even the heuristic yields nothing
    let query = "zz xy";
    let search = DualSearch::new(
        Arc::new(MemoryTripleStore::new(triples)),
        Arc::new(MockLlm::with_response("[]")),
        Arc::new(MockEmbedder::new(4).with_vector(query, vec![1.0, 0.0, 0.0, 0.0])),
        vectors,
        SearchConfig::with_weights(FusionWeights::uniform()),
    )
    .unwrap();

    let envelope = search.search(query, &CancelToken::new()).await;
    assert!(envelope.success);
    assert_eq!(envelope.sources_used, vec![SearchSource::VectorSimilarity]);
    assert_eq!(envelope.results[0].uri, Uri::from("e:1"));
}

/// Fused results are non-empty iff some source returned something.
#[tokio::test]
async fn everything_failing_yields_empty_success() {
    let search = DualSearch::new(
        Arc::new(MemoryTripleStore::failing()),
        Arc::new(MockLlm::failing("down")),
        Arc::new(MockEmbedder::failing(4)),
        index_4d(),
        SearchConfig::with_weights(FusionWeights::uniform()),
    )
    .unwrap();

    let envelope = search.search("anything at all", &CancelToken::new()).await;
    assert!(envelope.success, "sub-search failures are non-fatal");
    assert!(envelope.results.is_empty());
    assert!(!envelope.diagnostics.is_empty());
}
