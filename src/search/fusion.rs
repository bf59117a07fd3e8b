//! Linear score fusion across retrieval sources

use super::types::{RankedResult, SearchSource, SourceHit};
use crate::graph::{NodeKind, Uri};
use std::collections::{BTreeMap, HashMap};

/// Per-URI accumulator for weighted source scores
#[derive(Debug, Default)]
pub struct Fuser {
    entries: HashMap<Uri, Accumulator>,
}

#[derive(Debug)]
struct Accumulator {
    kind: NodeKind,
    content: Option<String>,
    combined: f64,
    source_scores: BTreeMap<SearchSource, f64>,
}

impl Fuser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one source's hits into the accumulator:
    /// `combined[uri] += score * weight`, and the source joins the set.
    pub fn add(&mut self, source: SearchSource, weight: f64, hits: &[SourceHit]) {
        for hit in hits {
            let entry = self
                .entries
                .entry(hit.uri.clone())
                .or_insert_with(|| Accumulator {
                    kind: hit.kind,
                    content: None,
                    combined: 0.0,
                    source_scores: BTreeMap::new(),
                });
            entry.combined += hit.score * weight;
            *entry.source_scores.entry(source).or_insert(0.0) += hit.score;
            if entry.content.is_none() {
                entry.content = hit.content.clone();
            }
            // A typed source beats Unknown from an untyped one
            if entry.kind == NodeKind::Unknown && hit.kind != NodeKind::Unknown {
                entry.kind = hit.kind;
            }
        }
    }

    /// Sort by combined score and assign dense ranks from 1.
    /// Ties share a rank; URI order breaks presentation ties.
    pub fn rank(self) -> Vec<RankedResult> {
        let mut rows: Vec<(Uri, Accumulator)> = self.entries.into_iter().collect();
        rows.sort_by(|a, b| {
            b.1.combined
                .partial_cmp(&a.1.combined)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        let mut results = Vec::with_capacity(rows.len());
        let mut rank = 0usize;
        let mut previous: Option<f64> = None;
        for (uri, entry) in rows {
            if previous != Some(entry.combined) {
                rank += 1;
                previous = Some(entry.combined);
            }
            let score = entry
                .source_scores
                .values()
                .copied()
                .fold(0.0f64, f64::max);
            results.push(RankedResult {
                uri,
                kind: entry.kind,
                content: entry.content,
                score,
                combined_score: entry.combined,
                sources: entry.source_scores.keys().copied().collect(),
                rank,
                source_scores: entry.source_scores,
            });
        }
        results
    }
}

/// Min-max normalise a score list into [0, 1]; a constant list maps to 1.0.
/// Exposed for callers that post-process fused scores.
pub fn min_max_normalize(scores: &[f64]) -> Vec<f64> {
    let Some(&first) = scores.first() else {
        return Vec::new();
    };
    let (min, max) = scores.iter().fold((first, first), |(lo, hi), &s| {
        (lo.min(s), hi.max(s))
    });
    let range = max - min;
    scores
        .iter()
        .map(|&s| if range > 0.0 { (s - min) / range } else { 1.0 })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(uri: &str, score: f64) -> SourceHit {
        SourceHit {
            uri: uri.into(),
            kind: NodeKind::Entity,
            content: None,
            score,
        }
    }

    #[test]
    fn combined_is_weighted_sum_across_sources() {
        let mut fuser = Fuser::new();
        fuser.add(SearchSource::ExactMatch, 1.0, &[hit("e:a", 1.0)]);
        fuser.add(
            SearchSource::VectorSimilarity,
            1.0,
            &[hit("e:b", 0.9), hit("e:a", 0.2)],
        );

        let results = fuser.rank();
        assert_eq!(results[0].uri, Uri::from("e:a"));
        assert!((results[0].combined_score - 1.2).abs() < 1e-12);
        assert_eq!(
            results[0].sources,
            vec![SearchSource::ExactMatch, SearchSource::VectorSimilarity]
        );
        assert_eq!(results[1].uri, Uri::from("e:b"));
    }

    #[test]
    fn weights_scale_contributions() {
        let mut fuser = Fuser::new();
        fuser.add(SearchSource::PprTraversal, 0.5, &[hit("e:a", 0.4)]);
        let results = fuser.rank();
        assert!((results[0].combined_score - 0.2).abs() < 1e-12);
        // The unweighted per-source score is preserved
        assert!((results[0].score - 0.4).abs() < 1e-12);
    }

    #[test]
    fn ranks_are_dense_with_ties_shared() {
        let mut fuser = Fuser::new();
        fuser.add(
            SearchSource::ExactMatch,
            1.0,
            &[hit("e:a", 1.0), hit("e:b", 1.0), hit("e:c", 0.5)],
        );
        let results = fuser.rank();
        assert_eq!(results[0].rank, 1);
        assert_eq!(results[1].rank, 1);
        assert_eq!(results[2].rank, 2);
    }

    #[test]
    fn empty_fusion_is_empty() {
        assert!(Fuser::new().rank().is_empty());
    }

    #[test]
    fn repeated_hits_from_one_source_accumulate() {
        let mut fuser = Fuser::new();
        fuser.add(SearchSource::VectorSimilarity, 1.0, &[hit("e:a", 0.3)]);
        fuser.add(SearchSource::VectorSimilarity, 1.0, &[hit("e:a", 0.2)]);
        let results = fuser.rank();
        assert!((results[0].combined_score - 0.5).abs() < 1e-12);
        assert_eq!(results[0].sources, vec![SearchSource::VectorSimilarity]);
    }

    #[test]
    fn min_max_normalize_maps_to_unit_interval() {
        assert_eq!(min_max_normalize(&[]), Vec::<f64>::new());
        assert_eq!(min_max_normalize(&[2.0, 2.0]), vec![1.0, 1.0]);
        let normalized = min_max_normalize(&[1.0, 3.0, 2.0]);
        assert_eq!(normalized, vec![0.0, 1.0, 0.5]);
    }
}
