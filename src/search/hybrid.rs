//! Hybrid fusion of lexical and semantic retrieval.
//!
//! BM25 scores are unbounded and similarity scores live near `[0, 1]`;
//! comparing them directly would let one distribution drown the other.
//! Each candidate list is therefore min-max normalized within itself
//! before the weighted merge. A record present in both lists receives the
//! sum of both weighted contributions, so corroborated relevance can
//! outrank a single stronger signal.

use std::collections::HashMap;

use anyhow::Result;
use tracing::debug;

use crate::model::ScoredCandidate;

use super::lexical::LexicalSearcher;
use super::vector::SemanticRetriever;

/// Independent signal multipliers; not required to sum to 1.
#[derive(Debug, Clone, Copy)]
pub struct RankWeights {
    pub lexical: f32,
    pub semantic: f32,
}

impl Default for RankWeights {
    fn default() -> Self {
        Self {
            lexical: 0.3,
            semantic: 0.7,
        }
    }
}

/// Min-max scale into `[0, 1]` within one list. A flat distribution maps
/// every member to 1.0: no division by zero, and no arbitrary penalty for
/// a list that simply has nothing to discriminate.
pub fn normalize_scores(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }
    let min = scores.iter().copied().fold(f32::INFINITY, f32::min);
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    if range.abs() < f32::EPSILON {
        return vec![1.0; scores.len()];
    }
    scores.iter().map(|&s| (s - min) / range).collect()
}

/// Merges both retrieval signals into one total order.
pub struct HybridRanker<'a> {
    lexical: &'a LexicalSearcher,
    semantic: &'a SemanticRetriever,
}

impl<'a> HybridRanker<'a> {
    pub fn new(lexical: &'a LexicalSearcher, semantic: &'a SemanticRetriever) -> Self {
        Self { lexical, semantic }
    }

    /// Retrieve and merge. Over-fetches `2 × top_k` from each source to
    /// improve merge recall, then truncates the fused order to `top_k`.
    /// Either source coming back empty degrades to single-signal ranking;
    /// an external-dependency failure propagates.
    pub fn retrieve_hybrid(
        &self,
        query: &str,
        top_k: usize,
        weights: RankWeights,
    ) -> Result<Vec<ScoredCandidate>> {
        let semantic_hits = self.semantic.retrieve(query, top_k * 2)?;
        let lexical_hits = self.lexical.query(query, top_k * 2)?;
        debug!(
            semantic = semantic_hits.len(),
            lexical = lexical_hits.len(),
            "hybrid candidate lists fetched"
        );

        let semantic_norm =
            normalize_scores(&semantic_hits.iter().map(|h| h.similarity).collect::<Vec<_>>());
        let lexical_norm =
            normalize_scores(&lexical_hits.iter().map(|h| h.score).collect::<Vec<_>>());

        // First-seen order (semantic list, then lexical) is the tie-break
        // order after the stable sort below.
        let mut merged: Vec<ScoredCandidate> = Vec::new();
        let mut index_of: HashMap<String, usize> = HashMap::new();

        for (hit, &norm) in semantic_hits.into_iter().zip(semantic_norm.iter()) {
            index_of.insert(hit.id.clone(), merged.len());
            let code = hit
                .metadata
                .get("code")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            merged.push(ScoredCandidate {
                record_id: hit.id,
                code,
                text: hit.text,
                metadata: hit.metadata,
                lexical_score: None,
                semantic_score: Some(norm),
                hybrid_score: weights.semantic * norm,
                rerank_score: None,
            });
        }

        for (hit, &norm) in lexical_hits.into_iter().zip(lexical_norm.iter()) {
            match index_of.get(&hit.record_id) {
                Some(&idx) => {
                    let candidate = &mut merged[idx];
                    candidate.lexical_score = Some(norm);
                    candidate.hybrid_score += weights.lexical * norm;
                }
                None => {
                    index_of.insert(hit.record_id.clone(), merged.len());
                    merged.push(ScoredCandidate {
                        record_id: hit.record_id.clone(),
                        code: hit.code.clone(),
                        text: hit.content.clone(),
                        metadata: hit.metadata(),
                        lexical_score: Some(norm),
                        semantic_score: None,
                        hybrid_score: weights.lexical * norm,
                        rerank_score: None,
                    });
                }
            }
        }

        // Stable sort keeps first-seen order for equal scores, making the
        // total order deterministic for identical inputs.
        merged.sort_by(|a, b| {
            b.hybrid_score
                .partial_cmp(&a.hybrid_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        merged.truncate(top_k);
        Ok(merged)
    }
}

/// Merge two already-normalized score lists without retrieval; the unit
/// the merge-law tests exercise directly.
pub fn merge_scored_lists(
    semantic: &[(String, f32)],
    lexical: &[(String, f32)],
    weights: RankWeights,
) -> Vec<(String, f32)> {
    let semantic_norm = normalize_scores(&semantic.iter().map(|(_, s)| *s).collect::<Vec<_>>());
    let lexical_norm = normalize_scores(&lexical.iter().map(|(_, s)| *s).collect::<Vec<_>>());

    let mut merged: Vec<(String, f32)> = Vec::new();
    let mut index_of: HashMap<&str, usize> = HashMap::new();

    for ((id, _), &norm) in semantic.iter().zip(semantic_norm.iter()) {
        index_of.insert(id, merged.len());
        merged.push((id.clone(), weights.semantic * norm));
    }
    for ((id, _), &norm) in lexical.iter().zip(lexical_norm.iter()) {
        match index_of.get(id.as_str()) {
            Some(&idx) => merged[idx].1 += weights.lexical * norm,
            None => {
                index_of.insert(id, merged.len());
                merged.push((id.clone(), weights.lexical * norm));
            }
        }
    }

    merged.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    merged
}
