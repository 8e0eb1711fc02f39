//! Re-ranking seam.
//!
//! The actual re-ranking service (an LLM behind an API) is an external
//! collaborator and strictly best-effort: any error or unusable response
//! leaves the hybrid order untouched. That soft-failure rule lives here
//! so callers never have to special-case it.

use anyhow::Result;
use tracing::{debug, warn};

use crate::model::ScoredCandidate;

/// Upper bound on candidates handed to the external service.
pub const MAX_RERANK_CANDIDATES: usize = 15;

/// Candidates missing from a successful rerank response keep a damped
/// version of their hybrid score.
const MISSING_CODE_DAMPING: f32 = 0.5;

/// One ranked entry returned by the external service.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RankedCode {
    pub code: String,
    pub score: f32,
    #[serde(default)]
    pub reasoning: String,
}

/// External relevance ranker.
pub trait Reranker: Send + Sync {
    /// Rank candidates (at most [`MAX_RERANK_CANDIDATES`]) against the
    /// query. Each candidate's metadata carries a rendered `summary` of
    /// the underlying record as ranking context. Errors are the caller's
    /// signal to keep the original order.
    fn rank(&self, query: &str, candidates: &[ScoredCandidate]) -> Result<Vec<RankedCode>>;
}

/// Apply a reranker best-effort and return at most `top_k` candidates.
///
/// On success, each candidate's `rerank_score` comes from the response
/// (matched by code), or from its damped hybrid score when the response
/// omitted it; the list is re-sorted by that score. On failure the input
/// order is returned untouched, truncated to `top_k`.
pub fn apply_rerank(
    reranker: &dyn Reranker,
    query: &str,
    mut candidates: Vec<ScoredCandidate>,
    top_k: usize,
) -> (Vec<ScoredCandidate>, bool) {
    if candidates.is_empty() {
        return (candidates, false);
    }
    candidates.truncate(MAX_RERANK_CANDIDATES);

    let rankings = match reranker.rank(query, &candidates) {
        Ok(rankings) if !rankings.is_empty() => rankings,
        Ok(_) => {
            warn!("reranker returned no rankings, keeping hybrid order");
            candidates.truncate(top_k);
            return (candidates, false);
        }
        Err(error) => {
            warn!(%error, "rerank failed, keeping hybrid order");
            candidates.truncate(top_k);
            return (candidates, false);
        }
    };

    let scores: std::collections::HashMap<&str, f32> = rankings
        .iter()
        .map(|r| (r.code.as_str(), r.score))
        .collect();

    for candidate in &mut candidates {
        candidate.rerank_score = Some(
            scores
                .get(candidate.code.as_str())
                .copied()
                .unwrap_or(candidate.hybrid_score * MISSING_CODE_DAMPING),
        );
    }
    candidates.sort_by(|a, b| {
        b.rerank_score
            .partial_cmp(&a.rerank_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(top_k);
    debug!(reranked = candidates.len(), "rerank applied");
    (candidates, true)
}
