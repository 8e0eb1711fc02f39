//! Runtime configuration.
//!
//! Defaults are tuned for the CIM-10 coding manual; every knob can be
//! overridden through `CIMS_*` environment variables (a `.env` file is
//! honored via dotenvy).

use crate::extract::CorpusOptions;
use crate::search::RankWeights;

/// Configuration for extraction and retrieval.
#[derive(Debug, Clone)]
pub struct Config {
    /// Weight for normalized BM25 scores in the hybrid merge (default: 0.3).
    pub lexical_weight: f32,
    /// Weight for normalized similarity scores in the hybrid merge (default: 0.7).
    pub semantic_weight: f32,
    /// Candidates kept after hybrid fusion (default: 10).
    pub top_k_retrieval: usize,
    /// Suggestions kept after reranking (default: 5).
    pub top_k_rerank: usize,
    /// Last page of the manual's general-rules front matter (default: 30).
    pub front_matter_end: usize,
    /// Character budget for the general-rules record (default: 30000).
    pub general_rules_budget: usize,
    /// Pages with fewer trimmed characters are skipped (default: 50).
    pub min_page_chars: usize,
    /// Slack before the positional fallback kicks in (default: 1).
    pub fallback_anomaly_threshold: usize,
}

impl Default for Config {
    fn default() -> Self {
        let corpus = CorpusOptions::default();
        Self {
            lexical_weight: 0.3,
            semantic_weight: 0.7,
            top_k_retrieval: 10,
            top_k_rerank: 5,
            front_matter_end: corpus.front_matter_end,
            general_rules_budget: corpus.general_rules_budget,
            min_page_chars: corpus.min_page_chars,
            fallback_anomaly_threshold: corpus.fallback_anomaly_threshold,
        }
    }
}

impl Config {
    /// Load config from environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(val) = dotenvy::var("CIMS_LEXICAL_WEIGHT")
            && let Ok(weight) = val.parse()
        {
            cfg.lexical_weight = weight;
        }

        if let Ok(val) = dotenvy::var("CIMS_SEMANTIC_WEIGHT")
            && let Ok(weight) = val.parse()
        {
            cfg.semantic_weight = weight;
        }

        if let Ok(val) = dotenvy::var("CIMS_TOP_K_RETRIEVAL")
            && let Ok(k) = val.parse()
        {
            cfg.top_k_retrieval = k;
        }

        if let Ok(val) = dotenvy::var("CIMS_TOP_K_RERANK")
            && let Ok(k) = val.parse()
        {
            cfg.top_k_rerank = k;
        }

        if let Ok(val) = dotenvy::var("CIMS_FRONT_MATTER_END")
            && let Ok(page) = val.parse()
        {
            cfg.front_matter_end = page;
        }

        if let Ok(val) = dotenvy::var("CIMS_GENERAL_RULES_BUDGET")
            && let Ok(budget) = val.parse()
        {
            cfg.general_rules_budget = budget;
        }

        if let Ok(val) = dotenvy::var("CIMS_MIN_PAGE_CHARS")
            && let Ok(chars) = val.parse()
        {
            cfg.min_page_chars = chars;
        }

        if let Ok(val) = dotenvy::var("CIMS_FALLBACK_ANOMALY_THRESHOLD")
            && let Ok(threshold) = val.parse()
        {
            cfg.fallback_anomaly_threshold = threshold;
        }

        cfg
    }

    pub fn weights(&self) -> RankWeights {
        RankWeights {
            lexical: self.lexical_weight,
            semantic: self.semantic_weight,
        }
    }

    pub fn corpus_options(&self) -> CorpusOptions {
        CorpusOptions {
            front_matter_end: self.front_matter_end,
            general_rules_budget: self.general_rules_budget,
            min_page_chars: self.min_page_chars,
            fallback_anomaly_threshold: self.fallback_anomaly_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights() {
        let cfg = Config::default();
        assert!((cfg.lexical_weight - 0.3).abs() < f32::EPSILON);
        assert!((cfg.semantic_weight - 0.7).abs() < f32::EPSILON);
        assert_eq!(cfg.top_k_retrieval, 10);
        assert_eq!(cfg.top_k_rerank, 5);
    }

    #[test]
    fn test_corpus_options_mirror_config() {
        let cfg = Config {
            min_page_chars: 80,
            ..Config::default()
        };
        assert_eq!(cfg.corpus_options().min_page_chars, 80);
    }
}
