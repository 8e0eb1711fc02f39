//! Query pipeline: preprocessing, hybrid retrieval, optional reranking,
//! and suggestion assembly.
//!
//! The pipeline owns read handles over both retrieval artifacts and is
//! wired explicitly — callers pass the embedder and optional reranker in,
//! nothing is reached through globals.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{debug, info};

use crate::config::Config;
use crate::extract::fields;
use crate::model::{CodeSuggestion, QueryResult, ScoredCandidate};
use crate::search::lexical::LexicalSearcher;
use crate::search::queryproc;
use crate::extract::segment::normalize_code;
use crate::search::rerank::apply_rerank;
use crate::search::vector::{SemanticRetriever, VectorHit};
use crate::search::{Embedder, HybridRanker, InMemoryVectorStore, Reranker};

/// End-to-end query engine over previously built indexes.
pub struct CodeSearchPipeline {
    lexical: LexicalSearcher,
    semantic: SemanticRetriever,
    reranker: Option<Box<dyn Reranker>>,
    config: Config,
}

impl CodeSearchPipeline {
    /// Open both artifacts under `data_dir`.
    pub fn open(
        data_dir: &Path,
        config: Config,
        embedder: Arc<dyn Embedder>,
        reranker: Option<Box<dyn Reranker>>,
    ) -> Result<Self> {
        let lexical = LexicalSearcher::open(data_dir)
            .with_context(|| format!("open indexes in {}", data_dir.display()))?;
        let store = InMemoryVectorStore::load(data_dir)?;
        let semantic = SemanticRetriever::new(embedder, Arc::new(store));
        Ok(Self {
            lexical,
            semantic,
            reranker,
            config,
        })
    }

    /// Answer one free-text query with ranked code suggestions.
    pub fn suggest(&self, query: &str) -> Result<QueryResult> {
        let started = Instant::now();
        let processed = queryproc::process(query);
        debug!(
            cleaned = %processed.cleaned,
            mentioned = processed.mentioned_codes.len(),
            "query processed"
        );

        let ranker = HybridRanker::new(&self.lexical, &self.semantic);
        let candidates = ranker.retrieve_hybrid(
            &processed.search_query,
            self.config.top_k_retrieval,
            self.config.weights(),
        )?;
        let retrieved = candidates.len();

        let (ranked, rerank_applied) = match &self.reranker {
            Some(reranker) => apply_rerank(
                reranker.as_ref(),
                &processed.original,
                candidates,
                self.config.top_k_rerank,
            ),
            None => {
                let mut candidates = candidates;
                candidates.truncate(self.config.top_k_rerank);
                (candidates, false)
            }
        };

        let suggestions: Vec<CodeSuggestion> =
            ranked.iter().map(build_suggestion).collect();

        let elapsed = started.elapsed();
        info!(
            suggestions = suggestions.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "query answered"
        );
        Ok(QueryResult {
            query: query.to_string(),
            suggestions,
            processing_time_ms: elapsed.as_secs_f64() * 1000.0,
            retrieval_metadata: json!({
                "cleaned_query": processed.cleaned,
                "mentioned_codes": processed.mentioned_codes,
                "candidates_retrieved": retrieved,
                "rerank_applied": rerank_applied,
                "lexical_weight": self.config.lexical_weight,
                "semantic_weight": self.config.semantic_weight,
            }),
        })
    }

    /// Direct lookup of one code's stored record.
    pub fn lookup(&self, code: &str) -> Result<Option<VectorHit>> {
        let normalized = normalize_code(&code.trim().to_uppercase());
        self.semantic.get_by_field("code", &normalized)
    }
}

/// Shape one ranked candidate into a response suggestion. The structured
/// lists are recovered from the stored source block with the same field
/// extractors the build used, so lookup and search agree on them.
fn build_suggestion(candidate: &ScoredCandidate) -> CodeSuggestion {
    let meta_str = |key: &str| {
        candidate
            .metadata
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };

    let mut signals = Vec::new();
    if candidate.lexical_score.is_some() {
        signals.push("correspondance lexicale");
    }
    if candidate.semantic_score.is_some() {
        signals.push("similarité sémantique");
    }
    let explanation = match meta_str("chapter") {
        Some(chapter) => format!("{} ({chapter})", signals.join(" + ")),
        None => signals.join(" + "),
    };

    CodeSuggestion {
        code: candidate.code.clone(),
        label: meta_str("label").unwrap_or_default(),
        relevance_score: candidate.rerank_score.unwrap_or(candidate.hybrid_score),
        explanation,
        exclusions: fields::extract_exclusions(&candidate.text),
        inclusions: fields::extract_inclusions(&candidate.text),
        coding_instructions: fields::extract_instructions(&candidate.text),
        chapter: meta_str("chapter"),
        priority: meta_str("priority"),
        source_records: vec![candidate.record_id.clone()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::run_index;
    use crate::model::Page;
    use crate::search::HashEmbedder;
    use crate::search::rerank::RankedCode;

    fn build_data_dir(dir: &Path) -> std::path::PathBuf {
        let mut pages = vec![Page::default(); 31];
        pages[1].text = "Règles générales de codage PMSI, version consolidée.".to_string();
        pages.push(Page {
            text: "CHAPITRE I : Maladies infectieuses\nA41\nSepsis à staphylocoques\nÀ l'exclusion de : sepsis néonatal (P36.-)\n".to_string(),
            blocks: Vec::new(),
        });
        pages.push(Page {
            text: "J18.9\nPneumonie, sans précision\nComprend : pneumopathie infectieuse communautaire\n".to_string(),
            blocks: Vec::new(),
        });
        let doc = crate::model::Document { pages };
        let input = dir.join("document.json");
        std::fs::write(&input, serde_json::to_string(&doc).unwrap()).unwrap();

        let data_dir = dir.join("data");
        run_index(
            &input,
            &data_dir,
            &Config::default(),
            &HashEmbedder::default(),
        )
        .unwrap();
        data_dir
    }

    fn open_pipeline(data_dir: &Path, reranker: Option<Box<dyn Reranker>>) -> CodeSearchPipeline {
        CodeSearchPipeline::open(
            data_dir,
            Config::default(),
            Arc::new(HashEmbedder::default()),
            reranker,
        )
        .unwrap()
    }

    #[test]
    fn test_suggest_finds_matching_code() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = build_data_dir(dir.path());
        let pipeline = open_pipeline(&data_dir, None);

        let result = pipeline.suggest("sepsis à staphylocoques").unwrap();
        assert!(!result.suggestions.is_empty());
        let top = &result.suggestions[0];
        assert_eq!(top.code, "A41");
        assert_eq!(top.label, "Sepsis à staphylocoques");
        assert_eq!(top.exclusions, vec!["sepsis néonatal (P36.-)".to_string()]);
        assert!(top.relevance_score > 0.0);
    }

    #[test]
    fn test_suggest_reports_mentioned_codes() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = build_data_dir(dir.path());
        let pipeline = open_pipeline(&data_dir, None);

        let result = pipeline.suggest("pneumonie, voir J18.9").unwrap();
        assert_eq!(
            result.retrieval_metadata["mentioned_codes"],
            json!(["J18.9"])
        );
        assert_eq!(result.retrieval_metadata["rerank_applied"], json!(false));
    }

    #[test]
    fn test_reranker_reorders_suggestions() {
        struct PreferPneumonia;
        impl Reranker for PreferPneumonia {
            fn rank(
                &self,
                _query: &str,
                candidates: &[ScoredCandidate],
            ) -> Result<Vec<RankedCode>> {
                Ok(candidates
                    .iter()
                    .map(|c| RankedCode {
                        code: c.code.clone(),
                        score: if c.code == "J18.9" { 1.0 } else { 0.1 },
                        reasoning: String::new(),
                    })
                    .collect())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let data_dir = build_data_dir(dir.path());
        let pipeline = open_pipeline(&data_dir, Some(Box::new(PreferPneumonia)));

        let result = pipeline.suggest("sepsis pneumonie").unwrap();
        assert_eq!(result.suggestions[0].code, "J18.9");
        assert_eq!(result.retrieval_metadata["rerank_applied"], json!(true));
    }

    #[test]
    fn test_lookup_normalizes_code() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = build_data_dir(dir.path());
        let pipeline = open_pipeline(&data_dir, None);

        let hit = pipeline.lookup("a41.").unwrap().unwrap();
        assert_eq!(hit.metadata["code"], json!("A41"));
        let summary = hit.metadata["summary"].as_str().unwrap();
        assert!(summary.starts_with("Code: A41"));
        assert!(summary.contains("Libellé: Sepsis à staphylocoques"));
        assert!(pipeline.lookup("Z99.9").unwrap().is_none());
    }
}
