//! Offline index build.
//!
//! One pass over an extracted document JSON produces both retrieval
//! artifacts: a fresh lexical index generation (promoted atomically) and
//! the persisted vector store. Rebuilds are wholesale; there is no
//! incremental path.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use crate::extract::CorpusBuilder;
use crate::model::Document;
use crate::search::embedder::truncate_for_embedding;
use crate::search::lexical::{LexicalIndexWriter, promote_staging, staging_dir};
use crate::search::{Embedder, InMemoryVectorStore};

const MANIFEST_FILE: &str = "manifest.json";

/// Provenance record written next to the artifacts after every build.
#[derive(Debug, Serialize, Deserialize)]
pub struct BuildManifest {
    pub built_at: chrono::DateTime<chrono::Utc>,
    pub source: PathBuf,
    pub embedder_id: String,
    pub records: usize,
    pub indexed_semantic: usize,
}

impl BuildManifest {
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(MANIFEST_FILE);
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("read manifest {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| "parse manifest")
    }

    fn save(&self, data_dir: &Path) -> Result<()> {
        let path = data_dir.join(MANIFEST_FILE);
        std::fs::write(&path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("write manifest {}", path.display()))
    }
}

/// What one build run produced.
#[derive(Debug)]
pub struct IndexSummary {
    pub records: usize,
    pub indexed_lexical: usize,
    pub indexed_semantic: usize,
    pub skipped_zero_vectors: usize,
    pub elapsed_ms: u128,
    pub index_path: PathBuf,
}

/// Build both indexes from `input` (extracted document JSON) into
/// `data_dir`.
pub fn run_index(
    input: &Path,
    data_dir: &Path,
    config: &Config,
    embedder: &dyn Embedder,
) -> Result<IndexSummary> {
    let started = Instant::now();
    let doc = Document::load(input)
        .with_context(|| format!("load document {}", input.display()))?;
    info!(pages = doc.page_count(), input = %input.display(), "document loaded");

    let records = CorpusBuilder::new(config.corpus_options()).build(&doc);
    if records.is_empty() {
        warn!("no records extracted, indexes will be empty");
    }

    std::fs::create_dir_all(data_dir)?;

    // Lexical generation: write to staging, promote by rename.
    let staging = staging_dir(data_dir);
    let mut writer = LexicalIndexWriter::create_in(&staging)?;
    for record in &records {
        writer.add_record(record)?;
    }
    writer.commit()?;
    let index_path = promote_staging(data_dir)?;
    info!(records = records.len(), path = %index_path.display(), "lexical index promoted");

    // Vector store: embed every record's source block, drop degraded
    // (all-zero) embeddings, persist as one JSON file.
    let texts: Vec<String> = records
        .iter()
        .map(|r| truncate_for_embedding(&r.raw_block))
        .collect();
    let text_refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let vectors = embedder
        .embed_batch(&text_refs)
        .map_err(|e| anyhow::anyhow!("embed corpus: {e}"))?;

    let mut store = InMemoryVectorStore::new(embedder.dimension());
    let outcome = store.add_entries(records.iter().zip(vectors).map(|(record, vector)| {
        (
            record.record_id.clone(),
            vector,
            record.raw_block.clone(),
            record.metadata(),
        )
    }))?;
    store.save(data_dir)?;
    if outcome.skipped_zero > 0 {
        warn!(
            skipped = outcome.skipped_zero,
            "records without usable embedding were left out of semantic search"
        );
    }

    BuildManifest {
        built_at: chrono::Utc::now(),
        source: input.to_path_buf(),
        embedder_id: embedder.id().to_string(),
        records: records.len(),
        indexed_semantic: outcome.added,
    }
    .save(data_dir)?;

    Ok(IndexSummary {
        records: records.len(),
        indexed_lexical: records.len(),
        indexed_semantic: outcome.added,
        skipped_zero_vectors: outcome.skipped_zero,
        elapsed_ms: started.elapsed().as_millis(),
        index_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Page;
    use crate::search::HashEmbedder;
    use crate::search::LexicalSearcher;
    use crate::search::vector::VectorStore;

    fn write_document(dir: &Path) -> PathBuf {
        let mut pages = vec![Page::default(); 31];
        pages[1].text = "Règles générales de codage PMSI, version consolidée.".to_string();
        pages.push(Page {
            text: "CHAPITRE I : Maladies infectieuses\nA41\nSepsis à staphylocoques\nÀ l'exclusion de : sepsis néonatal (P36.-)\n".to_string(),
            blocks: Vec::new(),
        });
        let doc = Document { pages };
        let path = dir.join("document.json");
        std::fs::write(&path, serde_json::to_string(&doc).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_run_index_builds_both_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_document(dir.path());
        let data_dir = dir.path().join("data");

        let summary = run_index(
            &input,
            &data_dir,
            &Config::default(),
            &HashEmbedder::default(),
        )
        .unwrap();

        assert!(summary.records >= 2);
        assert_eq!(summary.indexed_semantic, summary.records);

        let searcher = LexicalSearcher::open(&data_dir).unwrap();
        assert_eq!(searcher.query("sepsis", 5).unwrap()[0].code, "A41");

        let store = InMemoryVectorStore::load(&data_dir).unwrap();
        assert_eq!(store.count(), summary.records);
        assert!(store.get_by_field("code", "A41").unwrap().is_some());

        let manifest = BuildManifest::load(&data_dir).unwrap();
        assert_eq!(manifest.records, summary.records);
        assert_eq!(manifest.embedder_id, "fnv1a-384");
    }

    #[test]
    fn test_rebuild_replaces_previous_generation() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_document(dir.path());
        let data_dir = dir.path().join("data");
        let config = Config::default();
        let embedder = HashEmbedder::default();

        let first = run_index(&input, &data_dir, &config, &embedder).unwrap();
        let second = run_index(&input, &data_dir, &config, &embedder).unwrap();
        assert_eq!(first.records, second.records);

        let searcher = LexicalSearcher::open(&data_dir).unwrap();
        assert_eq!(searcher.query("sepsis", 5).unwrap().len(), 1);
    }
}
