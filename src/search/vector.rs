//! Vector store contract and the semantic retriever built on it.
//!
//! The persistent nearest-neighbor store is an external collaborator;
//! this crate talks to it through [`VectorStore`]. Distances are assumed
//! inversely related to similarity, converted as `1 - distance`. External
//! failures propagate to the caller — silently continuing would corrupt
//! the index or hide an outage.

use std::sync::Arc;

use anyhow::{Context, Result};

use super::embedder::Embedder;

/// One stored entry returned by a vector search or lookup.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VectorHit {
    pub id: String,
    pub text: String,
    pub metadata: serde_json::Value,
    /// Distance to the query vector; lower is closer.
    pub distance: f32,
}

/// Key-value + nearest-neighbor store contract.
pub trait VectorStore: Send + Sync {
    /// Insert or replace one entry.
    fn upsert(
        &mut self,
        id: &str,
        vector: Vec<f32>,
        text: &str,
        metadata: serde_json::Value,
    ) -> Result<()>;

    /// Nearest neighbors of `vector`, closest first.
    fn search(&self, vector: &[f32], k: usize) -> Result<Vec<VectorHit>>;

    /// First entry whose `field` equals `value` (`record_id` or a
    /// metadata field such as `code`).
    fn get_by_field(&self, field: &str, value: &str) -> Result<Option<VectorHit>>;

    fn count(&self) -> usize;
}

/// Semantic candidate with its similarity in `[0, 1]`-ish range.
#[derive(Debug, Clone)]
pub struct SemanticHit {
    pub id: String,
    pub text: String,
    pub metadata: serde_json::Value,
    pub similarity: f32,
}

/// Embeds a query and searches the vector store.
pub struct SemanticRetriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl SemanticRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Nearest records for a free-text query, best first.
    pub fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<SemanticHit>> {
        let query_vector = self
            .embedder
            .embed(query)
            .with_context(|| "embed query for semantic retrieval")?;
        let hits = self.store.search(&query_vector, top_k)?;
        Ok(hits
            .into_iter()
            .map(|hit| SemanticHit {
                id: hit.id,
                text: hit.text,
                metadata: hit.metadata,
                similarity: 1.0 - hit.distance,
            })
            .collect())
    }

    /// Direct lookup by stored field.
    pub fn get_by_field(&self, field: &str, value: &str) -> Result<Option<VectorHit>> {
        self.store.get_by_field(field, value)
    }
}
