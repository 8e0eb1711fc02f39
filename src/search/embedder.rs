//! Embedder trait for semantic retrieval.
//!
//! Real embedding backends (API or local model) live outside this crate;
//! the core consumes them through this trait. Determinism for identical
//! text and model version is part of the contract. An all-zero vector is
//! the defined degraded state for a failed upstream embedding and must be
//! excluded from indexing.

/// Texts longer than this are truncated before embedding.
pub const MAX_EMBED_CHARS: usize = 30_000;

/// Marker appended to texts truncated for embedding.
pub const EMBED_TRUNCATION_MARKER: &str = "...[truncated]";

/// Errors from embedding backends.
#[derive(Debug, thiserror::Error)]
pub enum EmbedderError {
    #[error("embedding backend unavailable: {0}")]
    Unavailable(String),

    #[error("embedding failed: {0}")]
    Failed(String),
}

pub type EmbedderResult<T> = Result<T, EmbedderError>;

/// A text-to-vector encoder.
pub trait Embedder: Send + Sync {
    /// Stable identifier (model name + revision) of this embedder.
    fn id(&self) -> &str;

    /// Output dimension; every returned vector has exactly this length.
    fn dimension(&self) -> usize;

    /// Embed one text. Deterministic for identical input.
    fn embed(&self, text: &str) -> EmbedderResult<Vec<f32>>;

    /// Embed a batch, truncating oversized texts first. The default
    /// implementation loops `embed`; backends with a batch API override.
    fn embed_batch(&self, texts: &[&str]) -> EmbedderResult<Vec<Vec<f32>>> {
        texts
            .iter()
            .map(|text| self.embed(&truncate_for_embedding(text)))
            .collect()
    }
}

/// Truncate a text to the embedding budget, marking the cut.
pub fn truncate_for_embedding(text: &str) -> String {
    if text.chars().count() <= MAX_EMBED_CHARS {
        return text.to_string();
    }
    let mut out: String = text.chars().take(MAX_EMBED_CHARS).collect();
    out.push_str(EMBED_TRUNCATION_MARKER);
    out
}

/// Whether a vector is the degraded all-zero state.
pub fn is_zero_vector(vector: &[f32]) -> bool {
    vector.iter().all(|&v| v == 0.0)
}
