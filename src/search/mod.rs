//! Retrieval stack: lexical BM25, semantic vectors, hybrid fusion, and
//! the best-effort rerank seam on top.
//!
//! Each layer is independently usable; [`hybrid::HybridRanker`] is the
//! entry point most callers want.

pub mod embedder;
pub mod hash_embedder;
pub mod hybrid;
pub mod lexical;
pub mod memory_store;
pub mod queryproc;
pub mod rerank;
pub mod vector;

pub use embedder::Embedder;
pub use hash_embedder::HashEmbedder;
pub use hybrid::{HybridRanker, RankWeights};
pub use lexical::{LexicalIndexWriter, LexicalSearcher};
pub use memory_store::InMemoryVectorStore;
pub use rerank::{RankedCode, Reranker};
pub use vector::{SemanticRetriever, VectorStore};
