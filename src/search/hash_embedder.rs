//! FNV-1a feature-hashing embedder.
//!
//! Deterministic, model-free fallback: each lowercased word token is
//! hashed into one of `dimension` buckets with an alternating sign, and
//! the resulting vector is L2-normalized. Not a semantic model — it gives
//! the binary a working end-to-end path (and the tests a deterministic
//! one) when no real embedding backend is wired in.

use super::embedder::{Embedder, EmbedderResult};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Default output dimension, matching common small sentence encoders.
pub const HASH_EMBEDDER_DIMENSION: usize = 384;

#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self {
            dimension: HASH_EMBEDDER_DIMENSION,
        }
    }
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

impl Embedder for HashEmbedder {
    fn id(&self) -> &str {
        "fnv1a-384"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> EmbedderResult<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimension as u64) as usize;
            // Second hash bit decides the sign so collisions partially cancel.
            let sign = if (hash >> 32) & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}
