//! In-process vector store with JSON persistence.
//!
//! Brute-force cosine scan. Plenty for a corpus of a few thousand manual
//! records; a real ANN backend plugs in behind the same [`VectorStore`]
//! trait when scale demands it.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::embedder::is_zero_vector;
use super::vector::{VectorHit, VectorStore};

const STORE_FILE: &str = "vector_store.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    id: String,
    vector: Vec<f32>,
    text: String,
    metadata: serde_json::Value,
}

/// Brute-force cosine store.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct InMemoryVectorStore {
    dimension: usize,
    entries: Vec<Entry>,
    #[serde(skip)]
    by_id: HashMap<String, usize>,
}

/// Outcome counters for a bulk insert.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AddOutcome {
    pub added: usize,
    /// Entries dropped because their embedding was all-zero (degraded
    /// upstream state, never valid signal).
    pub skipped_zero: usize,
    /// Entries whose id collided and was suffixed.
    pub renamed: usize,
}

impl InMemoryVectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: Vec::new(),
            by_id: HashMap::new(),
        }
    }

    pub fn store_path(data_dir: &Path) -> std::path::PathBuf {
        data_dir.join(STORE_FILE)
    }

    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = Self::store_path(data_dir);
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("read vector store {}", path.display()))?;
        let mut store: Self =
            serde_json::from_str(&raw).with_context(|| "parse vector store")?;
        store.by_id = store
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.clone(), i))
            .collect();
        debug!(entries = store.entries.len(), "vector store loaded");
        Ok(store)
    }

    pub fn save(&self, data_dir: &Path) -> Result<()> {
        fs::create_dir_all(data_dir)?;
        let path = Self::store_path(data_dir);
        let raw = serde_json::to_string(self)?;
        fs::write(&path, raw).with_context(|| format!("write vector store {}", path.display()))?;
        info!(entries = self.entries.len(), path = %path.display(), "vector store saved");
        Ok(())
    }

    /// Bulk insert with the build-time hygiene rules: all-zero embeddings
    /// are dropped, duplicate ids get an incrementing suffix instead of
    /// overwriting.
    pub fn add_entries(
        &mut self,
        entries: impl IntoIterator<Item = (String, Vec<f32>, String, serde_json::Value)>,
    ) -> Result<AddOutcome> {
        let mut outcome = AddOutcome::default();
        for (id, vector, text, metadata) in entries {
            if is_zero_vector(&vector) {
                outcome.skipped_zero += 1;
                continue;
            }
            if vector.len() != self.dimension {
                bail!(
                    "vector dimension mismatch for {id}: expected {}, got {}",
                    self.dimension,
                    vector.len()
                );
            }

            let mut unique_id = id.clone();
            let mut counter = 1;
            while self.by_id.contains_key(&unique_id) {
                unique_id = format!("{id}_{counter}");
                counter += 1;
            }
            if unique_id != id {
                outcome.renamed += 1;
            }

            self.by_id.insert(unique_id.clone(), self.entries.len());
            self.entries.push(Entry {
                id: unique_id,
                vector,
                text,
                metadata,
            });
            outcome.added += 1;
        }
        Ok(outcome)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

impl VectorStore for InMemoryVectorStore {
    fn upsert(
        &mut self,
        id: &str,
        vector: Vec<f32>,
        text: &str,
        metadata: serde_json::Value,
    ) -> Result<()> {
        if vector.len() != self.dimension {
            bail!(
                "vector dimension mismatch for {id}: expected {}, got {}",
                self.dimension,
                vector.len()
            );
        }
        match self.by_id.get(id) {
            Some(&idx) => {
                self.entries[idx] = Entry {
                    id: id.to_string(),
                    vector,
                    text: text.to_string(),
                    metadata,
                };
            }
            None => {
                self.by_id.insert(id.to_string(), self.entries.len());
                self.entries.push(Entry {
                    id: id.to_string(),
                    vector,
                    text: text.to_string(),
                    metadata,
                });
            }
        }
        Ok(())
    }

    fn search(&self, vector: &[f32], k: usize) -> Result<Vec<VectorHit>> {
        let mut scored: Vec<(f32, &Entry)> = self
            .entries
            .iter()
            .map(|entry| (cosine_similarity(&entry.vector, vector), entry))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored
            .into_iter()
            .take(k)
            .map(|(similarity, entry)| VectorHit {
                id: entry.id.clone(),
                text: entry.text.clone(),
                metadata: entry.metadata.clone(),
                distance: 1.0 - similarity,
            })
            .collect())
    }

    fn get_by_field(&self, field: &str, value: &str) -> Result<Option<VectorHit>> {
        let found = self.entries.iter().find(|entry| {
            if field == "record_id" {
                entry.id == value
            } else {
                entry
                    .metadata
                    .get(field)
                    .and_then(|v| v.as_str())
                    .is_some_and(|v| v == value)
            }
        });
        Ok(found.map(|entry| VectorHit {
            id: entry.id.clone(),
            text: entry.text.clone(),
            metadata: entry.metadata.clone(),
            distance: 0.0,
        }))
    }

    fn count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(id: &str, vector: Vec<f32>) -> (String, Vec<f32>, String, serde_json::Value) {
        (id.to_string(), vector, format!("text for {id}"), json!({ "code": id }))
    }

    #[test]
    fn test_add_skips_zero_vectors() {
        let mut store = InMemoryVectorStore::new(3);
        let outcome = store
            .add_entries(vec![
                entry("a", vec![1.0, 0.0, 0.0]),
                entry("b", vec![0.0, 0.0, 0.0]),
            ])
            .unwrap();
        assert_eq!(outcome.added, 1);
        assert_eq!(outcome.skipped_zero, 1);
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_add_suffixes_duplicate_ids() {
        let mut store = InMemoryVectorStore::new(2);
        let outcome = store
            .add_entries(vec![
                entry("dup", vec![1.0, 0.0]),
                entry("dup", vec![0.0, 1.0]),
            ])
            .unwrap();
        assert_eq!(outcome.renamed, 1);
        assert!(store.get_by_field("record_id", "dup").unwrap().is_some());
        assert!(store.get_by_field("record_id", "dup_1").unwrap().is_some());
    }

    #[test]
    fn test_search_orders_by_similarity() {
        let mut store = InMemoryVectorStore::new(2);
        store
            .add_entries(vec![
                entry("x", vec![1.0, 0.0]),
                entry("y", vec![0.0, 1.0]),
                entry("mid", vec![1.0, 1.0]),
            ])
            .unwrap();

        let hits = store.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].id, "x");
        assert_eq!(hits[1].id, "mid");
        assert!(hits[0].distance < hits[1].distance);
    }

    #[test]
    fn test_get_by_metadata_field() {
        let mut store = InMemoryVectorStore::new(2);
        store.add_entries(vec![entry("A41", vec![1.0, 0.0])]).unwrap();
        let hit = store.get_by_field("code", "A41").unwrap().unwrap();
        assert_eq!(hit.id, "A41");
        assert!(store.get_by_field("code", "Z99").unwrap().is_none());
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut store = InMemoryVectorStore::new(3);
        assert!(store.add_entries(vec![entry("a", vec![1.0])]).is_err());
    }

    #[test]
    fn test_upsert_inserts_then_replaces() {
        let mut store = InMemoryVectorStore::new(2);
        store
            .upsert("a", vec![1.0, 0.0], "first", json!({ "code": "A41" }))
            .unwrap();
        assert_eq!(store.count(), 1);

        store
            .upsert("a", vec![0.0, 1.0], "second", json!({ "code": "A41.0" }))
            .unwrap();
        assert_eq!(store.count(), 1);

        let hit = store.get_by_field("record_id", "a").unwrap().unwrap();
        assert_eq!(hit.text, "second");
        assert_eq!(hit.metadata["code"], "A41.0");
        // The stored vector was replaced too.
        assert_eq!(store.search(&[0.0, 1.0], 1).unwrap()[0].distance, 0.0);
    }

    #[test]
    fn test_upsert_rejects_dimension_mismatch() {
        let mut store = InMemoryVectorStore::new(3);
        assert!(store.upsert("a", vec![1.0], "text", json!({})).is_err());
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = InMemoryVectorStore::new(2);
        store
            .add_entries(vec![entry("a", vec![1.0, 0.0]), entry("b", vec![0.0, 1.0])])
            .unwrap();
        store.save(dir.path()).unwrap();

        let loaded = InMemoryVectorStore::load(dir.path()).unwrap();
        assert_eq!(loaded.count(), 2);
        let hits = loaded.search(&[0.0, 1.0], 1).unwrap();
        assert_eq!(hits[0].id, "b");
    }
}
