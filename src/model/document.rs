//! Source-document model.
//!
//! The manual reaches this crate as a sequence of pages of already-extracted
//! text (the PDF/text extraction itself is an upstream concern). Pages are
//! 0-based and contiguous. Each page optionally carries the layout blocks
//! reported by the upstream extractor; the positional fallback path uses
//! them when line-based segmentation looks unreliable.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One layout block with its page position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpatialBlock {
    pub x: f32,
    pub y: f32,
    pub text: String,
}

/// One page of the source document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Page {
    /// Flowed text in reading order.
    pub text: String,
    /// Layout blocks, if the upstream extractor reported them.
    #[serde(default)]
    pub blocks: Vec<SpatialBlock>,
}

/// The full source document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    pub pages: Vec<Page>,
}

impl Document {
    /// Load a document from its JSON serialization.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read document {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse document {}", path.display()))
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}
