//! Normalized entity structs.

use serde::{Deserialize, Serialize};

/// Label used when no usable label line is found in a record block.
pub const UNLABELED: &str = "[Voir document]";

/// Record identifier of the singleton general-rules aggregate.
pub const GENERAL_RULES_ID: &str = "general_rules_001";

/// Kind tag for stored records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RecordKind {
    /// One structured entry for a classification code.
    CodeDefinition,
    /// The front-matter aggregate (coding rules, pages 1-30).
    GeneralRules,
}

/// One normalized record extracted from the manual.
///
/// Both engines index `raw_block`; the structured fields are carried as
/// metadata for display, rerank context, and lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeRecord {
    /// Globally unique identifier (`code_{code}_{page}_{line}` with a
    /// `_{n}` suffix on collision, or [`GENERAL_RULES_ID`]).
    pub record_id: String,
    pub kind: RecordKind,
    /// Short alphanumeric code, letter + 2 digits + optional `.digit`
    /// (e.g. `A41.0`). Empty only for the general-rules record.
    pub code: String,
    /// Human-readable description; [`UNLABELED`] when extraction fails.
    pub label: String,
    /// Most recent chapter heading above the record in document order.
    pub chapter: Option<String>,
    /// Classification tag from the `P R A` marker sequence.
    pub priority: Option<String>,
    pub exclusions: Vec<String>,
    pub inclusions: Vec<String>,
    pub coding_instructions: Vec<String>,
    pub notes: Vec<String>,
    /// Every valid code token mentioned anywhere in the block.
    pub mentioned_codes: Vec<String>,
    /// Page of origin (0-based), provenance only.
    pub source_page: usize,
    /// Untouched source text of the record block.
    pub raw_block: String,
}

impl CodeRecord {
    /// Rendered summary of the structured fields, used as rerank context
    /// and for human-facing display.
    pub fn rendered(&self) -> String {
        let mut parts = vec![
            format!("Code: {}", self.code),
            format!("Libellé: {}", self.label),
        ];
        if let Some(chapter) = &self.chapter {
            parts.push(format!("Chapitre: {chapter}"));
        }
        if !self.exclusions.is_empty() {
            parts.push("À l'exclusion de:".to_string());
            parts.extend(self.exclusions.iter().map(|e| format!("  • {e}")));
        }
        if !self.inclusions.is_empty() {
            parts.push("Comprend:".to_string());
            parts.extend(self.inclusions.iter().map(|i| format!("  • {i}")));
        }
        if !self.coding_instructions.is_empty() {
            parts.push("Instructions de codage:".to_string());
            parts.extend(self.coding_instructions.iter().map(|i| format!("  • {i}")));
        }
        if !self.notes.is_empty() {
            parts.push("Notes:".to_string());
            parts.extend(self.notes.iter().map(|n| format!("  • {n}")));
        }
        parts.join("\n")
    }

    /// Metadata object stored alongside the indexed text. Carries the
    /// rendered summary so query-time consumers (rerank context, lookup
    /// display) get the structured view without re-parsing the block.
    pub fn metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "kind": self.kind,
            "code": self.code,
            "label": self.label,
            "chapter": self.chapter,
            "priority": self.priority,
            "page": self.source_page,
            "has_exclusions": !self.exclusions.is_empty(),
            "has_inclusions": !self.inclusions.is_empty(),
            "has_instructions": !self.coding_instructions.is_empty(),
            "mentioned_codes": self.mentioned_codes,
            "summary": self.rendered(),
        })
    }
}

/// Query-scoped candidate: a stored record reference plus the scores it
/// accumulated during retrieval. Discarded after the response.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredCandidate {
    pub record_id: String,
    /// Code of the underlying record (empty for general rules).
    pub code: String,
    /// Indexed text of the record.
    pub text: String,
    pub metadata: serde_json::Value,
    /// Normalized lexical signal, when the lexical list produced one.
    pub lexical_score: Option<f32>,
    /// Normalized semantic signal, when the semantic list produced one.
    pub semantic_score: Option<f32>,
    /// Weighted fusion of the normalized signals.
    pub hybrid_score: f32,
    /// Reranker score, set only when re-ranking succeeded.
    pub rerank_score: Option<f32>,
}

/// One suggested code in a query response.
#[derive(Debug, Clone, Serialize)]
pub struct CodeSuggestion {
    pub code: String,
    pub label: String,
    pub relevance_score: f32,
    pub explanation: String,
    pub exclusions: Vec<String>,
    pub inclusions: Vec<String>,
    pub coding_instructions: Vec<String>,
    pub chapter: Option<String>,
    pub priority: Option<String>,
    pub source_records: Vec<String>,
}

/// Full response for one free-text query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub query: String,
    pub suggestions: Vec<CodeSuggestion>,
    pub processing_time_ms: f64,
    pub retrieval_metadata: serde_json::Value,
}
