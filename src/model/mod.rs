pub mod document;
pub mod types;

pub use document::{Document, Page, SpatialBlock};
pub use types::{
    CodeRecord, CodeSuggestion, GENERAL_RULES_ID, QueryResult, RecordKind, ScoredCandidate,
    UNLABELED,
};
