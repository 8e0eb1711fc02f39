//! Document-to-record extraction engine.
//!
//! Layered heuristics over a layout-oriented text stream: [`segment`]
//! finds structural anchors, [`page`] groups lines into record blocks
//! (with a positional fallback), [`fields`] fills the structured fields,
//! and [`corpus`] assembles the full record set for a document.

pub mod corpus;
pub mod fields;
pub mod page;
pub mod segment;

pub use corpus::{CorpusBuilder, CorpusOptions};
pub use page::{PageExtraction, PageExtractor};
