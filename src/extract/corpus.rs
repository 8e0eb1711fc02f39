//! Corpus assembly over the whole document.
//!
//! Chapter inheritance forces document order, but only the chapter scan
//! needs it. A cheap sequential pre-pass computes the inherited chapter
//! for every page, then record extraction fans out across pages with
//! rayon; results are flattened back in page order so identifier
//! assignment stays deterministic.

use rayon::prelude::*;
use tracing::{debug, info};

use crate::model::{CodeRecord, Document, GENERAL_RULES_ID, RecordKind};

use super::page::PageExtractor;
use super::segment::detect_chapter;

/// Appended to the general-rules text when it exceeds its budget.
const TRUNCATION_MARKER: &str = "\n\n[Tronqué pour raisons de taille]";

/// Corpus build tunables.
#[derive(Debug, Clone)]
pub struct CorpusOptions {
    /// Last front-matter page (inclusive); code pages start after it.
    pub front_matter_end: usize,
    /// Character budget for the general-rules aggregate.
    pub general_rules_budget: usize,
    /// Pages with less trimmed text than this are non-content pages.
    pub min_page_chars: usize,
    /// Threshold for the positional fallback (see [`PageExtractor`]).
    pub fallback_anomaly_threshold: usize,
}

impl Default for CorpusOptions {
    fn default() -> Self {
        Self {
            front_matter_end: 30,
            general_rules_budget: 30_000,
            min_page_chars: 50,
            fallback_anomaly_threshold: 1,
        }
    }
}

/// Builds the full record set for one document.
#[derive(Debug, Clone, Default)]
pub struct CorpusBuilder {
    opts: CorpusOptions,
}

impl CorpusBuilder {
    pub fn new(opts: CorpusOptions) -> Self {
        Self { opts }
    }

    /// Build all records: the general-rules aggregate followed by every
    /// code record in page order, with globally unique identifiers.
    pub fn build(&self, doc: &Document) -> Vec<CodeRecord> {
        let mut records = Vec::new();
        if let Some(rules) = self.general_rules(doc) {
            records.push(rules);
        }

        let first_code_page = self.opts.front_matter_end + 1;
        let pages: Vec<usize> = (first_code_page..doc.page_count())
            .filter(|&i| doc.pages[i].text.trim().chars().count() >= self.opts.min_page_chars)
            .collect();

        // Sequential pre-pass: inherited chapter context per page.
        let mut inherited: Vec<Option<String>> = Vec::with_capacity(pages.len());
        let mut current: Option<String> = None;
        for &i in &pages {
            inherited.push(current.clone());
            if let Some(chapter) = detect_chapter(&doc.pages[i].text) {
                current = Some(chapter);
            }
        }

        let extractor = PageExtractor::new(self.opts.fallback_anomaly_threshold);
        let mut extracted: Vec<Vec<CodeRecord>> = pages
            .par_iter()
            .zip(inherited.par_iter())
            .map(|(&i, inherited)| {
                extractor
                    .extract(&doc.pages[i], i, inherited.as_deref())
                    .records
            })
            .collect();

        for page_records in extracted.drain(..) {
            records.extend(page_records);
        }

        assign_unique_ids(&mut records);

        info!(
            total = records.len(),
            pages = pages.len(),
            "corpus build complete"
        );
        records
    }

    /// The singleton front-matter aggregate, truncated to its budget.
    fn general_rules(&self, doc: &Document) -> Option<CodeRecord> {
        let last = self.opts.front_matter_end.min(doc.page_count().saturating_sub(1));
        let mut parts = Vec::new();
        for i in 1..=last {
            let text = doc.pages[i].text.trim();
            if !text.is_empty() {
                parts.push(format!("--- Page {i} ---\n{text}"));
            }
        }
        if parts.is_empty() {
            debug!("no front-matter text, skipping general rules record");
            return None;
        }

        let mut full_text = parts.join("\n\n");
        if full_text.chars().count() > self.opts.general_rules_budget {
            full_text = full_text
                .chars()
                .take(self.opts.general_rules_budget)
                .collect();
            full_text.push_str(TRUNCATION_MARKER);
        }

        Some(CodeRecord {
            record_id: GENERAL_RULES_ID.to_string(),
            kind: RecordKind::GeneralRules,
            code: String::new(),
            label: "Règles générales de codage".to_string(),
            chapter: None,
            priority: Some("critical".to_string()),
            exclusions: Vec::new(),
            inclusions: Vec::new(),
            coding_instructions: Vec::new(),
            notes: Vec::new(),
            mentioned_codes: Vec::new(),
            source_page: 1,
            raw_block: full_text,
        })
    }
}

/// Make record identifiers globally unique. The `(code, page, position)`
/// triple can collide when the fallback path emits the same code twice in
/// one layout block; collisions get an incrementing suffix instead of
/// overwriting, so no record is silently lost.
fn assign_unique_ids(records: &mut [CodeRecord]) {
    let mut seen = std::collections::HashSet::new();
    for record in records {
        if seen.insert(record.record_id.clone()) {
            continue;
        }
        let base = record.record_id.clone();
        let mut counter = 1;
        loop {
            let candidate = format!("{base}_{counter}");
            if seen.insert(candidate.clone()) {
                record.record_id = candidate;
                break;
            }
            counter += 1;
        }
    }
}
