//! Page-level record extraction.
//!
//! Primary strategy: a finite-state scan over classified lines, one
//! accumulator, one flush per record-start transition. When the page's
//! priority-marker count substantially exceeds the number of blocks the
//! scan produced, the line segmentation is considered unreliable (mid-page
//! reflow) and a positional second pass over the layout blocks takes over,
//! trading precision for recovery coverage.

use tracing::{debug, warn};

use crate::model::{CodeRecord, Page, RecordKind, UNLABELED};

use super::fields;
use super::segment::{
    self, CODE_INLINE, LineClass, PRA_MARKER, classify_line, detect_chapter, is_valid_code,
    normalize_code,
};

/// Characters of context kept before/after a code occurrence when the
/// positional fallback synthesizes a block.
const FALLBACK_WINDOW_BEFORE: usize = 300;
const FALLBACK_WINDOW_AFTER: usize = 600;

/// Result of extracting one page.
#[derive(Debug, Default)]
pub struct PageExtraction {
    pub records: Vec<CodeRecord>,
    /// Chapter heading found on this page, if any. The caller threads it
    /// forward to later pages.
    pub detected_chapter: Option<String>,
}

/// A contiguous text span hypothesized to hold one record.
#[derive(Debug)]
struct RawBlock {
    code_token: String,
    text: String,
    /// Line index (primary path) or block y position (fallback path);
    /// provenance only, also disambiguates record identifiers.
    position: usize,
}

/// Scanner state: either no record is open, or one accumulator is.
enum ScanState {
    NoRecord,
    InRecord {
        code_token: String,
        lines: Vec<String>,
        start_line: usize,
    },
}

impl ScanState {
    fn flush_into(self, blocks: &mut Vec<RawBlock>) {
        if let ScanState::InRecord {
            code_token,
            lines,
            start_line,
        } = self
        {
            blocks.push(RawBlock {
                code_token,
                text: lines.join("\n"),
                position: start_line,
            });
        }
    }
}

/// Page extractor with its tunable anomaly threshold.
#[derive(Debug, Clone)]
pub struct PageExtractor {
    /// Fallback triggers when `marker_count > blocks + threshold`.
    pub anomaly_threshold: usize,
}

impl Default for PageExtractor {
    fn default() -> Self {
        Self {
            anomaly_threshold: 1,
        }
    }
}

impl PageExtractor {
    pub fn new(anomaly_threshold: usize) -> Self {
        Self { anomaly_threshold }
    }

    /// Extract all records from one page. Never fails: malformed input
    /// degrades to fewer or weaker fields.
    pub fn extract(
        &self,
        page: &Page,
        page_num: usize,
        inherited_chapter: Option<&str>,
    ) -> PageExtraction {
        let detected_chapter = detect_chapter(&page.text);
        let chapter = detected_chapter
            .as_deref()
            .or(inherited_chapter)
            .map(str::to_string);

        let mut blocks = scan_lines(&page.text);

        let marker_count = PRA_MARKER.find_iter(&page.text).count();
        if marker_count > blocks.len() + self.anomaly_threshold {
            let fallback = positional_blocks(page);
            if !fallback.is_empty() {
                warn!(
                    page = page_num,
                    markers = marker_count,
                    primary_blocks = blocks.len(),
                    fallback_blocks = fallback.len(),
                    "line segmentation unreliable, using positional fallback"
                );
                blocks = fallback;
            }
        }

        let records = blocks
            .into_iter()
            .filter_map(|block| build_record(block, page_num, chapter.clone()))
            .collect();

        PageExtraction {
            records,
            detected_chapter,
        }
    }
}

/// Primary strategy: line scan with an explicit two-state machine.
fn scan_lines(text: &str) -> Vec<RawBlock> {
    let mut blocks = Vec::new();
    let mut state = ScanState::NoRecord;

    for (i, line) in text.lines().enumerate() {
        match classify_line(line) {
            LineClass::RecordStart(code) | LineClass::PriorityRecordStart(code) => {
                std::mem::replace(
                    &mut state,
                    ScanState::InRecord {
                        code_token: code,
                        lines: vec![line.to_string()],
                        start_line: i,
                    },
                )
                .flush_into(&mut blocks);
            }
            LineClass::Text => match &mut state {
                ScanState::InRecord { lines, .. } => lines.push(line.to_string()),
                ScanState::NoRecord => {
                    // Malformed layout: a record header merged into prose.
                    if let Some(caps) = CODE_INLINE.captures(line) {
                        state = ScanState::InRecord {
                            code_token: caps[1].to_string(),
                            lines: vec![line.to_string()],
                            start_line: i,
                        };
                    }
                }
            },
        }
    }

    state.flush_into(&mut blocks);
    blocks
}

/// Fallback strategy: walk layout blocks in reading order (top-to-bottom,
/// then left-to-right) and cut a fixed character window around every code
/// occurrence.
fn positional_blocks(page: &Page) -> Vec<RawBlock> {
    let mut sorted: Vec<_> = page.blocks.iter().collect();
    sorted.sort_by(|a, b| {
        (a.y, a.x)
            .partial_cmp(&(b.y, b.x))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut out = Vec::new();
    for spatial in sorted {
        let text = spatial.text.trim();
        if text.is_empty() {
            continue;
        }
        for m in CODE_INLINE.find_iter(text) {
            out.push(RawBlock {
                code_token: m.as_str().to_string(),
                text: char_window(text, m.start(), FALLBACK_WINDOW_BEFORE, FALLBACK_WINDOW_AFTER)
                    .to_string(),
                position: spatial.y.max(0.0) as usize,
            });
        }
    }
    debug!(blocks = out.len(), "positional fallback produced blocks");
    out
}

/// Slice `text` to `before` chars ahead of `at` (a byte offset on a char
/// boundary) and `after` chars past it.
fn char_window(text: &str, at: usize, before: usize, after: usize) -> &str {
    let start = text[..at]
        .char_indices()
        .rev()
        .nth(before.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let end = text[at..]
        .char_indices()
        .nth(after)
        .map(|(i, _)| at + i)
        .unwrap_or(text.len());
    &text[start..end]
}

/// Independent field extraction over one finished block. Absence of any
/// field is not an error; every field has a defined default.
fn build_record(block: RawBlock, page_num: usize, chapter: Option<String>) -> Option<CodeRecord> {
    let code = normalize_code(&block.code_token);
    if !is_valid_code(&code) {
        return None;
    }

    let label = fields::extract_label(&block.text).unwrap_or_else(|| UNLABELED.to_string());
    let priority = fields::extract_priority(&block.text);
    let exclusions = fields::extract_exclusions(&block.text);
    let inclusions = fields::extract_inclusions(&block.text);
    let coding_instructions = fields::extract_instructions(&block.text);
    let notes = fields::extract_notes(&block.text);
    let mentioned_codes = segment::mentioned_codes(&block.text);

    Some(CodeRecord {
        record_id: format!("code_{code}_{page_num}_{}", block.position),
        kind: RecordKind::CodeDefinition,
        code,
        label,
        chapter,
        priority,
        exclusions,
        inclusions,
        coding_instructions,
        notes,
        mentioned_codes,
        source_page: page_num,
        raw_block: block.text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SpatialBlock;

    fn page(text: &str) -> Page {
        Page {
            text: text.to_string(),
            blocks: Vec::new(),
        }
    }

    #[test]
    fn test_basic_record_with_exclusion() {
        let p = page("A41\nSepsis à staphylocoques\nÀ l'exclusion de : sepsis néonatal (P36.-)\n");
        let out = PageExtractor::default().extract(&p, 42, None);

        assert_eq!(out.records.len(), 1);
        let rec = &out.records[0];
        assert_eq!(rec.code, "A41");
        assert_eq!(rec.label, "Sepsis à staphylocoques");
        assert!(rec.exclusions.iter().any(|e| e.contains("P36.-")));
        assert_eq!(rec.source_page, 42);
    }

    #[test]
    fn test_back_to_back_record_starts_flush_empty_body() {
        let p = page("A41\nA42\nMycétome actinomycosique\n");
        let out = PageExtractor::default().extract(&p, 0, None);

        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0].code, "A41");
        assert_eq!(out.records[0].label, UNLABELED);
        assert_eq!(out.records[1].code, "A42");
        assert_eq!(out.records[1].label, "Mycétome actinomycosique");
    }

    #[test]
    fn test_inline_code_opens_record_when_none_open() {
        let p = page("texte préliminaire sans code\nvoir J18.9 Pneumonie, sans précision\nsuite du bloc\n");
        let out = PageExtractor::default().extract(&p, 3, None);

        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].code, "J18.9");
        assert!(out.records[0].raw_block.contains("suite du bloc"));
    }

    #[test]
    fn test_chapter_detection_and_inheritance() {
        let p = page("CHAPITRE I : Maladies infectieuses\nA41\nSepsis à staphylocoques\n");
        let out = PageExtractor::default().extract(&p, 31, None);
        assert_eq!(
            out.detected_chapter.as_deref(),
            Some("CHAPITRE I : Maladies infectieuses")
        );
        assert_eq!(
            out.records[0].chapter.as_deref(),
            Some("CHAPITRE I : Maladies infectieuses")
        );

        // No heading on this page: the inherited context applies.
        let p2 = page("A42\nMycétome actinomycosique\n");
        let out2 = PageExtractor::default().extract(&p2, 32, Some("CHAPITRE I : Maladies infectieuses"));
        assert!(out2.detected_chapter.is_none());
        assert_eq!(
            out2.records[0].chapter.as_deref(),
            Some("CHAPITRE I : Maladies infectieuses")
        );
    }

    #[test]
    fn test_blocklisted_tokens_never_become_records() {
        let p = page("A41\nSepsis, bactériémie SAI et NCA\n");
        let out = PageExtractor::default().extract(&p, 0, None);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].code, "A41");
    }

    #[test]
    fn test_fallback_triggers_on_marker_anomaly() {
        // Three P R A markers reflowed onto one line: the line scan only
        // sees one record start.
        let text = "P R A 1 J15.0 pneumonie, P R A 2 K52.9 colite, P R A 3 fin\n";
        let p = Page {
            text: text.to_string(),
            blocks: vec![
                SpatialBlock {
                    x: 10.0,
                    y: 100.0,
                    text: "J15.0 Pneumonie due à Klebsiella pneumoniae".into(),
                },
                SpatialBlock {
                    x: 10.0,
                    y: 200.0,
                    text: "K52.9 Gastroentérite et colite non infectieuses".into(),
                },
            ],
        };
        // The primary scan opens one merged record from the first inline
        // code; three markers vs one block exceeds the threshold.
        let out = PageExtractor::new(1).extract(&p, 7, None);
        let codes: Vec<&str> = out.records.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["J15.0", "K52.9"]);
    }

    #[test]
    fn test_fallback_window_bounds() {
        let text = format!("{}A41 au milieu{}", "a".repeat(500), "b".repeat(900));
        let window = char_window(&text, 500, 300, 600);
        assert_eq!(window.chars().count(), 900);
        assert!(window.starts_with('a'));
        assert!(window.contains("A41"));
    }

    #[test]
    fn test_priority_start_line_opens_record() {
        let p = page("P R A 4 J18.9\nPneumonie, sans précision\n");
        let out = PageExtractor::default().extract(&p, 0, None);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].code, "J18.9");
        assert_eq!(out.records[0].priority.as_deref(), Some("4"));
        assert_eq!(out.records[0].label.as_str(), "Pneumonie, sans précision");
    }
}
