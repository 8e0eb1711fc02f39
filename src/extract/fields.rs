//! Per-field extraction from a record block.
//!
//! Every extractor here is independent and infallible: it returns an
//! explicit `Option`/`Vec` and the caller applies the documented default.
//! Missing fields are expected, not errors — the manual's layout drops
//! and reflows sections freely.

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;

use super::segment::{PRA_INLINE_DIGIT, SECTION_KEYWORD};

/// Priority value when the `P R A` marker is present without its digit.
pub const PRIORITY_UNSPECIFIED: &str = "unspecified";

const MAX_EXCLUSIONS: usize = 50;
const MAX_INCLUSIONS: usize = 20;
const MAX_INSTRUCTIONS: usize = 10;
const MAX_NOTE_CHARS: usize = 500;

/// Minimum entry length for exclusion/inclusion items; anything shorter is
/// layout noise.
const MIN_ITEM_CHARS: usize = 6;

static EXCLUSION_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)À\s*l['’′]?exclusion(?:\s+de)?").expect("exclusion marker"));

static BULLET_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[•●·-]\s*([^\n]+)").expect("bullet regex"));

static CODE_REF_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([^•●·\n]{3,}?\([A-Z]\d{2}[^\)]*\))").expect("code ref regex"));

static EXCLUSION_STOPS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\nComprend",
        r"(?i)\nNote",
        r"(?i)\nUtiliser",
        r"\n\n\n",
        r"\n[A-Z]\d{2}\.?\d?\s+[A-Z]",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("exclusion stop regex"))
    .collect()
});

static INSTRUCTION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)Utiliser[^.]*\.?",
        r"(?i)Coder\s+(?:en\s+)?(?:premier|également|aussi)[^.]*\.?",
        r"(?i)Ne\s+pas\s+coder[^.]*\.?",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("instruction regex"))
    .collect()
});

static NOTE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Note\s*[:：]?\s*").expect("note marker"));

/// First usable line after the header: not blank, not a bare structural
/// token, not the start of a section.
pub fn extract_label(block: &str) -> Option<String> {
    for line in block.lines().skip(1) {
        let stripped = line.trim();
        if stripped.is_empty() {
            continue;
        }
        if matches!(stripped, "P" | "R" | "A") {
            continue;
        }
        if !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if SECTION_KEYWORD.is_match(stripped) {
            break;
        }
        if stripped.chars().count() > 3 {
            return Some(stripped.to_string());
        }
    }
    None
}

/// Priority digit from the `P R A` marker, either as three consecutive
/// single-letter lines followed by a digit line, or inline. A marker with
/// no digit yields [`PRIORITY_UNSPECIFIED`].
pub fn extract_priority(block: &str) -> Option<String> {
    let lines: Vec<&str> = block.lines().collect();
    for (i, window) in lines.windows(3).enumerate() {
        if window[0].trim() == "P" && window[1].trim() == "R" && window[2].trim() == "A" {
            let next = lines.get(i + 3).map(|l| l.trim()).unwrap_or("");
            if !next.is_empty() && next.chars().all(|c| c.is_ascii_digit()) {
                return Some(next.to_string());
            }
            return Some(PRIORITY_UNSPECIFIED.to_string());
        }
    }
    PRA_INLINE_DIGIT
        .captures(block)
        .map(|caps| caps[1].to_string())
}

/// Span of text from a marker match up to the earliest stop pattern.
fn span_after<'a>(text: &'a str, marker_end: usize, stops: &[Regex]) -> &'a str {
    let after = &text[marker_end..];
    let mut end = after.len();
    for stop in stops {
        if let Some(m) = stop.find(after)
            && m.start() < end
        {
            end = m.start();
        }
    }
    &after[..end]
}

/// Case-insensitive dedup, minimum-length filter, and cap — shared shape
/// of every list field.
fn clean_items(items: Vec<String>, min_chars: usize, cap: usize) -> Vec<String> {
    items
        .into_iter()
        .map(|item| item.trim().trim_start_matches([':', '：']).trim().to_string())
        .filter(|item| item.chars().count() >= min_chars)
        .unique_by(|item| item.to_lowercase())
        .take(cap)
        .collect()
}

/// Exclusion entries introduced by "À l'exclusion (de)".
pub fn extract_exclusions(block: &str) -> Vec<String> {
    let Some(marker) = EXCLUSION_MARKER.find(block) else {
        return Vec::new();
    };
    let span = span_after(block, marker.end(), &EXCLUSION_STOPS);

    let mut items = Vec::new();
    // The text immediately after the marker is an implicit first entry.
    let first_line = span
        .lines()
        .next()
        .unwrap_or("")
        .trim()
        .trim_start_matches([':', '：'])
        .trim();
    if first_line.chars().count() >= MIN_ITEM_CHARS {
        items.push(first_line.to_string());
    }
    for caps in BULLET_ITEM.captures_iter(span) {
        items.push(caps[1].to_string());
    }
    for caps in CODE_REF_ITEM.captures_iter(span) {
        items.push(caps[1].to_string());
    }

    clean_items(items, MIN_ITEM_CHARS, MAX_EXCLUSIONS)
}

static INCLUSION_STOPS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\nÀ\s*l['’′]?exclusion",
        r"(?i)\nNote",
        r"(?i)\nUtiliser",
        r"\n\n\n",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("inclusion stop regex"))
    .collect()
});

static INCLUSION_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Comprend\s*[:：]?\s*").expect("inclusion marker"));

/// Inclusion entries introduced by "Comprend".
pub fn extract_inclusions(block: &str) -> Vec<String> {
    let Some(marker) = INCLUSION_MARKER.find(block) else {
        return Vec::new();
    };
    let span = span_after(block, marker.end(), &INCLUSION_STOPS);

    let mut items = Vec::new();
    let first_line = span.lines().next().unwrap_or("").trim();
    if !first_line.is_empty() {
        items.push(first_line.to_string());
    }
    for caps in BULLET_ITEM.captures_iter(span) {
        items.push(caps[1].to_string());
    }

    clean_items(items, MIN_ITEM_CHARS, MAX_INCLUSIONS)
}

/// Directive sentences: usage, primary-coding, and do-not-code phrases.
pub fn extract_instructions(block: &str) -> Vec<String> {
    let mut items = Vec::new();
    for pattern in INSTRUCTION_PATTERNS.iter() {
        for m in pattern.find_iter(block) {
            items.push(m.as_str().to_string());
        }
    }
    clean_items(items, 11, MAX_INSTRUCTIONS)
}

/// Free-text note following a "Note" marker, up to the next blank
/// paragraph, truncated to 500 characters.
pub fn extract_notes(block: &str) -> Vec<String> {
    let Some(marker) = NOTE_MARKER.find(block) else {
        return Vec::new();
    };
    let after = &block[marker.end()..];
    let end = after.find("\n\n").unwrap_or(after.len());
    let note = after[..end].trim();
    if note.chars().count() <= 10 {
        return Vec::new();
    }
    vec![note.chars().take(MAX_NOTE_CHARS).collect()]
}
