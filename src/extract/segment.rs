//! Line segmentation and structural anchors.
//!
//! All extraction patterns live here as compiled statics. The patterns are
//! deliberately tolerant: the manual is a layout-oriented text stream with
//! no schema, so anchors (code tokens, the `P R A` priority marker, chapter
//! headings, section keywords) are the only reliable structure.

use once_cell::sync::Lazy;
use regex::Regex;

/// A code token alone on its line, e.g. `  A41.0  `.
pub static CODE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([A-Z]\d{2}\.?\d?)\s*$").expect("code line regex"));

/// A code token anywhere in a line.
pub static CODE_INLINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Z]\d{2}\.?\d?)\b").expect("inline code regex"));

/// The three-letter priority marker, spaced out by the layout.
pub static PRA_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bP\s+R\s+A\b").expect("pra marker regex"));

/// Inline priority marker followed by its digit.
pub static PRA_INLINE_DIGIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"P\s+R\s+A\s+(\d+)").expect("pra digit regex"));

/// Chapter heading, roman or arabic numeral, half- or full-width colon.
pub static CHAPTER_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)CHAPITRE\s+([IVXLCDM]+|[0-9]+)\s*[:：]").expect("chapter regex"));

/// Section keywords that terminate a label search and delimit field spans.
pub static SECTION_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(À\s*l['’′]exclusion|Comprend|Note|Utiliser)").expect("section regex")
});

/// Reserved tokens meaning "not elsewhere classified"; never valid codes.
pub const CODE_BLOCKLIST: [&str; 2] = ["SAI", "NCA"];

/// Classification of one line of page text, drives the page scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineClass {
    /// A bare code token on its own line.
    RecordStart(String),
    /// A `P R A` marker with an inline code on the same line.
    PriorityRecordStart(String),
    /// Anything else.
    Text,
}

/// Classify a single line.
pub fn classify_line(line: &str) -> LineClass {
    if let Some(caps) = CODE_LINE.captures(line.trim()) {
        return LineClass::RecordStart(caps[1].to_string());
    }
    if PRA_MARKER.is_match(line)
        && let Some(caps) = CODE_INLINE.captures(line)
    {
        return LineClass::PriorityRecordStart(caps[1].to_string());
    }
    LineClass::Text
}

/// Detect a chapter heading anywhere in the page text. Returns the heading
/// line itself, which becomes the chapter context for subsequent records.
pub fn detect_chapter(text: &str) -> Option<String> {
    let m = CHAPTER_HEADING.find(text)?;
    let tail = &text[m.start()..];
    let line = tail.lines().next().unwrap_or(tail);
    let line = line.trim();
    (!line.is_empty()).then(|| line.to_string())
}

/// Normalize a captured code token: the line pattern tolerates a trailing
/// dot with no subdivision digit, but stored codes never carry one.
pub fn normalize_code(token: &str) -> String {
    token.trim().trim_end_matches('.').to_string()
}

/// Whether a normalized token may become a record code.
pub fn is_valid_code(token: &str) -> bool {
    static VALID: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^[A-Z]\d{2}(\.\d)?$").expect("valid code regex"));
    token.len() >= 2 && !CODE_BLOCKLIST.contains(&token) && VALID.is_match(token)
}

/// All valid code tokens mentioned in a span of text, deduplicated in
/// first-seen order.
pub fn mentioned_codes(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for caps in CODE_INLINE.captures_iter(text) {
        let code = normalize_code(&caps[1]);
        if is_valid_code(&code) && seen.insert(code.clone()) {
            out.push(code);
        }
    }
    out
}
