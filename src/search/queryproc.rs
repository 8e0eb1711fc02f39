//! Query preprocessing.
//!
//! Physicians type abbreviated, accented, sometimes code-bearing text.
//! Cleaning keeps accents (the corpus language is accent-sensitive),
//! code mentions are surfaced as metadata, and a small synonym table
//! widens recall for the most common clinical phrasings.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::extract::segment::{CODE_INLINE, is_valid_code, normalize_code};

/// Strips everything that is neither word character, whitespace, nor
/// hyphen; `\w` is Unicode-aware so accented letters survive.
static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").expect("non-word regex"));

static SYNONYMS: &[(&str, &[&str])] = &[
    ("dyspnée", &["essoufflement", "difficulté respiratoire"]),
    ("fièvre", &["hyperthermie", "pyrexie"]),
    ("toux", &["expectoration"]),
    ("douleur", &["algie", "souffrance"]),
    ("infection", &["sepsis", "septique", "infectieux"]),
    ("inflammation", &["inflammatoire"]),
];

/// A cleaned and expanded query with its extracted code mentions.
#[derive(Debug, Clone)]
pub struct ProcessedQuery {
    pub original: String,
    pub cleaned: String,
    /// Codes explicitly mentioned in the query (blocklist-filtered).
    pub mentioned_codes: Vec<String>,
    /// Cleaned query plus synonym expansion; what retrieval runs on.
    pub search_query: String,
}

pub fn process(query: &str) -> ProcessedQuery {
    let cleaned = clean(query);
    let mentioned_codes = extract_codes(query);
    let search_query = expand(&cleaned);
    ProcessedQuery {
        original: query.to_string(),
        cleaned,
        mentioned_codes,
        search_query,
    }
}

fn clean(query: &str) -> String {
    let collapsed = query.split_whitespace().collect::<Vec<_>>().join(" ");
    let lowered = collapsed.to_lowercase();
    let stripped = NON_WORD.replace_all(&lowered, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn extract_codes(query: &str) -> Vec<String> {
    let upper = query.to_uppercase();
    let mut seen = std::collections::HashSet::new();
    let mut codes = Vec::new();
    for caps in CODE_INLINE.captures_iter(&upper) {
        let code = normalize_code(&caps[1]);
        if is_valid_code(&code) && seen.insert(code.clone()) {
            codes.push(code);
        }
    }
    codes
}

fn expand(cleaned: &str) -> String {
    let mut expanded = cleaned.to_string();
    for (term, synonyms) in SYNONYMS {
        if cleaned.contains(term) {
            for synonym in *synonyms {
                expanded.push(' ');
                expanded.push_str(synonym);
            }
        }
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_preserves_accents() {
        let processed = process("  Sepsis  à staphylocoques!!  ");
        assert_eq!(processed.cleaned, "sepsis à staphylocoques");
    }

    #[test]
    fn test_extracts_mentioned_codes() {
        let processed = process("patient avec a41.0, exclure p36");
        assert_eq!(processed.mentioned_codes, vec!["A41.0".to_string(), "P36".to_string()]);
    }

    #[test]
    fn test_blocklist_tokens_not_mentioned() {
        let processed = process("bactériémie SAI");
        assert!(processed.mentioned_codes.is_empty());
    }

    #[test]
    fn test_synonym_expansion() {
        let processed = process("fièvre persistante");
        assert!(processed.search_query.contains("hyperthermie"));
        assert!(processed.search_query.starts_with("fièvre persistante"));
    }

    #[test]
    fn test_no_expansion_without_known_terms() {
        let processed = process("fracture du fémur");
        assert_eq!(processed.search_query, processed.cleaned);
    }
}
