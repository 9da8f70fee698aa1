//! # Line Tokenizer Module
//!
//! Splits one raw line of pasted spreadsheet text into an ordered sequence of
//! field strings. Pastes arrive with wildly inconsistent delimiters: literal
//! tabs, multi-space column padding, or single spaces everywhere. The
//! tokenizer runs a cascade of strategies and keeps the first one that
//! recovers real column structure.
//!
//! ## Strategy cascade
//!
//! 1. Literal tab characters (always wins when present)
//! 2. Runs of 4+ spaces, kept if it yields more than 3 fields
//! 3. Runs of 2+ spaces, kept if it yields more than 3 fields
//! 4. Token-merge fallback: whitespace-separated words are regrouped,
//!    starting a new field on an ingredient code, a bare decimal number, or
//!    a known unit abbreviation; everything else accumulates into the
//!    current free-text field
//!
//! ## Usage
//!
//! ```rust
//! use formulab::line_tokenizer::split_fields;
//!
//! let fields = split_fields("SV-0001 AGUA DESMINERALIZADA 25.000 KG 3.778");
//! assert_eq!(fields, vec!["SV-0001", "AGUA DESMINERALIZADA", "25.000", "KG", "3.778"]);
//! ```

use lazy_static::lazy_static;
use log::trace;
use regex::Regex;

lazy_static! {
    /// Ingredient code shape: "SV-0001", "PE-010", "AV-004"
    pub static ref CODE_PATTERN: Regex =
        Regex::new(r"^[A-Z]{2,3}-\d{3,5}$").expect("code pattern should be valid");
    static ref DECIMAL_WORD: Regex =
        Regex::new(r"^\d+[.,]\d+$").expect("decimal pattern should be valid");
    static ref SPACES_4: Regex = Regex::new(r" {4,}").expect("space-run pattern should be valid");
    static ref SPACES_2: Regex = Regex::new(r" {2,}").expect("space-run pattern should be valid");
}

/// Unit abbreviations that force a field boundary in the fallback strategy.
const UNIT_WORDS: [&str; 5] = ["KG", "GL", "LB", "G", "L"];

/// Split a line into field strings using the cascading strategy.
///
/// Empty fields are dropped; field order is preserved.
pub fn split_fields(line: &str) -> Vec<String> {
    if line.contains('\t') {
        return line
            .split('\t')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect();
    }

    let trimmed = line.trim();

    for splitter in [&*SPACES_4, &*SPACES_2] {
        let parts: Vec<String> = splitter
            .split(trimmed)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect();
        if parts.len() > 3 {
            return parts;
        }
    }

    trace!("Falling back to token-merge split for line: '{}'", trimmed);
    merge_tokens(trimmed)
}

/// Fallback for single-space-padded text: regroup words into fields.
///
/// A new field starts whenever a word looks like an ingredient code, a bare
/// decimal number, or a unit abbreviation; free-text words accumulate into
/// the current field so multi-word names survive intact.
fn merge_tokens(line: &str) -> Vec<String> {
    let mut fields: Vec<String> = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();

    for word in line.split_whitespace() {
        let is_boundary = CODE_PATTERN.is_match(word)
            || DECIMAL_WORD.is_match(word)
            || UNIT_WORDS.contains(&word.to_uppercase().as_str());
        if is_boundary {
            if !buffer.is_empty() {
                fields.push(buffer.join(" "));
                buffer.clear();
            }
            fields.push(word.to_string());
        } else {
            buffer.push(word);
        }
    }
    if !buffer.is_empty() {
        fields.push(buffer.join(" "));
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_separated_fields() {
        let fields = split_fields("SV-0001\tAGUA\t25.000\tKG\t3.778");
        assert_eq!(fields, vec!["SV-0001", "AGUA", "25.000", "KG", "3.778"]);
    }

    #[test]
    fn test_tab_fields_preserved_exactly() {
        // N tab-separated non-empty fields come back as exactly N fields
        let line = "a\tb c\td\te\tf g h\ti";
        let fields = split_fields(line);
        assert_eq!(fields.len(), 6);
        assert!(fields.iter().all(|f| !f.is_empty()));
    }

    #[test]
    fn test_empty_tab_cells_dropped() {
        let fields = split_fields("AV-004\tK.T.P.P./CALGON N\t0.100\tKG\t\t\t9.07");
        assert_eq!(fields, vec!["AV-004", "K.T.P.P./CALGON N", "0.100", "KG", "9.07"]);
    }

    #[test]
    fn test_wide_space_columns() {
        let fields = split_fields("SV-0001    AGUA    25.000    KG    3.778");
        assert_eq!(fields, vec!["SV-0001", "AGUA", "25.000", "KG", "3.778"]);
    }

    #[test]
    fn test_double_space_columns() {
        let fields = split_fields("AV-011  NONYL FENOL  0.250  KG");
        assert_eq!(fields, vec!["AV-011", "NONYL FENOL", "0.250", "KG"]);
    }

    #[test]
    fn test_token_merge_single_spaces() {
        // Single-space padding: a naive split would shred the name
        let fields = split_fields("PE-006 GALIMAN MALLA 400 SUPER BLANCO 12.000 KG 10.21");
        assert_eq!(fields[0], "PE-006");
        assert_eq!(fields[1], "GALIMAN MALLA 400 SUPER BLANCO");
        assert_eq!(fields[2], "12.000");
        assert_eq!(fields[3], "KG");
        assert_eq!(fields[4], "10.21");
    }

    #[test]
    fn test_token_merge_without_code() {
        let fields = split_fields("RESINA ACRILICA 25.00 KG 4.20");
        assert_eq!(fields, vec!["RESINA ACRILICA", "25.00", "KG", "4.20"]);
    }

    #[test]
    fn test_free_text_line_stays_whole() {
        let fields = split_fields("MEZCLAR DURANTE 2 A 3 MINUTOS");
        assert_eq!(fields, vec!["MEZCLAR DURANTE 2 A 3 MINUTOS"]);
    }

    #[test]
    fn test_blank_line() {
        assert!(split_fields("   ").is_empty());
        assert!(split_fields("").is_empty());
    }
}
