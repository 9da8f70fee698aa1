//! # Stage Detection Module
//!
//! Maps free-text operator instruction fragments ("MEZCLAR DURANTE 2 A 3
//! MINUTOS", "COWLES 20 MNS A 1600-2800") to one of the fixed manufacturing
//! stages. Sheets mix Spanish, French and English spellings, so detection is
//! keyword-based with a fuzzy-similarity fallback rather than anything
//! semantic.
//!
//! ## Matching rules
//!
//! 1. Upper-case the text
//! 2. If any alias is a literal substring, return that stage immediately
//!    (first table entry wins on tie)
//! 3. Otherwise score every alias with normalized Levenshtein similarity and
//!    keep the best, accepted only at >= 0.65
//!
//! Callers supply the fallback when nothing clears the threshold.

use lazy_static::lazy_static;
use log::{debug, trace};
use regex::Regex;
use strsim::normalized_levenshtein;

use crate::formula_model::Stage;
use crate::line_tokenizer::CODE_PATTERN;
use crate::numeric::parse_loose_number;

/// Minimum similarity ratio for a fuzzy alias match.
pub const FUZZY_THRESHOLD: f64 = 0.65;

/// Canonical stage table: stage -> keyword aliases across languages and the
/// misspellings seen on real sheets. Order matters: first entry wins on tie.
pub const STAGE_ALIASES: [(Stage, &[&str]); 3] = [
    (Stage::FastMix, &["MEZCLAR", "MELANGER", "MIXING", "MIX", "MEZCLA"]),
    (Stage::CowlesDispersion, &["DISPERSAR", "COWLES", "DISPERS", "DISPERSE"]),
    (Stage::SlowDissolution, &["DISOLVER", "DISOL", "DISSOLVE", "DISSOLUTION"]),
];

lazy_static! {
    /// Words that mark a line as an operator instruction rather than an
    /// ingredient row, beyond the stage aliases themselves (durations and
    /// stray French instruction verbs, including the recurring "CONTOLE"
    /// misspelling).
    static ref STAGE_HEADER_HINT: Regex = Regex::new(
        r"(MEZCLAR|DISPERSAR|DISOL|COWLES|MELANGER|MINUTOS|MINUTES|AJOUTER|CONTOLE)"
    )
    .expect("stage header pattern should be valid");
}

/// Classify an instruction fragment as a stage, if any alias matches.
///
/// Returns `None` when nothing clears [`FUZZY_THRESHOLD`]; callers fall back
/// to the current stage or [`Stage::BasePreparation`].
pub fn classify_stage(text: &str) -> Option<Stage> {
    let upper = text.to_uppercase();
    let mut best: Option<(Stage, f64)> = None;

    for (stage, aliases) in STAGE_ALIASES.iter() {
        for alias in aliases.iter() {
            if upper.contains(alias) {
                trace!("Stage alias '{}' is a substring of '{}'", alias, text);
                return Some(*stage);
            }
            let ratio = normalized_levenshtein(&upper, alias);
            if ratio >= FUZZY_THRESHOLD && best.map_or(true, |(_, s)| ratio > s) {
                best = Some((*stage, ratio));
            }
        }
    }

    if let Some((stage, score)) = best {
        debug!("Fuzzy stage match for '{}': {} (score {:.2})", text, stage, score);
    }
    best.map(|(stage, _)| stage)
}

/// Classify a full header line, falling back to `current` when no alias
/// matches even fuzzily.
pub fn stage_from_line(line: &str, current: Stage) -> Stage {
    classify_stage(line).unwrap_or(current)
}

/// Whether a line looks like a stage header: its first token is neither
/// numeric nor code-shaped, and the text carries a stage or instruction
/// keyword.
pub fn is_stage_header(line: &str) -> bool {
    let first_token = match line.split_whitespace().next() {
        Some(t) => t,
        None => return false,
    };
    if parse_loose_number(first_token).is_some() || CODE_PATTERN.is_match(first_token) {
        return false;
    }
    STAGE_HEADER_HINT.is_match(&line.to_uppercase())
}
