//! # Formula Key Module
//!
//! Derives the canonical short identifier for a formula:
//! `<brand>-<type_tag>-<color_tag>`. The type tag comes from a built-in
//! paint-type table with fuzzy lookup; unknown types degrade to the "GEN"
//! tag plus a deterministically generated suggestion so intake keeps working
//! for novel product lines.
//!
//! ## Usage
//!
//! ```rust
//! use formulab::formula_key::{build_formula_key, KeyInputs};
//!
//! let key = build_formula_key(&KeyInputs {
//!     product_type: Some("ACRILICA SUPERIOR HP"),
//!     color: Some("BLANCO 100-66"),
//!     brand: Some("MILAN"),
//!     brand_code: None,
//!     override_key: None,
//! });
//! assert_eq!(key.key, "PM-HP-BLANCO100-66");
//! ```

use lazy_static::lazy_static;
use log::warn;
use regex::Regex;

use crate::numeric::clean_spaces;

/// Built-in paint-type table: full type name -> short tag.
pub const TYPE_TAGS: [(&str, &str); 23] = [
    ("ACRILICA SUPERIOR HP", "HP"),
    ("ACRILICA SUPERIOR TIPO B", "SUP-B"),
    ("BARNIZ CLEAR INDUSTRIAL", "BCL"),
    ("BARNIZ PORT EPOXI CLEAR", "BEP"),
    ("DRY WET", "DRY"),
    ("ECONOMICA", "ECO"),
    ("EPOXICA", "EPO"),
    ("ESMALTE INDUSTRIAL", "EIN"),
    ("ESMALTE INDUSTRIAL ANTICORROSIVO", "EANT"),
    ("ESMALTE MANTENIMIENTO", "EMAN"),
    ("ESMALTE TRAFICO", "ETR"),
    ("PINTURA P/ CANCHA", "PCA"),
    ("PRIMER ACRILICO", "PRI"),
    ("PROYECTO CONTRACTOR", "PRO"),
    ("PROYECTO P/ TECHOS", "PTE"),
    ("SATINADA", "SAT"),
    ("SEALER WATER", "SEW"),
    ("SELLADOR P/ PISOS", "SPP"),
    ("SELLADOR TECHOS HP", "SLP"),
    ("SELLADOR TECHOS TIPO B", "SLT"),
    ("SEMIGLOSS PREMIUM", "SEM-P"),
    ("SEMIGLOSS TIPO B", "SEM-B"),
    ("TEXTURIZADAS", "TXT"),
];

/// Stop words ignored when counting shared significant words in lookup.
const LOOKUP_STOP_WORDS: [&str; 4] = ["DE", "PARA", "O", "P/"];

/// Stop words dropped before generating a tag suggestion.
const SUGGESTION_STOP_WORDS: [&str; 9] =
    ["DE", "PARA", "TIPO", "LA", "EL", "INFINITI", "MILAN", "O", "P/"];

/// Default brand prefix when neither an override nor a recognized brand is
/// available.
const DEFAULT_BRAND_PREFIX: &str = "IN";

/// Placeholder color tag when the color string strips to nothing.
const DEFAULT_COLOR_TAG: &str = "BL";

lazy_static! {
    static ref NON_COLOR_CHARS: Regex =
        Regex::new(r"[^A-Z0-9-]").expect("color pattern should be valid");
}

/// Everything the key builder consults.
#[derive(Debug, Clone, Default)]
pub struct KeyInputs<'a> {
    /// Detected or overridden product type
    pub product_type: Option<&'a str>,
    /// Detected color string
    pub color: Option<&'a str>,
    /// Brand name from metadata ("INFINITI" / "MILAN")
    pub brand: Option<&'a str>,
    /// Explicit 2-letter brand prefix override
    pub brand_code: Option<&'a str>,
    /// Complete manual key; wins unconditionally
    pub override_key: Option<&'a str>,
}

/// The derived key plus the facts a caller may want to surface.
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaKey {
    /// The composed key
    pub key: String,
    /// Whether the type tag came from the table (false means "GEN")
    pub type_resolved: bool,
    /// Suggested tag for an unresolved type, for registration by an admin
    pub suggested_tag: Option<String>,
}

/// Build the canonical formula key.
///
/// A manual `override_key` is returned unchanged. Otherwise the key is
/// composed from the brand prefix, the resolved type tag and the sanitized
/// color tag, deterministically from the same inputs.
pub fn build_formula_key(inputs: &KeyInputs<'_>) -> FormulaKey {
    if let Some(key) = inputs.override_key {
        return FormulaKey {
            key: key.to_string(),
            type_resolved: true,
            suggested_tag: None,
        };
    }

    let raw_type = inputs.product_type.unwrap_or("");
    let (type_tag, resolved) = lookup_type_tag(raw_type);
    let suggested = if resolved {
        None
    } else {
        let suggestion = suggest_type_tag(raw_type);
        warn!(
            "Unknown product type '{}': using tag GEN, suggested tag '{}'",
            raw_type, suggestion
        );
        Some(suggestion)
    };

    let brand_prefix = resolve_brand_prefix(inputs.brand_code, inputs.brand);
    let color_tag = color_tag(inputs.color.unwrap_or(""));

    FormulaKey {
        key: format!("{}-{}-{}", brand_prefix, type_tag, color_tag),
        type_resolved: resolved,
        suggested_tag: suggested,
    }
}

/// Look up the short tag for a product type.
///
/// Exact normalized match first, then containment either direction, then two
/// or more shared significant words. Returns `("GEN", false)` when nothing
/// matches.
pub fn lookup_type_tag(raw_type: &str) -> (&'static str, bool) {
    let norm = normalize_type(raw_type);
    if norm.is_empty() {
        return ("GEN", false);
    }

    for (full, tag) in TYPE_TAGS.iter() {
        if *full == norm {
            return (tag, true);
        }
    }

    for (full, tag) in TYPE_TAGS.iter() {
        if norm.contains(full) || full.contains(norm.as_str()) {
            return (tag, true);
        }
        let significant = shared_significant_words(full, &norm);
        if significant >= 2 {
            return (tag, true);
        }
    }

    ("GEN", false)
}

/// Deterministic tag suggestion for an unregistered type: first 3 letters of
/// a single significant word; first letter + 2 letters for two words; first
/// letters of up to 3 words otherwise.
pub fn suggest_type_tag(raw_type: &str) -> String {
    let norm = normalize_type(raw_type);
    let words: Vec<&str> = norm
        .split_whitespace()
        .filter(|w| !SUGGESTION_STOP_WORDS.contains(w))
        .collect();

    match words.len() {
        0 => "GEN".to_string(),
        1 => words[0].chars().take(3).collect(),
        2 => {
            let mut tag: String = words[0].chars().take(1).collect();
            tag.extend(words[1].chars().take(2));
            tag
        }
        _ => words.iter().take(3).filter_map(|w| w.chars().next()).collect(),
    }
}

fn resolve_brand_prefix(brand_code: Option<&str>, brand: Option<&str>) -> String {
    if let Some(code) = brand_code {
        return code.to_string();
    }
    match brand.map(|b| b.trim().to_uppercase()) {
        Some(ref b) if b == "INFINITI" => "IN".to_string(),
        Some(ref b) if b == "MILAN" => "PM".to_string(),
        _ => DEFAULT_BRAND_PREFIX.to_string(),
    }
}

/// Upper-case the color and strip everything but letters, digits and
/// hyphens; an empty result falls back to the placeholder tag.
fn color_tag(color: &str) -> String {
    let upper = color.to_uppercase();
    let stripped = NON_COLOR_CHARS.replace_all(&upper, "").into_owned();
    if stripped.is_empty() {
        DEFAULT_COLOR_TAG.to_string()
    } else {
        stripped
    }
}

fn normalize_type(raw: &str) -> String {
    clean_spaces(&raw.to_uppercase())
}

fn shared_significant_words(a: &str, b: &str) -> usize {
    a.split_whitespace()
        .filter(|w| !LOOKUP_STOP_WORDS.contains(w))
        .filter(|w| b.split_whitespace().any(|x| x == *w))
        .count()
}
