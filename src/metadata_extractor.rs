//! # Metadata Extraction Module
//!
//! Extracts header metadata from the top of a pasted formula sheet: product
//! type, color, reference volume, target density ratio (P/G) and the target
//! production volume. Sheets come from several spreadsheet templates, so
//! every fact has a primary heuristic plus fallbacks calibrated against real
//! historical documents.
//!
//! The target-volume detection is a strict priority cascade; each step runs
//! only when the previous one found nothing, and the caller-supplied default
//! is the last resort.

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

use crate::formula_model::ParsedMetadata;
use crate::line_tokenizer::split_fields;
use crate::numeric::{clean_spaces, parse_loose_number};

/// Number of leading lines scanned for metadata facts.
const METADATA_ZONE: usize = 15;

/// Plausible range for a production batch volume in gallons.
const VOLUME_RANGE: (f64, f64) = (0.1, 5000.0);

lazy_static! {
    /// "VOLUMEN ... P/G" column header, the primary color/volume/ratio anchor.
    static ref VOLUMEN_PG_HEADER: Regex =
        Regex::new(r"\bVOLUMEN\b.*\bP\s*/\s*G\b").expect("header pattern should be valid");
    /// Fallback "<free text> <number> <number>" metadata line.
    static ref TEXT_TWO_NUMBERS: Regex =
        Regex::new(r"^\s*(.*?)\s+([0-9.,]+)\s+([0-9.,]+)\b").expect("fallback pattern should be valid");
    /// Leading text that marks a non-color metadata line.
    static ref METADATA_KEYWORD: Regex =
        Regex::new(r"(?i)MODIFIC|COSTO|FECHA|PRODUCIDOS|P/?G|VOLUMEN|TOTAL")
            .expect("keyword pattern should be valid");
    /// Whole-document "VOLUMEN <number>" scan.
    static ref VOLUMEN_VALUE: Regex =
        Regex::new(r"(?i)\bVOLUMEN\b[^0-9]*([0-9.,]+)").expect("volumen pattern should be valid");
    /// Whole-document "P/G <number>" scan.
    static ref PG_VALUE: Regex =
        Regex::new(r"(?i)\bP\s*/\s*G\b[^0-9]*([0-9.,]+)").expect("pg pattern should be valid");
    /// A line that is nothing but one number (an isolated spreadsheet cell).
    static ref ISOLATED_NUMBER: Regex =
        Regex::new(r"^[\s]*([0-9]+(?:[.,][0-9]+)?)[\s]*$").expect("cell pattern should be valid");
    /// A bare integer standing alone on a line.
    static ref BARE_INTEGER: Regex =
        Regex::new(r"^\d{2,5}$").expect("integer pattern should be valid");
    /// "modificacion [index] <number>" marker line.
    static ref MODIFICATION_VALUE: Regex =
        Regex::new(r"(?i)MODIFICACION\s+\d*\s*([0-9]+(?:[.,][0-9]+)?)")
            .expect("modification pattern should be valid");
    /// "STANDARD <number>" marker line.
    static ref STANDARD_VALUE: Regex =
        Regex::new(r"(?i)STANDARD\s+([0-9]+(?:[.,][0-9]+)?)").expect("standard pattern should be valid");
    /// Any numeric token, for right-to-left extraction from totals lines.
    static ref NUMBER_TOKEN: Regex =
        Regex::new(r"[0-9]+(?:[.,][0-9]+)?").expect("number pattern should be valid");
}

/// Header keywords that disqualify a line from the isolated-cell search.
const HEADER_KEYWORDS: [&str; 10] = [
    "VOLUMEN", "P/G", "COSTO", "FECHA", "GALONES PRODUCIDOS", "CODIGO", "NOMBRE", "CANT",
    "UNIDAD", "PRECIO",
];

/// The document's non-blank lines, in order. Line indices used throughout
/// the parser refer to positions in this sequence.
pub fn non_blank_lines(text: &str) -> Vec<&str> {
    text.lines().filter(|ln| !ln.trim().is_empty()).collect()
}

/// Extract header metadata from a raw document.
///
/// `default_target_volume` is used when the whole target-volume cascade
/// comes up empty; `target_volume` is therefore always populated.
pub fn extract_metadata(text: &str, default_target_volume: f64) -> ParsedMetadata {
    let lines = non_blank_lines(text);

    let product_type = extract_product_type(&lines);
    let (mut color, mut reference_volume, mut density_ratio) = extract_header_block(&lines);

    if reference_volume.is_none() || density_ratio.is_none() || color.is_none() {
        let (fb_color, fb_vol, fb_pg) = extract_metadata_fallback(&lines);
        color = color.or(fb_color);
        reference_volume = reference_volume.or(fb_vol);
        density_ratio = density_ratio.or(fb_pg);
    }

    // Independent whole-text scans as the last resort for the two numbers
    if reference_volume.is_none() {
        reference_volume = VOLUMEN_VALUE
            .captures(text)
            .and_then(|c| parse_loose_number(&c[1]));
    }
    if density_ratio.is_none() {
        density_ratio = PG_VALUE.captures(text).and_then(|c| parse_loose_number(&c[1]));
    }

    let target_volume = detect_target_volume(&lines, default_target_volume);

    debug!(
        "Extracted metadata: type={:?} color={:?} vol={:?} pg={:?} target={}",
        product_type, color, reference_volume, density_ratio, target_volume
    );

    ParsedMetadata {
        product_type,
        color,
        presentation: "STANDARD".to_string(),
        version: "1.0".to_string(),
        reference_volume,
        density_ratio,
        target_volume,
        brand: None,
    }
}

/// Product type: the first non-blank line, truncated at any trailing
/// "VOLUMEN..." column header, whitespace-collapsed and title-cased.
fn extract_product_type(lines: &[&str]) -> Option<String> {
    let first = lines.first()?;
    let upper = first.to_uppercase();
    let raw = match upper.find("VOLUMEN") {
        Some(pos) => &upper[..pos],
        None => first,
    };
    let cleaned = title_case(&clean_spaces(raw));
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Primary color/volume/ratio heuristic: a "VOLUMEN ... P/G" header within
/// the first 5 lines, with the data on the following line. All text fields
/// preceding the first numeric field form the color; the first two numeric
/// fields are reference volume and density ratio.
fn extract_header_block(lines: &[&str]) -> (Option<String>, Option<f64>, Option<f64>) {
    let header_idx = lines
        .iter()
        .take(5)
        .position(|ln| VOLUMEN_PG_HEADER.is_match(&ln.to_uppercase()));

    let data_line = match header_idx.and_then(|i| lines.get(i + 1)) {
        Some(ln) => ln,
        None => return (None, None, None),
    };

    let mut numbers = Vec::new();
    let mut color_text = Vec::new();
    for part in split_fields(data_line) {
        match parse_loose_number(&part) {
            Some(n) => numbers.push(n),
            None if numbers.is_empty() => color_text.push(part),
            None => {}
        }
    }

    let (vol, pg) = if numbers.len() >= 2 {
        (Some(numbers[0]), Some(numbers[1]))
    } else {
        (None, None)
    };
    let color = if color_text.is_empty() {
        None
    } else {
        Some(title_case(&color_text.join(" ")))
    };
    (color, vol, pg)
}

/// Fallback when the header block is absent: scan lines 2-12 (stopping at
/// the ingredient column header) for "<free text> <number> <number>",
/// rejecting candidates whose leading text is a known metadata keyword.
fn extract_metadata_fallback(lines: &[&str]) -> (Option<String>, Option<f64>, Option<f64>) {
    for ln in lines.iter().skip(1).take(11) {
        let upper = ln.to_uppercase();
        if upper.contains("CODIGO") || upper.contains("NOMBRE GENERICO") {
            break;
        }
        if let Some(caps) = TEXT_TWO_NUMBERS.captures(ln) {
            let leading = clean_spaces(caps.get(1).map_or("", |m| m.as_str()));
            if METADATA_KEYWORD.is_match(&leading) {
                continue;
            }
            let color = if leading.is_empty() {
                None
            } else {
                Some(title_case(&leading))
            };
            let vol = parse_loose_number(&caps[2]);
            let pg = parse_loose_number(&caps[3]);
            return (color, vol, pg);
        }
    }
    (None, None, None)
}

/// Target production volume, resolved by a strict priority cascade.
///
/// 1. An isolated numeric cell within the first 15 lines (header-keyword
///    lines excluded), value in [0.1, 5000]
/// 2. A "MODIFICACION [index] <number>" or "STANDARD <number>" marker line
/// 3. A bare integer in [10, 5000] standing alone within the first 15 lines
/// 4. The last 5 lines: a line containing "TOTAL", numeric tokens taken
///    right-to-left, preferring an integer-valued or small-decimal candidate
/// 5. The caller-supplied default
pub fn detect_target_volume(lines: &[&str], default: f64) -> f64 {
    let zone = &lines[..lines.len().min(METADATA_ZONE)];

    // Priority 1: isolated numeric cell
    for ln in zone {
        let upper = ln.to_uppercase();
        if HEADER_KEYWORDS.iter().any(|kw| upper.contains(kw)) {
            continue;
        }
        if let Some(caps) = ISOLATED_NUMBER.captures(ln) {
            if let Some(val) = parse_loose_number(&caps[1]) {
                if in_volume_range(val) {
                    debug!("Target volume from isolated cell: {}", val);
                    return val;
                }
            }
        }
    }

    // Priority 2: marker line with a trailing number
    for ln in zone {
        for pattern in [&*MODIFICATION_VALUE, &*STANDARD_VALUE] {
            if let Some(caps) = pattern.captures(ln) {
                if let Some(val) = parse_loose_number(&caps[1]) {
                    if in_volume_range(val) {
                        debug!("Target volume from marker line '{}': {}", ln.trim(), val);
                        return val;
                    }
                }
            }
        }
    }

    // Priority 3: bare integer alone on a line
    for ln in zone {
        if BARE_INTEGER.is_match(ln.trim()) {
            if let Some(val) = parse_loose_number(ln.trim()) {
                if (10.0..=5000.0).contains(&val) {
                    debug!("Target volume from bare integer: {}", val);
                    return val;
                }
            }
        }
    }

    // Priority 4: totals row near the tail, numbers right-to-left
    let tail_start = lines.len().saturating_sub(5);
    for ln in lines[tail_start..].iter().rev() {
        if !ln.to_uppercase().contains("TOTAL") {
            continue;
        }
        let tokens: Vec<&str> = NUMBER_TOKEN.find_iter(ln).map(|m| m.as_str()).collect();
        for tok in tokens.iter().rev() {
            if let Some(val) = parse_loose_number(tok) {
                let integerish = (val - val.round()).abs() < 0.01 || val < 10.0;
                if in_volume_range(val) && integerish {
                    debug!("Target volume from totals row: {}", val);
                    return val;
                }
            }
        }
    }

    debug!("Target volume not detected, using default {}", default);
    default
}

fn in_volume_range(val: f64) -> bool {
    (VOLUME_RANGE.0..=VOLUME_RANGE.1).contains(&val)
}

/// Title-case a phrase the way spreadsheet headers are displayed: first
/// letter of each word upper-cased, the rest lowered.
pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("ACRILICA SATINADA"), "Acrilica Satinada");
        assert_eq!(title_case("blanco con white ultra"), "Blanco Con White Ultra");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_product_type_truncates_volumen_suffix() {
        let text = "\tACRILICA SATINADA\t\tVOLUMEN\tP/G\tCOSTO\nBLANCO\t21.33\t4.72\n";
        let meta = extract_metadata(text, 250.0);
        assert_eq!(meta.product_type.as_deref(), Some("Acrilica Satinada"));
    }

    #[test]
    fn test_header_block_color_and_numbers() {
        let text = "ACRILICA SATINADA\tVOLUMEN\tP/G\n\
                    BLANCO CON WHITE ULTRA\t21.3335\t4.72\t7.11\t9-jun.-22\n";
        let meta = extract_metadata(text, 250.0);
        assert_eq!(meta.color.as_deref(), Some("Blanco Con White Ultra"));
        assert_eq!(meta.reference_volume, Some(21.3335));
        assert_eq!(meta.density_ratio, Some(4.72));
    }

    #[test]
    fn test_fallback_text_two_numbers() {
        let text = "ACRILICA SUPERIOR\n\
                    BLANCO 100-66 21.33 5.46\n\
                    CODIGO NOMBRE GENERICO CANT UNIDAD KG/GL\n\
                    SV-0001 AGUA 12.00 KG 3.78\n";
        let meta = extract_metadata(text, 250.0);
        assert!(meta.color.as_deref().unwrap().starts_with("Blanco"));
        assert_eq!(meta.reference_volume, Some(21.33));
        assert_eq!(meta.density_ratio, Some(5.46));
    }

    #[test]
    fn test_fallback_rejects_metadata_keywords() {
        let text = "ESMALTE INDUSTRIAL\n\
                    COSTO 12.50 4.20\n\
                    VERDE CLARO 18.90 5.10\n";
        let meta = extract_metadata(text, 250.0);
        assert_eq!(meta.color.as_deref(), Some("Verde Claro"));
        assert_eq!(meta.reference_volume, Some(18.90));
    }

    #[test]
    fn test_independent_regex_scan() {
        let text = "PRIMER ACRILICO\nnotas varias\nVOLUMEN 21.33\nP/G 5.46\n";
        let meta = extract_metadata(text, 250.0);
        assert_eq!(meta.reference_volume, Some(21.33));
        assert_eq!(meta.density_ratio, Some(5.46));
    }

    #[test]
    fn test_target_volume_isolated_cell() {
        let lines = vec!["ACRILICA SATINADA", "  0.75  ", "CODIGO NOMBRE"];
        assert_eq!(detect_target_volume(&lines, 250.0), 0.75);
    }

    #[test]
    fn test_target_volume_standard_marker() {
        let lines = vec!["ACRILICA SATINADA", "\tSTANDARD\t150", "CODIGO NOMBRE"];
        assert_eq!(detect_target_volume(&lines, 250.0), 150.0);
    }

    #[test]
    fn test_target_volume_modification_marker() {
        let lines = vec!["SEMIGLOSS PREMIUM", "modificacion 1  0.75"];
        assert_eq!(detect_target_volume(&lines, 250.0), 0.75);
    }

    #[test]
    fn test_target_volume_totals_row() {
        let lines = vec![
            "ACRILICA SATINADA VOLUMEN P/G",
            "CODIGO NOMBRE GENERICO CANT",
            "SV-0001\tAGUA\t25.000\tKG\t3.778",
            "TOTAL\t100.68\t21.33\t 707.90 \t 150.00 ",
        ];
        assert_eq!(detect_target_volume(&lines, 250.0), 150.0);
    }

    #[test]
    fn test_target_volume_default_fallback() {
        let lines = vec!["ACRILICA SATINADA VOLUMEN P/G", "CODIGO NOMBRE"];
        assert_eq!(detect_target_volume(&lines, 250.0), 250.0);
    }

    #[test]
    fn test_header_keyword_lines_excluded_from_isolated_cell() {
        // "21.33" sits on a VOLUMEN line, so it must not be mistaken for the
        // target volume
        let lines = vec!["VOLUMEN 21.33", "STANDARD 25"];
        assert_eq!(detect_target_volume(&lines, 250.0), 25.0);
    }

    #[test]
    fn test_target_volume_range_guard() {
        let lines = vec!["ACRILICA", "  99999  "];
        assert_eq!(detect_target_volume(&lines, 250.0), 250.0);
    }
}
