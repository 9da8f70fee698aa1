//! # Formula Parser Module
//!
//! Two-pass reconstruction of ingredient rows from ambiguously delimited
//! pasted text.
//!
//! Pass 1 walks the document once, discards header/metadata/marker/totals
//! lines, and parses the surviving lines into ingredient rows, each tagged
//! with its source line index. Pass 2 independently locates stage-header
//! lines and assigns each ingredient the stage of the first header *after*
//! it: on these sheets a stage instruction describes the step just completed
//! by the ingredients above it, and a single forward scan cannot know how
//! many ingredients still belong to the current stage.
//!
//! The parser is tolerant: unparseable lines are skipped, never fatal.

use lazy_static::lazy_static;
use log::{debug, trace};
use regex::Regex;

use crate::formula_model::{IngredientLine, Stage};
use crate::line_tokenizer::split_fields;
use crate::metadata_extractor::non_blank_lines;
use crate::numeric::parse_loose_number;
use crate::stage_detection::{is_stage_header, stage_from_line};

lazy_static! {
    /// Ingredient code at the start of a line ("SV-0001 AGUA ...").
    static ref LINE_CODE: Regex =
        Regex::new(r"^[A-Z]{2,3}-\d{3,5}\b").expect("code pattern should be valid");
    /// Column-header and footer keywords that disqualify a line.
    static ref SKIP_KEYWORDS: Regex = Regex::new(
        r"\b(CODIGO|NOMBRE\s+GENERICO|TOTAL|PRECIO\s+US\$|VOLUMEN|P/\s?G|COSTO|FECHA|GALONES\s+PRODUCIDOS)\b"
    )
    .expect("skip pattern should be valid");
    /// Brand/type banner words allowed only in the first two lines.
    static ref BANNER_KEYWORDS: Regex =
        Regex::new(r"\b(ACRILICA|INFINITI|MILAN|SEMIGLOSS|SUPERIOR|PROYECTO|PORT|EPOXI)\b")
            .expect("banner pattern should be valid");
    /// Presentation marker lines.
    static ref MARKER_KEYWORDS: Regex =
        Regex::new(r"\b(STANDARD|MODIFICACION\s+CON\s+OP)\b").expect("marker pattern should be valid");
    /// Ingredient column header within the metadata zone.
    static ref COLUMN_HEADER: Regex =
        Regex::new(r"\b(CODIGO|NOMBRE\s+GENERICO)\b").expect("column header pattern should be valid");
    /// Date-like token ("100-66" style lot numbers, "9-22") that rules a
    /// first field out as an ingredient name.
    static ref LOT_NUMBER: Regex = Regex::new(r"\d{2,3}-\d{2}").expect("lot pattern should be valid");
    /// Stage-header aliases searched for in pass 2.
    static ref STAGE_ALIAS: Regex =
        Regex::new(r"(MEZCLAR|MELANGER|DISPERSAR|COWLES|DISOL)").expect("alias pattern should be valid");
}

/// Physically plausible paint-ingredient density range in KG/GL.
const DENSITY_RANGE: (f64, f64) = (2.8, 25.0);

/// Minimum quantity percent for a real ingredient row.
const MIN_QUANTITY: f64 = 0.001;

/// Sentinel code for sheets that carry no ingredient codes.
pub const NO_CODE: &str = "SIN-CODIGO";

/// Extract ingredient rows, with stages assigned, from a raw document.
///
/// Returns rows in document order; each row carries the index of its source
/// line among the document's non-blank lines.
pub fn extract_ingredients(text: &str) -> Vec<IngredientLine> {
    let lines = non_blank_lines(text);
    let mut rows = collect_candidates(&lines);
    let headers = collect_stage_headers(&lines);
    assign_stages(&mut rows, &headers);
    rows
}

/// Pass 1: isolate ingredient lines and parse code/name/quantities.
fn collect_candidates(lines: &[&str]) -> Vec<IngredientLine> {
    let has_codes = lines
        .iter()
        .take(15)
        .any(|ln| LINE_CODE.is_match(ln.trim()));

    // Position of the ingredient column header, when present: metadata
    // guards only apply above it.
    let header_line_idx = lines
        .iter()
        .take(15)
        .position(|ln| COLUMN_HEADER.is_match(&ln.to_uppercase()));

    let tail_threshold = lines.len() * 9 / 10;
    let mut rows = Vec::new();

    for (idx, ln) in lines.iter().enumerate() {
        let trimmed = ln.trim();
        let upper = trimmed.to_uppercase();

        if SKIP_KEYWORDS.is_match(&upper) {
            continue;
        }
        if idx < 2 && BANNER_KEYWORDS.is_match(&upper) {
            continue;
        }

        // Metadata guard: above the column header (or when no header
        // exists), a second field parsing to a number > 10 marks a metadata
        // line (reference volume, cost), not an ingredient.
        let above_header = header_line_idx.map_or(true, |h| idx < h);
        if above_header {
            let probe = split_fields(ln);
            if probe.len() >= 2 {
                if let Some(n) = parse_loose_number(&probe[1]) {
                    if n > 10.0 {
                        trace!("Skipping metadata-shaped line {}: '{}'", idx, trimmed);
                        continue;
                    }
                }
            }
        }

        if MARKER_KEYWORDS.is_match(&upper) {
            continue;
        }

        // Totals checksum row: near the tail, leads with ~100 and carries a
        // full complement of numeric columns.
        let parts = split_fields(ln);
        if idx >= tail_threshold {
            if let Some(first_num) = parts.first().and_then(|p| parse_loose_number(p)) {
                let num_count = parts.iter().filter(|p| parse_loose_number(p).is_some()).count();
                if (98.0..=102.0).contains(&first_num) && num_count >= 8 {
                    trace!("Skipping totals row {}: '{}'", idx, trimmed);
                    continue;
                }
            }
        }

        // Stage headers belong to pass 2
        if is_stage_header(trimmed) {
            continue;
        }

        if let Some(row) = parse_candidate(&parts, has_codes, idx) {
            trace!("Accepted ingredient row {}: {}", idx, row);
            rows.push(row);
        }
    }

    debug!("Pass 1 extracted {} ingredient rows (has_codes={})", rows.len(), has_codes);
    rows
}

/// Parse one tokenized candidate line into an ingredient row.
fn parse_candidate(parts: &[String], has_codes: bool, line_index: usize) -> Option<IngredientLine> {
    if parts.len() < 3 {
        return None;
    }

    let (code, name, numbers_start) = if has_codes && LINE_CODE.is_match(&parts[0]) {
        (parts[0].trim().to_string(), parts[1].trim().to_string(), 2)
    } else {
        // Codeless sheet: field 0 is the name, but only if field 1 is a
        // plausible percentage and field 0 is not itself numeric or
        // code-shaped (guards against metadata lines).
        let second_val = parse_loose_number(&parts[1])?;
        if second_val > 100.0 {
            return None;
        }
        if LOT_NUMBER.is_match(&parts[0]) {
            return None;
        }
        if parse_loose_number(&parts[0]).is_some() {
            return None;
        }
        (NO_CODE.to_string(), parts[0].trim().to_string(), 1)
    };

    if name.is_empty() {
        return None;
    }

    let num_tokens: Vec<f64> = parts[numbers_start..]
        .iter()
        .filter_map(|p| parse_loose_number(p))
        .collect();
    if num_tokens.len() < 2 {
        return None;
    }

    let quantity = num_tokens[0];
    if quantity < MIN_QUANTITY {
        return None;
    }

    let mut row = IngredientLine::new(&code, &name, quantity, line_index);
    // Density: the first plausible value among the next up-to-3 numeric
    // tokens (the sheet interleaves prices and produced columns)
    if let Some(density) = num_tokens[1..]
        .iter()
        .take(3)
        .find(|n| (DENSITY_RANGE.0..=DENSITY_RANGE.1).contains(*n))
    {
        row = row.with_density(*density);
    }
    Some(row)
}

/// Pass 2, step 1: locate stage-header lines and classify their text.
fn collect_stage_headers(lines: &[&str]) -> Vec<(usize, Stage)> {
    let mut headers = Vec::new();
    for (idx, ln) in lines.iter().enumerate() {
        let trimmed = ln.trim();
        let first_token = match trimmed.split_whitespace().next() {
            Some(t) => t,
            None => continue,
        };
        if parse_loose_number(first_token).is_some() || LINE_CODE.is_match(first_token) {
            continue;
        }
        if STAGE_ALIAS.is_match(&trimmed.to_uppercase()) {
            let stage = stage_from_line(trimmed, Stage::BasePreparation);
            debug!("Stage header at line {}: '{}' -> {}", idx, trimmed, stage);
            headers.push((idx, stage));
        }
    }
    headers
}

/// Pass 2, step 2: forward-merge rows with headers by line position.
///
/// A stage header describes the step just completed, so each ingredient
/// takes the stage of the first header *below* it. Rows past the last
/// header get the terminal final-mix stage; with no headers at all,
/// everything stays at base preparation.
fn assign_stages(rows: &mut [IngredientLine], headers: &[(usize, Stage)]) {
    for row in rows.iter_mut() {
        let following = headers.iter().find(|(h_idx, _)| *h_idx > row.line_index);
        row.stage = match following {
            Some((_, stage)) => *stage,
            None if !headers.is_empty() => Stage::FinalMix,
            None => Stage::BasePreparation,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coded_rows() {
        let text = "ACRILICA SUPERIOR VOLUMEN P/G\n\
                    BLANCO 100-66 21.33 5.46\n\
                    CODIGO NOMBRE GENERICO CANT UNIDAD KG/GL\n\
                    SV-0001 AGUA 12.00 KG 3.78\n\
                    RV-0002 RESINA 25.00 KG 4.20\n\
                    TOTAL 100 21.33\n";
        let rows = extract_ingredients(text);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].code, "SV-0001");
        assert_eq!(rows[0].name, "AGUA");
        assert_eq!(rows[0].quantity_percent, 12.00);
        assert_eq!(rows[0].density, Some(3.78));
        assert_eq!(rows[1].code, "RV-0002");
        assert_eq!(rows[1].density, Some(4.20));
    }

    #[test]
    fn test_mass_equals_quantity_and_volume_derived() {
        let text = "CODIGO NOMBRE CANT\nSV-0001 AGUA 25.000 KG 3.778\nAV-004 CALGON 0.100 KG 9.07\n";
        let rows = extract_ingredients(text);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].mass, 25.0);
        assert_eq!(rows[0].volume, Some(6.62));
        assert_eq!(rows[1].volume, Some(0.01));
    }

    #[test]
    fn test_codeless_sheet() {
        let text = "PINTURA VERDE\n\
                    CODIGO NOMBRE GENERICO\n\
                    AGUA DESMINERALIZADA 25.00 KG 3.78\n\
                    RESINA VINILICA 30.00 KG 4.10\n";
        let rows = extract_ingredients(text);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].code, NO_CODE);
        assert_eq!(rows[0].name, "AGUA DESMINERALIZADA");
        assert_eq!(rows[1].name, "RESINA VINILICA");
    }

    #[test]
    fn test_codeless_guard_rejects_large_second_field() {
        // "VERDE 150.00 3.50" would swallow a metadata line: 150 > 100
        let text = "PINTURA\nCODIGO NOMBRE\nVERDE 150.00 3.50 1.0\nAGUA PURA 25.00 KG 3.78\n";
        let rows = extract_ingredients(text);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "AGUA PURA");
    }

    #[test]
    fn test_quantity_floor() {
        let text = "CODIGO NOMBRE\nSV-0001 TRAZA 0.0001 KG 3.78\nSV-0002 AGUA 5.000 KG 3.78\n";
        let rows = extract_ingredients(text);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "AGUA");
    }

    #[test]
    fn test_density_out_of_range_left_unset() {
        // 1.05 is below the plausible KG/GL range; prices must not be taken
        // as densities either
        let text = "CODIGO NOMBRE\nSV-0001 ADITIVO 2.000 KG 1.05 40.00\n";
        let rows = extract_ingredients(text);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].density, None);
        assert_eq!(rows[0].volume, None);
    }

    #[test]
    fn test_density_found_among_candidates() {
        // First numeric after quantity is a price, second is the density
        let text = "CODIGO NOMBRE\nSV-0001 RESINA 25.000 KG 2.25 3.94 56.25\n";
        let rows = extract_ingredients(text);
        assert_eq!(rows[0].density, Some(3.94));
    }

    #[test]
    fn test_mixed_numeric_formats_in_one_document() {
        // Comma decimals and dotted thousands side by side on one sheet
        let text = "CODIGO\tNOMBRE\n\
                    SV-0001\tAGUA\t12,50\tKG\t3,78\t1.234,56\n\
                    RV-0002\tRESINA\t25.00\tKG\t4.20\t1,234.56\n";
        let rows = extract_ingredients(text);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].quantity_percent, 12.5);
        assert_eq!(rows[0].density, Some(3.78));
        assert_eq!(rows[1].quantity_percent, 25.0);
        assert_eq!(rows[1].density, Some(4.20));
    }

    #[test]
    fn test_totals_row_skipped() {
        let text = "CODIGO NOMBRE GENERICO CANT\n\
                    SV-0001 AGUA 25.000 KG 3.778 25.00 6.62 0.00 175.78 46.52\n\
                    SV-0002 RESINA 75.000 KG 3.94 75.00 19.04 2.25 527.34 133.92\n\
                    100.68 100.68 21.33 151.67 40.81 1.00 707.90 150.00 99.0\n";
        let rows = extract_ingredients(text);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_stage_headers_not_ingredients() {
        let text = "CODIGO NOMBRE\n\
                    SV-0001 AGUA 25.000 KG 3.778\n\
                    MEZCLAR DURANTE 2 A 3 MINUTOS\n\
                    AV-011 NONYL FENOL 0.250 KG 4.01\n";
        let rows = extract_ingredients(text);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].stage, Stage::FastMix);
        assert_eq!(rows[1].stage, Stage::FinalMix);
    }

    #[test]
    fn test_stage_assignment_monotonic() {
        let text = "CODIGO NOMBRE\n\
                    SV-0001 AGUA 25.000 KG 3.778\n\
                    AV-004 CALGON 0.100 KG 9.07\n\
                    MEZCLAR DURANTE 2 A 3 MINUTOS\n\
                    PE-001 BOOM R760 15.000 KG 15.48\n\
                    DISPERSAR DURANTE 15 MINUTOS\n\
                    RV-001 RESINA 25.000 KG 3.94\n";
        let rows = extract_ingredients(text);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].stage, Stage::FastMix);
        assert_eq!(rows[1].stage, Stage::FastMix);
        assert_eq!(rows[2].stage, Stage::CowlesDispersion);
        // Past the last header: terminal stage, never an earlier one
        assert_eq!(rows[3].stage, Stage::FinalMix);
    }

    #[test]
    fn test_no_headers_defaults_to_base_preparation() {
        let text = "CODIGO NOMBRE\nSV-0001 AGUA 25.000 KG 3.778\n";
        let rows = extract_ingredients(text);
        assert_eq!(rows[0].stage, Stage::BasePreparation);
    }

    #[test]
    fn test_line_indices_recorded() {
        let text = "CODIGO NOMBRE\n\nSV-0001 AGUA 25.000 KG 3.778\n\nAV-004 CALGON 0.100 KG 9.07\n";
        let rows = extract_ingredients(text);
        // Blank lines are dropped before indexing
        assert_eq!(rows[0].line_index, 1);
        assert_eq!(rows[1].line_index, 2);
    }

    #[test]
    fn test_empty_document() {
        assert!(extract_ingredients("").is_empty());
        assert!(extract_ingredients("\n\n  \n").is_empty());
    }
}
