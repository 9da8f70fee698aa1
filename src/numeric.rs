//! # Numeric Normalization Module
//!
//! This module parses the heterogeneous numeric string formats found in
//! copy-pasted spreadsheet cells: decimal commas, thousands separators,
//! stray currency and percent symbols, non-breaking spaces.
//!
//! ## Features
//!
//! - European decimal comma ("4,72" -> 4.72)
//! - Dotted thousands groups ("1.234,56" -> 1234.56)
//! - Currency/percent noise stripping ("$71.25", "25.0%")
//! - Never panics: unparsable input yields `None`
//!
//! ## Usage
//!
//! ```rust
//! use formulab::numeric::parse_loose_number;
//!
//! assert_eq!(parse_loose_number("1.234,56"), Some(1234.56));
//! assert_eq!(parse_loose_number("1,234.56"), Some(1234.56));
//! assert_eq!(parse_loose_number("AGUA"), None);
//! ```

use lazy_static::lazy_static;
use log::trace;
use regex::Regex;

lazy_static! {
    static ref MULTISPACE: Regex = Regex::new(r"\s+").expect("whitespace pattern should be valid");
}

/// Parse a spreadsheet-style numeric cell into an `f64`.
///
/// Normalization steps, in order:
/// 1. Strip all whitespace (including U+00A0), `$` and `%`.
/// 2. A single comma with no dot is a decimal separator.
/// 3. With a comma present, dots are thousands separators ("1.234,56").
/// 4. Multiple dots with no comma collapse into one integer run followed by
///    the last group as the decimal part ("1.234.567" -> "1234.567" style
///    would lose digits, so the final group is kept as decimals only when
///    the remaining groups form the integer part).
///
/// Returns `None` for anything that still fails to parse; never panics.
pub fn parse_loose_number(raw: &str) -> Option<f64> {
    let mut x: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{00A0}' && *c != '$' && *c != '%')
        .collect();
    if x.is_empty() {
        return None;
    }

    let commas = x.matches(',').count();
    let dots = x.matches('.').count();

    if commas == 1 && dots == 0 {
        // Decimal comma: "4,72" -> "4.72"
        x = x.replace(',', ".");
    } else if commas >= 1 && dots >= 1 {
        // Mixed separators: the rightmost symbol is the decimal one.
        let last_comma = x.rfind(',').unwrap_or(0);
        let last_dot = x.rfind('.').unwrap_or(0);
        if last_comma > last_dot {
            // "1.234,56" -> dots are thousands groups
            x = x.replace('.', "").replace(',', ".");
        } else {
            // "1,234.56" -> commas are thousands groups
            x = x.replace(',', "");
        }
    } else if dots > 1 {
        // "1.234.567" -> join all groups but the last, keep it as decimals
        let mut groups: Vec<&str> = x.split('.').collect();
        let dec = groups.pop().unwrap_or("");
        x = format!("{}.{}", groups.concat(), dec);
    } else if commas > 1 {
        x = x.replace(',', "");
    }

    match x.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            trace!("Failed to normalize numeric cell: '{}'", raw);
            None
        }
    }
}

/// Collapse runs of whitespace to single spaces and trim.
pub fn clean_spaces(s: &str) -> String {
    MULTISPACE.replace_all(s.trim(), " ").into_owned()
}

/// Round to two decimal places, the precision used on production sheets.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
