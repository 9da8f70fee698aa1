//! # Consistency Validation Module
//!
//! Physical-consistency checks over scaled and parsed formulas. The checks
//! report, they never correct: a breached tolerance becomes a human-readable
//! issue string plus numeric metrics, and the caller decides what to do with
//! the flagged result.
//!
//! ## Checks on a scaled formula
//!
//! 1. Σ(quantity_percent) ≈ 100 ± percent_sum tolerance
//! 2. Σ(produced_volume) ≈ target_volume ± volume_sum tolerance
//! 3. Σ(mass) / Σ(volume) ≈ expected density ratio ± ratio tolerance
//! 4. Hard errors: zero total volume (ratio undiscoverable), NaN or
//!    negative produced values

use log::debug;

use crate::formula_model::{ParsedFormula, ScaledFormula, ValidationReport};
use crate::parse_config::ValidationTolerances;

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Validate a scaled formula against the target volume and expected density
/// ratio it was produced for. Pure function: inputs are never mutated.
pub fn validate_scaled(
    scaled: &ScaledFormula,
    expected_ratio: f64,
    tolerances: &ValidationTolerances,
) -> ValidationReport {
    let mut report = ValidationReport::passing();

    // Check 1: percent sum
    let percent_sum: f64 = scaled.rows.iter().map(|r| r.quantity_percent).sum();
    report.metrics.insert("percent_sum".to_string(), round3(percent_sum));
    if (percent_sum - 100.0).abs() > tolerances.percent_sum {
        report.push_issue(format!(
            "Quantity sum = {:.2}% (expected 100.00% +/- {})",
            percent_sum, tolerances.percent_sum
        ));
    }

    // Check 2: produced volume sum
    let volume_sum = scaled.produced_volume_sum();
    report.metrics.insert("produced_volume_sum".to_string(), round3(volume_sum));
    if (volume_sum - scaled.target_volume).abs() > tolerances.volume_sum {
        report.push_issue(format!(
            "Produced volume sum = {:.2} gal (expected {:.2} +/- {})",
            volume_sum, scaled.target_volume, tolerances.volume_sum
        ));
    }

    // Check 3: computed density ratio
    let total_mass: f64 = scaled.rows.iter().map(|r| r.mass).sum();
    let total_volume: f64 = scaled.rows.iter().map(|r| r.volume).sum();
    if total_volume > 0.0 {
        let computed = total_mass / total_volume;
        report.metrics.insert("computed_ratio".to_string(), round3(computed));
        if (computed - expected_ratio).abs() > tolerances.ratio {
            report.push_issue(format!(
                "Computed P/G = {:.2} (expected {:.2} +/- {})",
                computed, expected_ratio, tolerances.ratio
            ));
        }
    } else {
        // Hard error: the ratio cannot be computed at all
        report.push_issue("Total volume is 0, P/G cannot be computed".to_string());
    }

    // Check 4: produced values must be defined and non-negative
    if scaled
        .rows
        .iter()
        .any(|r| r.produced_mass.is_nan() || r.produced_mass < 0.0)
    {
        report.push_issue("Invalid values detected in produced mass".to_string());
    }
    if scaled
        .rows
        .iter()
        .any(|r| r.produced_volume.is_nan() || r.produced_volume < 0.0)
    {
        report.push_issue("Invalid values detected in produced volume".to_string());
    }

    debug!(
        "Scaled validation: valid={} issues={} metrics={:?}",
        report.is_valid,
        report.issues.len(),
        report.metrics
    );
    report
}

/// Document-level consistency check on a parsed (pre-scale) formula, using
/// the looser tolerance set: spreadsheet rounding noise accumulates before
/// scaling, so tight thresholds would flag healthy sheets.
pub fn check_parsed_consistency(
    formula: &ParsedFormula,
    tolerances: &ValidationTolerances,
) -> ValidationReport {
    let mut report = ValidationReport::passing();

    let percent_sum = formula.percent_sum();
    report.metrics.insert("percent_sum".to_string(), round3(percent_sum));
    if !formula.ingredients.is_empty() && (percent_sum - 100.0).abs() > tolerances.percent_sum {
        report.push_issue(format!(
            "Quantity sum = {:.2} (expected ~100)",
            percent_sum
        ));
    }

    let total_mass = formula.total_mass();
    let total_volume = formula.total_volume();
    if let Some(expected) = formula.metadata.density_ratio {
        if total_volume > 0.0 {
            let computed = total_mass / total_volume;
            report.metrics.insert("computed_ratio".to_string(), round3(computed));
            if (computed - expected).abs() > tolerances.ratio {
                report.push_issue(format!(
                    "Computed P/G = {:.2} vs expected {:.2}",
                    computed, expected
                ));
            }
        }
    }

    report
}
