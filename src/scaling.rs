//! # Scaling Engine Module
//!
//! Converts a percentage-composition formula into absolute produced
//! quantities for a requested batch volume.
//!
//! The math is fixed:
//!
//! - `mass = quantity_percent` (constant, never recomputed)
//! - `volume = mass / density`
//! - `produced_mass = quantity_percent * target_volume * density_ratio / total_mass`
//! - `produced_volume = volume * target_volume / total_volume`
//!
//! All derived columns are rounded to 2 decimals for reporting. Every error
//! here is fatal and non-retryable: an inconsistent input deterministically
//! produces the same failure, so the document is reported and dropped, never
//! retried.

use log::{debug, info};

use crate::formula_model::{IngredientLine, ParsedFormula, ScaledFormula, ScaledIngredient};
use crate::numeric::round2;

/// Fatal scaling failures.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalingError {
    /// No ingredient rows to scale
    EmptyFormula,
    /// Requested batch volume must be positive
    NonPositiveTargetVolume(f64),
    /// Density ratio must be positive
    NonPositiveDensityRatio(f64),
    /// A row has no resolvable density, so its volume is undefined
    MissingDensity(String),
    /// Aggregate mass came out non-positive
    NonPositiveTotalMass(f64),
    /// Aggregate volume came out non-positive
    NonPositiveTotalVolume(f64),
}

impl std::fmt::Display for ScalingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalingError::EmptyFormula => write!(f, "Formula has no ingredient rows"),
            ScalingError::NonPositiveTargetVolume(v) => {
                write!(f, "Target volume must be > 0, got {v}")
            }
            ScalingError::NonPositiveDensityRatio(v) => {
                write!(f, "Density ratio must be > 0, got {v}")
            }
            ScalingError::MissingDensity(name) => {
                write!(f, "No density resolved for ingredient '{name}'")
            }
            ScalingError::NonPositiveTotalMass(v) => write!(f, "Invalid total mass: {v}"),
            ScalingError::NonPositiveTotalVolume(v) => write!(f, "Invalid total volume: {v}"),
        }
    }
}

impl std::error::Error for ScalingError {}

/// Scale ingredient rows to a target batch volume.
///
/// The input rows are read, never mutated; the result is built fresh on
/// every call.
pub fn scale_ingredients(
    rows: &[IngredientLine],
    target_volume: f64,
    density_ratio: f64,
) -> Result<ScaledFormula, ScalingError> {
    if rows.is_empty() {
        return Err(ScalingError::EmptyFormula);
    }
    if target_volume <= 0.0 {
        return Err(ScalingError::NonPositiveTargetVolume(target_volume));
    }
    if density_ratio <= 0.0 {
        return Err(ScalingError::NonPositiveDensityRatio(density_ratio));
    }

    // Reference-batch columns; a row without density has no volume and the
    // whole scale is undefined
    let mut reference: Vec<(f64, f64, f64)> = Vec::with_capacity(rows.len());
    for row in rows {
        let density = row
            .density
            .ok_or_else(|| ScalingError::MissingDensity(row.name.clone()))?;
        let mass = row.quantity_percent;
        let volume = mass / density;
        reference.push((mass, volume, density));
    }

    let total_mass: f64 = reference.iter().map(|(m, _, _)| m).sum();
    let total_volume: f64 = reference.iter().map(|(_, v, _)| v).sum();
    if total_mass <= 0.0 {
        return Err(ScalingError::NonPositiveTotalMass(total_mass));
    }
    if total_volume <= 0.0 {
        return Err(ScalingError::NonPositiveTotalVolume(total_volume));
    }

    debug!(
        "Scaling {} rows: total_mass={:.2} total_volume={:.2} target={} ratio={}",
        rows.len(),
        total_mass,
        total_volume,
        target_volume,
        density_ratio
    );

    let scaled = rows
        .iter()
        .zip(reference.iter())
        .map(|(row, (mass, volume, density))| ScaledIngredient {
            code: row.code.clone(),
            name: row.name.clone(),
            quantity_percent: row.quantity_percent,
            unit: row.unit.clone(),
            density: *density,
            mass: round2(*mass),
            volume: round2(*volume),
            stage: row.stage,
            produced_mass: round2(row.quantity_percent * target_volume * density_ratio / total_mass),
            produced_volume: round2(volume * target_volume / total_volume),
        })
        .collect();

    info!(
        "Scaled {} ingredient rows to {} gallons (P/G {})",
        rows.len(),
        target_volume,
        density_ratio
    );

    Ok(ScaledFormula {
        target_volume,
        density_ratio,
        rows: scaled,
    })
}

/// Scale a parsed formula using its own metadata.
///
/// The metadata's density ratio is required; target volume always exists.
pub fn scale_formula(formula: &ParsedFormula) -> Result<ScaledFormula, ScalingError> {
    let ratio = formula
        .metadata
        .density_ratio
        .ok_or(ScalingError::NonPositiveDensityRatio(0.0))?;
    scale_ingredients(&formula.ingredients, formula.metadata.target_volume, ratio)
}

/// Computed density ratio of a row set: total mass over total volume.
pub fn computed_ratio(rows: &[ScaledIngredient]) -> Option<f64> {
    let total_mass: f64 = rows.iter().map(|r| r.mass).sum();
    let total_volume: f64 = rows.iter().map(|r| r.volume).sum();
    if total_volume > 0.0 {
        Some(total_mass / total_volume)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula_model::IngredientLine;

    fn sample_rows() -> Vec<IngredientLine> {
        vec![
            IngredientLine::new("SV-0001", "AGUA", 12.0, 0).with_density(3.78),
            IngredientLine::new("RV-0002", "RESINA", 25.0, 1).with_density(4.20),
        ]
    }

    #[test]
    fn test_round_trip_volume() {
        let scaled = scale_ingredients(&sample_rows(), 25.0, 5.46).unwrap();
        let sum: f64 = scaled.produced_volume_sum();
        assert!((sum - 25.0).abs() < 0.2, "sum {} not ~25", sum);
        assert!(scaled.rows.iter().all(|r| r.produced_mass > 0.0));
    }

    #[test]
    fn test_produced_totals_reproduce_target_ratio() {
        // Sum(produced_mass) / Sum(produced_volume) collapses to the target
        // ratio regardless of the row composition
        let scaled = scale_ingredients(&sample_rows(), 25.0, 5.46).unwrap();
        let ratio = scaled.produced_mass_sum() / scaled.produced_volume_sum();
        assert!((ratio - 5.46).abs() < 0.01, "ratio {} not ~5.46", ratio);
    }

    #[test]
    fn test_mass_is_quantity_percent() {
        let scaled = scale_ingredients(&sample_rows(), 25.0, 5.46).unwrap();
        for row in &scaled.rows {
            assert_eq!(row.mass, row.quantity_percent);
        }
    }

    #[test]
    fn test_proportionality() {
        let scaled = scale_ingredients(&sample_rows(), 100.0, 5.0).unwrap();
        // produced masses keep the percentage proportions
        let ratio = scaled.rows[1].produced_mass / scaled.rows[0].produced_mass;
        assert!((ratio - 25.0 / 12.0).abs() < 0.01);
    }

    #[test]
    fn test_rounding_to_two_decimals() {
        let scaled = scale_ingredients(&sample_rows(), 25.0, 5.46).unwrap();
        for row in &scaled.rows {
            for v in [row.mass, row.volume, row.produced_mass, row.produced_volume] {
                assert!((v * 100.0 - (v * 100.0).round()).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_empty_rows() {
        assert_eq!(scale_ingredients(&[], 25.0, 5.46), Err(ScalingError::EmptyFormula));
    }

    #[test]
    fn test_non_positive_target() {
        let err = scale_ingredients(&sample_rows(), 0.0, 5.46).unwrap_err();
        assert_eq!(err, ScalingError::NonPositiveTargetVolume(0.0));
        let err = scale_ingredients(&sample_rows(), -5.0, 5.46).unwrap_err();
        assert_eq!(err, ScalingError::NonPositiveTargetVolume(-5.0));
    }

    #[test]
    fn test_non_positive_ratio() {
        let err = scale_ingredients(&sample_rows(), 25.0, 0.0).unwrap_err();
        assert_eq!(err, ScalingError::NonPositiveDensityRatio(0.0));
    }

    #[test]
    fn test_missing_density_is_fatal() {
        let rows = vec![
            IngredientLine::new("SV-0001", "AGUA", 12.0, 0).with_density(3.78),
            IngredientLine::new("AV-XXX", "ADITIVO", 2.0, 1),
        ];
        let err = scale_ingredients(&rows, 25.0, 5.46).unwrap_err();
        assert_eq!(err, ScalingError::MissingDensity("ADITIVO".to_string()));
    }

    #[test]
    fn test_source_rows_unchanged() {
        let rows = sample_rows();
        let before = rows.clone();
        let _ = scale_ingredients(&rows, 25.0, 5.46).unwrap();
        assert_eq!(rows, before);
    }

    #[test]
    fn test_computed_ratio() {
        let scaled = scale_ingredients(&sample_rows(), 25.0, 5.46).unwrap();
        let ratio = computed_ratio(&scaled.rows).unwrap();
        // 37 KG over (12/3.78 + 25/4.20) GL
        let expected = 37.0 / (12.0 / 3.78 + 25.0 / 4.20);
        assert!((ratio - expected).abs() < 0.02);
    }
}
