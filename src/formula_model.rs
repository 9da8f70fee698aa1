//! # Formula Data Model
//!
//! This module defines the data structures flowing through the parse-and-scale
//! pipeline: header metadata, ingredient rows, the assembled parsed formula,
//! scaled production rows, and the validation report.
//!
//! ## Core Concepts
//!
//! - **ParsedMetadata**: header facts extracted from the top of a pasted sheet
//! - **IngredientLine**: one ingredient row on a 100-unit percentage basis
//! - **ParsedFormula**: metadata + derived formula key + ordered ingredients
//! - **ScaledIngredient**: an ingredient row with produced mass/volume for a
//!   requested batch volume
//! - **ValidationReport**: physical-consistency findings, reported but never
//!   silently corrected
//!
//! ## Usage
//!
//! ```rust
//! use formulab::formula_model::{IngredientLine, Stage};
//!
//! let row = IngredientLine::new("SV-0001", "AGUA", 25.0, 3)
//!     .with_density(3.778)
//!     .with_stage(Stage::FastMix);
//! assert_eq!(row.mass, 25.0);
//! assert_eq!(row.volume, Some(6.62));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::numeric::round2;

/// Named manufacturing stages an ingredient row can be attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Fast mix at the kettle (2-3 min)
    FastMix,
    /// High-shear Cowles dispersion (15 min @ 1600-2800 RPM)
    CowlesDispersion,
    /// Slow dissolution (5-10 min)
    SlowDissolution,
    /// Default for rows before any stage header
    BasePreparation,
    /// Terminal stage for rows after the last stage header
    FinalMix,
}

impl Stage {
    /// Operator-facing label with timing hints, as printed on work orders.
    pub fn display_name(&self) -> &'static str {
        match self {
            Stage::FastMix => "Fast mix (2-3 min)",
            Stage::CowlesDispersion => "Cowles dispersion (15 min @ 1600-2800 RPM)",
            Stage::SlowDissolution => "Slow dissolution (5-10 min)",
            Stage::BasePreparation => "Base preparation",
            Stage::FinalMix => "Final mix (2-3 min)",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Header metadata extracted from the top of a pasted formula sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedMetadata {
    /// Product type as printed on the sheet (e.g. "Acrilica Satinada")
    pub product_type: Option<String>,

    /// Color description (e.g. "Blanco Con White Ultra")
    pub color: Option<String>,

    /// Presentation label, caller-configurable (default "STANDARD")
    pub presentation: String,

    /// Formula version label (default "1.0")
    pub version: String,

    /// Reference batch volume printed on the sheet, in gallons
    pub reference_volume: Option<f64>,

    /// Target density ratio P/G (total mass / total volume signature)
    pub density_ratio: Option<f64>,

    /// Production volume to scale to; always populated, falling back to a
    /// caller-supplied default when the sheet carries no usable number
    pub target_volume: f64,

    /// Brand name when known (e.g. "INFINITI", "MILAN")
    pub brand: Option<String>,
}

/// One ingredient row, on a 100-unit percentage-composition basis.
///
/// `mass` always equals `quantity_percent`: the composition is expressed on
/// a mass basis, so the percentage doubles as kilograms of a reference batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientLine {
    /// Ingredient code ("SV-0001"); "SIN-CODIGO" when the sheet has none
    pub code: String,

    /// Generic ingredient name
    pub name: String,

    /// Mass share as a percentage of the 100-unit reference batch
    pub quantity_percent: f64,

    /// Mass unit, fixed "KG" basis
    pub unit: String,

    /// Density in KG/GL when a physically plausible value was found
    pub density: Option<f64>,

    /// Reference-batch mass; invariant: equals `quantity_percent`
    pub mass: f64,

    /// Reference-batch volume, `mass / density`, rounded to 2 decimals
    pub volume: Option<f64>,

    /// Manufacturing stage this row is attributed to
    pub stage: Stage,

    /// Zero-based index of the source line within the non-blank document
    /// lines; drives the stage-assignment join
    pub line_index: usize,
}

impl IngredientLine {
    /// Create a new row; `mass` is set to `quantity_percent` by convention.
    pub fn new(code: &str, name: &str, quantity_percent: f64, line_index: usize) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            quantity_percent,
            unit: "KG".to_string(),
            density: None,
            mass: quantity_percent,
            volume: None,
            stage: Stage::BasePreparation,
            line_index,
        }
    }

    /// Set the density and derive the reference-batch volume from it.
    pub fn with_density(mut self, density: f64) -> Self {
        self.density = Some(density);
        self.volume = Some(round2(self.mass / density));
        self
    }

    /// Set the stage assignment.
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }
}

impl fmt::Display for IngredientLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {:.3} {}", self.code, self.name, self.quantity_percent, self.unit)?;
        if let Some(d) = self.density {
            write!(f, " @ {:.2} KG/GL", d)?;
        }
        Ok(())
    }
}

/// A fully parsed formula: metadata, derived key, and ordered ingredients.
///
/// Row order is document order and is significant: it drives stage
/// assignment and is preserved through scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedFormula {
    /// Extracted header metadata
    pub metadata: ParsedMetadata,

    /// Canonical identifier "<brand>-<type_tag>-<color_tag>", deterministic
    /// from metadata plus any overrides
    pub formula_key: String,

    /// Ingredient rows in document order
    pub ingredients: Vec<IngredientLine>,
}

impl ParsedFormula {
    /// Sum of the quantity percentages (expected ~100).
    pub fn percent_sum(&self) -> f64 {
        self.ingredients.iter().map(|i| i.quantity_percent).sum()
    }

    /// Sum of reference-batch masses.
    pub fn total_mass(&self) -> f64 {
        self.ingredients.iter().map(|i| i.mass).sum()
    }

    /// Sum of reference-batch volumes over rows with a resolved density.
    pub fn total_volume(&self) -> f64 {
        self.ingredients.iter().filter_map(|i| i.volume).sum()
    }

    /// Distinct stages in row order, for operator instructions.
    pub fn stages(&self) -> Vec<Stage> {
        let mut seen = Vec::new();
        for row in &self.ingredients {
            if !seen.contains(&row.stage) {
                seen.push(row.stage);
            }
        }
        seen
    }
}

/// An ingredient row scaled to a requested production volume.
///
/// Created fresh on every scaling call; the source [`ParsedFormula`] is
/// never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaledIngredient {
    /// Ingredient code
    pub code: String,
    /// Generic ingredient name
    pub name: String,
    /// Mass share, carried through unchanged
    pub quantity_percent: f64,
    /// Mass unit, fixed "KG"
    pub unit: String,
    /// Density in KG/GL
    pub density: f64,
    /// Reference-batch mass (equals `quantity_percent`), rounded to 2 decimals
    pub mass: f64,
    /// Reference-batch volume, rounded to 2 decimals
    pub volume: f64,
    /// Stage assignment, carried through unchanged
    pub stage: Stage,
    /// Absolute mass required for the target batch, rounded to 2 decimals
    pub produced_mass: f64,
    /// Absolute volume required for the target batch, rounded to 2 decimals
    pub produced_volume: f64,
}

/// The result of scaling a parsed formula to a target volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaledFormula {
    /// Batch volume the rows were scaled to
    pub target_volume: f64,
    /// Density ratio used for mass scaling
    pub density_ratio: f64,
    /// Scaled rows, in the source formula's document order
    pub rows: Vec<ScaledIngredient>,
}

impl ScaledFormula {
    /// Sum of produced volumes (expected ~target_volume).
    pub fn produced_volume_sum(&self) -> f64 {
        self.rows.iter().map(|r| r.produced_volume).sum()
    }

    /// Sum of produced masses.
    pub fn produced_mass_sum(&self) -> f64 {
        self.rows.iter().map(|r| r.produced_mass).sum()
    }
}

/// Physical-consistency findings for a scaled (or parsed) formula.
///
/// Pure output: issues are human-readable strings, metrics are named numbers.
/// The pipeline reports breaches, it never renormalizes quantities to force
/// the invariants to hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// True when no issues were found
    pub is_valid: bool,
    /// Human-readable issue strings, in check order
    pub issues: Vec<String>,
    /// Named numeric metrics computed during validation
    pub metrics: BTreeMap<String, f64>,
}

impl ValidationReport {
    /// An empty, passing report.
    pub fn passing() -> Self {
        Self {
            is_valid: true,
            issues: Vec::new(),
            metrics: BTreeMap::new(),
        }
    }

    /// Record an issue and flip the validity flag.
    pub fn push_issue(&mut self, issue: String) {
        self.issues.push(issue);
        self.is_valid = false;
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid {
            writeln!(f, "Validation: OK")?;
        } else {
            writeln!(f, "Validation: {} issue(s)", self.issues.len())?;
            for issue in &self.issues {
                writeln!(f, "  - {}", issue)?;
            }
        }
        for (name, value) in &self.metrics {
            writeln!(f, "  {} = {}", name, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingredient_line_mass_convention() {
        let row = IngredientLine::new("SV-0001", "AGUA", 25.0, 0);
        assert_eq!(row.mass, row.quantity_percent);
        assert_eq!(row.unit, "KG");
        assert_eq!(row.volume, None);
        assert_eq!(row.stage, Stage::BasePreparation);
    }

    #[test]
    fn test_ingredient_line_volume_from_density() {
        let row = IngredientLine::new("SV-0001", "AGUA", 25.0, 0).with_density(3.778);
        assert_eq!(row.volume, Some(6.62));
    }

    #[test]
    fn test_formula_totals() {
        let formula = ParsedFormula {
            metadata: test_metadata(),
            formula_key: "IN-SAT-BLANCO".to_string(),
            ingredients: vec![
                IngredientLine::new("SV-0001", "AGUA", 12.0, 0).with_density(3.78),
                IngredientLine::new("RV-0002", "RESINA", 25.0, 1).with_density(4.20),
            ],
        };
        assert!((formula.percent_sum() - 37.0).abs() < 1e-9);
        assert!((formula.total_mass() - 37.0).abs() < 1e-9);
        // 12/3.78 = 3.17, 25/4.20 = 5.95
        assert!((formula.total_volume() - 9.12).abs() < 1e-9);
    }

    #[test]
    fn test_stages_in_row_order() {
        let formula = ParsedFormula {
            metadata: test_metadata(),
            formula_key: "IN-GEN-BL".to_string(),
            ingredients: vec![
                IngredientLine::new("A", "A", 1.0, 0).with_stage(Stage::FastMix),
                IngredientLine::new("B", "B", 1.0, 1).with_stage(Stage::FastMix),
                IngredientLine::new("C", "C", 1.0, 2).with_stage(Stage::FinalMix),
            ],
        };
        assert_eq!(formula.stages(), vec![Stage::FastMix, Stage::FinalMix]);
    }

    #[test]
    fn test_validation_report_flow() {
        let mut report = ValidationReport::passing();
        assert!(report.is_valid);
        report.metrics.insert("percent_sum".to_string(), 100.68);
        report.push_issue("percent sum off".to_string());
        assert!(!report.is_valid);
        assert_eq!(report.issues.len(), 1);
    }

    #[test]
    fn test_stage_display_names() {
        assert_eq!(Stage::BasePreparation.display_name(), "Base preparation");
        assert!(Stage::CowlesDispersion.display_name().contains("Cowles"));
    }

    fn test_metadata() -> ParsedMetadata {
        ParsedMetadata {
            product_type: Some("Acrilica Satinada".to_string()),
            color: Some("Blanco".to_string()),
            presentation: "STANDARD".to_string(),
            version: "1.0".to_string(),
            reference_volume: Some(21.33),
            density_ratio: Some(4.72),
            target_volume: 150.0,
            brand: None,
        }
    }
}
