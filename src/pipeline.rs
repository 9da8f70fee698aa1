//! # Pipeline Module
//!
//! Orchestrates the full document flow: raw text -> metadata + ingredient
//! extraction -> formula key -> scaling -> validation. Each invocation is a
//! pure function of one text blob plus options; documents never share state,
//! so callers may run one pipeline per uploaded formula in parallel with no
//! coordination.
//!
//! Findings a human should see (unknown product type, empty extraction) are
//! returned as a diagnostics list on the result instead of being written to
//! any output stream.

use log::{info, warn};

use crate::formula_key::{build_formula_key, KeyInputs};
use crate::formula_model::{ParsedFormula, ScaledFormula, ValidationReport};
use crate::formula_parser::extract_ingredients;
use crate::metadata_extractor::{extract_metadata, non_blank_lines};
use crate::parse_config::{ParseOptions, ValidationTolerances};
use crate::scaling::{scale_ingredients, ScalingError};
use crate::validation::validate_scaled;

/// Fatal parse failures. The parser itself is tolerant of malformed lines,
/// so only an unusable document as a whole is an error.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// The document has no non-blank lines
    EmptyDocument,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::EmptyDocument => write!(f, "Document contains no text"),
        }
    }
}

impl std::error::Error for ParseError {}

/// A parsed formula plus the human-facing findings collected on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    /// The assembled formula
    pub formula: ParsedFormula,
    /// Findings for human review, in discovery order
    pub diagnostics: Vec<String>,
}

/// Parse a raw pasted document into a structured formula.
///
/// Unparseable lines are skipped; the only fatal case is an empty document.
/// Overrides in `options` are applied before the formula key is derived, so
/// the key remains regenerable from the same inputs.
pub fn parse_formula(text: &str, options: &ParseOptions) -> Result<ParseOutcome, ParseError> {
    if non_blank_lines(text).is_empty() {
        return Err(ParseError::EmptyDocument);
    }

    let mut metadata = extract_metadata(text, options.default_target_volume);
    metadata.presentation = options.presentation.clone();
    metadata.version = options.version.clone();
    metadata.brand = options.brand.clone();
    if let Some(ref override_type) = options.type_override {
        info!("Product type override applied: {}", override_type);
        metadata.product_type = Some(override_type.clone());
    }

    let ingredients = extract_ingredients(text);

    let mut diagnostics = Vec::new();
    if ingredients.is_empty() {
        warn!("No ingredient rows extracted from document");
        diagnostics.push("No ingredient rows could be extracted".to_string());
    }

    let key = build_formula_key(&KeyInputs {
        product_type: metadata.product_type.as_deref(),
        color: metadata.color.as_deref(),
        brand: metadata.brand.as_deref(),
        brand_code: options.brand_code.as_deref(),
        override_key: options.key_override.as_deref(),
    });
    if let Some(suggestion) = key.suggested_tag {
        diagnostics.push(format!(
            "Unknown product type '{}': tagged GEN, suggested tag '{}'",
            metadata.product_type.as_deref().unwrap_or(""),
            suggestion
        ));
    }

    info!(
        "Parsed formula {}: {} ingredients, target {} gal",
        key.key,
        ingredients.len(),
        metadata.target_volume
    );

    Ok(ParseOutcome {
        formula: ParsedFormula {
            metadata,
            formula_key: key.key,
            ingredients,
        },
        diagnostics,
    })
}

/// Scale a parsed formula to its own target volume and validate the result
/// against the strict tolerances (or whichever set the caller passes).
pub fn scale_and_validate(
    formula: &ParsedFormula,
    tolerances: &ValidationTolerances,
) -> Result<(ScaledFormula, ValidationReport), ScalingError> {
    let ratio = formula
        .metadata
        .density_ratio
        .ok_or(ScalingError::NonPositiveDensityRatio(0.0))?;
    let scaled = scale_ingredients(&formula.ingredients, formula.metadata.target_volume, ratio)?;
    let report = validate_scaled(&scaled, ratio, tolerances);
    Ok((scaled, report))
}

/// Executive summary of a scaled formula, for display by callers.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleSummary {
    /// Canonical formula key
    pub formula_key: String,
    /// Requested batch volume
    pub target_volume: f64,
    /// Reference batch volume from the sheet, when detected
    pub reference_volume: Option<f64>,
    /// target / reference, when the reference volume is known and positive
    pub scale_factor: Option<f64>,
    /// Number of ingredient rows
    pub ingredient_count: usize,
    /// Number of distinct stages
    pub stage_count: usize,
    /// Sum of produced masses in KG
    pub total_produced_mass: f64,
    /// Sum of produced volumes in GL
    pub total_produced_volume: f64,
}

/// Build the summary for a formula and its scaled rows.
pub fn summarize(formula: &ParsedFormula, scaled: &ScaledFormula) -> ScaleSummary {
    let scale_factor = formula
        .metadata
        .reference_volume
        .filter(|v| *v > 0.0)
        .map(|v| scaled.target_volume / v);
    ScaleSummary {
        formula_key: formula.formula_key.clone(),
        target_volume: scaled.target_volume,
        reference_volume: formula.metadata.reference_volume,
        scale_factor,
        ingredient_count: formula.ingredients.len(),
        stage_count: formula.stages().len(),
        total_produced_mass: scaled.produced_mass_sum(),
        total_produced_volume: scaled.produced_volume_sum(),
    }
}

impl std::fmt::Display for ScaleSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Formula key:      {}", self.formula_key)?;
        writeln!(f, "Target volume:    {:.2} GL", self.target_volume)?;
        if let Some(reference) = self.reference_volume {
            writeln!(f, "Reference volume: {:.2} GL", reference)?;
        }
        if let Some(factor) = self.scale_factor {
            writeln!(f, "Scale factor:     {:.3}", factor)?;
        }
        writeln!(f, "Ingredients:      {}", self.ingredient_count)?;
        writeln!(f, "Stages:           {}", self.stage_count)?;
        writeln!(f, "Produced mass:    {:.2} KG", self.total_produced_mass)?;
        write!(f, "Produced volume:  {:.2} GL", self.total_produced_volume)
    }
}
