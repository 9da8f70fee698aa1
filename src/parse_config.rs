//! # Parse Configuration Module
//!
//! Configuration surface for the parse-and-scale pipeline: presentation and
//! version labels, manual overrides, the default target volume, and the
//! physical-validation tolerances.

/// Default presentation label when a sheet carries none.
pub const DEFAULT_PRESENTATION: &str = "STANDARD";
/// Default formula version label.
pub const DEFAULT_VERSION: &str = "1.0";
/// Default production volume in gallons when detection finds nothing.
pub const DEFAULT_TARGET_VOLUME: f64 = 250.0;

/// Caller-supplied options for one parse.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Presentation label stamped into the metadata
    pub presentation: String,
    /// Version label stamped into the metadata
    pub version: String,
    /// Brand name, when the caller knows it ("INFINITI" / "MILAN")
    pub brand: Option<String>,
    /// Explicit brand prefix for the formula key, overriding brand mapping
    pub brand_code: Option<String>,
    /// Product type override, bypassing automatic detection
    pub type_override: Option<String>,
    /// Complete manual formula key; wins over everything
    pub key_override: Option<String>,
    /// Target volume fallback when the detection cascade finds nothing
    pub default_target_volume: f64,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            presentation: DEFAULT_PRESENTATION.to_string(),
            version: DEFAULT_VERSION.to_string(),
            brand: None,
            brand_code: None,
            type_override: None,
            key_override: None,
            default_target_volume: DEFAULT_TARGET_VOLUME,
        }
    }
}

/// Independent tolerances for the three physical-consistency checks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationTolerances {
    /// Allowed deviation of the quantity-percent sum from 100
    pub percent_sum: f64,
    /// Allowed deviation of the produced-volume sum from the target volume
    pub volume_sum: f64,
    /// Allowed deviation of the computed density ratio from the expected one
    pub ratio: f64,
}

impl Default for ValidationTolerances {
    fn default() -> Self {
        // Strict set, applied to scaled output
        Self {
            percent_sum: 1.0,
            volume_sum: 0.05,
            ratio: 0.5,
        }
    }
}

impl ValidationTolerances {
    /// The looser set used by the document-level consistency check on
    /// parsed (pre-scale) data, where spreadsheet rounding noise is larger.
    pub fn relaxed() -> Self {
        Self {
            percent_sum: 2.0,
            volume_sum: 5.0,
            ratio: 0.5,
        }
    }
}
