//! # Formulab
//!
//! Parses paint formula sheets pasted as free text, scales the recipe to a
//! target production volume and validates the result for mass balance and
//! density consistency.

pub mod formula_key;
pub mod formula_model;
pub mod formula_parser;
pub mod line_tokenizer;
pub mod metadata_extractor;
pub mod numeric;
pub mod parse_config;
pub mod pipeline;
pub mod scaling;
pub mod stage_detection;
pub mod validation;
