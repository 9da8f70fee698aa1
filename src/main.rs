use std::env;
use std::fs;
use std::io::Read;

use anyhow::{bail, Context, Result};
use log::info;
use serde::Serialize;

use formulab::formula_model::{ParsedFormula, ScaledFormula, ValidationReport};
use formulab::parse_config::{ParseOptions, ValidationTolerances};
use formulab::pipeline;

#[derive(Serialize)]
struct JsonOutput<'a> {
    formula: &'a ParsedFormula,
    scaled: Option<&'a ScaledFormula>,
    report: Option<&'a ValidationReport>,
    diagnostics: &'a [String],
}

fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    let mut json_output = false;
    let mut relaxed = false;
    let mut target_volume: Option<f64> = None;
    let mut input_path: Option<String> = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--json" => json_output = true,
            "--relaxed" => relaxed = true,
            "--target" => {
                let value = args.next().context("--target requires a value in gallons")?;
                target_volume = Some(value.parse().context("--target value must be numeric")?);
            }
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            _ if input_path.is_none() => input_path = Some(arg),
            _ => bail!("Unexpected argument: {}", arg),
        }
    }

    let text = match input_path {
        Some(ref path) => {
            fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?
        }
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read from stdin")?;
            buffer
        }
    };

    info!("Parsing formula document ({} bytes)", text.len());

    let options = ParseOptions {
        default_target_volume: target_volume.unwrap_or(ParseOptions::default().default_target_volume),
        ..Default::default()
    };
    let mut outcome = pipeline::parse_formula(&text, &options)?;
    if let Some(volume) = target_volume {
        outcome.formula.metadata.target_volume = volume;
    }

    let tolerances = if relaxed {
        ValidationTolerances::relaxed()
    } else {
        ValidationTolerances::default()
    };

    let scaled_result = pipeline::scale_and_validate(&outcome.formula, &tolerances);

    if json_output {
        let (scaled, report) = match scaled_result {
            Ok((ref scaled, ref report)) => (Some(scaled), Some(report)),
            Err(_) => (None, None),
        };
        let output = JsonOutput {
            formula: &outcome.formula,
            scaled,
            report,
            diagnostics: &outcome.diagnostics,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    match scaled_result {
        Ok((scaled, report)) => {
            println!("{}", pipeline::summarize(&outcome.formula, &scaled));
            println!();
            for row in &scaled.rows {
                println!(
                    "{:<12} {:<38} {:>10.2} KG {:>9.2} GL  {}",
                    row.code,
                    row.name,
                    row.produced_mass,
                    row.produced_volume,
                    row.stage.display_name()
                );
            }
            println!();
            println!("{}", report);
        }
        Err(err) => {
            println!("Formula parsed but could not be scaled: {}", err);
        }
    }

    for diagnostic in &outcome.diagnostics {
        println!("Note: {}", diagnostic);
    }

    Ok(())
}

fn print_usage() {
    println!("Usage: formulab [OPTIONS] [FILE]");
    println!();
    println!("Parses a paint formula sheet from FILE (or stdin), scales it to the");
    println!("target production volume and validates the result.");
    println!();
    println!("Options:");
    println!("  --target <gal>  Target volume when the sheet does not state one");
    println!("  --relaxed       Use relaxed validation tolerances");
    println!("  --json          Emit the full result as JSON");
}
