//! `validate` command implementation.

use anyhow::{Context, Result};
use config_loader::{ConfigLoader, TrackerConfig};
use contracts::LandmarkSourceKind;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    mode: String,
    landmark_source: String,
    outputs: Vec<&'static str>,
    output_dir: String,
    bind: String,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(summarize(&config)),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

fn summarize(config: &TrackerConfig) -> ConfigSummary {
    let output = &config.output;
    let outputs = [("csv", output.csv), ("stream", output.stream), ("log", output.log)]
        .into_iter()
        .filter_map(|(name, enabled)| enabled.then_some(name))
        .collect();

    ConfigSummary {
        mode: format!("{:?}", config.mode),
        landmark_source: format!("{:?}", config.landmarks.source),
        outputs,
        output_dir: output.dir.display().to_string(),
        bind: config.server.bind.clone(),
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &TrackerConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if !config.output.any_enabled() {
        warnings.push("No outputs enabled - measurements are not written to disk".to_string());
    }
    if !config.server.write_outputs {
        warnings.push("server.write_outputs is false - server sessions write no files".to_string());
    }

    let landmarks = &config.landmarks;
    if landmarks.source == LandmarkSourceKind::Synthetic {
        if landmarks.drop_every > 0 {
            warnings.push(format!(
                "landmarks.drop_every = {} skips frames on purpose",
                landmarks.drop_every
            ));
        }
        let budget = config.synchronizer.wait_budget();
        if landmarks.latency_ms as u128 > budget.as_millis() {
            warnings.push(format!(
                "landmarks.latency_ms = {} exceeds the {} ms wait budget - online frames will reuse old landmarks",
                landmarks.latency_ms,
                budget.as_millis()
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Mode: {}", summary.mode);
            println!("  Landmarks: {}", summary.landmark_source);
            println!("  Outputs: {:?} -> {}", summary.outputs, summary.output_dir);
            println!("  Server: {}", summary.bind);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
