mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use tracing::info;

use vee_core::config::EngineConfig;
use vee_core::{ReadingFormat, ReadingTable};
use vee_rules::catalog::Catalog;
use vee_rules::{ValidationOutcome, ValidationPipeline};

use crate::cli::CliArgs;

/// Apply command-line overrides on top of the environment's engine settings.
fn engine_config(args: &CliArgs, mut engine: EngineConfig) -> EngineConfig {
    if let Some(key_field) = &args.key_field {
        engine.record_key_field = key_field.clone();
    }
    if let Some(bucket) = &args.ungrouped_bucket {
        engine.ungrouped_bucket = Some(bucket.clone());
    }
    engine.parallel |= args.parallel;
    engine
}

fn render(outcome: ValidationOutcome, details: bool) -> Result<Value> {
    let value = if details {
        serde_json::to_value(outcome.into_detailed())?
    } else {
        serde_json::to_value(outcome.report)?
    };
    Ok(value)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    vee_core::config::load_dotenv();
    let args = CliArgs::parse();
    let engine = engine_config(&args, vee_core::Config::from_env().engine);
    engine.validate()?;

    let store = Catalog::load(&args.catalog)
        .with_context(|| format!("failed to load catalog {}", args.catalog.display()))?
        .into_store();

    let bytes = std::fs::read(&args.readings)
        .with_context(|| format!("failed to read {}", args.readings.display()))?;
    let file_name = args.readings.file_name().and_then(|n| n.to_str());
    let table = ReadingTable::decode(&bytes, ReadingFormat::detect(file_name, None))
        .with_context(|| format!("failed to decode readings {}", args.readings.display()))?;
    info!(records = table.len(), "readings loaded");

    let outcome = ValidationPipeline::from_config(&engine)
        .run_for_profile(&store, &args.meter_type, &args.load_type, &table)
        .await
        .context("validation failed")?;

    println!("{}", serde_json::to_string_pretty(&render(outcome, args.details)?)?);
    Ok(())
}
