use std::path::PathBuf;

use clap::Parser;

/// Offline validation of meter readings against a YAML rule catalog.
///
/// Resolves the head group for the given meter and load type, evaluates
/// every applicable rule against the readings and prints the grouped
/// failure report as JSON.
#[derive(Parser, Debug)]
#[command(name = "vee-cli", about = "Validate meter readings against a rule catalog")]
pub struct CliArgs {
    /// Path to the YAML rule catalog
    #[arg(long, env = "VEE_CATALOG")]
    pub catalog: PathBuf,

    /// Readings file: `.csv` with a header row, otherwise a JSON array of objects
    #[arg(long)]
    pub readings: PathBuf,

    /// Meter type label or code: Phase-1/P-1, 3-Phase/P-3, LT_HTCT/LTCT
    #[arg(long)]
    pub meter_type: String,

    /// Load type label or code: "Block Load"/BL, "Instantaneous Profile"/IP
    #[arg(long)]
    pub load_type: String,

    /// Column identifying a record (overrides VEE_RECORD_KEY_FIELD)
    #[arg(long)]
    pub key_field: Option<String>,

    /// Report rules without a rule group under this name
    #[arg(long)]
    pub ungrouped_bucket: Option<String>,

    /// Evaluate records in parallel
    #[arg(long)]
    pub parallel: bool,

    /// Also print per-record anomaly text and skipped rules
    #[arg(long)]
    pub details: bool,
}
