//! Reading validation endpoints.
//!
//! Both endpoints run the full pipeline for a meter/load profile and answer
//! with the grouped report (`{"<group>": [keys...], "total_size": n}`).
//! Uploaded files are CSV with a header row, or a JSON array of records.
//! With `?details=true` the report is wrapped together with per-record
//! anomaly text and the rules skipped for the batch.

use std::sync::Arc;

use axum::extract::{Multipart, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use vee_core::{ReadingFormat, ReadingTable};
use vee_rules::{PipelineError, ValidationOutcome};

use super::common::{bad_request, pipeline_err, to_json, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub meter_type: String,
    pub load_type: String,
    #[serde(default)]
    pub details: bool,
}

#[derive(Debug, Deserialize)]
pub struct DetailsParam {
    #[serde(default)]
    pub details: bool,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub meter_type: String,
    pub load_type: String,
    /// JSON array of reading objects.
    pub records: Value,
}

fn render(outcome: ValidationOutcome, details: bool) -> ApiResult<Json<Value>> {
    if details {
        to_json(outcome.into_detailed())
    } else {
        to_json(outcome.report)
    }
}

async fn run(
    state: &AppState,
    meter_type: &str,
    load_type: &str,
    table: ReadingTable,
    details: bool,
) -> ApiResult<Json<Value>> {
    let outcome = state
        .pipeline
        .run_for_profile(state.store.as_rule_store(), meter_type, load_type, &table)
        .await
        .map_err(pipeline_err)?;
    render(outcome, details)
}

/// POST /upload?meter_type=..&load_type=..: multipart CSV or JSON file.
///
/// Reads the first multipart field. The format follows the file extension,
/// then the field's content type. The size limit comes from
/// `VEE_MAX_UPLOAD_MB`.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    // Reject unknown profiles before reading the body.
    state
        .pipeline
        .strategy(&params.meter_type, &params.load_type)
        .map_err(pipeline_err)?;

    let field = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Multipart error: {e}")))?
        .ok_or_else(|| bad_request("No file provided"))?;
    let filename = field.file_name().unwrap_or("unnamed").to_string();
    let format = ReadingFormat::detect(field.file_name(), field.content_type());
    let bytes = field
        .bytes()
        .await
        .map_err(|e| bad_request(format!("Failed to read file: {e}")))?;

    let limit = state.config.engine.max_upload_bytes();
    if bytes.len() > limit {
        return Err(bad_request(format!(
            "File exceeds {} MB limit ({} bytes)",
            state.config.engine.max_upload_mb,
            bytes.len()
        )));
    }

    let table = ReadingTable::decode(&bytes, format)
        .map_err(|e| pipeline_err(PipelineError::Table(e)))?;
    info!(
        "Upload '{}' ({:?}): {} records ({} bytes) for {}/{}",
        filename,
        format,
        table.len(),
        bytes.len(),
        params.meter_type,
        params.load_type
    );

    run(&state, &params.meter_type, &params.load_type, table, params.details).await
}

/// POST /validate: JSON body with the records inline.
pub async fn validate(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DetailsParam>,
    Json(req): Json<ValidateRequest>,
) -> ApiResult<Json<Value>> {
    let table = ReadingTable::from_json_value(req.records)
        .map_err(|e| pipeline_err(PipelineError::Table(e)))?;
    run(&state, &req.meter_type, &req.load_type, table, params.details).await
}
