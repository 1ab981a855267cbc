//! Health and configuration endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub store: &'static str,
    pub profiles: usize,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        store: state.backend,
        profiles: state.pipeline.strategies().len(),
    })
}

/// GET /config: redacted runtime configuration.
pub async fn config(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(state.config.redacted_summary())
}
