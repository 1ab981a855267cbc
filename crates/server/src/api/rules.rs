//! Rule CRUD and activation handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use tracing::info;

use vee_rules::schema::NewRule;

use super::common::{store_err, to_json, ApiResult, NamesRequest};
use crate::state::AppState;

/// GET /rules
pub async fn rules_list(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let rules = state.store.list_rules().await.map_err(store_err)?;
    to_json(rules)
}

/// POST /rules
pub async fn rules_create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewRule>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let rule = state.store.create_rule(req).await.map_err(store_err)?;
    Ok((StatusCode::CREATED, to_json(rule)?))
}

/// POST /rules/by-names
pub async fn rules_by_names(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NamesRequest>,
) -> ApiResult<Json<Value>> {
    let rules = state
        .store
        .rules_by_names(&req.names)
        .await
        .map_err(store_err)?;
    to_json(rules)
}

/// DELETE /rules/{name}
pub async fn rules_delete(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    state.store.delete_rule(&name).await.map_err(store_err)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /rules/activate
pub async fn rules_activate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NamesRequest>,
) -> ApiResult<Json<Value>> {
    set_active(&state, &req.names, true).await
}

/// POST /rules/deactivate
pub async fn rules_deactivate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NamesRequest>,
) -> ApiResult<Json<Value>> {
    set_active(&state, &req.names, false).await
}

async fn set_active(state: &AppState, names: &[String], active: bool) -> ApiResult<Json<Value>> {
    let updated = state
        .store
        .set_rules_active(names, active)
        .await
        .map_err(store_err)?;
    info!(updated, active, "rule activation changed");
    Ok(Json(json!({ "updated": updated, "is_active": active })))
}
