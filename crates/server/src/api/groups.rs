//! Rule group handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;

use vee_rules::schema::NewRuleGroup;

use super::common::{store_err, to_json, ApiResult, NamesRequest};
use crate::state::AppState;

/// GET /groups
pub async fn groups_list(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let groups = state.store.list_groups().await.map_err(store_err)?;
    to_json(groups)
}

/// POST /groups
pub async fn groups_create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewRuleGroup>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let group = state.store.create_group(req).await.map_err(store_err)?;
    Ok((StatusCode::CREATED, to_json(group)?))
}

/// DELETE /groups/{name}
pub async fn groups_delete(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    state.store.delete_group(&name).await.map_err(store_err)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /groups/{name}/rules
pub async fn groups_add_rules(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<NamesRequest>,
) -> ApiResult<StatusCode> {
    state
        .store
        .add_rules_to_group(&name, &req.names)
        .await
        .map_err(store_err)?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /groups/{name}/rules
pub async fn groups_remove_rules(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<NamesRequest>,
) -> ApiResult<StatusCode> {
    state
        .store
        .remove_rules_from_group(&name, &req.names)
        .await
        .map_err(store_err)?;
    Ok(StatusCode::NO_CONTENT)
}
