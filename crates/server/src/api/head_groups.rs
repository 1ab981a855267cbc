//! Head group handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;

use vee_rules::schema::NewHeadGroup;

use super::common::{store_err, to_json, ApiResult, NamesRequest};
use crate::state::AppState;

/// GET /head-groups
pub async fn head_groups_list(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let groups = state.store.list_head_groups().await.map_err(store_err)?;
    to_json(groups)
}

/// POST /head-groups
pub async fn head_groups_create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewHeadGroup>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let group = state.store.create_head_group(req).await.map_err(store_err)?;
    Ok((StatusCode::CREATED, to_json(group)?))
}

/// DELETE /head-groups/{name}
pub async fn head_groups_delete(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    state.store.delete_head_group(&name).await.map_err(store_err)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /head-groups/{name}/rules
pub async fn head_groups_add_rules(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<NamesRequest>,
) -> ApiResult<StatusCode> {
    state
        .store
        .add_rules_to_head_group(&name, &req.names)
        .await
        .map_err(store_err)?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /head-groups/{name}/rules
pub async fn head_groups_remove_rules(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<NamesRequest>,
) -> ApiResult<StatusCode> {
    state
        .store
        .remove_rules_from_head_group(&name, &req.names)
        .await
        .map_err(store_err)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /head-groups/{name}/groups
pub async fn head_groups_add_groups(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<NamesRequest>,
) -> ApiResult<StatusCode> {
    state
        .store
        .add_groups_to_head_group(&name, &req.names)
        .await
        .map_err(store_err)?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /head-groups/{name}/groups
pub async fn head_groups_remove_groups(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<NamesRequest>,
) -> ApiResult<StatusCode> {
    state
        .store
        .remove_groups_from_head_group(&name, &req.names)
        .await
        .map_err(store_err)?;
    Ok(StatusCode::NO_CONTENT)
}
