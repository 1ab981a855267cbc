//! HTTP router construction.
//!
//! Assembles all Axum routes and middleware into a single `Router`.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::api;
use crate::state::AppState;

/// Build the complete application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Multipart framing needs some headroom over the file itself.
    let body_limit = state.config.engine.max_upload_bytes() + 64 * 1024;
    let cors = cors_layer(&state.config.server.cors_origin);

    Router::new()
        .route("/health", get(api::health))
        .route("/config", get(api::config))
        // Rules: fixed paths MUST precede /{name}
        .route("/rules", get(api::rules_list).post(api::rules_create))
        .route("/rules/by-names", post(api::rules_by_names))
        .route("/rules/activate", post(api::rules_activate))
        .route("/rules/deactivate", post(api::rules_deactivate))
        .route("/rules/{name}", delete(api::rules_delete))
        .route("/groups", get(api::groups_list).post(api::groups_create))
        .route("/groups/{name}", delete(api::groups_delete))
        .route(
            "/groups/{name}/rules",
            post(api::groups_add_rules).delete(api::groups_remove_rules),
        )
        .route(
            "/head-groups",
            get(api::head_groups_list).post(api::head_groups_create),
        )
        .route("/head-groups/{name}", delete(api::head_groups_delete))
        .route(
            "/head-groups/{name}/rules",
            post(api::head_groups_add_rules).delete(api::head_groups_remove_rules),
        )
        .route(
            "/head-groups/{name}/groups",
            post(api::head_groups_add_groups).delete(api::head_groups_remove_groups),
        )
        .route("/upload", post(api::upload))
        .route("/validate", post(api::validate))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    if origin == "*" {
        return CorsLayer::permissive();
    }
    match origin.parse::<HeaderValue>() {
        Ok(value) => CorsLayer::new()
            .allow_origin(value)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(e) => {
            warn!("Invalid CORS_ORIGIN '{}': {}, cross-origin requests disabled", origin, e);
            CorsLayer::new()
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
