// HTTP handlers and route composition

pub mod auth;
pub mod extract;
pub mod jobs;
pub mod ws;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use crate::app::AppState;
use crate::middleware::{auth_middleware, rate_limit_middleware};

/// Build the full API router
pub fn api_router(state: AppState) -> Router {
    let auth_public = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    let auth_protected = Router::new()
        .route("/auth/me", get(auth::me))
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    // Extraction and job routes carry both auth and the per-tier rate limit
    let protected = Router::new()
        .route("/extract/single", post(extract::extract_single))
        .route("/extract/batch", post(extract::extract_batch))
        .route("/jobs/{id}", get(jobs::get_job))
        .route("/jobs", get(jobs::list_jobs))
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    let api_v1 = Router::new()
        .merge(auth_public)
        .merge(auth_protected)
        .merge(protected)
        .route("/ws", get(ws::ws_handler));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_v1)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "artex-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
