use axum::{extract::State, response::Html, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::{error::AppResult, site, AppState};

/// GET /
async fn home(State(state): State<AppState>) -> AppResult<Html<String>> {
    Ok(Html(site::render_home(&state.templates)?))
}

/// GET /pricing
async fn pricing(State(state): State<AppState>) -> AppResult<Html<String>> {
    Ok(Html(site::render_pricing(&state.templates)?))
}

/// GET /health
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Public pages
pub fn site_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/pricing", get(pricing))
        .route("/health", get(health))
}
