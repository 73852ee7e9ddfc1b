use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};

use super::AppJson;
use crate::{
    auth::{AuthUser, LoginRequest, Profile, RegisterRequest, Session},
    error::AppResult,
    AppState,
};

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    AppJson(input): AppJson<LoginRequest>,
) -> AppResult<Json<Session>> {
    let session = state.auth.login(input).await?;
    Ok(Json(session))
}

/// POST /api/auth/register
async fn register(
    State(state): State<AppState>,
    AppJson(input): AppJson<RegisterRequest>,
) -> AppResult<Json<Session>> {
    let session = state.auth.register(input).await?;
    Ok(Json(session))
}

/// GET /api/auth/me
async fn me(State(state): State<AppState>, AuthUser(ctx): AuthUser) -> AppResult<Json<Profile>> {
    let profile = state.auth.me(&ctx).await?;
    Ok(Json(profile))
}

/// Public and protected auth routes
pub fn auth_routes() -> (Router<AppState>, Router<AppState>) {
    let public = Router::new()
        .route("/login", post(login))
        .route("/register", post(register));

    let protected = Router::new().route("/me", get(me));

    (public, protected)
}
