use axum::{extract::State, routing::get, Json, Router};

use crate::{
    auth::AuthUser,
    error::AppResult,
    model::{PlanDetails, PlanName},
    services::{
        dashboard::{self, Dashboard},
        subscription::{self, SubscriptionOverview},
    },
    AppState,
};

/// GET /api/plans
async fn list_plans() -> Json<Vec<PlanDetails>> {
    Json(PlanName::catalog())
}

/// GET /api/subscription
async fn get_subscription(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
) -> AppResult<Json<SubscriptionOverview>> {
    Ok(Json(subscription::overview(&state.pool, &ctx).await?))
}

/// GET /api/dashboard
async fn get_dashboard(State(state): State<AppState>, AuthUser(ctx): AuthUser) -> AppResult<Json<Dashboard>> {
    let summary = dashboard::summary(&state.pool, &state.permits(), &ctx).await?;
    Ok(Json(summary))
}

/// Public plan catalog
pub fn plan_routes() -> Router<AppState> {
    Router::new().route("/plans", get(list_plans))
}

/// Subscription and dashboard routes (protected)
pub fn overview_routes() -> Router<AppState> {
    Router::new()
        .route("/subscription", get(get_subscription))
        .route("/dashboard", get(get_dashboard))
}
