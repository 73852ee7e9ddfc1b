use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use super::AppJson;
use crate::{
    auth::AuthUser,
    error::AppResult,
    model::{Account, NewTenant, Tenant, UpdateTenant},
    services::TenantList,
    AppState,
};

/// GET /api/companies
async fn list_tenants(State(state): State<AppState>, AuthUser(ctx): AuthUser) -> AppResult<Json<TenantList>> {
    Ok(Json(state.tenants().list(&ctx).await?))
}

/// POST /api/companies
async fn create_tenant(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    AppJson(input): AppJson<NewTenant>,
) -> AppResult<Json<Tenant>> {
    Ok(Json(state.tenants().create(&ctx, input).await?))
}

/// GET /api/companies/:id
async fn get_tenant(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Tenant>> {
    Ok(Json(state.tenants().get(&ctx, id).await?))
}

/// PUT /api/companies/:id
async fn update_tenant(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
    AppJson(input): AppJson<UpdateTenant>,
) -> AppResult<Json<Tenant>> {
    Ok(Json(state.tenants().update(&ctx, id, input).await?))
}

/// POST /api/companies/:id/activate
async fn activate_tenant(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Tenant>> {
    Ok(Json(state.tenants().set_active(&ctx, id, true).await?))
}

/// POST /api/companies/:id/deactivate
async fn deactivate_tenant(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Tenant>> {
    Ok(Json(state.tenants().set_active(&ctx, id, false).await?))
}

/// GET /api/companies/:id/users
async fn tenant_accounts(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Account>>> {
    Ok(Json(state.accounts().list(&ctx, id, None).await?))
}

/// Company routes (all protected, platform admin only)
pub fn tenant_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tenants).post(create_tenant))
        .route("/:id", get(get_tenant).put(update_tenant))
        .route("/:id/activate", post(activate_tenant))
        .route("/:id/deactivate", post(deactivate_tenant))
        .route("/:id/users", get(tenant_accounts))
}
