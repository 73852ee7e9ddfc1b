use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::AppJson;
use crate::{
    auth::AuthUser,
    error::AppResult,
    model::{Account, CreateAccountRequest, UpdateAccount},
    services::PermitParticipants,
    AppState,
};

#[derive(Debug, Deserialize)]
struct AccountQuery {
    search: Option<String>,
    /// Platform admins may list another company's accounts
    tenant_id: Option<Uuid>,
}

/// POST /api/users/create
async fn create_account(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    AppJson(input): AppJson<CreateAccountRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let account = state.accounts().provision(&ctx, input).await?;

    Ok(Json(json!({
        "success": true,
        "uid": account.account_id,
        "message": "User created successfully",
    })))
}

/// GET /api/users
async fn list_accounts(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Query(query): Query<AccountQuery>,
) -> AppResult<Json<Vec<Account>>> {
    let tenant_id = query.tenant_id.unwrap_or(ctx.tenant_id);
    let accounts = state
        .accounts()
        .list(&ctx, tenant_id, query.search.as_deref())
        .await?;
    Ok(Json(accounts))
}

/// GET /api/users/participants
async fn permit_participants(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
) -> AppResult<Json<PermitParticipants>> {
    Ok(Json(state.accounts().permit_participants(&ctx).await?))
}

/// GET /api/users/:id
async fn get_account(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Account>> {
    Ok(Json(state.accounts().get(&ctx, id).await?))
}

/// PUT /api/users/:id
async fn update_account(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
    AppJson(input): AppJson<UpdateAccount>,
) -> AppResult<Json<Account>> {
    Ok(Json(state.accounts().update(&ctx, id, input).await?))
}

/// POST /api/users/:id/activate
async fn activate_account(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Account>> {
    Ok(Json(state.accounts().set_active(&ctx, id, true).await?))
}

/// POST /api/users/:id/deactivate
async fn deactivate_account(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Account>> {
    Ok(Json(state.accounts().set_active(&ctx, id, false).await?))
}

/// Account routes (all protected)
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_accounts))
        .route("/create", post(create_account))
        .route("/participants", get(permit_participants))
        .route("/:id", get(get_account).put(update_account))
        .route("/:id/activate", post(activate_account))
        .route("/:id/deactivate", post(deactivate_account))
}
