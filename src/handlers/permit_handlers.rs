use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use super::{read_upload, AppJson, JsonOrDefault, MAX_UPLOAD_BYTES};
use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    model::{AuthContext, DocumentKind, NewPermit, Permit, PermitDetail, PermitDocument},
    services::{ActionRequest, PermitFilter},
    workflow::PermitAction,
    AppState,
};

/// GET /api/permits
async fn list_permits(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Query(filter): Query<PermitFilter>,
) -> AppResult<Json<Vec<Permit>>> {
    Ok(Json(state.permits().list(&ctx, &filter).await?))
}

/// POST /api/permits
async fn create_permit(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    AppJson(input): AppJson<NewPermit>,
) -> AppResult<Json<PermitDetail>> {
    Ok(Json(state.permits().create(&ctx, input).await?))
}

/// GET /api/permits/pending
async fn pending_tasks(State(state): State<AppState>, AuthUser(ctx): AuthUser) -> AppResult<Json<Vec<Permit>>> {
    Ok(Json(state.permits().pending_tasks(&ctx).await?))
}

/// GET /api/permits/:id
async fn get_permit(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PermitDetail>> {
    Ok(Json(state.permits().get(&ctx, id).await?))
}

async fn act(
    state: AppState,
    ctx: AuthContext,
    id: Uuid,
    action: PermitAction,
    request: ActionRequest,
) -> AppResult<Json<PermitDetail>> {
    Ok(Json(state.permits().act(&ctx, id, action, request).await?))
}

/// POST /api/permits/:id/approve
async fn approve_permit(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
    JsonOrDefault(request): JsonOrDefault<ActionRequest>,
) -> AppResult<Json<PermitDetail>> {
    act(state, ctx, id, PermitAction::Approve, request).await
}

/// POST /api/permits/:id/reject
async fn reject_permit(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
    JsonOrDefault(request): JsonOrDefault<ActionRequest>,
) -> AppResult<Json<PermitDetail>> {
    act(state, ctx, id, PermitAction::Reject, request).await
}

/// POST /api/permits/:id/suspend
async fn suspend_permit(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
    JsonOrDefault(request): JsonOrDefault<ActionRequest>,
) -> AppResult<Json<PermitDetail>> {
    act(state, ctx, id, PermitAction::Suspend, request).await
}

/// POST /api/permits/:id/close
async fn close_permit(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
    JsonOrDefault(request): JsonOrDefault<ActionRequest>,
) -> AppResult<Json<PermitDetail>> {
    act(state, ctx, id, PermitAction::Close, request).await
}

/// POST /api/permits/:id/documents (multipart: `kind`, file)
async fn upload_document(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<PermitDocument>> {
    let upload = read_upload(multipart).await?;
    let kind = match upload.fields.get("kind") {
        Some(kind) => kind
            .parse::<DocumentKind>()
            .map_err(|e| AppError::validation(e.to_string()))?,
        None => DocumentKind::Other,
    };

    let document = state
        .permits()
        .attach_document(&ctx, id, kind, &upload.file_name, upload.bytes)
        .await?;
    Ok(Json(document))
}

/// Permit routes (all protected)
pub fn permit_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_permits).post(create_permit))
        .route("/pending", get(pending_tasks))
        .route("/:id", get(get_permit))
        .route("/:id/approve", post(approve_permit))
        .route("/:id/reject", post(reject_permit))
        .route("/:id/suspend", post(suspend_permit))
        .route("/:id/close", post(close_permit))
        .route(
            "/:id/documents",
            post(upload_document).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
}
