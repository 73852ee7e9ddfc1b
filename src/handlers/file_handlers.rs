use axum::{
    extract::{Path, State},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::warn;

use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    storage, AppState,
};

/// GET /files/*key
async fn get_file(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(key): Path<String>,
) -> AppResult<Response> {
    let owner = storage::key_tenant(&key).ok_or(AppError::NotFound("File"))?;
    if owner != ctx.tenant_id && !ctx.is_platform_admin() {
        warn!("Account {} requested a file of tenant_id: {}", ctx.account_id, owner);
        return Err(AppError::NotFound("File"));
    }

    let bytes = state.blobs.get(&key).await?;
    Ok(([(CONTENT_TYPE, storage::content_type(&key))], bytes).into_response())
}

/// Stored blob routes (protected)
pub fn file_routes() -> Router<AppState> {
    Router::new().route("/*key", get(get_file))
}
