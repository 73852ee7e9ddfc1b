use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use uuid::Uuid;

use super::{read_upload, AppJson, MAX_UPLOAD_BYTES};
use crate::{
    auth::AuthUser,
    error::AppResult,
    model::{Incident, IncidentDetail, IncidentPhoto, NewIncident},
    services::{IncidentFilter, StatusUpdate},
    AppState,
};

/// GET /api/incidents
async fn list_incidents(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Query(filter): Query<IncidentFilter>,
) -> AppResult<Json<Vec<Incident>>> {
    Ok(Json(state.incidents().list(&ctx, &filter).await?))
}

/// POST /api/incidents
async fn report_incident(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    AppJson(input): AppJson<NewIncident>,
) -> AppResult<Json<IncidentDetail>> {
    Ok(Json(state.incidents().report(&ctx, input).await?))
}

/// GET /api/incidents/:id
async fn get_incident(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<IncidentDetail>> {
    Ok(Json(state.incidents().get(&ctx, id).await?))
}

/// PUT /api/incidents/:id/status
async fn update_status(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
    AppJson(input): AppJson<StatusUpdate>,
) -> AppResult<Json<Incident>> {
    Ok(Json(state.incidents().update_status(&ctx, id, input.status).await?))
}

/// POST /api/incidents/:id/photos (multipart file)
async fn upload_photo(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<IncidentPhoto>> {
    let upload = read_upload(multipart).await?;
    let photo = state
        .incidents()
        .attach_photo(&ctx, id, &upload.file_name, upload.bytes)
        .await?;
    Ok(Json(photo))
}

/// Incident routes (all protected)
pub fn incident_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_incidents).post(report_incident))
        .route("/:id", get(get_incident))
        .route("/:id/status", put(update_status))
        .route(
            "/:id/photos",
            post(upload_photo).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
}
