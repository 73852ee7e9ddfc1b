use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::{
    error::{AppError, AppResult},
    model::AuthContext,
    AppState,
};

/// Extract Bearer token from Authorization header.
fn extract_bearer_token(request: &Request) -> AppResult<&str> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::unauthorized("Missing bearer token"))?
        .to_str()
        .map_err(|_| AppError::unauthorized("Missing bearer token"))?;

    // RFC 7235: Authorization scheme is case-insensitive
    if header.len() >= 7 && header[..7].eq_ignore_ascii_case("bearer ") {
        Ok(&header[7..])
    } else {
        Err(AppError::unauthorized("Missing bearer token"))
    }
}

/// Validates the JWT, reloads the account's status and role, and stores the
/// caller's [`AuthContext`] in request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(&request)?;
    let mut context = state.auth.validate_token(token)?;

    // The token's role is a snapshot; authorization uses the stored one
    match state.auth.account_state(context.account_id).await? {
        Some((true, role)) => {
            if role != context.role {
                debug!(
                    "Role of account_id {} changed from {} to {}",
                    context.account_id, context.role, role
                );
                context.role = role;
            }
        }
        _ => {
            warn!("Rejected token of deactivated account_id: {}", context.account_id);
            return Err(AppError::unauthorized(
                "Your account is deactivated. Contact your administrator.",
            ));
        }
    }

    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

/// Extractor for the caller's identity in handlers.
#[derive(Debug, Clone)]
pub struct AuthUser(pub AuthContext);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| AppError::unauthorized("Missing bearer token"))
    }
}
