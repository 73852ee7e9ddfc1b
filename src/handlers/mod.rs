pub mod account_handlers;
pub mod auth_handlers;
pub mod file_handlers;
pub mod incident_handlers;
pub mod overview_handlers;
pub mod permit_handlers;
pub mod site_handlers;
pub mod tenant_handlers;

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::{AppError, AppResult};

pub use account_handlers::account_routes;
pub use auth_handlers::auth_routes;
pub use file_handlers::file_routes;
pub use incident_handlers::incident_routes;
pub use overview_handlers::{overview_routes, plan_routes};
pub use permit_handlers::permit_routes;
pub use site_handlers::site_routes;
pub use tenant_handlers::tenant_routes;

/// `Json` whose rejection is an [`AppError`]
#[derive(Debug, Clone, Copy, Default)]
pub struct AppJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// JSON body that may be omitted; an empty body yields `T::default()` but a
/// present one must parse
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonOrDefault<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for JsonOrDefault<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::validation(e.body_text()))?;
        parse_optional_body(&bytes).map(Self)
    }
}

fn parse_optional_body<T: DeserializeOwned + Default>(bytes: &[u8]) -> AppResult<T> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(bytes)
        .map_err(|e| AppError::validation(format!("Invalid request body: {}", e)))
}

/// Largest accepted upload
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// A multipart form with one file part and any number of text parts
#[derive(Debug, Default)]
pub(crate) struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub fields: HashMap<String, String>,
}

pub(crate) async fn read_upload(mut multipart: Multipart) -> AppResult<Upload> {
    let mut upload = Upload::default();
    let mut has_file = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::validation("Invalid upload"))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                upload.file_name = file_name;
                upload.bytes = field
                    .bytes()
                    .await
                    .map_err(|_| AppError::validation("Invalid upload"))?
                    .to_vec();
                has_file = true;
            }
            None => {
                let value = field
                    .text()
                    .await
                    .map_err(|_| AppError::validation("Invalid upload"))?;
                upload.fields.insert(name, value);
            }
        }
    }

    if !has_file {
        return Err(AppError::validation("A file is required"));
    }
    Ok(upload)
}
