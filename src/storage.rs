//! Blob storage for permit documents and incident photos.
//!
//! Blobs are addressed by relative, `/`-separated keys whose first two
//! segments are the collection and the owning tenant, e.g.
//! `permits/<tenant id>/PTW-2024-001/swms_method.pdf`.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::model::DocumentKind;

#[axum::async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `key` and return the URL the blob is served from
    async fn put(&self, key: &str, bytes: Vec<u8>) -> AppResult<String>;

    async fn get(&self, key: &str) -> AppResult<Vec<u8>>;
}

/// Filesystem-backed store rooted at a directory
pub struct LocalBlobStore {
    root: PathBuf,
    base_url: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn resolve(&self, key: &str) -> AppResult<PathBuf> {
        Ok(self.root.join(checked_key(key)?))
    }
}

#[axum::async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> AppResult<String> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;

        info!("Stored blob {} ({} bytes)", key, bytes.len());
        Ok(format!("{}/{}", self.base_url, key))
    }

    async fn get(&self, key: &str) -> AppResult<Vec<u8>> {
        let path = self.resolve(key)?;
        debug!("Reading blob {}", key);
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => AppError::NotFound("File"),
            _ => AppError::Io(e),
        })
    }
}

/// Reject keys that could escape the store root
fn checked_key(key: &str) -> AppResult<&Path> {
    let is_plain = !key.is_empty()
        && !key.contains('\\')
        && key.split('/').all(|s| !s.is_empty() && s != "." && s != "..")
        && Path::new(key)
            .components()
            .all(|c| matches!(c, Component::Normal(_)));

    if !is_plain {
        return Err(AppError::validation("Invalid file path"));
    }
    Ok(Path::new(key))
}

/// Reduce an uploaded file name to a single safe path segment
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

pub fn permit_document_key(tenant_id: Uuid, permit_code: &str, kind: DocumentKind, file_name: &str) -> String {
    format!(
        "permits/{}/{}/{}_{}",
        tenant_id,
        permit_code,
        kind,
        sanitize_file_name(file_name)
    )
}

pub fn incident_photo_key(tenant_id: Uuid, incident_code: &str, file_name: &str) -> String {
    format!(
        "incidents/{}/{}/{}",
        tenant_id,
        incident_code,
        sanitize_file_name(file_name)
    )
}

/// Tenant that owns the blob at `key`
pub fn key_tenant(key: &str) -> Option<Uuid> {
    let mut segments = key.split('/');
    match segments.next() {
        Some("permits" | "incidents") => segments.next().and_then(|s| Uuid::parse_str(s).ok()),
        _ => None,
    }
}

pub fn content_type(key: &str) -> &'static str {
    let extension = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "txt" => "text/plain; charset=utf-8",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}
