pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod model;
pub mod routes;
pub mod services;
pub mod site;
pub mod storage;
pub mod workflow;

use std::sync::Arc;

use minijinja::Environment;
use sqlx::PgPool;

use crate::auth::{AuthService, JwtConfig};
use crate::config::Settings;
use crate::services::{AccountService, IncidentService, PermitService, TenantService};
use crate::storage::{BlobStore, LocalBlobStore};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub settings: Settings,
    pub auth: Arc<AuthService>,
    pub blobs: Arc<dyn BlobStore>,
    pub templates: Arc<Environment<'static>>,
}

impl AppState {
    /// Wire the services over a pool, with blobs on the local filesystem
    pub fn new(pool: PgPool, settings: Settings) -> Self {
        let auth = AuthService::new(pool.clone(), JwtConfig::from_settings(&settings));
        let blobs = LocalBlobStore::new(&settings.storage_root, &settings.files_base_url);
        let templates = site::environment(&settings.templates_dir);

        Self {
            pool,
            settings,
            auth: Arc::new(auth),
            blobs: Arc::new(blobs),
            templates: Arc::new(templates),
        }
    }

    pub fn accounts(&self) -> AccountService {
        AccountService::new(self.pool.clone())
    }

    pub fn tenants(&self) -> TenantService {
        TenantService::new(self.pool.clone())
    }

    pub fn permits(&self) -> PermitService {
        PermitService::new(self.pool.clone(), self.blobs.clone())
    }

    pub fn incidents(&self) -> IncidentService {
        IncidentService::new(self.pool.clone(), self.blobs.clone())
    }
}
