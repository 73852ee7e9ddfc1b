use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

/// Runtime settings, layered from defaults, the process environment and
/// `SAFETYNEXUS_`-prefixed overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    /// Privileged connection used only for running migrations
    #[serde(default)]
    pub database_admin_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_expiration_seconds: i64,
    pub jwt_issuer: String,
    /// Root directory of the local blob store
    pub storage_root: String,
    /// URL prefix under which stored blobs are served
    pub files_base_url: String,
    pub templates_dir: String,
    pub log_filter: String,
    /// Seeded on first start when no platform admin exists yet
    #[serde(default)]
    pub bootstrap_admin_email: Option<String>,
    #[serde(default)]
    pub bootstrap_admin_password: Option<String>,
}

impl Settings {
    /// Load settings from `.env` and the environment
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let settings = Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 3000)?
            .set_default("jwt_expiration_seconds", 86400)? // 24 hours
            .set_default("jwt_issuer", "safetynexus")?
            .set_default("storage_root", "./storage")?
            .set_default("files_base_url", "/files")?
            .set_default("templates_dir", "./templates")?
            .set_default("log_filter", "safetynexus=info,tower_http=info")?
            .add_source(Environment::default().try_parsing(true))
            .add_source(Environment::with_prefix("SAFETYNEXUS").try_parsing(true))
            .build()
            .context("failed to read configuration")?;

        settings
            .try_deserialize::<Settings>()
            .context("DATABASE_URL and JWT_SECRET must be set")
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_addr() {
        let settings = Settings {
            database_url: "postgres://localhost/safetynexus".to_string(),
            database_admin_url: None,
            host: "127.0.0.1".to_string(),
            port: 8080,
            jwt_secret: "secret".to_string(),
            jwt_expiration_seconds: 3600,
            jwt_issuer: "safetynexus".to_string(),
            storage_root: "./storage".to_string(),
            files_base_url: "/files".to_string(),
            templates_dir: "./templates".to_string(),
            log_filter: "info".to_string(),
            bootstrap_admin_email: None,
            bootstrap_admin_password: None,
        };

        assert_eq!(settings.server_addr(), "127.0.0.1:8080");
    }
}
