use anyhow::Result;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    Connection, PgConnection, PgPool, Postgres, Transaction,
};
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use crate::config::Settings;
use crate::error::AppResult;

/// Initialize the database connection pool for the application
pub async fn init_pool(settings: &Settings) -> Result<PgPool> {
    info!("Initializing application database connection pool");

    let options = PgConnectOptions::from_str(&settings.database_url)?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    info!("Application database connection pool initialized");
    Ok(pool)
}

/// Create a single admin database connection for migrations
pub async fn create_admin_connection(database_admin_url: &str) -> Result<PgConnection> {
    info!("Creating admin database connection for migrations");

    let options = PgConnectOptions::from_str(database_admin_url)?;
    let conn = PgConnection::connect_with(&options).await?;

    info!("Admin database connection established");
    Ok(conn)
}

/// Run migrations, with the admin connection when one is configured
pub async fn run_migrations(settings: &Settings, pool: &PgPool) -> Result<()> {
    match &settings.database_admin_url {
        Some(admin_url) => {
            let mut admin_conn = create_admin_connection(admin_url).await?;
            info!("Running database migrations with admin privileges");
            sqlx::migrate!("./sql/migrations").run(&mut admin_conn).await?;

            info!("Closing admin database connection");
            let _ = admin_conn.close().await;
        }
        None => {
            info!("Running database migrations with the application pool");
            sqlx::migrate!("./sql/migrations").run(pool).await?;
        }
    }

    info!("Migrations completed successfully");
    Ok(())
}

/// Prefixes of the human-readable record codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodePrefix {
    Permit,
    Incident,
}

impl CodePrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodePrefix::Permit => "PTW",
            CodePrefix::Incident => "INC",
        }
    }
}

/// Render a code such as `PTW-2024-001`; numbers past 999 widen
pub fn format_code(prefix: CodePrefix, year: i32, seq: i32) -> String {
    format!("{}-{}-{:03}", prefix.as_str(), year, seq)
}

/// Allocate the next code for a tenant within the caller's transaction
pub async fn next_code(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: Uuid,
    prefix: CodePrefix,
    year: i32,
) -> AppResult<String> {
    let seq: i32 = sqlx::query_scalar(
        "INSERT INTO code_sequence (tenant_id, prefix, year, last_value)
         VALUES ($1, $2, $3, 1)
         ON CONFLICT (tenant_id, prefix, year)
         DO UPDATE SET last_value = code_sequence.last_value + 1
         RETURNING last_value",
    )
    .bind(tenant_id)
    .bind(prefix.as_str())
    .bind(year)
    .fetch_one(&mut **tx)
    .await?;

    Ok(format_code(prefix, year, seq))
}

/// True when the error is a unique-constraint violation
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_code() {
        assert_eq!(format_code(CodePrefix::Permit, 2024, 1), "PTW-2024-001");
        assert_eq!(format_code(CodePrefix::Incident, 2025, 42), "INC-2025-042");
        assert_eq!(format_code(CodePrefix::Permit, 2024, 1234), "PTW-2024-1234");
    }
}
