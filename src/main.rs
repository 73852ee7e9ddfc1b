use anyhow::Result;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use safetynexus::{config::Settings, db, routes, services::tenant_service, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration from .env and the environment
    let settings = Settings::load()?;

    // Initialize logging; RUST_LOG overrides the configured filter
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Safety Nexus");

    // Initialize application database connection pool
    let pool = db::init_pool(&settings).await?;

    // Run migrations, with admin privileges when configured
    db::run_migrations(&settings, &pool).await?;

    // Ensure the platform company and first platform admin exist
    tenant_service::bootstrap(&pool, &settings).await?;

    let addr = settings.server_addr();
    let state = AppState::new(pool, settings);
    let app = routes::create_router(state);

    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
