#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use sqlx::{postgres::PgPoolOptions, PgPool};
use time::{Duration, OffsetDateTime};
use tower::util::ServiceExt;
use uuid::Uuid;

use safetynexus::{auth::hash_password, config::Settings, model::Role, routes, AppState};

pub const PASSWORD: &str = "Passw0rd!";

pub fn test_settings(storage_root: &str) -> Settings {
    dotenv::dotenv().ok();
    Settings {
        database_url: std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/safetynexus_test".to_string()),
        database_admin_url: None,
        host: "127.0.0.1".to_string(),
        port: 0,
        jwt_secret: "test-jwt-secret-minimum-32-characters!!".to_string(),
        jwt_expiration_seconds: 3600,
        jwt_issuer: "safetynexus".to_string(),
        storage_root: storage_root.to_string(),
        files_base_url: "/files".to_string(),
        templates_dir: concat!(env!("CARGO_MANIFEST_DIR"), "/templates").to_string(),
        log_filter: "safetynexus=debug".to_string(),
        bootstrap_admin_email: None,
        bootstrap_admin_password: None,
    }
}

/// State over a pool that never connects, for routes that stay off the database
pub fn offline_state(storage_root: &str) -> AppState {
    let settings = test_settings(storage_root);
    let pool = PgPoolOptions::new()
        .connect_lazy(&settings.database_url)
        .expect("Failed to create lazy pool");
    AppState::new(pool, settings)
}

pub async fn setup_test_db() -> PgPool {
    dotenv::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to create pool");

    sqlx::migrate!("./sql/migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

pub fn app(state: AppState) -> Router {
    routes::create_router(state)
}

pub async fn make_request(
    app: Router,
    method: &str,
    path: &str,
    body: Option<Value>,
    token: Option<&str>,
) -> (StatusCode, Value) {
    let mut req = Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");

    if let Some(t) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {}", t));
    }

    let body = body
        .map(|v| Body::from(serde_json::to_string(&v).unwrap()))
        .unwrap_or(Body::empty());

    let response = app.oneshot(req.body(body).unwrap()).await.unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap_or(json!({}));

    (status, json)
}

pub struct SeededTenant {
    pub tenant_id: Uuid,
    pub code: String,
}

/// Insert a company with a unique code
pub async fn seed_tenant(pool: &PgPool, user_limit: i32, allow_self_register: bool) -> SeededTenant {
    let tenant_id = Uuid::new_v4();
    let suffix = tenant_id.simple().to_string()[..8].to_uppercase();
    let code = format!("T{}", suffix);
    let now = OffsetDateTime::now_utc();

    sqlx::query(
        "INSERT INTO tenant (tenant_id, slug, name, code, is_active, plan, user_limit, expiry_date,
                             allow_self_register, created_at, updated_at)
         VALUES ($1, $2, $3, $4, TRUE, 'starter', $5, $6, $7, $8, $8)",
    )
    .bind(tenant_id)
    .bind(format!("test_{}", suffix.to_lowercase()))
    .bind(format!("Test Company {}", suffix))
    .bind(&code)
    .bind(user_limit)
    .bind(now + Duration::days(365))
    .bind(allow_self_register)
    .bind(now)
    .execute(pool)
    .await
    .expect("Failed to seed tenant");

    SeededTenant { tenant_id, code }
}

/// Insert an active account and return its id and email
pub async fn seed_account(pool: &PgPool, tenant_id: Uuid, role: Role) -> (Uuid, String) {
    let account_id = Uuid::new_v4();
    let email = format!("{}_{}@example.com", role, account_id.simple());
    let now = OffsetDateTime::now_utc();

    sqlx::query(
        "INSERT INTO account (account_id, tenant_id, email, password_hash, display_name, role,
                              is_active, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7, $7)",
    )
    .bind(account_id)
    .bind(tenant_id)
    .bind(&email)
    .bind(hash_password(PASSWORD).unwrap())
    .bind(format!("Test {}", role))
    .bind(role.as_str())
    .bind(now)
    .execute(pool)
    .await
    .expect("Failed to seed account");

    (account_id, email)
}

pub async fn login(app: Router, email: &str, company_code: &str) -> String {
    let (status, body) = make_request(
        app,
        "POST",
        "/api/auth/login",
        Some(json!({ "email": email, "password": PASSWORD, "company_code": company_code })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body["token"].as_str().unwrap().to_string()
}
