use anyhow::Context;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::hash_password;
use crate::config::Settings;
use crate::db;
use crate::error::{AppError, AppResult};
use crate::model::{normalize_code, slugify, AuthContext, NewTenant, PlanName, Role, Tenant, UpdateTenant};

/// Code of the tenant that platform admins belong to
pub const PLATFORM_TENANT_CODE: &str = "SAFENEXUS";

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TenantUsage {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub tenant: Tenant,
    pub active_accounts: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlatformStats {
    pub total_companies: usize,
    pub active_companies: usize,
    pub total_accounts: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TenantList {
    pub companies: Vec<TenantUsage>,
    pub stats: PlatformStats,
}

fn require_platform_admin(ctx: &AuthContext) -> AppResult<()> {
    if !ctx.is_platform_admin() {
        warn!("Account {} attempted a platform operation", ctx.account_id);
        return Err(AppError::forbidden("Platform administrator access required"));
    }
    Ok(())
}

/// Company lifecycle, reserved to platform admins
pub struct TenantService {
    db_pool: PgPool,
}

impl TenantService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    pub async fn create(&self, ctx: &AuthContext, input: NewTenant) -> AppResult<Tenant> {
        require_platform_admin(ctx)?;

        let name = input.name.trim();
        let code = normalize_code(&input.code);
        if name.is_empty() || code.is_empty() {
            return Err(AppError::validation("Company name and code are required"));
        }
        if input.user_limit < 0 {
            return Err(AppError::validation("User limit cannot be negative"));
        }

        let code_taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tenant WHERE code = $1)")
            .bind(&code)
            .fetch_one(&self.db_pool)
            .await?;
        if code_taken {
            return Err(AppError::Conflict(format!("Company code {} already exists", code)));
        }

        let slug = self.unique_slug(name).await?;
        let now = OffsetDateTime::now_utc();

        let tenant = sqlx::query_as::<_, Tenant>(
            "INSERT INTO tenant (tenant_id, slug, name, code, email, phone, address, is_active,
                                 plan, user_limit, expiry_date, allow_self_register, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, $8, $9, $10, $11, $12, $12)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&slug)
        .bind(name)
        .bind(&code)
        .bind(input.email.as_deref())
        .bind(input.phone.as_deref())
        .bind(input.address.as_deref())
        .bind(input.plan.as_str())
        .bind(input.user_limit)
        .bind(input.expiry_date)
        .bind(input.allow_self_register)
        .bind(now)
        .fetch_one(&self.db_pool)
        .await
        .map_err(|e| {
            if db::is_unique_violation(&e) {
                AppError::Conflict(format!("Company code {} already exists", code))
            } else {
                AppError::from(e)
            }
        })?;

        info!("Company created: {} ({}) by {}", tenant.name, tenant.code, ctx.account_id);
        Ok(tenant)
    }

    /// All companies, newest first, with platform totals
    pub async fn list(&self, ctx: &AuthContext) -> AppResult<TenantList> {
        require_platform_admin(ctx)?;

        let companies = sqlx::query_as::<_, TenantUsage>(
            "SELECT t.*,
                    (SELECT COUNT(*) FROM account a
                     WHERE a.tenant_id = t.tenant_id AND a.is_active = TRUE) AS active_accounts
             FROM tenant t
             ORDER BY t.created_at DESC",
        )
        .fetch_all(&self.db_pool)
        .await?;

        let total_accounts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM account")
            .fetch_one(&self.db_pool)
            .await?;

        let stats = PlatformStats {
            total_companies: companies.len(),
            active_companies: companies.iter().filter(|c| c.tenant.is_active).count(),
            total_accounts,
        };

        Ok(TenantList { companies, stats })
    }

    /// A company, visible to platform admins and to its own members
    pub async fn get(&self, ctx: &AuthContext, tenant_id: Uuid) -> AppResult<Tenant> {
        if !ctx.is_platform_admin() && ctx.tenant_id != tenant_id {
            return Err(AppError::NotFound("Company"));
        }
        self.find(tenant_id).await
    }

    pub async fn update(&self, ctx: &AuthContext, tenant_id: Uuid, input: UpdateTenant) -> AppResult<Tenant> {
        require_platform_admin(ctx)?;

        if input.user_limit.is_some_and(|limit| limit < 0) {
            return Err(AppError::validation("User limit cannot be negative"));
        }
        let name = input.name.as_deref().map(str::trim);
        if name.is_some_and(str::is_empty) {
            return Err(AppError::validation("Company name cannot be empty"));
        }

        let tenant = sqlx::query_as::<_, Tenant>(
            "UPDATE tenant
             SET name = COALESCE($2, name),
                 email = COALESCE($3, email),
                 phone = COALESCE($4, phone),
                 address = COALESCE($5, address),
                 plan = COALESCE($6, plan),
                 user_limit = COALESCE($7, user_limit),
                 expiry_date = COALESCE($8, expiry_date),
                 allow_self_register = COALESCE($9, allow_self_register),
                 updated_at = $10
             WHERE tenant_id = $1
             RETURNING *",
        )
        .bind(tenant_id)
        .bind(name)
        .bind(input.email.as_deref())
        .bind(input.phone.as_deref())
        .bind(input.address.as_deref())
        .bind(input.plan.map(|p| p.as_str()))
        .bind(input.user_limit)
        .bind(input.expiry_date)
        .bind(input.allow_self_register)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or(AppError::NotFound("Company"))?;

        info!("Company {} updated by {}", tenant.code, ctx.account_id);
        Ok(tenant)
    }

    /// Soft-enable or soft-disable a company
    pub async fn set_active(&self, ctx: &AuthContext, tenant_id: Uuid, active: bool) -> AppResult<Tenant> {
        require_platform_admin(ctx)?;
        if tenant_id == ctx.tenant_id && !active {
            return Err(AppError::validation("The platform company cannot be deactivated"));
        }

        let tenant = sqlx::query_as::<_, Tenant>(
            "UPDATE tenant SET is_active = $2, updated_at = $3 WHERE tenant_id = $1 RETURNING *",
        )
        .bind(tenant_id)
        .bind(active)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or(AppError::NotFound("Company"))?;

        info!("Company {} set active={} by {}", tenant.code, active, ctx.account_id);
        Ok(tenant)
    }

    async fn find(&self, tenant_id: Uuid) -> AppResult<Tenant> {
        sqlx::query_as::<_, Tenant>("SELECT * FROM tenant WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(AppError::NotFound("Company"))
    }

    async fn unique_slug(&self, name: &str) -> AppResult<String> {
        let base = slugify(name);
        let base = if base.is_empty() { "company".to_string() } else { base };

        let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tenant WHERE slug = $1)")
            .bind(&base)
            .fetch_one(&self.db_pool)
            .await?;

        Ok(if taken {
            suffixed_slug(&base, OffsetDateTime::now_utc())
        } else {
            base
        })
    }
}

/// Disambiguate a slug that is already taken
fn suffixed_slug(base: &str, now: OffsetDateTime) -> String {
    let millis = now.unix_timestamp_nanos() / 1_000_000;
    format!("{}_{}", base, millis)
}

/// Ensure the platform company exists and seed the first platform admin
pub async fn bootstrap(pool: &PgPool, settings: &Settings) -> anyhow::Result<()> {
    let now = OffsetDateTime::now_utc();

    let tenant_id: Uuid = match sqlx::query_scalar("SELECT tenant_id FROM tenant WHERE code = $1")
        .bind(PLATFORM_TENANT_CODE)
        .fetch_optional(pool)
        .await?
    {
        Some(id) => id,
        None => {
            let id = Uuid::new_v4();
            let plan = PlanName::Internal;
            sqlx::query(
                "INSERT INTO tenant (tenant_id, slug, name, code, is_active, plan, user_limit,
                                     expiry_date, allow_self_register, created_at, updated_at)
                 VALUES ($1, 'safenexus', 'SafeNexus Platform', $2, TRUE, $3, $4, $5, FALSE, $6, $6)",
            )
            .bind(id)
            .bind(PLATFORM_TENANT_CODE)
            .bind(plan.as_str())
            .bind(plan.details().free_users)
            .bind(now + Duration::days(365 * 100))
            .bind(now)
            .execute(pool)
            .await
            .context("failed to create the platform company")?;

            info!("Platform company {} created", PLATFORM_TENANT_CODE);
            id
        }
    };

    let (Some(email), Some(password)) = (
        settings.bootstrap_admin_email.as_deref(),
        settings.bootstrap_admin_password.as_deref(),
    ) else {
        return Ok(());
    };
    let email = email.trim().to_lowercase();

    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM account WHERE email = $1)")
        .bind(&email)
        .fetch_one(pool)
        .await?;
    if exists {
        return Ok(());
    }

    let password_hash = hash_password(password)?;
    sqlx::query(
        "INSERT INTO account (account_id, tenant_id, email, password_hash, display_name, role,
                              is_active, created_at, updated_at)
         VALUES ($1, $2, $3, $4, 'Platform Administrator', $5, TRUE, $6, $6)",
    )
    .bind(Uuid::new_v4())
    .bind(tenant_id)
    .bind(&email)
    .bind(password_hash)
    .bind(Role::PlatformAdmin.as_str())
    .bind(now)
    .execute(pool)
    .await
    .context("failed to create the platform administrator")?;

    info!("Platform administrator seeded: {}", email);
    Ok(())
}
