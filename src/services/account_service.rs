use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::hash_password;
use crate::db;
use crate::error::{AppError, AppResult};
use crate::model::{
    Account, AccountSummary, AuthContext, CreateAccountRequest, Role, UpdateAccount,
};

/// Accounts that can be named on a new permit
#[derive(Debug, Serialize)]
pub struct PermitParticipants {
    pub supervisors: Vec<AccountSummary>,
    pub workers: Vec<AccountSummary>,
}

/// Validated input for a new account row
#[derive(Debug)]
pub(crate) struct NewAccount<'a> {
    pub tenant_id: Uuid,
    pub email: &'a str,
    pub password: &'a str,
    pub display_name: &'a str,
    pub role: Role,
    pub phone: Option<&'a str>,
}

/// Seat check: creating an account needs `active_count < user_limit`
pub fn ensure_seat_available(active_count: i64, user_limit: i32) -> AppResult<()> {
    if active_count >= i64::from(user_limit) {
        return Err(AppError::validation(format!(
            "User limit reached ({} users). Please upgrade your subscription to add more users.",
            user_limit
        )));
    }
    Ok(())
}

/// Trim and lowercase an email address after a basic shape check
pub fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        return Err(AppError::validation("Invalid email address."));
    }
    Ok(email)
}

pub fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < 6 {
        return Err(AppError::validation("Password should be at least 6 characters."));
    }
    Ok(())
}

/// Lock the tenant row, check its seat limit and insert the account.
///
/// The tenant row lock serializes concurrent creations for one tenant, so two
/// requests cannot both take the last seat.
pub(crate) async fn create_with_seat_check(
    tx: &mut Transaction<'_, Postgres>,
    new: NewAccount<'_>,
) -> AppResult<Account> {
    let user_limit: i32 =
        sqlx::query_scalar("SELECT user_limit FROM tenant WHERE tenant_id = $1 FOR UPDATE")
            .bind(new.tenant_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or(AppError::NotFound("Company"))?;

    let active_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM account WHERE tenant_id = $1 AND is_active = TRUE",
    )
    .bind(new.tenant_id)
    .fetch_one(&mut **tx)
    .await?;

    if let Err(e) = ensure_seat_available(active_count, user_limit) {
        warn!("Seat limit reached for tenant_id: {} ({}/{})", new.tenant_id, active_count, user_limit);
        return Err(e);
    }

    let password_hash = hash_password(new.password)?;
    let now = OffsetDateTime::now_utc();

    let account = sqlx::query_as::<_, Account>(
        "INSERT INTO account (account_id, tenant_id, email, password_hash, display_name, role,
                              phone, is_active, last_seen, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, NULL, $8, $8)
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(new.tenant_id)
    .bind(new.email)
    .bind(password_hash)
    .bind(new.display_name)
    .bind(new.role.as_str())
    .bind(new.phone)
    .bind(now)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| {
        if db::is_unique_violation(&e) {
            AppError::validation("This email is already registered.")
        } else {
            AppError::from(e)
        }
    })?;

    info!("New account created: {} ({}) in tenant_id: {}", account.email, account.role, account.tenant_id);
    Ok(account)
}

fn required<'a>(value: &'a Option<String>) -> AppResult<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::validation("Missing required fields"))
}

/// Account administration for company and platform admins
pub struct AccountService {
    db_pool: PgPool,
}

impl AccountService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Privileged account creation on behalf of an admin
    pub async fn provision(&self, ctx: &AuthContext, request: CreateAccountRequest) -> AppResult<Account> {
        let email = required(&request.email)?;
        let password = request
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AppError::validation("Missing required fields"))?;
        let display_name = required(&request.display_name)?;
        let role = required(&request.role)?;
        let company_id = required(&request.company_id)?;

        let role: Role = role
            .parse()
            .map_err(|_| AppError::validation(format!("Invalid role: {}", role)))?;
        let tenant_id = Uuid::parse_str(company_id)
            .map_err(|_| AppError::validation("Invalid company id"))?;

        if !ctx.can_administer(tenant_id) {
            warn!("Account {} denied provisioning in tenant_id: {}", ctx.account_id, tenant_id);
            return Err(AppError::forbidden("Only company administrators can create users"));
        }
        if role == Role::PlatformAdmin && !ctx.is_platform_admin() {
            return Err(AppError::forbidden("Only platform administrators can create platform administrators"));
        }

        let email = normalize_email(email)?;
        validate_password(password)?;
        let phone = request.phone.as_deref().map(str::trim).filter(|p| !p.is_empty());

        let mut tx = self.db_pool.begin().await?;
        let account = create_with_seat_check(
            &mut tx,
            NewAccount {
                tenant_id,
                email: &email,
                password,
                display_name,
                role,
                phone,
            },
        )
        .await?;
        tx.commit().await?;

        Ok(account)
    }

    /// Accounts of a tenant, highest authority first
    pub async fn list(&self, ctx: &AuthContext, tenant_id: Uuid, search: Option<&str>) -> AppResult<Vec<Account>> {
        if !ctx.can_administer(tenant_id) {
            return Err(AppError::forbidden("Only company administrators can list users"));
        }

        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let mut accounts = sqlx::query_as::<_, Account>(
            "SELECT * FROM account
             WHERE tenant_id = $1
               AND ($2::TEXT IS NULL OR display_name ILIKE $2 OR email ILIKE $2 OR role ILIKE $2)
             ORDER BY display_name",
        )
        .bind(tenant_id)
        .bind(pattern)
        .fetch_all(&self.db_pool)
        .await?;

        accounts.sort_by(|a, b| b.role.rank().cmp(&a.role.rank()));
        Ok(accounts)
    }

    pub async fn get(&self, ctx: &AuthContext, account_id: Uuid) -> AppResult<Account> {
        let account = self.find(account_id).await?;
        if account.account_id != ctx.account_id && !ctx.can_administer(account.tenant_id) {
            return Err(AppError::NotFound("User"));
        }
        Ok(account)
    }

    pub async fn update(&self, ctx: &AuthContext, account_id: Uuid, input: UpdateAccount) -> AppResult<Account> {
        let account = self.find(account_id).await?;
        if !ctx.can_administer(account.tenant_id) {
            return Err(AppError::forbidden("Only company administrators can edit users"));
        }
        if input.role == Some(Role::PlatformAdmin) && !ctx.is_platform_admin() {
            return Err(AppError::forbidden("Only platform administrators can grant that role"));
        }
        if let Some(name) = &input.display_name {
            if name.trim().is_empty() {
                return Err(AppError::validation("Display name cannot be empty"));
            }
        }

        let updated = sqlx::query_as::<_, Account>(
            "UPDATE account
             SET display_name = COALESCE($2, display_name),
                 role = COALESCE($3, role),
                 phone = COALESCE($4, phone),
                 updated_at = $5
             WHERE account_id = $1
             RETURNING *",
        )
        .bind(account_id)
        .bind(input.display_name.as_deref().map(str::trim))
        .bind(input.role.map(|r| r.as_str()))
        .bind(input.phone.as_deref())
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.db_pool)
        .await?;

        info!("Account {} updated by {}", account_id, ctx.account_id);
        Ok(updated)
    }

    /// Soft-enable or soft-disable an account; enabling takes a seat
    pub async fn set_active(&self, ctx: &AuthContext, account_id: Uuid, active: bool) -> AppResult<Account> {
        let account = self.find(account_id).await?;
        if !ctx.can_administer(account.tenant_id) {
            return Err(AppError::forbidden("Only company administrators can change user status"));
        }
        if account.account_id == ctx.account_id && !active {
            return Err(AppError::validation("You cannot deactivate your own account"));
        }
        if account.is_active == active {
            return Ok(account);
        }

        let mut tx = self.db_pool.begin().await?;

        if active {
            let user_limit: i32 =
                sqlx::query_scalar("SELECT user_limit FROM tenant WHERE tenant_id = $1 FOR UPDATE")
                    .bind(account.tenant_id)
                    .fetch_one(&mut *tx)
                    .await?;
            let active_count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM account WHERE tenant_id = $1 AND is_active = TRUE",
            )
            .bind(account.tenant_id)
            .fetch_one(&mut *tx)
            .await?;
            ensure_seat_available(active_count, user_limit)?;
        }

        let updated = sqlx::query_as::<_, Account>(
            "UPDATE account SET is_active = $2, updated_at = $3 WHERE account_id = $1 RETURNING *",
        )
        .bind(account_id)
        .bind(active)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        info!("Account {} set active={} by {}", account_id, active, ctx.account_id);
        Ok(updated)
    }

    /// Supervisors and worker-tier accounts of the caller's tenant
    pub async fn permit_participants(&self, ctx: &AuthContext) -> AppResult<PermitParticipants> {
        let accounts = sqlx::query_as::<_, AccountSummary>(
            "SELECT account_id, display_name, email, role FROM account
             WHERE tenant_id = $1 AND is_active = TRUE
             ORDER BY display_name",
        )
        .bind(ctx.tenant_id)
        .fetch_all(&self.db_pool)
        .await?;

        let (supervisors, rest): (Vec<_>, Vec<_>) =
            accounts.into_iter().partition(|a| a.role == Role::Supervisor);
        let workers = rest.into_iter().filter(|a| a.role.is_worker_tier()).collect();

        Ok(PermitParticipants { supervisors, workers })
    }

    async fn find(&self, account_id: Uuid) -> AppResult<Account> {
        sqlx::query_as::<_, Account>("SELECT * FROM account WHERE account_id = $1")
            .bind(account_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(AppError::NotFound("User"))
    }
}
