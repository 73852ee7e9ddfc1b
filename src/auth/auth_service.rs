use anyhow::anyhow;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use super::JwtConfig;
use crate::error::{AppError, AppResult};
use crate::model::{normalize_code, Account, AuthContext, Role, Tenant};
use crate::services::account_service::{self, NewAccount};

const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Password hashing error: {}", e))?
        .to_string();
    Ok(password_hash)
}

/// Verify a password against a hash using Argon2
pub fn verify_password(password: &str, password_hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| anyhow!("Password hash parsing error: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Required for everyone except platform admins
    #[serde(default)]
    pub company_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub company_code: String,
}

/// The signed-in account together with its company
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub account: Account,
    pub company_name: String,
    pub company_code: String,
    pub is_platform_admin: bool,
    pub is_company_admin: bool,
}

impl Profile {
    fn new(account: Account, tenant: &Tenant) -> Self {
        let is_platform_admin = account.role == Role::PlatformAdmin;
        let is_company_admin = matches!(account.role, Role::PlatformAdmin | Role::CompanyAdmin);
        Self {
            account,
            company_name: tenant.name.clone(),
            company_code: tenant.code.clone(),
            is_platform_admin,
            is_company_admin,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub profile: Profile,
}

/// Login, self-registration and session tokens
pub struct AuthService {
    db_pool: PgPool,
    pub jwt_config: JwtConfig,
}

impl AuthService {
    pub fn new(db_pool: PgPool, jwt_config: JwtConfig) -> Self {
        Self { db_pool, jwt_config }
    }

    pub fn generate_token(&self, auth_context: &AuthContext) -> AppResult<String> {
        self.jwt_config.generate_token(auth_context)
    }

    /// Validate a JWT token and extract the auth context
    pub fn validate_token(&self, token: &str) -> AppResult<AuthContext> {
        let claims = self.jwt_config.validate_token(token)?;
        let auth_context = JwtConfig::claims_to_auth_context(claims)?;

        debug!("Token validated for account_id: {}", auth_context.account_id);
        Ok(auth_context)
    }

    /// Authenticate with email, password and company code
    pub async fn login(&self, request: LoginRequest) -> AppResult<Session> {
        let email = request.email.trim().to_lowercase();

        let account = sqlx::query_as::<_, Account>("SELECT * FROM account WHERE email = $1")
            .bind(&email)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| AppError::unauthorized(INVALID_CREDENTIALS))?;

        if !verify_password(&request.password, &account.password_hash)? {
            warn!("Password verification failed for account: {}", email);
            return Err(AppError::unauthorized(INVALID_CREDENTIALS));
        }

        if !account.is_active {
            warn!("Login attempt on deactivated account: {}", email);
            return Err(AppError::forbidden(
                "Your account is deactivated. Contact your administrator.",
            ));
        }

        let tenant = self.tenant(&account).await?;

        if account.role != Role::PlatformAdmin {
            let code = request
                .company_code
                .as_deref()
                .map(normalize_code)
                .unwrap_or_default();
            if code.is_empty() || code != tenant.code {
                warn!("Company code mismatch for account: {}", email);
                return Err(AppError::unauthorized("Invalid company code"));
            }
            if !tenant.is_active {
                return Err(AppError::forbidden(
                    "Company subscription is inactive. Contact support.",
                ));
            }
        }

        let account = sqlx::query_as::<_, Account>(
            "UPDATE account SET last_seen = $2 WHERE account_id = $1 RETURNING *",
        )
        .bind(account.account_id)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.db_pool)
        .await?;

        let session = self.session(account, &tenant)?;
        info!("Account authenticated successfully: {}", email);
        Ok(session)
    }

    /// Self-registration as a worker of a company that allows it
    pub async fn register(&self, request: RegisterRequest) -> AppResult<Session> {
        let email = account_service::normalize_email(&request.email)?;
        account_service::validate_password(&request.password)?;
        let display_name = request.display_name.trim();
        if display_name.is_empty() {
            return Err(AppError::validation("Missing required fields"));
        }

        let code = normalize_code(&request.company_code);
        let tenant = sqlx::query_as::<_, Tenant>(
            "SELECT * FROM tenant WHERE code = $1 AND is_active = TRUE",
        )
        .bind(&code)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| AppError::validation("Invalid or inactive company code"))?;

        if !tenant.allow_self_register {
            warn!("Self-registration refused for tenant: {}", tenant.code);
            return Err(AppError::forbidden(
                "Self-registration is not allowed for this company. Contact your administrator.",
            ));
        }

        let mut tx = self.db_pool.begin().await?;
        let account = account_service::create_with_seat_check(
            &mut tx,
            NewAccount {
                tenant_id: tenant.tenant_id,
                email: &email,
                password: &request.password,
                display_name,
                role: Role::Worker,
                phone: None,
            },
        )
        .await?;
        tx.commit().await?;

        info!("Self-registered account {} in tenant: {}", account.email, tenant.code);
        self.session(account, &tenant)
    }

    /// Profile of the calling account
    pub async fn me(&self, ctx: &AuthContext) -> AppResult<Profile> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM account WHERE account_id = $1")
            .bind(ctx.account_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(AppError::NotFound("User"))?;
        let tenant = self.tenant(&account).await?;
        Ok(Profile::new(account, &tenant))
    }

    /// Current enabled flag and role of an account, `None` once it is gone
    pub async fn account_state(&self, account_id: uuid::Uuid) -> AppResult<Option<(bool, Role)>> {
        let row: Option<(bool, String)> =
            sqlx::query_as("SELECT is_active, role FROM account WHERE account_id = $1")
                .bind(account_id)
                .fetch_optional(&self.db_pool)
                .await?;

        let Some((active, role)) = row else {
            return Ok(None);
        };
        let role: Role = role.parse().map_err(anyhow::Error::from)?;
        Ok(Some((active, role)))
    }

    async fn tenant(&self, account: &Account) -> AppResult<Tenant> {
        sqlx::query_as::<_, Tenant>("SELECT * FROM tenant WHERE tenant_id = $1")
            .bind(account.tenant_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(AppError::NotFound("Company"))
    }

    fn session(&self, account: Account, tenant: &Tenant) -> AppResult<Session> {
        let context = AuthContext {
            account_id: account.account_id,
            tenant_id: account.tenant_id,
            role: account.role,
        };
        let token = self.generate_token(&context)?;
        Ok(Session {
            token,
            profile: Profile::new(account, tenant),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hashing() {
        let password = "Admin@123";
        let hash = hash_password(password).unwrap();
        assert!(hash.starts_with("$argon2"));

        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let first = hash_password("HSE@123").unwrap();
        let second = hash_password("HSE@123").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        assert!(verify_password("anything", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_login_request_company_code_is_optional() {
        let request: LoginRequest = serde_json::from_value(serde_json::json!({
            "email": "admin@safenexus.com",
            "password": "Admin@123"
        }))
        .unwrap();
        assert!(request.company_code.is_none());
    }
}
