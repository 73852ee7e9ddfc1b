mod auth_service;
mod middleware;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::config::Settings;
use crate::error::{AppError, AppResult};
use crate::model::{AuthContext, Role};

pub use auth_service::{hash_password, verify_password, AuthService, LoginRequest, Profile, RegisterRequest, Session};
pub use middleware::{auth_middleware, AuthUser};

/// JWT Claims structure that will be encoded in the token
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (account ID)
    pub sub: Uuid,
    /// Tenant the account belongs to
    pub tid: Uuid,
    /// Role of the account when the token was issued
    pub role: String,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
    /// Issuer
    pub iss: String,
}

/// Configuration for JWT tokens
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret key for signing tokens
    encoding_key: EncodingKey,
    /// Key for verifying token signatures
    decoding_key: DecodingKey,
    /// Token expiration time in seconds
    expiration: i64,
    /// Issuer claim value
    issuer: String,
}

impl JwtConfig {
    pub fn new(secret: &str, expiration: i64, issuer: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration,
            issuer: issuer.to_string(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            &settings.jwt_secret,
            settings.jwt_expiration_seconds,
            &settings.jwt_issuer,
        )
    }

    /// Generate a JWT token for an authenticated account
    pub fn generate_token(&self, auth_context: &AuthContext) -> AppResult<String> {
        let now = OffsetDateTime::now_utc();
        let expiration = now + Duration::seconds(self.expiration);

        let claims = Claims {
            sub: auth_context.account_id,
            tid: auth_context.tenant_id,
            role: auth_context.role.to_string(),
            iat: now.unix_timestamp(),
            exp: expiration.unix_timestamp(),
            iss: self.issuer.clone(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)?;

        debug!("Generated JWT token for account_id: {}", auth_context.account_id);
        Ok(token)
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)?;

        debug!("Validated JWT token for account_id: {}", token_data.claims.sub);
        Ok(token_data.claims)
    }

    /// Convert JWT claims to AuthContext
    pub fn claims_to_auth_context(claims: Claims) -> AppResult<AuthContext> {
        let role: Role = claims
            .role
            .parse()
            .map_err(|_| AppError::unauthorized("Invalid token"))?;

        Ok(AuthContext {
            account_id: claims.sub,
            tenant_id: claims.tid,
            role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig::new("test_secret_key_for_jwt_token_testing", 3600, "test_issuer")
    }

    #[test]
    fn test_jwt_token_lifecycle() {
        let jwt_config = test_config();

        let auth_context = AuthContext {
            account_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            role: Role::ShiftIncharge,
        };

        let token = jwt_config.generate_token(&auth_context).unwrap();
        assert!(!token.is_empty());

        let claims = jwt_config.validate_token(&token).unwrap();
        assert_eq!(claims.sub, auth_context.account_id);
        assert_eq!(claims.tid, auth_context.tenant_id);
        assert_eq!(claims.role, "shift_incharge");
        assert_eq!(claims.iss, "test_issuer");

        let decoded_context = JwtConfig::claims_to_auth_context(claims).unwrap();
        assert_eq!(decoded_context, auth_context);
    }

    #[test]
    fn test_token_from_other_issuer_is_rejected() {
        let context = AuthContext {
            account_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            role: Role::Worker,
        };
        let foreign = JwtConfig::new("test_secret_key_for_jwt_token_testing", 3600, "someone_else");
        let token = foreign.generate_token(&context).unwrap();

        assert!(test_config().validate_token(&token).is_err());
    }

    #[test]
    fn test_wrong_secret_fails() {
        let context = AuthContext {
            account_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            role: Role::Worker,
        };
        let token = JwtConfig::new("secret-one", 3600, "test_issuer")
            .generate_token(&context)
            .unwrap();

        assert!(test_config().validate_token(&token).is_err());
    }

    #[test]
    fn test_unknown_role_claim_is_unauthorized() {
        let claims = Claims {
            sub: Uuid::new_v4(),
            tid: Uuid::new_v4(),
            role: "superuser".to_string(),
            iat: 0,
            exp: 0,
            iss: "test_issuer".to_string(),
        };

        let err = JwtConfig::claims_to_auth_context(claims).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}
