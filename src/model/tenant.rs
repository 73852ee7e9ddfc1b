use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::PlanName;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub tenant_id: Uuid,
    pub slug: String,
    pub name: String,
    /// Company code, always stored uppercase
    pub code: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub is_active: bool,
    #[sqlx(try_from = "String")]
    pub plan: PlanName,
    /// Seat limit: maximum number of active accounts
    pub user_limit: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub expiry_date: OffsetDateTime,
    pub allow_self_register: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTenant {
    pub name: String,
    pub code: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[serde(default)]
    pub plan: PlanName,
    #[serde(default = "default_user_limit")]
    pub user_limit: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub expiry_date: OffsetDateTime,
    #[serde(default)]
    pub allow_self_register: bool,
}

fn default_user_limit() -> i32 {
    25
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTenant {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub plan: Option<PlanName>,
    pub user_limit: Option<i32>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expiry_date: Option<OffsetDateTime>,
    pub allow_self_register: Option<bool>,
}

/// Company codes are compared case-insensitively by storing and comparing
/// the trimmed uppercase form.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Lowercase slug with every run of non-alphanumerics collapsed to `_`
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code(" demo-001 "), "DEMO-001");
        assert_eq!(normalize_code("DEMO-001"), "DEMO-001");
        assert_eq!(normalize_code(&normalize_code("safenexus")), "SAFENEXUS");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Demo Industries"), "demo_industries");
        assert_eq!(slugify("  ACME -- Oil & Gas, Ltd. "), "acme_oil_gas_ltd");
        assert_eq!(slugify("Bücher GmbH"), "b_cher_gmbh");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn test_new_tenant_defaults() {
        let input: NewTenant = serde_json::from_value(serde_json::json!({
            "name": "Demo Industries",
            "code": "demo-001",
            "expiry_date": "2030-01-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(input.plan, PlanName::Starter);
        assert_eq!(input.user_limit, 25);
        assert!(!input.allow_self_register);
    }
}
