mod account;
mod incident;
mod permit;
mod plan;
mod role;
mod tenant;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use account::{Account, AccountSummary, CreateAccountRequest, UpdateAccount};
pub use incident::{Incident, IncidentDetail, IncidentKind, IncidentPhoto, IncidentStatus, NewIncident};
pub use permit::{
    ApprovalRecord, ApprovalStage, ChainEntry, ChainState, Decision, DocumentKind, NewPermit,
    Permit, PermitDetail, PermitDocument, PermitStatus, PermitType, PermitWorker,
};
pub use plan::{PlanDetails, PlanName, SubscriptionStatus};
pub use role::Role;
pub use tenant::{normalize_code, slugify, NewTenant, Tenant, UpdateTenant};

/// Error returned when a stored or submitted tag does not name a known variant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct ParseTagError {
    pub kind: &'static str,
    pub value: String,
}

/// Declares the snake_case text tags of a fieldless enum stored as TEXT.
macro_rules! text_tags {
    ($ty:ident, $kind:literal, { $($variant:ident => $tag:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $tag),+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = $crate::model::ParseTagError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($tag => Ok($ty::$variant),)+
                    other => Err($crate::model::ParseTagError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $ty {
            type Error = $crate::model::ParseTagError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.as_str().to_string()
            }
        }
    };
}

pub(crate) use text_tags;

/// Identity of the caller for the lifetime of one request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthContext {
    pub account_id: Uuid,
    pub tenant_id: Uuid,
    pub role: Role,
}

impl AuthContext {
    pub fn is_platform_admin(&self) -> bool {
        self.role == Role::PlatformAdmin
    }

    /// Company admins administer their own tenant; platform admins every tenant
    pub fn is_company_admin(&self) -> bool {
        matches!(self.role, Role::CompanyAdmin | Role::PlatformAdmin)
    }

    pub fn can_administer(&self, tenant_id: Uuid) -> bool {
        self.is_platform_admin() || (self.role == Role::CompanyAdmin && self.tenant_id == tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(role: Role) -> AuthContext {
        AuthContext {
            account_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            role,
        }
    }

    #[test]
    fn test_tags_parse_and_render() {
        assert_eq!("pending_hse".parse::<PermitStatus>().unwrap(), PermitStatus::PendingHse);
        assert_eq!(PermitStatus::PendingHse.to_string(), "pending_hse");
        assert_eq!(String::from(Role::ShiftIncharge), "shift_incharge");

        let err = "pending_manager".parse::<PermitStatus>().unwrap_err();
        assert_eq!(err.kind, "permit status");
        assert_eq!(err.to_string(), "invalid permit status: pending_manager");
    }

    #[test]
    fn test_company_admin_scope() {
        let admin = ctx(Role::CompanyAdmin);
        assert!(admin.is_company_admin());
        assert!(admin.can_administer(admin.tenant_id));
        assert!(!admin.can_administer(Uuid::new_v4()));

        let platform = ctx(Role::PlatformAdmin);
        assert!(platform.is_company_admin());
        assert!(platform.can_administer(Uuid::new_v4()));

        let supervisor = ctx(Role::Supervisor);
        assert!(!supervisor.can_administer(supervisor.tenant_id));
    }
}
