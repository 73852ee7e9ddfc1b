use serde::{Deserialize, Serialize};

use super::text_tags;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanName {
    #[default]
    Starter,
    Standard,
    Enterprise,
    Internal,
}

text_tags!(PlanName, "plan", {
    Starter => "starter",
    Standard => "standard",
    Enterprise => "enterprise",
    Internal => "internal",
});

/// Catalog entry for a subscription plan; prices in INR per year
#[derive(Debug, Clone, Serialize)]
pub struct PlanDetails {
    pub name: PlanName,
    pub display_name: &'static str,
    pub free_users: i32,
    pub extra_user_cost: i64,
    pub yearly_price: i64,
    pub features: &'static [&'static str],
}

impl PlanName {
    pub fn details(&self) -> PlanDetails {
        match self {
            PlanName::Starter => PlanDetails {
                name: *self,
                display_name: "Starter",
                free_users: 50,
                extra_user_cost: 500,
                yearly_price: 50_000,
                features: &[
                    "Up to 50 users",
                    "Permit Management",
                    "Incident Reporting",
                    "Basic Reports",
                    "Email Support",
                ],
            },
            PlanName::Standard => PlanDetails {
                name: *self,
                display_name: "Standard",
                free_users: 100,
                extra_user_cost: 300,
                yearly_price: 120_000,
                features: &[
                    "Up to 100 users",
                    "All Starter features",
                    "Training Management",
                    "Audit & Inspections",
                    "Advanced Analytics",
                    "Priority Support",
                ],
            },
            PlanName::Enterprise => PlanDetails {
                name: *self,
                display_name: "Enterprise",
                free_users: 500,
                extra_user_cost: 200,
                yearly_price: 300_000,
                features: &[
                    "Unlimited users",
                    "All Standard features",
                    "Custom Workflows",
                    "API Access",
                    "Dedicated Support",
                    "On-premise Option",
                ],
            },
            PlanName::Internal => PlanDetails {
                name: *self,
                display_name: "Internal",
                free_users: 9999,
                extra_user_cost: 0,
                yearly_price: 0,
                features: &["Internal use only"],
            },
        }
    }

    /// Plans offered publicly; `Internal` is reserved for the platform tenant
    pub fn catalog() -> Vec<PlanDetails> {
        [PlanName::Starter, PlanName::Standard, PlanName::Enterprise]
            .iter()
            .map(PlanName::details)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Expiring,
    Expired,
}

impl SubscriptionStatus {
    /// Expiring within 30 days, expired once no whole day is left
    pub fn from_days_remaining(days: i64) -> Self {
        if days <= 0 {
            SubscriptionStatus::Expired
        } else if days <= 30 {
            SubscriptionStatus::Expiring
        } else {
            SubscriptionStatus::Active
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_excludes_internal() {
        let catalog = PlanName::catalog();
        assert_eq!(catalog.len(), 3);
        assert!(catalog.iter().all(|p| p.name != PlanName::Internal));
        assert_eq!(catalog[0].free_users, 50);
    }

    #[test]
    fn test_subscription_status_boundaries() {
        assert_eq!(SubscriptionStatus::from_days_remaining(-3), SubscriptionStatus::Expired);
        assert_eq!(SubscriptionStatus::from_days_remaining(0), SubscriptionStatus::Expired);
        assert_eq!(SubscriptionStatus::from_days_remaining(1), SubscriptionStatus::Expiring);
        assert_eq!(SubscriptionStatus::from_days_remaining(30), SubscriptionStatus::Expiring);
        assert_eq!(SubscriptionStatus::from_days_remaining(31), SubscriptionStatus::Active);
    }
}
