use serde::{Deserialize, Serialize};

use super::text_tags;

/// Account roles, highest authority first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    PlatformAdmin,
    CompanyAdmin,
    HseManager,
    HseSupervisor,
    SafetyOfficer,
    ShiftManager,
    ShiftIncharge,
    LineManager,
    LineIncharge,
    Supervisor,
    Employee,
    Worker,
    Contractor,
}

text_tags!(Role, "role", {
    PlatformAdmin => "platform_admin",
    CompanyAdmin => "company_admin",
    HseManager => "hse_manager",
    HseSupervisor => "hse_supervisor",
    SafetyOfficer => "safety_officer",
    ShiftManager => "shift_manager",
    ShiftIncharge => "shift_incharge",
    LineManager => "line_manager",
    LineIncharge => "line_incharge",
    Supervisor => "supervisor",
    Employee => "employee",
    Worker => "worker",
    Contractor => "contractor",
});

impl Role {
    /// Authority rank used to order account listings
    pub fn rank(&self) -> u8 {
        match self {
            Role::PlatformAdmin => 100,
            Role::CompanyAdmin => 90,
            Role::HseManager => 80,
            Role::HseSupervisor => 75,
            Role::SafetyOfficer => 70,
            Role::ShiftManager => 60,
            Role::ShiftIncharge => 55,
            Role::LineManager => 50,
            Role::LineIncharge => 45,
            Role::Supervisor => 40,
            Role::Employee => 20,
            Role::Worker => 10,
            Role::Contractor => 5,
        }
    }

    /// Roles that sign off the final (HSE) stage and may suspend active permits
    pub fn is_hse_tier(&self) -> bool {
        matches!(self, Role::HseSupervisor | Role::HseManager | Role::SafetyOfficer)
    }

    /// Roles that may be assigned to work under a permit
    pub fn is_worker_tier(&self) -> bool {
        matches!(self, Role::Employee | Role::Worker | Role::Contractor)
    }
}
