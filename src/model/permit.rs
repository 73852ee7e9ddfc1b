use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{text_tags, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermitType {
    HotWork,
    ConfinedSpace,
    WorkAtHeight,
    Electrical,
    Excavation,
    Lifting,
    Chemical,
    General,
}

text_tags!(PermitType, "permit type", {
    HotWork => "hot_work",
    ConfinedSpace => "confined_space",
    WorkAtHeight => "work_at_height",
    Electrical => "electrical",
    Excavation => "excavation",
    Lifting => "lifting",
    Chemical => "chemical",
    General => "general",
});

impl PermitType {
    /// Critical permits require a SWMS and medical fitness evidence
    pub fn is_critical(&self) -> bool {
        !matches!(self, PermitType::General)
    }
}

/// Lifecycle of a permit-to-work.
///
/// The three `Pending*` variants each carry exactly one open approval slot;
/// see [`PermitStatus::stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermitStatus {
    PendingSupervisor,
    PendingIncharge,
    PendingHse,
    Active,
    Suspended,
    Closed,
    Rejected,
}

text_tags!(PermitStatus, "permit status", {
    PendingSupervisor => "pending_supervisor",
    PendingIncharge => "pending_incharge",
    PendingHse => "pending_hse",
    Active => "active",
    Suspended => "suspended",
    Closed => "closed",
    Rejected => "rejected",
});

impl PermitStatus {
    /// The approval stage awaiting a decision, if any
    pub fn stage(&self) -> Option<ApprovalStage> {
        match self {
            PermitStatus::PendingSupervisor => Some(ApprovalStage::Supervisor),
            PermitStatus::PendingIncharge => Some(ApprovalStage::Incharge),
            PermitStatus::PendingHse => Some(ApprovalStage::Hse),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PermitStatus::Closed | PermitStatus::Rejected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStage {
    Supervisor,
    Incharge,
    Hse,
}

text_tags!(ApprovalStage, "approval stage", {
    Supervisor => "supervisor",
    Incharge => "incharge",
    Hse => "hse",
});

impl ApprovalStage {
    /// Stages in sign-off order
    pub const SEQUENCE: [ApprovalStage; 3] =
        [ApprovalStage::Supervisor, ApprovalStage::Incharge, ApprovalStage::Hse];

    /// Roles eligible to act on this stage. The supervisor stage is further
    /// bound to the one supervisor named on the permit.
    pub fn approver_roles(&self) -> &'static [Role] {
        match self {
            ApprovalStage::Supervisor => &[Role::Supervisor],
            ApprovalStage::Incharge => &[
                Role::ShiftIncharge,
                Role::ShiftManager,
                Role::LineIncharge,
                Role::LineManager,
            ],
            ApprovalStage::Hse => &[Role::HseSupervisor, Role::HseManager, Role::SafetyOfficer],
        }
    }

    /// Status a permit is in while this stage is open
    pub fn pending_status(&self) -> PermitStatus {
        match self {
            ApprovalStage::Supervisor => PermitStatus::PendingSupervisor,
            ApprovalStage::Incharge => PermitStatus::PendingIncharge,
            ApprovalStage::Hse => PermitStatus::PendingHse,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
}

text_tags!(Decision, "decision", {
    Approved => "approved",
    Rejected => "rejected",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Swms,
    MedicalFitness,
    SafetyAudit,
    EquipmentCertificate,
    LocationPhoto,
    ToolReference,
    Other,
}

text_tags!(DocumentKind, "document kind", {
    Swms => "swms",
    MedicalFitness => "medical_fitness",
    SafetyAudit => "safety_audit",
    EquipmentCertificate => "equipment_certificate",
    LocationPhoto => "location_photo",
    ToolReference => "tool_reference",
    Other => "other",
});

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Permit {
    pub permit_id: Uuid,
    /// Human-readable code, e.g. `PTW-2024-001`
    pub code: String,
    pub tenant_id: Uuid,
    #[sqlx(try_from = "String")]
    pub permit_type: PermitType,
    pub title: String,
    pub description: String,
    pub location: String,
    pub work_area: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub starts_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub ends_at: OffsetDateTime,
    #[sqlx(try_from = "String")]
    pub status: PermitStatus,
    pub requested_by: Uuid,
    pub requested_by_name: String,
    pub supervisor_id: Uuid,
    pub supervisor_name: String,
    pub hazards: Vec<String>,
    pub controls: String,
    pub ppe: Vec<String>,
    pub is_critical: bool,
    pub swms_required: bool,
    pub medical_fitness_required: bool,
    pub suspension_remarks: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub suspended_at: Option<OffsetDateTime>,
    pub suspended_by: Option<Uuid>,
    pub related_incident_code: Option<String>,
    pub closure_remarks: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub closed_at: Option<OffsetDateTime>,
    pub closed_by: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Permit {
    pub fn current_stage(&self) -> Option<ApprovalStage> {
        self.status.stage()
    }
}

/// One decision on a permit. Records are appended, never updated.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApprovalRecord {
    pub approval_id: Uuid,
    pub permit_id: Uuid,
    #[sqlx(try_from = "String")]
    pub stage: ApprovalStage,
    pub approver_id: Uuid,
    pub approver_name: String,
    #[sqlx(try_from = "String")]
    pub approver_role: Role,
    #[sqlx(try_from = "String")]
    pub decision: Decision,
    pub remarks: Option<String>,
    pub guidelines: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub decided_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PermitWorker {
    pub permit_id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PermitDocument {
    pub document_id: Uuid,
    pub permit_id: Uuid,
    pub name: String,
    pub url: String,
    #[sqlx(try_from = "String")]
    pub kind: DocumentKind,
    pub uploaded_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub uploaded_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainState {
    Approved,
    Rejected,
    /// The single open slot the permit is waiting on
    Pending,
    /// Not reached yet, or never reached because the permit left the chain
    Waiting,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChainEntry {
    pub stage: ApprovalStage,
    pub state: ChainState,
    pub approver_name: Option<String>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PermitDetail {
    #[serde(flatten)]
    pub permit: Permit,
    pub approvals: Vec<ApprovalRecord>,
    pub workers: Vec<PermitWorker>,
    pub documents: Vec<PermitDocument>,
    pub approval_chain: Vec<ChainEntry>,
}

impl PermitDetail {
    pub fn new(
        permit: Permit,
        approvals: Vec<ApprovalRecord>,
        workers: Vec<PermitWorker>,
        documents: Vec<PermitDocument>,
    ) -> Self {
        let approval_chain = approval_chain(permit.status, &permit.supervisor_name, &approvals);
        Self {
            permit,
            approvals,
            workers,
            documents,
            approval_chain,
        }
    }
}

/// Render the three-stage chain from recorded decisions plus the stage the
/// status says is open.
pub fn approval_chain(
    status: PermitStatus,
    supervisor_name: &str,
    approvals: &[ApprovalRecord],
) -> Vec<ChainEntry> {
    let open = status.stage();

    ApprovalStage::SEQUENCE
        .iter()
        .map(|stage| {
            if let Some(record) = approvals.iter().find(|a| a.stage == *stage) {
                let state = match record.decision {
                    Decision::Approved => ChainState::Approved,
                    Decision::Rejected => ChainState::Rejected,
                };
                return ChainEntry {
                    stage: *stage,
                    state,
                    approver_name: Some(record.approver_name.clone()),
                    remarks: record.remarks.clone(),
                };
            }

            let state = if open == Some(*stage) {
                ChainState::Pending
            } else {
                ChainState::Waiting
            };
            let approver_name = match stage {
                ApprovalStage::Supervisor => Some(supervisor_name.to_string()),
                _ => None,
            };
            ChainEntry {
                stage: *stage,
                state,
                approver_name,
                remarks: None,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPermit {
    pub permit_type: PermitType,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub location: String,
    pub work_area: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub starts_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub ends_at: OffsetDateTime,
    pub supervisor_id: Uuid,
    #[serde(default)]
    pub worker_ids: Vec<Uuid>,
    #[serde(default)]
    pub hazards: Vec<String>,
    #[serde(default)]
    pub controls: String,
    #[serde(default)]
    pub ppe: Vec<String>,
}
