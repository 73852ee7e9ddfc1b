//! Permit approval workflow.
//!
//! A permit moves `pending_supervisor → pending_incharge → pending_hse →
//! active`, with `rejected`, `suspended` and `closed` as side branches. The
//! transition table lives in [`transition`]; who may fire a transition is
//! decided by [`authorize`]. Both are pure so the service layer can
//! re-validate against a locked row before writing.

use serde::Serialize;

use crate::model::{ApprovalStage, AuthContext, Decision, Permit, PermitStatus, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PermitAction {
    Approve,
    Reject,
    /// Manual suspension of an active permit
    Suspend,
    /// Suspension forced by a stop-work incident
    StopWork,
    Close,
}

impl PermitAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermitAction::Approve => "approve",
            PermitAction::Reject => "reject",
            PermitAction::Suspend => "suspend",
            PermitAction::StopWork => "stop work on",
            PermitAction::Close => "close",
        }
    }

    fn requires_remarks(&self) -> bool {
        !matches!(self, PermitAction::Approve)
    }
}

impl std::fmt::Display for PermitAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("Cannot {action} a permit that is {from}")]
    InvalidTransition {
        from: PermitStatus,
        action: PermitAction,
    },

    #[error("Only the assigned supervisor can act on the supervisor stage")]
    NotAssignedSupervisor,

    #[error("Role {role} cannot act on the {stage} stage")]
    RoleNotAuthorized { role: Role, stage: ApprovalStage },

    #[error("Only the requester or an HSE approver can suspend this permit")]
    NotAllowedToSuspend,

    #[error("Only the requester can close this permit")]
    NotRequester,

    #[error("Remarks are required to {0} a permit")]
    RemarksRequired(PermitAction),

    #[error("Permit belongs to another company")]
    WrongTenant,
}

impl WorkflowError {
    /// True when the caller is not allowed to act, as opposed to the permit
    /// not being in a state that allows the action.
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            WorkflowError::NotAssignedSupervisor
                | WorkflowError::RoleNotAuthorized { .. }
                | WorkflowError::NotAllowedToSuspend
                | WorkflowError::NotRequester
                | WorkflowError::WrongTenant
        )
    }
}

/// An authorized state change, ready to be persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: PermitStatus,
    pub to: PermitStatus,
    pub action: PermitAction,
    /// Stage and decision to append to the approval log, for approve/reject
    pub decision: Option<(ApprovalStage, Decision)>,
}

/// The transition table. Returns the status reached by firing `action` in
/// state `from`.
pub fn transition(from: PermitStatus, action: PermitAction) -> Result<PermitStatus, WorkflowError> {
    use PermitAction::*;
    use PermitStatus::*;

    let to = match (from, action) {
        (PendingSupervisor, Approve) => PendingIncharge,
        (PendingIncharge, Approve) => PendingHse,
        (PendingHse, Approve) => Active,
        (PendingSupervisor | PendingIncharge | PendingHse, Reject) => Rejected,
        (Active, Suspend) => Suspended,
        (PendingSupervisor | PendingIncharge | PendingHse | Active, StopWork) => Suspended,
        (Active, Close) => Closed,
        _ => return Err(WorkflowError::InvalidTransition { from, action }),
    };

    Ok(to)
}

/// True if `actor` is the approver the permit's open stage is waiting on
pub fn is_stage_approver(permit: &Permit, actor: &AuthContext) -> bool {
    if permit.tenant_id != actor.tenant_id {
        return false;
    }
    match permit.current_stage() {
        Some(stage) => stage_check(stage, permit, actor).is_ok(),
        None => false,
    }
}

fn stage_check(stage: ApprovalStage, permit: &Permit, actor: &AuthContext) -> Result<(), WorkflowError> {
    match stage {
        // Bound to the one account named on the permit
        ApprovalStage::Supervisor => {
            if actor.account_id == permit.supervisor_id {
                Ok(())
            } else {
                Err(WorkflowError::NotAssignedSupervisor)
            }
        }
        // Any account holding one of the stage's roles
        ApprovalStage::Incharge | ApprovalStage::Hse => {
            if stage.approver_roles().contains(&actor.role) {
                Ok(())
            } else {
                Err(WorkflowError::RoleNotAuthorized {
                    role: actor.role,
                    stage,
                })
            }
        }
    }
}

/// Decide whether `actor` may fire `action` on `permit` right now.
///
/// The state check runs before the actor check, so terminal permits report
/// [`WorkflowError::InvalidTransition`] to everyone.
pub fn authorize(
    permit: &Permit,
    actor: &AuthContext,
    action: PermitAction,
    remarks: Option<&str>,
) -> Result<Transition, WorkflowError> {
    if permit.tenant_id != actor.tenant_id {
        return Err(WorkflowError::WrongTenant);
    }

    let from = permit.status;
    let to = transition(from, action)?;

    let decision = match action {
        PermitAction::Approve | PermitAction::Reject => {
            // transition() only accepts approve/reject from a pending status
            let stage = from
                .stage()
                .ok_or(WorkflowError::InvalidTransition { from, action })?;
            stage_check(stage, permit, actor)?;
            let decision = if action == PermitAction::Approve {
                Decision::Approved
            } else {
                Decision::Rejected
            };
            Some((stage, decision))
        }
        PermitAction::Suspend => {
            if actor.account_id != permit.requested_by && !actor.role.is_hse_tier() {
                return Err(WorkflowError::NotAllowedToSuspend);
            }
            None
        }
        PermitAction::Close => {
            if actor.account_id != permit.requested_by {
                return Err(WorkflowError::NotRequester);
            }
            None
        }
        // Any account of the tenant may raise a stop-work
        PermitAction::StopWork => None,
    };

    let has_remarks = remarks.is_some_and(|r| !r.trim().is_empty());
    if action.requires_remarks() && !has_remarks {
        return Err(WorkflowError::RemarksRequired(action));
    }

    Ok(Transition {
        from,
        to,
        action,
        decision,
    })
}
