use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Deserialize;
use sqlx::{PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{self, CodePrefix};
use crate::error::{AppError, AppResult};
use crate::model::{
    AccountSummary, ApprovalRecord, ApprovalStage, AuthContext, DocumentKind, NewPermit, Permit,
    PermitDetail, PermitDocument, PermitStatus, PermitWorker, Role,
};
use crate::storage::{self, BlobStore};
use crate::workflow::{self, PermitAction, Transition, WorkflowError};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PermitFilter {
    pub status: Option<PermitStatus>,
    /// Matched against code, title and location
    pub search: Option<String>,
}

/// Body of approve/reject/suspend/close requests
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionRequest {
    pub remarks: Option<String>,
    /// Extra instructions recorded with an approval
    pub guidelines: Option<String>,
}

pub struct PermitService {
    db_pool: PgPool,
    blobs: Arc<dyn BlobStore>,
}

impl PermitService {
    pub fn new(db_pool: PgPool, blobs: Arc<dyn BlobStore>) -> Self {
        Self { db_pool, blobs }
    }

    /// Raise a permit; it starts waiting on the named supervisor
    pub async fn create(&self, ctx: &AuthContext, input: NewPermit) -> AppResult<PermitDetail> {
        if ctx.is_platform_admin() {
            return Err(AppError::forbidden("Platform administrators cannot raise permits"));
        }

        let title = input.title.trim();
        let location = input.location.trim();
        if title.is_empty() || location.is_empty() {
            return Err(AppError::validation("Title and location are required"));
        }
        if input.ends_at <= input.starts_at {
            return Err(AppError::validation("End time must be after start time"));
        }

        let supervisor = self
            .active_member(ctx.tenant_id, input.supervisor_id)
            .await?
            .filter(|s| s.role == Role::Supervisor)
            .ok_or_else(|| {
                AppError::validation("Supervisor must be an active supervisor of your company")
            })?;

        let workers = self.workers(ctx.tenant_id, &input.worker_ids).await?;
        let requester = self
            .active_member(ctx.tenant_id, ctx.account_id)
            .await?
            .ok_or_else(|| AppError::unauthorized("Invalid token"))?;

        let critical = input.permit_type.is_critical();
        let now = OffsetDateTime::now_utc();

        let mut tx = self.db_pool.begin().await?;
        let code = db::next_code(&mut tx, ctx.tenant_id, CodePrefix::Permit, now.year()).await?;

        let permit = sqlx::query_as::<_, Permit>(
            "INSERT INTO permit (permit_id, code, tenant_id, permit_type, title, description, location,
                                 work_area, starts_at, ends_at, status, requested_by, requested_by_name,
                                 supervisor_id, supervisor_name, hazards, controls, ppe, is_critical,
                                 swms_required, medical_fitness_required, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18,
                     $19, $19, $19, $20, $20)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&code)
        .bind(ctx.tenant_id)
        .bind(input.permit_type.as_str())
        .bind(title)
        .bind(input.description.trim())
        .bind(location)
        .bind(input.work_area.as_deref().map(str::trim).filter(|w| !w.is_empty()))
        .bind(input.starts_at)
        .bind(input.ends_at)
        .bind(PermitStatus::PendingSupervisor.as_str())
        .bind(requester.account_id)
        .bind(&requester.display_name)
        .bind(supervisor.account_id)
        .bind(&supervisor.display_name)
        .bind(&input.hazards)
        .bind(input.controls.trim())
        .bind(&input.ppe)
        .bind(critical)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        for worker in &workers {
            sqlx::query(
                "INSERT INTO permit_worker (permit_id, account_id, name, role) VALUES ($1, $2, $3, $4)",
            )
            .bind(permit.permit_id)
            .bind(worker.account_id)
            .bind(&worker.display_name)
            .bind(worker.role.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            "Permit {} ({}) raised by {} for supervisor {}",
            permit.code, permit.permit_type, requester.email, supervisor.email
        );
        self.detail(permit).await
    }

    /// Permits of the caller's company, newest first
    pub async fn list(&self, ctx: &AuthContext, filter: &PermitFilter) -> AppResult<Vec<Permit>> {
        let pattern = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let permits = sqlx::query_as::<_, Permit>(
            "SELECT * FROM permit
             WHERE tenant_id = $1
               AND ($2::TEXT IS NULL OR status = $2)
               AND ($3::TEXT IS NULL OR code ILIKE $3 OR title ILIKE $3 OR location ILIKE $3)
             ORDER BY created_at DESC",
        )
        .bind(ctx.tenant_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(pattern)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(permits)
    }

    pub async fn get(&self, ctx: &AuthContext, permit_id: Uuid) -> AppResult<PermitDetail> {
        let permit = sqlx::query_as::<_, Permit>(
            "SELECT * FROM permit WHERE permit_id = $1 AND tenant_id = $2",
        )
        .bind(permit_id)
        .bind(ctx.tenant_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or(AppError::NotFound("Permit"))?;

        self.detail(permit).await
    }

    /// Fire a workflow action against the locked permit row
    pub async fn act(
        &self,
        ctx: &AuthContext,
        permit_id: Uuid,
        action: PermitAction,
        request: ActionRequest,
    ) -> AppResult<PermitDetail> {
        let remarks = request
            .remarks
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty());
        let guidelines = request
            .guidelines
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty());

        let mut tx = self.db_pool.begin().await?;

        let permit = sqlx::query_as::<_, Permit>(
            "SELECT * FROM permit WHERE permit_id = $1 AND tenant_id = $2 FOR UPDATE",
        )
        .bind(permit_id)
        .bind(ctx.tenant_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Permit"))?;

        let transition = match workflow::authorize(&permit, ctx, action, remarks) {
            Ok(transition) => transition,
            Err(e) => {
                warn!("Permit {}: {} by {} refused: {}", permit.code, action, ctx.account_id, e);
                return Err(e.into());
            }
        };

        let actor_name: String =
            sqlx::query_scalar("SELECT display_name FROM account WHERE account_id = $1")
                .bind(ctx.account_id)
                .fetch_one(&mut *tx)
                .await?;

        let updated = apply(&mut tx, &permit, &transition, ctx, &actor_name, remarks, guidelines).await?;
        tx.commit().await?;

        info!(
            "Permit {}: {} -> {} ({} by {})",
            updated.code, transition.from, transition.to, action, actor_name
        );
        self.detail(updated).await
    }

    /// Upload a supporting document and record it on the permit
    pub async fn attach_document(
        &self,
        ctx: &AuthContext,
        permit_id: Uuid,
        kind: DocumentKind,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> AppResult<PermitDocument> {
        if bytes.is_empty() {
            return Err(AppError::validation("File is empty"));
        }

        let permit = sqlx::query_as::<_, Permit>(
            "SELECT * FROM permit WHERE permit_id = $1 AND tenant_id = $2",
        )
        .bind(permit_id)
        .bind(ctx.tenant_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or(AppError::NotFound("Permit"))?;

        if permit.status.is_terminal() {
            return Err(AppError::validation(
                "Documents cannot be added to a closed or rejected permit",
            ));
        }

        let key = storage::permit_document_key(ctx.tenant_id, &permit.code, kind, file_name);
        let url = self.blobs.put(&key, bytes).await?;

        let document = sqlx::query_as::<_, PermitDocument>(
            "INSERT INTO permit_document (document_id, permit_id, name, url, kind, uploaded_by, uploaded_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(permit.permit_id)
        .bind(storage::sanitize_file_name(file_name))
        .bind(&url)
        .bind(kind.as_str())
        .bind(ctx.account_id)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.db_pool)
        .await?;

        info!("Document {} ({}) attached to permit {}", document.name, kind, permit.code);
        Ok(document)
    }

    /// Permits whose open stage is waiting on the caller
    pub async fn pending_tasks(&self, ctx: &AuthContext) -> AppResult<Vec<Permit>> {
        let pending: Vec<String> = ApprovalStage::SEQUENCE
            .iter()
            .map(|stage| stage.pending_status().as_str().to_string())
            .collect();

        let permits = sqlx::query_as::<_, Permit>(
            "SELECT * FROM permit
             WHERE tenant_id = $1 AND status = ANY($2)
             ORDER BY created_at ASC",
        )
        .bind(ctx.tenant_id)
        .bind(&pending)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(permits
            .into_iter()
            .filter(|permit| workflow::is_stage_approver(permit, ctx))
            .collect())
    }

    async fn detail(&self, permit: Permit) -> AppResult<PermitDetail> {
        let approvals = sqlx::query_as::<_, ApprovalRecord>(
            "SELECT * FROM permit_approval WHERE permit_id = $1 ORDER BY decided_at",
        )
        .bind(permit.permit_id)
        .fetch_all(&self.db_pool)
        .await?;

        let workers = sqlx::query_as::<_, PermitWorker>(
            "SELECT * FROM permit_worker WHERE permit_id = $1 ORDER BY name",
        )
        .bind(permit.permit_id)
        .fetch_all(&self.db_pool)
        .await?;

        let documents = sqlx::query_as::<_, PermitDocument>(
            "SELECT * FROM permit_document WHERE permit_id = $1 ORDER BY uploaded_at",
        )
        .bind(permit.permit_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(PermitDetail::new(permit, approvals, workers, documents))
    }

    async fn active_member(&self, tenant_id: Uuid, account_id: Uuid) -> AppResult<Option<AccountSummary>> {
        let account = sqlx::query_as::<_, AccountSummary>(
            "SELECT account_id, display_name, email, role FROM account
             WHERE account_id = $1 AND tenant_id = $2 AND is_active = TRUE",
        )
        .bind(account_id)
        .bind(tenant_id)
        .fetch_optional(&self.db_pool)
        .await?;
        Ok(account)
    }

    async fn workers(&self, tenant_id: Uuid, worker_ids: &[Uuid]) -> AppResult<Vec<AccountSummary>> {
        let ids: Vec<Uuid> = worker_ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let workers = sqlx::query_as::<_, AccountSummary>(
            "SELECT account_id, display_name, email, role FROM account
             WHERE account_id = ANY($1) AND tenant_id = $2 AND is_active = TRUE",
        )
        .bind(&ids)
        .bind(tenant_id)
        .fetch_all(&self.db_pool)
        .await?;

        if workers.len() != ids.len() || workers.iter().any(|w| !w.role.is_worker_tier()) {
            return Err(AppError::validation(
                "Workers must be active workers of your company",
            ));
        }
        Ok(workers)
    }
}

/// Persist an authorized transition: new status, plus the approval record
/// or the suspension/closure details it carries.
async fn apply(
    tx: &mut Transaction<'_, Postgres>,
    permit: &Permit,
    transition: &Transition,
    actor: &AuthContext,
    actor_name: &str,
    remarks: Option<&str>,
    guidelines: Option<&str>,
) -> AppResult<Permit> {
    let now = OffsetDateTime::now_utc();

    if let Some((stage, decision)) = transition.decision {
        sqlx::query(
            "INSERT INTO permit_approval (approval_id, permit_id, stage, approver_id, approver_name,
                                          approver_role, decision, remarks, guidelines, decided_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(Uuid::new_v4())
        .bind(permit.permit_id)
        .bind(stage.as_str())
        .bind(actor.account_id)
        .bind(actor_name)
        .bind(actor.role.as_str())
        .bind(decision.as_str())
        .bind(remarks)
        .bind(guidelines)
        .bind(now)
        .execute(&mut **tx)
        .await?;
    }

    let updated = match transition.action {
        PermitAction::Approve | PermitAction::Reject => {
            sqlx::query_as::<_, Permit>(
                "UPDATE permit SET status = $2, updated_at = $3 WHERE permit_id = $1 RETURNING *",
            )
            .bind(permit.permit_id)
            .bind(transition.to.as_str())
            .bind(now)
            .fetch_one(&mut **tx)
            .await?
        }
        PermitAction::Suspend | PermitAction::StopWork => {
            sqlx::query_as::<_, Permit>(
                "UPDATE permit
                 SET status = $2, suspension_remarks = $3, suspended_at = $4, suspended_by = $5,
                     updated_at = $4
                 WHERE permit_id = $1
                 RETURNING *",
            )
            .bind(permit.permit_id)
            .bind(transition.to.as_str())
            .bind(remarks)
            .bind(now)
            .bind(actor.account_id)
            .fetch_one(&mut **tx)
            .await?
        }
        PermitAction::Close => {
            sqlx::query_as::<_, Permit>(
                "UPDATE permit
                 SET status = $2, closure_remarks = $3, closed_at = $4, closed_by = $5, updated_at = $4
                 WHERE permit_id = $1
                 RETURNING *",
            )
            .bind(permit.permit_id)
            .bind(transition.to.as_str())
            .bind(remarks)
            .bind(now)
            .bind(actor.account_id)
            .fetch_one(&mut **tx)
            .await?
        }
    };

    Ok(updated)
}

/// Suspend the permit named by a stop-work report, inside the report's
/// transaction. Returns the code of the permit when it was suspended.
///
/// An unknown code or a permit that is already suspended, closed or rejected
/// leaves the report standing without suspending anything.
pub(crate) async fn suspend_for_stop_work(
    tx: &mut Transaction<'_, Postgres>,
    actor: &AuthContext,
    actor_name: &str,
    permit_code: &str,
    reason: &str,
    incident_code: &str,
) -> AppResult<Option<String>> {
    let Some(permit) = sqlx::query_as::<_, Permit>(
        "SELECT * FROM permit WHERE tenant_id = $1 AND code = $2 FOR UPDATE",
    )
    .bind(actor.tenant_id)
    .bind(permit_code)
    .fetch_optional(&mut **tx)
    .await?
    else {
        warn!("Stop work {} names unknown permit {}", incident_code, permit_code);
        return Ok(None);
    };

    let remarks = stop_work_remarks(reason);
    let transition = match workflow::authorize(&permit, actor, PermitAction::StopWork, Some(&remarks)) {
        Ok(transition) => transition,
        Err(WorkflowError::InvalidTransition { from, .. }) => {
            info!("Stop work on permit {} left it {}", permit.code, from);
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    apply(tx, &permit, &transition, actor, actor_name, Some(&remarks), None).await?;

    sqlx::query("UPDATE permit SET related_incident_code = $2 WHERE permit_id = $1")
        .bind(permit.permit_id)
        .bind(incident_code)
        .execute(&mut **tx)
        .await?;

    warn!("Permit {} suspended by stop work {}", permit.code, incident_code);
    Ok(Some(permit.code))
}

fn stop_work_remarks(reason: &str) -> String {
    format!("Stop Work issued: {}", reason.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_work_remarks() {
        assert_eq!(stop_work_remarks(" H2S alarm "), "Stop Work issued: H2S alarm");
    }

    #[test]
    fn test_permit_filter_from_query() {
        let filter: PermitFilter =
            serde_json::from_value(serde_json::json!({ "status": "pending_hse", "search": "tank" })).unwrap();
        assert_eq!(filter.status, Some(PermitStatus::PendingHse));
        assert_eq!(filter.search.as_deref(), Some("tank"));

        let empty: PermitFilter = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(empty.status.is_none());
    }
}
