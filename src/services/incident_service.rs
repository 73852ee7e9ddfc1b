use std::sync::Arc;

use serde::Deserialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{self, CodePrefix};
use crate::error::{AppError, AppResult};
use crate::model::{
    normalize_code, AuthContext, Incident, IncidentDetail, IncidentKind, IncidentPhoto,
    IncidentStatus, NewIncident,
};
use crate::services::permit_service;
use crate::storage::{self, BlobStore};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncidentFilter {
    pub kind: Option<IncidentKind>,
    pub status: Option<IncidentStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub status: IncidentStatus,
}

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Checks a report before anything is written
fn validate_report(input: &NewIncident) -> AppResult<()> {
    if input.title.trim().is_empty() || input.location.trim().is_empty() {
        return Err(AppError::validation("Title and location are required"));
    }
    if input.kind == IncidentKind::StopWork && trimmed(input.stop_work_reason.as_deref()).is_none() {
        return Err(AppError::validation("A stop work report must give a reason"));
    }
    Ok(())
}

/// Incident status changes are reserved to the HSE tier and company admins
fn can_manage(ctx: &AuthContext) -> bool {
    ctx.role.is_hse_tier() || ctx.is_company_admin()
}

pub struct IncidentService {
    db_pool: PgPool,
    blobs: Arc<dyn BlobStore>,
}

impl IncidentService {
    pub fn new(db_pool: PgPool, blobs: Arc<dyn BlobStore>) -> Self {
        Self { db_pool, blobs }
    }

    /// Record an incident. A stop-work report naming a permit suspends that
    /// permit in the same transaction.
    pub async fn report(&self, ctx: &AuthContext, input: NewIncident) -> AppResult<IncidentDetail> {
        if ctx.is_platform_admin() {
            return Err(AppError::forbidden("Platform administrators cannot report incidents"));
        }
        validate_report(&input)?;

        let permit_code = trimmed(input.related_permit_code.as_deref()).map(normalize_code);
        let reason = trimmed(input.stop_work_reason.as_deref());
        let witnesses: Vec<String> = input
            .witnesses
            .iter()
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();
        let now = OffsetDateTime::now_utc();
        let occurred_at = input.occurred_at.unwrap_or(now);

        let mut tx = self.db_pool.begin().await?;

        let reporter_name: String = sqlx::query_scalar(
            "SELECT display_name FROM account WHERE account_id = $1 AND tenant_id = $2",
        )
        .bind(ctx.account_id)
        .bind(ctx.tenant_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::unauthorized("Invalid token"))?;

        let code = db::next_code(&mut tx, ctx.tenant_id, CodePrefix::Incident, now.year()).await?;

        let incident = sqlx::query_as::<_, Incident>(
            "INSERT INTO incident (incident_id, code, tenant_id, kind, title, description, location,
                                   occurred_at, related_permit_code, stop_work_reason, immediate_actions,
                                   witnesses, status, reported_by, reported_by_name, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $16)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&code)
        .bind(ctx.tenant_id)
        .bind(input.kind.as_str())
        .bind(input.title.trim())
        .bind(input.description.trim())
        .bind(input.location.trim())
        .bind(occurred_at)
        .bind(permit_code.as_deref())
        .bind(reason)
        .bind(trimmed(input.immediate_actions.as_deref()))
        .bind(&witnesses)
        .bind(IncidentStatus::initial_for(input.kind).as_str())
        .bind(ctx.account_id)
        .bind(&reporter_name)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let suspended_permit = match (input.kind, permit_code.as_deref(), reason) {
            (IncidentKind::StopWork, Some(permit_code), Some(reason)) => {
                permit_service::suspend_for_stop_work(&mut tx, ctx, &reporter_name, permit_code, reason, &code)
                    .await?
            }
            _ => None,
        };

        tx.commit().await?;

        info!("Incident {} ({}) reported by {}", incident.code, incident.kind, reporter_name);
        Ok(IncidentDetail {
            incident,
            photos: Vec::new(),
            suspended_permit,
        })
    }

    /// Incidents of the caller's company, most recent first
    pub async fn list(&self, ctx: &AuthContext, filter: &IncidentFilter) -> AppResult<Vec<Incident>> {
        let incidents = sqlx::query_as::<_, Incident>(
            "SELECT * FROM incident
             WHERE tenant_id = $1
               AND ($2::TEXT IS NULL OR kind = $2)
               AND ($3::TEXT IS NULL OR status = $3)
             ORDER BY occurred_at DESC",
        )
        .bind(ctx.tenant_id)
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.db_pool)
        .await?;

        Ok(incidents)
    }

    pub async fn get(&self, ctx: &AuthContext, incident_id: Uuid) -> AppResult<IncidentDetail> {
        let incident = self.find(ctx, incident_id).await?;
        let photos = sqlx::query_as::<_, IncidentPhoto>(
            "SELECT * FROM incident_photo WHERE incident_id = $1 ORDER BY uploaded_at",
        )
        .bind(incident.incident_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(IncidentDetail {
            incident,
            photos,
            suspended_permit: None,
        })
    }

    pub async fn update_status(
        &self,
        ctx: &AuthContext,
        incident_id: Uuid,
        status: IncidentStatus,
    ) -> AppResult<Incident> {
        if !can_manage(ctx) {
            warn!("Account {} attempted to change incident status", ctx.account_id);
            return Err(AppError::forbidden("Only HSE staff can change incident status"));
        }

        let incident = sqlx::query_as::<_, Incident>(
            "UPDATE incident SET status = $3, updated_at = $4
             WHERE incident_id = $1 AND tenant_id = $2
             RETURNING *",
        )
        .bind(incident_id)
        .bind(ctx.tenant_id)
        .bind(status.as_str())
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or(AppError::NotFound("Incident"))?;

        info!("Incident {} moved to {} by {}", incident.code, status, ctx.account_id);
        Ok(incident)
    }

    pub async fn attach_photo(
        &self,
        ctx: &AuthContext,
        incident_id: Uuid,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> AppResult<IncidentPhoto> {
        if bytes.is_empty() {
            return Err(AppError::validation("File is empty"));
        }
        let incident = self.find(ctx, incident_id).await?;

        let key = storage::incident_photo_key(ctx.tenant_id, &incident.code, file_name);
        let url = self.blobs.put(&key, bytes).await?;

        let photo = sqlx::query_as::<_, IncidentPhoto>(
            "INSERT INTO incident_photo (photo_id, incident_id, name, url, uploaded_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(incident.incident_id)
        .bind(storage::sanitize_file_name(file_name))
        .bind(&url)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.db_pool)
        .await?;

        info!("Photo {} attached to incident {}", photo.name, incident.code);
        Ok(photo)
    }

    async fn find(&self, ctx: &AuthContext, incident_id: Uuid) -> AppResult<Incident> {
        sqlx::query_as::<_, Incident>(
            "SELECT * FROM incident WHERE incident_id = $1 AND tenant_id = $2",
        )
        .bind(incident_id)
        .bind(ctx.tenant_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or(AppError::NotFound("Incident"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;

    fn report(kind: IncidentKind, reason: Option<&str>) -> NewIncident {
        NewIncident {
            kind,
            title: "Gas leak near tank 4".to_string(),
            description: String::new(),
            location: "Tank farm".to_string(),
            occurred_at: None,
            related_permit_code: Some("PTW-2024-001".to_string()),
            stop_work_reason: reason.map(str::to_string),
            immediate_actions: None,
            witnesses: Vec::new(),
        }
    }

    #[test]
    fn test_stop_work_needs_a_reason() {
        assert!(validate_report(&report(IncidentKind::StopWork, Some("H2S alarm"))).is_ok());
        assert!(validate_report(&report(IncidentKind::StopWork, Some("  "))).is_err());
        assert!(validate_report(&report(IncidentKind::StopWork, None)).is_err());
        assert!(validate_report(&report(IncidentKind::NearMiss, None)).is_ok());
    }

    #[test]
    fn test_title_and_location_required() {
        let mut input = report(IncidentKind::Minor, None);
        input.location = " ".to_string();
        assert_eq!(
            validate_report(&input).unwrap_err().to_string(),
            "Title and location are required"
        );
    }

    #[test]
    fn test_status_managers() {
        let ctx = |role| AuthContext {
            account_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            role,
        };
        assert!(can_manage(&ctx(Role::SafetyOfficer)));
        assert!(can_manage(&ctx(Role::CompanyAdmin)));
        assert!(!can_manage(&ctx(Role::Supervisor)));
        assert!(!can_manage(&ctx(Role::Worker)));
    }
}
