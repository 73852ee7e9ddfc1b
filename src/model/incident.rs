use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::text_tags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentKind {
    NearMiss,
    FirstAid,
    Minor,
    Major,
    Fatality,
    StopWork,
}

text_tags!(IncidentKind, "incident kind", {
    NearMiss => "near_miss",
    FirstAid => "first_aid",
    Minor => "minor",
    Major => "major",
    Fatality => "fatality",
    StopWork => "stop_work",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Reported,
    Investigating,
    PendingCapa,
    Closed,
    StopWorkActive,
}

text_tags!(IncidentStatus, "incident status", {
    Reported => "reported",
    Investigating => "investigating",
    PendingCapa => "pending_capa",
    Closed => "closed",
    StopWorkActive => "stop_work_active",
});

impl IncidentStatus {
    pub fn initial_for(kind: IncidentKind) -> Self {
        match kind {
            IncidentKind::StopWork => IncidentStatus::StopWorkActive,
            _ => IncidentStatus::Reported,
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, IncidentStatus::Closed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Incident {
    pub incident_id: Uuid,
    /// Human-readable code, e.g. `INC-2024-001`
    pub code: String,
    pub tenant_id: Uuid,
    #[sqlx(try_from = "String")]
    pub kind: IncidentKind,
    pub title: String,
    pub description: String,
    pub location: String,
    #[serde(with = "time::serde::rfc3339")]
    pub occurred_at: OffsetDateTime,
    pub related_permit_code: Option<String>,
    pub stop_work_reason: Option<String>,
    pub immediate_actions: Option<String>,
    pub witnesses: Vec<String>,
    #[sqlx(try_from = "String")]
    pub status: IncidentStatus,
    pub reported_by: Uuid,
    pub reported_by_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct IncidentPhoto {
    pub photo_id: Uuid,
    pub incident_id: Uuid,
    pub name: String,
    pub url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub uploaded_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct IncidentDetail {
    #[serde(flatten)]
    pub incident: Incident,
    pub photos: Vec<IncidentPhoto>,
    /// Set when a stop-work report suspended the linked permit
    pub suspended_permit: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewIncident {
    pub kind: IncidentKind,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub location: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub occurred_at: Option<OffsetDateTime>,
    pub related_permit_code: Option<String>,
    pub stop_work_reason: Option<String>,
    pub immediate_actions: Option<String>,
    #[serde(default)]
    pub witnesses: Vec<String>,
}
