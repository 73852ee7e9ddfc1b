use std::collections::BTreeMap;

use serde::Serialize;
use sqlx::PgPool;

use crate::error::AppResult;
use crate::model::{AuthContext, IncidentStatus, PermitStatus};
use crate::services::PermitService;

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    /// Count per permit status; every status is present
    pub permits: BTreeMap<&'static str, i64>,
    pub total_permits: i64,
    pub open_incidents: i64,
    pub active_stop_work: i64,
    /// Permits waiting on the caller's decision
    pub pending_approvals: usize,
}

fn permit_counts(rows: &[(String, i64)]) -> BTreeMap<&'static str, i64> {
    PermitStatus::ALL
        .iter()
        .map(|status| {
            let count = rows
                .iter()
                .find(|(tag, _)| tag == status.as_str())
                .map_or(0, |(_, n)| *n);
            (status.as_str(), count)
        })
        .collect()
}

pub async fn summary(pool: &PgPool, permits: &PermitService, ctx: &AuthContext) -> AppResult<Dashboard> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT status, COUNT(*) FROM permit WHERE tenant_id = $1 GROUP BY status",
    )
    .bind(ctx.tenant_id)
    .fetch_all(pool)
    .await?;

    let (open_incidents, active_stop_work): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*) FILTER (WHERE status <> $2),
                COUNT(*) FILTER (WHERE status = $3)
         FROM incident WHERE tenant_id = $1",
    )
    .bind(ctx.tenant_id)
    .bind(IncidentStatus::Closed.as_str())
    .bind(IncidentStatus::StopWorkActive.as_str())
    .fetch_one(pool)
    .await?;

    let pending_approvals = permits.pending_tasks(ctx).await?.len();
    let permits = permit_counts(&rows);

    Ok(Dashboard {
        total_permits: permits.values().sum(),
        permits,
        open_incidents,
        active_stop_work,
        pending_approvals,
    })
}
