use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::model::{AuthContext, PlanDetails, PlanName, SubscriptionStatus};

/// Subscription state of the caller's company
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionOverview {
    pub tenant_id: Uuid,
    pub plan: PlanName,
    pub plan_details: PlanDetails,
    pub user_limit: i32,
    pub active_users: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub expiry_date: OffsetDateTime,
    pub days_remaining: i64,
    pub status: SubscriptionStatus,
}

/// Whole days from `now` until `expiry`, rounded up; negative once expired
pub fn days_remaining(expiry: OffsetDateTime, now: OffsetDateTime) -> i64 {
    let seconds = (expiry - now).whole_seconds();
    seconds.div_euclid(86_400) + i64::from(seconds.rem_euclid(86_400) > 0)
}

pub async fn overview(pool: &PgPool, ctx: &AuthContext) -> AppResult<SubscriptionOverview> {
    let (plan, user_limit, expiry_date): (String, i32, OffsetDateTime) = sqlx::query_as(
        "SELECT plan, user_limit, expiry_date FROM tenant WHERE tenant_id = $1",
    )
    .bind(ctx.tenant_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Company"))?;

    let plan: PlanName = plan.parse().map_err(anyhow::Error::from)?;

    let active_users: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM account WHERE tenant_id = $1 AND is_active = TRUE",
    )
    .bind(ctx.tenant_id)
    .fetch_one(pool)
    .await?;

    let days = days_remaining(expiry_date, OffsetDateTime::now_utc());

    Ok(SubscriptionOverview {
        tenant_id: ctx.tenant_id,
        plan,
        plan_details: plan.details(),
        user_limit,
        active_users,
        expiry_date,
        days_remaining: days,
        status: SubscriptionStatus::from_days_remaining(days),
    })
}
