//! # Admin Routes
//!
//! Every handler here requires the `admin` claim.
//!
//! - `GET /api/admin/dashboard`: status counts and captured revenue
//! - `POST /api/admin/teams/{id}/approve`, `.../reject`
//! - `POST /api/admin/payments/{id}/refund`, `GET /api/admin/refunds`
//! - `GET|PUT /api/admin/settings`
//! - `POST /api/admin/jobs/{name}/run`: run a scheduled job now

use super::error::{ApiError, ApiResult};
use super::middleware_auth::RequireAdmin;
use super::routes_teams::set_status;
use super::AppState;
use crate::db::RefundOutcome;
use crate::jobs::scheduler::JobReport;
use crate::jobs::Job;
use crate::models::{Refund, Team, TeamStatus};
use crate::summary::{summarize, DashboardSummary};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::info;

pub async fn handler_dashboard(
    State(state): State<Arc<AppState>>,
    RequireAdmin(_admin): RequireAdmin,
) -> ApiResult<Json<DashboardSummary>> {
    let (teams, payments, tournaments) = tokio::try_join!(
        state.db.all_teams(),
        state.db.all_payments(),
        state.db.list_tournaments(),
    )?;
    Ok(Json(summarize(&teams, &payments, &tournaments)))
}

pub async fn handler_approve(
    State(state): State<Arc<AppState>>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
) -> ApiResult<Json<Team>> {
    set_status(&state, &id, TeamStatus::Approved, None, &admin.user_id).await
}

#[derive(Deserialize, Default)]
pub struct ReasonBody {
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn handler_reject(
    State(state): State<Arc<AppState>>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
    payload: Option<Json<ReasonBody>>,
) -> ApiResult<Json<Team>> {
    let reason = payload
        .and_then(|Json(b)| b.reason)
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    set_status(&state, &id, TeamStatus::Rejected, reason.as_deref(), &admin.user_id).await
}

pub async fn handler_refund(
    State(state): State<Arc<AppState>>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
    payload: Result<Json<ReasonBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let reason = body
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| ApiError::bad_request("reason is required"))?;

    match state.db.refund_payment(&id, reason, &admin.user_id).await? {
        RefundOutcome::Refunded { refund, payment } => {
            info!(
                payment_id = %payment.id,
                refund_id = %refund.id,
                amount = refund.amount,
                admin = %admin.user_id,
                "payment refunded"
            );
            Ok(Json(json!({ "refund": refund, "payment": payment })))
        }
        RefundOutcome::NotRefundable(payment) => Err(ApiError::conflict(format!(
            "Only captured payments can be refunded (payment is {})",
            payment.status
        ))),
        RefundOutcome::NotFound => Err(ApiError::not_found("Payment")),
    }
}

pub async fn handler_refunds(
    State(state): State<Arc<AppState>>,
    RequireAdmin(_admin): RequireAdmin,
) -> ApiResult<Json<Vec<Refund>>> {
    Ok(Json(state.db.list_refunds().await?))
}

pub async fn handler_settings_get(
    State(state): State<Arc<AppState>>,
    RequireAdmin(_admin): RequireAdmin,
) -> ApiResult<Json<Map<String, Value>>> {
    Ok(Json(state.db.get_settings().await?))
}

pub async fn handler_settings_put(
    State(state): State<Arc<AppState>>,
    RequireAdmin(admin): RequireAdmin,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> ApiResult<Json<Map<String, Value>>> {
    let Json(updates) = payload?;
    if updates.is_empty() {
        return Err(ApiError::bad_request("settings body must not be empty"));
    }
    if updates.keys().any(|k| k.trim().is_empty()) {
        return Err(ApiError::bad_request("setting keys must not be blank"));
    }
    let settings = state.db.update_settings(&updates).await?;
    info!(keys = updates.len(), admin = %admin.user_id, "settings updated");
    Ok(Json(settings))
}

pub async fn handler_run_job(
    State(state): State<Arc<AppState>>,
    RequireAdmin(admin): RequireAdmin,
    Path(name): Path<String>,
) -> ApiResult<Json<JobReport>> {
    let job: Job = name
        .parse()
        .map_err(|_| ApiError::NotFound(format!("Unknown job '{}'", name)))?;
    info!(job = %job, admin = %admin.user_id, "manual job run requested");
    // A request timeout drops this future but not the spawned run.
    match state.jobs.spawn_run(job).await.map_err(anyhow::Error::from)?? {
        Some(report) => Ok(Json(report)),
        None => Err(ApiError::conflict(format!("{} is already running", job))),
    }
}
