//! # Team Routes
//!
//! | Method | Path | Access |
//! |--------|------|--------|
//! | GET | `/api/teams?status=&tournament_id=` | public |
//! | GET | `/api/teams/{id}` | public |
//! | POST | `/api/teams` | authenticated |
//! | PUT | `/api/teams/{id}` | owner or admin |
//! | DELETE | `/api/teams/{id}` | admin |
//! | PATCH | `/api/teams/{id}/status` | admin |
//! | PATCH | `/api/teams/{id}/payment-status` | admin |

use super::error::{ApiError, ApiResult};
use super::middleware_auth::{RequireAdmin, RequireAuth};
use super::AppState;
use crate::db::is_unique_violation;
use crate::models::{NewTeam, Team, TeamFilter, TeamPaymentStatus, TeamStatus, TeamUpdate, TournamentStatus};
use crate::validate;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

const DUPLICATE_NAME: &str = "A team with this name already exists";

/// Map a unique-constraint violation on insert/update to 409.
fn name_conflict(e: anyhow::Error) -> ApiError {
    if is_unique_violation(&e) {
        ApiError::conflict(DUPLICATE_NAME)
    } else {
        ApiError::Internal(e)
    }
}

pub(super) async fn load_team(state: &AppState, id: &str) -> ApiResult<Team> {
    state
        .db
        .get_team(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Team"))
}

pub async fn handler_list(
    State(state): State<Arc<AppState>>,
    query: Result<Query<TeamFilter>, QueryRejection>,
) -> ApiResult<Json<Vec<Team>>> {
    let Query(filter) = query?;
    Ok(Json(state.db.list_teams(&filter).await?))
}

pub async fn handler_get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Team>> {
    Ok(Json(load_team(&state, &id).await?))
}

pub async fn handler_create(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    payload: Result<Json<NewTeam>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Team>)> {
    let Json(body) = payload?;
    validate::new_team(&body).map_err(ApiError::BadRequest)?;

    let tournament = state
        .db
        .get_tournament(&body.tournament_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Tournament"))?;
    if tournament.status != TournamentStatus::RegistrationOpen {
        return Err(ApiError::conflict("Registration for this tournament is closed"));
    }
    if let Some(max) = tournament.max_teams {
        let registered = state.db.count_teams_in(&tournament.id).await?;
        if registered >= i64::from(max) {
            return Err(ApiError::conflict("Tournament is full"));
        }
    }

    if body.entry_fee.is_some_and(|fee| fee != tournament.entry_fee) {
        return Err(ApiError::bad_request(format!(
            "entryFee must equal the tournament entry fee of {}",
            tournament.entry_fee
        )));
    }

    let team = state
        .db
        .create_team(&body, tournament.entry_fee, &user.user_id)
        .await
        .map_err(name_conflict)?;
    info!(team_id = %team.id, tournament_id = %team.tournament_id, owner = %user.user_id, "team registered");
    Ok((StatusCode::CREATED, Json(team)))
}

pub async fn handler_update(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
    payload: Result<Json<TeamUpdate>, JsonRejection>,
) -> ApiResult<Json<Team>> {
    let Json(body) = payload?;
    validate::team_update(&body).map_err(ApiError::BadRequest)?;

    let team = load_team(&state, &id).await?;
    if team.owner_id != user.user_id && !user.is_admin {
        return Err(ApiError::Forbidden("Only the team owner can edit this team".into()));
    }

    let updated = state
        .db
        .update_team(&id, &body)
        .await
        .map_err(name_conflict)?
        .ok_or_else(|| ApiError::not_found("Team"))?;
    Ok(Json(updated))
}

pub async fn handler_delete(
    State(state): State<Arc<AppState>>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    if !state.db.delete_team(&id).await? {
        return Err(ApiError::not_found("Team"));
    }
    info!(team_id = %id, admin = %admin.user_id, "team deleted");
    Ok(Json(json!({ "deleted": id })))
}

#[derive(Deserialize)]
pub struct StatusBody {
    pub status: TeamStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn handler_set_status(
    State(state): State<Arc<AppState>>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
    payload: Result<Json<StatusBody>, JsonRejection>,
) -> ApiResult<Json<Team>> {
    let Json(body) = payload?;
    set_status(&state, &id, body.status, body.reason.as_deref(), &admin.user_id).await
}

/// Shared by the PATCH endpoint and the admin approve/reject shortcuts.
pub(super) async fn set_status(
    state: &AppState,
    id: &str,
    status: TeamStatus,
    reason: Option<&str>,
    admin_id: &str,
) -> ApiResult<Json<Team>> {
    let team = load_team(state, id).await?;
    validate::team_status_change(&team, status).map_err(ApiError::Conflict)?;

    let updated = state
        .db
        .set_team_status(id, status, reason)
        .await?
        .ok_or_else(|| ApiError::not_found("Team"))?;
    info!(team_id = %id, from = %team.status, to = %status, admin = %admin_id, "team status changed");
    Ok(Json(updated))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusBody {
    pub payment_status: TeamPaymentStatus,
}

pub async fn handler_set_payment_status(
    State(state): State<Arc<AppState>>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
    payload: Result<Json<PaymentStatusBody>, JsonRejection>,
) -> ApiResult<Json<Team>> {
    let Json(body) = payload?;
    let team = load_team(&state, &id).await?;
    validate::team_payment_status_change(&team, body.payment_status)
        .map_err(ApiError::Conflict)?;

    let updated = state
        .db
        .set_team_payment_status(&id, body.payment_status)
        .await?
        .ok_or_else(|| ApiError::not_found("Team"))?;
    info!(
        team_id = %id,
        from = %team.payment_status,
        to = %body.payment_status,
        admin = %admin.user_id,
        "team payment status changed"
    );
    Ok(Json(updated))
}
