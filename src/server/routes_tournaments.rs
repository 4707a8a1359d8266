//! Tournament listing and admin lifecycle endpoints.

use super::error::{ApiError, ApiResult};
use super::middleware_auth::RequireAdmin;
use super::AppState;
use crate::models::{NewTournament, Tournament, TournamentStatus};
use crate::validate;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

pub async fn handler_list(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Tournament>>> {
    Ok(Json(state.db.list_tournaments().await?))
}

pub async fn handler_get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Tournament>> {
    state
        .db
        .get_tournament(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Tournament"))
}

pub async fn handler_create(
    State(state): State<Arc<AppState>>,
    RequireAdmin(admin): RequireAdmin,
    payload: Result<Json<NewTournament>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Tournament>)> {
    let Json(body) = payload?;
    validate::new_tournament(&body).map_err(ApiError::BadRequest)?;
    let tournament = state.db.create_tournament(&body).await?;
    info!(tournament_id = %tournament.id, admin = %admin.user_id, "tournament created");
    Ok((StatusCode::CREATED, Json(tournament)))
}

#[derive(Deserialize)]
pub struct StatusBody {
    pub status: TournamentStatus,
}

pub async fn handler_set_status(
    State(state): State<Arc<AppState>>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
    payload: Result<Json<StatusBody>, JsonRejection>,
) -> ApiResult<Json<Tournament>> {
    let Json(body) = payload?;
    let current = state
        .db
        .get_tournament(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Tournament"))?;
    validate::tournament_status_change(current.status, body.status, current.bracket_generated)
        .map_err(ApiError::Conflict)?;

    let updated = state
        .db
        .set_tournament_status(&id, body.status)
        .await?
        .ok_or_else(|| ApiError::not_found("Tournament"))?;
    info!(
        tournament_id = %id,
        from = %current.status,
        to = %body.status,
        admin = %admin.user_id,
        "tournament status changed"
    );
    Ok(Json(updated))
}
