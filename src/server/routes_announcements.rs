//! Announcements: public feed plus admin create/delete.

use super::error::{ApiError, ApiResult};
use super::middleware_auth::RequireAdmin;
use super::AppState;
use crate::models::{Announcement, NewAnnouncement};
use crate::validate;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

/// `GET /api/announcements`, newest first.
pub async fn handler_public_list(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<Announcement>>> {
    Ok(Json(state.db.list_announcements().await?))
}

/// `GET /api/admin/announcements`
pub async fn handler_admin_list(
    State(state): State<Arc<AppState>>,
    RequireAdmin(_admin): RequireAdmin,
) -> ApiResult<Json<Vec<Announcement>>> {
    Ok(Json(state.db.list_announcements().await?))
}

pub async fn handler_create(
    State(state): State<Arc<AppState>>,
    RequireAdmin(admin): RequireAdmin,
    payload: Result<Json<NewAnnouncement>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Announcement>)> {
    let Json(body) = payload?;
    validate::new_announcement(&body).map_err(ApiError::BadRequest)?;
    let announcement = state
        .db
        .create_announcement(&body, &admin.user_id)
        .await?;
    info!(announcement_id = %announcement.id, admin = %admin.user_id, "announcement posted");
    Ok((StatusCode::CREATED, Json(announcement)))
}

pub async fn handler_delete(
    State(state): State<Arc<AppState>>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    if !state.db.delete_announcement(&id).await? {
        return Err(ApiError::not_found("Announcement"));
    }
    Ok(Json(json!({ "deleted": id })))
}
