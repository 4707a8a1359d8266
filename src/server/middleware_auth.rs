//! Bearer-token extractors for API routes.
//!
//! `RequireAuth` accepts any verified token; `RequireAdmin` additionally
//! needs the `admin: true` claim. Missing or invalid tokens are 401, a valid
//! token without the claim is 403.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::header;
use std::sync::Arc;

use super::error::ApiError;
use super::AppState;
use crate::auth::{self, Principal};

fn bearer_principal(parts: &Parts) -> Result<Principal, ApiError> {
    let token = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".into()))?;

    auth::verify_token(token).map_err(|e| {
        tracing::debug!(error = %e, "rejected bearer token");
        ApiError::Unauthorized("Invalid or expired token".into())
    })
}

/// Any authenticated caller.
pub struct RequireAuth(pub Principal);

impl FromRequestParts<Arc<AppState>> for RequireAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        bearer_principal(parts).map(RequireAuth)
    }
}

/// An authenticated caller with the admin claim.
pub struct RequireAdmin(pub Principal);

impl FromRequestParts<Arc<AppState>> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let principal = bearer_principal(parts)?;
        if !principal.is_admin {
            return Err(ApiError::Forbidden("Admin access required".into()));
        }
        Ok(RequireAdmin(principal))
    }
}
