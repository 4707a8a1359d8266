//! # Payment Routes
//!
//! Checkout runs in three steps:
//!
//! 1. `POST /api/payments/orders`: the captain opens an order for their
//!    team's entry fee. The payment row starts `created`. While an order is
//!    still open, asking again returns that order with 200.
//! 2. The client completes checkout with the gateway and relays the signed
//!    result to `POST /api/payments/verify`, which captures the payment.
//! 3. The gateway separately calls `POST /api/payments/webhook` with
//!    `payment.captured` or `payment.failed`. Capture is idempotent, so
//!    whichever of 2 or 3 arrives second is a no-op.
//!
//! Orders that never complete are expired by the payment sweep.

use super::error::{ApiError, ApiResult};
use super::middleware_auth::RequireAuth;
use super::routes_teams::load_team;
use super::AppState;
use crate::db::CaptureOutcome;
use crate::models::{Payment, TeamPaymentStatus, TeamStatus};
use crate::payments::{self, WebhookEnvelope, WebhookEvent, SIGNATURE_HEADER};
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_CURRENCY: &str = "INR";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBody {
    pub team_id: String,
    #[serde(default)]
    pub currency: Option<String>,
}

pub async fn handler_create_order(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    payload: Result<Json<OrderBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Payment>)> {
    let Json(body) = payload?;
    let team = load_team(&state, &body.team_id).await?;

    if team.owner_id != user.user_id && !user.is_admin {
        return Err(ApiError::Forbidden(
            "Only the team owner can pay for this team".into(),
        ));
    }
    if team.payment_status == TeamPaymentStatus::Paid {
        return Err(ApiError::conflict("Team has already paid"));
    }
    if team.status == TeamStatus::Rejected {
        return Err(ApiError::conflict("Team registration was rejected"));
    }
    if team.entry_fee <= 0 {
        return Err(ApiError::bad_request("Team has no entry fee to pay"));
    }

    let currency = body
        .currency
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CURRENCY)
        .to_ascii_uppercase();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ApiError::bad_request("currency must be a 3-letter code"));
    }

    if let Some(open) = state.db.open_payment_for_team(&team.id).await? {
        if open.amount == team.entry_fee && open.currency == currency {
            info!(payment_id = %open.id, team_id = %team.id, "reusing open payment order");
            return Ok((StatusCode::OK, Json(open)));
        }
    }

    let payment = state
        .db
        .create_payment_order(&team.id, team.entry_fee, &currency)
        .await?;
    info!(
        payment_id = %payment.id,
        team_id = %team.id,
        order_id = %payment.provider_order_id,
        amount = payment.amount,
        "payment order created"
    );
    Ok((StatusCode::CREATED, Json(payment)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyBody {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

pub async fn handler_verify(
    State(state): State<Arc<AppState>>,
    RequireAuth(_user): RequireAuth,
    payload: Result<Json<VerifyBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let key_secret = state
        .payment_secrets
        .key_secret
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("PAYMENT_KEY_SECRET is not configured"))?;

    if !payments::verify_checkout_signature(
        key_secret,
        &body.order_id,
        &body.payment_id,
        &body.signature,
    ) {
        warn!(order_id = %body.order_id, "checkout signature mismatch");
        return Err(ApiError::bad_request("Invalid payment signature"));
    }

    capture(&state, &body.order_id, &body.payment_id).await
}

async fn capture(state: &AppState, order_id: &str, payment_id: &str) -> ApiResult<Json<Value>> {
    match state.db.capture_payment(order_id, payment_id).await? {
        CaptureOutcome::Captured {
            payment,
            team,
            previous_team_status,
        } => {
            if previous_team_status == TeamStatus::Rejected {
                warn!(
                    team_id = %team.id,
                    payment_id = %payment.id,
                    "payment captured for a rejected team; team is now approved"
                );
            }
            info!(payment_id = %payment.id, team_id = %team.id, "payment captured");
            Ok(Json(json!({ "status": "captured", "payment": payment, "team": team })))
        }
        CaptureOutcome::AlreadyCaptured(payment) => {
            Ok(Json(json!({ "status": "already_captured", "payment": payment })))
        }
        CaptureOutcome::NotCapturable(payment) => Err(ApiError::conflict(format!(
            "Payment is {} and can no longer be captured",
            payment.status
        ))),
        CaptureOutcome::TeamAlreadyPaid(payment) => {
            warn!(
                payment_id = %payment.id,
                team_id = %payment.team_id,
                "capture refused, team already paid through another order"
            );
            Err(ApiError::conflict("Team has already paid"))
        }
        CaptureOutcome::NotFound => Err(ApiError::not_found("Payment order")),
    }
}

/// Gateway webhook. Authenticated by the body signature, not a bearer token.
///
/// Unknown orders and unhandled events are acknowledged with 200 so the
/// gateway does not keep retrying them.
pub async fn handler_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let secret = state
        .payment_secrets
        .webhook_secret
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("PAYMENT_WEBHOOK_SECRET is not configured"))?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing webhook signature".into()))?;
    if !payments::verify_webhook_signature(secret, &body, signature) {
        warn!("webhook signature mismatch");
        return Err(ApiError::Unauthorized("Invalid webhook signature".into()));
    }

    let envelope: WebhookEnvelope = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("Invalid webhook payload: {}", e)))?;

    match envelope.classify() {
        WebhookEvent::Captured {
            order_id,
            payment_id,
            amount,
        } => {
            if let (Some(paid), Some(payment)) =
                (amount, state.db.get_payment_by_order(order_id).await?)
            {
                if paid != payment.amount {
                    warn!(
                        order_id,
                        paid,
                        expected = payment.amount,
                        "webhook amount does not match the order"
                    );
                    return Ok(Json(json!({ "status": "ignored" })));
                }
            }
            match capture(&state, order_id, payment_id).await {
                Err(ApiError::NotFound(_)) => {
                    warn!(order_id, "webhook capture for unknown order");
                    Ok(Json(json!({ "status": "ignored" })))
                }
                Err(ApiError::Conflict(msg)) => {
                    warn!(order_id, reason = %msg, "webhook capture refused");
                    Ok(Json(json!({ "status": "ignored" })))
                }
                other => other,
            }
        }
        WebhookEvent::Failed {
            order_id,
            payment_id,
            reason,
        } => match state.db.fail_payment(order_id, Some(payment_id)).await? {
            Some(payment) => {
                info!(
                    payment_id = %payment.id,
                    order_id,
                    reason = reason.unwrap_or("unknown"),
                    "payment failed"
                );
                Ok(Json(json!({ "status": "failed", "payment": payment })))
            }
            None => Ok(Json(json!({ "status": "ignored" }))),
        },
        WebhookEvent::Ignored(event) => {
            info!(event, "ignoring webhook event");
            Ok(Json(json!({ "status": "ignored" })))
        }
    }
}
