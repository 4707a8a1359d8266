//! # Payments — Gateway Signatures and Webhook Events
//!
//! The gateway itself is external. This module only checks that callbacks
//! really come from it:
//!
//! - **Checkout callback** (`POST /api/payments/verify`): the browser relays
//!   `order_id`, `payment_id` and `signature`, where the signature is
//!   `HMAC-SHA256(key_secret, "{order_id}|{payment_id}")` in lowercase hex.
//! - **Webhook** (`POST /api/payments/webhook`): the raw request body is
//!   signed with the webhook secret, hex in the `x-signature` header.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the webhook body signature.
pub const SIGNATURE_HEADER: &str = "x-signature";

#[derive(Debug, Clone, Default)]
pub struct PaymentSecrets {
    pub webhook_secret: Option<String>,
    pub key_secret: Option<String>,
}

fn mac(secret: &str, message: &[u8]) -> Option<HmacSha256> {
    // HMAC accepts keys of any length, so this only fails in theory.
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(message);
    Some(mac)
}

/// Lowercase hex HMAC-SHA256 of `message`.
pub fn sign(secret: &str, message: &[u8]) -> String {
    match mac(secret, message) {
        Some(mac) => format!("{:x}", mac.finalize().into_bytes()),
        None => String::new(),
    }
}

/// Decode a hex string of either case. `None` on odd length or a non-hex digit.
fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}

/// `Mac::verify_slice` compares in constant time.
fn verify(secret: &str, message: &[u8], signature: &str) -> bool {
    let Some(tag) = decode_hex(signature.trim()) else {
        return false;
    };
    mac(secret, message).is_some_and(|mac| mac.verify_slice(&tag).is_ok())
}

pub fn checkout_message(order_id: &str, payment_id: &str) -> String {
    format!("{}|{}", order_id, payment_id)
}

pub fn verify_checkout_signature(
    key_secret: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> bool {
    verify(
        key_secret,
        checkout_message(order_id, payment_id).as_bytes(),
        signature,
    )
}

pub fn verify_webhook_signature(webhook_secret: &str, body: &[u8], signature: &str) -> bool {
    verify(webhook_secret, body, signature)
}

// ── Webhook payload ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub payment: Option<WebhookPayment>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookPayment {
    pub entity: PaymentEntity,
}

#[derive(Debug, Deserialize)]
pub struct PaymentEntity {
    /// Gateway payment id.
    pub id: String,
    pub order_id: String,
    /// Amount charged, in the smallest currency unit.
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// The webhook events we act on.
#[derive(Debug, PartialEq, Eq)]
pub enum WebhookEvent<'a> {
    Captured {
        order_id: &'a str,
        payment_id: &'a str,
        amount: Option<i64>,
    },
    Failed {
        order_id: &'a str,
        payment_id: &'a str,
        reason: Option<&'a str>,
    },
    /// Any other event; acknowledged and ignored.
    Ignored(&'a str),
}

impl WebhookEnvelope {
    pub fn classify(&self) -> WebhookEvent<'_> {
        let entity = self.payload.payment.as_ref().map(|p| &p.entity);
        match (self.event.as_str(), entity) {
            ("payment.captured", Some(e)) => WebhookEvent::Captured {
                order_id: &e.order_id,
                payment_id: &e.id,
                amount: e.amount,
            },
            ("payment.failed", Some(e)) => WebhookEvent::Failed {
                order_id: &e.order_id,
                payment_id: &e.id,
                reason: e.error_description.as_deref(),
            },
            (other, _) => WebhookEvent::Ignored(other),
        }
    }
}
