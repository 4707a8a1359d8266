//! Expired-payment sweep.
//!
//! Checkout orders that stay `created` longer than the staleness window are
//! moved to `expired` in one batch. Nothing is deleted, and only the status
//! and timestamp columns change.

use super::PaymentLedger;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

/// Expire every `created` payment opened at or before `now - ttl`.
///
/// Returns the number of payments moved to `expired`. When nothing is stale
/// the ledger sees no write at all.
pub async fn sweep_expired_payments<L: PaymentLedger>(
    ledger: &L,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<u64> {
    let cutoff = now - ttl;
    let ids = ledger.stale_payment_ids(cutoff).await?;
    if ids.is_empty() {
        debug!(cutoff = %cutoff, "no stale payments");
        return Ok(0);
    }

    let expired = ledger.expire_payments(&ids, now).await?;
    info!(
        matched = ids.len(),
        expired,
        cutoff = %cutoff,
        "expired stale payments"
    );
    Ok(expired)
}
