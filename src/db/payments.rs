//! Payment lifecycle operations.
//!
//! A payment is born `created` when a captain opens checkout. From there it
//! ends in exactly one terminal state: `captured` (gateway confirmed),
//! `failed` (gateway declined), `expired` (stale-payment sweep) or, after a
//! capture, `refunded` (admin action).
//!
//! Capture and refund touch both the payment and its team, so each runs in a
//! single transaction with the payment row locked `FOR UPDATE`.

use super::Database;
use crate::models::{
    new_id, Payment, PaymentStatus, Refund, Team, TeamPaymentStatus, TeamStatus,
};
use anyhow::Result;
use chrono::{DateTime, Utc};

const PAYMENT_COLUMNS: &str = "id, team_id, amount, currency, status, provider_order_id,
    provider_payment_id, created_at, updated_at, captured_at, expired_at";

/// Result of applying a gateway confirmation to a payment.
#[derive(Debug)]
pub enum CaptureOutcome {
    /// The payment moved to `captured` and its team to `approved`/`paid`.
    Captured {
        payment: Payment,
        team: Team,
        previous_team_status: TeamStatus,
    },
    /// The payment was already captured; nothing changed.
    AlreadyCaptured(Payment),
    /// The payment is in a terminal state that cannot be captured.
    NotCapturable(Payment),
    /// The team was already paid through another order. The payment is left
    /// `created` for the sweep and needs a refund at the gateway.
    TeamAlreadyPaid(Payment),
    NotFound,
}

/// Result of an admin refund request.
#[derive(Debug)]
pub enum RefundOutcome {
    Refunded { refund: Refund, payment: Payment },
    /// Only captured payments can be refunded.
    NotRefundable(Payment),
    NotFound,
}

impl Database {
    /// Open a checkout order for a team.
    pub async fn create_payment_order(
        &self,
        team_id: &str,
        amount: i64,
        currency: &str,
    ) -> Result<Payment> {
        let order_id = format!("order_{}", uuid::Uuid::new_v4().simple());
        let sql = format!(
            "INSERT INTO payments (id, team_id, amount, currency, status, provider_order_id)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {PAYMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Payment>(&sql)
            .bind(new_id())
            .bind(team_id)
            .bind(amount)
            .bind(currency)
            .bind(PaymentStatus::Created.as_str())
            .bind(order_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn get_payment(&self, id: &str) -> Result<Option<Payment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1");
        let row = sqlx::query_as::<_, Payment>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// The newest `created` order of a team, if any.
    pub async fn open_payment_for_team(&self, team_id: &str) -> Result<Option<Payment>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments
             WHERE team_id = $1 AND status = $2
             ORDER BY created_at DESC LIMIT 1"
        );
        let row = sqlx::query_as::<_, Payment>(&sql)
            .bind(team_id)
            .bind(PaymentStatus::Created.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn get_payment_by_order(&self, order_id: &str) -> Result<Option<Payment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE provider_order_id = $1");
        let row = sqlx::query_as::<_, Payment>(&sql)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Every payment, newest first. Used by the dashboard aggregation.
    pub async fn all_payments(&self) -> Result<Vec<Payment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments ORDER BY created_at DESC");
        let rows = sqlx::query_as::<_, Payment>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Capture a payment by its gateway order id.
    ///
    /// Sets `payment_status = paid` and `status = approved` on the team in the
    /// same statement, regardless of the team's previous registration status.
    /// A team that is already paid is never charged a second time.
    pub async fn capture_payment(
        &self,
        order_id: &str,
        provider_payment_id: &str,
    ) -> Result<CaptureOutcome> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE provider_order_id = $1 FOR UPDATE"
        );
        let Some(payment) = sqlx::query_as::<_, Payment>(&sql)
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(CaptureOutcome::NotFound);
        };

        match payment.status {
            PaymentStatus::Created => {}
            PaymentStatus::Captured => return Ok(CaptureOutcome::AlreadyCaptured(payment)),
            _ => return Ok(CaptureOutcome::NotCapturable(payment)),
        }

        let (previous_team_status, team_payment_status): (String, String) = sqlx::query_as(
            "SELECT status, payment_status FROM teams WHERE id = $1 FOR UPDATE",
        )
        .bind(&payment.team_id)
        .fetch_one(&mut *tx)
        .await?;
        if team_payment_status.parse::<TeamPaymentStatus>()? == TeamPaymentStatus::Paid {
            return Ok(CaptureOutcome::TeamAlreadyPaid(payment));
        }
        let previous_team_status: TeamStatus = previous_team_status.parse()?;

        let sql = format!(
            "UPDATE payments SET status = $2, provider_payment_id = $3,
                    captured_at = NOW(), updated_at = NOW()
             WHERE id = $1
             RETURNING {PAYMENT_COLUMNS}"
        );
        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(&payment.id)
            .bind(PaymentStatus::Captured.as_str())
            .bind(provider_payment_id)
            .fetch_one(&mut *tx)
            .await?;

        let team = sqlx::query_as::<_, Team>(
            "UPDATE teams SET payment_status = $2, status = $3, rejection_reason = NULL,
                    updated_at = NOW()
             WHERE id = $1
             RETURNING id, tournament_id, name, players, captain_email, captain_phone,
                       entry_fee, logo_url, owner_id, status, payment_status, rejection_reason,
                       created_at, updated_at",
        )
        .bind(&payment.team_id)
        .bind(TeamPaymentStatus::Paid.as_str())
        .bind(TeamStatus::Approved.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(CaptureOutcome::Captured {
            payment,
            team,
            previous_team_status,
        })
    }

    /// Mark a still-open payment as failed. Returns `None` if no open payment
    /// has this order id.
    pub async fn fail_payment(
        &self,
        order_id: &str,
        provider_payment_id: Option<&str>,
    ) -> Result<Option<Payment>> {
        let sql = format!(
            "UPDATE payments SET status = $2,
                    provider_payment_id = COALESCE($3, provider_payment_id),
                    updated_at = NOW()
             WHERE provider_order_id = $1 AND status = $4
             RETURNING {PAYMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Payment>(&sql)
            .bind(order_id)
            .bind(PaymentStatus::Failed.as_str())
            .bind(provider_payment_id)
            .bind(PaymentStatus::Created.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Refund a captured payment and record who issued it.
    pub async fn refund_payment(
        &self,
        payment_id: &str,
        reason: &str,
        processed_by: &str,
    ) -> Result<RefundOutcome> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1 FOR UPDATE");
        let Some(payment) = sqlx::query_as::<_, Payment>(&sql)
            .bind(payment_id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(RefundOutcome::NotFound);
        };
        if payment.status != PaymentStatus::Captured {
            return Ok(RefundOutcome::NotRefundable(payment));
        }

        let sql = format!(
            "UPDATE payments SET status = $2, updated_at = NOW() WHERE id = $1
             RETURNING {PAYMENT_COLUMNS}"
        );
        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(&payment.id)
            .bind(PaymentStatus::Refunded.as_str())
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("UPDATE teams SET payment_status = $2, updated_at = NOW() WHERE id = $1")
            .bind(&payment.team_id)
            .bind(TeamPaymentStatus::Refunded.as_str())
            .execute(&mut *tx)
            .await?;

        let refund = sqlx::query_as::<_, Refund>(
            "INSERT INTO refunds (id, payment_id, team_id, amount, reason, processed_by)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, payment_id, team_id, amount, reason, processed_by, created_at",
        )
        .bind(new_id())
        .bind(&payment.id)
        .bind(&payment.team_id)
        .bind(payment.amount)
        .bind(reason)
        .bind(processed_by)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(RefundOutcome::Refunded { refund, payment })
    }

    pub async fn list_refunds(&self) -> Result<Vec<Refund>> {
        let rows = sqlx::query_as::<_, Refund>(
            "SELECT id, payment_id, team_id, amount, reason, processed_by, created_at
             FROM refunds ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// IDs of `created` payments opened at or before `cutoff`.
    pub async fn stale_payment_ids(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT id FROM payments WHERE status = $1 AND created_at <= $2",
        )
        .bind(PaymentStatus::Created.as_str())
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Expire the given payments in one transaction. Rows that left the
    /// `created` state since they were selected are not touched.
    pub async fn expire_payments(&self, ids: &[String], now: DateTime<Utc>) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE payments SET status = $1, expired_at = $2, updated_at = $2
             WHERE id = ANY($3) AND status = $4",
        )
        .bind(PaymentStatus::Expired.as_str())
        .bind(now)
        .bind(ids)
        .bind(PaymentStatus::Created.as_str())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }
}

impl crate::jobs::PaymentLedger for Database {
    async fn stale_payment_ids(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>> {
        Database::stale_payment_ids(self, cutoff).await
    }

    async fn expire_payments(&self, ids: &[String], now: DateTime<Utc>) -> Result<u64> {
        Database::expire_payments(self, ids, now).await
    }
}
