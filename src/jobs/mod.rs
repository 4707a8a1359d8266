//! # Jobs — Scheduled Reconciliation
//!
//! Two periodic jobs keep the registration data consistent:
//!
//! - [`payment_sweep`] — expire checkout orders left in `created` past the
//!   staleness window.
//! - [`bracket_generation`] — provision brackets at the external provider for
//!   tournaments whose registration has closed.
//!
//! Job logic is written against the storage traits below rather than the
//! concrete [`Database`](crate::db::Database), so it can be driven by
//! in-memory fakes in tests. [`scheduler`] wires the concrete types, interval
//! loops and leases together.
//!
//! Errors inside a run are logged and swallowed by the scheduler; the next
//! tick is the retry.

pub mod bracket_generation;
pub mod payment_sweep;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod fakes;

use crate::bracket::ProviderTournament;
use crate::models::{Team, Tournament};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::warn;

pub trait PaymentLedger: Send + Sync {
    /// IDs of `created` payments opened at or before `cutoff`.
    fn stale_payment_ids(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Atomically expire the given payments. Returns the number updated.
    fn expire_payments(
        &self,
        ids: &[String],
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64>> + Send;
}

pub trait BracketStore: Send + Sync {
    fn bracket_candidates(&self) -> impl Future<Output = Result<Vec<Tournament>>> + Send;

    /// Approved and paid teams of a tournament.
    fn qualifying_teams(
        &self,
        tournament_id: &str,
    ) -> impl Future<Output = Result<Vec<Team>>> + Send;

    fn mark_bracket_generated(
        &self,
        tournament_id: &str,
        provider: &ProviderTournament,
        participant_count: i32,
    ) -> impl Future<Output = Result<()>> + Send;

    fn record_bracket_failure(
        &self,
        tournament_id: &str,
        message: &str,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send;
}

pub trait LeaseStore: Send + Sync {
    fn try_acquire_lease(
        &self,
        job: &str,
        holder: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Extend a lease still owned by `holder`. `false` means it was lost.
    fn renew_lease(
        &self,
        job: &str,
        holder: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool>> + Send;

    fn release_lease(&self, job: &str, holder: &str) -> impl Future<Output = Result<()>> + Send;
}

/// How often a held lease is renewed: a third of its TTL, at least 1s.
pub fn renew_interval(ttl: Duration) -> Duration {
    (ttl / 3).max(Duration::from_secs(1))
}

/// The scheduled jobs, by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Job {
    PaymentSweep,
    BracketGeneration,
}

impl Job {
    pub const ALL: [Job; 2] = [Job::PaymentSweep, Job::BracketGeneration];

    pub fn as_str(&self) -> &'static str {
        match self {
            Job::PaymentSweep => "payment_sweep",
            Job::BracketGeneration => "bracket_generation",
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Job {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "payment_sweep" | "payment-sweep" => Ok(Job::PaymentSweep),
            "bracket_generation" | "bracket-generation" => Ok(Job::BracketGeneration),
            other => anyhow::bail!("unknown job '{}'", other),
        }
    }
}

/// Run `work` while holding the lease for `job`.
///
/// Returns `Ok(None)` without running anything when another holder has the
/// lease. While `work` runs the lease is renewed every [`renew_interval`], so
/// a run longer than `ttl` keeps it. The lease is released after `work`
/// finishes, whether or not it succeeded; a failed release is logged and
/// left to expire.
pub async fn with_lease<L, F, T>(
    leases: &L,
    job: Job,
    holder: &str,
    ttl: Duration,
    work: F,
) -> Result<Option<T>>
where
    L: LeaseStore,
    F: Future<Output = Result<T>>,
{
    if !leases.try_acquire_lease(job.as_str(), holder, ttl).await? {
        return Ok(None);
    }
    let mut work = std::pin::pin!(work);
    let mut heartbeat = tokio::time::interval(renew_interval(ttl));
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    heartbeat.tick().await;
    let result = loop {
        tokio::select! {
            result = &mut work => break result,
            _ = heartbeat.tick() => match leases.renew_lease(job.as_str(), holder, ttl).await {
                Ok(true) => {}
                Ok(false) => warn!(job = %job, "job lease lapsed and was taken over"),
                Err(e) => warn!(job = %job, error = %e, "failed to renew job lease"),
            },
        }
    };
    if let Err(e) = leases.release_lease(job.as_str(), holder).await {
        warn!(job = %job, error = %e, "failed to release job lease");
    }
    result.map(Some)
}
