//! Lease-guarded job runs and the interval loops that drive them.
//!
//! [`JobRunner::run`] is the single entry point for a job run, whether it
//! comes from a timer tick, the admin "run now" endpoint or the CLI. Each run
//! takes a fresh lease holder id, so two overlapping runs never share a lease
//! even inside one process.

use super::bracket_generation::{generate_brackets, BracketRunSummary, BracketSettings};
use super::payment_sweep::sweep_expired_payments;
use super::{with_lease, BracketStore, Job, LeaseStore, PaymentLedger};
use crate::bracket::{BracketProvider, ChallongeClient};
use crate::db::Database;
use crate::prom_metrics::{JobOutcome, Metrics};
use anyhow::{anyhow, Result};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn, Instrument};

/// The runner used by the service binary.
pub type ServiceJobRunner = JobRunner<Database, ChallongeClient>;

#[derive(Debug, Clone)]
pub struct JobSettings {
    /// Age after which a `created` payment is expired.
    pub payment_ttl: chrono::Duration,
    pub lease_ttl: Duration,
    pub bracket: BracketSettings,
}

/// What a completed run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum JobReport {
    PaymentSweep { expired: u64 },
    BracketGeneration(BracketRunSummary),
}

pub struct JobRunner<S, P> {
    store: S,
    /// `None` when no bracket provider key is configured.
    provider: Option<P>,
    settings: JobSettings,
    metrics: Arc<Metrics>,
    instance: String,
}

impl<S, P> JobRunner<S, P>
where
    S: PaymentLedger + BracketStore + LeaseStore + 'static,
    P: BracketProvider + 'static,
{
    pub fn new(store: S, provider: Option<P>, settings: JobSettings, metrics: Arc<Metrics>) -> Self {
        JobRunner {
            store,
            provider,
            settings,
            metrics,
            instance: instance_id(),
        }
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Run `job` once under its lease.
    ///
    /// Returns `Ok(None)` when another holder has the lease and the run was
    /// skipped.
    pub async fn run(&self, job: Job) -> Result<Option<JobReport>> {
        let holder = format!("{}:{}", self.instance, uuid::Uuid::new_v4().simple());
        let span = tracing::info_span!("job", job = %job, holder = %holder);

        let result = with_lease(
            &self.store,
            job,
            &holder,
            self.settings.lease_ttl,
            self.execute(job),
        )
        .instrument(span)
        .await;

        let outcome = match &result {
            Ok(Some(_)) => JobOutcome::Success,
            Ok(None) => JobOutcome::Skipped,
            Err(_) => JobOutcome::Failure,
        };
        self.metrics.record_job(job.as_str(), outcome);
        if outcome == JobOutcome::Skipped {
            info!(job = %job, "job lease held elsewhere, skipping run");
        }
        result
    }

    /// Run `job` on its own task. Dropping the handle does not cancel the
    /// run, so a caller that stops waiting never leaves a half-provisioned
    /// bracket or an unreleased lease behind.
    pub fn spawn_run(self: &Arc<Self>, job: Job) -> JoinHandle<Result<Option<JobReport>>> {
        let runner = Arc::clone(self);
        tokio::spawn(async move { runner.run(job).await })
    }

    async fn execute(&self, job: Job) -> Result<JobReport> {
        match job {
            Job::PaymentSweep => {
                let expired =
                    sweep_expired_payments(&self.store, self.settings.payment_ttl, Utc::now())
                        .await?;
                self.metrics.payments_expired.inc_by(expired);
                Ok(JobReport::PaymentSweep { expired })
            }
            Job::BracketGeneration => {
                let provider = self
                    .provider
                    .as_ref()
                    .ok_or_else(|| anyhow!("bracket provider is not configured"))?;
                let summary =
                    generate_brackets(&self.store, provider, &self.settings.bracket).await?;
                self.metrics.brackets_generated.inc_by(summary.generated as u64);
                self.metrics.bracket_failures.inc_by(summary.failed as u64);
                Ok(JobReport::BracketGeneration(summary))
            }
        }
    }

    /// Spawn an interval loop running `job` every `every`.
    ///
    /// The first run happens immediately. Late ticks are skipped rather than
    /// bunched, and errors are logged; the next tick is the retry.
    pub fn spawn(self: &Arc<Self>, job: Job, every: Duration) -> JoinHandle<()> {
        let runner = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if let Err(e) = runner.run(job).await {
                    warn!(job = %job, error = %e, "scheduled job run failed");
                }
            }
        })
    }
}

/// Stable identifier for this process: host and pid.
fn instance_id() -> String {
    let host = std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("HOST"))
        .unwrap_or_else(|_| "unknown".to_string());
    format!("{}:{}", host, std::process::id())
}
