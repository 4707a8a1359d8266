//! Job leases.
//!
//! A lease row grants one holder exclusive rights to run a named job until
//! `expires_at`. Acquisition is a single upsert that only takes over a row
//! whose lease has lapsed, so two runs of the same job cannot both get `true`
//! even when they come from the same process.

use super::Database;
use anyhow::Result;
use std::time::Duration;

impl Database {
    pub async fn try_acquire_lease(&self, job: &str, holder: &str, ttl: Duration) -> Result<bool> {
        let ttl_secs = ttl.as_secs_f64();
        let acquired = sqlx::query_scalar::<_, String>(
            "INSERT INTO job_leases (job, holder, acquired_at, expires_at)
             VALUES ($1, $2, NOW(), NOW() + make_interval(secs => $3))
             ON CONFLICT (job) DO UPDATE SET
               holder = EXCLUDED.holder,
               acquired_at = EXCLUDED.acquired_at,
               expires_at = EXCLUDED.expires_at
             WHERE job_leases.expires_at < NOW()
             RETURNING holder",
        )
        .bind(job)
        .bind(holder)
        .bind(ttl_secs)
        .fetch_optional(&self.pool)
        .await?;
        Ok(acquired.is_some())
    }

    /// Push the expiry of a lease `holder` still owns to `NOW() + ttl`.
    /// Returns `false` if the lease lapsed and was taken over.
    pub async fn renew_lease(&self, job: &str, holder: &str, ttl: Duration) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE job_leases SET expires_at = NOW() + make_interval(secs => $3)
             WHERE job = $1 AND holder = $2",
        )
        .bind(job)
        .bind(holder)
        .bind(ttl.as_secs_f64())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Release a lease if `holder` still owns it.
    pub async fn release_lease(&self, job: &str, holder: &str) -> Result<()> {
        sqlx::query("DELETE FROM job_leases WHERE job = $1 AND holder = $2")
            .bind(job)
            .bind(holder)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

impl crate::jobs::LeaseStore for Database {
    async fn try_acquire_lease(&self, job: &str, holder: &str, ttl: Duration) -> Result<bool> {
        Database::try_acquire_lease(self, job, holder, ttl).await
    }

    async fn renew_lease(&self, job: &str, holder: &str, ttl: Duration) -> Result<bool> {
        Database::renew_lease(self, job, holder, ttl).await
    }

    async fn release_lease(&self, job: &str, holder: &str) -> Result<()> {
        Database::release_lease(self, job, holder).await
    }
}
