//! # Database — PostgreSQL Storage Layer
//!
//! Async storage for the registration service via `sqlx::PgPool`. Nested
//! documents (team players, setting values) live in JSONB columns.
//!
//! ## Schema
//!
//! - `teams`: registration, players, approval and payment status
//! - `payments`: checkout orders and their lifecycle
//! - `refunds`: admin-issued refunds against captured payments
//! - `tournaments`: registration windows and bracket provisioning state
//! - `announcements`, `settings`: admin-managed content
//! - `job_leases`: exclusive leases for scheduled jobs
//!
//! ## Module Structure
//!
//! - [`teams`] — Team registration CRUD and status transitions
//! - [`payments`] — Orders, capture, refunds, stale-payment expiry
//! - [`tournaments`] — Tournament CRUD and bracket bookkeeping
//! - [`content`] — Announcements and settings
//! - [`leases`] — Job lease acquire/release

mod content;
mod leases;
mod payments;
mod teams;
mod tournaments;

pub use payments::{CaptureOutcome, RefundOutcome};

use anyhow::Result;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};

/// Schema applied by [`Database::migrate`]. Statements are idempotent.
pub const SCHEMA_SQL: &str = include_str!("../../migrations/001_init.sql");

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL using the provided database URL.
    ///
    /// Manually parses the URL to preserve the full username — sqlx's built-in
    /// parser strips the ".project-ref" suffix that hosted poolers require.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let url = url::Url::parse(database_url)?;
        let username = urlencoding::decode(url.username())?.into_owned();
        let password = url
            .password()
            .map(|p| urlencoding::decode(p).map(|s| s.into_owned()))
            .transpose()?;
        let mut opts = PgConnectOptions::new()
            .host(url.host_str().unwrap_or("localhost"))
            .port(url.port().unwrap_or(5432))
            .database(url.path().trim_start_matches('/'))
            .username(&username)
            .statement_cache_capacity(0);
        if let Some(ref pw) = password {
            opts = opts.password(pw);
        }
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;
        Ok(Database { pool })
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the bundled schema.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Health check: execute `SELECT 1` to verify database connectivity.
    ///
    /// Used by the `/readyz` readiness probe.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}

/// Whether an error is a Postgres unique-constraint violation (SQLSTATE 23505).
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .and_then(|e| e.code())
        .is_some_and(|code| code == "23505")
}
