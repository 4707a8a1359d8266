//! # Configuration
//!
//! Every setting is a CLI flag with an environment-variable fallback. `main`
//! loads `.env` through `dotenvy` before parsing, so a local `.env` file and a
//! container environment behave the same way.
//!
//! | Variable | Default | Used by |
//! |----------|---------|---------|
//! | `DATABASE_URL` | — | everything |
//! | `PORT` | 8080 | `serve` |
//! | `APP_ENV` | development | error detail in 500 responses; `production` requires `AUTH_JWT_SECRET` |
//! | `AUTH_JWT_SECRET` | — | bearer token verification |
//! | `AUTH_AUDIENCE` | — | bearer token `aud` check |
//! | `PAYMENT_WEBHOOK_SECRET` | — | webhook signatures |
//! | `PAYMENT_KEY_SECRET` | — | checkout callback signatures |
//! | `PAYMENT_TTL_HOURS` | 24 | payment sweep |
//! | `PAYMENT_SWEEP_INTERVAL_SECS` | 3600 | payment sweep |
//! | `BRACKET_INTERVAL_SECS` | 86400 | bracket generation |
//! | `JOB_LEASE_SECS` | 600 | both jobs |
//! | `BRACKET_API_URL` | Challonge v1 | bracket generation |
//! | `BRACKET_API_KEY` | — | bracket generation |
//! | `BRACKET_TOURNAMENT_TYPE` | single elimination | bracket generation |
//! | `HTTP_TIMEOUT_SECS` | 30 | bracket provider client |

use crate::auth::AuthConfig;
use crate::jobs::bracket_generation::BracketSettings;
use crate::payments::PaymentSecrets;
use anyhow::Result;
use clap::Args;
use std::time::Duration;

/// Ten years.
const MAX_PAYMENT_TTL_HOURS: i64 = 87_600;

#[derive(Args, Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    /// Deployment environment; "production" hides internal error messages
    #[arg(long, env = "APP_ENV", default_value = "development", global = true)]
    pub app_env: String,

    /// HS256 secret for bearer tokens. Unset means tokens are decoded without
    /// signature checks (development only).
    #[arg(long, env = "AUTH_JWT_SECRET", hide_env_values = true, global = true)]
    pub auth_jwt_secret: Option<String>,

    /// Expected `aud` claim on bearer tokens
    #[arg(long, env = "AUTH_AUDIENCE", global = true)]
    pub auth_audience: Option<String>,

    /// Shared secret for gateway webhook signatures
    #[arg(long, env = "PAYMENT_WEBHOOK_SECRET", hide_env_values = true, global = true)]
    pub payment_webhook_secret: Option<String>,

    /// Gateway key secret for checkout callback signatures
    #[arg(long, env = "PAYMENT_KEY_SECRET", hide_env_values = true, global = true)]
    pub payment_key_secret: Option<String>,

    /// Hours a payment may stay `created` before the sweep expires it
    #[arg(
        long,
        env = "PAYMENT_TTL_HOURS",
        default_value_t = 24,
        value_parser = clap::value_parser!(i64).range(1..=MAX_PAYMENT_TTL_HOURS),
        global = true
    )]
    pub payment_ttl_hours: i64,

    /// Seconds between payment sweeps
    #[arg(long, env = "PAYMENT_SWEEP_INTERVAL_SECS", default_value_t = 3600, global = true)]
    pub payment_sweep_interval_secs: u64,

    /// Seconds between bracket generation runs
    #[arg(long, env = "BRACKET_INTERVAL_SECS", default_value_t = 86_400, global = true)]
    pub bracket_interval_secs: u64,

    /// Lease TTL for a scheduled job run; renewed while the run is going
    #[arg(
        long,
        env = "JOB_LEASE_SECS",
        default_value_t = 600,
        value_parser = clap::value_parser!(u64).range(1..),
        global = true
    )]
    pub job_lease_secs: u64,

    /// Bracket provider base URL
    #[arg(
        long,
        env = "BRACKET_API_URL",
        default_value = "https://api.challonge.com/v1",
        global = true
    )]
    pub bracket_api_url: String,

    /// Bracket provider API key
    #[arg(long, env = "BRACKET_API_KEY", hide_env_values = true, global = true)]
    pub bracket_api_key: Option<String>,

    /// Tournament type requested from the bracket provider
    #[arg(
        long,
        env = "BRACKET_TOURNAMENT_TYPE",
        default_value = "single elimination",
        global = true
    )]
    pub bracket_tournament_type: String,

    /// Timeout for bracket provider requests
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 30, global = true)]
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn database_url(&self) -> Result<&str> {
        self.database_url.as_deref().ok_or_else(|| {
            anyhow::anyhow!("DATABASE_URL is required (set via --database-url or env)")
        })
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }

    pub fn payment_ttl(&self) -> Result<chrono::Duration> {
        chrono::Duration::try_hours(self.payment_ttl_hours).ok_or_else(|| {
            anyhow::anyhow!("PAYMENT_TTL_HOURS {} is out of range", self.payment_ttl_hours)
        })
    }

    /// Refuse to serve unsigned bearer tokens in production.
    pub fn check_auth(&self) -> Result<()> {
        let has_secret = self
            .auth_jwt_secret
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty());
        if self.is_production() && !has_secret {
            anyhow::bail!("AUTH_JWT_SECRET is required when APP_ENV=production");
        }
        Ok(())
    }

    pub fn payment_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.payment_sweep_interval_secs.max(1))
    }

    pub fn bracket_interval(&self) -> Duration {
        Duration::from_secs(self.bracket_interval_secs.max(1))
    }

    pub fn job_lease_ttl(&self) -> Duration {
        Duration::from_secs(self.job_lease_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn auth(&self) -> AuthConfig {
        AuthConfig {
            jwt_secret: self.auth_jwt_secret.clone(),
            audience: self.auth_audience.clone(),
        }
    }

    pub fn payment_secrets(&self) -> PaymentSecrets {
        PaymentSecrets {
            webhook_secret: self.payment_webhook_secret.clone(),
            key_secret: self.payment_key_secret.clone(),
        }
    }

    pub fn bracket_settings(&self) -> BracketSettings {
        BracketSettings {
            tournament_type: self.bracket_tournament_type.clone(),
        }
    }

    /// Bracket provider key, or an error naming the variable.
    pub fn bracket_api_key(&self) -> Result<&str> {
        self.bracket_api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("BRACKET_API_KEY is required for bracket generation"))
    }
}
