//! # Server — HTTP API and Job Scheduling
//!
//! Runs the axum HTTP server for the registration API and, alongside it, the
//! interval loops for the scheduled jobs.
//!
//! ## Route Modules
//!
//! - [`routes_health`] — liveness, readiness, Prometheus metrics
//! - [`routes_teams`] — registration, edits, admin status changes
//! - [`routes_payments`] — checkout orders, callback verification, webhook
//! - [`routes_tournaments`] — listing and admin lifecycle
//! - [`routes_announcements`] — public feed and admin posting
//! - [`routes_admin`] — dashboard, approvals, refunds, settings, job runs
//!
//! Handlers return [`error::ApiError`] on failure; authentication is done by
//! the [`middleware_auth`] extractors.

pub mod error;
pub(crate) mod middleware_auth;
mod routes_admin;
mod routes_announcements;
mod routes_health;
mod routes_payments;
mod routes_teams;
mod routes_tournaments;

use crate::bracket::ChallongeClient;
use crate::config::Config;
use crate::db;
use crate::jobs::scheduler::{JobSettings, ServiceJobRunner};
use crate::jobs::Job;
use crate::payments::PaymentSecrets;
use crate::prom_metrics;
use anyhow::Result;
use axum::extract::{MatchedPath, Request};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::routing::{get, patch, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Instrument};

pub struct AppState {
    pub db: db::Database,
    /// Hide internal error messages from clients.
    pub production: bool,
    pub payment_secrets: PaymentSecrets,
    pub prom_metrics: Arc<prom_metrics::Metrics>,
    pub jobs: Arc<ServiceJobRunner>,
}

impl AppState {
    pub fn new(
        db: db::Database,
        production: bool,
        payment_secrets: PaymentSecrets,
        prom_metrics: Arc<prom_metrics::Metrics>,
        jobs: Arc<ServiceJobRunner>,
    ) -> Arc<Self> {
        Arc::new(AppState {
            db,
            production,
            payment_secrets,
            prom_metrics,
            jobs,
        })
    }
}

/// Build the job runner the server and CLI share.
pub fn build_job_runner(
    db: db::Database,
    config: &Config,
    metrics: Arc<prom_metrics::Metrics>,
) -> Result<ServiceJobRunner> {
    let provider = match config.bracket_api_key.as_deref() {
        Some(key) => Some(ChallongeClient::new(
            &config.bracket_api_url,
            key,
            config.http_timeout(),
        )?),
        None => None,
    };
    let settings = JobSettings {
        payment_ttl: config.payment_ttl()?,
        lease_ttl: config.job_lease_ttl(),
        bracket: config.bracket_settings(),
    };
    Ok(ServiceJobRunner::new(db, provider, settings, metrics))
}

/// Records request duration, propagates or generates `x-request-id`, and
/// wraps the request in a tracing span carrying that id.
async fn request_middleware(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> axum::response::Response {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let method = req.method().to_string();
    let raw_path = req.uri().path().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| normalize_path(&raw_path));
    let start = std::time::Instant::now();

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %raw_path,
    );
    let mut response = next.run(req).instrument(span).await;

    state.prom_metrics.observe_request(
        &method,
        &route,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// Collapse id-like path segments (UUIDs, numbers, gateway order ids) into
/// `{id}` so unmatched paths cannot explode histogram labels.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|seg| {
            let is_uuid = seg.len() == 36 && seg.chars().filter(|c| *c == '-').count() == 4;
            let is_number = !seg.is_empty() && seg.chars().all(|c| c.is_ascii_digit());
            if is_uuid || is_number || seg.starts_with("order_") {
                "{id}"
            } else {
                seg
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub fn build_router(state: Arc<AppState>) -> Router {
    error::set_production(state.production);

    Router::new()
        .route("/healthz", get(routes_health::handler_healthz))
        .route("/readyz", get(routes_health::handler_readyz))
        .route("/metrics", get(routes_health::handler_metrics))
        // Public listings
        .route("/api/tournaments", get(routes_tournaments::handler_list))
        .route("/api/tournaments/{id}", get(routes_tournaments::handler_get))
        .route(
            "/api/announcements",
            get(routes_announcements::handler_public_list),
        )
        // Teams
        .route(
            "/api/teams",
            get(routes_teams::handler_list).post(routes_teams::handler_create),
        )
        .route(
            "/api/teams/{id}",
            get(routes_teams::handler_get)
                .put(routes_teams::handler_update)
                .delete(routes_teams::handler_delete),
        )
        .route(
            "/api/teams/{id}/status",
            patch(routes_teams::handler_set_status),
        )
        .route(
            "/api/teams/{id}/payment-status",
            patch(routes_teams::handler_set_payment_status),
        )
        // Payments
        .route(
            "/api/payments/orders",
            post(routes_payments::handler_create_order),
        )
        .route("/api/payments/verify", post(routes_payments::handler_verify))
        .route(
            "/api/payments/webhook",
            post(routes_payments::handler_webhook),
        )
        // Admin
        .route("/api/admin/dashboard", get(routes_admin::handler_dashboard))
        .route(
            "/api/admin/teams/{id}/approve",
            post(routes_admin::handler_approve),
        )
        .route(
            "/api/admin/teams/{id}/reject",
            post(routes_admin::handler_reject),
        )
        .route(
            "/api/admin/payments/{id}/refund",
            post(routes_admin::handler_refund),
        )
        .route("/api/admin/refunds", get(routes_admin::handler_refunds))
        .route(
            "/api/admin/announcements",
            get(routes_announcements::handler_admin_list)
                .post(routes_announcements::handler_create),
        )
        .route(
            "/api/admin/announcements/{id}",
            axum::routing::delete(routes_announcements::handler_delete),
        )
        .route(
            "/api/admin/settings",
            get(routes_admin::handler_settings_get).put(routes_admin::handler_settings_put),
        )
        .route(
            "/api/admin/tournaments",
            post(routes_tournaments::handler_create),
        )
        .route(
            "/api/admin/tournaments/{id}/status",
            patch(routes_tournaments::handler_set_status),
        )
        .route(
            "/api/admin/jobs/{name}/run",
            post(routes_admin::handler_run_job),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(CatchPanicLayer::new())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            request_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(1024 * 1024))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .with_state(state)
}

/// Connect, start the job loops and serve until SIGINT/SIGTERM.
pub async fn run(config: &Config, port: u16) -> Result<()> {
    let database = db::Database::connect(config.database_url()?).await?;
    let metrics = Arc::new(prom_metrics::Metrics::new());
    let jobs = Arc::new(build_job_runner(database.clone(), config, metrics.clone())?);

    let mut loops = vec![jobs.spawn(Job::PaymentSweep, config.payment_sweep_interval())];
    if jobs.has_provider() {
        loops.push(jobs.spawn(Job::BracketGeneration, config.bracket_interval()));
    } else {
        warn!("BRACKET_API_KEY not set, bracket generation is disabled");
    }

    let state = AppState::new(
        database,
        config.is_production(),
        config.payment_secrets(),
        metrics,
        jobs,
    );
    let app = build_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!(port, "server running");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for handle in loops {
        handle.abort();
    }
    info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("received SIGINT, shutting down"),
                    _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                ctrl_c.await.ok();
                info!("received SIGINT, shutting down");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("received SIGINT, shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_path_preserves_api_routes() {
        assert_eq!(normalize_path("/api/teams"), "/api/teams");
        assert_eq!(normalize_path("/metrics"), "/metrics");
    }

    #[test]
    fn normalize_path_collapses_ids() {
        assert_eq!(
            normalize_path("/api/teams/550e8400-e29b-41d4-a716-446655440000/status"),
            "/api/teams/{id}/status"
        );
        assert_eq!(normalize_path("/api/things/42"), "/api/things/{id}");
        assert_eq!(
            normalize_path("/api/orders/order_0af3"),
            "/api/orders/{id}"
        );
    }

    #[test]
    fn normalize_path_handles_empty_and_root() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path(""), "");
    }
}
