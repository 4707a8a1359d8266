//! Shared test helpers for integration tests.

#![allow(dead_code)]

use arenadesk::db::Database;
use arenadesk::jobs::bracket_generation::BracketSettings;
use arenadesk::jobs::scheduler::{JobSettings, ServiceJobRunner};
use arenadesk::models::{NewTeam, NewTournament, Player, Team, Tournament, TournamentStatus};
use arenadesk::payments::PaymentSecrets;
use arenadesk::prom_metrics::Metrics;
use arenadesk::server::{build_router, AppState};
use jsonwebtoken::{encode, EncodingKey, Header};
use std::sync::Arc;
use std::time::Duration;

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const WEBHOOK_SECRET: &str = "test-webhook-secret";
pub const KEY_SECRET: &str = "test-key-secret";

/// Returns the test database URL from the `TEST_DATABASE_URL` environment variable.
/// Panics if the variable is not set.
pub fn test_db_url() -> String {
    std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must be set for integration tests")
}

/// Returns true if the test database URL is configured.
pub fn has_test_db() -> bool {
    std::env::var("TEST_DATABASE_URL").is_ok()
}

/// Connect to the test database, apply the schema and empty every table.
pub async fn setup_test_db() -> Database {
    let db = Database::connect(&test_db_url())
        .await
        .expect("Failed to connect to test database");
    db.migrate().await.expect("Failed to apply schema");
    truncate_all_tables(&db).await;
    db
}

pub async fn truncate_all_tables(db: &Database) {
    sqlx::raw_sql(
        "TRUNCATE TABLE refunds, payments, teams, tournaments, announcements, settings,
                       job_leases
         CASCADE",
    )
    .execute(db.pool())
    .await
    .unwrap();
}

pub fn job_settings() -> JobSettings {
    JobSettings {
        payment_ttl: chrono::Duration::hours(24),
        lease_ttl: Duration::from_secs(60),
        bracket: BracketSettings {
            tournament_type: "single elimination".into(),
        },
    }
}

/// Build the API router over `db` with test secrets and no bracket provider.
pub fn build_app(db: Database) -> axum::Router {
    arenadesk::auth::init(arenadesk::auth::AuthConfig {
        jwt_secret: Some(JWT_SECRET.to_string()),
        audience: None,
    });
    let metrics = Arc::new(Metrics::new());
    let jobs = Arc::new(ServiceJobRunner::new(
        db.clone(),
        None,
        job_settings(),
        metrics.clone(),
    ));
    let state = AppState::new(
        db,
        false,
        PaymentSecrets {
            webhook_secret: Some(WEBHOOK_SECRET.to_string()),
            key_secret: Some(KEY_SECRET.to_string()),
        },
        metrics,
        jobs,
    );
    build_router(state)
}

/// Signed bearer token for `user`.
pub fn token(user: &str, admin: bool) -> String {
    let claims = serde_json::json!({
        "sub": user,
        "admin": admin,
        "exp": chrono::Utc::now().timestamp() + 3600,
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn player(name: &str) -> Player {
    Player {
        name: name.to_string(),
        contact: format!("{}@example.com", name.to_lowercase()),
        in_game_id: format!("{}#0001", name),
        role: String::new(),
    }
}

pub fn new_team(tournament_id: &str, name: &str) -> NewTeam {
    NewTeam {
        tournament_id: tournament_id.to_string(),
        name: name.to_string(),
        players: ["Ava", "Ben", "Cy", "Dee", "Eli"].iter().map(|n| player(n)).collect(),
        captain_email: "captain@example.com".to_string(),
        captain_phone: "+10000000000".to_string(),
        entry_fee: Some(500),
        logo_url: None,
    }
}

pub async fn seed_tournament(db: &Database, name: &str, status: TournamentStatus) -> Tournament {
    let t = db
        .create_tournament(&NewTournament {
            name: name.to_string(),
            game: "Valorant".to_string(),
            description: format!("{} description", name),
            max_teams: None,
            entry_fee: 500,
        })
        .await
        .unwrap();
    if status == TournamentStatus::RegistrationOpen {
        return t;
    }
    db.set_tournament_status(&t.id, status).await.unwrap().unwrap()
}

pub async fn seed_team(db: &Database, tournament_id: &str, name: &str) -> Team {
    db.create_team(&new_team(tournament_id, name), 500, "owner-1")
        .await
        .unwrap()
}
