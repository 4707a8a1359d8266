//! # Bracket Provider — External Tournament Bracket API
//!
//! Client for a Challonge-compatible bracket service. The bracket job only
//! needs three calls, captured by [`BracketProvider`]:
//!
//! | Call | HTTP |
//! |------|------|
//! | create tournament | `POST {base}/tournaments.json` |
//! | add participant | `POST {base}/tournaments/{id}/participants.json` |
//! | start | `POST {base}/tournaments/{id}/start.json` |
//!
//! Every request carries the `api_key` query parameter. Non-2xx responses
//! become errors carrying the status and a truncated body.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Longest slug the provider accepts for a tournament URL.
const MAX_SLUG_LEN: usize = 60;

/// Longest provider error body echoed into an error message.
const MAX_ERROR_BODY: usize = 300;

/// Parameters for a new provider tournament.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateTournament {
    pub name: String,
    pub tournament_type: String,
    pub url: String,
    pub description: String,
    pub game_name: String,
}

/// Reference to a tournament created at the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderTournament {
    pub id: String,
    pub url: String,
}

pub trait BracketProvider: Send + Sync {
    fn create_tournament(
        &self,
        req: &CreateTournament,
    ) -> impl Future<Output = Result<ProviderTournament>> + Send;

    /// Register a participant. `misc` is opaque to the provider; we pass the
    /// team id so results can be mapped back.
    fn add_participant(
        &self,
        tournament_id: &str,
        name: &str,
        misc: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    fn start_tournament(&self, tournament_id: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Build a provider URL slug from a tournament name and id.
///
/// Lowercases, maps every run of non-alphanumeric characters to a single
/// `_`, appends the first 8 alphanumerics of the id so slugs stay unique, and
/// caps the result at 60 characters.
pub fn tournament_slug(name: &str, id: &str) -> String {
    let mut base = String::new();
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            base.push(c.to_ascii_lowercase());
        } else if !base.is_empty() && !base.ends_with('_') {
            base.push('_');
        }
    }
    let suffix: String = id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .take(8)
        .collect();

    let room = MAX_SLUG_LEN.saturating_sub(suffix.len() + 1);
    base.truncate(room);
    let base = base.trim_end_matches('_');

    match (base.is_empty(), suffix.is_empty()) {
        (true, true) => "tournament".to_string(),
        (true, false) => format!("t_{}", suffix),
        (false, true) => base.to_string(),
        (false, false) => format!("{}_{}", base, suffix),
    }
}

// ── Challonge client ────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum IdInner {
    Number(serde_json::Number),
    String(String),
}

impl From<IdInner> for String {
    fn from(inner: IdInner) -> Self {
        match inner {
            IdInner::Number(n) => n.to_string(),
            IdInner::String(s) => s,
        }
    }
}

#[derive(Deserialize)]
struct TournamentEnvelope {
    tournament: TournamentBody,
}

#[derive(Deserialize)]
struct TournamentBody {
    id: IdInner,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    full_challonge_url: Option<String>,
}

#[derive(Clone)]
pub struct ChallongeClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ChallongeClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("arenadesk/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build bracket provider HTTP client")?;
        Ok(ChallongeClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn post(&self, op: &str, path: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .with_context(|| format!("bracket provider {} request failed", op))?;

        let status = response.status();
        if !status.is_success() {
            let mut text = response.text().await.unwrap_or_default();
            if text.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !text.is_char_boundary(cut) {
                    cut -= 1;
                }
                text.truncate(cut);
            }
            bail!("bracket provider {} returned {}: {}", op, status, text);
        }
        Ok(response)
    }
}

impl BracketProvider for ChallongeClient {
    async fn create_tournament(&self, req: &CreateTournament) -> Result<ProviderTournament> {
        let body = serde_json::json!({ "tournament": req });
        let response = self.post("create", "/tournaments.json", body).await?;
        let envelope: TournamentEnvelope = response
            .json()
            .await
            .context("bracket provider create response was not a tournament")?;
        let t = envelope.tournament;
        let url = t
            .full_challonge_url
            .or(t.url)
            .unwrap_or_else(|| req.url.clone());
        Ok(ProviderTournament {
            id: t.id.into(),
            url,
        })
    }

    async fn add_participant(&self, tournament_id: &str, name: &str, misc: &str) -> Result<()> {
        let path = format!(
            "/tournaments/{}/participants.json",
            urlencoding::encode(tournament_id)
        );
        let body = serde_json::json!({ "participant": { "name": name, "misc": misc } });
        self.post("add participant", &path, body).await?;
        Ok(())
    }

    async fn start_tournament(&self, tournament_id: &str) -> Result<()> {
        let path = format!("/tournaments/{}/start.json", urlencoding::encode(tournament_id));
        self.post("start", &path, serde_json::json!({})).await?;
        Ok(())
    }
}
