//! Bracket generation for tournaments whose registration has closed.
//!
//! For each candidate tournament, in query order:
//!
//! 1. Load the approved and paid teams.
//! 2. Fewer than two: skip, leave the tournament untouched.
//! 3. Create the provider tournament, add every team as a participant (team
//!    id as `misc`), start it.
//! 4. Record the provider id/url, flip `bracket_generated`, set `ongoing`.
//!
//! A failure at any step is written onto that tournament's `bracket_error`
//! and the run moves on to the next candidate.

use super::BracketStore;
use crate::bracket::{tournament_slug, BracketProvider, CreateTournament, ProviderTournament};
use crate::models::{Team, Tournament};
use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

/// Minimum qualifying teams for a bracket.
pub const MIN_PARTICIPANTS: usize = 2;

#[derive(Debug, Clone)]
pub struct BracketSettings {
    /// Provider tournament type, e.g. "single elimination".
    pub tournament_type: String,
}

/// Counts for one generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketRunSummary {
    pub candidates: usize,
    pub generated: usize,
    pub skipped: usize,
    pub failed: usize,
}

enum Outcome {
    Generated,
    Skipped,
    Failed,
}

pub async fn generate_brackets<S, P>(
    store: &S,
    provider: &P,
    settings: &BracketSettings,
) -> Result<BracketRunSummary>
where
    S: BracketStore,
    P: BracketProvider,
{
    let candidates = store.bracket_candidates().await?;
    let mut summary = BracketRunSummary {
        candidates: candidates.len(),
        ..Default::default()
    };

    for tournament in &candidates {
        match process_tournament(store, provider, settings, tournament).await {
            Outcome::Generated => summary.generated += 1,
            Outcome::Skipped => summary.skipped += 1,
            Outcome::Failed => summary.failed += 1,
        }
    }

    info!(
        candidates = summary.candidates,
        generated = summary.generated,
        skipped = summary.skipped,
        failed = summary.failed,
        "bracket generation run complete"
    );
    Ok(summary)
}

async fn process_tournament<S, P>(
    store: &S,
    provider: &P,
    settings: &BracketSettings,
    tournament: &Tournament,
) -> Outcome
where
    S: BracketStore,
    P: BracketProvider,
{
    let teams = match store.qualifying_teams(&tournament.id).await {
        Ok(teams) => teams,
        Err(e) => {
            warn!(tournament_id = %tournament.id, error = %e, "failed to load qualifying teams");
            record_failure(store, tournament, &format!("{:#}", e)).await;
            return Outcome::Failed;
        }
    };

    if teams.len() < MIN_PARTICIPANTS {
        info!(
            tournament_id = %tournament.id,
            teams = teams.len(),
            "not enough qualifying teams, skipping bracket"
        );
        return Outcome::Skipped;
    }

    let created = match provision(provider, settings, tournament, &teams).await {
        Ok(created) => created,
        Err(e) => {
            warn!(tournament_id = %tournament.id, error = %e, "bracket provisioning failed");
            record_failure(store, tournament, &format!("{:#}", e)).await;
            return Outcome::Failed;
        }
    };

    let count = i32::try_from(teams.len()).unwrap_or(i32::MAX);
    if let Err(e) = store
        .mark_bracket_generated(&tournament.id, &created, count)
        .await
    {
        // The provider bracket exists but we could not record it.
        error!(
            tournament_id = %tournament.id,
            provider_tournament_id = %created.id,
            error = %e,
            "bracket created at provider but not recorded"
        );
        let message = format!(
            "provider tournament {} created but not recorded: {:#}",
            created.id, e
        );
        record_failure(store, tournament, &message).await;
        return Outcome::Failed;
    }

    info!(
        tournament_id = %tournament.id,
        provider_tournament_id = %created.id,
        participants = count,
        "bracket generated"
    );
    Outcome::Generated
}

async fn provision<P: BracketProvider>(
    provider: &P,
    settings: &BracketSettings,
    tournament: &Tournament,
    teams: &[Team],
) -> Result<ProviderTournament> {
    let req = CreateTournament {
        name: tournament.name.clone(),
        tournament_type: settings.tournament_type.clone(),
        url: tournament_slug(&tournament.name, &tournament.id),
        description: tournament.description.clone(),
        game_name: tournament.game.clone(),
    };
    let created = provider.create_tournament(&req).await?;

    for team in teams {
        provider
            .add_participant(&created.id, &team.name, &team.id)
            .await
            .with_context(|| format!("adding team {}", team.id))?;
    }

    provider.start_tournament(&created.id).await?;
    Ok(created)
}

async fn record_failure<S: BracketStore>(store: &S, tournament: &Tournament, message: &str) {
    if let Err(e) = store
        .record_bracket_failure(&tournament.id, message, Utc::now())
        .await
    {
        error!(tournament_id = %tournament.id, error = %e, "failed to record bracket error");
    }
}
