//! Tournament operations and bracket bookkeeping.
//!
//! `bracket_generated` only ever goes from false to true: the success update
//! sets it, and nothing in this module clears it.

use super::Database;
use crate::bracket::ProviderTournament;
use crate::models::{new_id, NewTournament, Team, Tournament, TournamentStatus};
use anyhow::Result;
use chrono::{DateTime, Utc};

const TOURNAMENT_COLUMNS: &str = "id, name, game, description, status, max_teams, entry_fee,
    bracket_generated, provider_tournament_id, provider_url, participant_count,
    bracket_error, bracket_failed_at, created_at, updated_at";

impl Database {
    pub async fn create_tournament(&self, t: &NewTournament) -> Result<Tournament> {
        let sql = format!(
            "INSERT INTO tournaments (id, name, game, description, status, max_teams, entry_fee)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {TOURNAMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Tournament>(&sql)
            .bind(new_id())
            .bind(t.name.trim())
            .bind(&t.game)
            .bind(&t.description)
            .bind(TournamentStatus::RegistrationOpen.as_str())
            .bind(t.max_teams)
            .bind(t.entry_fee)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn get_tournament(&self, id: &str) -> Result<Option<Tournament>> {
        let sql = format!("SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE id = $1");
        let row = sqlx::query_as::<_, Tournament>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// All tournaments, newest first.
    pub async fn list_tournaments(&self) -> Result<Vec<Tournament>> {
        let sql = format!("SELECT {TOURNAMENT_COLUMNS} FROM tournaments ORDER BY created_at DESC");
        let rows = sqlx::query_as::<_, Tournament>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn set_tournament_status(
        &self,
        id: &str,
        status: TournamentStatus,
    ) -> Result<Option<Tournament>> {
        let sql = format!(
            "UPDATE tournaments SET status = $2, updated_at = NOW() WHERE id = $1
             RETURNING {TOURNAMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Tournament>(&sql)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Number of teams registered (any status) for a tournament.
    pub async fn count_teams_in(&self, tournament_id: &str) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM teams WHERE tournament_id = $1",
        )
        .bind(tournament_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Tournaments whose registration closed and still lack a bracket, in
    /// table order.
    pub async fn bracket_candidates(&self) -> Result<Vec<Tournament>> {
        let sql = format!(
            "SELECT {TOURNAMENT_COLUMNS} FROM tournaments
             WHERE status = $1 AND bracket_generated = FALSE"
        );
        let rows = sqlx::query_as::<_, Tournament>(&sql)
            .bind(TournamentStatus::RegistrationClosed.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Record a provisioned bracket: flag it generated, store the provider
    /// reference, move the tournament to `ongoing` and clear any earlier error.
    pub async fn mark_bracket_generated(
        &self,
        tournament_id: &str,
        provider: &ProviderTournament,
        participant_count: i32,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE tournaments SET bracket_generated = TRUE,
                    provider_tournament_id = $2, provider_url = $3,
                    status = $4, participant_count = $5,
                    bracket_error = NULL, bracket_failed_at = NULL,
                    updated_at = NOW()
             WHERE id = $1",
        )
        .bind(tournament_id)
        .bind(&provider.id)
        .bind(&provider.url)
        .bind(TournamentStatus::Ongoing.as_str())
        .bind(participant_count)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Stamp a failed provisioning attempt onto the tournament.
    pub async fn record_bracket_failure(
        &self,
        tournament_id: &str,
        message: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE tournaments SET bracket_error = $2, bracket_failed_at = $3, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(tournament_id)
        .bind(message)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

impl crate::jobs::BracketStore for Database {
    async fn bracket_candidates(&self) -> Result<Vec<Tournament>> {
        Database::bracket_candidates(self).await
    }

    async fn qualifying_teams(&self, tournament_id: &str) -> Result<Vec<Team>> {
        self.qualifying_teams_for(tournament_id).await
    }

    async fn mark_bracket_generated(
        &self,
        tournament_id: &str,
        provider: &ProviderTournament,
        participant_count: i32,
    ) -> Result<()> {
        Database::mark_bracket_generated(self, tournament_id, provider, participant_count).await
    }

    async fn record_bracket_failure(
        &self,
        tournament_id: &str,
        message: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        Database::record_bracket_failure(self, tournament_id, message, at).await
    }
}
