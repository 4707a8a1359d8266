//! Team registration operations.
//!
//! Teams are created `pending`/`pending` and only move through the explicit
//! transitions below. Hard deletes happen solely through the admin delete
//! endpoint; payments cascade with the team.

use super::Database;
use crate::models::{
    new_id, NewTeam, Team, TeamFilter, TeamPaymentStatus, TeamStatus, TeamUpdate,
};
use anyhow::Result;
use sqlx::types::Json;

const TEAM_COLUMNS: &str = "id, tournament_id, name, players, captain_email, captain_phone,
    entry_fee, logo_url, owner_id, status, payment_status, rejection_reason,
    created_at, updated_at";

impl Database {
    /// Insert a new team in `pending` registration and payment state, owing
    /// `entry_fee`.
    pub async fn create_team(
        &self,
        team: &NewTeam,
        entry_fee: i64,
        owner_id: &str,
    ) -> Result<Team> {
        let sql = format!(
            "INSERT INTO teams (id, tournament_id, name, players, captain_email, captain_phone,
                                entry_fee, logo_url, owner_id, status, payment_status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING {TEAM_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Team>(&sql)
            .bind(new_id())
            .bind(&team.tournament_id)
            .bind(team.name.trim())
            .bind(Json(&team.players))
            .bind(&team.captain_email)
            .bind(&team.captain_phone)
            .bind(entry_fee)
            .bind(&team.logo_url)
            .bind(owner_id)
            .bind(TeamStatus::Pending.as_str())
            .bind(TeamPaymentStatus::Pending.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn get_team(&self, id: &str) -> Result<Option<Team>> {
        let sql = format!("SELECT {TEAM_COLUMNS} FROM teams WHERE id = $1");
        let row = sqlx::query_as::<_, Team>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// List teams matching the filter, newest registration first.
    pub async fn list_teams(&self, filter: &TeamFilter) -> Result<Vec<Team>> {
        let sql = format!(
            "SELECT {TEAM_COLUMNS} FROM teams
             WHERE ($1::TEXT IS NULL OR status = $1)
               AND ($2::TEXT IS NULL OR tournament_id = $2)
             ORDER BY created_at DESC, id"
        );
        let rows = sqlx::query_as::<_, Team>(&sql)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.tournament_id.as_deref())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Every team, unfiltered. Used by the dashboard aggregation.
    pub async fn all_teams(&self) -> Result<Vec<Team>> {
        self.list_teams(&TeamFilter::default()).await
    }

    /// Teams eligible for a bracket: approved and paid, in query order.
    pub async fn qualifying_teams_for(&self, tournament_id: &str) -> Result<Vec<Team>> {
        let sql = format!(
            "SELECT {TEAM_COLUMNS} FROM teams
             WHERE tournament_id = $1 AND status = $2 AND payment_status = $3"
        );
        let rows = sqlx::query_as::<_, Team>(&sql)
            .bind(tournament_id)
            .bind(TeamStatus::Approved.as_str())
            .bind(TeamPaymentStatus::Paid.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Apply a partial edit. Returns `None` if the team does not exist.
    pub async fn update_team(&self, id: &str, update: &TeamUpdate) -> Result<Option<Team>> {
        if update.is_empty() {
            return self.get_team(id).await;
        }
        let sql = format!(
            "UPDATE teams SET
                name = COALESCE($2, name),
                players = COALESCE($3, players),
                captain_email = COALESCE($4, captain_email),
                captain_phone = COALESCE($5, captain_phone),
                logo_url = COALESCE($6, logo_url),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {TEAM_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Team>(&sql)
            .bind(id)
            .bind(update.name.as_deref().map(str::trim))
            .bind(update.players.as_ref().map(Json))
            .bind(update.captain_email.as_deref())
            .bind(update.captain_phone.as_deref())
            .bind(update.logo_url.as_deref())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Set registration status. A rejection stores its reason; any other
    /// status clears it.
    pub async fn set_team_status(
        &self,
        id: &str,
        status: TeamStatus,
        reason: Option<&str>,
    ) -> Result<Option<Team>> {
        let reason = match status {
            TeamStatus::Rejected => reason,
            _ => None,
        };
        let sql = format!(
            "UPDATE teams SET status = $2, rejection_reason = $3, updated_at = NOW()
             WHERE id = $1
             RETURNING {TEAM_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Team>(&sql)
            .bind(id)
            .bind(status.as_str())
            .bind(reason)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Set payment status directly (admin override).
    ///
    /// Marking a team `paid` also approves it, so `paid` never coexists with
    /// `pending` or `rejected`.
    pub async fn set_team_payment_status(
        &self,
        id: &str,
        payment_status: TeamPaymentStatus,
    ) -> Result<Option<Team>> {
        let sql = format!(
            "UPDATE teams SET
                payment_status = $2,
                status = CASE WHEN $2 = 'paid' THEN 'approved' ELSE status END,
                rejection_reason = CASE WHEN $2 = 'paid' THEN NULL ELSE rejection_reason END,
                updated_at = NOW()
             WHERE id = $1
             RETURNING {TEAM_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Team>(&sql)
            .bind(id)
            .bind(payment_status.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Delete a team by ID. Returns true if a row was deleted.
    pub async fn delete_team(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM teams WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
