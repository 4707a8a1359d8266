//! Request validation and status-transition rules.
//!
//! Validation failures are plain messages; handlers turn them into 400s.
//! Transition checks return the reason a change is refused; handlers turn
//! those into 409s.

use crate::models::{
    NewAnnouncement, NewTeam, NewTournament, Player, Team, TeamPaymentStatus, TeamStatus,
    TeamUpdate, TournamentStatus,
};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_PLAYERS: usize = 10;
pub const MAX_TITLE_LEN: usize = 200;

fn check_name(field: &str, value: &str) -> Result<(), String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(format!("{} is required", field));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(format!("{} must be at most {} characters", field, MAX_NAME_LEN));
    }
    Ok(())
}

fn check_email(value: &str) -> Result<(), String> {
    let ok = match value.trim().split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };
    if ok {
        Ok(())
    } else {
        Err("captainEmail must be a valid email address".to_string())
    }
}

fn check_players(players: &[Player]) -> Result<(), String> {
    if players.is_empty() {
        return Err("players must not be empty".to_string());
    }
    if players.len() > MAX_PLAYERS {
        return Err(format!("a team has at most {} players", MAX_PLAYERS));
    }
    for (i, p) in players.iter().enumerate() {
        if p.name.trim().is_empty() {
            return Err(format!("players[{}].name is required", i));
        }
        if p.in_game_id.trim().is_empty() {
            return Err(format!("players[{}].inGameId is required", i));
        }
    }
    Ok(())
}

pub fn new_team(team: &NewTeam) -> Result<(), String> {
    if team.tournament_id.trim().is_empty() {
        return Err("tournamentId is required".to_string());
    }
    check_name("name", &team.name)?;
    check_players(&team.players)?;
    check_email(&team.captain_email)?;
    if team.entry_fee.is_some_and(|fee| fee < 0) {
        return Err("entryFee must not be negative".to_string());
    }
    Ok(())
}

pub fn team_update(update: &TeamUpdate) -> Result<(), String> {
    if let Some(name) = &update.name {
        check_name("name", name)?;
    }
    if let Some(players) = &update.players {
        check_players(players)?;
    }
    if let Some(email) = &update.captain_email {
        check_email(email)?;
    }
    Ok(())
}

pub fn new_tournament(t: &NewTournament) -> Result<(), String> {
    check_name("name", &t.name)?;
    check_name("game", &t.game)?;
    if t.entry_fee < 0 {
        return Err("entryFee must not be negative".to_string());
    }
    if let Some(max) = t.max_teams {
        if max < 2 {
            return Err("maxTeams must be at least 2".to_string());
        }
    }
    Ok(())
}

pub fn new_announcement(a: &NewAnnouncement) -> Result<(), String> {
    let title = a.title.trim();
    if title.is_empty() {
        return Err("title is required".to_string());
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(format!("title must be at most {} characters", MAX_TITLE_LEN));
    }
    if a.message.trim().is_empty() {
        return Err("message is required".to_string());
    }
    Ok(())
}

/// Whether a team may move to registration status `to`.
///
/// A paid team stays approved; it has to be refunded first.
pub fn team_status_change(team: &Team, to: TeamStatus) -> Result<(), String> {
    if team.payment_status == TeamPaymentStatus::Paid && to != TeamStatus::Approved {
        return Err(format!(
            "team has paid; refund it before setting status to {}",
            to
        ));
    }
    Ok(())
}

/// Whether a team may move to payment status `to`.
pub fn team_payment_status_change(team: &Team, to: TeamPaymentStatus) -> Result<(), String> {
    match (team.payment_status, to) {
        (from, to) if from == to => Ok(()),
        (_, TeamPaymentStatus::Paid) => Ok(()),
        (TeamPaymentStatus::Paid, TeamPaymentStatus::Refunded) => Ok(()),
        (TeamPaymentStatus::Refunded, TeamPaymentStatus::Pending) => Ok(()),
        (from, to) => Err(format!("cannot change payment status from {} to {}", from, to)),
    }
}

/// Allowed tournament lifecycle moves.
///
/// Registration may be reopened only while no bracket exists. `ongoing` is
/// normally set by bracket generation; admins may also start a tournament
/// whose bracket was generated.
pub fn tournament_status_change(
    from: TournamentStatus,
    to: TournamentStatus,
    bracket_generated: bool,
) -> Result<(), String> {
    use TournamentStatus::*;
    let allowed = match (from, to) {
        (a, b) if a == b => true,
        (RegistrationOpen, RegistrationClosed) => true,
        (RegistrationClosed, RegistrationOpen) => !bracket_generated,
        (RegistrationClosed, Ongoing) => bracket_generated,
        (Ongoing, Complete) => true,
        _ => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(format!("cannot change tournament status from {} to {}", from, to))
    }
}
