//! In-memory stand-ins for the job storage traits and the bracket provider.

use super::{BracketStore, LeaseStore, PaymentLedger};
use crate::bracket::{BracketProvider, CreateTournament, ProviderTournament};
use crate::models::{
    Payment, PaymentStatus, Player, Team, TeamPaymentStatus, TeamStatus, Tournament,
    TournamentStatus,
};
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Default)]
pub(crate) struct MemoryStore {
    pub payments: Mutex<Vec<Payment>>,
    pub teams: Mutex<Vec<Team>>,
    pub tournaments: Mutex<Vec<Tournament>>,
    leases: Mutex<HashMap<String, (String, Instant)>>,
    /// Number of write calls that reached the store.
    pub writes: Mutex<u32>,
    /// Tournament ids whose success update should fail.
    pub fail_mark_for: Mutex<HashSet<String>>,
    pub lease_renewals: Mutex<u32>,
}

impl MemoryStore {
    pub fn lease_holder(&self, job: &str) -> Option<String> {
        self.leases.lock().unwrap().get(job).map(|(h, _)| h.clone())
    }

    pub fn payment(&self, id: &str) -> Payment {
        self.payments
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .unwrap()
    }

    pub fn tournament(&self, id: &str) -> Tournament {
        self.tournaments
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .unwrap()
    }

    pub fn write_count(&self) -> u32 {
        *self.writes.lock().unwrap()
    }

    fn count_write(&self) {
        *self.writes.lock().unwrap() += 1;
    }
}

impl PaymentLedger for MemoryStore {
    async fn stale_payment_ids(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>> {
        Ok(self
            .payments
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.status == PaymentStatus::Created && p.created_at <= cutoff)
            .map(|p| p.id.clone())
            .collect())
    }

    async fn expire_payments(&self, ids: &[String], now: DateTime<Utc>) -> Result<u64> {
        self.count_write();
        let mut updated = 0;
        for p in self.payments.lock().unwrap().iter_mut() {
            if ids.contains(&p.id) && p.status == PaymentStatus::Created {
                p.status = PaymentStatus::Expired;
                p.expired_at = Some(now);
                p.updated_at = now;
                updated += 1;
            }
        }
        Ok(updated)
    }
}

impl BracketStore for MemoryStore {
    async fn bracket_candidates(&self) -> Result<Vec<Tournament>> {
        Ok(self
            .tournaments
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.status == TournamentStatus::RegistrationClosed && !t.bracket_generated)
            .cloned()
            .collect())
    }

    async fn qualifying_teams(&self, tournament_id: &str) -> Result<Vec<Team>> {
        Ok(self
            .teams
            .lock()
            .unwrap()
            .iter()
            .filter(|t| {
                t.tournament_id == tournament_id
                    && t.status == TeamStatus::Approved
                    && t.payment_status == TeamPaymentStatus::Paid
            })
            .cloned()
            .collect())
    }

    async fn mark_bracket_generated(
        &self,
        tournament_id: &str,
        provider: &ProviderTournament,
        participant_count: i32,
    ) -> Result<()> {
        self.count_write();
        if self.fail_mark_for.lock().unwrap().contains(tournament_id) {
            bail!("write rejected for {}", tournament_id);
        }
        let mut tournaments = self.tournaments.lock().unwrap();
        let t = tournaments
            .iter_mut()
            .find(|t| t.id == tournament_id)
            .ok_or_else(|| anyhow::anyhow!("no tournament {}", tournament_id))?;
        t.bracket_generated = true;
        t.provider_tournament_id = Some(provider.id.clone());
        t.provider_url = Some(provider.url.clone());
        t.status = TournamentStatus::Ongoing;
        t.participant_count = participant_count;
        t.bracket_error = None;
        t.bracket_failed_at = None;
        Ok(())
    }

    async fn record_bracket_failure(
        &self,
        tournament_id: &str,
        message: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.count_write();
        let mut tournaments = self.tournaments.lock().unwrap();
        if let Some(t) = tournaments.iter_mut().find(|t| t.id == tournament_id) {
            t.bracket_error = Some(message.to_string());
            t.bracket_failed_at = Some(at);
        }
        Ok(())
    }
}

impl LeaseStore for MemoryStore {
    async fn try_acquire_lease(&self, job: &str, holder: &str, ttl: Duration) -> Result<bool> {
        let mut leases = self.leases.lock().unwrap();
        let now = Instant::now();
        match leases.get(job) {
            Some((_, expires)) if *expires > now => Ok(false),
            _ => {
                leases.insert(job.to_string(), (holder.to_string(), now + ttl));
                Ok(true)
            }
        }
    }

    async fn renew_lease(&self, job: &str, holder: &str, ttl: Duration) -> Result<bool> {
        let mut leases = self.leases.lock().unwrap();
        match leases.get_mut(job) {
            Some((h, expires)) if h == holder => {
                *expires = Instant::now() + ttl;
                *self.lease_renewals.lock().unwrap() += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_lease(&self, job: &str, holder: &str) -> Result<()> {
        let mut leases = self.leases.lock().unwrap();
        if leases.get(job).is_some_and(|(h, _)| h == holder) {
            leases.remove(job);
        }
        Ok(())
    }
}

// ── Fake provider ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ProviderCall {
    Create(CreateTournament),
    AddParticipant {
        tournament_id: String,
        name: String,
        misc: String,
    },
    Start(String),
}

#[derive(Default)]
pub(crate) struct FakeProvider {
    pub calls: Mutex<Vec<ProviderCall>>,
    /// Tournament names whose create call fails.
    pub fail_create_for: Mutex<HashSet<String>>,
    /// Team names whose add-participant call fails.
    pub fail_participant: Mutex<HashSet<String>>,
    pub fail_start: Mutex<bool>,
    /// How long the start call takes to answer.
    pub start_delay: Mutex<Option<Duration>>,
    next_id: Mutex<u32>,
}

impl FakeProvider {
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl BracketProvider for FakeProvider {
    async fn create_tournament(&self, req: &CreateTournament) -> Result<ProviderTournament> {
        self.calls.lock().unwrap().push(ProviderCall::Create(req.clone()));
        if self.fail_create_for.lock().unwrap().contains(&req.name) {
            bail!("bracket provider create returned 422 Unprocessable Entity: url taken");
        }
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        Ok(ProviderTournament {
            id: format!("p{}", *next),
            url: format!("https://brackets.test/{}", req.url),
        })
    }

    async fn add_participant(&self, tournament_id: &str, name: &str, misc: &str) -> Result<()> {
        self.calls.lock().unwrap().push(ProviderCall::AddParticipant {
            tournament_id: tournament_id.to_string(),
            name: name.to_string(),
            misc: misc.to_string(),
        });
        if self.fail_participant.lock().unwrap().contains(name) {
            bail!("bracket provider add participant returned 500 Internal Server Error");
        }
        Ok(())
    }

    async fn start_tournament(&self, tournament_id: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(ProviderCall::Start(tournament_id.to_string()));
        let delay = *self.start_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.fail_start.lock().unwrap() {
            bail!("bracket provider start returned 503 Service Unavailable");
        }
        Ok(())
    }
}

// ── Fixtures ────────────────────────────────────────────────────

pub(crate) fn payment(id: &str, status: PaymentStatus, created_at: DateTime<Utc>) -> Payment {
    Payment {
        id: id.to_string(),
        team_id: format!("team-{}", id),
        amount: 500,
        currency: "INR".to_string(),
        status,
        provider_order_id: format!("order_{}", id),
        provider_payment_id: None,
        created_at,
        updated_at: created_at,
        captured_at: None,
        expired_at: None,
    }
}

pub(crate) fn tournament(id: &str, name: &str, status: TournamentStatus) -> Tournament {
    let now = Utc::now();
    Tournament {
        id: id.to_string(),
        name: name.to_string(),
        game: "Valorant".to_string(),
        description: String::new(),
        status,
        max_teams: None,
        entry_fee: 500,
        bracket_generated: false,
        provider_tournament_id: None,
        provider_url: None,
        participant_count: 0,
        bracket_error: None,
        bracket_failed_at: None,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn team(
    id: &str,
    tournament_id: &str,
    status: TeamStatus,
    payment_status: TeamPaymentStatus,
) -> Team {
    let now = Utc::now();
    Team {
        id: id.to_string(),
        tournament_id: tournament_id.to_string(),
        name: format!("Team {}", id),
        players: vec![Player {
            name: "Captain".to_string(),
            contact: "captain@example.com".to_string(),
            in_game_id: format!("{}#0001", id),
            role: "captain".to_string(),
        }],
        captain_email: "captain@example.com".to_string(),
        captain_phone: String::new(),
        entry_fee: 500,
        logo_url: None,
        owner_id: "owner".to_string(),
        status,
        payment_status,
        rejection_reason: None,
        created_at: now,
        updated_at: now,
    }
}
