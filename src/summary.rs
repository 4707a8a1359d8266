//! Admin dashboard aggregation.
//!
//! The dashboard loads every team, payment and tournament and counts them in
//! process. Collections are small enough that a full scan per request is
//! fine; there is no caching or pagination.

use crate::models::{
    Payment, PaymentStatus, Team, TeamPaymentStatus, TeamStatus, Tournament, TournamentStatus,
};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub total: usize,
    /// Count per status value; every known status is present, zero or not.
    pub by_status: BTreeMap<&'static str, usize>,
}

impl StatusCounts {
    fn tally<'a, I>(all: &[&'static str], statuses: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut by_status: BTreeMap<&'static str, usize> = all.iter().map(|s| (*s, 0)).collect();
        let mut total = 0;
        for status in statuses {
            total += 1;
            if let Some(slot) = all.iter().find(|s| **s == status) {
                *by_status.entry(*slot).or_default() += 1;
            }
        }
        StatusCounts { total, by_status }
    }

    pub fn get(&self, status: &str) -> usize {
        self.by_status.get(status).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub teams: StatusCounts,
    pub team_payments: StatusCounts,
    pub payments: StatusCounts,
    pub tournaments: StatusCounts,
    /// Sum of `amount` over captured payments, in minor currency units.
    pub captured_revenue: i64,
}

fn names<T: Copy>(all: &[T], f: impl Fn(T) -> &'static str) -> Vec<&'static str> {
    all.iter().copied().map(f).collect()
}

pub fn summarize(teams: &[Team], payments: &[Payment], tournaments: &[Tournament]) -> DashboardSummary {
    let team_statuses = names(TeamStatus::ALL, |s| s.as_str());
    let team_payment_statuses = names(TeamPaymentStatus::ALL, |s| s.as_str());
    let payment_statuses = names(PaymentStatus::ALL, |s| s.as_str());
    let tournament_statuses = names(TournamentStatus::ALL, |s| s.as_str());

    let captured_revenue = payments
        .iter()
        .filter(|p| p.status == PaymentStatus::Captured)
        .map(|p| p.amount)
        .sum();

    DashboardSummary {
        teams: StatusCounts::tally(&team_statuses, teams.iter().map(|t| t.status.as_str())),
        team_payments: StatusCounts::tally(
            &team_payment_statuses,
            teams.iter().map(|t| t.payment_status.as_str()),
        ),
        payments: StatusCounts::tally(&payment_statuses, payments.iter().map(|p| p.status.as_str())),
        tournaments: StatusCounts::tally(
            &tournament_statuses,
            tournaments.iter().map(|t| t.status.as_str()),
        ),
        captured_revenue,
    }
}
