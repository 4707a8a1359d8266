//! # Models — Teams, Payments, Tournaments and Admin Records
//!
//! Row types double as API payloads: every struct here derives both
//! `sqlx::FromRow` and `Serialize` (camelCase on the wire). Status columns are
//! stored as `TEXT` and parsed into enums through `TryFrom<String>`, so an
//! unknown value in the database surfaces as a decode error instead of being
//! silently passed through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A status string that does not name any known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Implements `as_str`, `Display`, `FromStr` and `TryFrom<String>` for a
/// fieldless status enum from a single variant ↔ string table.
macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = UnknownVariant;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }
    };
}

// ── Status enums ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamStatus {
    Pending,
    Approved,
    Rejected,
}

text_enum!(TeamStatus, "team status", {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamPaymentStatus {
    Pending,
    Paid,
    Refunded,
}

text_enum!(TeamPaymentStatus, "team payment status", {
    Pending => "pending",
    Paid => "paid",
    Refunded => "refunded",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Created,
    Captured,
    Failed,
    Expired,
    Refunded,
}

text_enum!(PaymentStatus, "payment status", {
    Created => "created",
    Captured => "captured",
    Failed => "failed",
    Expired => "expired",
    Refunded => "refunded",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    RegistrationOpen,
    RegistrationClosed,
    Ongoing,
    Complete,
}

text_enum!(TournamentStatus, "tournament status", {
    RegistrationOpen => "registration_open",
    RegistrationClosed => "registration_closed",
    Ongoing => "ongoing",
    Complete => "complete",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncementPriority {
    Low,
    #[default]
    Normal,
    High,
}

text_enum!(AnnouncementPriority, "announcement priority", {
    Low => "low",
    Normal => "normal",
    High => "high",
});

// ── Teams ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub name: String,
    pub contact: String,
    pub in_game_id: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    pub tournament_id: String,
    pub name: String,
    #[sqlx(json)]
    pub players: Vec<Player>,
    pub captain_email: String,
    pub captain_phone: String,
    pub entry_fee: i64,
    pub logo_url: Option<String>,
    pub owner_id: String,
    #[sqlx(try_from = "String")]
    pub status: TeamStatus,
    #[sqlx(try_from = "String")]
    pub payment_status: TeamPaymentStatus,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied by a captain when registering a team.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTeam {
    pub tournament_id: String,
    pub name: String,
    pub players: Vec<Player>,
    pub captain_email: String,
    #[serde(default)]
    pub captain_phone: String,
    /// Optional echo of the fee shown to the captain. The stored fee always
    /// comes from the tournament.
    #[serde(default)]
    pub entry_fee: Option<i64>,
    #[serde(default)]
    pub logo_url: Option<String>,
}

/// Partial edit of a team; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamUpdate {
    pub name: Option<String>,
    pub players: Option<Vec<Player>>,
    pub captain_email: Option<String>,
    pub captain_phone: Option<String>,
    pub logo_url: Option<String>,
}

impl TeamUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.players.is_none()
            && self.captain_email.is_none()
            && self.captain_phone.is_none()
            && self.logo_url.is_none()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamFilter {
    pub status: Option<TeamStatus>,
    pub tournament_id: Option<String>,
}

// ── Payments ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub team_id: String,
    pub amount: i64,
    pub currency: String,
    #[sqlx(try_from = "String")]
    pub status: PaymentStatus,
    pub provider_order_id: String,
    pub provider_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub captured_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Refund {
    pub id: String,
    pub payment_id: String,
    pub team_id: String,
    pub amount: i64,
    pub reason: String,
    pub processed_by: String,
    pub created_at: DateTime<Utc>,
}

// ── Tournaments ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Tournament {
    pub id: String,
    pub name: String,
    pub game: String,
    pub description: String,
    #[sqlx(try_from = "String")]
    pub status: TournamentStatus,
    pub max_teams: Option<i32>,
    pub entry_fee: i64,
    pub bracket_generated: bool,
    pub provider_tournament_id: Option<String>,
    pub provider_url: Option<String>,
    pub participant_count: i32,
    pub bracket_error: Option<String>,
    pub bracket_failed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTournament {
    pub name: String,
    pub game: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub max_teams: Option<i32>,
    #[serde(default)]
    pub entry_fee: i64,
}

// ── Announcements & settings ────────────────────────────────────

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: String,
    pub title: String,
    pub message: String,
    #[sqlx(try_from = "String")]
    pub priority: AnnouncementPriority,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAnnouncement {
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub priority: AnnouncementPriority,
}

/// Generate a fresh document identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
