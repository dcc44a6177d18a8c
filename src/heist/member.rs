//! Member criminal record
//!
//! Per-guild, per-user record that survives across heists. The status is a
//! tagged variant so the jail and death timers can never both be live.
//!
//! # State Machine
//!
//! ```text
//!            apprehend                 post bail
//! FREE ─────────────────▶ APPREHENDED ───────────▶ OUT_ON_BAIL
//!  ▲  ◀── sentence served ──┘  │                      │
//!  │                           │ apprehend (bail ×3) ◀┘
//!  │         kill              ▼
//!  └──── death served ───── DEAD  ◀── kill (from any non-dead state)
//! ```

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::core_types::{Credits, GuildId, MemberId};

/// Bail multiplier for a member recaptured while out on bail
pub const BAIL_ESCALATION: Credits = 3;

/// Criminal status (exactly one at a time)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CriminalStatus {
    Free,
    /// Serving a sentence until `until`; may post `bail_cost` to leave early
    Apprehended {
        until: DateTime<Utc>,
        bail_cost: Credits,
    },
    /// Bailed out; recapture before `until` triples the bail
    OutOnBail { until: DateTime<Utc> },
    Dead { until: DateTime<Utc> },
}

impl CriminalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CriminalStatus::Free => "FREE",
            CriminalStatus::Apprehended { .. } => "APPREHENDED",
            CriminalStatus::OutOnBail { .. } => "OUT_ON_BAIL",
            CriminalStatus::Dead { .. } => "DEAD",
        }
    }
}

impl fmt::Display for CriminalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Named rank derived from the criminal level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CriminalTier {
    Greenhorn,
    Renegade,
    Veteran,
    Commander,
    WarChief,
    Legend,
    Immortal,
}

impl CriminalTier {
    pub fn from_level(level: u32) -> Self {
        match level {
            0 => CriminalTier::Greenhorn,
            1..=9 => CriminalTier::Renegade,
            10..=24 => CriminalTier::Veteran,
            25..=49 => CriminalTier::Commander,
            50..=74 => CriminalTier::WarChief,
            75..=99 => CriminalTier::Legend,
            _ => CriminalTier::Immortal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CriminalTier::Greenhorn => "Greenhorn",
            CriminalTier::Renegade => "Renegade",
            CriminalTier::Veteran => "Veteran",
            CriminalTier::Commander => "Commander",
            CriminalTier::WarChief => "War Chief",
            CriminalTier::Legend => "Legend",
            CriminalTier::Immortal => "Immortal",
        }
    }
}

impl fmt::Display for CriminalTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `now + d`, saturating at the far future
pub(crate) fn deadline_after(now: DateTime<Utc>, d: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(d)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// `max(0, until - now)`
pub(crate) fn remaining_until(until: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (until - now).to_std().unwrap_or(Duration::ZERO)
}

/// A member's criminal record in one guild
///
/// # Invariants (enforced by private fields):
/// - criminal_level only grows, except death resets it
/// - total_jail only grows
/// - status transitions only through the methods below
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    guild_id: GuildId,
    member_id: MemberId,
    status: CriminalStatus,
    criminal_level: u32,
    spree: u32,
    jail_counter: u32,
    total_jail: u32,
    #[serde(default)]
    deaths: u32,
    #[serde(default)]
    heists: u32,
}

impl Member {
    pub fn new(guild_id: GuildId, member_id: MemberId) -> Self {
        Self {
            guild_id,
            member_id,
            status: CriminalStatus::Free,
            criminal_level: 0,
            spree: 0,
            jail_counter: 0,
            total_jail: 0,
            deaths: 0,
            heists: 0,
        }
    }

    // ============================================================
    // READ-ONLY GETTERS
    // ============================================================

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn member_id(&self) -> MemberId {
        self.member_id
    }

    pub fn status(&self) -> CriminalStatus {
        self.status
    }

    pub fn criminal_level(&self) -> u32 {
        self.criminal_level
    }

    pub fn tier(&self) -> CriminalTier {
        CriminalTier::from_level(self.criminal_level)
    }

    /// Consecutive escapes
    pub fn spree(&self) -> u32 {
        self.spree
    }

    /// Captures since the last death or admin clear
    pub fn jail_counter(&self) -> u32 {
        self.jail_counter
    }

    /// Lifetime captures
    pub fn total_jail(&self) -> u32 {
        self.total_jail
    }

    pub fn deaths(&self) -> u32 {
        self.deaths
    }

    pub fn heists(&self) -> u32 {
        self.heists
    }

    /// Bail owed; zero unless apprehended
    pub fn bail_cost(&self) -> Credits {
        match self.status {
            CriminalStatus::Apprehended { bail_cost, .. } => bail_cost,
            _ => 0,
        }
    }

    /// Time left in jail. Zero once out on bail.
    pub fn remaining_jail_time(&self, now: DateTime<Utc>) -> Duration {
        match self.status {
            CriminalStatus::Apprehended { until, .. } => remaining_until(until, now),
            _ => Duration::ZERO,
        }
    }

    pub fn remaining_death_time(&self, now: DateTime<Utc>) -> Duration {
        match self.status {
            CriminalStatus::Dead { until } => remaining_until(until, now),
            _ => Duration::ZERO,
        }
    }

    // ============================================================
    // TRANSITIONS
    // ============================================================

    /// Release the member from any status whose timer has run out.
    ///
    /// Returns true if the record changed and should be persisted.
    pub fn refresh(&mut self, now: DateTime<Utc>) -> bool {
        let expired = match self.status {
            CriminalStatus::Free => false,
            CriminalStatus::Apprehended { until, .. }
            | CriminalStatus::OutOnBail { until }
            | CriminalStatus::Dead { until } => remaining_until(until, now).is_zero(),
        };
        if expired {
            self.status = CriminalStatus::Free;
        }
        expired
    }

    /// Capture during resolution. Returns the sentence served.
    ///
    /// The sentence grows with every capture since the last clear, and the
    /// bail triples if the member is still skipping a sentence on bail.
    /// Any unserved time from an earlier sentence is replaced, not added.
    pub fn apprehend(
        &mut self,
        now: DateTime<Utc>,
        sentence_base: Duration,
        bail_base: Credits,
    ) -> Duration {
        let sentence = sentence_base.saturating_mul(self.jail_counter.saturating_add(1));
        let bail_cost = match self.status {
            CriminalStatus::OutOnBail { until } if until > now => {
                bail_base.saturating_mul(BAIL_ESCALATION)
            }
            _ => bail_base,
        };

        self.jail_counter = self.jail_counter.saturating_add(1);
        self.total_jail = self.total_jail.saturating_add(1);
        self.criminal_level = self.criminal_level.saturating_add(1);
        self.spree = 0;
        self.heists = self.heists.saturating_add(1);
        self.status = CriminalStatus::Apprehended {
            until: deadline_after(now, sentence),
            bail_cost,
        };
        sentence
    }

    /// Death during resolution: wipes rank and jail history
    pub fn kill(&mut self, now: DateTime<Utc>, death_duration: Duration) {
        self.criminal_level = 0;
        self.jail_counter = 0;
        self.spree = 0;
        self.deaths = self.deaths.saturating_add(1);
        self.heists = self.heists.saturating_add(1);
        self.status = CriminalStatus::Dead {
            until: deadline_after(now, death_duration),
        };
    }

    /// Escape during resolution
    pub fn escape(&mut self) {
        self.spree = self.spree.saturating_add(1);
        self.heists = self.heists.saturating_add(1);
    }

    /// Leave jail early after bail has been paid.
    ///
    /// Returns false (no change) unless the member is serving time.
    pub fn release_on_bail(&mut self, now: DateTime<Utc>) -> bool {
        match self.status {
            CriminalStatus::Apprehended { until, .. } if until > now => {
                self.status = CriminalStatus::OutOnBail { until };
                true
            }
            _ => false,
        }
    }

    /// Administrative clear
    pub fn clear(&mut self) {
        self.status = CriminalStatus::Free;
        self.jail_counter = 0;
    }
}
