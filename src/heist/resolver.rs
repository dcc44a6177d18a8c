//! Outcome Resolver
//!
//! Decides every crew member's fate and applies the consequences.
//!
//! # Rolls
//! Each member rolls independently against the target's success chance.
//! A member who fails rolls again against the guild's death chance:
//! below it they die, otherwise they are apprehended.
//!
//! # Loot
//! The crew can carry `vault × take_ratio` (never more than the vault),
//! split evenly over the whole crew; only escapees keep their share, each
//! plus a random bonus.
//!
//! # Side effects (per member, in order)
//! status transition → loot deposit → vault debit. Failed writes are
//! logged and skipped; nothing already applied is rolled back.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::config::GuildConfig;
use super::member::Member;
use super::session::{CrewMember, HeistId};
use super::target::Target;
use super::theme::Theme;
use crate::core_types::{Credits, GuildId, MemberId};
use crate::ledger::CurrencyLedger;
use crate::persistence::HeistStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OutcomeStatus {
    Escaped,
    Apprehended,
    Dead,
}

/// One member's fate in a resolved heist
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeistOutcome {
    pub member_id: MemberId,
    pub status: OutcomeStatus,
    pub stolen_credits: Credits,
    pub bonus_credits: Credits,
    /// Theme flavour text; empty when the theme has none
    pub message: String,
}

impl HeistOutcome {
    pub fn total(&self) -> Credits {
        self.stolen_credits.saturating_add(self.bonus_credits)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HeistTally {
    pub escaped: usize,
    pub apprehended: usize,
    pub dead: usize,
    /// Loot plus bonuses paid to escapees
    pub total_stolen: Credits,
}

impl HeistTally {
    pub fn from_outcomes(outcomes: &[HeistOutcome]) -> Self {
        outcomes.iter().fold(Self::default(), |mut tally, o| {
            match o.status {
                OutcomeStatus::Escaped => {
                    tally.escaped += 1;
                    tally.total_stolen = tally.total_stolen.saturating_add(o.total());
                }
                OutcomeStatus::Apprehended => tally.apprehended += 1,
                OutcomeStatus::Dead => tally.dead += 1,
            }
            tally
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeistResult {
    pub heist_id: HeistId,
    pub guild_id: GuildId,
    pub target: String,
    pub outcomes: Vec<HeistOutcome>,
    pub tally: HeistTally,
    pub vault_before: Credits,
    pub vault_after: Credits,
}

/// Even split of what the crew can carry out of `vault`
pub fn share_per_member(vault: Credits, take_ratio: f64, crew_size: usize) -> Credits {
    if crew_size == 0 || take_ratio.is_nan() || take_ratio <= 0.0 {
        return 0;
    }
    let take = ((vault as f64) * take_ratio.min(1.0)).floor() as Credits;
    take.min(vault) / crew_size as Credits
}

fn roll_status<R: Rng + ?Sized>(rng: &mut R, success: f64, death_chance: f64) -> OutcomeStatus {
    if rng.gen_range(0.0..100.0) < success {
        OutcomeStatus::Escaped
    } else if rng.gen_range(0.0..100.0) < death_chance {
        OutcomeStatus::Dead
    } else {
        OutcomeStatus::Apprehended
    }
}

fn roll_bonus<R: Rng + ?Sized>(rng: &mut R, config: &GuildConfig) -> Credits {
    if config.bonus_min >= config.bonus_max {
        config.bonus_min
    } else {
        rng.gen_range(config.bonus_min..=config.bonus_max)
    }
}

fn pick_message<R: Rng + ?Sized>(
    rng: &mut R,
    theme: Option<&Theme>,
    status: OutcomeStatus,
) -> String {
    let pool = match (theme, status) {
        (Some(t), OutcomeStatus::Escaped) => t.escaped_messages.as_slice(),
        (Some(t), OutcomeStatus::Apprehended) => t.apprehended_messages.as_slice(),
        (Some(t), OutcomeStatus::Dead) => t.dead_messages.as_slice(),
        (None, _) => &[],
    };
    if pool.is_empty() {
        return String::new();
    }
    pool[rng.gen_range(0..pool.len())].clone()
}

/// Roll every member's fate and loot without touching any state
pub fn plan_outcomes<R: Rng + ?Sized>(
    rng: &mut R,
    crew: &[CrewMember],
    target: &Target,
    config: &GuildConfig,
    theme: Option<&Theme>,
) -> Vec<HeistOutcome> {
    let share = share_per_member(target.vault(), config.take_ratio, crew.len());

    crew.iter()
        .map(|c| {
            let status = roll_status(rng, target.success(), config.death_chance);
            let (stolen_credits, bonus_credits) = match status {
                OutcomeStatus::Escaped => (share, roll_bonus(rng, config)),
                _ => (0, 0),
            };
            HeistOutcome {
                member_id: c.member_id,
                status,
                stolen_credits,
                bonus_credits,
                message: pick_message(rng, theme, status),
            }
        })
        .collect()
}

pub struct OutcomeResolver {
    rng: Mutex<StdRng>,
    store: Arc<dyn HeistStore>,
    ledger: Arc<dyn CurrencyLedger>,
}

impl OutcomeResolver {
    /// `seed` makes every resolution reproducible; `None` seeds from entropy
    pub fn new(
        store: Arc<dyn HeistStore>,
        ledger: Arc<dyn CurrencyLedger>,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
            store,
            ledger,
        }
    }

    /// Resolve a started heist against `target` and apply all side effects.
    ///
    /// The stored copy of the target is preferred over `target` so recovery
    /// ticks since selection are honoured.
    #[allow(clippy::too_many_arguments)]
    pub async fn resolve(
        &self,
        heist_id: HeistId,
        guild_id: GuildId,
        crew: &[CrewMember],
        target: Target,
        config: &GuildConfig,
        theme: Option<&Theme>,
        now: DateTime<Utc>,
    ) -> HeistResult {
        let stored = self
            .store
            .get_target(guild_id, target.theme(), target.name())
            .await;
        let mut target = match stored {
            Ok(Some(stored)) => stored,
            Ok(None) => target,
            Err(e) => {
                warn!(guild_id, target_name = target.name(), error = %e, "Target read failed, using selection copy");
                target
            }
        };
        let vault_before = target.vault();

        let outcomes = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            plan_outcomes(&mut *rng, crew, &target, config, theme)
        };

        for outcome in &outcomes {
            self.apply_status(guild_id, outcome, config, now).await;

            if outcome.status != OutcomeStatus::Escaped {
                continue;
            }

            let loot = outcome.total();
            if let Err(e) = self.ledger.deposit(guild_id, outcome.member_id, loot).await {
                error!(guild_id, member_id = outcome.member_id, loot, error = %e, "Loot deposit failed");
            }

            // The local copy drives the reported result; the stored vault is
            // debited in place so concurrent refills are not overwritten.
            let taken = target.steal(loot);
            match self
                .store
                .steal_from_vault(guild_id, target.theme(), target.name(), loot)
                .await
            {
                Ok(Some(change)) => debug!(
                    guild_id,
                    member_id = outcome.member_id,
                    loot,
                    taken = change.amount,
                    vault = change.vault,
                    "Loot paid"
                ),
                Ok(None) => {
                    if let Err(e) = self.store.put_target(&target).await {
                        warn!(guild_id, target_name = target.name(), error = %e, "Vault debit not persisted");
                    }
                    debug!(guild_id, member_id = outcome.member_id, loot, taken, "Loot paid from unstored target");
                }
                Err(e) => {
                    warn!(guild_id, target_name = target.name(), error = %e, "Vault debit not persisted");
                }
            }
        }

        let tally = HeistTally::from_outcomes(&outcomes);
        info!(
            %heist_id,
            guild_id,
            target_name = target.name(),
            escaped = tally.escaped,
            apprehended = tally.apprehended,
            dead = tally.dead,
            total_stolen = tally.total_stolen,
            vault_before,
            vault_after = target.vault(),
            "Heist resolved"
        );

        HeistResult {
            heist_id,
            guild_id,
            target: target.name().to_string(),
            outcomes,
            tally,
            vault_before,
            vault_after: target.vault(),
        }
    }

    async fn apply_status(
        &self,
        guild_id: GuildId,
        outcome: &HeistOutcome,
        config: &GuildConfig,
        now: DateTime<Utc>,
    ) {
        let mut member = match self.store.get_member(guild_id, outcome.member_id).await {
            Ok(Some(m)) => m,
            Ok(None) => Member::new(guild_id, outcome.member_id),
            Err(e) => {
                // Writing a fresh record here would wipe the member's history.
                error!(guild_id, member_id = outcome.member_id, error = %e, "Member read failed, status not applied");
                return;
            }
        };
        // Lapsed sentences must not count as "out on bail" below.
        member.refresh(now);

        match outcome.status {
            OutcomeStatus::Escaped => member.escape(),
            OutcomeStatus::Apprehended => {
                let sentence = member.apprehend(now, config.sentence_base(), config.bail_base);
                debug!(guild_id, member_id = outcome.member_id, sentence_secs = sentence.as_secs(), bail = member.bail_cost(), "Apprehended");
            }
            OutcomeStatus::Dead => member.kill(now, config.death_duration()),
        }

        if let Err(e) = self.store.put_member(&member).await {
            warn!(guild_id, member_id = outcome.member_id, error = %e, "Member status not persisted");
        }
    }
}
