//! Heist Registry
//!
//! Owns every live session, keyed by guild, and drives the lifecycle:
//!
//! ```text
//! start_heist ──▶ PLANNING ──(join_heist)*──▶ start ──▶ ACTIVE ──▶ COMPLETED
//!                    │                          │
//!                    └──── reset ─────▶ CANCELLED ◀── crew < 2 / no targets
//! ```
//!
//! At most one non-terminal session exists per guild. Terminal sessions are
//! retired from the map immediately, so presence in the map means "live".
//!
//! Lock order: a session's own lock may be held across collaborator calls;
//! map guards never are.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::config::{ConfigPatch, GuildConfig};
use super::error::{HeistError, Ineligible};
use super::member::{CriminalStatus, CriminalTier, Member, deadline_after, remaining_until};
use super::resolver::{HeistResult, OutcomeResolver};
use super::session::{CrewMember, HeistId, HeistSession, SessionEvent, SessionSnapshot};
use super::state::HeistState;
use super::target::{Target, select_target};
use super::theme::ThemeCatalog;
use crate::core_types::{Credits, GuildId, MemberId};
use crate::ledger::{CurrencyLedger, LedgerError};
use crate::persistence::HeistStore;

/// Smallest crew that can pull a heist
pub const MIN_CREW: usize = 2;

/// Upper bound on the gap between planning status updates
pub const MAX_STATUS_TICK: Duration = Duration::from_secs(5);

const MIN_STATUS_TICK: Duration = Duration::from_millis(10);

/// How a planning-window wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanningOutcome {
    /// The window ran out with the session still planning
    Elapsed,
    /// The session was reset or cancelled while waiting
    Cancelled,
    /// Someone else already started the session
    AlreadyStarted,
}

/// What `start` did with the session
#[derive(Debug, Clone, PartialEq)]
pub enum HeistReport {
    /// Not enough crew; entry fees are kept
    Cancelled { heist_id: HeistId, crew_size: usize },
    Completed(HeistResult),
}

/// A member record with its derived, display-ready values
#[derive(Debug, Clone, PartialEq)]
pub struct MemberStats {
    pub member: Member,
    pub tier: CriminalTier,
    pub remaining_jail: Duration,
    pub remaining_death: Duration,
    pub bail_cost: Credits,
}

pub struct HeistRegistry {
    sessions: DashMap<GuildId, Arc<HeistSession>>,
    /// Police alert expiry per guild
    alerts: DashMap<GuildId, DateTime<Utc>>,
    store: Arc<dyn HeistStore>,
    ledger: Arc<dyn CurrencyLedger>,
    themes: Arc<ThemeCatalog>,
    defaults: GuildConfig,
    resolver: OutcomeResolver,
    status_interval: Duration,
}

impl HeistRegistry {
    /// `defaults` seeds the config of guilds seen for the first time;
    /// `rng_seed` makes outcome rolls reproducible.
    pub fn new(
        store: Arc<dyn HeistStore>,
        ledger: Arc<dyn CurrencyLedger>,
        themes: Arc<ThemeCatalog>,
        defaults: GuildConfig,
        rng_seed: Option<u64>,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            alerts: DashMap::new(),
            resolver: OutcomeResolver::new(store.clone(), ledger.clone(), rng_seed),
            store,
            ledger,
            themes,
            defaults,
            status_interval: MAX_STATUS_TICK,
        }
    }

    /// Interval between planning status updates, clamped to `MAX_STATUS_TICK`
    pub fn with_status_interval(mut self, interval: Duration) -> Self {
        self.status_interval = interval.clamp(MIN_STATUS_TICK, MAX_STATUS_TICK);
        self
    }

    pub fn themes(&self) -> &ThemeCatalog {
        &self.themes
    }

    /// Number of live (non-terminal) sessions
    pub fn active_heists(&self) -> usize {
        self.sessions.len()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Open a planning session with the organizer as its first crew member.
    ///
    /// The organizer passes the same checks as a joining member and pays the
    /// entry cost; if the charge fails the session is never exposed.
    pub async fn start_heist(
        &self,
        guild_id: GuildId,
        organizer_id: MemberId,
    ) -> Result<SessionSnapshot, HeistError> {
        if self.sessions.contains_key(&guild_id) {
            return Err(HeistError::AlreadyInProgress);
        }

        let now = Utc::now();
        let config = self.guild_config(guild_id).await?;
        if self.targets_for(guild_id, &config.theme).await?.is_empty() {
            return Err(HeistError::NoTargets);
        }

        let member = self.load_member(guild_id, organizer_id, now).await?;
        self.check_eligibility(&member, now)?;
        self.check_funds(guild_id, organizer_id, config.entry_cost)
            .await?;

        let entry_cost = config.entry_cost;
        let session = Arc::new(HeistSession::new(guild_id, organizer_id, config, now));
        let mut inner = session.lock().await;

        match self.sessions.entry(guild_id) {
            Entry::Occupied(_) => return Err(HeistError::AlreadyInProgress),
            Entry::Vacant(slot) => {
                slot.insert(session.clone());
            }
        }

        if let Err(e) = self.ledger.withdraw(guild_id, organizer_id, entry_cost).await {
            inner.state = HeistState::Cancelled;
            drop(inner);
            self.retire(&session);
            session.notify(SessionEvent::Cancelled);
            warn!(guild_id, member_id = organizer_id, error = %e, "Entry fee charge failed, heist aborted");
            return Err(HeistError::from_withdraw(e, entry_cost));
        }

        let snapshot = session.snapshot_locked(&inner);
        info!(
            heist_id = %session.id(),
            guild_id,
            organizer_id,
            entry_cost,
            planning_secs = session.config().planning_wait_secs,
            "Heist planning started"
        );
        Ok(snapshot)
    }

    /// Add a member to the planning crew.
    ///
    /// Checks run in a fixed order and the first failure is returned:
    /// already joined, jailed, dead, police alert, balance.
    pub async fn join_heist(
        &self,
        guild_id: GuildId,
        member_id: MemberId,
    ) -> Result<SessionSnapshot, HeistError> {
        let session = self.active_session(guild_id).ok_or(HeistError::NoHeist)?;
        let now = Utc::now();
        let entry_cost = session.config().entry_cost;

        let mut inner = session.lock().await;
        if inner.state != HeistState::Planning {
            return Err(HeistError::NotPlanning(inner.state));
        }
        if inner.has_member(member_id) {
            return Err(Ineligible::AlreadyJoined.into());
        }

        let member = self.load_member(guild_id, member_id, now).await?;
        self.check_eligibility(&member, now)?;
        self.check_funds(guild_id, member_id, entry_cost).await?;
        self.ledger
            .withdraw(guild_id, member_id, entry_cost)
            .await
            .map_err(|e| HeistError::from_withdraw(e, entry_cost))?;

        // Reset does not wait for this lock; the slot may be gone by now.
        if !self.is_current(guild_id, session.id()) {
            if let Err(e) = self.ledger.deposit(guild_id, member_id, entry_cost).await {
                error!(heist_id = %session.id(), guild_id, member_id, error = %e, "Entry fee refund failed");
            }
            warn!(heist_id = %session.id(), guild_id, member_id, "Heist reset during join, entry fee refunded");
            return Err(HeistError::NoHeist);
        }

        inner.crew.push(CrewMember {
            member_id,
            joined_at: now,
        });
        let crew_size = inner.crew.len();
        let snapshot = session.snapshot_locked(&inner);
        drop(inner);

        session.notify(SessionEvent::CrewJoined {
            member_id,
            crew_size,
        });
        info!(heist_id = %session.id(), guild_id, member_id, crew_size, "Member joined crew");
        Ok(snapshot)
    }

    /// Wait until the planning window closes.
    ///
    /// `on_update` receives a fresh snapshot on every wake: at least every
    /// status tick and whenever someone joins. Returns early, without
    /// error, when the session is reset or started by someone else.
    pub async fn wait_for_planning_window<F>(
        &self,
        guild_id: GuildId,
        mut on_update: F,
    ) -> Result<PlanningOutcome, HeistError>
    where
        F: FnMut(&SessionSnapshot),
    {
        let session = self.active_session(guild_id).ok_or(HeistError::NoHeist)?;
        let heist_id = session.id();
        let deadline = session.deadline();
        let mut events = session.subscribe();
        let mut ticker = tokio::time::interval(self.status_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let elapsed = tokio::select! {
                _ = tokio::time::sleep_until(deadline) => true,
                _ = ticker.tick() => false,
                event = events.recv() => match event {
                    Ok(SessionEvent::Cancelled) => {
                        debug!(%heist_id, guild_id, "Planning wait cancelled");
                        return Ok(PlanningOutcome::Cancelled);
                    }
                    Ok(SessionEvent::CrewJoined { .. }) => false,
                    // Lagging only skips joins; the snapshot below catches up.
                    Err(RecvError::Lagged(_)) | Err(RecvError::Closed) => false,
                },
            };

            if !self.is_current(guild_id, heist_id) {
                debug!(%heist_id, guild_id, "Session gone, planning wait ends");
                return Ok(PlanningOutcome::Cancelled);
            }

            let snapshot = session.snapshot().await;
            match snapshot.state {
                HeistState::Planning => {}
                HeistState::Cancelled => return Ok(PlanningOutcome::Cancelled),
                HeistState::Active | HeistState::Completed => {
                    return Ok(PlanningOutcome::AlreadyStarted);
                }
            }

            if elapsed {
                return Ok(PlanningOutcome::Elapsed);
            }
            on_update(&snapshot);
        }
    }

    /// Close planning and run the heist.
    ///
    /// A crew smaller than `MIN_CREW` cancels the session. Otherwise the
    /// target is chosen, every member's outcome applied, and the guild put
    /// on police alert. The session is retired either way.
    pub async fn start(&self, guild_id: GuildId) -> Result<HeistReport, HeistError> {
        let session = self.active_session(guild_id).ok_or(HeistError::NoHeist)?;
        let heist_id = session.id();
        let config = session.config().clone();

        let (crew, target) = {
            let mut inner = session.lock().await;
            if inner.state != HeistState::Planning {
                return Err(HeistError::NotPlanning(inner.state));
            }

            let crew_size = inner.crew.len();
            if crew_size < MIN_CREW {
                inner.state = HeistState::Cancelled;
                drop(inner);
                self.retire(&session);
                session.notify(SessionEvent::Cancelled);
                info!(%heist_id, guild_id, crew_size, "Heist cancelled, not enough crew");
                return Ok(HeistReport::Cancelled {
                    heist_id,
                    crew_size,
                });
            }

            let targets = self.targets_for(guild_id, &config.theme).await?;
            let Some(target) = select_target(&targets, crew_size).cloned() else {
                inner.state = HeistState::Cancelled;
                drop(inner);
                self.retire(&session);
                session.notify(SessionEvent::Cancelled);
                warn!(%heist_id, guild_id, theme = %config.theme, "Heist cancelled, no targets");
                return Err(HeistError::NoTargets);
            };

            inner.state = HeistState::Active;
            inner.target = Some(target.clone());
            info!(
                %heist_id,
                guild_id,
                crew_size,
                target_name = target.name(),
                success = target.success(),
                "Heist active"
            );
            (inner.crew.clone(), target)
        };

        let theme = self.themes.get(&config.theme);
        let result = self
            .resolver
            .resolve(heist_id, guild_id, &crew, target, &config, theme, Utc::now())
            .await;

        {
            let mut inner = session.lock().await;
            if inner.state == HeistState::Active {
                inner.state = HeistState::Completed;
            }
        }

        let alert_until = deadline_after(Utc::now(), config.police_alert());
        self.alerts.insert(guild_id, alert_until);
        self.retire(&session);
        debug!(%heist_id, guild_id, %alert_until, "Police alert raised");

        Ok(HeistReport::Completed(result))
    }

    /// Wait out the planning window, then start.
    ///
    /// `None` when the session was reset or started elsewhere meanwhile.
    pub async fn run_heist<F>(
        &self,
        guild_id: GuildId,
        on_update: F,
    ) -> Result<Option<HeistReport>, HeistError>
    where
        F: FnMut(&SessionSnapshot),
    {
        match self.wait_for_planning_window(guild_id, on_update).await? {
            PlanningOutcome::Elapsed => self.start(guild_id).await.map(Some),
            PlanningOutcome::Cancelled | PlanningOutcome::AlreadyStarted => Ok(None),
        }
    }

    /// Remove the guild's session whatever its state.
    ///
    /// Never blocks on the session: a heist being resolved keeps running
    /// but loses its slot, so a new one may be planned right away.
    pub fn reset(&self, guild_id: GuildId) -> Result<HeistId, HeistError> {
        let (_, session) = self
            .sessions
            .remove(&guild_id)
            .ok_or(HeistError::NoHeist)?;

        if let Some(mut inner) = session.try_lock()
            && !inner.state.is_terminal()
        {
            inner.state = HeistState::Cancelled;
        }
        session.notify(SessionEvent::Cancelled);
        info!(heist_id = %session.id(), guild_id, "Heist reset");
        Ok(session.id())
    }

    pub async fn session_snapshot(&self, guild_id: GuildId) -> Option<SessionSnapshot> {
        let session = self.active_session(guild_id)?;
        Some(session.snapshot().await)
    }

    /// Police alert time left for the guild, zero when none
    pub fn police_alert_remaining(&self, guild_id: GuildId) -> Duration {
        self.alert_remaining(guild_id, Utc::now())
    }

    // ========================================================================
    // Members
    // ========================================================================

    /// Pay the member's bail and let them out for the rest of the sentence.
    pub async fn pay_bail(
        &self,
        guild_id: GuildId,
        member_id: MemberId,
    ) -> Result<Member, HeistError> {
        let now = Utc::now();
        let mut member = self.load_member(guild_id, member_id, now).await?;
        let CriminalStatus::Apprehended { bail_cost, .. } = member.status() else {
            return Err(HeistError::NoBail);
        };

        self.ledger
            .withdraw(guild_id, member_id, bail_cost)
            .await
            .map_err(|e| HeistError::from_withdraw(e, bail_cost))?;

        if !member.release_on_bail(now) {
            // Sentence ran out between the load and the charge.
            member.refresh(now);
        }
        self.save_member(&member).await;
        info!(guild_id, member_id, bail_cost, status = %member.status(), "Bail paid");
        Ok(member)
    }

    pub async fn member_stats(
        &self,
        guild_id: GuildId,
        member_id: MemberId,
    ) -> Result<MemberStats, HeistError> {
        let now = Utc::now();
        let member = self.load_member(guild_id, member_id, now).await?;
        Ok(MemberStats {
            tier: member.tier(),
            remaining_jail: member.remaining_jail_time(now),
            remaining_death: member.remaining_death_time(now),
            bail_cost: member.bail_cost(),
            member,
        })
    }

    /// Administrative clear: frees the member and resets their jail counter
    pub async fn clear_member(
        &self,
        guild_id: GuildId,
        member_id: MemberId,
    ) -> Result<Member, HeistError> {
        let mut member = self.load_member(guild_id, member_id, Utc::now()).await?;
        member.clear();
        self.save_member(&member).await;
        info!(guild_id, member_id, "Member record cleared");
        Ok(member)
    }

    // ========================================================================
    // Guild settings
    // ========================================================================

    /// The guild's config, created from the defaults on first use
    pub async fn guild_config(&self, guild_id: GuildId) -> Result<GuildConfig, HeistError> {
        if let Some(config) = self.store.get_config(guild_id).await? {
            return Ok(config);
        }
        let config = self.defaults.clone();
        if let Err(e) = self.store.put_config(guild_id, &config).await {
            warn!(guild_id, error = %e, "Default guild config not persisted");
        }
        Ok(config)
    }

    /// Apply an admin patch. Sessions already planning keep their snapshot.
    pub async fn update_config(
        &self,
        guild_id: GuildId,
        patch: &ConfigPatch,
    ) -> Result<GuildConfig, HeistError> {
        let next = patch.apply(&self.guild_config(guild_id).await?)?;
        self.store.put_config(guild_id, &next).await?;
        info!(guild_id, ?patch, "Guild config updated");
        Ok(next)
    }

    /// Switch the guild to another theme, seeding its targets if needed
    pub async fn set_theme(
        &self,
        guild_id: GuildId,
        theme: &str,
    ) -> Result<GuildConfig, HeistError> {
        if self.themes.get(theme).is_none() {
            return Err(HeistError::ThemeNotFound(theme.to_string()));
        }
        let mut config = self.guild_config(guild_id).await?;
        config.theme = theme.to_string();
        self.store.put_config(guild_id, &config).await?;
        self.targets_for(guild_id, theme).await?;
        info!(guild_id, theme, "Guild theme changed");
        Ok(config)
    }

    /// Targets of the guild's current theme, ordered by crew threshold
    pub async fn list_targets(&self, guild_id: GuildId) -> Result<Vec<Target>, HeistError> {
        let config = self.guild_config(guild_id).await?;
        self.targets_for(guild_id, &config.theme).await
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn active_session(&self, guild_id: GuildId) -> Option<Arc<HeistSession>> {
        self.sessions.get(&guild_id).map(|s| s.value().clone())
    }

    fn is_current(&self, guild_id: GuildId, heist_id: HeistId) -> bool {
        self.sessions
            .get(&guild_id)
            .is_some_and(|s| s.id() == heist_id)
    }

    /// Drop the session from the map unless a newer one took the slot
    fn retire(&self, session: &HeistSession) {
        let heist_id = session.id();
        self.sessions
            .remove_if(&session.guild_id(), |_, s| s.id() == heist_id);
    }

    fn alert_remaining(&self, guild_id: GuildId, now: DateTime<Utc>) -> Duration {
        let remaining = self
            .alerts
            .get(&guild_id)
            .map(|until| remaining_until(*until, now))
            .unwrap_or(Duration::ZERO);
        if remaining.is_zero() {
            self.alerts.remove_if(&guild_id, |_, until| *until <= now);
        }
        remaining
    }

    /// Member-level checks shared by organizer and joiners
    fn check_eligibility(&self, member: &Member, now: DateTime<Utc>) -> Result<(), Ineligible> {
        let remaining = member.remaining_jail_time(now);
        if !remaining.is_zero() {
            return Err(Ineligible::InJail {
                remaining,
                bail_cost: member.bail_cost(),
            });
        }

        let remaining = member.remaining_death_time(now);
        if !remaining.is_zero() {
            return Err(Ineligible::Dead { remaining });
        }

        let remaining = self.alert_remaining(member.guild_id(), now);
        if !remaining.is_zero() {
            return Err(Ineligible::PoliceAlert { remaining });
        }
        Ok(())
    }

    async fn check_funds(
        &self,
        guild_id: GuildId,
        member_id: MemberId,
        needed: Credits,
    ) -> Result<(), HeistError> {
        match self.ledger.get_account(guild_id, member_id).await {
            Ok(account) if account.balance >= needed => Ok(()),
            Ok(_) => Err(Ineligible::InsufficientCredits { needed }.into()),
            Err(LedgerError::AccountNotFound) if needed == 0 => Ok(()),
            Err(e) => Err(HeistError::from_withdraw(e, needed)),
        }
    }

    /// Load (or create) a member and release them from any expired timer
    async fn load_member(
        &self,
        guild_id: GuildId,
        member_id: MemberId,
        now: DateTime<Utc>,
    ) -> Result<Member, HeistError> {
        let (mut member, dirty) = match self.store.get_member(guild_id, member_id).await? {
            Some(member) => (member, false),
            None => (Member::new(guild_id, member_id), true),
        };
        if member.refresh(now) || dirty {
            self.save_member(&member).await;
        }
        Ok(member)
    }

    async fn save_member(&self, member: &Member) {
        if let Err(e) = self.store.put_member(member).await {
            warn!(
                guild_id = member.guild_id(),
                member_id = member.member_id(),
                error = %e,
                "Member record not persisted"
            );
        }
    }

    /// Stored targets for the theme, seeded from the catalog when empty
    async fn targets_for(&self, guild_id: GuildId, theme: &str) -> Result<Vec<Target>, HeistError> {
        let targets = self.store.list_targets(guild_id, theme).await?;
        if !targets.is_empty() {
            return Ok(targets);
        }

        let Some(theme) = self.themes.get(theme) else {
            return Ok(Vec::new());
        };
        let seeded = theme.seed_targets(guild_id);
        for target in &seeded {
            if let Err(e) = self.store.put_target(target).await {
                warn!(guild_id, target_name = target.name(), error = %e, "Seeded target not persisted");
            }
        }
        debug!(guild_id, theme = %theme.name, count = seeded.len(), "Targets seeded");

        let mut seeded = seeded;
        seeded.sort_by_key(|t| t.crew_threshold());
        Ok(seeded)
    }
}
