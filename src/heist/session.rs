//! Heist Session
//!
//! One heist in a guild, from planning to its terminal state. Identity and
//! the config snapshot are immutable; the lifecycle state, crew and chosen
//! target sit behind the session's own lock so joins and `Start` serialize.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard, broadcast};
use tokio::time::Instant;

use super::config::GuildConfig;
use super::member::deadline_after;
use super::state::HeistState;
use super::target::Target;
use crate::core_types::{GuildId, MemberId};

const EVENT_BUFFER: usize = 32;

/// Heist ID - ULID, sortable by creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct HeistId(ulid::Ulid);

impl HeistId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }
}

impl Default for HeistId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HeistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for HeistId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CrewMember {
    pub member_id: MemberId,
    pub joined_at: DateTime<Utc>,
}

/// Pushed to planning-window waiters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    CrewJoined { member_id: MemberId, crew_size: usize },
    Cancelled,
}

/// Immutable view of a session for rendering
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub heist_id: HeistId,
    pub guild_id: GuildId,
    pub organizer_id: MemberId,
    pub state: HeistState,
    pub crew: Vec<CrewMember>,
    pub started_at: DateTime<Utc>,
    pub planning_ends_at: DateTime<Utc>,
    pub target: Option<String>,
    pub config: GuildConfig,
}

impl SessionSnapshot {
    pub fn crew_size(&self) -> usize {
        self.crew.len()
    }
}

#[derive(Debug)]
pub(crate) struct SessionInner {
    pub(crate) state: HeistState,
    pub(crate) crew: Vec<CrewMember>,
    pub(crate) target: Option<Target>,
}

impl SessionInner {
    pub(crate) fn has_member(&self, member_id: MemberId) -> bool {
        self.crew.iter().any(|c| c.member_id == member_id)
    }
}

#[derive(Debug)]
pub struct HeistSession {
    id: HeistId,
    guild_id: GuildId,
    organizer_id: MemberId,
    started_at: DateTime<Utc>,
    deadline: Instant,
    config: GuildConfig,
    inner: Mutex<SessionInner>,
    events: broadcast::Sender<SessionEvent>,
}

impl HeistSession {
    /// New planning session with the organizer as the first crew member
    pub fn new(
        guild_id: GuildId,
        organizer_id: MemberId,
        config: GuildConfig,
        now: DateTime<Utc>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            id: HeistId::new(),
            guild_id,
            organizer_id,
            started_at: now,
            deadline: Instant::now() + config.planning_wait(),
            config,
            inner: Mutex::new(SessionInner {
                state: HeistState::Planning,
                crew: vec![CrewMember {
                    member_id: organizer_id,
                    joined_at: now,
                }],
                target: None,
            }),
            events,
        }
    }

    pub fn id(&self) -> HeistId {
        self.id
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn organizer_id(&self) -> MemberId {
        self.organizer_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn config(&self) -> &GuildConfig {
        &self.config
    }

    /// Monotonic instant at which planning ends
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn planning_ends_at(&self) -> DateTime<Utc> {
        deadline_after(self.started_at, self.config.planning_wait())
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().await
    }

    pub(crate) fn try_lock(&self) -> Option<MutexGuard<'_, SessionInner>> {
        self.inner.try_lock().ok()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Best effort: no receivers is not an error
    pub(crate) fn notify(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    pub async fn state(&self) -> HeistState {
        self.inner.lock().await.state
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock().await;
        self.snapshot_locked(&inner)
    }

    pub(crate) fn snapshot_locked(&self, inner: &SessionInner) -> SessionSnapshot {
        SessionSnapshot {
            heist_id: self.id,
            guild_id: self.guild_id,
            organizer_id: self.organizer_id,
            state: inner.state,
            crew: inner.crew.clone(),
            started_at: self.started_at,
            planning_ends_at: self.planning_ends_at(),
            target: inner.target.as_ref().map(|t| t.name().to_string()),
            config: self.config.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_session_has_organizer() {
        let now = Utc::now();
        let session = HeistSession::new(1, 42, GuildConfig::default(), now);

        let snap = session.snapshot().await;
        assert_eq!(snap.state, HeistState::Planning);
        assert_eq!(snap.crew_size(), 1);
        assert_eq!(snap.crew[0].member_id, 42);
        assert_eq!(snap.organizer_id, 42);
        assert!(snap.target.is_none());
        assert_eq!(
            (snap.planning_ends_at - snap.started_at).num_seconds(),
            GuildConfig::default().planning_wait_secs as i64
        );
    }

    #[tokio::test]
    async fn test_events_reach_subscribers() {
        let session = HeistSession::new(1, 42, GuildConfig::default(), Utc::now());
        let mut rx = session.subscribe();

        session.notify(SessionEvent::CrewJoined {
            member_id: 7,
            crew_size: 2,
        });
        session.notify(SessionEvent::Cancelled);

        assert_eq!(
            rx.recv().await.unwrap(),
            SessionEvent::CrewJoined {
                member_id: 7,
                crew_size: 2
            }
        );
        assert_eq!(rx.recv().await.unwrap(), SessionEvent::Cancelled);
    }

    #[test]
    fn test_heist_id_parse() {
        let id = HeistId::new();
        let parsed: HeistId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }
}
