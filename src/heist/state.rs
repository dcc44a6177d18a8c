//! Heist Session State Definitions

use std::fmt;

use serde::{Deserialize, Serialize};

/// Heist session lifecycle
///
/// ```text
/// PLANNING → ACTIVE → COMPLETED
///     ↓
/// CANCELLED
/// ```
///
/// Terminal: COMPLETED (20), CANCELLED (-10)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i16)]
pub enum HeistState {
    /// Crew is assembling; joins are accepted
    Planning = 0,

    /// Target chosen, outcomes being resolved; joins rejected
    Active = 10,

    /// Terminal: outcomes resolved and paid out
    Completed = 20,

    /// Terminal: not enough crew, or reset by an admin
    Cancelled = -10,
}

impl HeistState {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, HeistState::Completed | HeistState::Cancelled)
    }

    /// Get the numeric state ID
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    /// Convert from numeric state ID
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(HeistState::Planning),
            10 => Some(HeistState::Active),
            20 => Some(HeistState::Completed),
            -10 => Some(HeistState::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HeistState::Planning => "PLANNING",
            HeistState::Active => "ACTIVE",
            HeistState::Completed => "COMPLETED",
            HeistState::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for HeistState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
