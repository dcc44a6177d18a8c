//! Heist Error Types
//!
//! Errors carry the data a caller needs to render a message; no text
//! formatting beyond the developer-facing `Display` happens here.

use std::time::Duration;

use thiserror::Error;

use super::state::HeistState;
use crate::core_types::Credits;
use crate::ledger::LedgerError;

/// Reasons a member may not start or join a heist
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Ineligible {
    #[error("Already in the crew")]
    AlreadyJoined,

    #[error("In jail for another {remaining:?} (bail {bail_cost})")]
    InJail {
        remaining: Duration,
        bail_cost: Credits,
    },

    #[error("Dead for another {remaining:?}")]
    Dead { remaining: Duration },

    #[error("Police are on alert for another {remaining:?}")]
    PoliceAlert { remaining: Duration },

    #[error("Insufficient credits: {needed} needed")]
    InsufficientCredits { needed: Credits },
}

/// Heist error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HeistError {
    #[error("A heist is already in progress")]
    AlreadyInProgress,

    #[error("Not eligible: {0}")]
    NotEligible(#[from] Ineligible),

    #[error("No heist in progress")]
    NoHeist,

    #[error("Heist is {0}, not planning")]
    NotPlanning(HeistState),

    #[error("No targets configured")]
    NoTargets,

    #[error("Theme not found: {0}")]
    ThemeNotFound(String),

    #[error("Member is not in jail")]
    NoBail,

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Ledger error: {0}")]
    Ledger(String),
}

impl HeistError {
    /// Get the error code for the presentation layer
    pub fn code(&self) -> &'static str {
        match self {
            HeistError::AlreadyInProgress => "ALREADY_IN_PROGRESS",
            HeistError::NotEligible(reason) => match reason {
                Ineligible::AlreadyJoined => "ALREADY_JOINED",
                Ineligible::InJail { .. } => "IN_JAIL",
                Ineligible::Dead { .. } => "DEAD",
                Ineligible::PoliceAlert { .. } => "POLICE_ALERT",
                Ineligible::InsufficientCredits { .. } => "INSUFFICIENT_CREDITS",
            },
            HeistError::NoHeist => "NO_HEIST",
            HeistError::NotPlanning(_) => "NOT_PLANNING",
            HeistError::NoTargets => "NO_TARGETS",
            HeistError::ThemeNotFound(_) => "THEME_NOT_FOUND",
            HeistError::NoBail => "NO_BAIL",
            HeistError::InvalidConfig(_) => "INVALID_CONFIG",
            HeistError::Storage(_) => "STORAGE_ERROR",
            HeistError::Ledger(_) => "LEDGER_ERROR",
        }
    }

    /// Eligibility failures are expected gameplay outcomes, not faults
    pub fn is_eligibility(&self) -> bool {
        matches!(self, HeistError::NotEligible(_))
    }

    /// Map a failed withdrawal of `needed` credits
    pub(crate) fn from_withdraw(err: LedgerError, needed: Credits) -> Self {
        match err {
            LedgerError::InsufficientFunds { .. } | LedgerError::AccountNotFound => {
                Ineligible::InsufficientCredits { needed }.into()
            }
            other => HeistError::Ledger(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for HeistError {
    fn from(e: anyhow::Error) -> Self {
        HeistError::Storage(e.to_string())
    }
}
