//! Crew Heist - cooperative timed heists for chat communities
//!
//! Members plan a raid, a crew assembles within a time window, each member
//! resolves independently, and winners split loot from a slowly refilling
//! target vault.
//!
//! # Modules
//!
//! - [`core_types`] - Core identifiers (GuildId, MemberId, Credits)
//! - [`balance`] - Checked balance type behind the in-memory ledger
//! - [`ledger`] - Currency ledger boundary and in-memory adapter
//! - [`heist`] - Sessions, criminal records, targets and outcome resolution
//! - [`persistence`] - Record store trait, in-memory and PostgreSQL stores
//! - [`config`] - YAML application config
//! - [`logging`] - tracing subscriber setup

// Core types - must be first!
pub mod core_types;

pub mod balance;
pub mod config;
pub mod heist;
pub mod ledger;
pub mod logging;
pub mod persistence;

// Convenient re-exports at crate root
pub use balance::Balance;
pub use config::{AppConfig, ConfigError};
pub use core_types::{Credits, GuildId, MemberId};
pub use heist::{
    GuildConfig, HeistError, HeistRegistry, HeistReport, HeistResult, Ineligible, Member,
    Target, ThemeCatalog, VaultRecoveryWorker,
};
pub use ledger::{CurrencyLedger, LedgerError, MemoryLedger};
pub use persistence::{HeistStore, MemoryStore, PgHeistStore};
