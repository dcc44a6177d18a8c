//! Heist Engine
//!
//! Timed cooperative raids: a crew assembles during a planning window,
//! every member rolls their own fate against the target, and escapees
//! split loot from the target's vault.
//!
//! # Components
//!
//! - [`registry`] - live sessions per guild and the lifecycle operations
//! - [`session`] - one heist: crew roster, state, planning deadline
//! - [`member`] - per-member criminal record and its status machine
//! - [`target`] - robbable targets, vault steal/recovery, target selection
//! - [`resolver`] - outcome rolls and their side effects
//! - [`recovery`] - background vault refill worker
//!
//! # Session Lifecycle
//!
//! ```text
//! PLANNING → ACTIVE → COMPLETED
//!     ↓
//! CANCELLED
//! ```
//!
//! # Invariants
//!
//! 1. **One live heist per guild**: a second start fails with `AlreadyInProgress`
//! 2. **Vault bounds**: `0 <= vault <= vault_max` after every steal and refill
//! 3. **No rollback**: a persisted write failing never undoes an applied outcome

pub mod config;
pub mod error;
pub mod member;
pub mod recovery;
pub mod registry;
pub mod resolver;
pub mod session;
pub mod state;
pub mod target;
pub mod theme;

// Re-exports for convenience
pub use config::{ConfigPatch, GuildConfig};
pub use error::{HeistError, Ineligible};
pub use member::{CriminalStatus, CriminalTier, Member};
pub use recovery::VaultRecoveryWorker;
pub use registry::{HeistRegistry, HeistReport, MemberStats, PlanningOutcome};
pub use resolver::{HeistOutcome, HeistResult, HeistTally, OutcomeResolver, OutcomeStatus};
pub use session::{CrewMember, HeistId, HeistSession, SessionEvent, SessionSnapshot};
pub use state::HeistState;
pub use target::{Target, select_target};
pub use theme::{Theme, ThemeCatalog};
