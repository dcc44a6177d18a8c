//! Core types used throughout the system
//!
//! Identifiers come from the chat platform and are opaque to the engine.

/// Guild ID - the chat community a heist runs in.
///
/// # Constraints:
/// - **Immutable**: assigned by the chat platform
/// - **Scope**: every session, member record, target and config is keyed by it
pub type GuildId = u64;

/// Member ID - a user within a guild.
///
/// A member's criminal record is per guild: the same user in two guilds
/// has two independent records.
pub type MemberId = u64;

/// Credits - the in-game currency unit (whole credits, no decimals)
pub type Credits = u64;
