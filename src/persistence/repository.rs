//! Repository trait for heist records
//!
//! By-key read and create-or-update write for each record kind. There are
//! no cross-record transactions: a member write and a vault write made for
//! the same outcome may become visible at different times.
//!
//! Vault balances have two concurrent writers (the resolver and the
//! recovery worker), so they change only through the read-modify-write
//! operations below, never by writing back a whole stale `Target`.

use anyhow::Result;
use async_trait::async_trait;

use crate::core_types::{Credits, GuildId, MemberId};
use crate::heist::{GuildConfig, Member, Target};

/// Result of an atomic vault update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultChange {
    /// Credits actually removed or added
    pub amount: Credits,
    /// Vault balance after the update
    pub vault: Credits,
}

#[async_trait]
pub trait HeistStore: Send + Sync {
    // ========================================================================
    // Members
    // ========================================================================

    async fn get_member(&self, guild_id: GuildId, member_id: MemberId) -> Result<Option<Member>>;

    async fn put_member(&self, member: &Member) -> Result<()>;

    // ========================================================================
    // Targets
    // ========================================================================

    async fn get_target(&self, guild_id: GuildId, theme: &str, name: &str)
    -> Result<Option<Target>>;

    /// Targets of one guild and theme, ordered by crew threshold
    async fn list_targets(&self, guild_id: GuildId, theme: &str) -> Result<Vec<Target>>;

    /// Every stored target across all guilds (vault recovery)
    async fn all_targets(&self) -> Result<Vec<Target>>;

    async fn put_target(&self, target: &Target) -> Result<()>;

    /// Remove up to `amount` from the stored vault in one step.
    ///
    /// `Ok(None)` when no such target is stored.
    async fn steal_from_vault(
        &self,
        guild_id: GuildId,
        theme: &str,
        name: &str,
        amount: Credits,
    ) -> Result<Option<VaultChange>>;

    /// Refill the stored vault by `vault_max × rate` in one step.
    ///
    /// `Ok(None)` when no such target is stored.
    async fn recover_vault(
        &self,
        guild_id: GuildId,
        theme: &str,
        name: &str,
        rate: f64,
    ) -> Result<Option<VaultChange>>;

    // ========================================================================
    // Guild config
    // ========================================================================

    async fn get_config(&self, guild_id: GuildId) -> Result<Option<GuildConfig>>;

    async fn put_config(&self, guild_id: GuildId, config: &GuildConfig) -> Result<()>;
}
