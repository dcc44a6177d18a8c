//! In-memory record store
//!
//! DashMap per record kind. Used by tests and single-process deployments
//! that accept losing records on restart.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, bail};
use async_trait::async_trait;
use dashmap::DashMap;

use super::repository::{HeistStore, VaultChange};
use crate::core_types::{Credits, GuildId, MemberId};
use crate::heist::{GuildConfig, Member, Target};

type TargetKey = (GuildId, String, String);

pub struct MemoryStore {
    members: DashMap<(GuildId, MemberId), Member>,
    targets: DashMap<TargetKey, Target>,
    configs: DashMap<GuildId, GuildConfig>,
    /// When set, every write fails (exercises the non-fatal write path)
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            members: DashMap::new(),
            targets: DashMap::new(),
            configs: DashMap::new(),
            fail_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn check_readable(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("store is unreachable");
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("store is read-only");
        }
        Ok(())
    }

    /// Apply `op` to a stored target under its shard lock
    fn update_vault(
        &self,
        guild_id: GuildId,
        theme: &str,
        name: &str,
        op: impl FnOnce(&mut Target) -> Credits,
    ) -> Result<Option<VaultChange>> {
        self.check_writable()?;
        let key = (guild_id, theme.to_string(), name.to_string());
        Ok(self.targets.get_mut(&key).map(|mut target| {
            let amount = op(&mut *target);
            VaultChange {
                amount,
                vault: target.vault(),
            }
        }))
    }

    fn sorted(mut targets: Vec<Target>) -> Vec<Target> {
        targets.sort_by(|a, b| {
            a.crew_threshold()
                .cmp(&b.crew_threshold())
                .then_with(|| a.name().cmp(b.name()))
        });
        targets
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HeistStore for MemoryStore {
    async fn get_member(&self, guild_id: GuildId, member_id: MemberId) -> Result<Option<Member>> {
        self.check_readable()?;
        Ok(self.members.get(&(guild_id, member_id)).map(|m| m.clone()))
    }

    async fn put_member(&self, member: &Member) -> Result<()> {
        self.check_writable()?;
        self.members
            .insert((member.guild_id(), member.member_id()), member.clone());
        Ok(())
    }

    async fn get_target(
        &self,
        guild_id: GuildId,
        theme: &str,
        name: &str,
    ) -> Result<Option<Target>> {
        self.check_readable()?;
        let key = (guild_id, theme.to_string(), name.to_string());
        Ok(self.targets.get(&key).map(|t| t.clone()))
    }

    async fn list_targets(&self, guild_id: GuildId, theme: &str) -> Result<Vec<Target>> {
        self.check_readable()?;
        let targets = self
            .targets
            .iter()
            .filter(|e| e.key().0 == guild_id && e.key().1 == theme)
            .map(|e| e.value().clone())
            .collect();
        Ok(Self::sorted(targets))
    }

    async fn all_targets(&self) -> Result<Vec<Target>> {
        self.check_readable()?;
        Ok(self.targets.iter().map(|e| e.value().clone()).collect())
    }

    async fn put_target(&self, target: &Target) -> Result<()> {
        self.check_writable()?;
        let key = (
            target.guild_id(),
            target.theme().to_string(),
            target.name().to_string(),
        );
        self.targets.insert(key, target.clone());
        Ok(())
    }

    async fn steal_from_vault(
        &self,
        guild_id: GuildId,
        theme: &str,
        name: &str,
        amount: Credits,
    ) -> Result<Option<VaultChange>> {
        self.update_vault(guild_id, theme, name, |t| t.steal(amount))
    }

    async fn recover_vault(
        &self,
        guild_id: GuildId,
        theme: &str,
        name: &str,
        rate: f64,
    ) -> Result<Option<VaultChange>> {
        self.update_vault(guild_id, theme, name, |t| t.recover(rate))
    }

    async fn get_config(&self, guild_id: GuildId) -> Result<Option<GuildConfig>> {
        self.check_readable()?;
        Ok(self.configs.get(&guild_id).map(|c| c.clone()))
    }

    async fn put_config(&self, guild_id: GuildId, config: &GuildConfig) -> Result<()> {
        self.check_writable()?;
        self.configs.insert(guild_id, config.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_member_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.get_member(1, 2).await.unwrap().is_none());

        let mut member = Member::new(1, 2);
        member.escape();
        store.put_member(&member).await.unwrap();

        let loaded = store.get_member(1, 2).await.unwrap().unwrap();
        assert_eq!(loaded.spree(), 1);
        assert!(store.get_member(2, 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_targets_scoped_and_sorted() {
        let store = MemoryStore::new();
        store
            .put_target(&Target::new(1, "heist", "big", 8, 30.0, 100))
            .await
            .unwrap();
        store
            .put_target(&Target::new(1, "heist", "small", 2, 60.0, 100))
            .await
            .unwrap();
        store
            .put_target(&Target::new(1, "pirate", "ship", 3, 50.0, 100))
            .await
            .unwrap();
        store
            .put_target(&Target::new(2, "heist", "other", 3, 50.0, 100))
            .await
            .unwrap();

        let names: Vec<String> = store
            .list_targets(1, "heist")
            .await
            .unwrap()
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        assert_eq!(names, vec!["small", "big"]);
        assert_eq!(store.all_targets().await.unwrap().len(), 4);
        assert!(
            store
                .get_target(1, "pirate", "ship")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_vault_updates_in_place() {
        let store = MemoryStore::new();
        let mut bank = Target::new(1, "heist", "bank", 3, 50.0, 1000);
        bank.set_vault(100);
        store.put_target(&bank).await.unwrap();

        let taken = store.steal_from_vault(1, "heist", "bank", 150).await.unwrap();
        assert_eq!(taken, Some(VaultChange { amount: 100, vault: 0 }));

        let added = store.recover_vault(1, "heist", "bank", 0.04).await.unwrap();
        assert_eq!(added, Some(VaultChange { amount: 40, vault: 40 }));

        assert!(store.steal_from_vault(1, "heist", "nope", 1).await.unwrap().is_none());
        assert_eq!(
            store.get_target(1, "heist", "bank").await.unwrap().unwrap().vault(),
            40
        );
    }

    #[tokio::test]
    async fn test_fail_writes() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        assert!(store.put_member(&Member::new(1, 2)).await.is_err());
        assert!(store.get_member(1, 2).await.unwrap().is_none());
        assert!(store.recover_vault(1, "heist", "bank", 0.1).await.is_err());

        store.set_fail_writes(false);
        assert!(store.put_member(&Member::new(1, 2)).await.is_ok());
    }

    #[tokio::test]
    async fn test_fail_reads() {
        let store = MemoryStore::new();
        store.put_member(&Member::new(1, 2)).await.unwrap();
        store.set_fail_reads(true);
        assert!(store.get_member(1, 2).await.is_err());
        assert!(store.all_targets().await.is_err());
    }
}
