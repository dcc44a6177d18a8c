//! Vault Recovery Worker
//!
//! Background worker that refills every target's vault a little each tick.
//! Guild-agnostic: it never touches sessions or the registry, and handles
//! one target record at a time.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::VaultRecoveryConfig;
use crate::persistence::HeistStore;

pub struct VaultRecoveryWorker {
    store: Arc<dyn HeistStore>,
    interval: Duration,
    rate: f64,
}

impl VaultRecoveryWorker {
    pub fn new(store: Arc<dyn HeistStore>, config: &VaultRecoveryConfig) -> Self {
        Self {
            store,
            interval: config.interval(),
            rate: config.rate,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run the recovery loop
    ///
    /// This method runs forever, ticking once per interval.
    pub async fn run(&self) -> ! {
        info!(
            interval_secs = self.interval.as_secs(),
            rate = self.rate,
            "Starting vault recovery worker"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately; vaults start full.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(e) = self.tick().await {
                error!(error = %e, "Vault recovery tick failed");
            }
        }
    }

    /// Run a single recovery pass. Returns the number of vaults refilled.
    ///
    /// The listing only picks candidates; each refill re-reads the stored
    /// vault, so debits made since the listing are kept.
    pub async fn tick(&self) -> anyhow::Result<usize> {
        let targets = self.store.all_targets().await?;
        let mut refilled = 0;

        for target in targets.iter().filter(|t| !t.is_full()) {
            let change = self
                .store
                .recover_vault(target.guild_id(), target.theme(), target.name(), self.rate)
                .await;
            match change {
                Ok(Some(change)) if change.amount > 0 => {
                    refilled += 1;
                    debug!(
                        guild_id = target.guild_id(),
                        target_name = target.name(),
                        added = change.amount,
                        vault = change.vault,
                        vault_max = target.vault_max(),
                        "Vault recovered"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        guild_id = target.guild_id(),
                        target_name = target.name(),
                        error = %e,
                        "Vault recovery not persisted"
                    );
                }
            }
        }

        if refilled > 0 {
            debug!(count = refilled, "Vaults recovered this tick");
        }

        Ok(refilled)
    }
}
