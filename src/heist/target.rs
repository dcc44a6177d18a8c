//! Robbable targets and their vaults
//!
//! # Invariant
//! `0 <= vault <= vault_max` at all times. Fields are private and every
//! mutation (including deserialization) clamps.

use serde::{Deserialize, Serialize};

use crate::core_types::{Credits, GuildId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TargetRecord")]
pub struct Target {
    guild_id: GuildId,
    theme: String,
    name: String,
    crew_threshold: usize,
    success: f64,
    vault: Credits,
    vault_max: Credits,
}

/// Wire shape; converted through `Target::new` so stored documents
/// can never break the vault invariant.
#[derive(Deserialize)]
struct TargetRecord {
    guild_id: GuildId,
    theme: String,
    name: String,
    crew_threshold: usize,
    success: f64,
    vault: Credits,
    vault_max: Credits,
}

impl From<TargetRecord> for Target {
    fn from(r: TargetRecord) -> Self {
        let mut target = Target::new(
            r.guild_id,
            r.theme,
            r.name,
            r.crew_threshold,
            r.success,
            r.vault_max,
        );
        target.vault = r.vault.min(target.vault_max);
        target
    }
}

impl Target {
    /// Create a target with a full vault. `success` is clamped to 0..=100.
    pub fn new(
        guild_id: GuildId,
        theme: impl Into<String>,
        name: impl Into<String>,
        crew_threshold: usize,
        success: f64,
        vault_max: Credits,
    ) -> Self {
        let success = if success.is_nan() {
            0.0
        } else {
            success.clamp(0.0, 100.0)
        };
        Self {
            guild_id,
            theme: theme.into(),
            name: name.into(),
            crew_threshold,
            success,
            vault: vault_max,
            vault_max,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn theme(&self) -> &str {
        &self.theme
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Largest crew this target is sized for
    pub fn crew_threshold(&self) -> usize {
        self.crew_threshold
    }

    /// Per-member escape chance in percent
    pub fn success(&self) -> f64 {
        self.success
    }

    pub fn vault(&self) -> Credits {
        self.vault
    }

    pub fn vault_max(&self) -> Credits {
        self.vault_max
    }

    pub fn is_full(&self) -> bool {
        self.vault >= self.vault_max
    }

    /// Remove up to `amount` from the vault, flooring at zero.
    ///
    /// Returns the amount actually removed.
    pub fn steal(&mut self, amount: Credits) -> Credits {
        let taken = amount.min(self.vault);
        self.vault -= taken;
        taken
    }

    /// Add `vault_max × rate` (at least one credit for a positive rate),
    /// capped at `vault_max`. Returns the amount added.
    pub fn recover(&mut self, rate: f64) -> Credits {
        if self.is_full() || rate.is_nan() || rate <= 0.0 {
            return 0;
        }
        let step = ((self.vault_max as f64) * rate).round().max(1.0) as Credits;
        let added = step.min(self.vault_max - self.vault);
        self.vault += added;
        added
    }

    /// Overwrite the vault balance (admin), clamped to `vault_max`
    pub fn set_vault(&mut self, vault: Credits) {
        self.vault = vault.min(self.vault_max);
    }
}

/// Pick the target for a crew of `crew_size`.
///
/// Tightest fit: the smallest threshold that still holds the crew. A crew
/// larger than every threshold takes on the hardest (largest) target.
pub fn select_target(targets: &[Target], crew_size: usize) -> Option<&Target> {
    targets
        .iter()
        .filter(|t| t.crew_threshold >= crew_size)
        .min_by_key(|t| t.crew_threshold)
        .or_else(|| targets.iter().max_by_key(|t| t.crew_threshold))
}
