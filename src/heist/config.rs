//! Per-guild game settings
//!
//! `GuildConfig` is persisted per guild (created from the application
//! defaults on first use). Every session freezes a copy at creation, so
//! admin changes only affect heists planned afterwards.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::HeistError;
use super::theme::DEFAULT_THEME;
use crate::core_types::Credits;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildConfig {
    pub theme: String,
    /// Charged to every crew member, organizer included
    pub entry_cost: Credits,
    pub planning_wait_secs: u64,
    /// Multiplied by (captures since last clear + 1)
    pub sentence_base_secs: u64,
    pub bail_base: Credits,
    /// Cooldown after a completed heist before the next may start
    pub police_alert_secs: u64,
    pub death_secs: u64,
    /// Percent chance that a member who fails to escape dies instead of being caught
    pub death_chance: f64,
    /// Share of the vault the whole crew can carry out
    pub take_ratio: f64,
    pub bonus_min: Credits,
    pub bonus_max: Credits,
}

impl Default for GuildConfig {
    fn default() -> Self {
        Self {
            theme: DEFAULT_THEME.to_string(),
            entry_cost: 100,
            planning_wait_secs: 60,
            sentence_base_secs: 600,
            bail_base: 250,
            police_alert_secs: 60,
            death_secs: 43_200,
            death_chance: 25.0,
            take_ratio: 0.75,
            bonus_min: 10,
            bonus_max: 100,
        }
    }
}

impl GuildConfig {
    pub fn planning_wait(&self) -> Duration {
        Duration::from_secs(self.planning_wait_secs)
    }

    pub fn sentence_base(&self) -> Duration {
        Duration::from_secs(self.sentence_base_secs)
    }

    pub fn police_alert(&self) -> Duration {
        Duration::from_secs(self.police_alert_secs)
    }

    pub fn death_duration(&self) -> Duration {
        Duration::from_secs(self.death_secs)
    }

    pub fn validate(&self) -> Result<(), HeistError> {
        if !(0.0..=100.0).contains(&self.death_chance) {
            return Err(HeistError::InvalidConfig(format!(
                "death_chance {} outside 0..=100",
                self.death_chance
            )));
        }
        if !(0.0..=1.0).contains(&self.take_ratio) {
            return Err(HeistError::InvalidConfig(format!(
                "take_ratio {} outside 0..=1",
                self.take_ratio
            )));
        }
        if self.bonus_min > self.bonus_max {
            return Err(HeistError::InvalidConfig(format!(
                "bonus_min {} exceeds bonus_max {}",
                self.bonus_min, self.bonus_max
            )));
        }
        Ok(())
    }
}

/// Partial update applied by admins; `None` keeps the current value.
///
/// The theme is changed through `HeistRegistry::set_theme`, which checks it exists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigPatch {
    pub entry_cost: Option<Credits>,
    pub planning_wait_secs: Option<u64>,
    pub sentence_base_secs: Option<u64>,
    pub bail_base: Option<Credits>,
    pub police_alert_secs: Option<u64>,
    pub death_secs: Option<u64>,
    pub death_chance: Option<f64>,
    pub take_ratio: Option<f64>,
    pub bonus_min: Option<Credits>,
    pub bonus_max: Option<Credits>,
}

impl ConfigPatch {
    /// Apply on a copy and validate; the original is untouched on error
    pub fn apply(&self, config: &GuildConfig) -> Result<GuildConfig, HeistError> {
        let mut next = config.clone();
        if let Some(v) = self.entry_cost {
            next.entry_cost = v;
        }
        if let Some(v) = self.planning_wait_secs {
            next.planning_wait_secs = v;
        }
        if let Some(v) = self.sentence_base_secs {
            next.sentence_base_secs = v;
        }
        if let Some(v) = self.bail_base {
            next.bail_base = v;
        }
        if let Some(v) = self.police_alert_secs {
            next.police_alert_secs = v;
        }
        if let Some(v) = self.death_secs {
            next.death_secs = v;
        }
        if let Some(v) = self.death_chance {
            next.death_chance = v;
        }
        if let Some(v) = self.take_ratio {
            next.take_ratio = v;
        }
        if let Some(v) = self.bonus_min {
            next.bonus_min = v;
        }
        if let Some(v) = self.bonus_max {
            next.bonus_max = v;
        }
        next.validate()?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = GuildConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.planning_wait(), Duration::from_secs(60));
        assert_eq!(config.theme, "heist");
    }

    #[test]
    fn test_patch_applies_only_set_fields() {
        let patch = ConfigPatch {
            entry_cost: Some(5),
            police_alert_secs: Some(0),
            ..Default::default()
        };
        let next = patch.apply(&GuildConfig::default()).unwrap();
        assert_eq!(next.entry_cost, 5);
        assert_eq!(next.police_alert_secs, 0);
        assert_eq!(next.bail_base, GuildConfig::default().bail_base);
    }

    #[test]
    fn test_patch_rejects_invalid() {
        let patch = ConfigPatch {
            death_chance: Some(150.0),
            ..Default::default()
        };
        let err = patch.apply(&GuildConfig::default()).unwrap_err();
        assert_eq!(err.code(), "INVALID_CONFIG");

        let patch = ConfigPatch {
            bonus_min: Some(500),
            ..Default::default()
        };
        assert!(patch.apply(&GuildConfig::default()).is_err());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: GuildConfig = serde_yaml::from_str("entry_cost: 7\n").unwrap();
        assert_eq!(config.entry_cost, 7);
        assert_eq!(config.sentence_base_secs, 600);
    }
}
