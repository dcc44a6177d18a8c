use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use thiserror::Error;

use crate::heist::GuildConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    /// Defaults for guilds that have no stored config yet
    #[serde(default)]
    pub heist: GuildConfig,
    #[serde(default)]
    pub vault_recovery: VaultRecoveryConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Seed for outcome rolls; unset means seeded from entropy
    #[serde(default)]
    pub rng_seed: Option<u64>,
    /// Directory of extra `*.yaml` themes
    #[serde(default)]
    pub themes_dir: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VaultRecoveryConfig {
    pub interval_secs: u64,
    /// Fraction of `vault_max` restored per tick
    pub rate: f64,
}

impl Default for VaultRecoveryConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            rate: 0.04,
        }
    }
}

impl VaultRecoveryConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PersistenceConfig {
    /// PostgreSQL URL; unset keeps records in memory
    pub postgres_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: "./logs".to_string(),
            log_file: "crew_heist.log".to_string(),
            use_json: false,
            rotation: "daily".to_string(),
            heist: GuildConfig::default(),
            vault_recovery: VaultRecoveryConfig::default(),
            persistence: PersistenceConfig::default(),
            rng_seed: None,
            themes_dir: None,
        }
    }
}

impl AppConfig {
    /// Load `config/<env>.yaml`
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }
}
