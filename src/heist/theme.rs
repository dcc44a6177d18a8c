//! Themes
//!
//! A theme is presentation data: display names for the game's nouns, the
//! default target table a guild is seeded with, and flavour messages for
//! each outcome. Core logic never branches on any of it.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::target::Target;
use crate::config::ConfigError;
use crate::core_types::{Credits, GuildId};

pub const DEFAULT_THEME: &str = "heist";

/// Seed row for a guild's target table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetTemplate {
    pub name: String,
    pub crew: usize,
    pub success: f64,
    pub vault_max: Credits,
}

impl TargetTemplate {
    fn new(name: &str, crew: usize, success: f64, vault_max: Credits) -> Self {
        Self {
            name: name.to_string(),
            crew,
            success,
            vault_max,
        }
    }

    pub fn instantiate(&self, guild_id: GuildId, theme: &str) -> Target {
        Target::new(
            guild_id,
            theme,
            self.name.clone(),
            self.crew,
            self.success,
            self.vault_max,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub name: String,
    pub heist: String,
    pub crew: String,
    pub jail: String,
    pub vault: String,
    pub bail: String,
    pub police: String,
    pub targets: Vec<TargetTemplate>,
    #[serde(default)]
    pub escaped_messages: Vec<String>,
    #[serde(default)]
    pub apprehended_messages: Vec<String>,
    #[serde(default)]
    pub dead_messages: Vec<String>,
}

impl Theme {
    fn classic() -> Self {
        Self {
            name: DEFAULT_THEME.to_string(),
            heist: "heist".to_string(),
            crew: "crew".to_string(),
            jail: "jail".to_string(),
            vault: "vault".to_string(),
            bail: "bail".to_string(),
            police: "police".to_string(),
            targets: vec![
                TargetTemplate::new("Corner Bodega", 2, 55.0, 4_000),
                TargetTemplate::new("Pawn Shop", 3, 48.0, 9_000),
                TargetTemplate::new("Jewelry Store", 5, 42.0, 18_000),
                TargetTemplate::new("Casino Cage", 8, 36.0, 35_000),
                TargetTemplate::new("Federal Reserve", 12, 28.0, 75_000),
            ],
            escaped_messages: vec![
                "slipped out the back door before the alarm finished ringing".to_string(),
                "blended into a passing parade".to_string(),
                "drove off in the getaway car with the bags".to_string(),
            ],
            apprehended_messages: vec![
                "tripped the laser grid".to_string(),
                "stopped for a sandwich and got cuffed".to_string(),
                "was recognised from the last job".to_string(),
            ],
            dead_messages: vec![
                "picked a fight with the security guard".to_string(),
                "tried to outrun a helicopter".to_string(),
            ],
        }
    }

    fn pirate() -> Self {
        Self {
            name: "pirate".to_string(),
            heist: "raid".to_string(),
            crew: "crew".to_string(),
            jail: "brig".to_string(),
            vault: "hold".to_string(),
            bail: "ransom".to_string(),
            police: "navy".to_string(),
            targets: vec![
                TargetTemplate::new("Fishing Sloop", 2, 55.0, 4_000),
                TargetTemplate::new("Merchant Brig", 3, 48.0, 9_000),
                TargetTemplate::new("Trading Post", 5, 42.0, 18_000),
                TargetTemplate::new("Spanish Galleon", 8, 36.0, 35_000),
                TargetTemplate::new("Treasure Fleet", 12, 28.0, 75_000),
            ],
            escaped_messages: vec![
                "rowed away under cover of fog".to_string(),
                "swung back aboard with a chest of doubloons".to_string(),
            ],
            apprehended_messages: vec![
                "was clapped in irons by marines".to_string(),
                "fell asleep in the captain's cabin".to_string(),
            ],
            dead_messages: vec!["went down with the ship".to_string()],
        }
    }

    /// Fresh targets for a guild that has none yet
    pub fn seed_targets(&self, guild_id: GuildId) -> Vec<Target> {
        self.targets
            .iter()
            .map(|t| t.instantiate(guild_id, &self.name))
            .collect()
    }
}

/// Registry of available themes, keyed by theme name
#[derive(Debug, Clone)]
pub struct ThemeCatalog {
    themes: BTreeMap<String, Theme>,
}

impl ThemeCatalog {
    pub fn empty() -> Self {
        Self {
            themes: BTreeMap::new(),
        }
    }

    /// Built-in themes
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        catalog.insert(Theme::classic());
        catalog.insert(Theme::pirate());
        catalog
    }

    pub fn insert(&mut self, theme: Theme) {
        self.themes.insert(theme.name.clone(), theme);
    }

    pub fn get(&self, name: &str) -> Option<&Theme> {
        self.themes.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.themes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.themes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.themes.is_empty()
    }

    /// Add every `*.yaml` theme in `dir`, replacing built-ins of the same name.
    ///
    /// A file that fails to parse is skipped with a warning.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, ConfigError> {
        let mut loaded = 0;
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            let content = fs::read_to_string(&path)?;
            match serde_yaml::from_str::<Theme>(&content) {
                Ok(theme) => {
                    info!(theme = %theme.name, path = %path.display(), "Loaded theme");
                    self.insert(theme);
                    loaded += 1;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping invalid theme"),
            }
        }
        Ok(loaded)
    }
}

impl Default for ThemeCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
