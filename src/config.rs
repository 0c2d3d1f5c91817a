//! Persistent configuration.
//!
//! Loads `config.json` from next to the executable. Holds the keep/discard
//! policy, scan timing, and the window titles the scanner accepts.
//!
//! The policy is read through [`ConfigStore::policy`] on every access, so an
//! edit made while a scan is running takes effect from the next grid cell.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::essence::EssenceStats;

/// Current config schema version. Files with any other version are discarded.
pub const CONFIG_VERSION: u32 = 0;

/// What to do with an essence's lock and deprecate toggles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Keep,
    Lock,
    Unlock,
    Deprecate,
    Undeprecate,
    UnlockAndUndeprecate,
}

/// Keep/discard policy for scanned essences.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Stat combinations the user always wants, matched order-independently.
    #[serde(default, alias = "treasure_essence_stats")]
    pub wanted_stats: Vec<EssenceStats>,
    /// Weapon ids whose table triple should be treated as trash anyway.
    #[serde(default, alias = "trash_weapon_ids")]
    pub discard_overrides: Vec<String>,
    /// Action applied to wanted essences
    #[serde(default = "default_wanted_action", alias = "treasure_action")]
    pub wanted_action: Action,
    /// Action applied to discardable essences
    #[serde(default = "default_discard_action", alias = "trash_action")]
    pub discard_action: Action,
}

fn default_wanted_action() -> Action {
    Action::Lock
}

fn default_discard_action() -> Action {
    Action::Unlock
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            wanted_stats: Vec::new(),
            discard_overrides: Vec::new(),
            wanted_action: default_wanted_action(),
            discard_action: default_discard_action(),
        }
    }
}

impl Policy {
    pub fn is_discard_override(&self, item_id: &str) -> bool {
        self.discard_overrides.iter().any(|id| id == item_id)
    }
}

/// Timing parameters for the scan loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Wait after clicking a grid cell before reading the detail panel (milliseconds)
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Pause between grid cells (milliseconds)
    #[serde(default = "default_cell_interval_ms")]
    pub cell_interval_ms: u64,
    /// Wait after a scroll before comparing the landmark region (milliseconds)
    #[serde(default = "default_scroll_settle_ms")]
    pub scroll_settle_ms: u64,
}

fn default_settle_delay_ms() -> u64 {
    300
}

fn default_cell_interval_ms() -> u64 {
    100
}

fn default_scroll_settle_ms() -> u64 {
    500
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
            cell_interval_ms: default_cell_interval_ms(),
            scroll_settle_ms: default_scroll_settle_ms(),
        }
    }
}

impl ScannerConfig {
    /// No waiting at all. Used when the surface is simulated.
    pub fn immediate() -> Self {
        Self {
            settle_delay_ms: 0,
            cell_interval_ms: 0,
            scroll_settle_ms: 0,
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub version: u32,
    #[serde(flatten)]
    pub policy: Policy,
    #[serde(default)]
    pub scanner: ScannerConfig,
    /// Window titles accepted as the game client
    #[serde(default = "default_window_titles")]
    pub window_titles: Vec<String>,
    /// Language code of the I18n table used for item names
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_window_titles() -> Vec<String> {
    vec!["EndfieldTBeta2".to_string(), "明日方舟：终末地".to_string()]
}

fn default_language() -> String {
    "CN".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            policy: Policy::default(),
            scanner: ScannerConfig::default(),
            window_titles: default_window_titles(),
            language: default_language(),
        }
    }
}

/// Result of reading the config file.
enum ReadResult {
    Loaded(Config),
    /// No file, or one written by another version. Safe to replace.
    Replaceable,
    /// The file exists but cannot be used. Left untouched for the user to fix.
    Broken,
}

fn read_config(path: &Path) -> ReadResult {
    if !path.exists() {
        tracing::info!("{} not found, using default config", path.display());
        return ReadResult::Replaceable;
    }

    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
            return ReadResult::Broken;
        }
    };

    let value: serde_json::Value = match serde_json::from_str(&contents) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
            return ReadResult::Broken;
        }
    };

    if value.get("version").and_then(|v| v.as_u64()) != Some(CONFIG_VERSION as u64) {
        tracing::warn!("Config version mismatch, ignoring old config");
        return ReadResult::Replaceable;
    }

    match serde_json::from_value::<Config>(value) {
        Ok(config) => {
            tracing::info!("Config loaded from {}", path.display());
            ReadResult::Loaded(config)
        }
        Err(e) => {
            tracing::warn!("Invalid config {}: {}. Using defaults.", path.display(), e);
            ReadResult::Broken
        }
    }
}

fn write_config(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(config).context("serialize config")?;
    fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    tracing::info!("Config saved to {}", path.display());
    Ok(())
}

/// Shared, persisted configuration.
///
/// The get/set surface other parts of the program use; the scanner only reads.
pub struct ConfigStore {
    path: Option<PathBuf>,
    current: RwLock<Config>,
}

impl ConfigStore {
    /// Loads the file at `path`.
    ///
    /// Defaults are written only if the file is missing or outdated. A file
    /// that fails to parse is kept as is and the defaults stay in memory.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        tracing::info!("Looking for config at: {}", path.display());
        let config = match read_config(&path) {
            ReadResult::Loaded(config) => config,
            ReadResult::Replaceable => {
                let config = Config::default();
                if let Err(e) = write_config(&path, &config) {
                    tracing::warn!("Failed to write default config: {:#}", e);
                }
                config
            }
            ReadResult::Broken => {
                tracing::warn!("Fix or delete {} to use your own settings", path.display());
                Config::default()
            }
        };
        Self {
            path: Some(path),
            current: RwLock::new(config),
        }
    }

    /// A store that never touches the disk.
    pub fn in_memory(config: Config) -> Self {
        Self {
            path: None,
            current: RwLock::new(config),
        }
    }

    /// Returns a copy of the whole configuration.
    pub fn get(&self) -> Config {
        match self.current.read() {
            Ok(config) => config.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Returns the policy as it is right now.
    pub fn policy(&self) -> Policy {
        self.get().policy
    }

    /// Replaces the configuration and persists it.
    pub fn update(&self, mut config: Config) -> Result<()> {
        config.version = CONFIG_VERSION;
        if let Some(path) = &self.path {
            write_config(path, &config)?;
        }
        match self.current.write() {
            Ok(mut current) => *current = config,
            Err(poisoned) => *poisoned.into_inner() = config,
        }
        Ok(())
    }

    /// Replaces only the policy part of the configuration.
    pub fn update_policy(&self, policy: Policy) -> Result<()> {
        let mut config = self.get();
        config.policy = policy;
        self.update(config)
    }
}
