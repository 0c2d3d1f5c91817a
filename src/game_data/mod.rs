//! Static reference data derived from the game's exported tables.
//!
//! Loaded once at startup and never mutated afterwards:
//! - the weapon -> stat triple table used by the quality judge
//! - the stat label vocabulary the text recognizer is built from
//! - localized item names for the scan summary

pub mod tables;
pub mod weapon;

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};

pub use tables::{RawTables, TranslationKey};
pub use weapon::{StatLabels, WeaponStatsEntry, WeaponStatsTable};

/// Resolves [`TranslationKey`]s through one language's I18n table.
#[derive(Clone, Debug, Default)]
pub struct Localizer {
    texts: HashMap<String, String>,
}

impl Localizer {
    pub fn new(texts: HashMap<String, String>) -> Self {
        Self { texts }
    }

    /// Returns the translation, falling back to the key's own text.
    pub fn translate(&self, key: &TranslationKey) -> String {
        match self.texts.get(&key.id.to_string()) {
            Some(text) if !text.is_empty() => text.clone(),
            _ => key.text.clone(),
        }
    }
}

/// Read-only game data shared by the whole process.
#[derive(Clone, Debug, Default)]
pub struct GameData {
    pub weapons: WeaponStatsTable,
    pub stat_labels: StatLabels,
    item_names: HashMap<String, String>,
}

impl GameData {
    /// Loads every table from `table_dir`, localizing names into `language`.
    pub fn load(table_dir: &Path, language: &str) -> Result<Self> {
        let tables = RawTables::load(table_dir, language)
            .with_context(|| format!("load game tables from {}", table_dir.display()))?;
        let data = Self::from_tables(&tables)?;
        tracing::info!(
            weapons = data.weapons.len(),
            attributes = data.stat_labels.attribute.len(),
            secondaries = data.stat_labels.secondary.len(),
            skills = data.stat_labels.skill.len(),
            "Game data loaded"
        );
        Ok(data)
    }

    pub fn from_tables(tables: &RawTables) -> Result<Self> {
        let weapons = weapon::build_weapon_table(tables)?;
        let stat_labels = StatLabels::from_gems(&tables.gems);
        let localizer = Localizer::new(tables.texts.clone());
        let item_names = tables
            .items
            .values()
            .map(|item| (item.id.clone(), localizer.translate(&item.name)))
            .collect();
        Ok(Self {
            weapons,
            stat_labels,
            item_names,
        })
    }

    /// Game data without names, for callers that only need the lookup table.
    pub fn from_weapons(weapons: WeaponStatsTable, stat_labels: StatLabels) -> Self {
        Self {
            weapons,
            stat_labels,
            item_names: HashMap::new(),
        }
    }

    /// Localized name of an item, or the id itself when unknown.
    pub fn item_name(&self, item_id: &str) -> String {
        self.item_names
            .get(item_id)
            .cloned()
            .unwrap_or_else(|| item_id.to_string())
    }
}
