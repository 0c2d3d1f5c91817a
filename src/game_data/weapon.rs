//! Weapon -> essence stat triple lookup.

use anyhow::{anyhow, Result};

use crate::essence::EssenceStats;
use crate::game_data::tables::{GemTable, RawTables};

/// One weapon and the stat triple an essence needs to match it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WeaponStatsEntry {
    pub weapon_id: String,
    pub stats: EssenceStats,
}

/// Immutable weapon id -> stat triple table, ordered by weapon id.
#[derive(Clone, Debug, Default)]
pub struct WeaponStatsTable {
    entries: Vec<WeaponStatsEntry>,
}

impl WeaponStatsTable {
    /// Builds a table; entries are sorted by weapon id so lookups are deterministic.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, EssenceStats)>) -> Self {
        let mut entries: Vec<WeaponStatsEntry> = entries
            .into_iter()
            .map(|(weapon_id, stats)| WeaponStatsEntry { weapon_id, stats })
            .collect();
        entries.sort_by(|a, b| a.weapon_id.cmp(&b.weapon_id));
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WeaponStatsEntry> {
        self.entries.iter()
    }

    pub fn get(&self, weapon_id: &str) -> Option<&EssenceStats> {
        self.entries
            .iter()
            .find(|e| e.weapon_id == weapon_id)
            .map(|e| &e.stats)
    }

    /// First weapon whose triple equals `stats` slot by slot.
    pub fn find_exact(&self, stats: &EssenceStats) -> Option<&WeaponStatsEntry> {
        self.entries.iter().find(|e| &e.stats == stats)
    }
}

/// Stat label vocabulary, one list per slot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatLabels {
    pub attribute: Vec<String>,
    pub secondary: Vec<String>,
    pub skill: Vec<String>,
}

impl StatLabels {
    pub fn from_gems(gems: &GemTable) -> Self {
        let mut sorted: Vec<_> = gems.values().collect();
        sorted.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then_with(|| a.gem_term_id.cmp(&b.gem_term_id))
        });

        let mut labels = Self::default();
        for gem in sorted {
            let slot = match gem.term_type {
                0 => &mut labels.attribute,
                1 => &mut labels.secondary,
                2 => &mut labels.skill,
                _ => continue,
            };
            if !slot.contains(&gem.gem_term_id) {
                slot.push(gem.gem_term_id.clone());
            }
        }
        labels
    }

    /// All labels in declaration order: attributes, then secondaries, then skills.
    pub fn all(&self) -> Vec<String> {
        self.attribute
            .iter()
            .chain(&self.secondary)
            .chain(&self.skill)
            .cloned()
            .collect()
    }
}

/// Resolves the stat triple of one weapon through its skill patches.
pub fn stats_for_weapon(tables: &RawTables, weapon_id: &str) -> Result<EssenceStats> {
    let weapon = tables
        .weapons
        .get(weapon_id)
        .ok_or_else(|| anyhow!("unknown weapon {}", weapon_id))?;

    let mut stats = EssenceStats::default();
    for skill in &weapon.weapon_skill_list {
        let bundle = tables
            .skill_patches
            .get(skill)
            .ok_or_else(|| anyhow!("weapon {}: missing skill patch {}", weapon_id, skill))?;
        let patch = bundle
            .patches
            .first()
            .ok_or_else(|| anyhow!("weapon {}: empty skill patch {}", weapon_id, skill))?;
        let gem_key = tables
            .gem_tags
            .get(&patch.tag_id)
            .ok_or_else(|| anyhow!("weapon {}: unknown tag {}", weapon_id, patch.tag_id))?;
        let gem = tables
            .gems
            .get(gem_key)
            .ok_or_else(|| anyhow!("weapon {}: unknown gem {}", weapon_id, gem_key))?;

        let term = Some(gem.gem_term_id.clone());
        match gem.term_type {
            0 => stats.attribute = term,
            1 => stats.secondary = term,
            2 => stats.skill = term,
            other => tracing::debug!("weapon {}: ignoring term type {}", weapon_id, other),
        }
    }
    Ok(stats)
}

/// Derives the full weapon table.
pub fn build_weapon_table(tables: &RawTables) -> Result<WeaponStatsTable> {
    let entries = tables
        .weapons
        .keys()
        .map(|id| Ok((id.clone(), stats_for_weapon(tables, id)?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(WeaponStatsTable::from_entries(entries))
}
