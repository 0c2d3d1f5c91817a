//! Per-scan tally of treasure essences matched through the weapon table.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use crate::essence::EssenceStats;

/// Weapons sharing one stat triple.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreasureGroup {
    /// Deduplicated, in first-seen order
    pub weapons: Vec<String>,
    /// Counted once per triple per session
    pub count: u32,
    /// Grid cells that showed the triple
    pub cells: u32,
}

/// Treasure findings of one scan, keyed by stat triple.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreasureSummary {
    groups: BTreeMap<EssenceStats, TreasureGroup>,
    counted: BTreeSet<EssenceStats>,
}

impl TreasureSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one grid cell whose triple matched `weapon_id`.
    ///
    /// Returns `true` the first time the triple is seen this session.
    pub fn record(&mut self, stats: &EssenceStats, weapon_id: &str) -> bool {
        let group = self.groups.entry(stats.clone()).or_default();
        if !group.weapons.iter().any(|w| w == weapon_id) {
            group.weapons.push(weapon_id.to_string());
        }
        group.cells += 1;

        let first = self.counted.insert(stats.clone());
        if first {
            group.count += 1;
        }
        first
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn distinct_triples(&self) -> usize {
        self.counted.len()
    }

    pub fn total_cells(&self) -> u32 {
        self.groups.values().map(|g| g.cells).sum()
    }

    pub fn get(&self, stats: &EssenceStats) -> Option<&TreasureGroup> {
        self.groups.get(stats)
    }

    pub fn groups(&self) -> impl Iterator<Item = (&EssenceStats, &TreasureGroup)> {
        self.groups.iter()
    }

    /// Human-readable report. `weapon_name` maps weapon ids to display names.
    pub fn render(&self, weapon_name: impl Fn(&str) -> String) -> String {
        if self.groups.is_empty() {
            return "No treasure essences found".to_string();
        }

        let mut out = String::from("Treasure essences found:\n");
        for (stats, group) in &self.groups {
            let names: Vec<String> = group.weapons.iter().map(|w| weapon_name(w)).collect();
            let _ = writeln!(out, "  [{}] x{}: {}", stats, group.cells, names.join(", "));
        }
        let _ = write!(
            out,
            "{} distinct stat combination(s), {} matching cell(s)",
            self.distinct_triples(),
            self.total_cells()
        );
        out
    }
}
