//! Treasure/trash decision for a recognized stat triple.

use std::fmt;

use crate::config::Policy;
use crate::essence::{EssenceStats, TreasureSummary, Verdict};
use crate::game_data::WeaponStatsTable;

/// Which rule produced a verdict.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MatchSource {
    /// At least one slot was not recognized
    Incomplete,
    /// Matched a user-declared wanted triple
    Policy(EssenceStats),
    /// Matched a weapon's triple
    Weapon(String),
    /// Matched a weapon that the policy marks as trash
    Overridden(String),
    NoMatch,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Judgement {
    pub verdict: Verdict,
    pub source: MatchSource,
}

impl fmt::Display for Judgement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            MatchSource::Incomplete => write!(f, "{} (incomplete read)", self.verdict),
            MatchSource::Policy(stats) => write!(f, "{} (wanted stats [{}])", self.verdict, stats),
            MatchSource::Weapon(id) => write!(f, "{} (weapon {})", self.verdict, id),
            MatchSource::Overridden(id) => write!(f, "{} (weapon {} overridden)", self.verdict, id),
            MatchSource::NoMatch => write!(f, "{} (no match)", self.verdict),
        }
    }
}

/// True when every defined slot of `wanted` appears somewhere in `observed`.
///
/// A wanted triple without any defined slot never matches.
fn contains_wanted(observed: &EssenceStats, wanted: &EssenceStats) -> bool {
    if !wanted.has_any() {
        return false;
    }
    let present = observed.slots();
    wanted
        .slots()
        .iter()
        .flatten()
        .all(|label| present.contains(&Some(*label)))
}

/// Applies the policy, then the weapon table, to a stat triple.
pub struct QualityJudge<'a> {
    policy: &'a Policy,
    weapons: &'a WeaponStatsTable,
}

impl<'a> QualityJudge<'a> {
    pub fn new(policy: &'a Policy, weapons: &'a WeaponStatsTable) -> Self {
        Self { policy, weapons }
    }

    pub fn evaluate(&self, stats: &EssenceStats) -> Judgement {
        if !stats.is_complete() {
            return Judgement {
                verdict: Verdict::Discardable,
                source: MatchSource::Incomplete,
            };
        }

        if let Some(wanted) = self
            .policy
            .wanted_stats
            .iter()
            .find(|wanted| contains_wanted(stats, wanted))
        {
            return Judgement {
                verdict: Verdict::Wanted,
                source: MatchSource::Policy(wanted.clone()),
            };
        }

        match self.weapons.find_exact(stats) {
            Some(entry) if self.policy.is_discard_override(&entry.weapon_id) => Judgement {
                verdict: Verdict::Discardable,
                source: MatchSource::Overridden(entry.weapon_id.clone()),
            },
            Some(entry) => Judgement {
                verdict: Verdict::Wanted,
                source: MatchSource::Weapon(entry.weapon_id.clone()),
            },
            None => Judgement {
                verdict: Verdict::Discardable,
                source: MatchSource::NoMatch,
            },
        }
    }

    pub fn judge(&self, stats: &EssenceStats) -> Verdict {
        self.evaluate(stats).verdict
    }

    /// Like [`judge`](Self::judge), recording weapon-table treasure into `summary`.
    pub fn judge_into(&self, stats: &EssenceStats, summary: &mut TreasureSummary) -> Judgement {
        let judgement = self.evaluate(stats);
        if let MatchSource::Weapon(weapon_id) = &judgement.source {
            summary.record(stats, weapon_id);
        }
        judgement
    }
}
