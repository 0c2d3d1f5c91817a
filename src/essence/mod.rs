//! Essence data model and the per-item decisions made on it.

pub mod action;
pub mod judge;
pub mod stats;
pub mod summary;

pub use action::{ActionExecutor, ActionsTaken, ToggleState};
pub use judge::{Judgement, MatchSource, QualityJudge};
pub use stats::{EssenceStats, Label, Verdict};
pub use summary::{TreasureGroup, TreasureSummary};
