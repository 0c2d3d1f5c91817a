//! Scan states, outcomes and the per-session abnormal-condition counters.

use std::fmt;

use crate::essence::{ActionsTaken, EssenceStats, ToggleState, TreasureSummary};
use crate::vision::{Confidence, Recognition};

/// Consecutive cells with an unreadable lock or deprecate button before aborting.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;
/// Consecutive cells where every stat scored below the low threshold before aborting.
pub const MAX_LOW_SCORE_READS: u32 = 5;
/// Consecutive cells identical to the previous one before aborting.
pub const MAX_DUPLICATE_READS: u32 = 2;

/// Why a scan stopped early.
#[derive(Clone, Debug, PartialEq)]
pub enum AbortReason {
    NoTargetSurface,
    NotForeground,
    WrongResolution { width: u32, height: u32 },
    WrongScreen { score: f32 },
    LostFocus,
    ButtonFailures(u32),
    LowScoreReads(u32),
    DuplicateReads(u32),
    /// A capture or input call failed
    Platform(String),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::NoTargetSurface => write!(f, "game window not found"),
            AbortReason::NotForeground => write!(f, "game window is not in the foreground"),
            AbortReason::WrongResolution { width, height } => {
                write!(f, "client size is {}x{}, expected 1920x1080", width, height)
            }
            AbortReason::WrongScreen { score } => {
                write!(f, "essence page not showing (landmark score {:.3})", score)
            }
            AbortReason::LostFocus => write!(f, "game window lost focus"),
            AbortReason::ButtonFailures(n) => {
                write!(f, "{} consecutive unreadable lock/deprecate buttons", n)
            }
            AbortReason::LowScoreReads(n) => write!(f, "{} consecutive unreadable stat panels", n),
            AbortReason::DuplicateReads(n) => write!(f, "{} consecutive repeated readings", n),
            AbortReason::Platform(msg) => write!(f, "platform error: {}", msg),
        }
    }
}

/// Where the scan state machine currently is.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum ScanState {
    #[default]
    Idle,
    Scanning { page: u32 },
    Paginating { page: u32 },
    Aborting(AbortReason),
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanState::Idle => write!(f, "Idle"),
            ScanState::Scanning { page } => write!(f, "Scanning page {}", page),
            ScanState::Paginating { page } => write!(f, "Turning page {}", page),
            ScanState::Aborting(reason) => write!(f, "Aborting: {}", reason),
        }
    }
}

/// How a scan ended.
#[derive(Clone, Debug, PartialEq)]
pub enum ScanOutcome {
    /// The list stopped moving: every page was scanned
    ReachedEnd,
    /// Scrolling never produced a clear page change
    PaginationFailed,
    Interrupted,
    Aborted(AbortReason),
}

impl ScanOutcome {
    /// True for the outcomes that are not an abort.
    pub fn is_normal(&self) -> bool {
        !matches!(self, ScanOutcome::Aborted(_))
    }
}

impl fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanOutcome::ReachedEnd => write!(f, "reached end of list"),
            ScanOutcome::PaginationFailed => write!(f, "pagination failed"),
            ScanOutcome::Interrupted => write!(f, "interrupted"),
            ScanOutcome::Aborted(reason) => write!(f, "aborted: {}", reason),
        }
    }
}

/// Everything read from the detail panel after selecting one cell.
#[derive(Clone, Debug, PartialEq)]
pub struct CellReading {
    /// attribute, secondary, skill
    pub stats: [Recognition; 3],
    pub lock: Recognition,
    pub deprecate: Recognition,
}

impl CellReading {
    pub fn essence(&self) -> EssenceStats {
        let [a, s, k] = &self.stats;
        EssenceStats {
            attribute: a.label.clone(),
            secondary: s.label.clone(),
            skill: k.label.clone(),
        }
    }

    /// Observed lock and deprecate states, if both buttons were read.
    pub fn toggles(&self) -> Option<(ToggleState, ToggleState)> {
        let lock = ToggleState::from_lock_label(self.lock.label.as_deref()?)?;
        let deprecate = ToggleState::from_deprecate_label(self.deprecate.label.as_deref()?)?;
        Some((lock, deprecate))
    }

    pub fn all_stats_low(&self) -> bool {
        self.stats
            .iter()
            .all(|r| r.confidence == Confidence::Unrecognized)
    }

    /// Same labels in all five regions. Scores are ignored.
    pub fn same_result(&self, other: &CellReading) -> bool {
        self.stats
            .iter()
            .zip(&other.stats)
            .all(|(a, b)| a.label == b.label)
            && self.lock.label == other.lock.label
            && self.deprecate.label == other.deprecate.label
    }
}

/// What the detail panel should show once the clicks for a cell have landed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PanelState {
    pub stats: EssenceStats,
    pub lock: ToggleState,
    pub deprecate: ToggleState,
}

impl PanelState {
    pub fn after(
        stats: EssenceStats,
        lock: ToggleState,
        deprecate: ToggleState,
        taken: ActionsTaken,
    ) -> Self {
        Self {
            stats,
            lock: lock.after_click(taken.lock_clicked),
            deprecate: deprecate.after_click(taken.deprecate_clicked),
        }
    }
}

/// Consecutive-failure counters. Each is reset independently.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FailureCounters {
    pub button_failures: u32,
    pub low_score_reads: u32,
    pub duplicate_reads: u32,
}

/// Transient state of one scan run.
#[derive(Debug, Default)]
pub struct ScanSession {
    pub page: u32,
    pub cells_visited: u32,
    pub clicks: u32,
    pub counters: FailureCounters,
    pub last_reading: Option<CellReading>,
    /// Panel left behind by the last judged cell
    pub last_panel: Option<PanelState>,
    pub summary: TreasureSummary,
}

impl ScanSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves to the next page. Counters and duplicate tracking start over.
    pub fn begin_page(&mut self) {
        self.page += 1;
        self.counters = FailureCounters::default();
        self.last_reading = None;
        self.last_panel = None;
    }

    /// The panel still shows the item the previous cell already handled,
    /// as happens when an empty slot is clicked.
    pub fn is_stale_panel(&self, stats: &EssenceStats, lock: ToggleState, deprecate: ToggleState) -> bool {
        self.last_panel
            .as_ref()
            .is_some_and(|p| p.stats == *stats && p.lock == lock && p.deprecate == deprecate)
    }

    /// Updates the counters with a new reading and reports the first ceiling hit.
    pub fn observe(&mut self, reading: &CellReading) -> Option<AbortReason> {
        let c = &mut self.counters;

        if reading.toggles().is_some() {
            c.button_failures = 0;
        } else {
            c.button_failures += 1;
        }

        if reading.all_stats_low() {
            c.low_score_reads += 1;
        } else {
            c.low_score_reads = 0;
        }

        match &self.last_reading {
            Some(last) if last.same_result(reading) => c.duplicate_reads += 1,
            _ => c.duplicate_reads = 0,
        }
        self.last_reading = Some(reading.clone());

        if c.button_failures >= MAX_CONSECUTIVE_FAILURES {
            Some(AbortReason::ButtonFailures(c.button_failures))
        } else if c.low_score_reads >= MAX_LOW_SCORE_READS {
            Some(AbortReason::LowScoreReads(c.low_score_reads))
        } else if c.duplicate_reads >= MAX_DUPLICATE_READS {
            Some(AbortReason::DuplicateReads(c.duplicate_reads))
        } else {
            None
        }
    }
}
