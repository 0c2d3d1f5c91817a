//! Scan state machine.
//!
//! Sequence: Idle → Scanning → (Paginating → Scanning)* → done, with Aborting
//! reachable from any state. Interrupts are honored between cells and between
//! pages, never in the middle of a cell.

use std::thread;
use std::time::Duration;

use anyhow::Result;
use image::GrayImage;

use crate::config::ScannerConfig;
use crate::context::AppContext;
use crate::essence::{ActionExecutor, QualityJudge};
use crate::platform::{ClientRect, SurfaceHandle};
use crate::scanner::layout::{
    self, ATTRIBUTE_STATS_ROI, DEPRECATE_BUTTON_ROI, EXPECTED_CLIENT_SIZE, LOCK_BUTTON_ROI,
    PAGE_LANDMARK_ROI, PAGE_SCROLL_TICKS, SCREEN_LANDMARK_ROI, SECONDARY_STATS_ROI,
    SKILL_STATS_ROI,
};
use crate::scanner::runner::CancelToken;
use crate::scanner::state::{
    AbortReason, CellReading, PanelState, ScanOutcome, ScanSession, ScanState,
};
use crate::vision::ncc::similarity;
use crate::vision::preprocess::region_to_gray;
use crate::vision::Recognition;

/// The screen landmark must score above this for a scan to start.
pub const SCREEN_MATCH_THRESH: f32 = 0.8;
/// Page landmark similarity below this means the list scrolled.
pub const SCROLL_CHANGED_THRESH: f32 = 0.9;
/// Page landmark similarity at or above this means the list cannot scroll further.
pub const SCROLL_UNCHANGED_THRESH: f32 = 0.95;
/// Scroll attempts before pagination is given up.
pub const MAX_SCROLL_ATTEMPTS: u32 = 3;

/// Result of one pagination round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageTurn {
    Next,
    End,
    Failed,
}

/// Reads the five detail-panel regions of the currently selected item.
pub fn read_selected(ctx: &AppContext, handle: SurfaceHandle) -> Result<CellReading> {
    let classify_stat = |rect: ClientRect| -> Result<Recognition> {
        let region = ctx.platform.capture_region(handle, rect)?;
        Ok(ctx.stat_recognizer.classify(&region)?)
    };
    let classify_icon = |rect: ClientRect| -> Result<Recognition> {
        let region = ctx.platform.capture_region(handle, rect)?;
        Ok(ctx.icon_recognizer.classify(&region)?)
    };

    Ok(CellReading {
        stats: [
            classify_stat(ATTRIBUTE_STATS_ROI)?,
            classify_stat(SECONDARY_STATS_ROI)?,
            classify_stat(SKILL_STATS_ROI)?,
        ],
        lock: classify_icon(LOCK_BUTTON_ROI)?,
        deprecate: classify_icon(DEPRECATE_BUTTON_ROI)?,
    })
}

fn sleep_ms(ms: u64) {
    if ms > 0 {
        thread::sleep(Duration::from_millis(ms));
    }
}

/// Scan context holding the session and the state machine position.
pub struct ScanContext<'a> {
    pub state: ScanState,
    pub session: ScanSession,
    pub outcome: Option<ScanOutcome>,
    ctx: &'a AppContext,
    cancel: CancelToken,
    timing: ScannerConfig,
    handle: Option<SurfaceHandle>,
    grid: Vec<(i32, i32)>,
    /// Next cell to visit on the current page
    cell: usize,
}

impl<'a> ScanContext<'a> {
    pub fn new(ctx: &'a AppContext, cancel: CancelToken) -> Self {
        Self {
            state: ScanState::Idle,
            session: ScanSession::new(),
            outcome: None,
            timing: ctx.config.get().scanner,
            ctx,
            cancel,
            handle: None,
            grid: layout::grid_positions(),
            cell: 0,
        }
    }

    /// Forces the machine into `Aborting`; the next step finishes the scan.
    pub fn abort(&mut self, reason: AbortReason) {
        self.state = ScanState::Aborting(reason);
    }

    /// Advances the state machine by one step.
    ///
    /// Returns `Ok(true)` while the scan continues. Errors come from the
    /// platform; the caller decides how to end the scan.
    pub fn step(&mut self) -> Result<bool> {
        match self.state.clone() {
            ScanState::Idle => {
                match self.check_preconditions()? {
                    Ok(handle) => {
                        self.handle = Some(handle);
                        self.session.begin_page();
                        self.cell = 0;
                        tracing::info!(
                            "Starting essence scan: {} positions per page",
                            self.grid.len()
                        );
                        self.state = ScanState::Scanning {
                            page: self.session.page,
                        };
                    }
                    Err(reason) => self.abort(reason),
                }
                Ok(true)
            }

            ScanState::Scanning { page } => {
                if self.cell >= self.grid.len() {
                    tracing::info!(page, "Page complete");
                    self.state = ScanState::Paginating { page };
                    return Ok(true);
                }
                self.visit_cell()
            }

            ScanState::Paginating { page } => {
                if self.cancel.is_cancelled() {
                    tracing::info!(page, "Scan interrupted between pages");
                    self.outcome = Some(ScanOutcome::Interrupted);
                    return Ok(false);
                }
                match self.turn_page()? {
                    PageTurn::Next => {
                        self.session.begin_page();
                        self.cell = 0;
                        tracing::info!(page = self.session.page, "Scrolled to next page");
                        self.state = ScanState::Scanning {
                            page: self.session.page,
                        };
                        Ok(true)
                    }
                    PageTurn::End => {
                        tracing::info!(page, "Reached the end of the list");
                        self.outcome = Some(ScanOutcome::ReachedEnd);
                        Ok(false)
                    }
                    PageTurn::Failed => {
                        tracing::warn!(page, "Could not scroll to the next page, stopping");
                        self.outcome = Some(ScanOutcome::PaginationFailed);
                        Ok(false)
                    }
                }
            }

            ScanState::Aborting(reason) => {
                tracing::warn!("Scan aborted: {}", reason);
                self.outcome = Some(ScanOutcome::Aborted(reason));
                Ok(false)
            }
        }
    }

    /// Outer error: the platform failed. Inner error: the scan must not start.
    fn check_preconditions(&self) -> Result<std::result::Result<SurfaceHandle, AbortReason>> {
        let titles = self.ctx.config.get().window_titles;
        let Some(handle) = self.ctx.platform.find_target_surface(&titles) else {
            return Ok(Err(AbortReason::NoTargetSurface));
        };
        if !self.ctx.platform.is_foreground(handle) {
            return Ok(Err(AbortReason::NotForeground));
        }
        let (width, height) = self.ctx.platform.client_size(handle)?;
        if (width, height) != EXPECTED_CLIENT_SIZE {
            return Ok(Err(AbortReason::WrongResolution { width, height }));
        }
        let landmark = self.ctx.platform.capture_region(handle, SCREEN_LANDMARK_ROI)?;
        let recognition = self.ctx.screen_recognizer.classify(&landmark)?;
        if recognition.score <= SCREEN_MATCH_THRESH {
            return Ok(Err(AbortReason::WrongScreen {
                score: recognition.score,
            }));
        }
        Ok(Ok(handle))
    }

    fn visit_cell(&mut self) -> Result<bool> {
        let Some(handle) = self.handle else {
            self.abort(AbortReason::NoTargetSurface);
            return Ok(true);
        };
        let page = self.session.page;
        let index = self.cell;
        let total = self.grid.len();

        if !self.ctx.platform.is_foreground(handle) {
            tracing::info!(page, cell = index + 1, "Game window is no longer in the foreground");
            self.abort(AbortReason::LostFocus);
            return Ok(true);
        }
        if self.cancel.is_cancelled() {
            tracing::info!(page, "Scan interrupted at position {}/{}", index + 1, total);
            self.outcome = Some(ScanOutcome::Interrupted);
            return Ok(false);
        }

        let (x, y) = self.grid[index];
        self.ctx.platform.click(handle, x, y)?;
        self.session.clicks += 1;
        self.session.cells_visited += 1;
        self.cell += 1;
        sleep_ms(self.timing.settle_delay_ms);

        let reading = read_selected(self.ctx, handle)?;
        let stats = reading.essence();
        tracing::debug!(
            page,
            cell = index + 1,
            "[{}] lock {} deprecate {}",
            stats,
            reading.lock,
            reading.deprecate
        );

        if let Some(reason) = self.session.observe(&reading) {
            self.abort(reason);
            return Ok(true);
        }

        let Some((lock, deprecate)) = reading.toggles() else {
            tracing::warn!(
                page,
                cell = index + 1,
                "Could not read lock/deprecate buttons ({}, {}), skipping",
                reading.lock,
                reading.deprecate
            );
            sleep_ms(self.timing.cell_interval_ms);
            return Ok(true);
        };

        if self.session.is_stale_panel(&stats, lock, deprecate) {
            tracing::info!(
                "[{:02}/{}] page {}: panel unchanged, empty slot",
                index + 1,
                total,
                page
            );
            sleep_ms(self.timing.cell_interval_ms);
            return Ok(true);
        }

        // Read per cell so policy edits apply mid-scan
        let policy = self.ctx.config.policy();
        let judge = QualityJudge::new(&policy, &self.ctx.game_data.weapons);
        let judgement = judge.judge_into(&stats, &mut self.session.summary);

        let executor = ActionExecutor::new(
            &*self.ctx.platform,
            handle,
            LOCK_BUTTON_ROI.center(),
            DEPRECATE_BUTTON_ROI.center(),
        );
        let taken = executor.apply(judgement.verdict, lock, deprecate, &policy)?;
        self.session.clicks += taken.clicks();
        self.session.last_panel = Some(PanelState::after(stats.clone(), lock, deprecate, taken));

        tracing::info!(
            "[{:02}/{}] page {}: {} -> {}, actions: {}",
            index + 1,
            total,
            page,
            stats,
            judgement,
            taken
        );

        sleep_ms(self.timing.cell_interval_ms);
        Ok(true)
    }

    fn capture_page_landmark(&self, handle: SurfaceHandle) -> Result<GrayImage> {
        let region = self.ctx.platform.capture_region(handle, PAGE_LANDMARK_ROI)?;
        Ok(region_to_gray(&region)?)
    }

    /// Scrolls one page and classifies what happened to the page landmark.
    ///
    /// An unchanged landmark is retried, since a wheel event can be dropped.
    /// The list has ended only if every attempt left it unchanged.
    fn turn_page(&mut self) -> Result<PageTurn> {
        let Some(handle) = self.handle else {
            return Ok(PageTurn::Failed);
        };
        let (ax, ay) = layout::scroll_anchor();
        let mut last_score = 0.0;

        for attempt in 1..=MAX_SCROLL_ATTEMPTS {
            let before = self.capture_page_landmark(handle)?;
            self.ctx.platform.scroll(handle, ax, ay, PAGE_SCROLL_TICKS)?;
            sleep_ms(self.timing.scroll_settle_ms);
            let after = self.capture_page_landmark(handle)?;

            let score = similarity(&before, &after).unwrap_or(1.0);
            tracing::debug!(attempt, score, "Page landmark compared");

            if score < SCROLL_CHANGED_THRESH {
                return Ok(PageTurn::Next);
            }
            last_score = score;
            tracing::info!(
                "Scroll attempt {}/{} left the list unchanged (similarity {:.3})",
                attempt,
                MAX_SCROLL_ATTEMPTS,
                score
            );
        }

        if last_score >= SCROLL_UNCHANGED_THRESH {
            Ok(PageTurn::End)
        } else {
            Ok(PageTurn::Failed)
        }
    }
}
