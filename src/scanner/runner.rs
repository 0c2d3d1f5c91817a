//! Scanner runner - owns the background scan worker.
//!
//! At most one scan runs at a time. Starting while a scan is running
//! interrupts it instead of starting a second one.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};

use crate::context::AppContext;
use crate::essence::action::{action_for, decide};
use crate::essence::{ActionsTaken, Judgement, QualityJudge, TreasureSummary};
use crate::scanner::scan::{read_selected, ScanContext};
use crate::scanner::state::{AbortReason, CellReading, ScanOutcome, ScanState};
use crate::screenshot::save_stat_regions;

/// Cooperative cancellation flag shared with the worker.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What [`Scanner::start`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A scan was already running and has been asked to stop
    Interrupting,
}

/// Final account of one scan.
#[derive(Clone, Debug)]
pub struct ScanReport {
    pub outcome: ScanOutcome,
    pub pages_scanned: u32,
    pub cells_visited: u32,
    /// Every synthesized click, grid cells included
    pub clicks: u32,
    pub started_at: DateTime<Local>,
    pub elapsed: Duration,
    pub summary: TreasureSummary,
}

/// Runs one scan to completion on the calling thread.
///
/// The report is built and logged no matter how the scan ends.
pub fn run_scan(ctx: &AppContext, cancel: CancelToken, state: &Mutex<ScanState>) -> ScanReport {
    let started_at = Local::now();
    let start = Instant::now();
    let mut scan = ScanContext::new(ctx, cancel);

    loop {
        if let Ok(mut s) = state.lock() {
            *s = scan.state.clone();
        }

        match scan.step() {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                tracing::error!("Scan error: {:#}", e);
                scan.abort(AbortReason::Platform(format!("{:#}", e)));
            }
        }
    }

    let outcome = scan
        .outcome
        .take()
        .unwrap_or(ScanOutcome::Aborted(AbortReason::Platform("no outcome".to_string())));
    let report = ScanReport {
        outcome,
        pages_scanned: scan.session.page,
        cells_visited: scan.session.cells_visited,
        clicks: scan.session.clicks,
        started_at,
        elapsed: start.elapsed(),
        summary: std::mem::take(&mut scan.session.summary),
    };
    log_report(ctx, &report);
    report
}

fn log_report(ctx: &AppContext, report: &ScanReport) {
    tracing::info!(
        "Essence scan finished ({}) after {} page(s), {} cell(s), {} click(s) in {:.1}s",
        report.outcome,
        report.pages_scanned,
        report.cells_visited,
        report.clicks,
        report.elapsed.as_secs_f32()
    );
    let summary = report
        .summary
        .render(|weapon_id| ctx.game_data.item_name(weapon_id));
    for line in summary.lines() {
        tracing::info!("{}", line);
    }
}

/// Handle to the background scan worker.
pub struct Scanner {
    ctx: Arc<AppContext>,
    running: Arc<AtomicBool>,
    state: Arc<Mutex<ScanState>>,
    cancel: Mutex<CancelToken>,
    worker: Mutex<Option<JoinHandle<ScanReport>>>,
}

impl Scanner {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self {
            ctx,
            running: Arc::new(AtomicBool::new(false)),
            state: Arc::new(Mutex::new(ScanState::Idle)),
            cancel: Mutex::new(CancelToken::new()),
            worker: Mutex::new(None),
        }
    }

    /// Starts a scan, or interrupts the one in progress.
    pub fn start(&self) -> StartOutcome {
        // Held until the new token is installed so a concurrent stop sees it
        let mut cancel = match self.cancel.lock() {
            Ok(cancel) => cancel,
            Err(poisoned) => poisoned.into_inner(),
        };

        if self.running.swap(true, Ordering::SeqCst) {
            tracing::info!("Interrupting current scan...");
            cancel.cancel();
            return StartOutcome::Interrupting;
        }

        // The previous worker has finished; reap it
        if let Some(old) = self.worker.lock().ok().and_then(|mut w| w.take()) {
            let _ = old.join();
        }

        let token = CancelToken::new();
        *cancel = token.clone();

        let ctx = Arc::clone(&self.ctx);
        let running = Arc::clone(&self.running);
        let state = Arc::clone(&self.state);
        let handle = thread::spawn(move || {
            let report = run_scan(&ctx, token, &state);
            if let Ok(mut s) = state.lock() {
                *s = ScanState::Idle;
            }
            running.store(false, Ordering::SeqCst);
            tracing::info!("Scan thread finished");
            report
        });

        if let Ok(mut worker) = self.worker.lock() {
            *worker = Some(handle);
        }
        drop(cancel);
        StartOutcome::Started
    }

    /// Asks the running scan to stop at its next checkpoint.
    pub fn stop(&self) {
        match self.cancel.lock() {
            Ok(cancel) => cancel.cancel(),
            Err(poisoned) => poisoned.into_inner().cancel(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Current state, for display.
    pub fn state(&self) -> ScanState {
        self.state
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Blocks until the current worker exits and returns its report.
    ///
    /// Returns `None` if no scan was started since the last wait.
    pub fn wait(&self) -> Option<ScanReport> {
        let handle = self.worker.lock().ok()?.take()?;
        match handle.join() {
            Ok(report) => Some(report),
            Err(_) => {
                tracing::error!("Scan thread panicked");
                self.running.store(false, Ordering::SeqCst);
                None
            }
        }
    }
}

/// One-shot reading of the currently selected item.
#[derive(Clone, Debug)]
pub struct CurrentItem {
    pub reading: CellReading,
    pub judgement: Judgement,
    /// Clicks the scanner would make, if both buttons were read
    pub planned: Option<ActionsTaken>,
}

/// Reads and judges the selected item without clicking anything.
///
/// With `dump_dir`, the preprocessed stat regions are saved there too.
pub fn recognize_current(ctx: &AppContext, dump_dir: Option<&Path>) -> Result<CurrentItem> {
    let titles = ctx.config.get().window_titles;
    let handle = ctx
        .platform
        .find_target_surface(&titles)
        .ok_or_else(|| anyhow!("{}", AbortReason::NoTargetSurface))?;
    if !ctx.platform.is_foreground(handle) {
        return Err(anyhow!("{}", AbortReason::NotForeground));
    }

    if let Some(dir) = dump_dir {
        if let Err(e) = save_stat_regions(ctx, handle, dir) {
            tracing::warn!("Failed to save stat regions: {:#}", e);
        }
    }

    let reading = read_selected(ctx, handle)?;
    let stats = reading.essence();
    let policy = ctx.config.policy();
    let judgement = QualityJudge::new(&policy, &ctx.game_data.weapons).evaluate(&stats);
    let planned = reading
        .toggles()
        .map(|(lock, deprecate)| decide(action_for(judgement.verdict, &policy), lock, deprecate));

    match planned {
        Some(actions) => tracing::info!("[{}] {}, would do: {}", stats, judgement, actions),
        None => tracing::info!(
            "[{}] {}, buttons unreadable ({}, {})",
            stats,
            judgement,
            reading.lock,
            reading.deprecate
        ),
    }

    Ok(CurrentItem {
        reading,
        judgement,
        planned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Action, Policy};
    use crate::essence::{EssenceStats, MatchSource, Verdict};
    use crate::platform::{InputSynth, SurfaceHandle};
    use crate::scanner::layout::{self, LOCK_BUTTON_ROI};
    use crate::scanner::scan::MAX_SCROLL_ATTEMPTS;
    use crate::scanner::testing::{context, filler_items, FakeGame, FakeItem};
    use crate::screenshot::STAT_REGION_FILES;

    fn keep_policy() -> Policy {
        Policy {
            wanted_action: Action::Keep,
            discard_action: Action::Keep,
            ..Policy::default()
        }
    }

    fn wpn_a() -> FakeItem {
        FakeItem::new("agi", "atk", "assault")
    }

    fn wpn_b() -> FakeItem {
        FakeItem::new("str", "hp", "crush")
    }

    fn scan(game: FakeGame, policy: Policy) -> (Arc<FakeGame>, ScanReport) {
        let game = Arc::new(game);
        let ctx = context(Arc::clone(&game), policy);
        let report = run_scan(&ctx, CancelToken::new(), &Mutex::new(ScanState::Idle));
        (game, report)
    }

    #[test]
    fn test_full_page_then_unchanged_landmark_ends_scan() {
        let (game, report) = scan(FakeGame::new(filler_items(45)), keep_policy());

        assert_eq!(report.outcome, ScanOutcome::ReachedEnd);
        assert!(report.outcome.is_normal());
        assert_eq!(report.pages_scanned, 1);
        assert_eq!(report.cells_visited, 45);
        assert_eq!(report.clicks, 45);
        // the end is only declared once every attempt left the list unchanged
        assert_eq!(game.scrolls(), MAX_SCROLL_ATTEMPTS as usize);
        assert!(game.button_clicks().is_empty());
        assert!(report.summary.is_empty());
    }

    #[test]
    fn test_two_pages_are_both_scanned() {
        let (game, report) = scan(FakeGame::new(filler_items(90)), keep_policy());

        assert_eq!(report.outcome, ScanOutcome::ReachedEnd);
        assert_eq!(report.pages_scanned, 2);
        assert_eq!(report.cells_visited, 90);
        assert_eq!(game.grid_clicks(), 90);
        // one scroll that turned the page, then the attempts at the bottom
        assert_eq!(game.scrolls(), 1 + MAX_SCROLL_ATTEMPTS as usize);
    }

    #[test]
    fn test_dropped_scroll_is_retried() {
        let mut game = FakeGame::new(filler_items(90));
        game.drop_scrolls = 1;
        let (game, report) = scan(game, keep_policy());

        assert_eq!(report.outcome, ScanOutcome::ReachedEnd);
        assert_eq!(report.pages_scanned, 2);
        assert_eq!(report.cells_visited, 90);
        assert_eq!(game.scrolls(), 2 + MAX_SCROLL_ATTEMPTS as usize);
    }

    #[test]
    fn test_wanted_triple_is_counted_once_per_scan() {
        let mut items = filler_items(45);
        items[0] = wpn_a();
        items[10] = wpn_a();
        items[20] = wpn_a().locked();
        items[30] = wpn_b();
        let (game, report) = scan(FakeGame::new(items), Policy::default());

        assert_eq!(report.outcome, ScanOutcome::ReachedEnd);
        for index in [0, 10, 20, 30] {
            assert!(game.item(index).locked, "item {index} should be locked");
        }
        // discardable filler gets unlocked
        assert!(!game.item(2).locked);
        assert!(!game.item(44).locked);

        let summary = &report.summary;
        assert_eq!(summary.distinct_triples(), 2);
        let group = summary
            .get(&EssenceStats::complete("agi", "atk", "assault"))
            .unwrap();
        assert_eq!(group.count, 1);
        assert_eq!(group.cells, 3);
        assert_eq!(group.weapons, vec!["wpn_a".to_string()]);
    }

    #[test]
    fn test_empty_slots_do_not_add_to_the_tally() {
        let (game, report) = scan(FakeGame::new(vec![wpn_a()]), Policy::default());

        assert_eq!(
            report.outcome,
            ScanOutcome::Aborted(AbortReason::DuplicateReads(2))
        );
        assert_eq!(report.cells_visited, 4);
        assert!(game.item(0).locked);
        assert_eq!(game.button_clicks(), vec![LOCK_BUTTON_ROI.center()]);

        let group = report
            .summary
            .get(&EssenceStats::complete("agi", "atk", "assault"))
            .unwrap();
        assert_eq!(group.count, 1);
        assert_eq!(group.cells, 1);
        assert_eq!(report.summary.total_cells(), 1);
    }

    #[test]
    fn test_lost_focus_stops_before_next_click() {
        let mut items = filler_items(45);
        items[2] = wpn_a();
        items[5] = wpn_a();
        items[20] = wpn_b();
        items[30] = wpn_a();
        let mut game = FakeGame::new(items);
        game.lose_focus_after = Some(9);
        let (game, report) = scan(game, Policy::default());

        assert_eq!(report.outcome, ScanOutcome::Aborted(AbortReason::LostFocus));
        assert_eq!(report.cells_visited, 9);
        assert_eq!(game.grid_clicks(), 9);

        let grid = layout::grid_positions();
        assert!(game.clicks().iter().all(|c| !grid[9..].contains(c)));
        assert!(game.item(2).locked);
        assert!(game.item(5).locked);
        assert!(!game.item(30).locked);
        assert!(game.item(10).locked, "unvisited filler keeps its lock");

        let summary = &report.summary;
        assert_eq!(summary.distinct_triples(), 1);
        assert_eq!(summary.total_cells(), 2);
        assert!(summary.get(&EssenceStats::complete("str", "hp", "crush")).is_none());
    }

    #[test]
    fn test_overridden_weapon_gets_discard_action() {
        let policy = Policy {
            discard_overrides: vec!["wpn_a".to_string()],
            wanted_action: Action::Keep,
            discard_action: Action::Lock,
            ..Policy::default()
        };
        let (game, report) = scan(FakeGame::new(vec![wpn_a()]), policy);

        assert!(game.item(0).locked);
        assert_eq!(game.button_clicks(), vec![LOCK_BUTTON_ROI.center()]);
        assert!(report.summary.is_empty());
        // the empty slots keep showing the same item
        assert_eq!(
            report.outcome,
            ScanOutcome::Aborted(AbortReason::DuplicateReads(2))
        );
        assert_eq!(report.cells_visited, 4);
    }

    #[test]
    fn test_partial_page_aborts_on_repeated_reading() {
        let (game, report) = scan(FakeGame::new(filler_items(20)), keep_policy());

        assert_eq!(
            report.outcome,
            ScanOutcome::Aborted(AbortReason::DuplicateReads(2))
        );
        assert_eq!(report.cells_visited, 22);
        assert_eq!(game.scrolls(), 0);
    }

    #[test]
    fn test_button_failure_ceiling_is_exact() {
        let mut game = FakeGame::new(filler_items(45));
        game.unreadable_icons = [3, 4, 5].into_iter().collect();
        let (_, report) = scan(game, keep_policy());
        assert_eq!(
            report.outcome,
            ScanOutcome::Aborted(AbortReason::ButtonFailures(3))
        );
        assert_eq!(report.cells_visited, 6);

        let mut game = FakeGame::new(filler_items(45));
        game.unreadable_icons = [3, 4, 10, 11].into_iter().collect();
        let (_, report) = scan(game, keep_policy());
        assert_eq!(report.outcome, ScanOutcome::ReachedEnd);
        assert_eq!(report.cells_visited, 45);
    }

    #[test]
    fn test_unreadable_buttons_are_not_clicked() {
        let mut items = filler_items(45);
        items[3] = wpn_a();
        let mut game = FakeGame::new(items);
        game.unreadable_icons = [3].into_iter().collect();
        let (game, report) = scan(game, Policy::default());

        assert_eq!(report.outcome, ScanOutcome::ReachedEnd);
        assert!(!game.item(3).locked);
        assert!(report.summary.is_empty());
    }

    #[test]
    fn test_low_score_ceiling() {
        let mut game = FakeGame::new(filler_items(45));
        game.unreadable_stats = (0..5).collect();
        let (_, report) = scan(game, keep_policy());

        assert_eq!(
            report.outcome,
            ScanOutcome::Aborted(AbortReason::LowScoreReads(5))
        );
        assert_eq!(report.cells_visited, 5);
    }

    #[test]
    fn test_missing_window_aborts_without_clicking() {
        let mut game = FakeGame::new(filler_items(45));
        game.present = false;
        let (game, report) = scan(game, keep_policy());

        assert_eq!(
            report.outcome,
            ScanOutcome::Aborted(AbortReason::NoTargetSurface)
        );
        assert!(game.clicks().is_empty());
        assert_eq!(report.pages_scanned, 0);
    }

    #[test]
    fn test_wrong_resolution_aborts_without_clicking() {
        let mut game = FakeGame::new(filler_items(45));
        game.client_size = (1280, 720);
        let (game, report) = scan(game, keep_policy());

        assert_eq!(
            report.outcome,
            ScanOutcome::Aborted(AbortReason::WrongResolution {
                width: 1280,
                height: 720
            })
        );
        assert!(game.clicks().is_empty());
    }

    #[test]
    fn test_wrong_screen_aborts_without_clicking() {
        let mut game = FakeGame::new(filler_items(45));
        game.on_essence_page = false;
        let (game, report) = scan(game, keep_policy());

        assert!(matches!(
            report.outcome,
            ScanOutcome::Aborted(AbortReason::WrongScreen { .. })
        ));
        assert!(game.clicks().is_empty());
    }

    #[test]
    fn test_cancelled_before_first_cell() {
        let game = Arc::new(FakeGame::new(filler_items(45)));
        let ctx = context(Arc::clone(&game), keep_policy());
        let cancel = CancelToken::new();
        cancel.cancel();

        let report = run_scan(&ctx, cancel, &Mutex::new(ScanState::Idle));

        assert_eq!(report.outcome, ScanOutcome::Interrupted);
        assert!(report.outcome.is_normal());
        assert_eq!(report.cells_visited, 0);
        assert!(game.clicks().is_empty());
    }

    #[test]
    fn test_inconclusive_scrolls_fail_pagination() {
        let mut game = FakeGame::new(filler_items(45));
        game.ambiguous_scroll = true;
        let (game, report) = scan(game, keep_policy());

        assert_eq!(report.outcome, ScanOutcome::PaginationFailed);
        assert_eq!(game.scrolls(), MAX_SCROLL_ATTEMPTS as usize);
        assert_eq!(report.cells_visited, 45);
    }

    #[test]
    fn test_platform_error_ends_scan_as_aborted() {
        let mut game = FakeGame::new(filler_items(45));
        game.broken_input = true;
        let (_, report) = scan(game, keep_policy());

        match report.outcome {
            ScanOutcome::Aborted(AbortReason::Platform(msg)) => {
                assert!(msg.contains("SendInput"))
            }
            other => panic!("unexpected outcome {other}"),
        }
        assert_eq!(report.cells_visited, 0);
    }

    #[test]
    fn test_recognize_current_never_clicks() {
        let game = Arc::new(FakeGame::new(vec![wpn_a()]));
        let ctx = context(Arc::clone(&game), Policy::default());
        let (x, y) = layout::grid_positions()[0];
        game.click(SurfaceHandle(42), x, y).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let current = recognize_current(&ctx, Some(dir.path())).unwrap();

        for name in STAT_REGION_FILES {
            assert!(dir.path().join(name).exists(), "{name} not saved");
        }

        assert_eq!(current.judgement.verdict, Verdict::Wanted);
        assert_eq!(current.judgement.source, MatchSource::Weapon("wpn_a".to_string()));
        let planned = current.planned.unwrap();
        assert!(planned.lock_clicked);
        assert!(!planned.deprecate_clicked);
        assert_eq!(game.clicks().len(), 1);
        assert!(!game.item(0).locked);
    }

    #[test]
    fn test_recognize_current_requires_window() {
        let mut game = FakeGame::new(vec![wpn_a()]);
        game.present = false;
        let ctx = context(Arc::new(game), Policy::default());

        assert!(recognize_current(&ctx, None).is_err());
    }

    #[test]
    fn test_second_start_interrupts() {
        let game = Arc::new(FakeGame::new(filler_items(45)));
        let ctx = context(Arc::clone(&game), keep_policy());
        let mut config = ctx.config.get();
        config.scanner.settle_delay_ms = 50;
        ctx.config.update(config).unwrap();
        let scanner = Scanner::new(Arc::new(ctx));

        assert_eq!(scanner.start(), StartOutcome::Started);
        assert!(scanner.is_running());
        assert_eq!(scanner.start(), StartOutcome::Interrupting);

        let report = scanner.wait().unwrap();
        assert_eq!(report.outcome, ScanOutcome::Interrupted);
        assert!(report.cells_visited < 45);
        assert!(!scanner.is_running());
        assert_eq!(scanner.state(), ScanState::Idle);
        assert!(scanner.wait().is_none());
    }

    #[test]
    fn test_stop_reaches_the_scan_just_started() {
        let game = Arc::new(FakeGame::new(filler_items(45)));
        let ctx = context(Arc::clone(&game), keep_policy());
        let mut config = ctx.config.get();
        config.scanner.settle_delay_ms = 50;
        ctx.config.update(config).unwrap();
        let scanner = Scanner::new(Arc::new(ctx));

        // a finished scan leaves a stale token behind
        assert_eq!(scanner.start(), StartOutcome::Started);
        scanner.stop();
        scanner.wait().unwrap();

        assert_eq!(scanner.start(), StartOutcome::Started);
        scanner.stop();
        let report = scanner.wait().unwrap();
        assert_eq!(report.outcome, ScanOutcome::Interrupted);
        assert!(report.cells_visited < 45);
    }

    #[test]
    fn test_scanner_can_run_again_after_finishing() {
        let game = Arc::new(FakeGame::new(filler_items(45)));
        let scanner = Scanner::new(Arc::new(context(Arc::clone(&game), keep_policy())));

        assert_eq!(scanner.start(), StartOutcome::Started);
        assert_eq!(scanner.wait().unwrap().outcome, ScanOutcome::ReachedEnd);
        assert_eq!(scanner.start(), StartOutcome::Started);
        assert_eq!(scanner.wait().unwrap().outcome, ScanOutcome::ReachedEnd);
        assert_eq!(game.grid_clicks(), 90);
    }
}
