//! Essence Recognizer
//!
//! Console application driven by global hotkeys:
//! `[` recognizes the selected essence, `]` starts or interrupts a scan,
//! `P` saves a screenshot of the game, `Alt+Delete` exits.

#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    app::run()
}

#[cfg(not(windows))]
fn main() -> anyhow::Result<()> {
    essence_recognizer::logging::init(&essence_recognizer::paths::get_logs_dir())?;
    tracing::error!("Essence Recognizer only runs on Windows");
    Err(anyhow::anyhow!("unsupported platform"))
}

#[cfg(windows)]
mod app {
    use std::sync::Arc;

    use anyhow::Result;
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::HiDpi::{
        SetProcessDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2,
    };
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        RegisterHotKey, UnregisterHotKey, MOD_ALT, MOD_NOREPEAT,
    };
    use windows::Win32::UI::WindowsAndMessaging::{GetMessageW, MSG, WM_HOTKEY};

    use essence_recognizer::context::AppContext;
    use essence_recognizer::platform::Win32Platform;
    use essence_recognizer::scanner::{recognize_current, Scanner, StartOutcome};
    use essence_recognizer::screenshot::save_client_screenshot;
    use essence_recognizer::{logging, paths};

    const HOTKEY_RECOGNIZE: i32 = 1;
    const HOTKEY_SCAN: i32 = 2;
    const HOTKEY_EXIT: i32 = 3;
    const HOTKEY_SCREENSHOT: i32 = 4;

    const VK_OEM_4: u32 = 0xDB; // [
    const VK_OEM_6: u32 = 0xDD; // ]
    const VK_DELETE: u32 = 0x2E;
    const VK_P: u32 = 0x50;

    pub fn run() -> Result<()> {
        paths::ensure_directories()?;
        logging::init(&paths::get_logs_dir())?;

        // Client sizes and capture coordinates must be physical pixels
        unsafe {
            if let Err(e) = SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2) {
                tracing::warn!("Failed to set DPI awareness: {}", e);
            }
        }

        let ctx = Arc::new(AppContext::load(Arc::new(Win32Platform::new()))?);
        ctx.preload_templates();
        let scanner = Scanner::new(Arc::clone(&ctx));

        unsafe {
            RegisterHotKey(HWND::default(), HOTKEY_RECOGNIZE, MOD_NOREPEAT, VK_OEM_4)?;
            RegisterHotKey(HWND::default(), HOTKEY_SCAN, MOD_NOREPEAT, VK_OEM_6)?;
            RegisterHotKey(HWND::default(), HOTKEY_EXIT, MOD_ALT | MOD_NOREPEAT, VK_DELETE)?;
            RegisterHotKey(HWND::default(), HOTKEY_SCREENSHOT, MOD_NOREPEAT, VK_P)?;
        }

        tracing::info!("Essence Recognizer started");
        tracing::info!("Hotkey: [ (recognize selected essence)");
        tracing::info!("Hotkey: ] (start / interrupt scan)");
        tracing::info!("Hotkey: P (save game screenshot)");
        tracing::info!("Hotkey: Alt+Delete (exit)");

        let mut msg = MSG::default();
        unsafe {
            // 0 is WM_QUIT and -1 an error
            while GetMessageW(&mut msg, HWND::default(), 0, 0).0 > 0 {
                if msg.message != WM_HOTKEY {
                    continue;
                }
                match msg.wParam.0 as i32 {
                    HOTKEY_RECOGNIZE => on_recognize(&ctx, &scanner),
                    HOTKEY_SCAN => on_scan(&scanner),
                    HOTKEY_SCREENSHOT => on_screenshot(&ctx),
                    HOTKEY_EXIT => {
                        tracing::info!("Exit hotkey pressed");
                        break;
                    }
                    _ => {}
                }
            }

            let _ = UnregisterHotKey(HWND::default(), HOTKEY_RECOGNIZE);
            let _ = UnregisterHotKey(HWND::default(), HOTKEY_SCAN);
            let _ = UnregisterHotKey(HWND::default(), HOTKEY_EXIT);
            let _ = UnregisterHotKey(HWND::default(), HOTKEY_SCREENSHOT);
        }

        if scanner.is_running() {
            tracing::info!("Waiting for the scan to stop...");
            scanner.stop();
        }
        scanner.wait();
        tracing::info!("Essence Recognizer exited");
        Ok(())
    }

    fn on_recognize(ctx: &AppContext, scanner: &Scanner) {
        if scanner.is_running() {
            tracing::info!("Scan in progress, ignoring recognize hotkey");
            return;
        }
        if let Err(e) = recognize_current(ctx, Some(&paths::get_screenshots_dir())) {
            tracing::warn!("Recognition failed: {:#}", e);
        }
    }

    fn on_screenshot(ctx: &AppContext) {
        let titles = ctx.config.get().window_titles;
        let Some(handle) = ctx.platform.find_target_surface(&titles) else {
            tracing::warn!("Game window not found, no screenshot taken");
            return;
        };
        if let Err(e) = save_client_screenshot(&*ctx.platform, handle, &paths::get_screenshots_dir()) {
            tracing::warn!("Screenshot failed: {:#}", e);
        }
    }

    fn on_scan(scanner: &Scanner) {
        match scanner.start() {
            StartOutcome::Started => tracing::info!("Scan started"),
            StartOutcome::Interrupting => tracing::info!("Scan will stop after the current item"),
        }
    }
}
