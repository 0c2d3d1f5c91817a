//! Essence inventory scanner.
//!
//! Clicks through the fixed inventory grid page by page, reads each item's
//! stats and toggle buttons, judges it, and corrects its lock/deprecate state
//! according to the policy. Also provides the one-shot recognizer used by the
//! "recognize once" hotkey.

pub mod layout;
pub mod runner;
pub mod scan;
pub mod state;

#[cfg(test)]
pub mod testing;

pub use runner::{recognize_current, run_scan, CancelToken, CurrentItem, ScanReport, Scanner, StartOutcome};
pub use scan::{ScanContext, PageTurn};
pub use state::{AbortReason, CellReading, ScanOutcome, ScanSession, ScanState};
