//! Lock/deprecate toggle corrections.
//!
//! Clicks are fire-and-forget: nothing is read back after clicking. The next
//! visit to the cell is the only feedback.

use std::fmt;

use anyhow::Result;

use crate::config::{Action, Policy};
use crate::essence::Verdict;
use crate::platform::{InputSynth, SurfaceHandle};

pub const LOCKED: &str = "locked";
pub const UNLOCKED: &str = "unlocked";
pub const DEPRECATED: &str = "deprecated";
pub const UNDEPRECATED: &str = "undeprecated";

/// Observed state of a two-state toggle button.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToggleState {
    On,
    Off,
}

impl ToggleState {
    pub fn from_lock_label(label: &str) -> Option<Self> {
        match label {
            LOCKED => Some(ToggleState::On),
            UNLOCKED => Some(ToggleState::Off),
            _ => None,
        }
    }

    pub fn from_deprecate_label(label: &str) -> Option<Self> {
        match label {
            DEPRECATED => Some(ToggleState::On),
            UNDEPRECATED => Some(ToggleState::Off),
            _ => None,
        }
    }

    /// State after one click, or unchanged if `clicked` is false.
    pub fn after_click(self, clicked: bool) -> Self {
        match (self, clicked) {
            (state, false) => state,
            (ToggleState::On, true) => ToggleState::Off,
            (ToggleState::Off, true) => ToggleState::On,
        }
    }
}

/// Clicks decided for one cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActionsTaken {
    pub lock_clicked: bool,
    pub deprecate_clicked: bool,
}

impl ActionsTaken {
    pub fn any(&self) -> bool {
        self.lock_clicked || self.deprecate_clicked
    }

    pub fn clicks(&self) -> u32 {
        self.lock_clicked as u32 + self.deprecate_clicked as u32
    }
}

impl fmt::Display for ActionsTaken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.lock_clicked, self.deprecate_clicked) {
            (false, false) => write!(f, "none"),
            (true, false) => write!(f, "toggle lock"),
            (false, true) => write!(f, "toggle deprecate"),
            (true, true) => write!(f, "toggle lock, toggle deprecate"),
        }
    }
}

/// The configured action for a verdict.
pub fn action_for(verdict: Verdict, policy: &Policy) -> Action {
    match verdict {
        Verdict::Wanted => policy.wanted_action,
        Verdict::Discardable => policy.discard_action,
    }
}

/// Which toggles `action` needs clicked given their observed states.
pub fn decide(action: Action, lock: ToggleState, deprecate: ToggleState) -> ActionsTaken {
    let lock_clicked = match lock {
        ToggleState::Off => action == Action::Lock,
        ToggleState::On => matches!(action, Action::Unlock | Action::UnlockAndUndeprecate),
    };
    let deprecate_clicked = match deprecate {
        ToggleState::Off => action == Action::Deprecate,
        ToggleState::On => matches!(action, Action::Undeprecate | Action::UnlockAndUndeprecate),
    };
    ActionsTaken {
        lock_clicked,
        deprecate_clicked,
    }
}

/// Synthesizes the clicks [`decide`] asks for.
pub struct ActionExecutor<'a, I: InputSynth + ?Sized> {
    input: &'a I,
    handle: SurfaceHandle,
    lock_button: (i32, i32),
    deprecate_button: (i32, i32),
}

impl<'a, I: InputSynth + ?Sized> ActionExecutor<'a, I> {
    pub fn new(
        input: &'a I,
        handle: SurfaceHandle,
        lock_button: (i32, i32),
        deprecate_button: (i32, i32),
    ) -> Self {
        Self {
            input,
            handle,
            lock_button,
            deprecate_button,
        }
    }

    pub fn apply(
        &self,
        verdict: Verdict,
        lock: ToggleState,
        deprecate: ToggleState,
        policy: &Policy,
    ) -> Result<ActionsTaken> {
        let taken = decide(action_for(verdict, policy), lock, deprecate);
        if taken.lock_clicked {
            self.input.click(self.handle, self.lock_button.0, self.lock_button.1)?;
        }
        if taken.deprecate_clicked {
            self.input
                .click(self.handle, self.deprecate_button.0, self.deprecate_button.1)?;
        }
        Ok(taken)
    }
}
