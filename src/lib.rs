//! Essence Recognizer
//!
//! Walks the game's essence inventory grid, reads each item's three stats by
//! template matching, decides whether it is worth keeping, and fixes its lock
//! and deprecate toggles to match.

pub mod config;
pub mod context;
pub mod essence;
pub mod game_data;
pub mod logging;
pub mod paths;
pub mod platform;
pub mod scanner;
pub mod screenshot;
pub mod vision;
