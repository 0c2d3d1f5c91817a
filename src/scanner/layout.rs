//! Fixed screen geometry of the essence inventory page at 1920x1080.
//!
//! All coordinates are client-area pixels.

use crate::platform::ClientRect;

/// The only client size the layout below is valid for.
pub const EXPECTED_CLIENT_SIZE: (u32, u32) = (1920, 1080);

pub const GRID_COLUMNS: usize = 9;
pub const GRID_ROWS: usize = 5;
pub const CELLS_PER_PAGE: usize = GRID_COLUMNS * GRID_ROWS;

const GRID_X: (i32, i32) = (128, 1374);
const GRID_Y: (i32, i32) = (196, 819);

pub const ATTRIBUTE_STATS_ROI: ClientRect = ClientRect::from_corners(1508, 358, 1700, 390);
pub const SECONDARY_STATS_ROI: ClientRect = ClientRect::from_corners(1508, 416, 1700, 448);
pub const SKILL_STATS_ROI: ClientRect = ClientRect::from_corners(1508, 468, 1700, 500);

pub const LOCK_BUTTON_ROI: ClientRect = ClientRect::from_corners(1800, 286, 1840, 326);
pub const DEPRECATE_BUTTON_ROI: ClientRect = ClientRect::from_corners(1750, 286, 1790, 326);

/// Page title area that identifies the essence inventory.
pub const SCREEN_LANDMARK_ROI: ClientRect = ClientRect::from_corners(40, 20, 360, 70);

/// First grid cell's icon, compared before and after scrolling.
pub const PAGE_LANDMARK_ROI: ClientRect = ClientRect::new(78, 146, 100, 100);

/// Wheel notches for one page; negative scrolls down.
pub const PAGE_SCROLL_TICKS: i32 = -5;

/// `n` evenly spaced values from `start` to `end` inclusive, truncated to integers.
fn linspace(start: i32, end: i32, n: usize) -> Vec<i32> {
    if n <= 1 {
        return vec![start];
    }
    let step = (end - start) as f64 / (n - 1) as f64;
    (0..n).map(|i| (start as f64 + step * i as f64) as i32).collect()
}

/// Click positions of every grid cell, row by row.
pub fn grid_positions() -> Vec<(i32, i32)> {
    let xs = linspace(GRID_X.0, GRID_X.1, GRID_COLUMNS);
    let ys = linspace(GRID_Y.0, GRID_Y.1, GRID_ROWS);
    ys.iter()
        .flat_map(|&y| xs.iter().map(move |&x| (x, y)))
        .collect()
}

/// Where to park the cursor while scrolling the grid.
pub fn scroll_anchor() -> (i32, i32) {
    ((GRID_X.0 + GRID_X.1) / 2, (GRID_Y.0 + GRID_Y.1) / 2)
}
