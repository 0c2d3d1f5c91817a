//! Window, capture and input collaborators.
//!
//! The scanner only talks to the game through these traits. The Win32
//! implementation lives in [`win32`]; tests drive the scanner with a scripted
//! fake instead.

#[cfg(windows)]
pub mod win32;

#[cfg(windows)]
pub use self::win32::Win32Platform;

use anyhow::Result;
use image::DynamicImage;

/// Opaque handle of the game's top-level window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(pub usize);

/// Rectangle in client-area pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClientRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ClientRect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// From top-left and bottom-right corners (exclusive).
    pub const fn from_corners(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            x: x1,
            y: y1,
            width: (x2 - x1) as u32,
            height: (y2 - y1) as u32,
        }
    }

    pub const fn center(&self) -> (i32, i32) {
        (self.x + self.width as i32 / 2, self.y + self.height as i32 / 2)
    }
}

pub trait WindowLocator: Send + Sync {
    /// First visible window whose title is one of `allowed_titles`.
    fn find_target_surface(&self, allowed_titles: &[String]) -> Option<SurfaceHandle>;
    fn is_foreground(&self, handle: SurfaceHandle) -> bool;
    /// Client area size in pixels.
    fn client_size(&self, handle: SurfaceHandle) -> Result<(u32, u32)>;
}

pub trait RegionCapture: Send + Sync {
    /// Pixel-exact copy of `rect`, taken synchronously.
    fn capture_region(&self, handle: SurfaceHandle, rect: ClientRect) -> Result<DynamicImage>;
}

/// Synthesized input. Coordinates are client-relative.
pub trait InputSynth: Send + Sync {
    fn click(&self, handle: SurfaceHandle, x: i32, y: i32) -> Result<()>;
    /// Positive `ticks` scroll up, negative scroll down.
    fn scroll(&self, handle: SurfaceHandle, x: i32, y: i32, ticks: i32) -> Result<()>;
}

/// Everything the scanner needs from the host system.
pub trait Platform: WindowLocator + RegionCapture + InputSynth {}

impl<T: WindowLocator + RegionCapture + InputSynth> Platform for T {}
