//! Saved captures for authoring templates.
//!
//! Full client screenshots get a timestamped name. The preprocessed stat
//! regions are overwritten on each one-shot recognition, so the latest ones
//! can be cropped into new templates.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;

use crate::context::AppContext;
use crate::platform::{ClientRect, RegionCapture, SurfaceHandle, WindowLocator};
use crate::scanner::layout::{ATTRIBUTE_STATS_ROI, SECONDARY_STATS_ROI, SKILL_STATS_ROI};

/// File names of the dumped stat regions, in slot order.
pub const STAT_REGION_FILES: [&str; 3] = [
    "attribute_stats_roi.png",
    "secondary_stats_roi.png",
    "skill_stats_roi.png",
];

/// Saves the whole client area as `screenshot_<timestamp>.png` in `dir`.
pub fn save_client_screenshot<P>(platform: &P, handle: SurfaceHandle, dir: &Path) -> Result<PathBuf>
where
    P: WindowLocator + RegionCapture + ?Sized,
{
    let (width, height) = platform.client_size(handle)?;
    let image = platform.capture_region(handle, ClientRect::new(0, 0, width, height))?;

    std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let timestamp = Local::now().format("%Y%m%d_%H%M%S_%3f");
    let path = dir.join(format!("screenshot_{}.png", timestamp));
    image
        .save(&path)
        .with_context(|| format!("save {}", path.display()))?;

    tracing::info!("Screenshot saved: {}", path.display());
    Ok(path)
}

/// Saves the three stat regions as the stat recognizer sees them.
pub fn save_stat_regions(ctx: &AppContext, handle: SurfaceHandle, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;

    let rois = [ATTRIBUTE_STATS_ROI, SECONDARY_STATS_ROI, SKILL_STATS_ROI];
    let mut saved = Vec::with_capacity(rois.len());
    for (rect, name) in rois.into_iter().zip(STAT_REGION_FILES) {
        let region = ctx.platform.capture_region(handle, rect)?;
        let gray = ctx.stat_recognizer.preprocess(&region)?;
        let path = dir.join(name);
        gray.save(&path)
            .with_context(|| format!("save {}", path.display()))?;
        saved.push(path);
    }
    tracing::debug!("Stat regions saved to {}", dir.display());
    Ok(saved)
}
