//! Scripted stand-in for the game window used by scanner tests.
//!
//! Every label is drawn as a deterministic noise patch the exact size of the
//! region it appears in, so a correct read scores 1.0 and anything else scores
//! close to 0.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use image::{DynamicImage, GrayImage, Luma};

use crate::config::{Config, ConfigStore, Policy, ScannerConfig};
use crate::context::{icon_recognizer, screen_recognizer, AppContext, ESSENCE_PAGE_LABEL};
use crate::essence::action::{DEPRECATED, LOCKED, UNDEPRECATED, UNLOCKED};
use crate::essence::{EssenceStats, Label};
use crate::game_data::{GameData, StatLabels, WeaponStatsTable};
use crate::platform::{ClientRect, InputSynth, RegionCapture, SurfaceHandle, WindowLocator};
use crate::scanner::layout::{
    self, ATTRIBUTE_STATS_ROI, CELLS_PER_PAGE, DEPRECATE_BUTTON_ROI, EXPECTED_CLIENT_SIZE,
    LOCK_BUTTON_ROI, PAGE_LANDMARK_ROI, SCREEN_LANDMARK_ROI, SECONDARY_STATS_ROI, SKILL_STATS_ROI,
};
use crate::vision::{MemoryTemplates, Recognizer};

pub const ATTRIBUTES: [&str; 2] = ["agi", "str"];
pub const SECONDARIES: [&str; 2] = ["atk", "hp"];
pub const SKILLS: [&str; 3] = ["assault", "crush", "pursuit"];

fn seed_of(text: &str) -> u32 {
    // FNV-1a
    text.bytes()
        .fold(2166136261u32, |h, b| (h ^ b as u32).wrapping_mul(16777619))
}

pub fn noise(width: u32, height: u32, seed: u32) -> GrayImage {
    let mut state = seed | 1;
    GrayImage::from_fn(width, height, |_, _| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        Luma([(state >> 8) as u8])
    })
}

/// The patch drawn for `label` inside `rect`.
pub fn label_image(label: &str, rect: ClientRect) -> GrayImage {
    noise(rect.width, rect.height, seed_of(label))
}

fn blank(rect: ClientRect) -> GrayImage {
    GrayImage::from_pixel(rect.width, rect.height, Luma([128]))
}

/// Mixes `a` with weight `w` and `b` with weight `1 - w`.
fn blend(a: &GrayImage, b: &GrayImage, w: f32) -> GrayImage {
    GrayImage::from_fn(a.width(), a.height(), |x, y| {
        let v = w * a.get_pixel(x, y)[0] as f32 + (1.0 - w) * b.get_pixel(x, y)[0] as f32;
        Luma([v.round() as u8])
    })
}

#[derive(Clone, Debug)]
pub struct FakeItem {
    pub stats: EssenceStats,
    pub locked: bool,
    pub deprecated: bool,
}

impl FakeItem {
    pub fn new(attribute: &str, secondary: &str, skill: &str) -> Self {
        Self {
            stats: EssenceStats::complete(attribute, secondary, skill),
            locked: false,
            deprecated: false,
        }
    }

    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }
}

/// `count` items whose consecutive triples all differ and match no weapon.
pub fn filler_items(count: usize) -> Vec<FakeItem> {
    (0..count)
        .map(|i| {
            // secondary/attribute order swapped so no weapon matches positionally
            let item = FakeItem::new(SECONDARIES[i % 2], ATTRIBUTES[(i / 2) % 2], SKILLS[i % 3]);
            if i % 2 == 0 { item.locked() } else { item }
        })
        .collect()
}

#[derive(Debug, Default)]
struct FakeState {
    items: Vec<FakeItem>,
    page: usize,
    selected: Option<usize>,
    grid_clicks: usize,
    clicks: Vec<(i32, i32)>,
    scrolls: usize,
    wobble: bool,
}

/// A fake game client implementing every platform trait.
pub struct FakeGame {
    state: Mutex<FakeState>,
    pub present: bool,
    pub client_size: (u32, u32),
    pub on_essence_page: bool,
    /// Window loses focus once this many grid cells were clicked
    pub lose_focus_after: Option<usize>,
    /// Item indices whose buttons render unreadable
    pub unreadable_icons: HashSet<usize>,
    /// Item indices whose stat panel renders unreadable
    pub unreadable_stats: HashSet<usize>,
    /// Scrolling only nudges the list without turning the page
    pub ambiguous_scroll: bool,
    /// Every click fails
    pub broken_input: bool,
    /// This many first scroll events are lost
    pub drop_scrolls: usize,
}

impl FakeGame {
    pub fn new(items: Vec<FakeItem>) -> Self {
        Self {
            state: Mutex::new(FakeState {
                items,
                ..FakeState::default()
            }),
            present: true,
            client_size: EXPECTED_CLIENT_SIZE,
            on_essence_page: true,
            lose_focus_after: None,
            unreadable_icons: HashSet::new(),
            unreadable_stats: HashSet::new(),
            ambiguous_scroll: false,
            broken_input: false,
            drop_scrolls: 0,
        }
    }

    fn page_count(state: &FakeState) -> usize {
        state.items.len().div_ceil(CELLS_PER_PAGE).max(1)
    }

    pub fn clicks(&self) -> Vec<(i32, i32)> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub fn grid_clicks(&self) -> usize {
        self.state.lock().unwrap().grid_clicks
    }

    pub fn button_clicks(&self) -> Vec<(i32, i32)> {
        let buttons = [LOCK_BUTTON_ROI.center(), DEPRECATE_BUTTON_ROI.center()];
        self.clicks()
            .into_iter()
            .filter(|c| buttons.contains(c))
            .collect()
    }

    pub fn scrolls(&self) -> usize {
        self.state.lock().unwrap().scrolls
    }

    pub fn item(&self, index: usize) -> FakeItem {
        self.state.lock().unwrap().items[index].clone()
    }

    pub fn stat_templates() -> MemoryTemplates {
        let mut templates = MemoryTemplates::new();
        for label in ATTRIBUTES.iter().chain(&SECONDARIES).chain(&SKILLS) {
            templates.insert(*label, DynamicImage::ImageLuma8(label_image(label, ATTRIBUTE_STATS_ROI)));
        }
        templates
    }

    pub fn icon_templates() -> MemoryTemplates {
        MemoryTemplates::new()
            .with(LOCKED, DynamicImage::ImageLuma8(label_image(LOCKED, LOCK_BUTTON_ROI)))
            .with(UNLOCKED, DynamicImage::ImageLuma8(label_image(UNLOCKED, LOCK_BUTTON_ROI)))
            .with(DEPRECATED, DynamicImage::ImageLuma8(label_image(DEPRECATED, DEPRECATE_BUTTON_ROI)))
            .with(
                UNDEPRECATED,
                DynamicImage::ImageLuma8(label_image(UNDEPRECATED, DEPRECATE_BUTTON_ROI)),
            )
    }

    pub fn screen_templates() -> MemoryTemplates {
        MemoryTemplates::new().with(
            ESSENCE_PAGE_LABEL,
            DynamicImage::ImageLuma8(label_image(ESSENCE_PAGE_LABEL, SCREEN_LANDMARK_ROI)),
        )
    }

    fn render(&self, state: &FakeState, rect: ClientRect) -> GrayImage {
        if rect == SCREEN_LANDMARK_ROI {
            return if self.on_essence_page {
                label_image(ESSENCE_PAGE_LABEL, rect)
            } else {
                label_image("inventory_other", rect)
            };
        }
        if rect == PAGE_LANDMARK_ROI {
            let page = label_image(&format!("page_{}", state.page), rect);
            return if state.wobble {
                blend(&page, &label_image("wobble", rect), 0.71)
            } else {
                page
            };
        }

        let Some(index) = state.selected else {
            return blank(rect);
        };
        let item = &state.items[index];

        let slot = if rect == ATTRIBUTE_STATS_ROI {
            Some(&item.stats.attribute)
        } else if rect == SECONDARY_STATS_ROI {
            Some(&item.stats.secondary)
        } else if rect == SKILL_STATS_ROI {
            Some(&item.stats.skill)
        } else {
            None
        };
        if let Some(slot) = slot {
            return match slot {
                Some(label) if !self.unreadable_stats.contains(&index) => {
                    label_image(label, ATTRIBUTE_STATS_ROI)
                }
                _ => blank(rect),
            };
        }

        if self.unreadable_icons.contains(&index) {
            return blank(rect);
        }
        if rect == LOCK_BUTTON_ROI {
            label_image(if item.locked { LOCKED } else { UNLOCKED }, rect)
        } else if rect == DEPRECATE_BUTTON_ROI {
            label_image(if item.deprecated { DEPRECATED } else { UNDEPRECATED }, rect)
        } else {
            blank(rect)
        }
    }
}

impl WindowLocator for FakeGame {
    fn find_target_surface(&self, _allowed_titles: &[String]) -> Option<SurfaceHandle> {
        self.present.then_some(SurfaceHandle(42))
    }

    fn is_foreground(&self, _handle: SurfaceHandle) -> bool {
        match self.lose_focus_after {
            Some(n) => self.state.lock().unwrap().grid_clicks < n,
            None => true,
        }
    }

    fn client_size(&self, _handle: SurfaceHandle) -> Result<(u32, u32)> {
        Ok(self.client_size)
    }
}

impl RegionCapture for FakeGame {
    fn capture_region(&self, _handle: SurfaceHandle, rect: ClientRect) -> Result<DynamicImage> {
        let state = self.state.lock().map_err(|_| anyhow!("fake state poisoned"))?;
        Ok(DynamicImage::ImageLuma8(self.render(&state, rect)))
    }
}

impl InputSynth for FakeGame {
    fn click(&self, _handle: SurfaceHandle, x: i32, y: i32) -> Result<()> {
        if self.broken_input {
            return Err(anyhow!("SendInput rejected the event"));
        }
        let mut state = self.state.lock().map_err(|_| anyhow!("fake state poisoned"))?;
        state.clicks.push((x, y));

        if let Some(cell) = layout::grid_positions().iter().position(|&p| p == (x, y)) {
            state.grid_clicks += 1;
            let index = state.page * CELLS_PER_PAGE + cell;
            // Empty slots leave the previous selection on the detail panel
            if index < state.items.len() {
                state.selected = Some(index);
            }
        } else if let Some(index) = state.selected {
            if (x, y) == LOCK_BUTTON_ROI.center() {
                state.items[index].locked = !state.items[index].locked;
            } else if (x, y) == DEPRECATE_BUTTON_ROI.center() {
                state.items[index].deprecated = !state.items[index].deprecated;
            }
        }
        Ok(())
    }

    fn scroll(&self, _handle: SurfaceHandle, _x: i32, _y: i32, ticks: i32) -> Result<()> {
        let mut state = self.state.lock().map_err(|_| anyhow!("fake state poisoned"))?;
        state.scrolls += 1;
        if state.scrolls <= self.drop_scrolls {
            return Ok(());
        }
        if self.ambiguous_scroll {
            state.wobble = !state.wobble;
            return Ok(());
        }
        if ticks < 0 && state.page + 1 < Self::page_count(&state) {
            state.page += 1;
            state.selected = None;
        }
        Ok(())
    }
}

/// Weapon table shared by the scanner tests.
pub fn weapons() -> WeaponStatsTable {
    WeaponStatsTable::from_entries([
        ("wpn_a".to_string(), EssenceStats::complete("agi", "atk", "assault")),
        ("wpn_b".to_string(), EssenceStats::complete("str", "hp", "crush")),
    ])
}

/// A context wired to `game`, with zero delays and identity preprocessing.
pub fn context(game: Arc<FakeGame>, policy: Policy) -> AppContext {
    let config = Config {
        policy,
        scanner: ScannerConfig::immediate(),
        ..Config::default()
    };
    let labels: Vec<Label> = ATTRIBUTES
        .iter()
        .chain(&SECONDARIES)
        .chain(&SKILLS)
        .map(|s| s.to_string())
        .collect();
    let stat_labels = StatLabels {
        attribute: ATTRIBUTES.iter().map(|s| s.to_string()).collect(),
        secondary: SECONDARIES.iter().map(|s| s.to_string()).collect(),
        skill: SKILLS.iter().map(|s| s.to_string()).collect(),
    };

    AppContext {
        platform: game,
        config: Arc::new(ConfigStore::in_memory(config)),
        game_data: Arc::new(GameData::from_weapons(weapons(), stat_labels)),
        stat_recognizer: Recognizer::new("stats", labels, Arc::new(FakeGame::stat_templates())),
        icon_recognizer: icon_recognizer(Arc::new(FakeGame::icon_templates())),
        screen_recognizer: screen_recognizer(Arc::new(FakeGame::screen_templates())),
    }
}
