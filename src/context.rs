//! Process-wide context, built once at startup and shared by handle.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use crate::config::ConfigStore;
use crate::essence::action::{DEPRECATED, LOCKED, UNDEPRECATED, UNLOCKED};
use crate::essence::Label;
use crate::game_data::GameData;
use crate::paths;
use crate::platform::Platform;
use crate::vision::{DirectoryTemplates, LinearStretch, Recognizer, TemplateSource};

/// Label of the screen landmark template.
pub const ESSENCE_PAGE_LABEL: &str = "essence_page";

/// Everything the scanner and the one-shot recognizer need.
pub struct AppContext {
    pub platform: Arc<dyn Platform>,
    pub config: Arc<ConfigStore>,
    pub game_data: Arc<GameData>,
    pub stat_recognizer: Recognizer,
    pub icon_recognizer: Recognizer,
    pub screen_recognizer: Recognizer,
}

/// Recognizer for the three stat text regions.
pub fn stat_recognizer(labels: Vec<Label>, source: Arc<dyn TemplateSource>) -> Recognizer {
    Recognizer::new("stats", labels, source)
        .with_preprocessing(LinearStretch::TEXT_REGION, LinearStretch::TEXT_TEMPLATE)
}

/// Recognizer for the lock and deprecate buttons.
pub fn icon_recognizer(source: Arc<dyn TemplateSource>) -> Recognizer {
    let labels = [LOCKED, UNLOCKED, DEPRECATED, UNDEPRECATED]
        .iter()
        .map(|s| s.to_string())
        .collect();
    Recognizer::new("icons", labels, source)
}

/// Recognizer for the landmark that identifies the essence page.
pub fn screen_recognizer(source: Arc<dyn TemplateSource>) -> Recognizer {
    Recognizer::new("screen", vec![ESSENCE_PAGE_LABEL.to_string()], source)
}

impl AppContext {
    /// Loads config, game tables and templates from the executable's directory.
    pub fn load(platform: Arc<dyn Platform>) -> Result<Self> {
        let config = Arc::new(ConfigStore::load(paths::get_config_path()));
        let language = config.get().language;
        let game_data = Arc::new(GameData::load(&paths::get_table_dir(), &language)?);
        Ok(Self::from_dirs(
            platform,
            config,
            game_data,
            &paths::get_stat_template_dir(),
            &paths::get_icon_template_dir(),
            &paths::get_screen_template_dir(),
        ))
    }

    /// Builds the recognizers from template directories.
    pub fn from_dirs(
        platform: Arc<dyn Platform>,
        config: Arc<ConfigStore>,
        game_data: Arc<GameData>,
        stat_dir: &Path,
        icon_dir: &Path,
        screen_dir: &Path,
    ) -> Self {
        let stat_labels = game_data.stat_labels.all();
        Self {
            stat_recognizer: stat_recognizer(stat_labels, Arc::new(DirectoryTemplates::new(stat_dir))),
            icon_recognizer: icon_recognizer(Arc::new(DirectoryTemplates::new(icon_dir))),
            screen_recognizer: screen_recognizer(Arc::new(DirectoryTemplates::new(screen_dir))),
            platform,
            config,
            game_data,
        }
    }

    /// Loads every recognizer's templates now rather than at the first scan.
    pub fn preload_templates(&self) {
        self.stat_recognizer.load_templates();
        self.icon_recognizer.load_templates();
        self.screen_recognizer.load_templates();
    }
}
