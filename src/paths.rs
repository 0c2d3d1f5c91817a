use std::path::PathBuf;
use std::sync::OnceLock;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Returns the logs directory: `<exe_dir>/logs/`
pub fn get_logs_dir() -> PathBuf {
    get_exe_dir().join("logs")
}

/// Returns the screenshots directory: `<exe_dir>/screenshots/`
pub fn get_screenshots_dir() -> PathBuf {
    get_exe_dir().join("screenshots")
}

/// Returns the config file path: `<exe_dir>/config.json`
pub fn get_config_path() -> PathBuf {
    get_exe_dir().join("config.json")
}

/// Returns the template root: `<exe_dir>/resources/templates/`
pub fn get_templates_dir() -> PathBuf {
    get_exe_dir().join("resources").join("templates")
}

/// Stat text templates, one or more per gem term id.
pub fn get_stat_template_dir() -> PathBuf {
    get_templates_dir().join("stats")
}

/// Lock / deprecate toggle icon templates.
pub fn get_icon_template_dir() -> PathBuf {
    get_templates_dir().join("icons")
}

/// Screen landmark templates used to confirm the inventory page is showing.
pub fn get_screen_template_dir() -> PathBuf {
    get_templates_dir().join("screen")
}

/// Returns the game table directory: `<exe_dir>/resources/data/TableCfg/`
pub fn get_table_dir() -> PathBuf {
    get_exe_dir().join("resources").join("data").join("TableCfg")
}

/// Ensures all output directories exist. Call at startup.
pub fn ensure_directories() -> std::io::Result<()> {
    std::fs::create_dir_all(get_logs_dir())?;
    std::fs::create_dir_all(get_screenshots_dir())?;
    Ok(())
}
