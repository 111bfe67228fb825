pub mod config;
pub mod history;

use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::PathBuf;

pub use config::{ConfigEvent, Configuration, WindowPosition, WindowSize};
pub use history::{HistoryStorage, JsonHistoryStorage};

/// Application directory name under the XDG base directories.
pub const APP_DIR: &str = "clipboard-manager";

/// History file name inside the config directory.
pub const HISTORY_FILE: &str = "clipboard-history.json";

/// Configuration file name inside the config directory.
pub const CONFIG_FILE: &str = "config.json";

/// Ensure XDG data and config directories exist
/// Returns (data_dir, config_dir)
///
/// XDG Base Directory Specification:
/// - Data: $XDG_DATA_HOME/clipboard-manager (default: ~/.local/share/clipboard-manager)
/// - Config: $XDG_CONFIG_HOME/clipboard-manager (default: ~/.config/clipboard-manager)
///
/// History and configuration live in the config directory; the data
/// directory holds logs.
pub fn ensure_directories() -> Result<(PathBuf, PathBuf)> {
    let home = env::var("HOME").context("HOME environment variable not set")?;
    let home_path = PathBuf::from(home);

    let data_dir = if let Ok(xdg_data) = env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg_data).join(APP_DIR)
    } else {
        home_path.join(".local/share").join(APP_DIR)
    };

    let config_dir = if let Ok(xdg_config) = env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config).join(APP_DIR)
    } else {
        home_path.join(".config").join(APP_DIR)
    };

    fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;
    fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create config directory {:?}", config_dir))?;

    log::debug!("Data directory: {:?}", data_dir);
    log::debug!("Config directory: {:?}", config_dir);

    Ok((data_dir, config_dir))
}
