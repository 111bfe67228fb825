use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::error::ErrorKind;
use crate::hotkey::chord::Chord;
use crate::models::history::{DEFAULT_MAX_ITEMS, MAX_MAX_ITEMS, MIN_MAX_ITEMS};

pub const CONFIG_VERSION: &str = "1.0.0";
pub const DEFAULT_HOTKEY: &str = "Meta+V";
pub const MIN_WINDOW_WIDTH: u32 = 200;
pub const MIN_WINDOW_HEIGHT: u32 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowPosition {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

/// Typed change notifications, drained via [`Configuration::take_events`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigEvent {
    MaxHistoryItemsChanged(usize),
    HotkeyChanged(String),
    AutostartChanged(bool),
    ShowNotificationsChanged(bool),
    WindowPositionChanged(WindowPosition),
    WindowSizeChanged(WindowSize),
    Saved,
    Error { kind: ErrorKind, message: String },
}

/// On-disk shape of config.json. Unknown keys are ignored on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ConfigFile {
    version: String,
    max_history_items: i64,
    hotkey: String,
    autostart: bool,
    show_notifications: bool,
    window_position: WindowPosition,
    window_size: WindowSize,
}

impl Default for ConfigFile {
    fn default() -> Self {
        ConfigFile {
            version: CONFIG_VERSION.to_string(),
            max_history_items: DEFAULT_MAX_ITEMS as i64,
            hotkey: DEFAULT_HOTKEY.to_string(),
            autostart: false,
            show_notifications: true,
            window_position: WindowPosition { x: 100, y: 100 },
            window_size: WindowSize {
                width: 400,
                height: 600,
            },
        }
    }
}

/// Validated, persisted user preferences.
///
/// Every field change is validated (or clamped) before commit and queues one
/// typed [`ConfigEvent`]. Loading never fails: a missing or unparseable file
/// falls back to defaults, and individually invalid fields are replaced.
#[derive(Debug)]
pub struct Configuration {
    path: PathBuf,
    file: ConfigFile,
    pending: Vec<ConfigEvent>,
}

fn clamp_history_items(n: i64) -> usize {
    n.clamp(MIN_MAX_ITEMS as i64, MAX_MAX_ITEMS as i64) as usize
}

fn clamp_window_size(size: WindowSize) -> WindowSize {
    WindowSize {
        width: size.width.max(MIN_WINDOW_WIDTH),
        height: size.height.max(MIN_WINDOW_HEIGHT),
    }
}

impl Configuration {
    /// Fresh configuration with all defaults, persisted at `path`.
    pub fn new(path: PathBuf) -> Self {
        Configuration {
            path,
            file: ConfigFile::default(),
            pending: Vec::new(),
        }
    }

    /// Load from `path`, applying defaults for a missing file, an unparseable
    /// file, and any individually invalid field.
    pub fn load(path: PathBuf) -> Self {
        let mut file = ConfigFile::default();

        if path.exists() {
            match fs::read_to_string(&path) {
                Ok(contents) => match serde_json::from_str::<ConfigFile>(&contents) {
                    Ok(parsed) => file = parsed,
                    Err(e) => {
                        log::warn!("config file {:?} unparseable, using defaults: {}", path, e)
                    }
                },
                Err(e) => log::warn!("failed to read config {:?}, using defaults: {}", path, e),
            }
        } else {
            log::info!("config file {:?} not found, using defaults", path);
        }

        if file.version != CONFIG_VERSION {
            log::info!(
                "config version {:?} differs from {:?}, loading best-effort",
                file.version,
                CONFIG_VERSION
            );
            file.version = CONFIG_VERSION.to_string();
        }
        file.max_history_items = clamp_history_items(file.max_history_items) as i64;
        if !Self::is_valid_hotkey(&file.hotkey) {
            log::warn!(
                "configured hotkey {:?} is invalid, falling back to {:?}",
                file.hotkey,
                DEFAULT_HOTKEY
            );
            file.hotkey = DEFAULT_HOTKEY.to_string();
        }
        file.window_size = clamp_window_size(file.window_size);

        Configuration {
            path,
            file,
            pending: Vec::new(),
        }
    }

    /// Write atomically: serialize to a sibling temp path, then rename.
    pub fn save(&mut self) -> Result<()> {
        match self.write_to_disk() {
            Ok(()) => {
                self.pending.push(ConfigEvent::Saved);
                log::debug!("saved configuration to {:?}", self.path);
                Ok(())
            }
            Err(e) => {
                self.pending.push(ConfigEvent::Error {
                    kind: ErrorKind::IoFailure,
                    message: format!("{:#}", e),
                });
                log::error!("failed to save configuration: {:#}", e);
                Err(e)
            }
        }
    }

    fn write_to_disk(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        let json = serde_json::to_string_pretty(&self.file)
            .context("Failed to serialize configuration")?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json)
            .with_context(|| format!("Failed to write temporary file {:?}", tmp_path))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to rename {:?} to {:?}", tmp_path, self.path))?;
        Ok(())
    }

    /// Grammar check for a hotkey string: `MOD(+MOD)*+KEY`.
    pub fn is_valid_hotkey(s: &str) -> bool {
        Chord::parse(s).is_ok()
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn version(&self) -> &str {
        &self.file.version
    }

    pub fn max_history_items(&self) -> usize {
        self.file.max_history_items as usize
    }

    pub fn hotkey(&self) -> &str {
        &self.file.hotkey
    }

    pub fn autostart(&self) -> bool {
        self.file.autostart
    }

    pub fn show_notifications(&self) -> bool {
        self.file.show_notifications
    }

    pub fn window_position(&self) -> WindowPosition {
        self.file.window_position
    }

    pub fn window_size(&self) -> WindowSize {
        self.file.window_size
    }

    /// Set the history bound, silently clamped to [10, 100].
    pub fn set_max_history_items(&mut self, n: usize) {
        let clamped = clamp_history_items(n as i64);
        if clamped as i64 != self.file.max_history_items {
            self.file.max_history_items = clamped as i64;
            self.pending.push(ConfigEvent::MaxHistoryItemsChanged(clamped));
        }
    }

    /// Set the hotkey string; rejected (returning false) when it fails the
    /// grammar. State is unchanged on rejection.
    pub fn set_hotkey(&mut self, hotkey: &str) -> bool {
        if !Self::is_valid_hotkey(hotkey) {
            self.pending.push(ConfigEvent::Error {
                kind: ErrorKind::Validation,
                message: format!("invalid hotkey {:?}", hotkey),
            });
            return false;
        }
        if hotkey != self.file.hotkey {
            self.file.hotkey = hotkey.to_string();
            self.pending.push(ConfigEvent::HotkeyChanged(hotkey.to_string()));
        }
        true
    }

    pub fn set_autostart(&mut self, autostart: bool) {
        if autostart != self.file.autostart {
            self.file.autostart = autostart;
            self.pending.push(ConfigEvent::AutostartChanged(autostart));
        }
    }

    pub fn set_show_notifications(&mut self, show: bool) {
        if show != self.file.show_notifications {
            self.file.show_notifications = show;
            self.pending.push(ConfigEvent::ShowNotificationsChanged(show));
        }
    }

    pub fn set_window_position(&mut self, position: WindowPosition) {
        if position != self.file.window_position {
            self.file.window_position = position;
            self.pending.push(ConfigEvent::WindowPositionChanged(position));
        }
    }

    /// Set the popup size, clamped to the 200x300 minimum.
    pub fn set_window_size(&mut self, size: WindowSize) {
        let clamped = clamp_window_size(size);
        if clamped != self.file.window_size {
            self.file.window_size = clamped;
            self.pending.push(ConfigEvent::WindowSizeChanged(clamped));
        }
    }

    /// Drain queued change events in emission order.
    pub fn take_events(&mut self) -> Vec<ConfigEvent> {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "clipkeep-config-test-{}-{}",
            tag,
            std::process::id()
        ))
    }

    #[test]
    fn test_defaults() {
        let config = Configuration::new(PathBuf::from("/nonexistent/config.json"));
        assert_eq!(config.version(), "1.0.0");
        assert_eq!(config.max_history_items(), 50);
        assert_eq!(config.hotkey(), "Meta+V");
        assert!(!config.autostart());
        assert!(config.show_notifications());
        assert_eq!(config.window_position(), WindowPosition { x: 100, y: 100 });
        assert_eq!(
            config.window_size(),
            WindowSize {
                width: 400,
                height: 600
            }
        );
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = Configuration::load(PathBuf::from("/nonexistent/dir/config.json"));
        assert_eq!(config.max_history_items(), 50);
        assert_eq!(config.hotkey(), "Meta+V");
    }

    #[test]
    fn test_load_unparseable_file_uses_defaults() {
        let dir = temp_config_dir("unparseable");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let config = Configuration::load(path);
        assert_eq!(config.max_history_items(), 50);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_clamps_invalid_fields() {
        let dir = temp_config_dir("invalid-fields");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        fs::write(
            &path,
            r#"{ "version": "9.9.9", "maxHistoryItems": 5000, "hotkey": "++",
                 "windowSize": {"width": 10, "height": 10}, "futureKey": true }"#,
        )
        .unwrap();

        let config = Configuration::load(path);
        assert_eq!(config.max_history_items(), 100);
        assert_eq!(config.hotkey(), "Meta+V");
        assert_eq!(
            config.window_size(),
            WindowSize {
                width: 200,
                height: 300
            }
        );

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_save_round_trip() {
        let dir = temp_config_dir("round-trip");
        let path = dir.join("nested").join("config.json");

        let mut config = Configuration::new(path.clone());
        config.set_max_history_items(75);
        config.set_hotkey("Ctrl+Shift+C");
        config.set_autostart(true);
        config.save().unwrap();

        let events = config.take_events();
        assert!(events.contains(&ConfigEvent::MaxHistoryItemsChanged(75)));
        assert!(events.contains(&ConfigEvent::HotkeyChanged("Ctrl+Shift+C".into())));
        assert!(events.contains(&ConfigEvent::AutostartChanged(true)));
        assert_eq!(events.last(), Some(&ConfigEvent::Saved));

        let reloaded = Configuration::load(path);
        assert_eq!(reloaded.max_history_items(), 75);
        assert_eq!(reloaded.hotkey(), "Ctrl+Shift+C");
        assert!(reloaded.autostart());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_set_hotkey_rejects_invalid() {
        let mut config = Configuration::new(PathBuf::from("/tmp/config.json"));
        assert!(!config.set_hotkey("V"));
        assert!(!config.set_hotkey("Meta+"));
        assert_eq!(config.hotkey(), "Meta+V");
        assert!(config
            .take_events()
            .iter()
            .any(|e| matches!(e, ConfigEvent::Error { kind: ErrorKind::Validation, .. })));
    }

    #[test]
    fn test_unchanged_setter_emits_nothing() {
        let mut config = Configuration::new(PathBuf::from("/tmp/config.json"));
        config.set_max_history_items(50);
        config.set_autostart(false);
        assert!(config.take_events().is_empty());
    }

    #[test]
    fn test_window_size_clamped_to_minimum() {
        let mut config = Configuration::new(PathBuf::from("/tmp/config.json"));
        config.set_window_size(WindowSize {
            width: 50,
            height: 1000,
        });
        assert_eq!(
            config.window_size(),
            WindowSize {
                width: 200,
                height: 1000
            }
        );
    }
}
