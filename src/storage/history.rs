use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

use crate::models::History;

/// Trait for clipboard history persistence
pub trait HistoryStorage {
    /// Load clipboard history from storage
    fn load(&self) -> Result<History>;

    /// Save clipboard history to storage
    fn save(&self, history: &History) -> Result<()>;

    /// Get the storage file path
    fn path(&self) -> &PathBuf;
}

/// JSON-file implementation of HistoryStorage
/// Uses atomic write pattern with .tmp file for safety
pub struct JsonHistoryStorage {
    path: PathBuf,
    default_max_items: usize,
}

impl JsonHistoryStorage {
    pub fn new(path: PathBuf, default_max_items: usize) -> Self {
        JsonHistoryStorage {
            path,
            default_max_items,
        }
    }

    /// Preserve an unparseable file as a `.bad` sibling for post-mortem,
    /// then start over empty.
    fn quarantine(&self, reason: &str) -> History {
        let bad_path = self.path.with_extension("json.bad");
        log::warn!(
            "history file corrupt ({}), preserving as {:?}",
            reason,
            bad_path
        );
        if let Err(e) = fs::rename(&self.path, &bad_path) {
            log::error!("failed to preserve corrupt history file: {}", e);
        }
        History::new(self.default_max_items)
    }
}

impl HistoryStorage for JsonHistoryStorage {
    fn load(&self) -> Result<History> {
        // Missing file is a fresh start, not an error.
        if !self.path.exists() {
            log::info!(
                "history file not found at {:?}, starting with empty history",
                self.path
            );
            return Ok(History::new(self.default_max_items));
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read history from {:?}", self.path))?;

        let value: Value = match serde_json::from_str(&contents) {
            Ok(value) => value,
            Err(e) => return Ok(self.quarantine(&e.to_string())),
        };

        match History::from_json(&value) {
            Ok(history) => {
                log::info!("loaded {} entries from {:?}", history.len(), self.path);
                Ok(history)
            }
            Err(e) => Ok(self.quarantine(&e.to_string())),
        }
    }

    fn save(&self, history: &History) -> Result<()> {
        let json = serde_json::to_string_pretty(&history.to_json())
            .context("Failed to serialize clipboard history")?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        // Atomic write pattern: write to .tmp, then rename
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json)
            .with_context(|| format!("Failed to write to temporary file {:?}", tmp_path))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to rename {:?} to {:?}", tmp_path, self.path))?;

        log::debug!("saved {} entries to {:?}", history.len(), self.path);
        Ok(())
    }

    fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_history_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "clipkeep-history-test-{}-{}",
            tag,
            std::process::id()
        ))
    }

    #[test]
    fn test_load_missing_file_returns_empty() {
        let storage = JsonHistoryStorage::new(
            PathBuf::from("/nonexistent/clipboard-history.json"),
            50,
        );
        let history = storage.load().unwrap();
        assert!(history.is_empty());
        assert_eq!(history.max_items(), 50);
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = temp_history_dir("round-trip");
        let storage = JsonHistoryStorage::new(dir.join("clipboard-history.json"), 50);

        let mut history = History::new(50);
        let id = history.add_text("persisted entry").unwrap();
        history.pin(&id);
        storage.save(&history).unwrap();

        // No partial file left behind under the temp name.
        assert!(!dir.join("clipboard-history.json.tmp").exists());

        let loaded = storage.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.get_by_id(&id).unwrap().pinned());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_corrupt_file_quarantined_as_bad_sibling() {
        let dir = temp_history_dir("corrupt");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("clipboard-history.json");
        fs::write(&path, "{{{ definitely not json").unwrap();

        let storage = JsonHistoryStorage::new(path.clone(), 50);
        let history = storage.load().unwrap();
        assert!(history.is_empty());
        assert!(!path.exists());
        assert!(dir.join("clipboard-history.json.bad").exists());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_non_object_document_quarantined() {
        let dir = temp_history_dir("non-object");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("clipboard-history.json");
        fs::write(&path, "[1, 2, 3]").unwrap();

        let storage = JsonHistoryStorage::new(path, 50);
        let history = storage.load().unwrap();
        assert!(history.is_empty());
        assert!(dir.join("clipboard-history.json.bad").exists());

        fs::remove_dir_all(&dir).ok();
    }
}
