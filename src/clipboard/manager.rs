use std::time::{Duration, Instant};

use super::ClipboardSource;
use crate::error::ErrorKind;
use crate::events::Listeners;
use crate::models::{Entry, History, HistoryEvent};
use crate::storage::{ConfigEvent, Configuration, HistoryStorage, JsonHistoryStorage};

/// Quiet period after the last mutation before history hits disk.
/// Rapid mutations coalesce into one write.
pub const SAVE_DELAY: Duration = Duration::from_secs(1);

const MIN_CONTENT_CHARS: usize = 2;
const MAX_CONTENT_CHARS: usize = 10_000;

/// Events re-emitted to the view/controller layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ManagerEvent {
    HistoryChanged,
    ItemAdded(Entry),
    ItemUpdated(Entry),
    ItemRemoved(String),
    ItemPinned(String),
    ItemUnpinned(String),
    MonitoringStateChanged(bool),
    Error { kind: ErrorKind, message: String },
}

/// Noise filter for captured clipboard text.
///
/// Rejects blank and single-character captures, oversized pastes (binary
/// guard), and runs of `'*'` as produced by password field screens. Length is
/// measured in code points of the trimmed text.
pub fn should_add_content(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }
    let chars = trimmed.chars().count();
    if chars < MIN_CONTENT_CHARS || chars > MAX_CONTENT_CHARS {
        return false;
    }
    if trimmed.chars().all(|c| c == '*') {
        return false;
    }
    true
}

/// Observes the clipboard source, feeds History, coordinates deferred
/// persistence and re-emits typed events.
///
/// Single-threaded: the owning event loop drives [`ClipboardManager::poll`]
/// and [`ClipboardManager::tick`]; every callback runs on that loop.
pub struct ClipboardManager {
    history: History,
    config: Configuration,
    source: Box<dyn ClipboardSource>,
    storage: JsonHistoryStorage,
    listeners: Listeners<ManagerEvent>,
    monitoring: bool,
    save_deadline: Option<Instant>,
    pending_load_announce: bool,
}

impl ClipboardManager {
    /// Build the manager: applies the configured history bound and loads
    /// persisted history (a missing file starts empty).
    pub fn new(
        config: Configuration,
        source: Box<dyn ClipboardSource>,
        storage: JsonHistoryStorage,
    ) -> Self {
        let mut history = match storage.load() {
            Ok(history) => history,
            Err(e) => {
                log::error!("failed to load history, starting empty: {:#}", e);
                History::new(config.max_history_items())
            }
        };
        history.set_max_items(config.max_history_items());
        // Load-time evictions are bookkeeping, not user-visible mutations.
        history.take_events();

        ClipboardManager {
            // A non-empty loaded history is announced once the first
            // subscriber attaches; emitting here would reach no one.
            pending_load_announce: !history.is_empty(),
            history,
            config,
            source,
            storage,
            listeners: Listeners::new(),
            monitoring: true,
            save_deadline: None,
        }
    }

    /// Register a callback for every manager event. The first subscriber
    /// also receives a `HistoryChanged` when persisted entries were loaded.
    pub fn on_event(&mut self, callback: impl FnMut(&ManagerEvent) + 'static) {
        self.listeners.subscribe(callback);
        if self.pending_load_announce {
            self.pending_load_announce = false;
            self.listeners.emit(ManagerEvent::HistoryChanged);
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    /// Toggle clipboard observation. While off, change events are dropped,
    /// not queued.
    pub fn set_monitoring(&mut self, monitoring: bool) {
        if self.monitoring != monitoring {
            self.monitoring = monitoring;
            log::info!("clipboard monitoring {}", if monitoring { "on" } else { "off" });
            self.listeners
                .emit(ManagerEvent::MonitoringStateChanged(monitoring));
        }
    }

    /// Drive the *changed* probe once. Changes observed while monitoring is
    /// off are consumed and discarded so they are not replayed later.
    pub fn poll(&mut self) {
        match self.source.poll_changed() {
            Ok(Some(text)) => {
                if self.monitoring {
                    self.ingest(text);
                }
            }
            Ok(None) => {}
            Err(e) => self.emit_error(ErrorKind::Backend, format!("{:#}", e)),
        }
    }

    /// Handle one *changed* notification by reading the source directly.
    pub fn handle_clipboard_change(&mut self) {
        if !self.monitoring {
            return;
        }
        match self.source.text() {
            Ok(text) => self.ingest(text),
            Err(e) => self.emit_error(ErrorKind::Backend, format!("{:#}", e)),
        }
    }

    fn ingest(&mut self, text: String) {
        if !should_add_content(&text) {
            log::debug!("filtered clipboard capture ({} bytes)", text.len());
            return;
        }
        match self.history.add_text(&text) {
            Ok(_) => {
                self.forward_history_events();
                self.schedule_save();
            }
            Err(e) => self.emit_error(ErrorKind::Validation, e.to_string()),
        }
    }

    /// Rewrite the clipboard with an entry's text. The write loops back
    /// through the monitor; dedup collapses the echo into an *updated* event
    /// that moves the entry to the top of its region.
    pub fn select(&mut self, id: &str) -> bool {
        let Some(text) = self.history.get_by_id(id).map(|e| e.text().to_string()) else {
            return false;
        };
        match self.source.set_text(&text) {
            Ok(()) => {
                log::debug!("selected entry {} to clipboard", id);
                true
            }
            Err(e) => {
                self.emit_error(ErrorKind::IoFailure, format!("{:#}", e));
                false
            }
        }
    }

    pub fn pin(&mut self, id: &str) -> bool {
        let changed = self.history.pin(id);
        self.after_mutation(changed);
        changed
    }

    pub fn unpin(&mut self, id: &str) -> bool {
        let changed = self.history.unpin(id);
        self.after_mutation(changed);
        changed
    }

    pub fn toggle_pin(&mut self, id: &str) -> bool {
        let changed = self.history.toggle_pin(id);
        self.after_mutation(changed);
        changed
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let changed = self.history.remove(id);
        self.after_mutation(changed);
        changed
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.after_mutation(true);
    }

    pub fn clear_all(&mut self) {
        self.history.clear_all();
        self.after_mutation(true);
    }

    /// Snapshot of the history in display order.
    pub fn items(&self) -> Vec<Entry> {
        self.history.items()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Configuration {
        &mut self.config
    }

    /// Apply pending configuration changes; a new history bound may evict
    /// entries and schedules a save. Returns the drained events so the
    /// controller can react to the rest (hotkey change, window geometry).
    pub fn apply_config_changes(&mut self) -> Vec<ConfigEvent> {
        let events = self.config.take_events();
        for event in &events {
            if let ConfigEvent::MaxHistoryItemsChanged(n) = event {
                log::info!("history limit changed to {}", n);
                self.history.set_max_items(*n);
                self.forward_history_events();
                self.schedule_save();
            }
        }
        events
    }

    /// Arm (or re-arm) the deferred save timer.
    fn schedule_save(&mut self) {
        self.save_deadline = Some(Instant::now() + SAVE_DELAY);
    }

    /// Deadline for the next pending save, if any. The event loop sleeps no
    /// longer than this.
    pub fn next_save_deadline(&self) -> Option<Instant> {
        self.save_deadline
    }

    /// Fire the deferred save when its deadline has passed.
    pub fn tick(&mut self, now: Instant) {
        if matches!(self.save_deadline, Some(deadline) if deadline <= now) {
            self.flush();
        }
    }

    /// Write pending history state synchronously. A failed write stays
    /// pending and is retried on the next deadline.
    pub fn flush(&mut self) {
        if self.save_deadline.is_none() {
            return;
        }
        match self.storage.save(&self.history) {
            Ok(()) => self.save_deadline = None,
            Err(e) => {
                self.emit_error(ErrorKind::IoFailure, format!("{:#}", e));
                self.save_deadline = Some(Instant::now() + SAVE_DELAY);
            }
        }
    }

    fn after_mutation(&mut self, changed: bool) {
        self.forward_history_events();
        if changed {
            self.schedule_save();
        }
    }

    /// Re-emit history events in order: per-entry events first, the
    /// aggregate `HistoryChanged` last.
    fn forward_history_events(&mut self) {
        for event in self.history.take_events() {
            let mapped = match event {
                HistoryEvent::Added(entry) => Some(ManagerEvent::ItemAdded(entry)),
                HistoryEvent::Updated(entry) => Some(ManagerEvent::ItemUpdated(entry)),
                HistoryEvent::Removed(id) => Some(ManagerEvent::ItemRemoved(id)),
                HistoryEvent::Pinned(id) => Some(ManagerEvent::ItemPinned(id)),
                HistoryEvent::Unpinned(id) => Some(ManagerEvent::ItemUnpinned(id)),
                // OrderChanged already follows as the aggregate.
                HistoryEvent::Cleared => None,
                HistoryEvent::OrderChanged => Some(ManagerEvent::HistoryChanged),
            };
            if let Some(event) = mapped {
                self.listeners.emit(event);
            }
        }
    }

    fn emit_error(&mut self, kind: ErrorKind, message: String) {
        log::warn!("{}: {}", kind, message);
        self.listeners.emit(ManagerEvent::Error { kind, message });
    }
}

impl Drop for ClipboardManager {
    fn drop(&mut self) {
        self.flush();
    }
}
