use serde_json::{json, Value};
use std::collections::HashMap;

use crate::error::{EntryError, HistoryError};
use crate::models::entry::{sha256_hex, Entry};

pub const MIN_MAX_ITEMS: usize = 10;
pub const MAX_MAX_ITEMS: usize = 100;
pub const DEFAULT_MAX_ITEMS: usize = 50;

/// Mutation notifications, drained by the owner via [`History::take_events`].
///
/// Per-entry events always precede the aggregate `OrderChanged` for the
/// mutation that produced them. Draining after the mutation returns is the
/// re-entrancy guard: observers only ever see fully committed state.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryEvent {
    Added(Entry),
    Updated(Entry),
    Removed(String),
    Pinned(String),
    Unpinned(String),
    Cleared,
    OrderChanged,
}

/// Ordered, bounded, deduplicated collection of clipboard entries.
///
/// Display order is two concatenated regions: pinned entries first, then
/// unpinned, each newest-first. Pinned entries are exempt from eviction, so
/// the collection may exceed `max_items` when everything left is pinned.
#[derive(Debug)]
pub struct History {
    items: Vec<Entry>,
    max_items: usize,
    /// content hash -> entry id, for O(1) duplicate detection
    hash_to_id: HashMap<String, String>,
    pending: Vec<HistoryEvent>,
}

fn clamp_max_items(n: usize) -> usize {
    n.clamp(MIN_MAX_ITEMS, MAX_MAX_ITEMS)
}

impl History {
    pub fn new(max_items: usize) -> Self {
        History {
            items: Vec::new(),
            max_items: clamp_max_items(max_items),
            hash_to_id: HashMap::new(),
            pending: Vec::new(),
        }
    }

    /// Add captured text as a new entry. Returns the id of the resulting
    /// entry (the existing one when the text is a duplicate).
    pub fn add_text(&mut self, text: &str) -> Result<String, EntryError> {
        let entry = Entry::from_text(text)?;
        Ok(self.add_entry(entry))
    }

    /// Add a pre-built entry, deduplicating by content hash.
    ///
    /// On a hash collision the existing entry keeps its id, text and pin
    /// state; only its timestamp is refreshed to the incoming one, and an
    /// `Updated` event is emitted instead of `Added`.
    pub fn add_entry(&mut self, entry: Entry) -> String {
        if let Some(existing_id) = self.hash_to_id.get(entry.hash()).cloned() {
            if let Some(pos) = self.position_of(&existing_id) {
                log::debug!("duplicate capture, refreshing entry {}", existing_id);
                let refreshed = self.items.remove(pos).refreshed_at(entry.timestamp());
                self.items.insert(0, refreshed.clone());
                self.resort();
                self.pending.push(HistoryEvent::Updated(refreshed));
                self.pending.push(HistoryEvent::OrderChanged);
            }
            return existing_id;
        }

        let id = entry.id().to_string();
        self.hash_to_id.insert(entry.hash().to_string(), id.clone());
        // Insert at the front so the stable sort breaks timestamp ties
        // (second precision) in favor of the latest mutation.
        self.items.insert(0, entry.clone());
        self.resort();
        self.pending.push(HistoryEvent::Added(entry));
        self.evict_overflow();
        self.pending.push(HistoryEvent::OrderChanged);
        id
    }

    /// Pin an entry, moving it into the pinned prefix.
    /// Returns false if the id is absent or the entry is already pinned.
    pub fn pin(&mut self, id: &str) -> bool {
        let Some(pos) = self.position_of(id) else {
            return false;
        };
        if self.items[pos].pinned() {
            return false;
        }
        self.items[pos].pin();
        self.resort();
        self.pending.push(HistoryEvent::Pinned(id.to_string()));
        self.pending.push(HistoryEvent::OrderChanged);
        true
    }

    /// Unpin an entry, moving it back into the unpinned region.
    /// Returns false if the id is absent or the entry is not pinned.
    pub fn unpin(&mut self, id: &str) -> bool {
        let Some(pos) = self.position_of(id) else {
            return false;
        };
        if !self.items[pos].pinned() {
            return false;
        }
        self.items[pos].unpin();
        self.resort();
        self.pending.push(HistoryEvent::Unpinned(id.to_string()));
        self.pending.push(HistoryEvent::OrderChanged);
        // Unpinning can push the collection over the bound again.
        let before = self.items.len();
        self.evict_overflow();
        if self.items.len() != before {
            self.pending.push(HistoryEvent::OrderChanged);
        }
        true
    }

    pub fn toggle_pin(&mut self, id: &str) -> bool {
        match self.get_by_id(id) {
            Some(entry) if entry.pinned() => self.unpin(id),
            Some(_) => self.pin(id),
            None => false,
        }
    }

    /// Remove an unpinned entry. Pinned entries refuse removal.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(pos) = self.position_of(id) else {
            return false;
        };
        if self.items[pos].pinned() {
            return false;
        }
        let removed = self.items.remove(pos);
        self.hash_to_id.remove(removed.hash());
        self.pending.push(HistoryEvent::Removed(removed.id().to_string()));
        self.pending.push(HistoryEvent::OrderChanged);
        true
    }

    /// Remove every unpinned entry. No-op when everything is pinned.
    pub fn clear(&mut self) {
        if self.items.iter().all(|e| e.pinned()) {
            return;
        }
        let mut removed_ids = Vec::new();
        self.items.retain(|entry| {
            if entry.pinned() {
                true
            } else {
                removed_ids.push(entry.id().to_string());
                false
            }
        });
        for id in &removed_ids {
            self.pending.push(HistoryEvent::Removed(id.clone()));
        }
        self.rebuild_hash_map();
        self.pending.push(HistoryEvent::Cleared);
        self.pending.push(HistoryEvent::OrderChanged);
    }

    /// Remove every entry, pinned included. No-op when empty.
    pub fn clear_all(&mut self) {
        if self.items.is_empty() {
            return;
        }
        for entry in &self.items {
            self.pending.push(HistoryEvent::Removed(entry.id().to_string()));
        }
        self.items.clear();
        self.hash_to_id.clear();
        self.pending.push(HistoryEvent::Cleared);
        self.pending.push(HistoryEvent::OrderChanged);
    }

    /// Snapshot of all entries in display order.
    pub fn items(&self) -> Vec<Entry> {
        self.items.clone()
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Entry> {
        self.items.iter().find(|e| e.id() == id)
    }

    pub fn get_by_index(&self, index: usize) -> Option<&Entry> {
        self.items.get(index)
    }

    pub fn has_duplicate(&self, text: &str) -> bool {
        self.hash_to_id.contains_key(&sha256_hex(text))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn pinned_count(&self) -> usize {
        self.items.iter().filter(|e| e.pinned()).count()
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    /// Change the bound, silently clamping to [10, 100]. Shrinking may evict
    /// unpinned entries.
    pub fn set_max_items(&mut self, max_items: usize) {
        self.max_items = clamp_max_items(max_items);
        let before = self.items.len();
        self.evict_overflow();
        if self.items.len() != before {
            self.pending.push(HistoryEvent::OrderChanged);
        }
    }

    /// Drain queued mutation events in emission order.
    pub fn take_events(&mut self) -> Vec<HistoryEvent> {
        std::mem::take(&mut self.pending)
    }

    pub fn to_json(&self) -> Value {
        json!({
            "maxItems": self.max_items,
            "items": self.items.iter().map(Entry::to_json).collect::<Vec<_>>(),
        })
    }

    /// Rebuild a history from a persisted JSON document.
    ///
    /// Individually invalid entries are skipped with a log note; later hash
    /// duplicates are dropped. Only a non-object document is fatal.
    pub fn from_json(value: &Value) -> Result<Self, HistoryError> {
        let obj = value.as_object().ok_or(HistoryError::CorruptHistory)?;

        let max_items = obj
            .get("maxItems")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_MAX_ITEMS);
        let mut history = History::new(max_items);

        if let Some(items) = obj.get("items").and_then(Value::as_array) {
            for item in items {
                match Entry::from_json(item) {
                    Ok(entry) => {
                        if history.hash_to_id.contains_key(entry.hash()) {
                            log::warn!("skipping duplicate entry {} on load", entry.id());
                            continue;
                        }
                        history
                            .hash_to_id
                            .insert(entry.hash().to_string(), entry.id().to_string());
                        history.items.push(entry);
                    }
                    Err(e) => log::warn!("skipping invalid history entry: {}", e),
                }
            }
        }

        history.resort();
        // A hand-edited or downgraded document may overflow its own bound.
        // Load-time evictions are bookkeeping, not user-visible mutations.
        history.evict_overflow();
        history.pending.clear();
        Ok(history)
    }

    fn position_of(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|e| e.id() == id)
    }

    /// Stable sort into display order: pinned region first, each region
    /// newest-first.
    fn resort(&mut self) {
        self.items.sort_by(|a, b| {
            b.pinned()
                .cmp(&a.pinned())
                .then_with(|| b.timestamp().cmp(&a.timestamp()))
        });
    }

    /// Drop oldest unpinned entries from the tail until within the bound.
    /// Pinned entries are never evicted; an all-pinned overflow is left alone.
    fn evict_overflow(&mut self) {
        while self.items.len() > self.max_items {
            let Some(pos) = self.items.iter().rposition(|e| !e.pinned()) else {
                break;
            };
            let evicted = self.items.remove(pos);
            self.hash_to_id.remove(evicted.hash());
            log::debug!("evicting entry {} over bound", evicted.id());
            self.pending.push(HistoryEvent::Removed(evicted.id().to_string()));
        }
    }

    fn rebuild_hash_map(&mut self) {
        self.hash_to_id.clear();
        for entry in &self.items {
            self.hash_to_id
                .insert(entry.hash().to_string(), entry.id().to_string());
        }
    }
}

impl Default for History {
    fn default() -> Self {
        History::new(DEFAULT_MAX_ITEMS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::entry::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;

    fn ts(offset_secs: i64) -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2025-09-13T10:00:00", TIMESTAMP_FORMAT).unwrap()
            + chrono::Duration::seconds(offset_secs)
    }

    fn add_at(history: &mut History, text: &str, offset_secs: i64) -> String {
        let entry = Entry::from_text_at(text, ts(offset_secs)).unwrap();
        history.add_entry(entry)
    }

    /// The universal invariants: contiguous pinned prefix, unique hashes,
    /// per-region timestamp ordering, the bound (unless all pinned), and the
    /// derived pinned count.
    fn assert_invariants(history: &History) {
        let items = history.items();
        let first_unpinned = items.iter().position(|e| !e.pinned()).unwrap_or(items.len());
        assert!(
            items[first_unpinned..].iter().all(|e| !e.pinned()),
            "pinned entries must form a contiguous prefix"
        );
        for region in [&items[..first_unpinned], &items[first_unpinned..]] {
            for pair in region.windows(2) {
                assert!(pair[0].timestamp() >= pair[1].timestamp());
            }
        }
        let hashes: std::collections::HashSet<&str> =
            items.iter().map(|e| e.hash()).collect();
        assert_eq!(hashes.len(), items.len(), "hashes must be unique");
        assert!(items.len() <= history.max_items() || items.iter().all(|e| e.pinned()));
        assert_eq!(
            history.pinned_count(),
            items.iter().filter(|e| e.pinned()).count()
        );
    }

    #[test]
    fn test_add_orders_newest_first() {
        let mut history = History::new(50);
        add_at(&mut history, "first", 0);
        add_at(&mut history, "second", 1);
        add_at(&mut history, "third", 2);

        let texts: Vec<&str> = history.items.iter().map(|e| e.text()).collect();
        assert_eq!(texts, vec!["third", "second", "first"]);
        assert_invariants(&history);
    }

    #[test]
    fn test_duplicate_refreshes_timestamp_without_new_entry() {
        let mut history = History::new(50);
        let id0 = add_at(&mut history, "hello", 0);
        history.take_events();

        let id1 = add_at(&mut history, "hello", 10);
        assert_eq!(id0, id1);
        assert_eq!(history.len(), 1);
        assert_eq!(history.get_by_id(&id0).unwrap().timestamp(), ts(10));

        let events = history.take_events();
        assert!(matches!(events[0], HistoryEvent::Updated(_)));
        assert!(matches!(events[1], HistoryEvent::OrderChanged));
        assert_eq!(events.len(), 2);
        assert_invariants(&history);
    }

    #[test]
    fn test_duplicate_preserves_pin_state_and_text() {
        let mut history = History::new(50);
        let id = add_at(&mut history, "keep me", 0);
        assert!(history.pin(&id));

        add_at(&mut history, "keep me", 5);
        let entry = history.get_by_id(&id).unwrap();
        assert!(entry.pinned());
        assert_eq!(entry.text(), "keep me");
        assert_eq!(entry.timestamp(), ts(5));
        assert_invariants(&history);
    }

    #[test]
    fn test_pinned_entries_survive_eviction() {
        // maxItems floor is 10, so fill with padding to exercise the bound.
        let mut history = History::new(10);
        let a = add_at(&mut history, "a", 0);
        let b = add_at(&mut history, "b", 1);
        for i in 0..8 {
            add_at(&mut history, &format!("pad{}", i), 2 + i);
        }
        assert!(history.pin(&a));
        assert_eq!(history.len(), 10);
        history.take_events();

        // "b" is now the oldest unpinned entry and must go first.
        add_at(&mut history, "overflow-1", 20);
        assert!(history.get_by_id(&a).is_some());
        assert!(history.get_by_id(&b).is_none());
        assert_eq!(history.len(), 10);

        let events = history.take_events();
        assert!(matches!(events[0], HistoryEvent::Added(_)));
        assert!(matches!(events[1], HistoryEvent::Removed(_)));
        assert!(matches!(events[2], HistoryEvent::OrderChanged));

        // The pinned entry never evicts no matter how much is added.
        for i in 0..20 {
            add_at(&mut history, &format!("more{}", i), 30 + i);
        }
        assert!(history.get_by_id(&a).is_some());
        assert_eq!(history.items()[0].id(), a);
        assert_invariants(&history);
    }

    #[test]
    fn test_pin_unpin_reports_state() {
        let mut history = History::new(50);
        let id = add_at(&mut history, "entry", 0);

        assert!(!history.pin("no-such-id"));
        assert!(history.pin(&id));
        assert!(!history.pin(&id), "already pinned");
        assert!(history.unpin(&id));
        assert!(!history.unpin(&id), "not pinned");
        assert!(!history.unpin("no-such-id"));
        assert_invariants(&history);
    }

    #[test]
    fn test_pin_is_idempotent() {
        let mut history = History::new(50);
        let id = add_at(&mut history, "entry", 0);
        history.pin(&id);
        let after_one = history.items();
        history.pin(&id);
        assert_eq!(history.items(), after_one);
    }

    #[test]
    fn test_toggle_pin_delegates() {
        let mut history = History::new(50);
        let id = add_at(&mut history, "entry", 0);

        assert!(history.toggle_pin(&id));
        assert!(history.get_by_id(&id).unwrap().pinned());
        assert!(history.toggle_pin(&id));
        assert!(!history.get_by_id(&id).unwrap().pinned());
        assert!(!history.toggle_pin("no-such-id"));
    }

    #[test]
    fn test_remove_refuses_pinned() {
        let mut history = History::new(50);
        let id = add_at(&mut history, "entry", 0);
        history.pin(&id);

        assert!(!history.remove(&id));
        assert_eq!(history.len(), 1);

        history.unpin(&id);
        assert!(history.remove(&id));
        assert!(history.is_empty());
        assert!(!history.remove(&id));
    }

    #[test]
    fn test_clear_preserves_pins() {
        let mut history = History::new(50);
        let a = add_at(&mut history, "a", 0);
        add_at(&mut history, "b", 1);
        add_at(&mut history, "c", 2);
        let d = add_at(&mut history, "d", 3);
        history.pin(&a);
        history.pin(&d);
        history.take_events();

        history.clear();
        let remaining: Vec<&str> = history.items.iter().map(|e| e.id()).collect();
        assert_eq!(remaining, vec![d.as_str(), a.as_str()]);

        let events = history.take_events();
        let removed = events
            .iter()
            .filter(|e| matches!(e, HistoryEvent::Removed(_)))
            .count();
        assert_eq!(removed, 2);
        assert!(events.contains(&HistoryEvent::Cleared));
        assert_eq!(events.last(), Some(&HistoryEvent::OrderChanged));
        assert_invariants(&history);
    }

    #[test]
    fn test_clear_is_noop_when_all_pinned() {
        let mut history = History::new(50);
        let id = add_at(&mut history, "pinned", 0);
        history.pin(&id);
        history.take_events();

        history.clear();
        assert_eq!(history.len(), 1);
        assert!(history.take_events().is_empty());
    }

    #[test]
    fn test_clear_all_removes_pinned_too() {
        let mut history = History::new(50);
        let a = add_at(&mut history, "a", 0);
        add_at(&mut history, "b", 1);
        history.pin(&a);
        history.take_events();

        history.clear_all();
        assert!(history.is_empty());
        assert!(!history.has_duplicate("a"));

        // Empty clear_all emits nothing.
        history.clear_all();
        let events = history.take_events();
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, HistoryEvent::Cleared))
                .count(),
            1
        );
    }

    #[test]
    fn test_set_max_items_clamps() {
        let mut history = History::new(50);
        history.set_max_items(9);
        assert_eq!(history.max_items(), 10);
        history.set_max_items(101);
        assert_eq!(history.max_items(), 100);
        history.set_max_items(75);
        assert_eq!(history.max_items(), 75);
    }

    #[test]
    fn test_shrinking_bound_evicts_oldest_unpinned() {
        let mut history = History::new(50);
        for i in 0..20 {
            add_at(&mut history, &format!("text{}", i), i);
        }
        history.take_events();

        history.set_max_items(10);
        assert_eq!(history.len(), 10);
        // The ten newest survive.
        assert!(history.has_duplicate("text19"));
        assert!(!history.has_duplicate("text9"));
        assert!(history
            .take_events()
            .contains(&HistoryEvent::OrderChanged));
        assert_invariants(&history);
    }

    #[test]
    fn test_unpin_over_bound_evicts() {
        let mut history = History::new(10);
        let ids: Vec<String> = (0..10)
            .map(|i| add_at(&mut history, &format!("text{}", i), i))
            .collect();
        history.pin(&ids[0]);
        add_at(&mut history, "extra", 50);
        assert_eq!(history.len(), 10);
        history.take_events();

        // 11 entries would now be unpinned; one must go.
        history.unpin(&ids[0]);
        assert_eq!(history.len(), 10);
        assert_invariants(&history);
    }

    #[test]
    fn test_has_duplicate() {
        let mut history = History::new(50);
        add_at(&mut history, "hello", 0);
        assert!(history.has_duplicate("hello"));
        assert!(!history.has_duplicate("hello "));
        assert!(!history.has_duplicate("other"));
    }

    #[test]
    fn test_get_by_index() {
        let mut history = History::new(50);
        add_at(&mut history, "first", 0);
        add_at(&mut history, "second", 1);
        assert_eq!(history.get_by_index(0).unwrap().text(), "second");
        assert_eq!(history.get_by_index(1).unwrap().text(), "first");
        assert!(history.get_by_index(2).is_none());
    }

    #[test]
    fn test_json_round_trip_preserves_hash_set() {
        let mut history = History::new(30);
        let a = add_at(&mut history, "alpha", 0);
        add_at(&mut history, "beta", 1);
        add_at(&mut history, "gamma", 2);
        history.pin(&a);

        let restored = History::from_json(&history.to_json()).unwrap();
        assert_eq!(restored.max_items(), 30);

        let original: std::collections::HashSet<String> =
            history.items().iter().map(|e| e.hash().to_string()).collect();
        let loaded: std::collections::HashSet<String> =
            restored.items().iter().map(|e| e.hash().to_string()).collect();
        assert_eq!(original, loaded);
        assert!(restored.get_by_id(&a).unwrap().pinned());
        assert_invariants(&restored);
    }

    #[test]
    fn test_from_json_skips_invalid_entries() {
        let doc = serde_json::json!({
            "maxItems": 20,
            "items": [
                { "text": "good", "timestamp": "2025-09-13T10:00:00" },
                { "text": "", "timestamp": "2025-09-13T10:00:01" },
                { "timestamp": "2025-09-13T10:00:02" },
                "not an object",
                { "text": "also good", "timestamp": "2025-09-13T10:00:03" }
            ]
        });
        let history = History::from_json(&doc).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.has_duplicate("good"));
        assert!(history.has_duplicate("also good"));
    }

    #[test]
    fn test_from_json_evicts_document_overflowing_its_own_bound() {
        let items: Vec<Value> = (0..20)
            .map(|i| {
                serde_json::json!({
                    "text": format!("text{}", i),
                    "timestamp": format!("2025-09-13T10:00:{:02}", i)
                })
            })
            .collect();
        let doc = serde_json::json!({ "maxItems": 10, "items": items });

        let mut history = History::from_json(&doc).unwrap();
        assert_eq!(history.len(), 10);
        // The ten newest survive.
        assert!(history.has_duplicate("text19"));
        assert!(!history.has_duplicate("text9"));
        assert!(history.take_events().is_empty());
        assert_invariants(&history);
    }

    #[test]
    fn test_from_json_defaults_and_ignores_unknown_keys() {
        let doc = serde_json::json!({ "futureField": true });
        let history = History::from_json(&doc).unwrap();
        assert_eq!(history.max_items(), DEFAULT_MAX_ITEMS);
        assert!(history.is_empty());
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(matches!(
            History::from_json(&serde_json::json!([1, 2])),
            Err(HistoryError::CorruptHistory)
        ));
    }
}
