use chrono::{Local, NaiveDateTime, Timelike};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::EntryError;

/// Persisted timestamp format, second precision.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const PREVIEW_MAX_CHARS: usize = 100;
const PREVIEW_KEEP_CHARS: usize = 97;

static NEXT_SEQ: AtomicU64 = AtomicU64::new(1);

/// SHA-256 of the UTF-8 bytes of `text` as lowercase hex.
/// This is the deduplication key: byte-identical text only.
pub fn sha256_hex(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(64);
    for byte in digest {
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

/// Display form of `text`: trimmed, whitespace runs collapsed to one space,
/// truncated to 100 code points with a trailing ellipsis when shortened.
pub fn preview_of(text: &str) -> String {
    let mut collapsed: Vec<char> = Vec::new();
    let mut in_whitespace = false;
    for ch in text.trim().chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                collapsed.push(' ');
            }
            in_whitespace = true;
        } else {
            collapsed.push(ch);
            in_whitespace = false;
        }
    }
    if collapsed.len() > PREVIEW_MAX_CHARS {
        let mut preview: String = collapsed[..PREVIEW_KEEP_CHARS].iter().collect();
        preview.push_str("...");
        preview
    } else {
        collapsed.into_iter().collect()
    }
}

/// Current local time truncated to second precision.
pub fn now_second() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

fn generate_id(timestamp: NaiveDateTime) -> String {
    // The process id keeps the counter from reissuing an id after a restart
    // that lands in the same second as a persisted entry.
    let seq = NEXT_SEQ.fetch_add(1, Ordering::Relaxed);
    format!(
        "{:x}-{:x}-{:06x}",
        timestamp.and_utc().timestamp(),
        std::process::id(),
        seq
    )
}

/// One captured clipboard text plus metadata.
///
/// `preview` and `hash` are pure functions of `text` and are computed once at
/// construction; `pinned` is the only field that mutates afterwards.
#[derive(Debug, Clone)]
pub struct Entry {
    id: String,
    text: String,
    preview: String,
    timestamp: NaiveDateTime,
    pinned: bool,
    hash: String,
}

impl Entry {
    /// Create an entry from captured text, stamped with the current time.
    pub fn from_text(text: &str) -> Result<Self, EntryError> {
        Self::from_text_at(text, now_second())
    }

    /// Create an entry from captured text with an explicit timestamp.
    pub fn from_text_at(text: &str, timestamp: NaiveDateTime) -> Result<Self, EntryError> {
        if text.trim().is_empty() {
            return Err(EntryError::EmptyText);
        }
        Ok(Entry {
            id: generate_id(timestamp),
            preview: preview_of(text),
            hash: sha256_hex(text),
            text: text.to_string(),
            timestamp,
            pinned: false,
        })
    }

    /// Reconstruct an entry from a persisted JSON object.
    ///
    /// `text` and `timestamp` are required; `id` is kept when present and
    /// regenerated otherwise. `preview` and `hash` are always recomputed from
    /// `text` so they can never drift out of sync with it.
    pub fn from_json(value: &Value) -> Result<Self, EntryError> {
        let obj = value
            .as_object()
            .ok_or_else(|| EntryError::MalformedEntry("not a JSON object".into()))?;

        let text = obj
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| EntryError::MalformedEntry("missing text field".into()))?;
        if text.trim().is_empty() {
            return Err(EntryError::MalformedEntry("empty text field".into()));
        }

        let timestamp_str = obj
            .get("timestamp")
            .and_then(Value::as_str)
            .ok_or_else(|| EntryError::MalformedEntry("missing timestamp field".into()))?;
        let timestamp = NaiveDateTime::parse_from_str(timestamp_str, TIMESTAMP_FORMAT)
            .map_err(|e| EntryError::MalformedEntry(format!("bad timestamp: {}", e)))?;

        let id = match obj.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => generate_id(timestamp),
        };
        let pinned = obj.get("pinned").and_then(Value::as_bool).unwrap_or(false);

        Ok(Entry {
            id,
            preview: preview_of(text),
            hash: sha256_hex(text),
            text: text.to_string(),
            timestamp,
            pinned,
        })
    }

    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "text": self.text,
            "preview": self.preview,
            "timestamp": self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            "pinned": self.pinned,
            "hash": self.hash,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn preview(&self) -> &str {
        &self.preview
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn pinned(&self) -> bool {
        self.pinned
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn pin(&mut self) {
        self.pinned = true;
    }

    pub fn unpin(&mut self) {
        self.pinned = false;
    }

    pub fn toggle_pin(&mut self) {
        self.pinned = !self.pinned;
    }

    /// Copy of this entry with a refreshed timestamp. `id`, `text` and the
    /// pin state carry over; used when a duplicate capture is seen.
    pub(crate) fn refreshed_at(&self, timestamp: NaiveDateTime) -> Entry {
        let mut refreshed = self.clone();
        refreshed.timestamp = timestamp;
        refreshed
    }
}

/// Equality is by content hash.
impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for Entry {}
