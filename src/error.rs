use thiserror::Error;

/// Broad error categories surfaced through the manager's `Error` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    IoFailure,
    CorruptHistory,
    HotkeyConflict,
    Backend,
    TrayUnavailable,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::IoFailure => "io-failure",
            ErrorKind::CorruptHistory => "corrupt-history",
            ErrorKind::HotkeyConflict => "hotkey-conflict",
            ErrorKind::Backend => "backend",
            ErrorKind::TrayUnavailable => "tray-unavailable",
        };
        f.write_str(name)
    }
}

/// Errors constructing a clipboard entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryError {
    #[error("clipboard text is empty after trimming")]
    EmptyText,
    #[error("malformed history entry: {0}")]
    MalformedEntry(String),
}

/// Errors loading a persisted history document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("history document is not a JSON object")]
    CorruptHistory,
}

/// Errors from hotkey parsing and registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HotkeyError {
    #[error("invalid hotkey {0:?}: {1}")]
    InvalidChord(String, String),
    #[error("hotkey {0:?} is already grabbed")]
    Conflict(String),
    #[error("hotkey backend failure: {0}")]
    Backend(String),
}

impl HotkeyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HotkeyError::InvalidChord(..) => ErrorKind::Validation,
            HotkeyError::Conflict(_) => ErrorKind::HotkeyConflict,
            HotkeyError::Backend(_) => ErrorKind::Backend,
        }
    }
}
