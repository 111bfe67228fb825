use std::env;

use crate::error::HotkeyError;
use crate::hotkey::chord::Chord;
use crate::hotkey::local::LocalBackend;
use crate::hotkey::x11::X11Backend;

/// Trait for windowing-layer hotkey registration.
/// One implementation per display server, selected by environment probing.
pub trait HotkeyBackend {
    /// Register the chord system-wide. A chord already taken at this backend
    /// reports `Conflict`; other failures report `Backend`.
    fn grab(&mut self, chord: &Chord) -> Result<(), HotkeyError>;

    /// Release the current grab, if any. Idempotent.
    fn ungrab(&mut self) -> Result<(), HotkeyError>;

    /// Drain pending activations from the windowing system.
    /// Returns true when the grabbed chord fired since the last poll.
    fn poll_triggered(&mut self) -> bool {
        false
    }

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Pick a backend for the current session.
///
/// Wayland compositors expose no portable global-shortcut protocol, so a
/// Wayland session degrades to the local in-process backend. No display at
/// all degrades the same way.
pub fn create_backend() -> Box<dyn HotkeyBackend> {
    let session = env::var("XDG_SESSION_TYPE").unwrap_or_default();

    if session == "wayland" || env::var("WAYLAND_DISPLAY").is_ok() {
        log::warn!(
            "Wayland session without a global-shortcut protocol; hotkey limited to focused-window scope"
        );
        return Box::new(LocalBackend::new());
    }

    if session == "x11" || env::var("DISPLAY").is_ok() {
        log::info!("Detected X11 session, using root-window key grabs");
        return Box::new(X11Backend::new());
    }

    log::warn!("No display server detected; hotkey limited to focused-window scope");
    Box::new(LocalBackend::new())
}
