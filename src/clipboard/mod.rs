pub mod manager;
pub mod wayland;

use anyhow::{anyhow, Result};
use std::env;

pub use manager::{should_add_content, ClipboardManager, ManagerEvent};
pub use wayland::WaylandSource;

/// Abstraction over the OS clipboard: read/write text plus a change probe.
/// The core never talks to the display server directly.
pub trait ClipboardSource {
    /// Current clipboard text. Empty string when the clipboard is empty or
    /// holds non-text content.
    fn text(&mut self) -> Result<String>;

    /// Replace the clipboard contents. The next change probe will observe
    /// this write (the echo is collapsed by history dedup).
    fn set_text(&mut self, text: &str) -> Result<()>;

    /// The *changed* event: text that newly appeared on the clipboard since
    /// the last probe, or None when nothing changed.
    fn poll_changed(&mut self) -> Result<Option<String>>;

    /// Source name (for logging/debugging)
    fn name(&self) -> &'static str;
}

/// Create a clipboard source based on the current display server
/// Detects Wayland via WAYLAND_DISPLAY environment variable
/// Returns error if no supported display server is detected
pub fn create_source() -> Result<Box<dyn ClipboardSource>> {
    if env::var("WAYLAND_DISPLAY").is_ok() {
        log::info!("Detected Wayland display server");
        let source = WaylandSource::new()?;
        return Ok(Box::new(source));
    }

    if env::var("DISPLAY").is_ok() {
        return Err(anyhow!(
            "X11 clipboard access requires xclip or a Wayland session (set WAYLAND_DISPLAY)"
        ));
    }

    Err(anyhow!(
        "No supported display server detected. Set WAYLAND_DISPLAY for Wayland"
    ))
}
