use anyhow::{anyhow, Context, Result};
use std::process::{Command, Stdio};

use super::ClipboardSource;
use crate::models::entry::sha256_hex;

/// Wayland clipboard source using wl-clipboard tools
/// Requires wl-paste and wl-copy to be installed
///
/// Change detection is by polling: each probe reads the current text and
/// compares its hash against the last observed one.
pub struct WaylandSource {
    last_hash: Option<String>,
}

impl WaylandSource {
    pub fn new() -> Result<Self> {
        // Verify the wl-clipboard tools are available
        Command::new("wl-paste")
            .arg("--version")
            .output()
            .context("wl-paste not found. Install wl-clipboard package")?;
        Command::new("wl-copy")
            .arg("--version")
            .output()
            .context("wl-copy not found. Install wl-clipboard package")?;

        log::debug!("WaylandSource initialized successfully");
        Ok(WaylandSource { last_hash: None })
    }
}

impl ClipboardSource for WaylandSource {
    fn text(&mut self) -> Result<String> {
        let output = Command::new("wl-paste")
            .arg("--no-newline")
            .arg("--type")
            .arg("text")
            .stdin(Stdio::null())
            .output()
            .context("Failed to run wl-paste")?;

        // wl-paste exits non-zero for an empty or non-text clipboard.
        if !output.status.success() {
            return Ok(String::new());
        }

        String::from_utf8(output.stdout).context("Clipboard text is not valid UTF-8")
    }

    fn set_text(&mut self, text: &str) -> Result<()> {
        let mut child = Command::new("wl-copy")
            .arg("--type")
            .arg("text/plain")
            .arg("--")
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .context("Failed to spawn wl-copy")?;

        let status = child.wait().context("Failed to wait for wl-copy")?;
        if !status.success() {
            return Err(anyhow!("wl-copy failed with status: {}", status));
        }

        log::debug!("wrote {} bytes text to clipboard", text.len());
        Ok(())
    }

    fn poll_changed(&mut self) -> Result<Option<String>> {
        let text = self.text()?;
        if text.is_empty() {
            return Ok(None);
        }
        let hash = sha256_hex(&text);
        if self.last_hash.as_deref() == Some(hash.as_str()) {
            return Ok(None);
        }
        self.last_hash = Some(hash);
        Ok(Some(text))
    }

    fn name(&self) -> &'static str {
        "wayland"
    }
}
