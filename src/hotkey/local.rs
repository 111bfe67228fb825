use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};

use crate::error::HotkeyError;
use crate::hotkey::backend::HotkeyBackend;
use crate::hotkey::chord::Chord;

/// Accelerators registered by local backends in this process, keyed by
/// canonical chord string. Shared so two binders still conflict on the same
/// chord, matching the real backends.
fn local_registry() -> &'static Mutex<HashSet<String>> {
    static REGISTRY: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashSet::new()))
}

fn lock_registry() -> std::sync::MutexGuard<'static, HashSet<String>> {
    match local_registry().lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Degraded fallback: an in-process accelerator that is only active while the
/// owning application has focus. Used when no display server is reachable or
/// the Wayland compositor offers no global-shortcut protocol. The embedding
/// view layer is responsible for routing focused-window key events here.
pub struct LocalBackend {
    registered: Option<String>,
}

impl LocalBackend {
    pub fn new() -> Self {
        LocalBackend { registered: None }
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HotkeyBackend for LocalBackend {
    fn grab(&mut self, chord: &Chord) -> Result<(), HotkeyError> {
        self.ungrab()?;
        let key = chord.to_string();
        let mut registry = lock_registry();
        if registry.contains(&key) {
            return Err(HotkeyError::Conflict(key));
        }
        registry.insert(key.clone());
        log::info!("registered local accelerator {} (focused-window scope only)", key);
        self.registered = Some(key);
        Ok(())
    }

    fn ungrab(&mut self) -> Result<(), HotkeyError> {
        if let Some(key) = self.registered.take() {
            lock_registry().remove(&key);
            log::debug!("released local accelerator {}", key);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

impl Drop for LocalBackend {
    fn drop(&mut self) {
        let _ = self.ungrab();
    }
}
