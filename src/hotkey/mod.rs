pub mod backend;
pub mod chord;
pub mod local;
pub mod x11;

pub use backend::{create_backend, HotkeyBackend};
pub use chord::{grammar_help, Chord, Key, Modifier};

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};

use crate::error::HotkeyError;

static TEST_MODE: AtomicBool = AtomicBool::new(false);

fn test_registry() -> &'static Mutex<HashSet<String>> {
    static REGISTRY: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashSet::new()))
}

fn lock_test_registry() -> MutexGuard<'static, HashSet<String>> {
    match test_registry().lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Process-wide test mode: registrations become bookkeeping only (validation
/// and conflict detection still run, no backend call is made) and
/// [`HotkeyBinder::simulate_trigger`] fires the triggered event.
///
/// `set_test_mode(true)` / `set_test_mode(false)` must bracket a test run;
/// both directions clear the simulated registration registry.
pub fn set_test_mode(enabled: bool) {
    TEST_MODE.store(enabled, Ordering::SeqCst);
    lock_test_registry().clear();
}

pub fn test_mode() -> bool {
    TEST_MODE.load(Ordering::SeqCst)
}

/// Owns one global key-chord registration.
///
/// State machine: `Unbound -> register_hotkey -> Bound -> unregister_hotkey ->
/// Unbound`; re-registering while bound releases the previous binding first.
/// The grab is released unconditionally on drop.
pub struct HotkeyBinder {
    backend: Box<dyn HotkeyBackend>,
    bound: Option<Chord>,
    last_error: Option<HotkeyError>,
    listeners: Vec<Box<dyn FnMut()>>,
}

impl HotkeyBinder {
    /// Binder against the backend matching the current session.
    pub fn new() -> Self {
        Self::with_backend(create_backend())
    }

    pub fn with_backend(backend: Box<dyn HotkeyBackend>) -> Self {
        HotkeyBinder {
            backend,
            bound: None,
            last_error: None,
            listeners: Vec::new(),
        }
    }

    /// Validate and register a hotkey string. Returns false and records
    /// `last_error` on a grammar failure, a conflict, or a backend failure;
    /// the binder stays (or becomes) unbound in every failure case.
    pub fn register_hotkey(&mut self, s: &str) -> bool {
        let chord = match Chord::parse(s) {
            Ok(chord) => chord,
            Err(e) => {
                log::warn!("{}", e);
                self.last_error = Some(e);
                return false;
            }
        };

        if self.bound.is_some() {
            self.release();
        }

        let result = if test_mode() {
            let key = chord.to_string();
            let mut registry = lock_test_registry();
            if registry.contains(&key) {
                Err(HotkeyError::Conflict(key))
            } else {
                registry.insert(key);
                Ok(())
            }
        } else {
            self.backend.grab(&chord)
        };

        match result {
            Ok(()) => {
                log::info!("registered hotkey {} via {} backend", chord, self.backend_name());
                self.bound = Some(chord);
                self.last_error = None;
                true
            }
            Err(e) => {
                log::warn!("failed to register hotkey {}: {}", chord, e);
                self.last_error = Some(e);
                false
            }
        }
    }

    /// Release the current binding. Returns false when nothing is bound.
    pub fn unregister_hotkey(&mut self) -> bool {
        if self.bound.is_none() {
            return false;
        }
        self.release();
        true
    }

    pub fn is_registered(&self) -> bool {
        self.bound.is_some()
    }

    /// Canonical form of the bound chord, if any.
    pub fn hotkey_string(&self) -> Option<String> {
        self.bound.as_ref().map(|chord| chord.to_string())
    }

    pub fn last_error(&self) -> Option<&HotkeyError> {
        self.last_error.as_ref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    pub fn backend_name(&self) -> &'static str {
        if test_mode() {
            "test"
        } else {
            self.backend.name()
        }
    }

    /// Register a callback fired on each chord activation.
    /// Callbacks run on the binder's owning thread and must be
    /// re-entrancy-safe.
    pub fn on_triggered(&mut self, callback: impl FnMut() + 'static) {
        self.listeners.push(Box::new(callback));
    }

    /// Drain backend activations; fires listeners and returns true when the
    /// bound chord was pressed since the last poll.
    pub fn poll_triggered(&mut self) -> bool {
        if self.bound.is_none() || test_mode() {
            return false;
        }
        if self.backend.poll_triggered() {
            self.fire();
            return true;
        }
        false
    }

    /// Test-only trigger: fires the triggered event when test mode is on and
    /// a chord is bound.
    pub fn simulate_trigger(&mut self) -> bool {
        if test_mode() && self.bound.is_some() {
            self.fire();
            return true;
        }
        false
    }

    fn fire(&mut self) {
        for listener in &mut self.listeners {
            listener();
        }
    }

    fn release(&mut self) {
        if let Some(chord) = self.bound.take() {
            if test_mode() {
                lock_test_registry().remove(&chord.to_string());
            } else if let Err(e) = self.backend.ungrab() {
                log::warn!("failed to release hotkey {}: {}", chord, e);
            }
        }
    }
}

impl Default for HotkeyBinder {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for HotkeyBinder {
    fn drop(&mut self) {
        self.release();
    }
}
