use x11rb::connection::Connection;
use x11rb::errors::ReplyError;
use x11rb::protocol::xproto::{ConnectionExt, GrabMode, Keycode, ModMask, Window};
use x11rb::protocol::{ErrorKind as X11ErrorKind, Event};
use x11rb::rust_connection::RustConnection;

use crate::error::HotkeyError;
use crate::hotkey::backend::HotkeyBackend;
use crate::hotkey::chord::{Chord, Key, Modifier};

/// X11 keysym values for the keys the chord grammar recognizes.
/// Letters and digits use their ASCII codes (lowercase for letters).
mod keysym {
    pub const SPACE: u32 = 0x0020;
    pub const BACKSPACE: u32 = 0xff08;
    pub const TAB: u32 = 0xff09;
    pub const RETURN: u32 = 0xff0d;
    pub const ESCAPE: u32 = 0xff1b;
    pub const HOME: u32 = 0xff50;
    pub const LEFT: u32 = 0xff51;
    pub const UP: u32 = 0xff52;
    pub const RIGHT: u32 = 0xff53;
    pub const DOWN: u32 = 0xff54;
    pub const PAGE_UP: u32 = 0xff55;
    pub const PAGE_DOWN: u32 = 0xff56;
    pub const END: u32 = 0xff57;
    pub const INSERT: u32 = 0xff63;
    pub const F1: u32 = 0xffbe;
    pub const DELETE: u32 = 0xffff;
}

fn keysym_of(key: Key) -> u32 {
    match key {
        Key::Char(c) => c.to_ascii_lowercase() as u32,
        Key::Function(n) => keysym::F1 + (n as u32 - 1),
        Key::Space => keysym::SPACE,
        Key::Tab => keysym::TAB,
        Key::Enter => keysym::RETURN,
        Key::Escape => keysym::ESCAPE,
        Key::Backspace => keysym::BACKSPACE,
        Key::Delete => keysym::DELETE,
        Key::Insert => keysym::INSERT,
        Key::Home => keysym::HOME,
        Key::End => keysym::END,
        Key::PageUp => keysym::PAGE_UP,
        Key::PageDown => keysym::PAGE_DOWN,
        Key::Up => keysym::UP,
        Key::Down => keysym::DOWN,
        Key::Left => keysym::LEFT,
        Key::Right => keysym::RIGHT,
    }
}

fn modifier_mask(modifiers: &[Modifier]) -> u16 {
    modifiers.iter().fold(0u16, |mask, modifier| {
        mask | match modifier {
            Modifier::Shift => u16::from(ModMask::SHIFT),
            Modifier::Ctrl => u16::from(ModMask::CONTROL),
            Modifier::Alt => u16::from(ModMask::M1),
            Modifier::Meta => u16::from(ModMask::M4),
        }
    })
}

/// NumLock (Mod2) and CapsLock variants a grab must cover so the chord fires
/// regardless of lock state.
fn lock_variants() -> [u16; 4] {
    let num = u16::from(ModMask::M2);
    let caps = u16::from(ModMask::LOCK);
    [0, num, caps, num | caps]
}

struct GrabState {
    conn: RustConnection,
    root: Window,
    keycode: Keycode,
    mask: u16,
}

/// Global hotkey registration via an X11 root-window key grab.
///
/// The display connection is opened when the grab is issued and dropped when
/// it is released.
pub struct X11Backend {
    state: Option<GrabState>,
}

impl X11Backend {
    pub fn new() -> Self {
        X11Backend { state: None }
    }
}

impl Default for X11Backend {
    fn default() -> Self {
        Self::new()
    }
}

fn backend_err(e: impl std::fmt::Display) -> HotkeyError {
    HotkeyError::Backend(e.to_string())
}

/// Translate a keysym to a keycode by scanning the server's keyboard mapping.
fn keycode_for(conn: &RustConnection, keysym: u32) -> Result<Keycode, HotkeyError> {
    let setup = conn.setup();
    let min = setup.min_keycode;
    let max = setup.max_keycode;

    let mapping = conn
        .get_keyboard_mapping(min, max - min + 1)
        .map_err(backend_err)?
        .reply()
        .map_err(backend_err)?;

    let per = mapping.keysyms_per_keycode as usize;
    for (index, keysyms) in mapping.keysyms.chunks(per).enumerate() {
        if keysyms.contains(&keysym) {
            return Ok(min + index as Keycode);
        }
    }
    Err(HotkeyError::Backend(format!(
        "keysym {:#x} is not mapped on this keyboard",
        keysym
    )))
}

impl HotkeyBackend for X11Backend {
    fn grab(&mut self, chord: &Chord) -> Result<(), HotkeyError> {
        // Re-grab releases the previous binding first.
        self.ungrab()?;

        let (conn, screen_num) = x11rb::connect(None).map_err(backend_err)?;
        let root = conn.setup().roots[screen_num].root;
        let keycode = keycode_for(&conn, keysym_of(chord.key()))?;
        let mask = modifier_mask(chord.modifiers());

        let mut grabbed: Vec<u16> = Vec::new();
        for variant in lock_variants() {
            let result = conn
                .grab_key(
                    true,
                    root,
                    ModMask::from(mask | variant),
                    keycode,
                    GrabMode::ASYNC,
                    GrabMode::ASYNC,
                )
                .map_err(backend_err)
                .and_then(|cookie| {
                    cookie.check().map_err(|e| match e {
                        ReplyError::X11Error(ref err)
                            if err.error_kind == X11ErrorKind::Access =>
                        {
                            HotkeyError::Conflict(chord.to_string())
                        }
                        other => backend_err(other),
                    })
                });

            if let Err(e) = result {
                // Roll back the variants that did succeed.
                for variant in grabbed {
                    let _ = conn.ungrab_key(keycode, root, ModMask::from(mask | variant));
                }
                let _ = conn.flush();
                return Err(e);
            }
            grabbed.push(variant);
        }

        conn.flush().map_err(backend_err)?;
        log::debug!(
            "grabbed {} (keycode {}, mask {:#x}) on X11 root window",
            chord,
            keycode,
            mask
        );

        self.state = Some(GrabState {
            conn,
            root,
            keycode,
            mask,
        });
        Ok(())
    }

    fn ungrab(&mut self) -> Result<(), HotkeyError> {
        if let Some(state) = self.state.take() {
            for variant in lock_variants() {
                let _ = state.conn.ungrab_key(
                    state.keycode,
                    state.root,
                    ModMask::from(state.mask | variant),
                );
            }
            let _ = state.conn.flush();
            log::debug!("released X11 key grab (keycode {})", state.keycode);
            // Dropping the connection closes the display handle.
        }
        Ok(())
    }

    fn poll_triggered(&mut self) -> bool {
        let Some(state) = &self.state else {
            return false;
        };
        let ignored = u16::from(ModMask::M2) | u16::from(ModMask::LOCK);
        let mut triggered = false;
        while let Ok(Some(event)) = state.conn.poll_for_event() {
            if let Event::KeyPress(press) = event {
                let pressed_mask = u16::from(press.state) & !ignored;
                if press.detail == state.keycode && pressed_mask == state.mask {
                    triggered = true;
                }
            }
        }
        triggered
    }

    fn name(&self) -> &'static str {
        "x11"
    }
}

impl Drop for X11Backend {
    fn drop(&mut self) {
        let _ = self.ungrab();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keysym_translation() {
        assert_eq!(keysym_of(Key::Char('V')), 'v' as u32);
        assert_eq!(keysym_of(Key::Char('7')), '7' as u32);
        assert_eq!(keysym_of(Key::Function(1)), 0xffbe);
        assert_eq!(keysym_of(Key::Function(24)), 0xffbe + 23);
        assert_eq!(keysym_of(Key::Enter), 0xff0d);
    }

    #[test]
    fn test_modifier_mask_combines() {
        let chord = Chord::parse("Ctrl+Alt+V").unwrap();
        let mask = modifier_mask(chord.modifiers());
        assert_eq!(
            mask,
            u16::from(ModMask::CONTROL) | u16::from(ModMask::M1)
        );
    }
}
