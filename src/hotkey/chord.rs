use std::fmt;

use crate::error::HotkeyError;

/// Maximum number of `+`-separated segments in a hotkey string.
pub const MAX_SEGMENTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Modifier {
    Ctrl,
    Alt,
    Shift,
    Meta,
}

impl Modifier {
    fn parse(segment: &str) -> Option<Self> {
        match segment.to_ascii_lowercase().as_str() {
            "ctrl" | "control" => Some(Modifier::Ctrl),
            "alt" => Some(Modifier::Alt),
            "shift" => Some(Modifier::Shift),
            "meta" | "super" | "cmd" => Some(Modifier::Meta),
            _ => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Modifier::Ctrl => "Ctrl",
            Modifier::Alt => "Alt",
            Modifier::Shift => "Shift",
            Modifier::Meta => "Meta",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// An uppercase letter A-Z or a digit 0-9.
    Char(char),
    /// F1 through F24.
    Function(u8),
    Space,
    Tab,
    Enter,
    Escape,
    Backspace,
    Delete,
    Insert,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
}

impl Key {
    fn parse(segment: &str) -> Option<Self> {
        let lower = segment.to_ascii_lowercase();

        let mut chars = lower.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if c.is_ascii_alphanumeric() {
                return Some(Key::Char(c.to_ascii_uppercase()));
            }
            return None;
        }

        if let Some(number) = lower.strip_prefix('f') {
            if let Ok(n) = number.parse::<u8>() {
                if (1..=24).contains(&n) {
                    return Some(Key::Function(n));
                }
            }
            return None;
        }

        match lower.as_str() {
            "space" => Some(Key::Space),
            "tab" => Some(Key::Tab),
            "enter" | "return" => Some(Key::Enter),
            "escape" => Some(Key::Escape),
            "backspace" => Some(Key::Backspace),
            "delete" => Some(Key::Delete),
            "insert" => Some(Key::Insert),
            "home" => Some(Key::Home),
            "end" => Some(Key::End),
            "pageup" => Some(Key::PageUp),
            "pagedown" => Some(Key::PageDown),
            "up" | "uparrow" => Some(Key::Up),
            "down" | "downarrow" => Some(Key::Down),
            "left" | "leftarrow" => Some(Key::Left),
            "right" | "rightarrow" => Some(Key::Right),
            _ => None,
        }
    }

    fn label(&self) -> String {
        match self {
            Key::Char(c) => c.to_string(),
            Key::Function(n) => format!("F{}", n),
            Key::Space => "Space".to_string(),
            Key::Tab => "Tab".to_string(),
            Key::Enter => "Enter".to_string(),
            Key::Escape => "Escape".to_string(),
            Key::Backspace => "Backspace".to_string(),
            Key::Delete => "Delete".to_string(),
            Key::Insert => "Insert".to_string(),
            Key::Home => "Home".to_string(),
            Key::End => "End".to_string(),
            Key::PageUp => "PageUp".to_string(),
            Key::PageDown => "PageDown".to_string(),
            Key::Up => "Up".to_string(),
            Key::Down => "Down".to_string(),
            Key::Left => "Left".to_string(),
            Key::Right => "Right".to_string(),
        }
    }
}

/// A parsed hotkey: one or more modifiers plus a final key.
///
/// `Display` renders the canonical normalized form (sorted, deduplicated
/// modifiers), which doubles as the conflict-registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Chord {
    modifiers: Vec<Modifier>,
    key: Key,
}

impl Chord {
    /// Parse `MOD(+MOD)*+KEY`, case-insensitive, at most 5 segments, empty
    /// segments forbidden (so `"+V"`, `"Meta+"` and `"Meta++V"` are all
    /// invalid), at least one modifier required.
    pub fn parse(s: &str) -> Result<Self, HotkeyError> {
        let invalid = |why: &str| HotkeyError::InvalidChord(s.to_string(), why.to_string());

        let raw = s.trim();
        if raw.is_empty() {
            return Err(invalid("empty hotkey string"));
        }

        let segments: Vec<&str> = raw.split('+').map(str::trim).collect();
        if segments.len() > MAX_SEGMENTS {
            return Err(invalid("too many segments"));
        }
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(invalid("empty segment"));
        }
        let Some((key_segment, modifier_segments)) = segments.split_last() else {
            return Err(invalid("empty hotkey string"));
        };
        if modifier_segments.is_empty() {
            return Err(invalid("at least one modifier is required"));
        }

        let mut modifiers = Vec::with_capacity(modifier_segments.len());
        for segment in modifier_segments {
            match Modifier::parse(segment) {
                Some(modifier) => modifiers.push(modifier),
                None => return Err(invalid("unrecognized modifier")),
            }
        }
        modifiers.sort();
        modifiers.dedup();

        let key = Key::parse(key_segment).ok_or_else(|| invalid("unrecognized key"))?;

        Ok(Chord { modifiers, key })
    }

    pub fn is_valid(s: &str) -> bool {
        Self::parse(s).is_ok()
    }

    pub fn modifiers(&self) -> &[Modifier] {
        &self.modifiers
    }

    pub fn key(&self) -> Key {
        self.key
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for modifier in &self.modifiers {
            write!(f, "{}+", modifier.label())?;
        }
        f.write_str(&self.key.label())
    }
}

/// Human-readable summary of the accepted grammar, for `--list-hotkeys`.
pub fn grammar_help() -> String {
    [
        "Hotkey grammar: MOD(+MOD)*+KEY, case-insensitive, at most 5 segments.",
        "Modifiers: Ctrl/Control, Alt, Shift, Meta/Super/Cmd (at least one).",
        "Keys: A-Z, 0-9, F1-F24, Space, Tab, Enter/Return, Escape, Backspace,",
        "      Delete, Insert, Home, End, PageUp, PageDown,",
        "      Up/Down/Left/Right (and their *Arrow aliases).",
        "Examples: Meta+V, Ctrl+Shift+C, Alt+F12",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_valid_chords() {
        for s in [
            "Meta+V",
            "meta+v",
            "Ctrl+Shift+C",
            "Control+Alt+Delete",
            "Super+Space",
            "Cmd+Enter",
            "Alt+F12",
            "Shift+PageUp",
            "Meta+UpArrow",
            "Ctrl+Alt+Shift+Meta+V",
        ] {
            assert!(Chord::is_valid(s), "{:?} should parse", s);
        }
    }

    #[test]
    fn test_rejects_invalid_chords() {
        for s in [
            "",
            "V",
            "+V",
            "Meta+",
            "Meta++V",
            "++",
            "Meta+V+X+Y+Z+W",
            "Hyper+V",
            "Meta+Foo",
            "Meta+F25",
            "Meta+F0",
            "Ctrl+Shift",
        ] {
            assert!(!Chord::is_valid(s), "{:?} should be rejected", s);
        }
    }

    #[test]
    fn test_five_segments_is_the_limit() {
        assert!(Chord::is_valid("Ctrl+Alt+Shift+Meta+X"));
        assert!(!Chord::is_valid("Ctrl+Alt+Shift+Meta+Super+X"));
    }

    #[test]
    fn test_canonical_display_normalizes() {
        let chord = Chord::parse("shift+ctrl+v").unwrap();
        assert_eq!(chord.to_string(), "Ctrl+Shift+V");

        let aliased = Chord::parse("SUPER+RETURN").unwrap();
        assert_eq!(aliased.to_string(), "Meta+Enter");

        // Duplicate modifiers collapse in the canonical form.
        let duplicated = Chord::parse("Ctrl+Control+V").unwrap();
        assert_eq!(duplicated.to_string(), "Ctrl+V");
    }

    #[test]
    fn test_key_kinds() {
        assert_eq!(Chord::parse("Meta+v").unwrap().key(), Key::Char('V'));
        assert_eq!(Chord::parse("Meta+7").unwrap().key(), Key::Char('7'));
        assert_eq!(Chord::parse("Meta+f24").unwrap().key(), Key::Function(24));
        assert_eq!(Chord::parse("Meta+down").unwrap().key(), Key::Down);
    }
}
