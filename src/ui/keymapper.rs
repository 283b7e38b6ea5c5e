//! Key mapping for terminal input
//!
//! Converts key events to VT sequences for PTY input, and recognizes the
//! front end's own bindings (presets, copy, paste).

use bitflags::bitflags;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::core::term::TerminalModes;

bitflags! {
    /// Modifier keys
    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
    }
}

impl From<KeyModifiers> for Modifiers {
    fn from(mods: KeyModifiers) -> Self {
        let mut result = Modifiers::empty();
        if mods.contains(KeyModifiers::SHIFT) {
            result |= Modifiers::SHIFT;
        }
        if mods.contains(KeyModifiers::CONTROL) {
            result |= Modifiers::CTRL;
        }
        if mods.contains(KeyModifiers::ALT) {
            result |= Modifiers::ALT;
        }
        result
    }
}

/// What a key press asks the front end to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    /// Forward bytes to the child
    Send(Vec<u8>),
    /// Send preset at this index (Alt+1 is 0)
    Preset(usize),
    /// Copy the screen text to the clipboard
    Copy,
    /// Paste clipboard text
    Paste,
}

const PASTE_START: &str = "\x1b[200~";
const PASTE_END: &str = "\x1b[201~";

/// Key mapper for converting key events to bytes
pub struct KeyMapper;

impl KeyMapper {
    /// Resolve a key event against the front end bindings first, then the
    /// VT mapping.
    pub fn action(event: &KeyEvent, modes: &TerminalModes) -> Option<InputAction> {
        let mods = Modifiers::from(event.modifiers);

        if let KeyCode::Char(ch) = event.code {
            if mods == Modifiers::CTRL | Modifiers::SHIFT {
                match ch.to_ascii_lowercase() {
                    'c' => return Some(InputAction::Copy),
                    'v' => return Some(InputAction::Paste),
                    _ => {}
                }
            }
            if mods == Modifiers::ALT {
                if let Some(digit @ 1..=9) = ch.to_digit(10) {
                    return Some(InputAction::Preset(digit as usize - 1));
                }
            }
        }

        Self::map(event, modes).map(InputAction::Send)
    }

    /// Map a crossterm KeyEvent to bytes for PTY
    pub fn map(event: &KeyEvent, modes: &TerminalModes) -> Option<Vec<u8>> {
        let mods = Modifiers::from(event.modifiers);

        match event.code {
            KeyCode::Char(ch) => Some(Self::map_char(ch, mods)),

            KeyCode::Enter => {
                if modes.linefeed_newline {
                    Some(vec![0x0D, 0x0A])
                } else {
                    Some(vec![0x0D])
                }
            }

            KeyCode::Backspace => {
                if mods.contains(Modifiers::ALT) {
                    Some(vec![0x1B, 0x7F])
                } else {
                    Some(vec![0x7F])
                }
            }

            KeyCode::Tab => Some(vec![0x09]),
            KeyCode::BackTab => Some(b"\x1b[Z".to_vec()),
            KeyCode::Esc => Some(vec![0x1B]),

            KeyCode::Up => Some(Self::arrow_key(b'A', mods, modes)),
            KeyCode::Down => Some(Self::arrow_key(b'B', mods, modes)),
            KeyCode::Right => Some(Self::arrow_key(b'C', mods, modes)),
            KeyCode::Left => Some(Self::arrow_key(b'D', mods, modes)),

            KeyCode::Home => Some(Self::special_key(b'H', mods, modes)),
            KeyCode::End => Some(Self::special_key(b'F', mods, modes)),
            KeyCode::PageUp => Some(Self::tilde_key(5, mods)),
            KeyCode::PageDown => Some(Self::tilde_key(6, mods)),
            KeyCode::Insert => Some(Self::tilde_key(2, mods)),
            KeyCode::Delete => Some(Self::tilde_key(3, mods)),

            KeyCode::F(n) => Some(Self::function_key(n, mods)).filter(|b| !b.is_empty()),

            _ => None,
        }
    }

    /// Bytes for pasted text: line breaks become CR LF, and the text is
    /// bracketed when the child enabled bracketed paste.
    pub fn paste(text: &str, modes: &TerminalModes) -> Vec<u8> {
        let normalized = text.replace("\r\n", "\n").replace('\r', "\n").replace('\n', "\r\n");
        if modes.bracketed_paste {
            // An embedded end marker would let the text escape the bracket
            let inner = normalized.replace(PASTE_END, "");
            format!("{}{}{}", PASTE_START, inner, PASTE_END).into_bytes()
        } else {
            normalized.into_bytes()
        }
    }

    /// Map a character with modifiers
    fn map_char(ch: char, mods: Modifiers) -> Vec<u8> {
        // Ctrl + letter = control character
        if mods.contains(Modifiers::CTRL) && !mods.contains(Modifiers::ALT) {
            if ch.is_ascii_alphabetic() {
                return vec![(ch.to_ascii_lowercase() as u8) - b'a' + 1];
            }
            match ch {
                '@' | '`' | ' ' | '2' => return vec![0x00],
                '[' | '3' => return vec![0x1B],
                '\\' | '4' => return vec![0x1C],
                ']' | '5' => return vec![0x1D],
                '^' | '~' | '6' => return vec![0x1E],
                '_' | '?' | '7' => return vec![0x1F],
                _ => {}
            }
        }

        // Ctrl + Alt + letter
        if mods.contains(Modifiers::CTRL | Modifiers::ALT) && ch.is_ascii_alphabetic() {
            return vec![0x1B, (ch.to_ascii_lowercase() as u8) - b'a' + 1];
        }

        // Alt + key = ESC + key
        if mods.contains(Modifiers::ALT) {
            let mut bytes = vec![0x1B];
            bytes.extend(ch.to_string().as_bytes());
            return bytes;
        }

        ch.to_string().into_bytes()
    }

    /// Arrow key sequence
    fn arrow_key(key: u8, mods: Modifiers, modes: &TerminalModes) -> Vec<u8> {
        if !mods.is_empty() {
            // ESC [ 1 ; <mod> <key>
            format!("\x1b[1;{}{}", Self::modifier_code(mods), key as char).into_bytes()
        } else if modes.application_cursor {
            vec![0x1B, b'O', key]
        } else {
            vec![0x1B, b'[', key]
        }
    }

    /// Home and End follow the cursor key mode too
    fn special_key(key: u8, mods: Modifiers, modes: &TerminalModes) -> Vec<u8> {
        Self::arrow_key(key, mods, modes)
    }

    /// Tilde key sequence (PageUp, PageDown, Insert, Delete)
    fn tilde_key(code: u8, mods: Modifiers) -> Vec<u8> {
        if mods.is_empty() {
            format!("\x1b[{}~", code).into_bytes()
        } else {
            format!("\x1b[{};{}~", code, Self::modifier_code(mods)).into_bytes()
        }
    }

    /// Function key sequence
    fn function_key(n: u8, mods: Modifiers) -> Vec<u8> {
        let code = match n {
            1..=4 => {
                let key = b"PQRS"[n as usize - 1] as char;
                return if mods.is_empty() {
                    format!("\x1bO{}", key).into_bytes()
                } else {
                    format!("\x1b[1;{}{}", Self::modifier_code(mods), key).into_bytes()
                };
            }
            5 => 15,
            6 => 17,
            7 => 18,
            8 => 19,
            9 => 20,
            10 => 21,
            11 => 23,
            12 => 24,
            _ => return vec![],
        };
        Self::tilde_key(code, mods)
    }

    /// Calculate xterm modifier code
    fn modifier_code(mods: Modifiers) -> u8 {
        1 + if mods.contains(Modifiers::SHIFT) { 1 } else { 0 }
            + if mods.contains(Modifiers::ALT) { 2 } else { 0 }
            + if mods.contains(Modifiers::CTRL) { 4 } else { 0 }
    }
}
