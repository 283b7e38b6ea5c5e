//! Match window
//!
//! Rolling text buffer the rules are evaluated against. Bytes are decoded
//! permissively as they arrive; a character split across chunks is held back
//! until it completes.

use crate::core::term::utf8::Utf8Decoder;

/// Default window size in bytes
pub const DEFAULT_CAPACITY: usize = 4096;
/// Smallest allowed window
pub const MIN_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct MatchWindow {
    text: String,
    utf8: Utf8Decoder,
    capacity: usize,
}

impl Default for MatchWindow {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl MatchWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CAPACITY);
        Self {
            text: String::with_capacity(capacity * 2),
            utf8: Utf8Decoder::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Append a chunk. Does not truncate; see [`MatchWindow::enforce_capacity`].
    pub fn push(&mut self, bytes: &[u8]) {
        let text = &mut self.text;
        for &byte in bytes {
            self.utf8.push(byte, |c| text.push(c));
        }
    }

    /// Drop the oldest text until the window fits its capacity.
    pub fn enforce_capacity(&mut self) {
        if self.text.len() <= self.capacity {
            return;
        }
        let mut cut = self.text.len() - self.capacity;
        while !self.text.is_char_boundary(cut) {
            cut += 1;
        }
        self.text.drain(..cut);
    }

    /// Forget the text seen so far. A partial character in flight is kept.
    pub fn clear(&mut self) {
        self.text.clear();
    }

    /// Forget everything, including a partial character.
    pub fn reset(&mut self) {
        self.text.clear();
        self.utf8 = Utf8Decoder::new();
    }
}
