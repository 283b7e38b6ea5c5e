//! Incremental UTF-8 decoding
//!
//! PTY reads split multi-byte characters at arbitrary points, so decoding has
//! to carry the partial sequence over to the next chunk. Invalid input never
//! aborts decoding: it is replaced with U+FFFD and decoding resumes on the
//! byte that broke the sequence.

pub use std::char::REPLACEMENT_CHARACTER;

/// Streaming UTF-8 decoder holding at most one partial character.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Utf8Decoder {
    buf: [u8; 4],
    len: u8,
    expected: u8,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte, emitting zero, one or two characters.
    ///
    /// Two characters are emitted when a partial sequence is interrupted by a
    /// byte that starts something new: the replacement marker for the broken
    /// sequence, then whatever the new byte decodes to.
    pub fn push(&mut self, byte: u8, mut emit: impl FnMut(char)) {
        if self.expected != 0 {
            if byte & 0xC0 == 0x80 {
                self.buf[self.len as usize] = byte;
                self.len += 1;
                if self.len == self.expected {
                    let decoded = std::str::from_utf8(&self.buf[..self.len as usize])
                        .ok()
                        .and_then(|s| s.chars().next());
                    self.clear();
                    emit(decoded.unwrap_or(REPLACEMENT_CHARACTER));
                }
                return;
            }
            self.clear();
            emit(REPLACEMENT_CHARACTER);
        }

        match byte {
            0x00..=0x7F => emit(byte as char),
            0xC2..=0xDF => self.start(byte, 2),
            0xE0..=0xEF => self.start(byte, 3),
            0xF0..=0xF4 => self.start(byte, 4),
            // Stray continuation bytes and bytes that can never start a sequence
            _ => emit(REPLACEMENT_CHARACTER),
        }
    }

    /// Drop a pending partial sequence. Returns true if one was pending, in
    /// which case the caller owes a replacement marker.
    pub fn abandon(&mut self) -> bool {
        let pending = self.is_pending();
        self.clear();
        pending
    }

    pub fn is_pending(&self) -> bool {
        self.expected != 0
    }

    fn start(&mut self, byte: u8, expected: u8) {
        self.buf[0] = byte;
        self.len = 1;
        self.expected = expected;
    }

    fn clear(&mut self) {
        self.len = 0;
        self.expected = 0;
    }
}
