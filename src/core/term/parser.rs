//! Escape-sequence decoder
//!
//! Turns the raw PTY byte stream into typed [`DecoderEvent`]s. The decoder
//! keeps no screen state; everything it remembers between chunks is the
//! partial sequence it is currently in the middle of.

use std::collections::VecDeque;

use super::utf8::{Utf8Decoder, REPLACEMENT_CHARACTER};

/// Longest CSI sequence (including `ESC [`) kept before it is abandoned.
/// The rest of an abandoned sequence is discarded up to its final byte.
pub const MAX_CSI_LEN: usize = 256;
/// Longest OSC payload kept before it is abandoned. The rest of an abandoned
/// string is discarded up to its terminator.
pub const MAX_STRING_LEN: usize = 4096;
/// Parameters beyond this count are dropped.
pub const MAX_PARAMS: usize = 32;

/// One decoded unit of terminal output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoderEvent {
    /// Run of printable characters
    Text(String),
    /// Single C0 control function
    Control(ControlFunction),
    /// Control Sequence Introducer sequence
    Csi(CsiSequence),
    /// Operating System Command payload (without introducer and terminator)
    Osc(String),
    /// Plain escape sequence such as `ESC 7` or `ESC ( B`
    Escape(EscSequence),
    /// Bytes of a sequence that was abandoned
    Malformed(usize),
}

/// C0 control functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFunction {
    Bell,
    Backspace,
    HorizontalTab,
    LineFeed,
    VerticalTab,
    FormFeed,
    CarriageReturn,
    ShiftOut,
    ShiftIn,
    Other(u8),
}

impl ControlFunction {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x07 => Self::Bell,
            0x08 => Self::Backspace,
            0x09 => Self::HorizontalTab,
            0x0A => Self::LineFeed,
            0x0B => Self::VerticalTab,
            0x0C => Self::FormFeed,
            0x0D => Self::CarriageReturn,
            0x0E => Self::ShiftOut,
            0x0F => Self::ShiftIn,
            other => Self::Other(other),
        }
    }
}

/// A complete CSI sequence: `ESC [ <private> <params> <intermediates> <final>`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsiSequence {
    /// `?`, `>`, `<` or `=` directly after the introducer
    pub private_marker: Option<u8>,
    /// Numeric parameters; an empty parameter is 0
    pub params: Vec<u16>,
    pub intermediates: Vec<u8>,
    pub final_byte: u8,
}

impl CsiSequence {
    /// Parameter `index`, with missing or zero values replaced by `default`.
    pub fn param_or(&self, index: usize, default: u16) -> u16 {
        match self.params.get(index) {
            Some(&0) | None => default,
            Some(&value) => value,
        }
    }
}

/// A complete non-CSI escape sequence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EscSequence {
    pub intermediates: Vec<u8>,
    pub final_byte: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum ParserState {
    #[default]
    Ground,
    Escape,
    EscapeIntermediate,
    CsiEntry,
    CsiParam,
    CsiIntermediate,
    /// Overlong CSI: bytes are dropped until a final byte
    CsiIgnore,
    OscString,
    /// ESC received within OSC, waiting for backslash
    OscEscape,
    /// DCS, SOS, PM and APC payloads are consumed and dropped
    IgnoredString,
    IgnoredEscape,
}

/// Byte-to-event decoder with state carried across chunks.
#[derive(Debug, Default)]
pub struct Decoder {
    state: ParserState,
    utf8: Utf8Decoder,
    text: String,
    ready: VecDeque<DecoderEvent>,
    private_marker: Option<u8>,
    params: Vec<u16>,
    current_param: Option<u16>,
    /// Index in `params` where the current ':'-joined group starts
    group_start: usize,
    colon_group: bool,
    intermediates: Vec<u8>,
    osc: Vec<u8>,
    /// Bytes consumed by the sequence in progress, including its ESC
    pending_len: usize,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            params: Vec::with_capacity(16),
            intermediates: Vec::with_capacity(4),
            ..Self::default()
        }
    }

    /// Decode a chunk lazily.
    ///
    /// The returned iterator must be run to completion; bytes it has not
    /// reached when dropped are never decoded.
    pub fn feed<'d, 'b>(&'d mut self, bytes: &'b [u8]) -> Events<'d, 'b> {
        Events {
            decoder: self,
            bytes,
            pos: 0,
        }
    }

    /// Decode a chunk into a vector of events.
    pub fn decode(&mut self, bytes: &[u8]) -> Vec<DecoderEvent> {
        self.feed(bytes).collect()
    }

    /// True when no partial sequence or character is buffered.
    pub fn is_idle(&self) -> bool {
        self.state == ParserState::Ground && !self.utf8.is_pending()
    }

    /// Bytes consumed by the escape sequence in progress and not yet
    /// reported.
    pub fn pending_len(&self) -> usize {
        self.pending_len
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn advance(&mut self, byte: u8) {
        if byte >= 0x80 {
            self.advance_high(byte);
            return;
        }

        if self.utf8.abandon() {
            self.text.push(REPLACEMENT_CHARACTER);
        }

        match self.state {
            ParserState::Ground => self.ground(byte),
            ParserState::Escape
            | ParserState::EscapeIntermediate
            | ParserState::CsiEntry
            | ParserState::CsiParam
            | ParserState::CsiIntermediate => {
                if byte < 0x20 {
                    self.control_in_sequence(byte);
                } else {
                    if self.pending_len >= MAX_CSI_LEN {
                        self.overflow(ParserState::CsiIgnore);
                        if (0x40..=0x7E).contains(&byte) {
                            self.clear_sequence();
                        }
                        return;
                    }
                    self.pending_len += 1;
                    match self.state {
                        ParserState::Escape => self.escape(byte),
                        ParserState::EscapeIntermediate => self.escape_intermediate(byte),
                        ParserState::CsiEntry => self.csi_entry(byte),
                        ParserState::CsiParam => self.csi_param(byte),
                        _ => self.csi_intermediate(byte),
                    }
                }
            }
            ParserState::CsiIgnore => match byte {
                0x00..=0x1F => self.control_in_sequence(byte),
                0x40..=0x7E => self.clear_sequence(),
                _ => {}
            },
            ParserState::OscString | ParserState::IgnoredString => self.string_byte(byte),
            ParserState::OscEscape | ParserState::IgnoredEscape => self.string_escape(byte),
        }
    }

    fn advance_high(&mut self, byte: u8) {
        match self.state {
            ParserState::Ground => {
                let text = &mut self.text;
                self.utf8.push(byte, |c| text.push(c));
            }
            ParserState::OscString | ParserState::IgnoredString => self.string_byte(byte),
            _ => {
                // Not valid inside an escape sequence: drop the sequence and
                // let the byte start over as text.
                self.abandon(0);
                self.advance_high(byte);
            }
        }
    }

    fn ground(&mut self, byte: u8) {
        match byte {
            0x20..=0x7E => self.text.push(byte as char),
            0x1B => self.begin_escape(),
            0x7F => {}
            _ => self.push_event(DecoderEvent::Control(ControlFunction::from_byte(byte))),
        }
    }

    /// C0 byte while inside ESC or CSI
    fn control_in_sequence(&mut self, byte: u8) {
        match byte {
            0x1B => {
                self.abandon(0);
                self.begin_escape();
            }
            0x18 | 0x1A => self.abandon(1),
            _ => self.push_event(DecoderEvent::Control(ControlFunction::from_byte(byte))),
        }
    }

    fn begin_escape(&mut self) {
        self.flush_text();
        self.clear_sequence();
        self.state = ParserState::Escape;
        self.pending_len = 1;
    }

    fn escape(&mut self, byte: u8) {
        match byte {
            b'[' => self.state = ParserState::CsiEntry,
            b']' => self.state = ParserState::OscString,
            b'P' | b'X' | b'^' | b'_' => self.state = ParserState::IgnoredString,
            0x20..=0x2F => {
                self.intermediates.push(byte);
                self.state = ParserState::EscapeIntermediate;
            }
            0x7F => {}
            _ => self.dispatch_escape(byte),
        }
    }

    fn escape_intermediate(&mut self, byte: u8) {
        match byte {
            0x20..=0x2F => self.intermediates.push(byte),
            0x7F => {}
            _ => self.dispatch_escape(byte),
        }
    }

    fn csi_entry(&mut self, byte: u8) {
        match byte {
            b'<' | b'=' | b'>' | b'?' => {
                self.private_marker = Some(byte);
                self.state = ParserState::CsiParam;
            }
            _ => {
                self.state = ParserState::CsiParam;
                self.csi_param(byte);
            }
        }
    }

    fn csi_param(&mut self, byte: u8) {
        match byte {
            b'0'..=b'9' => {
                let digit = (byte - b'0') as u16;
                self.current_param = Some(
                    self.current_param
                        .unwrap_or(0)
                        .saturating_mul(10)
                        .saturating_add(digit),
                );
            }
            // Sub-parameters (':') are flattened into the parameter list
            b':' => {
                let param = self.current_param.take().unwrap_or(0);
                self.push_param(param);
                self.colon_group = true;
            }
            b';' => {
                let param = self.current_param.take().unwrap_or(0);
                self.push_param(param);
                self.end_group();
            }
            0x20..=0x2F => {
                self.finish_param();
                self.intermediates.push(byte);
                self.state = ParserState::CsiIntermediate;
            }
            0x40..=0x7E => {
                self.finish_param();
                self.dispatch_csi(byte);
            }
            0x7F => {}
            // Private marker in the middle of parameters
            _ => self.abandon(0),
        }
    }

    fn csi_intermediate(&mut self, byte: u8) {
        match byte {
            0x20..=0x2F => self.intermediates.push(byte),
            0x40..=0x7E => self.dispatch_csi(byte),
            0x7F => {}
            _ => self.abandon(0),
        }
    }

    fn string_byte(&mut self, byte: u8) {
        match byte {
            0x07 => self.finish_string(),
            0x1B => {
                self.pending_len += 1;
                self.state = if self.state == ParserState::OscString {
                    ParserState::OscEscape
                } else {
                    ParserState::IgnoredEscape
                };
            }
            0x18 | 0x1A => self.abandon(1),
            // Other controls inside strings are ignored
            0x00..=0x1F => {}
            _ if self.state == ParserState::IgnoredString => {
                self.pending_len = self.pending_len.saturating_add(1);
            }
            _ if self.pending_len >= MAX_STRING_LEN => self.overflow(ParserState::IgnoredString),
            _ => {
                self.pending_len += 1;
                self.osc.push(byte);
            }
        }
    }

    fn string_escape(&mut self, byte: u8) {
        if byte == b'\\' {
            self.pending_len += 1;
            self.finish_string();
            return;
        }
        // Not a string terminator: the string ends here and the ESC starts
        // a new sequence.
        self.finish_string();
        self.begin_escape();
        self.advance(byte);
    }

    fn finish_string(&mut self) {
        if matches!(self.state, ParserState::OscString | ParserState::OscEscape) {
            let payload = String::from_utf8_lossy(&self.osc).into_owned();
            self.push_event(DecoderEvent::Osc(payload));
        }
        self.clear_sequence();
    }

    fn dispatch_escape(&mut self, final_byte: u8) {
        let intermediates = std::mem::take(&mut self.intermediates);
        self.push_event(DecoderEvent::Escape(EscSequence {
            intermediates,
            final_byte,
        }));
        self.clear_sequence();
    }

    fn dispatch_csi(&mut self, final_byte: u8) {
        let sequence = CsiSequence {
            private_marker: self.private_marker.take(),
            params: std::mem::take(&mut self.params),
            intermediates: std::mem::take(&mut self.intermediates),
            final_byte,
        };
        self.push_event(DecoderEvent::Csi(sequence));
        self.clear_sequence();
    }

    fn finish_param(&mut self) {
        if let Some(param) = self.current_param.take() {
            self.push_param(param);
        }
        self.end_group();
    }

    /// Close a ':'-joined group. The ITU form of a direct color,
    /// `38:2:<colorspace>:r:g:b`, loses its colorspace slot so it reads the
    /// same as `38;2;r;g;b`.
    fn end_group(&mut self) {
        if self.colon_group {
            let group = &self.params[self.group_start.min(self.params.len())..];
            if group.len() >= 6 && matches!(group[0], 38 | 48 | 58) && group[1] == 2 {
                self.params.remove(self.group_start + 2);
            }
        }
        self.colon_group = false;
        self.group_start = self.params.len();
    }

    fn push_param(&mut self, param: u16) {
        if self.params.len() < MAX_PARAMS {
            self.params.push(param);
        }
    }

    /// Give up on the sequence in progress. `extra` counts the current byte
    /// when it belongs to the discarded sequence.
    fn abandon(&mut self, extra: usize) {
        let consumed = self.pending_len + extra;
        self.clear_sequence();
        if consumed > 0 {
            tracing::debug!("Abandoned malformed sequence ({} bytes)", consumed);
            self.push_event(DecoderEvent::Malformed(consumed));
        }
    }

    /// Report the sequence in progress, including the current byte, as
    /// malformed and drop what follows in `discard` state.
    fn overflow(&mut self, discard: ParserState) {
        let consumed = self.pending_len + 1;
        self.clear_sequence();
        tracing::debug!("Sequence exceeded {} bytes, discarding the rest", consumed - 1);
        self.push_event(DecoderEvent::Malformed(consumed));
        self.state = discard;
    }

    fn clear_sequence(&mut self) {
        self.state = ParserState::Ground;
        self.private_marker = None;
        self.params.clear();
        self.current_param = None;
        self.group_start = 0;
        self.colon_group = false;
        self.intermediates.clear();
        self.osc.clear();
        self.pending_len = 0;
    }

    fn push_event(&mut self, event: DecoderEvent) {
        self.flush_text();
        self.ready.push_back(event);
    }

    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            let text = std::mem::take(&mut self.text);
            self.ready.push_back(DecoderEvent::Text(text));
        }
    }
}

/// Lazy event iterator over one chunk. See [`Decoder::feed`].
pub struct Events<'d, 'b> {
    decoder: &'d mut Decoder,
    bytes: &'b [u8],
    pos: usize,
}

impl Iterator for Events<'_, '_> {
    type Item = DecoderEvent;

    fn next(&mut self) -> Option<DecoderEvent> {
        loop {
            if let Some(event) = self.decoder.ready.pop_front() {
                return Some(event);
            }
            let Some(&byte) = self.bytes.get(self.pos) else {
                // End of chunk: complete characters are reported now, partial
                // ones stay buffered for the next chunk.
                self.decoder.flush_text();
                return self.decoder.ready.pop_front();
            };
            self.pos += 1;
            self.decoder.advance(byte);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> DecoderEvent {
        DecoderEvent::Text(s.to_string())
    }

    fn csi(private_marker: Option<u8>, params: &[u16], final_byte: u8) -> DecoderEvent {
        DecoderEvent::Csi(CsiSequence {
            private_marker,
            params: params.to_vec(),
            intermediates: Vec::new(),
            final_byte,
        })
    }

    /// Merge adjacent text runs so chunk boundaries do not matter.
    fn normalize(events: Vec<DecoderEvent>) -> Vec<DecoderEvent> {
        let mut out: Vec<DecoderEvent> = Vec::new();
        for event in events {
            if let (Some(DecoderEvent::Text(prev)), DecoderEvent::Text(next)) =
                (out.last_mut(), &event)
            {
                prev.push_str(next);
                continue;
            }
            out.push(event);
        }
        out
    }

    #[test]
    fn test_text_and_controls() {
        let mut decoder = Decoder::new();
        let events = decoder.decode(b"ab\r\ncd\x08");
        assert_eq!(
            events,
            vec![
                text("ab"),
                DecoderEvent::Control(ControlFunction::CarriageReturn),
                DecoderEvent::Control(ControlFunction::LineFeed),
                text("cd"),
                DecoderEvent::Control(ControlFunction::Backspace),
            ]
        );
    }

    #[test]
    fn test_cursor_position_sequence() {
        let mut decoder = Decoder::new();
        let events = decoder.decode(b"\x1b[5;10H");
        assert_eq!(events, vec![csi(None, &[5, 10], b'H')]);
    }

    #[test]
    fn test_private_marker_and_empty_params() {
        let mut decoder = Decoder::new();
        assert_eq!(decoder.decode(b"\x1b[?25l"), vec![csi(Some(b'?'), &[25], b'l')]);
        assert_eq!(decoder.decode(b"\x1b[;7H"), vec![csi(None, &[0, 7], b'H')]);
        assert_eq!(decoder.decode(b"\x1b[m"), vec![csi(None, &[], b'm')]);
    }

    #[test]
    fn test_csi_split_across_chunks() {
        let mut decoder = Decoder::new();
        assert_eq!(decoder.decode(b"hi\x1b[3"), vec![text("hi")]);
        assert!(!decoder.is_idle());
        assert_eq!(decoder.decode(b"1"), vec![]);
        assert_eq!(decoder.decode(b"mX"), vec![csi(None, &[31], b'm'), text("X")]);
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let bytes = "é!".as_bytes();
        let mut decoder = Decoder::new();
        assert_eq!(decoder.decode(&bytes[..1]), vec![]);
        assert_eq!(decoder.decode(&bytes[1..]), vec![text("é!")]);
    }

    #[test]
    fn test_invalid_utf8_does_not_desync_sequences() {
        let mut decoder = Decoder::new();
        let events = decoder.decode(b"a\xe3\x1b[1mb");
        assert_eq!(
            events,
            vec![text("a\u{FFFD}"), csi(None, &[1], b'm'), text("b")]
        );
    }

    #[test]
    fn test_control_inside_csi_keeps_order() {
        let mut decoder = Decoder::new();
        let events = decoder.decode(b"\x1b[2\rJ");
        assert_eq!(
            events,
            vec![
                DecoderEvent::Control(ControlFunction::CarriageReturn),
                csi(None, &[2], b'J'),
            ]
        );
    }

    #[test]
    fn test_escape_inside_csi_abandons() {
        let mut decoder = Decoder::new();
        let events = decoder.decode(b"\x1b[12\x1b[A");
        assert_eq!(events, vec![DecoderEvent::Malformed(4), csi(None, &[], b'A')]);
    }

    #[test]
    fn test_cancel_aborts_sequence() {
        let mut decoder = Decoder::new();
        let events = decoder.decode(b"\x1b[1\x18ok");
        assert_eq!(events, vec![DecoderEvent::Malformed(4), text("ok")]);
    }

    #[test]
    fn test_oversized_csi_is_malformed() {
        let mut decoder = Decoder::new();
        let mut bytes = b"\x1b[".to_vec();
        bytes.extend(std::iter::repeat(b'1').take(MAX_CSI_LEN));
        bytes.extend_from_slice(b"mZ");
        let events = decoder.decode(&bytes);
        assert_eq!(events, vec![DecoderEvent::Malformed(MAX_CSI_LEN + 1), text("Z")]);
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_oversized_csi_ending_on_limit() {
        let mut decoder = Decoder::new();
        let mut bytes = b"\x1b[".to_vec();
        bytes.extend(std::iter::repeat(b'1').take(MAX_CSI_LEN - 2));
        bytes.extend_from_slice(b"mZ");
        let events = decoder.decode(&bytes);
        assert_eq!(events, vec![DecoderEvent::Malformed(MAX_CSI_LEN + 1), text("Z")]);
    }

    #[test]
    fn test_escape_after_oversized_csi_starts_new_sequence() {
        let mut decoder = Decoder::new();
        let mut bytes = b"\x1b[".to_vec();
        bytes.extend(std::iter::repeat(b';').take(MAX_CSI_LEN + 50));
        bytes.extend_from_slice(b"\x1b[Aok");
        let events = decoder.decode(&bytes);
        assert_eq!(
            events,
            vec![
                DecoderEvent::Malformed(MAX_CSI_LEN + 1),
                csi(None, &[], b'A'),
                text("ok"),
            ]
        );
    }

    #[test]
    fn test_osc_with_bel_and_st() {
        let mut decoder = Decoder::new();
        assert_eq!(
            decoder.decode(b"\x1b]0;my title\x07"),
            vec![DecoderEvent::Osc("0;my title".to_string())]
        );
        assert_eq!(
            decoder.decode(b"\x1b]2;t\xc3\xa9\x1b\\x"),
            vec![DecoderEvent::Osc("2;té".to_string()), text("x")]
        );
    }

    #[test]
    fn test_osc_split_across_chunks() {
        let mut decoder = Decoder::new();
        assert_eq!(decoder.decode(b"\x1b]0;ab"), vec![]);
        assert_eq!(decoder.decode(b"c\x1b"), vec![]);
        assert_eq!(
            decoder.decode(b"\\"),
            vec![DecoderEvent::Osc("0;abc".to_string())]
        );
    }

    #[test]
    fn test_oversized_osc_is_malformed() {
        let mut decoder = Decoder::new();
        let mut bytes = b"\x1b]0;".to_vec();
        bytes.extend(std::iter::repeat(b'x').take(MAX_STRING_LEN + 10));
        let events = decoder.decode(&bytes);
        assert_eq!(events, vec![DecoderEvent::Malformed(MAX_STRING_LEN + 1)]);
        assert!(!decoder.is_idle());

        // The payload is dropped through the terminator, nothing is printed.
        let events = decoder.decode(b"xxxx\x07ok");
        assert_eq!(events, vec![text("ok")]);
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_oversized_osc_ends_at_string_terminator() {
        let mut decoder = Decoder::new();
        let mut bytes = b"\x1b]52;c;".to_vec();
        bytes.extend(std::iter::repeat(b'Q').take(MAX_STRING_LEN * 2));
        bytes.extend_from_slice(b"\x1b\\ok");
        let events = decoder.decode(&bytes);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], DecoderEvent::Malformed(_)));
        assert_eq!(events[1], text("ok"));
    }

    #[test]
    fn test_large_dcs_is_consumed_silently() {
        let mut decoder = Decoder::new();
        let mut bytes = b"\x1bPq".to_vec();
        bytes.extend(std::iter::repeat(b'~').take(MAX_STRING_LEN * 2));
        bytes.extend_from_slice(b"\x1b\\ok");
        assert_eq!(decoder.decode(&bytes), vec![text("ok")]);
    }

    #[test]
    fn test_dcs_is_consumed_silently() {
        let mut decoder = Decoder::new();
        assert_eq!(decoder.decode(b"\x1bPq#0;1\x1b\\ok"), vec![text("ok")]);
    }

    #[test]
    fn test_escape_sequences() {
        let mut decoder = Decoder::new();
        assert_eq!(
            decoder.decode(b"\x1b7\x1b(B"),
            vec![
                DecoderEvent::Escape(EscSequence {
                    intermediates: vec![],
                    final_byte: b'7'
                }),
                DecoderEvent::Escape(EscSequence {
                    intermediates: vec![b'('],
                    final_byte: b'B'
                }),
            ]
        );
    }

    #[test]
    fn test_lazy_iteration_yields_in_order() {
        let mut decoder = Decoder::new();
        let mut events = decoder.feed(b"x\x1b[Ay");
        assert_eq!(events.next(), Some(text("x")));
        assert_eq!(events.next(), Some(csi(None, &[], b'A')));
        assert_eq!(events.next(), Some(text("y")));
        assert_eq!(events.next(), None);
    }

    #[test]
    fn test_colon_direct_color_drops_colorspace() {
        let mut decoder = Decoder::new();
        assert_eq!(
            decoder.decode(b"\x1b[38:2::10:20:30m"),
            vec![csi(None, &[38, 2, 10, 20, 30], b'm')]
        );
        assert_eq!(
            decoder.decode(b"\x1b[1;48:2:0:1:2:3;4m"),
            vec![csi(None, &[1, 48, 2, 1, 2, 3, 4], b'm')]
        );
        // Without a colorspace slot the group is left alone
        assert_eq!(
            decoder.decode(b"\x1b[38:2:10:20:30m"),
            vec![csi(None, &[38, 2, 10, 20, 30], b'm')]
        );
        assert_eq!(
            decoder.decode(b"\x1b[38;2;10;20;30;40m"),
            vec![csi(None, &[38, 2, 10, 20, 30, 40], b'm')]
        );
    }

    #[test]
    fn test_param_or_defaults() {
        let seq = CsiSequence {
            params: vec![0, 7],
            final_byte: b'H',
            ..CsiSequence::default()
        };
        assert_eq!(seq.param_or(0, 1), 1);
        assert_eq!(seq.param_or(1, 1), 7);
        assert_eq!(seq.param_or(2, 1), 1);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn stream() -> impl Strategy<Value = Vec<u8>> {
            let pieces = prop::sample::select(vec![
                b"hello ".to_vec(),
                b"\x1b[31m".to_vec(),
                b"\x1b[2;5H".to_vec(),
                b"\x1b]0;title\x07".to_vec(),
                b"\r\n".to_vec(),
                "日本語".as_bytes().to_vec(),
                b"\xff".to_vec(),
                b"\x1b[?1049h".to_vec(),
                b"\x1b7".to_vec(),
            ]);
            prop::collection::vec(pieces, 0..20).prop_map(|v| v.concat())
        }

        proptest! {
            #[test]
            fn chunking_does_not_change_events(
                bytes in stream(),
                cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..8),
            ) {
                let whole = normalize(Decoder::new().decode(&bytes));

                let mut points: Vec<usize> = cuts.iter().map(|i| i.index(bytes.len() + 1)).collect();
                points.sort_unstable();
                let mut decoder = Decoder::new();
                let mut split = Vec::new();
                let mut start = 0;
                for point in points.into_iter().chain(std::iter::once(bytes.len())) {
                    split.extend(decoder.decode(&bytes[start..point]));
                    start = point;
                }
                prop_assert_eq!(whole, normalize(split));
            }

            #[test]
            fn random_bytes_never_buffer_unbounded(bytes in prop::collection::vec(any::<u8>(), 0..2000)) {
                let mut decoder = Decoder::new();
                let _ = decoder.decode(&bytes);
                prop_assert!(decoder.pending_len() <= MAX_STRING_LEN + 1);
            }
        }
    }
}
