//! Screen model
//!
//! Applies decoder events to a [`TerminalState`] and hands out immutable
//! snapshots for rendering. The model performs no I/O; answers the terminal
//! owes the child (cursor position reports, device attributes) are queued
//! and collected by the owner with [`ScreenModel::take_replies`].

use std::sync::Arc;

use super::parser::{ControlFunction, CsiSequence, DecoderEvent, EscSequence};
use super::state::{AttrFlags, Cell, Color, Row, TerminalModes, TerminalState};

/// Reply that needs to be sent back to the PTY
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Device status report: ESC [ 0 n
    OperatingStatus,
    /// Cursor position report: ESC [ row ; col R (1-indexed)
    CursorPosition(u16, u16),
    /// Device attributes response
    DeviceAttributes,
    /// Secondary device attributes response
    SecondaryDeviceAttributes,
}

impl Reply {
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Reply::OperatingStatus => b"\x1b[0n".to_vec(),
            Reply::CursorPosition(row, col) => format!("\x1b[{};{}R", row, col).into_bytes(),
            // VT220
            Reply::DeviceAttributes => b"\x1b[?62;c".to_vec(),
            Reply::SecondaryDeviceAttributes => b"\x1b[>1;10;0c".to_vec(),
        }
    }
}

/// Byte-driven terminal screen
#[derive(Debug)]
pub struct ScreenModel {
    state: TerminalState,
    replies: Vec<Reply>,
}

impl ScreenModel {
    /// Create a screen of `cols` x `rows`. Zero dimensions are raised to 1.
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            state: TerminalState::new(cols.max(1), rows.max(1)),
            replies: Vec::new(),
        }
    }

    pub fn state(&self) -> &TerminalState {
        &self.state
    }

    pub fn size(&self) -> (u16, u16) {
        (self.state.cols, self.state.rows)
    }

    /// Resize the grid. Returns false when the size did not change.
    pub fn resize(&mut self, cols: u16, rows: u16) -> bool {
        self.state.resize(cols.max(1), rows.max(1))
    }

    /// Drop all content and modes, keeping the size.
    pub fn reset(&mut self) {
        self.state.reset();
        self.replies.clear();
    }

    /// Replies queued since the last call
    pub fn take_replies(&mut self) -> Vec<Reply> {
        std::mem::take(&mut self.replies)
    }

    /// Immutable copy of the grid for rendering
    pub fn snapshot(&self) -> Arc<ScreenSnapshot> {
        let state = &self.state;
        Arc::new(ScreenSnapshot {
            cols: state.cols,
            rows: state.rows,
            lines: state.grid.clone(),
            cursor_row: state.cursor.row,
            cursor_col: state.cursor.col,
            cursor_visible: state.cursor.visible,
            title: state.title.clone(),
            modes: state.modes,
        })
    }

    pub fn apply(&mut self, event: &DecoderEvent) {
        match event {
            DecoderEvent::Text(text) => {
                for ch in text.chars() {
                    self.state.put_char(ch);
                }
            }
            DecoderEvent::Control(control) => self.execute_control(*control),
            DecoderEvent::Csi(sequence) => self.execute_csi(sequence),
            DecoderEvent::Osc(payload) => self.execute_osc(payload),
            DecoderEvent::Escape(sequence) => self.execute_escape(sequence),
            DecoderEvent::Malformed(_) => {}
        }
    }

    fn execute_control(&mut self, control: ControlFunction) {
        let state = &mut self.state;
        match control {
            ControlFunction::LineFeed | ControlFunction::VerticalTab | ControlFunction::FormFeed => {
                state.linefeed();
                if state.modes.linefeed_newline {
                    state.carriage_return();
                }
            }
            ControlFunction::CarriageReturn => state.carriage_return(),
            ControlFunction::Backspace => state.backspace(),
            ControlFunction::HorizontalTab => state.horizontal_tab(),
            ControlFunction::Bell
            | ControlFunction::ShiftOut
            | ControlFunction::ShiftIn
            | ControlFunction::Other(_) => {}
        }
    }

    fn execute_escape(&mut self, sequence: &EscSequence) {
        let state = &mut self.state;
        match (sequence.intermediates.as_slice(), sequence.final_byte) {
            ([], b'7') => state.save_cursor(),
            ([], b'8') => state.restore_cursor(),
            // Index
            ([], b'D') => state.linefeed(),
            // Next line
            ([], b'E') => {
                state.carriage_return();
                state.linefeed();
            }
            // Reverse index
            ([], b'M') => state.reverse_index(),
            ([], b'c') => self.reset(),
            // Charset designation and keypad modes have no visible effect here
            ([b'(' | b')' | b'*' | b'+'], _) | ([], b'=' | b'>') => {}
            _ => {
                tracing::debug!(
                    "Unknown ESC: intermediates={:?}, final={:?}",
                    sequence.intermediates,
                    sequence.final_byte as char
                );
            }
        }
    }

    fn execute_csi(&mut self, sequence: &CsiSequence) {
        let state = &mut self.state;
        let params = &sequence.params;
        let n = sequence.param_or(0, 1);

        if !sequence.intermediates.is_empty() {
            // DECSCUSR and friends
            tracing::debug!(
                "Ignored CSI with intermediates {:?}, final={:?}",
                sequence.intermediates,
                sequence.final_byte as char
            );
            return;
        }

        match (sequence.private_marker, sequence.final_byte) {
            // Cursor movement
            (None, b'A') => state.cursor_up(n),
            (None, b'B') | (None, b'e') => state.cursor_down(n),
            (None, b'C') | (None, b'a') => state.cursor_forward(n),
            (None, b'D') => state.cursor_backward(n),
            (None, b'E') => {
                // CNL - Cursor Next Line
                state.cursor_down(n);
                state.carriage_return();
            }
            (None, b'F') => {
                // CPL - Cursor Previous Line
                state.cursor_up(n);
                state.carriage_return();
            }
            // CHA - Cursor Character Absolute
            (None, b'G') | (None, b'`') => state.cursor_column(n),
            // CUP / HVP - Cursor Position
            (None, b'H') | (None, b'f') => {
                state.cursor_position(sequence.param_or(0, 1), sequence.param_or(1, 1))
            }
            // VPA - Line Position Absolute
            (None, b'd') => state.cursor_row(n),

            // Erase
            (None, b'J') => state.erase_in_display(params.first().copied().unwrap_or(0)),
            (None, b'K') => state.erase_in_line(params.first().copied().unwrap_or(0)),

            // Line operations
            (None, b'L') => state.insert_lines(n),
            (None, b'M') => state.delete_lines(n),

            // Character operations
            (None, b'@') => state.insert_chars(n),
            (None, b'P') => state.delete_chars(n),
            (None, b'X') => state.erase_chars(n),

            // Scroll
            (None, b'S') => state.scroll_up(n),
            (None, b'T') => state.scroll_down(n),

            // Scroll region
            (None, b'r') => {
                let top = sequence.param_or(0, 1);
                let bottom = sequence.param_or(1, state.rows);
                state.set_scroll_region(top, bottom);
            }

            // SGR - Select Graphic Rendition
            (None, b'm') => Self::execute_sgr(params, state),

            // Save/restore cursor
            (None, b's') => state.save_cursor(),
            (None, b'u') => state.restore_cursor(),

            // Device Status Report
            (None, b'n') => match params.first() {
                Some(5) => self.replies.push(Reply::OperatingStatus),
                Some(6) => self.replies.push(Reply::CursorPosition(
                    state.cursor.row + 1,
                    state.cursor.col + 1,
                )),
                _ => {}
            },

            // Device Attributes
            (None, b'c') => {
                if params.first().copied().unwrap_or(0) == 0 {
                    self.replies.push(Reply::DeviceAttributes);
                }
            }
            (Some(b'>'), b'c') => self.replies.push(Reply::SecondaryDeviceAttributes),

            // Modes
            (Some(b'?'), b'h') | (Some(b'?'), b'l') => {
                let enable = sequence.final_byte == b'h';
                for &p in params {
                    if !state.set_private_mode(p, enable) {
                        tracing::debug!("Unsupported private mode {} ({})", p, enable);
                    }
                }
            }
            (None, b'h') | (None, b'l') => {
                let enable = sequence.final_byte == b'h';
                for &p in params {
                    if !state.set_ansi_mode(p, enable) {
                        tracing::debug!("Unsupported mode {} ({})", p, enable);
                    }
                }
            }

            _ => {
                tracing::debug!(
                    "Unknown CSI: marker={:?}, params={:?}, final={:?}",
                    sequence.private_marker.map(char::from),
                    params,
                    sequence.final_byte as char
                );
            }
        }
    }

    fn execute_sgr(params: &[u16], state: &mut TerminalState) {
        if params.is_empty() {
            state.current_attrs.reset();
            return;
        }

        let attrs = &mut state.current_attrs;
        let mut iter = params.iter().copied();

        while let Some(param) = iter.next() {
            match param {
                0 => attrs.reset(),
                1 => attrs.flags |= AttrFlags::BOLD,
                2 => attrs.flags |= AttrFlags::DIM,
                3 => attrs.flags |= AttrFlags::ITALIC,
                4 => attrs.flags |= AttrFlags::UNDERLINE,
                5 | 6 => attrs.flags |= AttrFlags::BLINK,
                7 => attrs.flags |= AttrFlags::INVERSE,
                8 => attrs.flags |= AttrFlags::HIDDEN,
                9 => attrs.flags |= AttrFlags::STRIKETHROUGH,

                22 => attrs.flags &= !(AttrFlags::BOLD | AttrFlags::DIM),
                23 => attrs.flags &= !AttrFlags::ITALIC,
                24 => attrs.flags &= !AttrFlags::UNDERLINE,
                25 => attrs.flags &= !AttrFlags::BLINK,
                27 => attrs.flags &= !AttrFlags::INVERSE,
                28 => attrs.flags &= !AttrFlags::HIDDEN,
                29 => attrs.flags &= !AttrFlags::STRIKETHROUGH,

                30..=37 => attrs.fg = Color::Indexed((param - 30) as u8),
                38 => {
                    if let Some(color) = extended_color(&mut iter) {
                        attrs.fg = color;
                    }
                }
                39 => attrs.fg = Color::Default,

                40..=47 => attrs.bg = Color::Indexed((param - 40) as u8),
                48 => {
                    if let Some(color) = extended_color(&mut iter) {
                        attrs.bg = color;
                    }
                }
                49 => attrs.bg = Color::Default,

                // Bright colors
                90..=97 => attrs.fg = Color::Indexed((param - 90 + 8) as u8),
                100..=107 => attrs.bg = Color::Indexed((param - 100 + 8) as u8),

                _ => {}
            }
        }
    }

    fn execute_osc(&mut self, payload: &str) {
        // "code;text"
        let Some((code, text)) = payload.split_once(';') else {
            return;
        };
        match code {
            "0" | "1" | "2" => self.state.title = text.to_string(),
            _ => tracing::debug!("Ignored OSC {}", code),
        }
    }
}

/// `5;n` (256 colors) or `2;r;g;b` after SGR 38/48
fn extended_color(iter: &mut impl Iterator<Item = u16>) -> Option<Color> {
    match iter.next()? {
        5 => iter.next().map(|n| Color::Indexed(n.min(255) as u8)),
        2 => {
            let r = iter.next().unwrap_or(0).min(255) as u8;
            let g = iter.next().unwrap_or(0).min(255) as u8;
            let b = iter.next().unwrap_or(0).min(255) as u8;
            Some(Color::Rgb(r, g, b))
        }
        _ => None,
    }
}

/// Immutable view of the screen handed to the renderer
#[derive(Clone, Debug, PartialEq)]
pub struct ScreenSnapshot {
    pub cols: u16,
    pub rows: u16,
    pub lines: Vec<Row>,
    pub cursor_row: u16,
    pub cursor_col: u16,
    pub cursor_visible: bool,
    pub title: String,
    pub modes: TerminalModes,
}

impl ScreenSnapshot {
    pub fn cell(&self, row: u16, col: u16) -> Option<&Cell> {
        self.lines.get(row as usize)?.cells.get(col as usize)
    }

    /// Text of one row with trailing blanks removed
    pub fn row_text(&self, row: u16) -> String {
        self.lines
            .get(row as usize)
            .map(Row::text)
            .unwrap_or_default()
    }

    /// Whole screen as text. Soft-wrapped rows are joined, trailing empty
    /// rows are dropped.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.text());
            if !line.wrapped {
                out.push('\n');
            }
        }
        out.truncate(out.trim_end().len());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::term::parser::Decoder;
    use pretty_assertions::assert_eq;

    fn feed(screen: &mut ScreenModel, decoder: &mut Decoder, bytes: &[u8]) {
        for event in decoder.feed(bytes) {
            screen.apply(&event);
        }
    }

    fn screen_with(cols: u16, rows: u16, bytes: &[u8]) -> ScreenModel {
        let mut screen = ScreenModel::new(cols, rows);
        feed(&mut screen, &mut Decoder::new(), bytes);
        screen
    }

    #[test]
    fn test_cursor_movement() {
        let screen = screen_with(80, 24, b"\x1b[5;10H");
        let snap = screen.snapshot();
        assert_eq!((snap.cursor_row, snap.cursor_col), (4, 9));
    }

    #[test]
    fn test_sgr_red_then_reset() {
        let screen = screen_with(80, 24, b"\x1b[31mHELLO\x1b[0m!");
        let snap = screen.snapshot();
        assert_eq!(snap.row_text(0), "HELLO!");
        for col in 0..5 {
            assert_eq!(snap.cell(0, col).map(|c| c.attrs.fg), Some(Color::RED));
        }
        assert_eq!(snap.cell(0, 5).map(|c| c.attrs.fg), Some(Color::Default));
        assert_eq!(screen.state().current_attrs.fg, Color::Default);
    }

    #[test]
    fn test_sgr_extended_and_flags() {
        let screen = screen_with(10, 1, b"\x1b[1;4;38;5;200;48;2;1;2;3mX");
        let cell = screen.snapshot().cell(0, 0).cloned().unwrap_or_default();
        assert_eq!(cell.attrs.fg, Color::Indexed(200));
        assert_eq!(cell.attrs.bg, Color::Rgb(1, 2, 3));
        assert_eq!(cell.attrs.flags, AttrFlags::BOLD | AttrFlags::UNDERLINE);
    }

    #[test]
    fn test_linefeed_on_last_row_scrolls_grid() {
        let mut screen = ScreenModel::new(80, 24);
        let mut decoder = Decoder::new();
        for row in 1..=24 {
            feed(&mut screen, &mut decoder, format!("\x1b[{};1Hline{}", row, row).as_bytes());
        }
        feed(&mut screen, &mut decoder, b"\x1b[24;1H");
        let before = screen.snapshot();

        feed(&mut screen, &mut decoder, b"\n");
        let after = screen.snapshot();

        for row in 0..23 {
            assert_eq!(after.lines[row], before.lines[row + 1]);
        }
        assert_eq!(after.lines[23], Row::new(80));
        assert_eq!(after.cursor_row, 23);
    }

    #[test]
    fn test_cursor_report_is_queued() {
        let mut screen = screen_with(80, 24, b"\x1b[3;4H\x1b[6n\x1b[c\x1b[>c");
        assert_eq!(
            screen.take_replies(),
            vec![
                Reply::CursorPosition(3, 4),
                Reply::DeviceAttributes,
                Reply::SecondaryDeviceAttributes,
            ]
        );
        assert!(screen.take_replies().is_empty());
        assert_eq!(Reply::CursorPosition(3, 4).to_bytes(), b"\x1b[3;4R".to_vec());
    }

    #[test]
    fn test_title_and_modes_in_snapshot() {
        let screen = screen_with(20, 2, b"\x1b]2;build\x07\x1b[?25l\x1b[?2004h\x1b[?1h");
        let snap = screen.snapshot();
        assert_eq!(snap.title, "build");
        assert!(!snap.cursor_visible);
        assert!(snap.modes.bracketed_paste);
        assert!(snap.modes.application_cursor);
    }

    #[test]
    fn test_unknown_sequences_do_not_mutate() {
        let mut screen = screen_with(20, 3, b"abc");
        let before = screen.snapshot();
        feed(&mut screen, &mut Decoder::new(), b"\x1b[?9999h\x1b[5y\x1b]777;x\x07\x1b[2 q\x1b#8");
        assert_eq!(screen.snapshot(), before);
    }

    #[test]
    fn test_oversized_strings_leave_no_trace() {
        let mut bytes = b"\x1b]52;c;".to_vec();
        bytes.extend(std::iter::repeat(b'Q').take(5000));
        bytes.extend_from_slice(b"\x07ok");
        let snap = screen_with(80, 24, &bytes).snapshot();
        assert_eq!(snap.row_text(0), "ok");
        assert_eq!(snap.text(), "ok");

        let mut bytes = b"\x1bPq".to_vec();
        bytes.extend(std::iter::repeat(b'~').take(5000));
        bytes.extend_from_slice(b"\x1b\\ok");
        assert_eq!(screen_with(80, 24, &bytes).snapshot().text(), "ok");

        let mut bytes = b"\x1b[".to_vec();
        bytes.extend(std::iter::repeat(b'1').take(1000));
        bytes.extend_from_slice(b"mok");
        let snap = screen_with(80, 24, &bytes).snapshot();
        assert_eq!(snap.text(), "ok");
        assert_eq!(snap.cell(0, 0).map(|c| c.attrs.flags), Some(AttrFlags::empty()));
    }

    #[test]
    fn test_colon_direct_color() {
        let screen = screen_with(10, 1, b"\x1b[38:2::10:20:30;48:2:0:1:2:3mX");
        let cell = screen.snapshot().cell(0, 0).cloned().unwrap_or_default();
        assert_eq!(cell.attrs.fg, Color::Rgb(10, 20, 30));
        assert_eq!(cell.attrs.bg, Color::Rgb(1, 2, 3));
    }

    #[test]
    fn test_newline_mode() {
        let screen = screen_with(20, 3, b"\x1b[20hab\ncd");
        let snap = screen.snapshot();
        assert_eq!(snap.row_text(1), "cd");
    }

    #[test]
    fn test_escape_save_restore_and_index() {
        let screen = screen_with(20, 3, b"ab\x1b7\x1b[3;1Hzz\x1b8c\x1bEd");
        let snap = screen.snapshot();
        assert_eq!(snap.row_text(0), "abc");
        assert_eq!(snap.row_text(1), "d");
        assert_eq!(snap.row_text(2), "zz");
    }

    #[test]
    fn test_snapshot_text_joins_wrapped_rows() {
        let screen = screen_with(4, 4, b"abcdef\r\nxy");
        assert_eq!(screen.snapshot().text(), "abcdef\nxy");
    }

    #[test]
    fn test_resize_twice_is_idempotent() {
        let mut screen = screen_with(20, 5, b"hello\r\nworld");
        assert!(screen.resize(10, 3));
        let first = screen.snapshot();
        assert!(!screen.resize(10, 3));
        assert_eq!(screen.snapshot(), first);
    }

    #[test]
    fn test_full_reset() {
        let mut screen = screen_with(10, 2, b"\x1b[31mabc\x1b]0;t\x07\x1bc");
        let snap = screen.snapshot();
        assert_eq!(snap.row_text(0), "");
        assert_eq!(snap.title, "");
        assert_eq!(screen.state().current_attrs.fg, Color::Default);
        assert!(screen.take_replies().is_empty());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn stream() -> impl Strategy<Value = Vec<u8>> {
            let pieces = prop::sample::select(vec![
                b"hello world ".to_vec(),
                b"\x1b[31m".to_vec(),
                b"\x1b[0m".to_vec(),
                b"\x1b[3;7H".to_vec(),
                b"\x1b[2J".to_vec(),
                b"\x1b[K".to_vec(),
                b"\r\n".to_vec(),
                b"\n\n\n".to_vec(),
                b"\x1b[2;4r".to_vec(),
                "日本語テキスト".as_bytes().to_vec(),
                b"\x1b]0;title\x07".to_vec(),
                b"\xe3\x81".to_vec(),
                b"\x1b[1;38;5;123m".to_vec(),
                b"\x08\x08\t".to_vec(),
                b"\x1bM".to_vec(),
            ]);
            prop::collection::vec(pieces, 0..40).prop_map(|v| v.concat())
        }

        proptest! {
            #[test]
            fn chunk_splits_reach_same_screen(
                bytes in stream(),
                cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..10),
            ) {
                let whole = screen_with(12, 6, &bytes).snapshot();

                let mut points: Vec<usize> = cuts.iter().map(|i| i.index(bytes.len() + 1)).collect();
                points.sort_unstable();
                let mut screen = ScreenModel::new(12, 6);
                let mut decoder = Decoder::new();
                let mut start = 0;
                for point in points.into_iter().chain(std::iter::once(bytes.len())) {
                    feed(&mut screen, &mut decoder, &bytes[start..point]);
                    start = point;
                }
                prop_assert_eq!(whole, screen.snapshot());
            }

            #[test]
            fn write_then_erase_restores_cells(
                row in 3u16..=6,
                col in 1u16..=10,
                len in 1usize..=10,
            ) {
                let mut screen = screen_with(20, 6, b"first line\r\nsecond line");
                let before = screen.snapshot();
                let text = "x".repeat(len);
                let mut decoder = Decoder::new();
                feed(&mut screen, &mut decoder, format!("\x1b[{};{}H{}", row, col, text).as_bytes());
                prop_assert_ne!(&screen.snapshot().lines, &before.lines);
                feed(&mut screen, &mut decoder, format!("\x1b[{};{}H\x1b[{}X", row, col, len).as_bytes());
                prop_assert_eq!(&screen.snapshot().lines, &before.lines);
            }
        }
    }
}
