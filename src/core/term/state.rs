//! Terminal state management
//!
//! This module defines the screen grid, cursor state, and cell attributes,
//! together with the primitive grid mutations the screen model is built on.

use bitflags::bitflags;
use unicode_width::UnicodeWidthChar;

/// Tab stops are fixed every this many columns
pub const TAB_WIDTH: u16 = 8;

/// Grid, cursor and modes of one terminal
#[derive(Clone, Debug)]
pub struct TerminalState {
    pub cols: u16,
    pub rows: u16,
    pub grid: Vec<Row>,
    pub cursor: CursorState,
    pub saved_cursor: Option<SavedCursor>,
    pub current_attrs: CellAttrs,
    pub modes: TerminalModes,
    pub title: String,
    /// Scroll region (top, bottom) - 0-indexed, inclusive
    pub scroll_region: (u16, u16),
}

impl TerminalState {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            cols,
            rows,
            grid: (0..rows).map(|_| Row::new(cols)).collect(),
            cursor: CursorState::default(),
            saved_cursor: None,
            current_attrs: CellAttrs::default(),
            modes: TerminalModes::default(),
            title: String::new(),
            scroll_region: (0, rows.saturating_sub(1)),
        }
    }

    /// Full reset (RIS). Keeps the size.
    pub fn reset(&mut self) {
        *self = Self::new(self.cols, self.rows);
    }

    /// Resize the grid, keeping existing content.
    ///
    /// Returns false when the size did not change. When rows shrink below the
    /// cursor, lines are dropped from the top so the cursor line survives.
    pub fn resize(&mut self, cols: u16, rows: u16) -> bool {
        if cols == self.cols && rows == self.rows {
            return false;
        }

        if rows < self.rows && self.cursor.row >= rows {
            let excess = (self.cursor.row - rows + 1) as usize;
            self.grid.drain(..excess.min(self.grid.len()));
            self.cursor.row -= excess as u16;
        }
        self.grid.truncate(rows as usize);
        while self.grid.len() < rows as usize {
            self.grid.push(Row::new(cols));
        }
        for row in &mut self.grid {
            row.resize(cols);
        }

        self.cols = cols;
        self.rows = rows;
        self.scroll_region = (0, rows.saturating_sub(1));

        let max_col = cols.saturating_sub(1);
        let max_row = rows.saturating_sub(1);
        self.cursor.col = self.cursor.col.min(max_col);
        self.cursor.row = self.cursor.row.min(max_row);
        self.cursor.pending_wrap = false;
        if let Some(saved) = &mut self.saved_cursor {
            saved.col = saved.col.min(max_col);
            saved.row = saved.row.min(max_row);
        }
        true
    }

    /// Attributes used for erased cells: only the background survives.
    pub fn erase_attrs(&self) -> CellAttrs {
        CellAttrs {
            bg: self.current_attrs.bg,
            ..CellAttrs::default()
        }
    }

    /// Put a character at the current cursor position
    pub fn put_char(&mut self, ch: char) {
        if self.cols == 0 || self.rows == 0 {
            return;
        }
        let width = ch.width().unwrap_or(0) as u16;

        if width == 0 {
            // Combining character - append to previous cell
            self.append_to_previous_cell(ch);
            return;
        }
        if width > self.cols {
            return;
        }

        if self.cursor.pending_wrap {
            self.wrap_line();
        }

        // A wide character that does not fit in the remaining columns
        if self.cursor.col + width > self.cols {
            if self.modes.auto_wrap {
                let blank = self.erase_attrs();
                let (row, col) = (self.cursor.row as usize, self.cursor.col as usize);
                self.grid[row].cells[col].clear(&blank);
                self.wrap_line();
            } else {
                self.cursor.col = self.cols - width;
            }
        }

        let (row, col) = (self.cursor.row as usize, self.cursor.col as usize);
        if self.modes.insert_mode {
            self.insert_chars(width);
        }

        self.handle_wide_char_overwrite(row, col);
        if width == 2 {
            self.handle_wide_char_overwrite(row, col + 1);
        }

        let attrs = self.current_attrs.clone();
        let line = &mut self.grid[row];
        line.cells[col] = Cell {
            grapheme: ch.to_string(),
            width: width as u8,
            attrs: attrs.clone(),
        };
        if width == 2 {
            line.cells[col + 1] = Cell::continuation(&attrs);
        }

        let next = self.cursor.col + width;
        if next >= self.cols {
            self.cursor.col = self.cols - 1;
            self.cursor.pending_wrap = self.modes.auto_wrap;
        } else {
            self.cursor.col = next;
        }
    }

    fn wrap_line(&mut self) {
        self.grid[self.cursor.row as usize].wrapped = true;
        self.cursor.col = 0;
        self.linefeed();
    }

    fn append_to_previous_cell(&mut self, ch: char) {
        let row = self.cursor.row as usize;
        let mut col = self.cursor.col as usize;
        if !self.cursor.pending_wrap {
            if col == 0 {
                return;
            }
            col -= 1;
        }
        if col > 0 && self.grid[row].cells[col].is_continuation() {
            col -= 1;
        }
        self.grid[row].cells[col].grapheme.push(ch);
    }

    /// Blank out the other half of a wide character about to be overwritten
    fn handle_wide_char_overwrite(&mut self, row: usize, col: usize) {
        let cols = self.cols as usize;
        if col >= cols {
            return;
        }
        let blank = self.erase_attrs();
        let line = &mut self.grid[row];

        if col > 0 && line.cells[col].is_continuation() {
            line.cells[col - 1].clear(&blank);
        }
        if line.cells[col].width == 2 && col + 1 < cols {
            line.cells[col + 1].clear(&blank);
        }
    }

    /// Carriage return - move cursor to column 0
    pub fn carriage_return(&mut self) {
        self.cursor.col = 0;
        self.cursor.pending_wrap = false;
    }

    /// Line feed - move cursor down, scroll if at the scroll region bottom
    pub fn linefeed(&mut self) {
        let bottom = self.scroll_region.1;
        self.cursor.pending_wrap = false;

        if self.cursor.row == bottom {
            self.scroll_up(1);
        } else if self.cursor.row + 1 < self.rows {
            self.cursor.row += 1;
        }
    }

    /// Reverse index - cursor up, scroll down if at the scroll region top
    pub fn reverse_index(&mut self) {
        self.cursor.pending_wrap = false;
        if self.cursor.row == self.scroll_region.0 {
            self.scroll_down(1);
        } else {
            self.cursor.row = self.cursor.row.saturating_sub(1);
        }
    }

    /// Backspace - move cursor left
    pub fn backspace(&mut self) {
        self.cursor.pending_wrap = false;
        self.cursor.col = self.cursor.col.saturating_sub(1);
    }

    /// Horizontal tab
    pub fn horizontal_tab(&mut self) {
        if self.cursor.pending_wrap {
            return;
        }
        let next = (self.cursor.col / TAB_WIDTH + 1) * TAB_WIDTH;
        self.cursor.col = next.min(self.cols.saturating_sub(1));
    }

    /// Scroll the scroll region up by n lines
    pub fn scroll_up(&mut self, n: u16) {
        let (top, bottom) = (self.scroll_region.0 as usize, self.scroll_region.1 as usize);
        if bottom >= self.grid.len() || top > bottom {
            return;
        }
        let n = (n as usize).min(bottom - top + 1);
        let blank = self.erase_attrs();
        let cols = self.cols;
        self.grid.drain(top..top + n);
        for _ in 0..n {
            self.grid.insert(bottom + 1 - n, Row::blank(cols, &blank));
        }
    }

    /// Scroll the scroll region down by n lines
    pub fn scroll_down(&mut self, n: u16) {
        let (top, bottom) = (self.scroll_region.0 as usize, self.scroll_region.1 as usize);
        if bottom >= self.grid.len() || top > bottom {
            return;
        }
        let n = (n as usize).min(bottom - top + 1);
        let blank = self.erase_attrs();
        let cols = self.cols;
        self.grid.drain(bottom + 1 - n..=bottom);
        for _ in 0..n {
            self.grid.insert(top, Row::blank(cols, &blank));
        }
    }

    /// Cursor up, stopping at the top margin when inside the region
    pub fn cursor_up(&mut self, n: u16) {
        let limit = if self.cursor.row >= self.scroll_region.0 {
            self.scroll_region.0
        } else {
            0
        };
        self.cursor.row = self.cursor.row.saturating_sub(n).max(limit);
        self.cursor.pending_wrap = false;
    }

    /// Cursor down, stopping at the bottom margin when inside the region
    pub fn cursor_down(&mut self, n: u16) {
        let limit = if self.cursor.row <= self.scroll_region.1 {
            self.scroll_region.1
        } else {
            self.rows.saturating_sub(1)
        };
        self.cursor.row = self.cursor.row.saturating_add(n).min(limit);
        self.cursor.pending_wrap = false;
    }

    /// Cursor forward (right)
    pub fn cursor_forward(&mut self, n: u16) {
        self.cursor.col = self
            .cursor
            .col
            .saturating_add(n)
            .min(self.cols.saturating_sub(1));
        self.cursor.pending_wrap = false;
    }

    /// Cursor backward (left)
    pub fn cursor_backward(&mut self, n: u16) {
        self.cursor.col = self.cursor.col.saturating_sub(n);
        self.cursor.pending_wrap = false;
    }

    /// Set cursor position (1-indexed parameters)
    pub fn cursor_position(&mut self, row: u16, col: u16) {
        self.cursor.row = row.saturating_sub(1).min(self.rows.saturating_sub(1));
        self.cursor.col = col.saturating_sub(1).min(self.cols.saturating_sub(1));
        self.cursor.pending_wrap = false;
    }

    /// Move to an absolute column (1-indexed)
    pub fn cursor_column(&mut self, col: u16) {
        self.cursor.col = col.saturating_sub(1).min(self.cols.saturating_sub(1));
        self.cursor.pending_wrap = false;
    }

    /// Move to an absolute row (1-indexed), keeping the column
    pub fn cursor_row(&mut self, row: u16) {
        self.cursor.row = row.saturating_sub(1).min(self.rows.saturating_sub(1));
        self.cursor.pending_wrap = false;
    }

    /// Erase in display
    pub fn erase_in_display(&mut self, mode: u16) {
        let blank = self.erase_attrs();
        let cursor_row = self.cursor.row as usize;
        match mode {
            0 => {
                self.erase_in_line(0);
                for row in self.grid.iter_mut().skip(cursor_row + 1) {
                    row.clear(&blank);
                }
            }
            1 => {
                for row in self.grid.iter_mut().take(cursor_row) {
                    row.clear(&blank);
                }
                self.erase_in_line(1);
            }
            2 | 3 => {
                for row in &mut self.grid {
                    row.clear(&blank);
                }
            }
            _ => {}
        }
    }

    /// Erase in line
    pub fn erase_in_line(&mut self, mode: u16) {
        let blank = self.erase_attrs();
        let col = self.cursor.col as usize;
        let Some(row) = self.grid.get_mut(self.cursor.row as usize) else {
            return;
        };

        match mode {
            0 => {
                for cell in row.cells.iter_mut().skip(col) {
                    cell.clear(&blank);
                }
                row.wrapped = false;
            }
            1 => {
                for cell in row.cells.iter_mut().take(col + 1) {
                    cell.clear(&blank);
                }
            }
            2 => row.clear(&blank),
            _ => {}
        }
        self.cursor.pending_wrap = false;
    }

    /// Insert blank lines at the cursor row, inside the scroll region
    pub fn insert_lines(&mut self, n: u16) {
        let (top, bottom) = self.scroll_region;
        if self.cursor.row < top || self.cursor.row > bottom {
            return;
        }
        let saved_top = self.scroll_region.0;
        self.scroll_region.0 = self.cursor.row;
        self.scroll_down(n);
        self.scroll_region.0 = saved_top;
        self.cursor.col = 0;
        self.cursor.pending_wrap = false;
    }

    /// Delete lines at the cursor row, inside the scroll region
    pub fn delete_lines(&mut self, n: u16) {
        let (top, bottom) = self.scroll_region;
        if self.cursor.row < top || self.cursor.row > bottom {
            return;
        }
        let saved_top = self.scroll_region.0;
        self.scroll_region.0 = self.cursor.row;
        self.scroll_up(n);
        self.scroll_region.0 = saved_top;
        self.cursor.col = 0;
        self.cursor.pending_wrap = false;
    }

    /// Insert blank cells at the cursor, shifting the rest of the line right
    pub fn insert_chars(&mut self, n: u16) {
        let blank = self.erase_attrs();
        let col = self.cursor.col as usize;
        let cols = self.cols as usize;
        let row = &mut self.grid[self.cursor.row as usize];
        let n = (n as usize).min(cols - col);
        row.cells.truncate(cols - n);
        for _ in 0..n {
            row.cells.insert(col, Cell::blank(&blank));
        }
        row.repair_edges();
    }

    /// Delete cells at the cursor, shifting the rest of the line left
    pub fn delete_chars(&mut self, n: u16) {
        let blank = self.erase_attrs();
        let col = self.cursor.col as usize;
        let cols = self.cols as usize;
        let row = &mut self.grid[self.cursor.row as usize];
        let n = (n as usize).min(cols - col);
        row.cells.drain(col..col + n);
        row.cells.resize(cols, Cell::blank(&blank));
        row.repair_edges();
        self.cursor.pending_wrap = false;
    }

    /// Erase cells starting at the cursor without moving anything
    pub fn erase_chars(&mut self, n: u16) {
        let blank = self.erase_attrs();
        let col = self.cursor.col as usize;
        let row = &mut self.grid[self.cursor.row as usize];
        for cell in row.cells.iter_mut().skip(col).take(n.max(1) as usize) {
            cell.clear(&blank);
        }
        row.repair_edges();
        self.cursor.pending_wrap = false;
    }

    /// Set scroll region (1-indexed, inclusive) and home the cursor
    pub fn set_scroll_region(&mut self, top: u16, bottom: u16) {
        let rows = self.rows;
        let top = top.max(1).saturating_sub(1).min(rows.saturating_sub(1));
        let bottom = if bottom == 0 { rows } else { bottom.min(rows) };
        let bottom = bottom.saturating_sub(1);
        if top < bottom {
            self.scroll_region = (top, bottom);
            self.cursor_position(1, 1);
        }
    }

    /// Save cursor position and attributes
    pub fn save_cursor(&mut self) {
        self.saved_cursor = Some(SavedCursor {
            col: self.cursor.col,
            row: self.cursor.row,
            attrs: self.current_attrs.clone(),
        });
    }

    /// Restore cursor position and attributes
    pub fn restore_cursor(&mut self) {
        match self.saved_cursor.clone() {
            Some(saved) => {
                self.cursor.col = saved.col;
                self.cursor.row = saved.row;
                self.current_attrs = saved.attrs;
            }
            None => {
                self.cursor.col = 0;
                self.cursor.row = 0;
                self.current_attrs.reset();
            }
        }
        self.cursor.pending_wrap = false;
    }

    /// Set private mode (DECSET / DECRST). Returns false for unknown modes.
    pub fn set_private_mode(&mut self, mode: u16, enable: bool) -> bool {
        match mode {
            1 => self.modes.application_cursor = enable,
            7 => {
                self.modes.auto_wrap = enable;
                if !enable {
                    self.cursor.pending_wrap = false;
                }
            }
            25 => self.cursor.visible = enable,
            2004 => self.modes.bracketed_paste = enable,
            _ => return false,
        }
        true
    }

    /// Set ANSI mode (SM / RM). Returns false for unknown modes.
    pub fn set_ansi_mode(&mut self, mode: u16, enable: bool) -> bool {
        match mode {
            4 => self.modes.insert_mode = enable,
            20 => self.modes.linefeed_newline = enable,
            _ => return false,
        }
        true
    }
}

/// A single row
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    pub cells: Vec<Cell>,
    /// Set when output ran past the right margin into the next row
    pub wrapped: bool,
}

impl Row {
    pub fn new(cols: u16) -> Self {
        Self {
            cells: vec![Cell::default(); cols as usize],
            wrapped: false,
        }
    }

    fn blank(cols: u16, attrs: &CellAttrs) -> Self {
        Self {
            cells: vec![Cell::blank(attrs); cols as usize],
            wrapped: false,
        }
    }

    pub fn resize(&mut self, new_cols: u16) {
        self.cells.resize(new_cols as usize, Cell::default());
        self.repair_edges();
    }

    pub fn clear(&mut self, attrs: &CellAttrs) {
        for cell in &mut self.cells {
            cell.clear(attrs);
        }
        self.wrapped = false;
    }

    /// Row content with trailing blanks removed
    pub fn text(&self) -> String {
        let mut text = String::with_capacity(self.cells.len());
        for cell in &self.cells {
            if !cell.is_continuation() {
                text.push_str(cell.display_char());
            }
        }
        text.truncate(text.trim_end_matches(' ').len());
        text
    }

    /// Fix wide characters cut in half by shifting or truncation
    fn repair_edges(&mut self) {
        let len = self.cells.len();
        for i in 0..len {
            if self.cells[i].width == 2 && self.cells.get(i + 1).map_or(true, |c| !c.is_continuation()) {
                let attrs = self.cells[i].attrs.clone();
                self.cells[i].clear(&attrs);
            } else if self.cells[i].is_continuation() && (i == 0 || self.cells[i - 1].width != 2) {
                let attrs = self.cells[i].attrs.clone();
                self.cells[i].clear(&attrs);
            }
        }
    }
}

/// A single cell
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    /// Base character plus any combining marks; empty for a blank cell
    pub grapheme: String,
    /// Display width: 1, 2 for a wide character, 0 for its continuation
    pub width: u8,
    pub attrs: CellAttrs,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            grapheme: String::new(),
            width: 1,
            attrs: CellAttrs::default(),
        }
    }
}

impl Cell {
    pub fn blank(attrs: &CellAttrs) -> Self {
        Self {
            attrs: attrs.clone(),
            ..Self::default()
        }
    }

    pub fn clear(&mut self, attrs: &CellAttrs) {
        self.grapheme.clear();
        self.width = 1;
        self.attrs = attrs.clone();
    }

    pub fn continuation(attrs: &CellAttrs) -> Self {
        Self {
            grapheme: String::new(),
            width: 0,
            attrs: attrs.clone(),
        }
    }

    pub fn is_continuation(&self) -> bool {
        self.width == 0
    }

    /// Get the display character (space if empty)
    pub fn display_char(&self) -> &str {
        if self.grapheme.is_empty() {
            " "
        } else {
            &self.grapheme
        }
    }
}

/// Cell attributes
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CellAttrs {
    pub fg: Color,
    pub bg: Color,
    pub flags: AttrFlags,
}

impl CellAttrs {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Color definition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Color {
    #[default]
    Default,
    /// Palette index: 0-7 standard, 8-15 bright, 16-255 extended
    Indexed(u8),
    Rgb(u8, u8, u8),
}

impl Color {
    pub const RED: Color = Color::Indexed(1);

    /// Convert to crossterm color
    pub fn to_crossterm(self) -> crossterm::style::Color {
        match self {
            Color::Default => crossterm::style::Color::Reset,
            Color::Indexed(n) => crossterm::style::Color::AnsiValue(n),
            Color::Rgb(r, g, b) => crossterm::style::Color::Rgb { r, g, b },
        }
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct AttrFlags: u16 {
        const BOLD          = 0b0000_0000_0001;
        const DIM           = 0b0000_0000_0010;
        const ITALIC        = 0b0000_0000_0100;
        const UNDERLINE     = 0b0000_0000_1000;
        const BLINK         = 0b0000_0001_0000;
        const INVERSE       = 0b0000_0010_0000;
        const HIDDEN        = 0b0000_0100_0000;
        const STRIKETHROUGH = 0b0000_1000_0000;
    }
}

/// Cursor state
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CursorState {
    pub col: u16,
    pub row: u16,
    pub visible: bool,
    /// The last column was written; the next printable character wraps first
    pub pending_wrap: bool,
}

impl Default for CursorState {
    fn default() -> Self {
        Self {
            col: 0,
            row: 0,
            visible: true,
            pending_wrap: false,
        }
    }
}

/// Saved cursor state
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SavedCursor {
    pub col: u16,
    pub row: u16,
    pub attrs: CellAttrs,
}

/// Terminal modes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TerminalModes {
    pub application_cursor: bool,
    pub auto_wrap: bool,
    pub insert_mode: bool,
    pub linefeed_newline: bool,
    pub bracketed_paste: bool,
}

impl Default for TerminalModes {
    fn default() -> Self {
        Self {
            application_cursor: false,
            auto_wrap: true, // Usually enabled by default
            insert_mode: false,
            linefeed_newline: false,
            bracketed_paste: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(state: &mut TerminalState, s: &str) {
        for ch in s.chars() {
            state.put_char(ch);
        }
    }

    #[test]
    fn test_put_char_advances_cursor() {
        let mut state = TerminalState::new(10, 3);
        write(&mut state, "abc");
        assert_eq!(state.grid[0].text(), "abc");
        assert_eq!((state.cursor.row, state.cursor.col), (0, 3));
    }

    #[test]
    fn test_deferred_wrap() {
        let mut state = TerminalState::new(4, 3);
        write(&mut state, "abcd");
        assert_eq!((state.cursor.row, state.cursor.col), (0, 3));
        assert!(state.cursor.pending_wrap);

        write(&mut state, "e");
        assert_eq!(state.grid[0].text(), "abcd");
        assert!(state.grid[0].wrapped);
        assert_eq!(state.grid[1].text(), "e");
        assert_eq!((state.cursor.row, state.cursor.col), (1, 1));
    }

    #[test]
    fn test_no_wrap_overwrites_last_column() {
        let mut state = TerminalState::new(4, 2);
        state.set_private_mode(7, false);
        write(&mut state, "abcdef");
        assert_eq!(state.grid[0].text(), "abcf");
        assert_eq!(state.cursor.row, 0);
    }

    #[test]
    fn test_wide_char_occupies_two_cells() {
        let mut state = TerminalState::new(10, 2);
        write(&mut state, "日x");
        assert_eq!(state.grid[0].cells[0].width, 2);
        assert!(state.grid[0].cells[1].is_continuation());
        assert_eq!(state.grid[0].text(), "日x");
        assert_eq!(state.cursor.col, 3);
    }

    #[test]
    fn test_wide_char_at_last_column_wraps() {
        let mut state = TerminalState::new(3, 2);
        write(&mut state, "ab日");
        assert_eq!(state.grid[0].text(), "ab");
        assert_eq!(state.grid[1].text(), "日");
    }

    #[test]
    fn test_overwriting_half_of_wide_char_blanks_other_half() {
        let mut state = TerminalState::new(10, 2);
        write(&mut state, "日");
        state.cursor_position(1, 2);
        write(&mut state, "x");
        assert_eq!(state.grid[0].cells[0].grapheme, "");
        assert_eq!(state.grid[0].text(), " x");
    }

    #[test]
    fn test_combining_mark_joins_previous_cell() {
        let mut state = TerminalState::new(10, 2);
        write(&mut state, "e\u{301}");
        assert_eq!(state.grid[0].cells[0].grapheme, "e\u{301}");
        assert_eq!(state.cursor.col, 1);
    }

    #[test]
    fn test_linefeed_at_bottom_scrolls() {
        let mut state = TerminalState::new(5, 3);
        for (i, line) in ["one", "two", "three"].iter().enumerate() {
            state.cursor_position(i as u16 + 1, 1);
            write(&mut state, line);
        }
        state.cursor_position(3, 1);
        state.linefeed();
        assert_eq!(state.grid[0].text(), "two");
        assert_eq!(state.grid[1].text(), "three");
        assert_eq!(state.grid[2].text(), "");
        assert_eq!(state.cursor.row, 2);
    }

    #[test]
    fn test_linefeed_below_region_does_not_scroll() {
        let mut state = TerminalState::new(5, 5);
        state.set_scroll_region(1, 3);
        state.cursor_position(5, 1);
        write(&mut state, "x");
        state.linefeed();
        assert_eq!(state.cursor.row, 4);
        assert_eq!(state.grid[4].text(), "x");
    }

    #[test]
    fn test_scroll_region_limits_scrolling() {
        let mut state = TerminalState::new(5, 4);
        for i in 0..4u16 {
            state.cursor_position(i + 1, 1);
            write(&mut state, &i.to_string());
        }
        state.set_scroll_region(2, 3);
        state.cursor_position(3, 1);
        state.linefeed();
        let texts: Vec<String> = state.grid.iter().map(Row::text).collect();
        assert_eq!(texts, vec!["0", "2", "", "3"]);
    }

    #[test]
    fn test_reverse_index_at_top_scrolls_down() {
        let mut state = TerminalState::new(5, 3);
        write(&mut state, "top");
        state.cursor_position(1, 1);
        state.reverse_index();
        assert_eq!(state.grid[0].text(), "");
        assert_eq!(state.grid[1].text(), "top");
    }

    #[test]
    fn test_erase_in_line_modes() {
        let mut state = TerminalState::new(6, 1);
        write(&mut state, "abcdef");
        state.cursor_position(1, 3);
        state.erase_in_line(0);
        assert_eq!(state.grid[0].text(), "ab");

        write(&mut state, "cdef");
        state.cursor_position(1, 3);
        state.erase_in_line(1);
        assert_eq!(state.grid[0].text(), "   def");
    }

    #[test]
    fn test_erase_in_display_from_cursor() {
        let mut state = TerminalState::new(3, 3);
        for i in 0..3u16 {
            state.cursor_position(i + 1, 1);
            write(&mut state, "xyz");
        }
        state.cursor_position(2, 2);
        state.erase_in_display(0);
        let texts: Vec<String> = state.grid.iter().map(Row::text).collect();
        assert_eq!(texts, vec!["xyz", "x", ""]);
    }

    #[test]
    fn test_insert_and_delete_lines_stay_in_region() {
        let mut state = TerminalState::new(3, 4);
        for i in 0..4u16 {
            state.cursor_position(i + 1, 1);
            write(&mut state, &i.to_string());
        }
        state.set_scroll_region(1, 3);
        state.cursor_position(2, 1);
        state.insert_lines(1);
        let texts: Vec<String> = state.grid.iter().map(Row::text).collect();
        assert_eq!(texts, vec!["0", "", "1", "3"]);

        state.delete_lines(1);
        let texts: Vec<String> = state.grid.iter().map(Row::text).collect();
        assert_eq!(texts, vec!["0", "1", "", "3"]);
    }

    #[test]
    fn test_insert_and_delete_chars() {
        let mut state = TerminalState::new(5, 1);
        write(&mut state, "abcd");
        state.cursor_position(1, 2);
        state.insert_chars(2);
        assert_eq!(state.grid[0].text(), "a  bc");
        state.delete_chars(2);
        assert_eq!(state.grid[0].text(), "abc");
        state.erase_chars(1);
        assert_eq!(state.grid[0].text(), "a c");
    }

    #[test]
    fn test_tab_stops() {
        let mut state = TerminalState::new(20, 1);
        state.horizontal_tab();
        assert_eq!(state.cursor.col, 8);
        state.horizontal_tab();
        assert_eq!(state.cursor.col, 16);
        state.horizontal_tab();
        assert_eq!(state.cursor.col, 19);
    }

    #[test]
    fn test_save_restore_cursor() {
        let mut state = TerminalState::new(10, 5);
        state.cursor_position(3, 4);
        state.current_attrs.flags = AttrFlags::BOLD;
        state.save_cursor();
        state.cursor_position(1, 1);
        state.current_attrs.reset();
        state.restore_cursor();
        assert_eq!((state.cursor.row, state.cursor.col), (2, 3));
        assert_eq!(state.current_attrs.flags, AttrFlags::BOLD);
    }

    #[test]
    fn test_resize_preserves_content_and_clamps_cursor() {
        let mut state = TerminalState::new(10, 3);
        write(&mut state, "hello");
        assert!(state.resize(3, 5));
        assert_eq!(state.grid.len(), 5);
        assert_eq!(state.grid[0].text(), "hel");
        assert_eq!(state.cursor.col, 2);
        assert_eq!(state.scroll_region, (0, 4));
        assert!(!state.resize(3, 5));
    }

    #[test]
    fn test_resize_shrink_keeps_cursor_line() {
        let mut state = TerminalState::new(5, 4);
        for i in 0..4u16 {
            state.cursor_position(i + 1, 1);
            write(&mut state, &i.to_string());
        }
        state.resize(5, 2);
        let texts: Vec<String> = state.grid.iter().map(Row::text).collect();
        assert_eq!(texts, vec!["2", "3"]);
        assert_eq!(state.cursor.row, 1);
    }

    #[test]
    fn test_resize_splitting_wide_char() {
        let mut state = TerminalState::new(4, 1);
        write(&mut state, "a日");
        state.resize(2, 1);
        assert_eq!(state.grid[0].text(), "a");
        assert!(!state.grid[0].cells[1].is_continuation());
    }
}
