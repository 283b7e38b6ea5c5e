//! Terminal renderer using crossterm
//!
//! Draws screen snapshots to the hosting console, redrawing only the rows
//! that changed since the last frame, plus a one-row status bar below the
//! child's grid.

use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    style::{Attribute, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType, DisableLineWrap, EnableLineWrap, EnterAlternateScreen, LeaveAlternateScreen},
};
use unicode_width::UnicodeWidthChar;

use crate::core::session::SessionStatus;
use crate::core::term::{AttrFlags, CellAttrs, Row, ScreenSnapshot};

/// Contents of the status bar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub command: String,
    pub status: SessionStatus,
    /// Rules that can still fire
    pub armed: usize,
    pub rules: usize,
    pub fired: u64,
}

impl StatusLine {
    /// Status bar text, cut to `width` display columns
    pub fn text(&self, width: u16) -> String {
        let hint = match self.status {
            SessionStatus::Running => "",
            _ => "  [r] restart  [q] quit",
        };
        let full = format!(
            " {} | {} | rules {}/{} armed, {} fired{}",
            self.command, self.status, self.armed, self.rules, self.fired, hint
        );
        truncate_to_width(&full, width)
    }
}

fn truncate_to_width(text: &str, width: u16) -> String {
    let mut out = String::with_capacity(text.len());
    let mut used = 0usize;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > width as usize {
            break;
        }
        used += w;
        out.push(ch);
    }
    out
}

/// Terminal renderer
pub struct Renderer {
    /// Whether the terminal has been initialized
    initialized: bool,
    /// Rows as drawn in the previous frame
    drawn: Vec<Option<Row>>,
    drawn_status: Option<String>,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            initialized: false,
            drawn: Vec::new(),
            drawn_status: None,
        }
    }

    /// Enter raw mode and the alternate screen
    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;

        let mut stdout = io::stdout();
        execute!(
            stdout,
            EnterAlternateScreen,
            DisableLineWrap,
            Clear(ClearType::All),
            MoveTo(0, 0)
        )?;
        stdout.flush()?;
        self.initialized = true;
        self.invalidate();
        Ok(())
    }

    /// Restore the hosting terminal
    pub fn cleanup(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;

        let mut stdout = io::stdout();
        let _ = execute!(stdout, ResetColor, SetAttribute(Attribute::Reset));
        let _ = execute!(stdout, Show, EnableLineWrap, LeaveAlternateScreen);
        let _ = stdout.flush();

        terminal::disable_raw_mode()?;
        Ok(())
    }

    /// Forget the previous frame so the next render redraws everything
    pub fn invalidate(&mut self) {
        self.drawn.clear();
        self.drawn_status = None;
    }

    /// Host terminal size
    pub fn size() -> io::Result<(u16, u16)> {
        terminal::size()
    }

    /// Draw a snapshot and the status bar to stdout
    pub fn render(&mut self, snapshot: &ScreenSnapshot, status: &StatusLine) -> io::Result<()> {
        let stdout = io::stdout();
        let mut out = io::BufWriter::with_capacity(65536, stdout.lock());
        self.render_to(&mut out, snapshot, status)?;
        out.flush()
    }

    /// Draw into any writer; rows equal to the previous frame are skipped.
    pub fn render_to<W: Write>(&mut self, out: &mut W, snapshot: &ScreenSnapshot, status: &StatusLine) -> io::Result<()> {
        // Begin synchronized update (reduces flicker)
        write!(out, "\x1b[?2026h")?;
        queue!(out, Hide)?;
        if self.drawn.is_empty() {
            queue!(out, Clear(ClearType::All))?;
        }

        self.drawn.resize(snapshot.lines.len(), None);
        for (row_idx, row) in snapshot.lines.iter().enumerate() {
            if self.drawn[row_idx].as_ref() == Some(row) {
                continue;
            }
            self.render_row(out, row_idx as u16, row, snapshot.cols)?;
            self.drawn[row_idx] = Some(row.clone());
        }

        let status_text = status.text(snapshot.cols);
        if self.drawn_status.as_ref() != Some(&status_text) {
            queue!(out, MoveTo(0, snapshot.rows))?;
            write!(out, "\x1b[K")?;
            queue!(out, SetAttribute(Attribute::Reverse))?;
            let pad = (snapshot.cols as usize).saturating_sub(display_width(&status_text));
            write!(out, "{}{}", status_text, " ".repeat(pad))?;
            queue!(out, SetAttribute(Attribute::Reset))?;
            self.drawn_status = Some(status_text);
        }

        if snapshot.cursor_visible && status.status.is_running() {
            queue!(out, MoveTo(snapshot.cursor_col, snapshot.cursor_row), Show)?;
        }

        // End synchronized update
        write!(out, "\x1b[?2026l")?;
        Ok(())
    }

    fn render_row<W: Write>(&self, out: &mut W, row_idx: u16, row: &Row, cols: u16) -> io::Result<()> {
        queue!(out, MoveTo(0, row_idx))?;
        write!(out, "\x1b[K")?;

        let mut current_attrs = CellAttrs::default();
        let mut line_buffer = String::with_capacity(256);
        let mut col_idx: u16 = 0;

        for cell in &row.cells {
            if col_idx >= cols {
                break;
            }
            // Continuation cells are covered by the wide character before them
            if cell.is_continuation() {
                col_idx += 1;
                continue;
            }

            if cell.attrs != current_attrs {
                if !line_buffer.is_empty() {
                    self.apply_attrs(out, &current_attrs)?;
                    write!(out, "{}", line_buffer)?;
                    line_buffer.clear();
                }
                current_attrs = cell.attrs.clone();
            }

            line_buffer.push_str(cell.display_char());
            col_idx += cell.width.max(1) as u16;
        }

        if !line_buffer.is_empty() {
            self.apply_attrs(out, &current_attrs)?;
            write!(out, "{}", line_buffer)?;
        }
        queue!(out, ResetColor, SetAttribute(Attribute::Reset))?;
        Ok(())
    }

    /// Apply cell attributes
    fn apply_attrs<W: Write>(&self, out: &mut W, attrs: &CellAttrs) -> io::Result<()> {
        queue!(out, SetAttribute(Attribute::Reset))?;

        let styles = [
            (AttrFlags::BOLD, Attribute::Bold),
            (AttrFlags::DIM, Attribute::Dim),
            (AttrFlags::ITALIC, Attribute::Italic),
            (AttrFlags::UNDERLINE, Attribute::Underlined),
            (AttrFlags::BLINK, Attribute::SlowBlink),
            (AttrFlags::INVERSE, Attribute::Reverse),
            (AttrFlags::HIDDEN, Attribute::Hidden),
            (AttrFlags::STRIKETHROUGH, Attribute::CrossedOut),
        ];
        for (flag, attribute) in styles {
            if attrs.flags.contains(flag) {
                queue!(out, SetAttribute(attribute))?;
            }
        }

        let fg_color = attrs.fg.to_crossterm();
        if fg_color != crossterm::style::Color::Reset {
            queue!(out, SetForegroundColor(fg_color))?;
        }
        let bg_color = attrs.bg.to_crossterm();
        if bg_color != crossterm::style::Color::Reset {
            queue!(out, SetBackgroundColor(bg_color))?;
        }
        Ok(())
    }
}

fn display_width(text: &str) -> usize {
    text.chars().map(|c| c.width().unwrap_or(0)).sum()
}

impl Drop for Renderer {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}
