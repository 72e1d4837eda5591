//! Provides the [`Cursor`] type, the pagination state machine
//!
//! The cursor walks a [`LineBuffer`] one window at a time. A window is at most `width`
//! characters of a single line, starting at the column offset. Windows never span two lines:
//! a line shorter than the width, or the tail of a longer one, gives a shorter window.
//!
//! # Movement
//! Moving forward advances the column by the length of the window that was just shown and
//! goes to the start of the next line once the current one is used up. Moving backward by
//! window steps the column back by the full width, and from the start of a line lands on the
//! last window-width of the previous line.
//!
//! Moving by line ignores columns: forward always goes to the start of the next line,
//! backward goes to the start of the current line, or of the previous line if already there.
//!
//! # Boundaries
//! [`CursorState::Start`] and [`CursorState::End`] are absorbing in one direction each.
//! Going back from the very first column enters `Start`; going forward from `Start` shows
//! the window at the current position without advancing. Going forward past the last
//! character of a closed buffer enters `End`; going back from `End` shows the tail of the last
//! line again.
//!
//! The cursor never waits for data itself. When it needs a line that is not in the buffer yet
//! it reports [`Step::NeedMore`] and leaves its position untouched so that the caller can
//! fetch more and retry.
use super::{buffer::LineBuffer, CursorState};
use crate::error::ReaderError;

/// Window width used when none is configured
pub const DEFAULT_WINDOW_WIDTH: usize = 20;

/// Outcome of a cursor movement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The state or the window changed
    Moved,
    /// The movement was a no-op at a boundary
    Unchanged,
    /// The next position lies past the buffer frontier of an open source
    NeedMore,
}

/// Position of the reader inside a [`LineBuffer`]
///
/// While [`CursorState::Reading`], `line` is a valid buffer index and `column` is at most
/// the length of that line in characters.
#[derive(Debug, Clone)]
pub struct Cursor {
    line: usize,
    column: usize,
    state: CursorState,
    window: String,
    width: usize,
}

impl Cursor {
    /// # Panics
    /// If `width` is zero
    #[must_use]
    pub fn new(width: usize) -> Self {
        assert!(width > 0, "Window width must be at least one character");
        Self {
            line: 0,
            column: 0,
            state: CursorState::Start,
            window: String::new(),
            width,
        }
    }

    #[must_use]
    pub const fn line(&self) -> usize {
        self.line
    }

    /// Column offset of the window, in characters
    #[must_use]
    pub const fn column(&self) -> usize {
        self.column
    }

    #[must_use]
    pub const fn state(&self) -> CursorState {
        self.state
    }

    /// The text currently shown
    #[must_use]
    pub fn window(&self) -> &str {
        &self.window
    }

    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub const fn position(&self) -> (usize, usize) {
        (self.line, self.column)
    }

    /// Step forward by one window, or to the start of the next line if `by_line` is set
    pub fn next(&mut self, buf: &LineBuffer, by_line: bool) -> Step {
        match self.state {
            CursorState::End => Step::Unchanged,
            CursorState::Start => {
                if self.line < buf.len() {
                    self.show(buf);
                    Step::Moved
                } else {
                    self.past_frontier(buf)
                }
            }
            CursorState::Reading => {
                let line_len = char_len(current_line(buf, self.line));
                let window_len = char_len(&self.window);
                let exhausted = by_line || self.column + window_len >= line_len;

                if !exhausted {
                    self.column += window_len;
                } else if self.line + 1 < buf.len() {
                    self.line += 1;
                    self.column = 0;
                } else {
                    return self.past_frontier(buf);
                }
                self.show(buf);
                Step::Moved
            }
        }
    }

    /// Step back by one window, or to the start of a line if `by_line` is set
    pub fn prev(&mut self, buf: &LineBuffer, by_line: bool) -> Step {
        match self.state {
            CursorState::Start => return Step::Unchanged,
            CursorState::End => {
                let Some(last) = buf.len().checked_sub(1) else {
                    self.reset();
                    return Step::Moved;
                };
                let line_len = char_len(current_line(buf, last));
                self.line = last;
                self.column = if by_line {
                    0
                } else {
                    line_len.saturating_sub(self.width)
                };
            }
            CursorState::Reading if self.position() == (0, 0) => {
                self.reset();
                return Step::Moved;
            }
            CursorState::Reading if by_line => {
                // Back to the start of this line first, so no line is ever skipped
                if self.column == 0 {
                    self.line -= 1;
                }
                self.column = 0;
            }
            CursorState::Reading if self.column == 0 => {
                self.line -= 1;
                let line_len = char_len(current_line(buf, self.line));
                self.column = line_len.saturating_sub(self.width);
            }
            CursorState::Reading => {
                self.column = self.column.saturating_sub(self.width);
            }
        }
        self.show(buf);
        Step::Moved
    }

    /// Show the window at `line` and `column`
    ///
    /// # Errors
    /// [`ReaderError::OutOfRange`] if the source is fully ingested and has no such line, or the
    /// line is shorter than `column`. The cursor is left untouched.
    pub fn goto(
        &mut self,
        buf: &LineBuffer,
        line: usize,
        column: usize,
    ) -> Result<Step, ReaderError> {
        let Ok(text) = buf.get(line) else {
            if buf.is_closed() {
                return Err(ReaderError::OutOfRange {
                    requested: line + 1,
                    available: buf.len(),
                });
            }
            return Ok(Step::NeedMore);
        };
        let line_len = char_len(text);
        if column > line_len {
            return Err(ReaderError::OutOfRange {
                requested: column,
                available: line_len,
            });
        }
        self.state = CursorState::Start;
        self.line = line;
        self.column = column;
        Ok(self.next(buf, false))
    }

    /// Put the cursor back on a previously saved position
    ///
    /// Unlike [`Cursor::goto`] a column past the end of the line is clamped. A saved position
    /// of the very first column is the same as not having read anything.
    pub(crate) fn restore(&mut self, buf: &LineBuffer, line: usize, column: usize) -> Step {
        if (line, column) == (0, 0) {
            return Step::Unchanged;
        }
        let Ok(text) = buf.get(line) else {
            return Step::NeedMore;
        };
        let column = column.min(char_len(text));
        self.state = CursorState::Start;
        self.line = line;
        self.column = column;
        self.next(buf, false)
    }

    fn past_frontier(&mut self, buf: &LineBuffer) -> Step {
        if !buf.is_closed() {
            return Step::NeedMore;
        }
        self.state = CursorState::End;
        self.window.clear();
        if let Some(last) = buf.len().checked_sub(1) {
            self.line = last;
            self.column = char_len(current_line(buf, last));
        } else {
            self.line = 0;
            self.column = 0;
        }
        Step::Moved
    }

    fn reset(&mut self) {
        self.state = CursorState::Start;
        self.line = 0;
        self.column = 0;
        self.window.clear();
    }

    fn show(&mut self, buf: &LineBuffer) {
        let text = current_line(buf, self.line);
        self.window.clear();
        self.window
            .extend(text.chars().skip(self.column).take(self.width));
        self.state = CursorState::Reading;
    }
}

fn current_line(buf: &LineBuffer, index: usize) -> &str {
    match buf.get(index) {
        Ok(text) => text,
        Err(e) => unreachable!("Cursor went past the ingested lines: {e}. This is a bug"),
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
