//! The pagination engine: line buffer, cursor and background line producer
pub mod buffer;
pub mod cursor;
pub mod producer;

/// Where the cursor is in relation to the text
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum CursorState {
    /// Nothing has been shown yet, or the reader stepped back past the first window
    #[default]
    Start,
    /// A window of some line is being shown
    Reading,
    /// The reader stepped forward past the last character of a fully ingested source
    End,
}

impl CursorState {
    /// Returns true if a window is being shown
    ///
    /// # Example
    /// ```
    /// use peruse::CursorState;
    ///
    /// assert!(CursorState::Reading.is_reading());
    /// assert!(!CursorState::End.is_reading());
    /// ```
    #[must_use]
    pub fn is_reading(self) -> bool {
        self == Self::Reading
    }
}
