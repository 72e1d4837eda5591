//! Provides [`ReaderOptions`] and [`IngestMode`]
use crate::peruse_core::cursor::DEFAULT_WINDOW_WIDTH;

/// Distance between the buffer frontier and the cursor at which ingestion is resumed
pub const DEFAULT_LOW_WATER_MARK: usize = 2;

/// How a source is ingested while it is being read
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum IngestMode {
    /// Only read ahead as far as the reader is
    ///
    /// The producer pauses after every line and is resumed whenever the cursor comes within
    /// the low water mark of the last ingested line. Memory grows with what has been read
    /// rather than with the size of the source.
    #[default]
    Streaming,
    /// Read the whole source before navigation starts
    ///
    /// Opening a session blocks until the source is exhausted, after which the total number of
    /// lines is known.
    Full,
}

/// Configuration of a [`ReaderSession`](crate::ReaderSession)
///
/// # Example
/// ```
/// use peruse::{IngestMode, ReaderOptions};
///
/// let options = ReaderOptions::default()
///     .window_width(40)
///     .ingest_mode(IngestMode::Full);
/// assert_eq!(options.get_window_width(), 40);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderOptions {
    pub(crate) window_width: usize,
    pub(crate) low_water_mark: usize,
    pub(crate) ingest_mode: IngestMode,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            window_width: DEFAULT_WINDOW_WIDTH,
            low_water_mark: DEFAULT_LOW_WATER_MARK,
            ingest_mode: IngestMode::default(),
        }
    }
}

impl ReaderOptions {
    /// Set the maximum number of characters in a window
    ///
    /// # Panics
    /// This function panics if `width` is zero since the reader could never move forward.
    #[must_use]
    pub fn window_width(mut self, width: usize) -> Self {
        assert!(width > 0, "Window width must be at least one character");
        self.window_width = width;
        self
    }

    /// Set how close the cursor may get to the last ingested line before more is read
    #[must_use]
    pub fn low_water_mark(mut self, lines: usize) -> Self {
        self.low_water_mark = lines;
        self
    }

    /// Set the [`IngestMode`]
    #[must_use]
    pub fn ingest_mode(mut self, mode: IngestMode) -> Self {
        self.ingest_mode = mode;
        self
    }

    #[must_use]
    pub const fn get_window_width(&self) -> usize {
        self.window_width
    }

    #[must_use]
    pub const fn get_low_water_mark(&self) -> usize {
        self.low_water_mark
    }

    #[must_use]
    pub const fn get_ingest_mode(&self) -> IngestMode {
        self.ingest_mode
    }
}
