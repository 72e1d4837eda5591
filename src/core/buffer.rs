//! Provides the [`LineBuffer`] type
use crate::error::OutOfBuffer;

/// All lines ingested from a source so far
///
/// The buffer only ever grows. Once a line has been given an index it keeps it, which is what
/// lets the cursor hold plain indices into it while ingestion continues behind its back.
///
/// Nothing is evicted. Sources are expected to fit in memory.
#[derive(Debug, Default)]
pub struct LineBuffer {
    lines: Vec<String>,
    closed: bool,
}

impl LineBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn append(&mut self, line: String) {
        debug_assert!(!self.closed, "line appended after the source was closed");
        self.lines.push(line);
    }

    pub(crate) fn close(&mut self) {
        self.closed = true;
    }

    /// Get the line at `index`
    ///
    /// # Errors
    /// `index` has not been ingested yet.
    pub fn get(&self, index: usize) -> Result<&str, OutOfBuffer> {
        self.lines
            .get(index)
            .map(String::as_str)
            .ok_or(OutOfBuffer {
                index,
                len: self.len(),
            })
    }

    /// Number of lines ingested so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Whether the source has signalled that no more lines will come
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// The final number of lines, once the source is closed
    #[must_use]
    pub fn total(&self) -> Option<usize> {
        self.closed.then_some(self.lines.len())
    }
}
