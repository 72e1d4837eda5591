//! See [`ReaderError`] and [`StoreError`].
use std::{io, path::PathBuf};
use thiserror::Error;

use crate::source::SourceId;

/// Different errors that could be encountered while reading a source
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReaderError {
    /// The source could not be opened. The session never becomes usable.
    #[error("source {source_id} is unavailable")]
    SourceUnavailable {
        source_id: SourceId,
        #[source]
        reason: io::Error,
    },
    /// A goto-line target does not exist.
    ///
    /// `available` is the number of lines known when the request was rejected. For a line
    /// target this is the final line count of the source, for a column target it is the
    /// length of the requested line.
    #[error("position {requested} is out of range ({available} available)")]
    OutOfRange { requested: usize, available: usize },
    /// The reading position could not be written to durable storage
    #[error(transparent)]
    Persistence(#[from] StoreError),
    /// The session was torn down while waiting for more data
    #[error("the reader session was torn down")]
    Cancelled,
}

/// Failures of the [`PositionStore`](crate::PositionStore) backends
#[derive(Debug, Error)]
#[allow(clippy::module_name_repetitions)]
pub enum StoreError {
    #[error("failed to read saved positions from {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        reason: io::Error,
    },
    #[error("failed to write saved positions to {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        reason: io::Error,
    },
    #[error("saved positions are malformed")]
    Decode(#[source] serde_json::Error),
    #[error("failed to serialize saved positions")]
    Encode(#[source] serde_json::Error),
}

/// Access to a line that has not been ingested yet
///
/// Only the cursor indexes into the buffer and it never goes past the frontier, so seeing
/// this outside of [`LineBuffer`](crate::LineBuffer) means ingestion and navigation got out
/// of step.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("line {index} is past the buffer frontier ({len} lines)")]
pub struct OutOfBuffer {
    pub index: usize,
    pub len: usize,
}
