#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]

//! peruse is a windowed reader for text that is too large, or too slow to obtain, to be loaded
//! before reading begins.
//!
//! It shows a source one small window at a time, the kind of thing that fits in a status line,
//! and lets the user step forward and back by windows or whole lines, or jump to a line. The
//! source keeps being ingested in the background while this happens, and where each source
//! was left off is remembered across restarts.
//!
//! # Overview
//! - A [`LineSource`] yields the lines of a source. [`source`] has ones for readers, files and
//!   text pushed in by the application.
//! - A [`ReaderSession`] ingests one source through a background [`LineProducer`] into a
//!   [`LineBuffer`] and moves a [`Cursor`] over it.
//! - A [`PositionStore`] remembers the last position for every source and is shared by all
//!   sessions of a process.
//!
//! The session never displays anything. Every operation returns a [`Status`] and it is up to
//! the application to show [`Status::display`] wherever it likes.
//!
//! # Ingestion
//! By default only what is needed is read: the producer pauses after each line and is resumed
//! when the reader gets within [`ReaderOptions::low_water_mark`] lines of the last ingested
//! one. Jumping to a line that has not been read yet waits until it has been. With
//! [`IngestMode::Full`] the whole source is read before the session opens instead.
//!
//! # Example
//! ```
//! use peruse::source::feed;
//! use peruse::store::{MemoryBackend, PositionStore};
//! use peruse::{CursorState, ReaderOptions, ReaderSession};
//!
//! let store = PositionStore::load(MemoryBackend::default()).unwrap();
//! let (feeder, source) = feed();
//! feeder.push_str("hello world this is a test\nsecond line\n").unwrap();
//! feeder.finish().unwrap();
//!
//! let mut session =
//!     ReaderSession::open("book.txt", source, store.clone(), ReaderOptions::default()).unwrap();
//!
//! assert_eq!(session.next(false).unwrap().window, "hello world this is ");
//! assert_eq!(session.next(false).unwrap().window, "a test");
//! assert_eq!(session.next(false).unwrap().window, "second line");
//! assert_eq!(session.next(false).unwrap().state, CursorState::End);
//! session.close().unwrap();
//!
//! let saved = store.lookup(&"book.txt".into()).unwrap();
//! assert_eq!((saved.line_index, saved.column_offset), (1, 0));
//! ```

#[path = "core/mod.rs"]
pub mod peruse_core;

pub mod error;
pub mod options;
pub mod session;
pub mod source;
pub mod store;

pub use error::{ReaderError, StoreError};
pub use options::{IngestMode, ReaderOptions};
pub use peruse_core::{
    buffer::LineBuffer,
    cursor::{Cursor, Step},
    producer::{LineProducer, ProducerState},
    CursorState,
};
pub use session::{ReaderSession, Status, Teardown};
pub use source::{LineSource, SourceId, SourceOpener};
pub use store::{PositionStore, SaveRecord};

#[cfg(test)]
mod tests;
