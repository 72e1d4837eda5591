//! Line producing sources and the [`SourceOpener`] capability
//!
//! The reader never touches files itself. Whatever it pages through is handed to it as a
//! [`LineSource`]: something that yields one terminator-stripped line at a time and reports
//! when there is nothing left. A [`SourceOpener`] turns a [`SourceId`] into such a source
//! when a session starts.
//!
//! Three sources are provided
//! - [`BufReadSource`] wraps any [`BufRead`], for example a file or a pipe
//! - [`FileOpener`] opens files under a directory by their name
//! - [`feed`] creates a [`Feeder`]/[`FeedSource`] pair so that an application can push text
//!   into the reader while it is running

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{
    fmt,
    fs::File,
    io::{self, BufRead, BufReader},
    path::PathBuf,
};

/// Identity of a source
///
/// This is the key under which the last reading position is remembered, usually a file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(SmolStr);

impl SourceId {
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(SmolStr::new(id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SourceId {
    fn from(s: String) -> Self {
        Self(SmolStr::from(s))
    }
}

/// A sequence of lines that can be pulled one at a time
///
/// Lines are returned without their terminator. `Ok(None)` marks the end of the source and
/// the source is not polled again after that.
///
/// Sources are driven on a background thread, hence the `Send + 'static` bound. A call may
/// block for as long as it takes the next line to become available.
pub trait LineSource: Send + 'static {
    /// Pull the next line
    ///
    /// # Errors
    /// Any I/O error while reading. The reader treats this as the end of the source.
    fn read_line(&mut self) -> io::Result<Option<String>>;
}

/// Opens the [`LineSource`] behind a [`SourceId`]
///
/// An opener is used exactly once, when a session starts. Any closure of the shape
/// `FnOnce(&SourceId) -> io::Result<Box<dyn LineSource>>` is an opener.
pub trait SourceOpener {
    /// # Errors
    /// The source cannot be opened. This surfaces as
    /// [`ReaderError::SourceUnavailable`](crate::ReaderError::SourceUnavailable).
    fn open(self, id: &SourceId) -> io::Result<Box<dyn LineSource>>;
}

impl<F> SourceOpener for F
where
    F: FnOnce(&SourceId) -> io::Result<Box<dyn LineSource>>,
{
    fn open(self, id: &SourceId) -> io::Result<Box<dyn LineSource>> {
        self(id)
    }
}

/// A [`LineSource`] over any buffered reader
///
/// Lines are split at `\n` with a trailing `\r` removed. Invalid UTF-8 is replaced rather than
/// rejected so that one bad byte does not end the reading session.
pub struct BufReadSource<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> BufReadSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(256),
        }
    }
}

impl<R: BufRead + Send + 'static> LineSource for BufReadSource<R> {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }
}

/// Opens sources as files inside a directory
///
/// The [`SourceId`] is taken as a file name relative to the root.
#[derive(Debug, Clone)]
pub struct FileOpener {
    root: PathBuf,
}

impl FileOpener {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn open_file(&self, id: &SourceId) -> io::Result<Box<dyn LineSource>> {
        let file = File::open(self.root.join(id.as_str()))?;
        Ok(Box::new(BufReadSource::new(BufReader::new(file))))
    }
}

impl SourceOpener for FileOpener {
    fn open(self, id: &SourceId) -> io::Result<Box<dyn LineSource>> {
        self.open_file(id)
    }
}

impl SourceOpener for &FileOpener {
    fn open(self, id: &SourceId) -> io::Result<Box<dyn LineSource>> {
        self.open_file(id)
    }
}

enum Feed {
    Text(String),
    Finish,
}

/// Create a connected [`Feeder`] and [`FeedSource`]
///
/// # Example
/// ```
/// use peruse::source::{feed, LineSource};
///
/// let (feeder, mut source) = feed();
/// feeder.push_str("first line\nsecond").unwrap();
/// feeder.finish().unwrap();
///
/// assert_eq!(source.read_line().unwrap().as_deref(), Some("first line"));
/// assert_eq!(source.read_line().unwrap().as_deref(), Some("second"));
/// assert_eq!(source.read_line().unwrap(), None);
/// ```
#[must_use]
pub fn feed() -> (Feeder, FeedSource) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (
        Feeder { tx },
        FeedSource {
            rx,
            pending: String::new(),
            finished: false,
        },
    )
}

/// The sending half of a host fed source
///
/// Text can be pushed in any sized pieces; it is split into lines on the reading side.
/// [`Feeder`] also implements [`std::fmt::Write`] so [`write!`]/[`writeln!`] can be used on it.
#[derive(Clone)]
pub struct Feeder {
    tx: Sender<Feed>,
}

/// The receiving half was dropped, usually because the session was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("the reader is no longer receiving text")]
pub struct Disconnected;

impl Feeder {
    /// Append text to the source
    ///
    /// # Errors
    /// The reading side has gone away.
    pub fn push_str(&self, text: impl Into<String>) -> Result<(), Disconnected> {
        self.tx
            .send(Feed::Text(text.into()))
            .map_err(|_| Disconnected)
    }

    /// Append a complete line
    ///
    /// # Errors
    /// The reading side has gone away.
    pub fn push_line(&self, line: impl Into<String>) -> Result<(), Disconnected> {
        let mut line = line.into();
        line.push('\n');
        self.push_str(line)
    }

    /// Mark the end of the source
    ///
    /// Any unterminated text still pending becomes the last line.
    ///
    /// # Errors
    /// The reading side has gone away.
    pub fn finish(&self) -> Result<(), Disconnected> {
        self.tx.send(Feed::Finish).map_err(|_| Disconnected)
    }
}

impl fmt::Write for Feeder {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_str(s).map_err(|_| fmt::Error)
    }
}

/// The receiving half of a host fed source. See [`feed`].
///
/// Dropping every [`Feeder`] without calling [`Feeder::finish`] ends the source as well.
pub struct FeedSource {
    rx: Receiver<Feed>,
    pending: String,
    finished: bool,
}

impl FeedSource {
    fn take_line(&mut self) -> Option<String> {
        let end = self.pending.find('\n')?;
        let mut line: String = self.pending.drain(..=end).collect();
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
        Some(line)
    }
}

impl LineSource for FeedSource {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(line) = self.take_line() {
                return Ok(Some(line));
            }
            if self.finished {
                return Ok(None);
            }
            match self.rx.recv() {
                Ok(Feed::Text(text)) => self.pending.push_str(&text),
                Ok(Feed::Finish) | Err(_) => {
                    self.finished = true;
                    if !self.pending.is_empty() {
                        return Ok(Some(std::mem::take(&mut self.pending)));
                    }
                }
            }
        }
    }
}

impl SourceOpener for FeedSource {
    fn open(self, _id: &SourceId) -> io::Result<Box<dyn LineSource>> {
        Ok(Box::new(self))
    }
}
