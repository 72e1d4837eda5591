//! Provides [`ReaderSession`], one reader paging through one source
use crossbeam_channel::{Receiver, Sender};
use log::{debug, info, warn};

use crate::{
    error::{ReaderError, StoreError},
    options::{IngestMode, ReaderOptions},
    peruse_core::{
        buffer::LineBuffer,
        cursor::{Cursor, Step},
        producer::{Ingest, LineProducer, ProducerState},
        CursorState,
    },
    source::{SourceId, SourceOpener},
    store::PositionStore,
};

/// Shown by [`Status::display`] before the first window
pub const START_MARKER: &str = "### start ###";
/// Shown by [`Status::display`] after the last window
pub const END_MARKER: &str = "### end ###";

/// Snapshot of a session after an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// The text of the current window. Empty at the boundaries.
    pub window: String,
    pub line_index: usize,
    pub column_offset: usize,
    /// Number of lines ingested so far
    pub lines_loaded: usize,
    /// Total number of lines, known once the source is exhausted
    pub total_lines: Option<usize>,
    pub state: CursorState,
}

impl Status {
    /// The text a single line display should show
    ///
    /// This is the window while reading and a marker at either boundary.
    #[must_use]
    pub fn display(&self) -> &str {
        match self.state {
            CursorState::Start => START_MARKER,
            CursorState::Reading => &self.window,
            CursorState::End => END_MARKER,
        }
    }
}

/// Tears a [`ReaderSession`] down from another thread
///
/// Firing it makes any wait for more lines give up with [`ReaderError::Cancelled`] and stops the
/// producer. All later navigation on the session fails the same way.
///
/// A session makes its own unless one is handed to [`ReaderSession::open_with_teardown`], which
/// also lets the wait inside opening be abandoned. A handle belongs to a single session.
#[derive(Debug, Clone)]
pub struct Teardown {
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl Default for Teardown {
    fn default() -> Self {
        Self::new()
    }
}

impl Teardown {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        Self { tx, rx }
    }

    pub fn fire(&self) {
        // A full channel means it has been fired already
        let _ = self.tx.try_send(());
    }
}

enum Woken {
    Ingest(Option<Ingest>),
    Teardown,
}

/// A reader paging through a single source
///
/// The session owns the ingested lines and the cursor over them. Lines arrive from a background
/// [`LineProducer`]; every operation first takes in whatever has arrived since the last one.
/// Operations that need a line which has not arrived yet wait for it.
///
/// Whenever the position changes while reading it is written to the [`PositionStore`], and it
/// is restored from there the next time the same source is opened.
pub struct ReaderSession {
    source_id: SourceId,
    buffer: LineBuffer,
    cursor: Cursor,
    producer: LineProducer,
    store: PositionStore,
    options: ReaderOptions,
    teardown: Teardown,
    cancelled: bool,
    // The last position write failed and has not been retried successfully
    unsaved: bool,
    persist_error: Option<StoreError>,
}

impl ReaderSession {
    /// Start reading `source_id`
    ///
    /// The source is opened with `opener` and ingestion starts in the background. This returns
    /// once the source is ready: after its first line (or its end) in
    /// [`IngestMode::Streaming`], after its end in [`IngestMode::Full`].
    ///
    /// If `store` has a position for this source, the session is put back on it, waiting for
    /// its line to be ingested if need be. Otherwise the session starts before the first window
    /// and a record is created for the source.
    ///
    /// Nothing can interrupt the waiting done here. Use
    /// [`open_with_teardown`](Self::open_with_teardown) for sources that may stall.
    ///
    /// # Errors
    /// [`ReaderError::SourceUnavailable`] if the source cannot be opened.
    pub fn open(
        source_id: impl Into<SourceId>,
        opener: impl SourceOpener,
        store: PositionStore,
        options: ReaderOptions,
    ) -> Result<Self, ReaderError> {
        Self::open_with_teardown(source_id, opener, store, options, Teardown::new())
    }

    /// Like [`open`](Self::open), with a [`Teardown`] made beforehand
    ///
    /// Firing `teardown` while the session is still waiting for its source to become ready, or
    /// for a restored line to arrive, abandons opening.
    ///
    /// # Errors
    /// - [`ReaderError::SourceUnavailable`] if the source cannot be opened.
    /// - [`ReaderError::Cancelled`] if `teardown` fired before the session was ready.
    pub fn open_with_teardown(
        source_id: impl Into<SourceId>,
        opener: impl SourceOpener,
        store: PositionStore,
        options: ReaderOptions,
        teardown: Teardown,
    ) -> Result<Self, ReaderError> {
        let source_id = source_id.into();
        let auto_pause = options.ingest_mode == IngestMode::Streaming;
        let mut producer = LineProducer::new(source_id.clone(), auto_pause);
        producer.start(opener)?;

        let mut session = Self {
            source_id,
            buffer: LineBuffer::new(),
            cursor: Cursor::new(options.window_width),
            producer,
            store,
            options,
            teardown,
            cancelled: false,
            unsaved: false,
            persist_error: None,
        };
        session.ensure_live()?;
        match session.options.ingest_mode {
            IngestMode::Streaming => {
                session.wait_for_line(0)?;
            }
            IngestMode::Full => session.wait_for_close()?,
        }
        info!(
            "session: opened {} ({} lines ready)",
            session.source_id,
            session.buffer.len()
        );
        session.restore()?;
        Ok(session)
    }

    /// Move forward by one window, or to the next line if `by_line` is set
    ///
    /// At the end of what has been ingested so far this waits for the next line. Past the last
    /// line of an exhausted source the session enters [`CursorState::End`], where this is a
    /// no-op.
    ///
    /// # Errors
    /// [`ReaderError::Cancelled`] if the session was torn down.
    pub fn next(&mut self, by_line: bool) -> Result<Status, ReaderError> {
        self.ensure_live()?;
        let before = self.mark();
        loop {
            self.resume_if_low();
            match self.cursor.next(&self.buffer, by_line) {
                Step::NeedMore => {
                    self.producer.resume();
                    self.await_ingest()?;
                    self.pump();
                }
                Step::Moved | Step::Unchanged => break,
            }
        }
        self.after_move(before);
        Ok(self.current_status())
    }

    /// Move back by one window, or to the start of a line if `by_line` is set
    ///
    /// # Errors
    /// [`ReaderError::Cancelled`] if the session was torn down.
    pub fn prev(&mut self, by_line: bool) -> Result<Status, ReaderError> {
        self.ensure_live()?;
        let before = self.mark();
        self.cursor.prev(&self.buffer, by_line);
        self.after_move(before);
        Ok(self.current_status())
    }

    /// Jump to line `n`, counted from 1, optionally at a column
    ///
    /// If line `n` has not been ingested yet this waits until it is, or until the source turns
    /// out to be shorter.
    ///
    /// # Errors
    /// - [`ReaderError::OutOfRange`] if `n` is zero, the source has fewer than `n` lines, or the
    ///   line is shorter than `column`. The position is unchanged.
    /// - [`ReaderError::Cancelled`] if the session was torn down.
    pub fn goto_line(&mut self, n: usize, column: Option<usize>) -> Result<Status, ReaderError> {
        self.ensure_live()?;
        let Some(line) = n.checked_sub(1) else {
            return Err(ReaderError::OutOfRange {
                requested: n,
                available: self.buffer.len(),
            });
        };
        let before = self.mark();
        while self
            .cursor
            .goto(&self.buffer, line, column.unwrap_or(0))?
            == Step::NeedMore
        {
            self.producer.resume();
            self.await_ingest()?;
            self.pump();
        }
        self.after_move(before);
        Ok(self.current_status())
    }

    /// The current status, without taking in new lines or moving
    #[must_use]
    pub fn current_status(&self) -> Status {
        Status {
            window: self.cursor.window().to_owned(),
            line_index: self.cursor.line(),
            column_offset: self.cursor.column(),
            lines_loaded: self.buffer.len(),
            total_lines: self.buffer.total(),
            state: self.cursor.state(),
        }
    }

    /// End the session
    ///
    /// Stops ingestion and makes sure the stored position is the one being read, retrying a
    /// write that failed earlier.
    ///
    /// # Errors
    /// [`ReaderError::Persistence`] if the position still cannot be written.
    pub fn close(mut self) -> Result<(), ReaderError> {
        self.producer.shutdown();
        if self.cursor.state().is_reading() {
            let (line, column) = self.cursor.position();
            let stored = self
                .store
                .lookup(&self.source_id)
                .map(|r| (r.line_index, r.column_offset));
            if self.unsaved || stored != Some((line, column)) {
                self.store.record_position(&self.source_id, line, column)?;
            }
        } else if self.unsaved {
            self.store.flush()?;
        }
        info!("session: closed {}", self.source_id);
        Ok(())
    }

    /// A handle that tears this session down from elsewhere
    #[must_use]
    pub fn teardown_handle(&self) -> Teardown {
        self.teardown.clone()
    }

    /// Take the last position write failure, if any happened since the last call
    ///
    /// Failing to save the position never interrupts navigation. This is where the host finds
    /// out about it.
    pub fn take_persistence_error(&mut self) -> Option<StoreError> {
        self.persist_error.take()
    }

    #[must_use]
    pub fn source_id(&self) -> &SourceId {
        &self.source_id
    }

    #[must_use]
    pub fn buffer(&self) -> &LineBuffer {
        &self.buffer
    }

    #[must_use]
    pub fn producer_state(&self) -> ProducerState {
        self.producer.state()
    }

    #[must_use]
    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    fn restore(&mut self) -> Result<(), ReaderError> {
        let Some(record) = self.store.lookup(&self.source_id) else {
            self.persist(0, 0);
            return Ok(());
        };
        if !self.wait_for_line(record.line_index)? {
            warn!(
                "session: saved line {} is past the end of {} ({} lines), starting over",
                record.line_index + 1,
                self.source_id,
                self.buffer.len()
            );
            return Ok(());
        }
        if self
            .cursor
            .restore(&self.buffer, record.line_index, record.column_offset)
            == Step::Moved
        {
            info!(
                "session: restored {} at {}:{}",
                self.source_id,
                self.cursor.line() + 1,
                self.cursor.column()
            );
            let (line, column) = self.cursor.position();
            if column != record.column_offset {
                self.persist(line, column);
            }
        }
        Ok(())
    }

    fn ensure_live(&mut self) -> Result<(), ReaderError> {
        if !self.cancelled && self.teardown.rx.try_recv().is_ok() {
            self.cancel();
        }
        if self.cancelled {
            return Err(ReaderError::Cancelled);
        }
        self.pump();
        Ok(())
    }

    fn cancel(&mut self) {
        self.cancelled = true;
        self.producer.shutdown();
        info!("session: torn down {}", self.source_id);
    }

    /// Take in everything the producer has delivered so far
    fn pump(&mut self) {
        while let Ok(ev) = self.producer.receiver().try_recv() {
            self.ingest(ev);
        }
    }

    fn ingest(&mut self, ev: Ingest) {
        match ev {
            Ingest::Line(line) => self.buffer.append(line),
            Ingest::Closed => {
                self.buffer.close();
                debug!(
                    "session: {} fully ingested, {} lines",
                    self.source_id,
                    self.buffer.len()
                );
            }
        }
    }

    /// Block until the producer delivers something or the session is torn down
    fn await_ingest(&mut self) -> Result<(), ReaderError> {
        let lines = self.producer.receiver().clone();
        let teardown = self.teardown.rx.clone();
        let woken = crossbeam_channel::select! {
            recv(lines) -> ev => Woken::Ingest(ev.ok()),
            recv(teardown) -> _ => Woken::Teardown,
        };
        match woken {
            Woken::Ingest(Some(ev)) => self.ingest(ev),
            // The producer went away without reporting the end of the source
            Woken::Ingest(None) => self.buffer.close(),
            Woken::Teardown => {
                self.cancel();
                return Err(ReaderError::Cancelled);
            }
        }
        Ok(())
    }

    /// Wait until line `index` is ingested. Returns false if the source ends before it.
    fn wait_for_line(&mut self, index: usize) -> Result<bool, ReaderError> {
        loop {
            self.pump();
            if index < self.buffer.len() {
                return Ok(true);
            }
            if self.buffer.is_closed() {
                return Ok(false);
            }
            self.producer.resume();
            self.await_ingest()?;
        }
    }

    fn wait_for_close(&mut self) -> Result<(), ReaderError> {
        loop {
            self.pump();
            if self.buffer.is_closed() {
                return Ok(());
            }
            self.producer.resume();
            self.await_ingest()?;
        }
    }

    /// Resume ingestion if the cursor is within the low water mark of the buffer frontier
    fn resume_if_low(&self) {
        if !self.buffer.is_closed()
            && self.buffer.len().saturating_sub(self.cursor.line()) <= self.options.low_water_mark
        {
            self.producer.resume();
        }
    }

    fn mark(&self) -> (CursorState, (usize, usize)) {
        (self.cursor.state(), self.cursor.position())
    }

    /// Save the position if a move landed on a different window than `before`
    fn after_move(&mut self, before: (CursorState, (usize, usize))) {
        if self.cursor.state().is_reading() && self.mark() != before {
            let (line, column) = self.cursor.position();
            self.persist(line, column);
        }
    }

    fn persist(&mut self, line: usize, column: usize) {
        match self.store.record_position(&self.source_id, line, column) {
            Ok(()) => self.unsaved = false,
            Err(e) => {
                self.unsaved = true;
                self.persist_error = Some(e);
            }
        }
    }
}

impl std::fmt::Debug for ReaderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderSession")
            .field("source_id", &self.source_id)
            .field("cursor", &self.cursor)
            .field("lines_loaded", &self.buffer.len())
            .field("producer", &self.producer.state())
            .finish_non_exhaustive()
    }
}
