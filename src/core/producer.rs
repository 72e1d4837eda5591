//! Provides the [`LineProducer`] type
//!
//! The producer pulls lines out of a [`LineSource`] on a background thread and hands each one
//! over a channel to whoever owns the [`LineBuffer`](super::buffer::LineBuffer). It can be
//! paused and resumed at any time. While paused the source is not read any further, so a
//! paused producer holds at most the one line it has already sent.
//!
//! With auto pause enabled the producer pauses itself right after each line. The state is
//! switched to [`ProducerState::Paused`] before the line is sent, so a [`LineProducer::resume`]
//! issued by the receiver after it got the line is never lost.
use crossbeam_channel::{Receiver, Sender};
use log::{debug, warn};
use parking_lot::{Condvar, Mutex};
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use crate::{
    error::ReaderError,
    source::{LineSource, SourceId, SourceOpener},
};

/// States of a [`LineProducer`]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProducerState {
    /// Not started yet
    Idle,
    /// Reading the source and emitting lines
    Active,
    /// Emission suspended until resumed
    Paused,
    /// No more lines will be emitted
    Closed,
}

/// What the producer delivers to the receiving side
#[derive(PartialEq, Eq)]
pub enum Ingest {
    Line(String),
    Closed,
}

impl fmt::Debug for Ingest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Line(text) => write!(f, "Line({text:?})"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

struct Control {
    state: Mutex<ProducerState>,
    cvar: Condvar,
    shutdown: AtomicBool,
}

impl Control {
    fn set(&self, to: ProducerState) {
        let mut state = self.state.lock();
        if *state != ProducerState::Closed {
            *state = to;
        }
    }

    /// Block while paused. Returns false once the producer should stop.
    fn wait_active(&self) -> bool {
        let mut state = self.state.lock();
        while *state == ProducerState::Paused && !self.shutdown.load(Ordering::SeqCst) {
            self.cvar.wait(&mut state);
        }
        !self.shutdown.load(Ordering::SeqCst) && *state == ProducerState::Active
    }
}

/// Pausable background ingestion of a [`LineSource`]
pub struct LineProducer {
    source_id: SourceId,
    control: Arc<Control>,
    // Moved into the ingestion thread on start, so the channel disconnects when it exits
    tx: Option<Sender<Ingest>>,
    rx: Receiver<Ingest>,
    auto_pause: bool,
}

impl LineProducer {
    /// Create an idle producer for `source_id`
    ///
    /// If `auto_pause` is set, the producer pauses after every line it emits.
    #[must_use]
    pub fn new(source_id: SourceId, auto_pause: bool) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            source_id,
            control: Arc::new(Control {
                state: Mutex::new(ProducerState::Idle),
                cvar: Condvar::new(),
                shutdown: AtomicBool::new(false),
            }),
            tx: Some(tx),
            rx,
            auto_pause,
        }
    }

    /// The receiving end of the emitted lines
    #[must_use]
    pub fn receiver(&self) -> &Receiver<Ingest> {
        &self.rx
    }

    #[must_use]
    pub fn state(&self) -> ProducerState {
        *self.control.state.lock()
    }

    /// Open the source and start emitting lines
    ///
    /// Calling this on a producer that has already been started does nothing.
    ///
    /// # Errors
    /// [`ReaderError::SourceUnavailable`] if the source cannot be opened or the ingestion thread
    /// cannot be spawned. The producer stays idle.
    pub fn start(&mut self, opener: impl SourceOpener) -> Result<(), ReaderError> {
        if self.state() != ProducerState::Idle || self.tx.is_none() {
            return Ok(());
        }
        let unavailable = |reason| ReaderError::SourceUnavailable {
            source_id: self.source_id.clone(),
            reason,
        };
        let source = opener.open(&self.source_id).map_err(unavailable)?;

        let control = self.control.clone();
        let Some(tx) = self.tx.take() else {
            return Ok(());
        };
        let auto_pause = self.auto_pause;
        let source_id = self.source_id.clone();
        *self.control.state.lock() = ProducerState::Active;

        let spawned = thread::Builder::new()
            .name(format!("peruse-producer:{}", self.source_id))
            .spawn(move || produce(&source_id, source, &control, &tx, auto_pause));
        if let Err(e) = spawned {
            // The sender went down with the closure, so this producer cannot be started again
            *self.control.state.lock() = ProducerState::Idle;
            return Err(unavailable(e));
        }
        debug!("producer: started {}", self.source_id);
        Ok(())
    }

    /// Suspend emission. No-op unless active.
    pub fn pause(&self) {
        let mut state = self.control.state.lock();
        if *state == ProducerState::Active {
            *state = ProducerState::Paused;
            debug!("producer: paused {}", self.source_id);
        }
    }

    /// Continue emission from where it stopped. No-op unless paused.
    pub fn resume(&self) {
        let mut state = self.control.state.lock();
        if *state == ProducerState::Paused {
            *state = ProducerState::Active;
            drop(state);
            debug!("producer: resumed {}", self.source_id);
            self.control.cvar.notify_one();
        }
    }

    /// Stop emitting for good
    ///
    /// The ingestion thread notices at its next line or when it wakes up from a pause. A thread
    /// blocked inside the source keeps running until the source returns.
    pub fn shutdown(&self) {
        self.control.shutdown.store(true, Ordering::SeqCst);
        let mut state = self.control.state.lock();
        if *state != ProducerState::Closed {
            *state = ProducerState::Closed;
            debug!("producer: shut down {}", self.source_id);
        }
        drop(state);
        self.control.cvar.notify_all();
    }
}

impl Drop for LineProducer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn produce(
    source_id: &SourceId,
    mut source: Box<dyn LineSource>,
    control: &Control,
    tx: &Sender<Ingest>,
    auto_pause: bool,
) {
    let mut emitted = 0_usize;
    while control.wait_active() {
        match source.read_line() {
            Ok(Some(line)) => {
                if control.shutdown.load(Ordering::SeqCst) {
                    return;
                }
                if auto_pause {
                    control.set(ProducerState::Paused);
                }
                if tx.send(Ingest::Line(line)).is_err() {
                    return;
                }
                emitted += 1;
            }
            Ok(None) => break,
            Err(e) => {
                warn!("producer: reading {source_id} failed, treating as end of source: {e}");
                break;
            }
        }
    }
    if control.shutdown.load(Ordering::SeqCst) {
        return;
    }
    control.set(ProducerState::Closed);
    debug!("producer: {source_id} exhausted after {emitted} lines, closed");
    // The receiver may be gone already, nothing to report to in that case
    let _ = tx.send(Ingest::Closed);
}
