//! Provides [`PositionStore`] for remembering where each source was left off
//!
//! Every source that has been opened gets one [`SaveRecord`] holding the line and column the
//! reader was last at. The records live in memory and are written out in full through a
//! [`PositionBackend`] after every change, so the durable copy never drifts from what the
//! reader sees.
//!
//! A [`PositionStore`] is meant to be loaded once per process and then shared. Cloning it is
//! cheap and every clone refers to the same records:
//! ```
//! use peruse::store::{MemoryBackend, PositionStore};
//!
//! let store = PositionStore::load(MemoryBackend::default()).unwrap();
//! let for_other_session = store.clone();
//!
//! store.record_position(&"book.txt".into(), 5, 3).unwrap();
//! let record = for_other_session.lookup(&"book.txt".into()).unwrap();
//! assert_eq!((record.line_index, record.column_offset), (5, 3));
//! ```
//!
//! If writing fails, the in-memory record is still updated and the error is returned. Reading
//! carries on, only durability is lost until the backend can be written again.

use log::{debug, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{error::StoreError, source::SourceId};

/// Last known reading position of a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveRecord {
    pub source_id: SourceId,
    pub line_index: usize,
    pub column_offset: usize,
}

/// Durable storage for the full set of [`SaveRecord`]s
pub trait PositionBackend: Send {
    /// Read every record. A backend that has never been written returns an empty list.
    ///
    /// # Errors
    /// The storage cannot be read or its contents cannot be decoded.
    fn load(&mut self) -> Result<Vec<SaveRecord>, StoreError>;

    /// Replace the stored records with `records`
    ///
    /// # Errors
    /// The storage cannot be written.
    fn save(&mut self, records: &[SaveRecord]) -> Result<(), StoreError>;
}

/// Keeps records as a JSON document in a file
///
/// Writes go to a temporary file next to the target which is then renamed over it, so a crash
/// mid-write leaves the previous document intact.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_err(&self, reason: io::Error) -> StoreError {
        StoreError::Write {
            path: self.path.clone(),
            reason,
        }
    }
}

impl PositionBackend for JsonFileBackend {
    fn load(&mut self) -> Result<Vec<SaveRecord>, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(reason) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    reason,
                })
            }
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&text).map_err(StoreError::Decode)
    }

    fn save(&mut self, records: &[SaveRecord]) -> Result<(), StoreError> {
        let payload = serde_json::to_string_pretty(records).map_err(StoreError::Encode)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let mut file = fs::File::create(&tmp).map_err(|e| self.write_err(e))?;
        file.write_all(payload.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| self.write_err(e))?;
        drop(file);
        fs::rename(&tmp, &self.path).map_err(|e| self.write_err(e))
    }
}

/// Keeps records only for the lifetime of the backend
///
/// Cloning shares the storage, so a clone handed to a second [`PositionStore::load`] sees what
/// the first store wrote, much like a file read back after a restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend(Arc<Mutex<Vec<SaveRecord>>>);

impl PositionBackend for MemoryBackend {
    fn load(&mut self) -> Result<Vec<SaveRecord>, StoreError> {
        Ok(self.0.lock().clone())
    }

    fn save(&mut self, records: &[SaveRecord]) -> Result<(), StoreError> {
        let mut stored = self.0.lock();
        stored.clear();
        stored.extend_from_slice(records);
        Ok(())
    }
}

struct Inner {
    // Most recently touched first
    records: Vec<SaveRecord>,
    backend: Box<dyn PositionBackend>,
}

impl Inner {
    fn flush(&mut self) -> Result<(), StoreError> {
        self.backend.save(&self.records)
    }
}

/// Process wide, shareable set of reading positions
#[derive(Clone)]
pub struct PositionStore(Arc<Mutex<Inner>>);

impl PositionStore {
    /// Read all records from `backend`
    ///
    /// Records repeated for the same source keep only their first occurrence.
    ///
    /// # Errors
    /// The backend fails to load.
    pub fn load(mut backend: impl PositionBackend + 'static) -> Result<Self, StoreError> {
        let mut records: Vec<SaveRecord> = Vec::new();
        for record in backend.load()? {
            if records.iter().any(|r| r.source_id == record.source_id) {
                warn!("store: duplicate record for {} ignored", record.source_id);
                continue;
            }
            records.push(record);
        }
        debug!("store: loaded {} positions", records.len());
        Ok(Self(Arc::new(Mutex::new(Inner {
            records,
            backend: Box::new(backend),
        }))))
    }

    /// Get the saved position of `source_id`
    #[must_use]
    pub fn lookup(&self, source_id: &SourceId) -> Option<SaveRecord> {
        self.0
            .lock()
            .records
            .iter()
            .find(|r| &r.source_id == source_id)
            .cloned()
    }

    /// Save the position of `source_id`, creating its record if there is none
    ///
    /// The touched record moves to the front of [`PositionStore::records`]. The whole set is
    /// then written to the backend.
    ///
    /// # Errors
    /// [`StoreError`] if the backend could not be written. The in-memory record is updated
    /// regardless.
    pub fn record_position(
        &self,
        source_id: &SourceId,
        line_index: usize,
        column_offset: usize,
    ) -> Result<(), StoreError> {
        let mut inner = self.0.lock();
        let record = match inner.records.iter().position(|r| &r.source_id == source_id) {
            Some(i) => {
                let mut record = inner.records.remove(i);
                record.line_index = line_index;
                record.column_offset = column_offset;
                record
            }
            None => SaveRecord {
                source_id: source_id.clone(),
                line_index,
                column_offset,
            },
        };
        inner.records.insert(0, record);
        inner.flush().map_err(|e| {
            warn!("store: failed to persist position of {source_id}: {e}");
            e
        })
    }

    /// Write the current records to the backend again
    ///
    /// # Errors
    /// [`StoreError`] if the backend could not be written.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.0.lock().flush()
    }

    /// Snapshot of all records, most recently touched first
    #[must_use]
    pub fn records(&self) -> Vec<SaveRecord> {
        self.0.lock().records.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.lock().records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.lock().records.is_empty()
    }
}

impl std::fmt::Debug for PositionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionStore")
            .field("records", &self.0.lock().records)
            .finish_non_exhaustive()
    }
}
