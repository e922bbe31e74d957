//! # Engine
//!
//! The façade that ties the EddyKV layers together. Every external
//! `put`/`get`/`remove` maps onto the same two-step write path:
//!
//! ```text
//! caller ──► Engine ──► Event codec ──► WAL (records → blocks → file)
//!                                        │
//!                                        └──► Memtable ──► SkipList
//! ```
//!
//! The WAL append always happens **before** the memtable mutation
//! (durability before visibility): once `put` returns, the event is in the
//! log even if the memtable rejected the key, and replay will re-apply it.
//!
//! Scheduling is single-threaded and blocking; the mutating operations take
//! `&mut self`, which is the whole concurrency story. Wrapping the engine in
//! a coarse lock is sound if a caller needs to share it.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use memtable::{Error as MemtableError, Memtable};
use wal::{Wal, WalError};

mod event;

pub use event::Event;

/// Name of the log file inside the engine's root directory.
pub const WAL_FILE_NAME: &str = "wal.log";

/// Errors surfaced by engine operations.
///
/// `NotFound` and `AlreadyExists` are expected key-level outcomes; the rest
/// are fatal to the current operation but not to the process.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("key not found")]
    NotFound,
    #[error("key already exists")]
    AlreadyExists,
    #[error("invalid event payload")]
    InvalidEvent,
    #[error("wal error: {0}")]
    Wal(#[from] WalError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<MemtableError> for EngineError {
    fn from(err: MemtableError) -> Self {
        match err {
            MemtableError::NotFound => EngineError::NotFound,
            MemtableError::AlreadyExists => EngineError::AlreadyExists,
        }
    }
}

/// Engine construction options.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Directory holding the log (created if missing; reopened if present).
    pub root_dir: PathBuf,
    /// Memtable entry bound before freeze-and-flush.
    pub memtable_flush_limit: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            root_dir: PathBuf::from("./eddykv_data"),
            memtable_flush_limit: 1024,
        }
    }
}

/// The storage engine: a bounded memtable in front of a block-structured
/// write-ahead log, rooted in one directory.
pub struct Engine {
    // Declaration order is teardown order: memtable first, then the log.
    memtable: Memtable,
    wal: Wal,
    root_dir: PathBuf,
}

impl Engine {
    /// Opens an engine rooted at `options.root_dir`.
    ///
    /// The directory is created if it does not exist; opening an existing
    /// directory is idempotent. Both absolute and relative paths work. The
    /// log lives at `<root_dir>/wal.log` with the default block size.
    pub fn open(options: EngineOptions) -> Result<Self, EngineError> {
        fs::create_dir_all(&options.root_dir)?;
        let wal = Wal::create(options.root_dir.join(WAL_FILE_NAME))?;
        let memtable = Memtable::new(options.memtable_flush_limit);
        tracing::info!(
            root_dir = %options.root_dir.display(),
            flush_limit = options.memtable_flush_limit,
            "engine opened"
        );
        Ok(Engine {
            memtable,
            wal,
            root_dir: options.root_dir,
        })
    }

    /// Writes a key-value pair: WAL append, then memtable insert.
    ///
    /// # Errors
    ///
    /// [`EngineError::AlreadyExists`] if the key is live in the memtable;
    /// the event is in the log regardless, which replay tolerates.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), EngineError> {
        let event = Event::Write { key, value };
        self.wal.append(&event.encode())?;
        self.memtable.insert(key, value)?;
        tracing::debug!(key_len = key.len(), value_len = value.len(), "put");
        Ok(())
    }

    /// Looks up a key in the memtable.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if the key is absent.
    pub fn get(&self, key: &[u8]) -> Result<&[u8], EngineError> {
        self.memtable.get(key).ok_or(EngineError::NotFound)
    }

    /// Deletes a key: WAL append, then memtable remove.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if the key is absent; the delete event is
    /// in the log regardless.
    pub fn remove(&mut self, key: &[u8]) -> Result<(), EngineError> {
        let event = Event::Delete { key };
        self.wal.append(&event.encode())?;
        self.memtable.remove(key)?;
        tracing::debug!(key_len = key.len(), "delete");
        Ok(())
    }

    /// Forces buffered log bytes to stable storage.
    pub fn flush(&mut self) -> Result<(), EngineError> {
        self.wal.flush()?;
        Ok(())
    }

    /// Flushes the log and shuts the engine down.
    pub fn close(mut self) -> Result<(), EngineError> {
        self.wal.flush()?;
        tracing::info!(root_dir = %self.root_dir.display(), "engine closed");
        Ok(())
    }

    /// The engine's root directory.
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_at(root: PathBuf) -> Engine {
        Engine::open(EngineOptions {
            root_dir: root,
            memtable_flush_limit: 1024,
        })
        .unwrap()
    }

    /// Decodes every event currently in the engine's log file.
    fn events_in_log(root: &Path) -> Vec<(Vec<u8>, Option<Vec<u8>>)> {
        let bytes = std::fs::read(root.join(WAL_FILE_NAME)).unwrap();
        let mut events = Vec::new();
        for block in bytes.chunks(wal::DEFAULT_BLOCK_SIZE) {
            for record in Wal::read_block(block) {
                record.verify_checksum().unwrap();
                match Event::decode(record.data).unwrap() {
                    Event::Write { key, value } => {
                        events.push((key.to_vec(), Some(value.to_vec())))
                    }
                    Event::Delete { key } => events.push((key.to_vec(), None)),
                }
            }
        }
        events
    }

    // -------------------- Lifecycle --------------------

    #[test]
    fn open_creates_a_missing_root_dir() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("nested").join("db");
        assert!(!root.exists());

        let engine = open_at(root.clone());
        assert!(root.is_dir());
        assert!(root.join(WAL_FILE_NAME).is_file());
        assert_eq!(engine.root_dir(), root);
    }

    #[test]
    fn reopen_is_idempotent_and_keeps_the_log() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("db");

        let mut engine = open_at(root.clone());
        engine.put(b"k", b"v").unwrap();
        engine.close().unwrap();

        // Re-init on the existing directory: same layout, log intact, and
        // the first decoded event is the original write.
        let _engine = open_at(root.clone());
        assert_eq!(
            events_in_log(&root),
            vec![(b"k".to_vec(), Some(b"v".to_vec()))]
        );
    }

    // -------------------- Read / write path --------------------

    #[test]
    fn put_then_get_roundtrip() {
        let dir = tempdir().unwrap();
        let mut engine = open_at(dir.path().join("db"));

        engine.put(b"alpha", b"1").unwrap();
        engine.put(b"beta", b"2").unwrap();
        assert_eq!(engine.get(b"alpha").unwrap(), b"1");
        assert_eq!(engine.get(b"beta").unwrap(), b"2");
        assert!(matches!(
            engine.get(b"gamma"),
            Err(EngineError::NotFound)
        ));
    }

    #[test]
    fn remove_deletes_and_logs() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("db");
        let mut engine = open_at(root.clone());

        engine.put(b"k", b"v").unwrap();
        engine.remove(b"k").unwrap();
        assert!(matches!(engine.get(b"k"), Err(EngineError::NotFound)));

        assert_eq!(
            events_in_log(&root),
            vec![
                (b"k".to_vec(), Some(b"v".to_vec())),
                (b"k".to_vec(), None),
            ]
        );
    }

    #[test]
    fn remove_missing_key_still_logs_the_event() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("db");
        let mut engine = open_at(root.clone());

        // Log append precedes the memtable failure, so the event lands.
        assert!(matches!(
            engine.remove(b"ghost"),
            Err(EngineError::NotFound)
        ));
        assert_eq!(events_in_log(&root), vec![(b"ghost".to_vec(), None)]);
    }

    #[test]
    fn wal_append_precedes_memtable_visibility() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("db");
        let mut engine = open_at(root.clone());

        engine.put(b"k", b"v").unwrap();

        // The serialized write event is on disk and the key is findable.
        assert_eq!(
            events_in_log(&root),
            vec![(b"k".to_vec(), Some(b"v".to_vec()))]
        );
        assert_eq!(engine.get(b"k").unwrap(), b"v");

        // A duplicate put fails in the memtable, but only after its event
        // was appended: the log now holds the write twice.
        assert!(matches!(
            engine.put(b"k", b"other"),
            Err(EngineError::AlreadyExists)
        ));
        assert_eq!(engine.get(b"k").unwrap(), b"v");
        assert_eq!(events_in_log(&root).len(), 2);
    }

    #[test]
    fn freeze_limit_is_honored() {
        let dir = tempdir().unwrap();
        let mut engine = Engine::open(EngineOptions {
            root_dir: dir.path().join("db"),
            memtable_flush_limit: 2,
        })
        .unwrap();

        engine.put(b"a", b"1").unwrap();
        engine.put(b"b", b"2").unwrap();
        // Boundary write freezes the memtable; the pair is only in the log.
        engine.put(b"c", b"3").unwrap();
        assert!(matches!(engine.get(b"a"), Err(EngineError::NotFound)));
        assert!(matches!(engine.get(b"c"), Err(EngineError::NotFound)));

        // All three writes made it to the log before the freeze decision.
        assert_eq!(events_in_log(engine.root_dir()).len(), 3);
    }
}
