//! # Write-ahead log
//!
//! Append-only durability log for the EddyKV storage engine. The engine
//! serializes each write or delete event to bytes and appends them here
//! *before* touching the memtable, so a crash can always be replayed from
//! disk.
//!
//! ## File layout
//!
//! The file is a sequence of fixed-size blocks (32 KiB by default). Each
//! block holds whole records followed by zero padding; records never
//! straddle a block boundary — payloads larger than a block are chunked
//! into `First, Middle…, Last` records instead (see [`chunk`]).
//!
//! ```text
//! ┌────────────── block 0 ──────────────┬────────────── block 1 ─────────────┬──
//! │ record │ record │ record │ 000…000  │ record │ record │ 000…000          │
//! └─────────────────────────────────────┴────────────────────────────────────┴──
//! ```
//!
//! There is no per-block header. A reader hands one block at a time to
//! [`Wal::read_block`]; the first header that fails validation is the start
//! of the padding.
//!
//! Appends position themselves off the current file length, padding out the
//! tail block with zeros whenever the next record would not fit. [`Wal::flush`]
//! is the durability barrier (`fsync`); a torn tail left by a crash simply
//! fails decoding, and everything before it replays cleanly.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use thiserror::Error;

mod record;

pub use record::{chunk, Record, RecordType, HEADER_SIZE};

/// Default block size: 32 KiB.
pub const DEFAULT_BLOCK_SIZE: usize = 32 * 1024;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid record header")]
    InvalidRecord,
    #[error("record checksum mismatch")]
    ChecksumMismatch,
}

/// Append-only log of fixed-size blocks.
///
/// The `Wal` owns the file handle; nothing else writes to the file. Blocks
/// are never rewritten.
pub struct Wal {
    file: File,
    block_size: usize,
}

impl Wal {
    /// Opens (creating if absent) a log at `path` with the default block
    /// size.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, WalError> {
        Self::with_block_size(path, DEFAULT_BLOCK_SIZE)
    }

    /// Opens (creating if absent) a log with an explicit block size.
    ///
    /// # Panics
    ///
    /// Panics if `block_size` cannot hold even a record header.
    pub fn with_block_size<P: AsRef<Path>>(path: P, block_size: usize) -> Result<Self, WalError> {
        assert!(
            block_size > HEADER_SIZE,
            "block size must exceed the record header"
        );
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)?;
        Ok(Wal { file, block_size })
    }

    /// Appends one payload, chunking it into records and placing each
    /// record so that it never crosses a block boundary.
    ///
    /// On return the bytes are in the OS page cache in the canonical block
    /// layout; call [`flush`](Wal::flush) for durability.
    ///
    /// # Errors
    ///
    /// Rejects an empty payload with [`WalError::InvalidRecord`] — a
    /// zero-length record would be indistinguishable from block padding.
    /// I/O errors propagate unchanged; they may leave a torn record at the
    /// tail, which replay treats as the end of the log.
    pub fn append(&mut self, payload: &[u8]) -> Result<(), WalError> {
        if payload.is_empty() {
            return Err(WalError::InvalidRecord);
        }
        for record in chunk(payload, self.block_size) {
            self.append_record(&record)?;
        }
        Ok(())
    }

    fn append_record(&mut self, record: &Record<'_>) -> Result<(), WalError> {
        // Always position off the end of the file, not a cached cursor.
        let end = self.file.seek(SeekFrom::End(0))? as usize;
        let space = self.block_size - end % self.block_size;
        if record.encoded_size() > space {
            self.file.write_all(&vec![0u8; space])?;
        }
        self.file.write_all(&record.encode())?;
        Ok(())
    }

    /// Durability barrier: forces buffered log bytes to stable storage.
    pub fn flush(&mut self) -> Result<(), WalError> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Current file length in bytes.
    pub fn len(&self) -> Result<u64, WalError> {
        Ok(self.file.metadata()?.len())
    }

    /// Configured block size in bytes.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Decodes the records of one block.
    ///
    /// `buf` holds a single block (the final block of a file may be
    /// shorter). Records are decoded back-to-back from offset 0; the first
    /// header that fails validation is taken to be the start of the zero
    /// padding, and everything decoded so far is returned.
    pub fn read_block(buf: &[u8]) -> Vec<Record<'_>> {
        let mut records = Vec::new();
        let mut offset = 0;
        while offset < buf.len() {
            match Record::decode(&buf[offset..]) {
                Ok(record) => {
                    offset += record.encoded_size();
                    records.push(record);
                }
                Err(_) => break, // hit padding (or a torn tail)
            }
        }
        records
    }
}
