//! Record framing for the block-structured write-ahead log.
//!
//! A record is the framed, type-tagged, checksummed unit stored inside a
//! block:
//!
//! ```text
//! ┌──────────┬─────────┬──────────┬──────────────┐
//! │ CRC (4B) │ Len(2B) │ Type(1B) │ Data (Len B) │
//! └──────────┴─────────┴──────────┴──────────────┘
//! ```
//!
//! All integers are little-endian. The checksum is CRC-32 over
//! `data ‖ [type_byte]`. Payloads larger than one block are chunked into a
//! `First, Middle…, Last` run by [`chunk`]; a payload that fits emits a
//! single `Full` record.
//!
//! A record with `length == 0` is never written, which is what lets the
//! block reader tell trailing zero padding apart from a real record.

use byteorder::{ByteOrder, LittleEndian};
use crc32fast::Hasher as Crc32;

use crate::WalError;

/// Size of the record header: CRC (4) + length (2) + type (1).
pub const HEADER_SIZE: usize = 7;

/// Position of a record within a chunked payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// The whole payload in a single record.
    Full = 1,
    /// First fragment of a chunked payload.
    First = 2,
    /// Interior fragment.
    Middle = 3,
    /// Final fragment; its data is never empty.
    Last = 4,
}

impl RecordType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(RecordType::Full),
            2 => Some(RecordType::First),
            3 => Some(RecordType::Middle),
            4 => Some(RecordType::Last),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// A framed record borrowing its payload fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    pub checksum: u32,
    pub length: u16,
    pub kind: RecordType,
    pub data: &'a [u8],
}

impl<'a> Record<'a> {
    /// Frames `data` as a record of the given kind, computing the checksum.
    pub fn new(kind: RecordType, data: &'a [u8]) -> Self {
        Record {
            checksum: checksum(kind, data),
            length: data.len() as u16,
            kind,
            data,
        }
    }

    /// Size of this record on disk, header included.
    pub fn encoded_size(&self) -> usize {
        HEADER_SIZE + self.data.len()
    }

    /// Serializes the record, writing the stored header fields verbatim.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.encoded_size()];
        LittleEndian::write_u32(&mut buf[0..4], self.checksum);
        LittleEndian::write_u16(&mut buf[4..6], self.length);
        buf[6] = self.kind.to_byte();
        buf[HEADER_SIZE..].copy_from_slice(self.data);
        buf
    }

    /// Decodes one record from the start of `buf`.
    ///
    /// The returned `data` is a sub-view of `buf`. The checksum is **not**
    /// verified here — a replay driver calls
    /// [`verify_checksum`](Record::verify_checksum) once it decides the
    /// record matters.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::InvalidRecord`] when the header declares a zero
    /// length, an unknown type, or more data than `buf` holds. Zero padding
    /// at a block tail always fails one of these checks.
    pub fn decode(buf: &'a [u8]) -> Result<Record<'a>, WalError> {
        if buf.len() < HEADER_SIZE {
            return Err(WalError::InvalidRecord);
        }
        let checksum = LittleEndian::read_u32(&buf[0..4]);
        let length = LittleEndian::read_u16(&buf[4..6]);
        let kind = RecordType::from_byte(buf[6]).ok_or(WalError::InvalidRecord)?;
        if length == 0 {
            return Err(WalError::InvalidRecord);
        }
        let end = HEADER_SIZE + length as usize;
        if buf.len() < end {
            return Err(WalError::InvalidRecord);
        }
        Ok(Record {
            checksum,
            length,
            kind,
            data: &buf[HEADER_SIZE..end],
        })
    }

    /// Recomputes the CRC over the payload and type byte.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::ChecksumMismatch`] if the stored checksum
    /// disagrees.
    pub fn verify_checksum(&self) -> Result<(), WalError> {
        if self.checksum == checksum(self.kind, self.data) {
            Ok(())
        } else {
            Err(WalError::ChecksumMismatch)
        }
    }
}

fn checksum(kind: RecordType, data: &[u8]) -> u32 {
    let mut hasher = Crc32::new();
    hasher.update(data);
    hasher.update(&[kind.to_byte()]);
    hasher.finalize()
}

/// Splits `payload` into records sized for blocks of `block_size` bytes.
///
/// A payload that fits (`HEADER_SIZE + len <= block_size`) becomes one
/// `Full` record. Anything larger is cut into fragments of at most
/// `block_size - HEADER_SIZE` bytes, typed `First, Middle…, Last`; the last
/// fragment carries the (never empty) remainder.
pub fn chunk(payload: &[u8], block_size: usize) -> Vec<Record<'_>> {
    debug_assert!(block_size > HEADER_SIZE);
    if HEADER_SIZE + payload.len() <= block_size {
        return vec![Record::new(RecordType::Full, payload)];
    }

    let max_fragment = block_size - HEADER_SIZE;
    let mut records = Vec::with_capacity(payload.len().div_ceil(max_fragment));
    let mut fragments = payload.chunks(max_fragment).peekable();
    let mut first = true;
    while let Some(fragment) = fragments.next() {
        let kind = if first {
            RecordType::First
        } else if fragments.peek().is_some() {
            RecordType::Middle
        } else {
            RecordType::Last
        };
        first = false;
        records.push(Record::new(kind, fragment));
    }
    records
}
