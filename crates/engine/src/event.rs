//! Serialization of write and delete events.
//!
//! Events are the application-level payloads stored inside WAL records,
//! little-endian:
//!
//! ```text
//! write:  0x01 | key_len (u32) | key | value_len (u32) | value
//! delete: 0x02 | key_len (u32) | key
//! ```
//!
//! There is no checksum at this layer; integrity is the WAL's job.

use byteorder::{ByteOrder, LittleEndian};

use crate::EngineError;

const WRITE_TAG: u8 = 1;
const DELETE_TAG: u8 = 2;

/// A write or delete operation, borrowing its key and value bytes.
///
/// Pure value type: two events with equal bytes are the same event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event<'a> {
    Write { key: &'a [u8], value: &'a [u8] },
    Delete { key: &'a [u8] },
}

impl<'a> Event<'a> {
    /// Serialized length in bytes.
    pub fn encoded_size(&self) -> usize {
        match self {
            Event::Write { key, value } => 1 + 4 + key.len() + 4 + value.len(),
            Event::Delete { key } => 1 + 4 + key.len(),
        }
    }

    /// Serializes the event.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_size());
        match self {
            Event::Write { key, value } => {
                buf.push(WRITE_TAG);
                buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
                buf.extend_from_slice(key);
                buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
                buf.extend_from_slice(value);
            }
            Event::Delete { key } => {
                buf.push(DELETE_TAG);
                buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
                buf.extend_from_slice(key);
            }
        }
        buf
    }

    /// Deserializes an event, returning views into `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidEvent`] on an unknown tag or a buffer
    /// too short for its declared lengths.
    pub fn decode(buf: &'a [u8]) -> Result<Event<'a>, EngineError> {
        let (&tag, rest) = buf.split_first().ok_or(EngineError::InvalidEvent)?;
        match tag {
            WRITE_TAG => {
                let (key, rest) = take_field(rest)?;
                let (value, _) = take_field(rest)?;
                Ok(Event::Write { key, value })
            }
            DELETE_TAG => {
                let (key, _) = take_field(rest)?;
                Ok(Event::Delete { key })
            }
            _ => Err(EngineError::InvalidEvent),
        }
    }
}

/// Reads a u32-length-prefixed field, returning it and the remaining bytes.
fn take_field(buf: &[u8]) -> Result<(&[u8], &[u8]), EngineError> {
    if buf.len() < 4 {
        return Err(EngineError::InvalidEvent);
    }
    let len = LittleEndian::read_u32(&buf[..4]) as usize;
    let rest = &buf[4..];
    if rest.len() < len {
        return Err(EngineError::InvalidEvent);
    }
    Ok(rest.split_at(len))
}
