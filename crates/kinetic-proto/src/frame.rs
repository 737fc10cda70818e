//! Frame type combining header, message segment, and value segment.
//!
//! A `Frame` is the unit written to (and read from) the socket. The message
//! bus writes all three segments under one lock so they land contiguously on
//! the wire; the receive loop reads them back with three exact-size reads.
//!
//! This is a pure data holder. Authentication and command semantics live in
//! [`crate::message`] and [`crate::command`].

use bytes::{BufMut, Bytes};

use crate::{
    errors::{ProtocolError, Result},
    header::PduHeader,
};

/// Complete protocol frame.
///
/// Layout on the wire:
/// `[PduHeader: 9 bytes] + [command: variable] + [value: variable]`
///
/// # Invariants
///
/// - `command.len()` equals `header.command_length()` and `value.len()` equals
///   `header.value_length()`. Enforced by [`Frame::new`] (which derives the
///   header from the segments) and verified by [`Frame::decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Fixed header carrying the two segment lengths.
    pub header: PduHeader,

    /// CBOR-encoded authentication envelope bytes.
    pub command: Bytes,

    /// Opaque value payload (may be empty).
    pub value: Bytes,
}

impl Frame {
    /// Create a frame, deriving the header from the segment lengths.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::CommandTooLarge`] / [`ProtocolError::ValueTooLarge`]
    ///   if either segment exceeds its wire bound
    pub fn new(command: impl Into<Bytes>, value: impl Into<Bytes>) -> Result<Self> {
        let command = command.into();
        let value = value.into();
        let header = PduHeader::new(command.len() as u32, value.len() as u32)?;
        Ok(Self { header, command, value })
    }

    /// Total serialized size of this frame in bytes.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        PduHeader::SIZE + self.command.len() + self.value.len()
    }

    /// Encode the frame into a buffer. Infallible: segment lengths were
    /// validated at construction.
    pub fn encode(&self, dst: &mut impl BufMut) {
        debug_assert_eq!(self.command.len(), self.header.command_length() as usize);
        debug_assert_eq!(self.value.len(), self.header.value_length() as usize);

        dst.put_slice(&self.header.to_bytes());
        dst.put_slice(&self.command);
        dst.put_slice(&self.value);
    }

    /// Decode a frame from a contiguous buffer.
    ///
    /// Reads exactly `command_length + value_length` segment bytes; trailing
    /// data is ignored. The streaming receive path decodes the header alone
    /// and reads segments directly off the socket instead.
    ///
    /// # Errors
    ///
    /// - Any header error from [`PduHeader::from_bytes`]
    /// - [`ProtocolError::FrameTruncated`] if the buffer holds fewer segment
    ///   bytes than the header claims
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = PduHeader::from_bytes(bytes)?;

        let command_len = header.command_length() as usize;
        let value_len = header.value_length() as usize;
        let available = bytes.len() - PduHeader::SIZE;

        if available < command_len + value_len {
            return Err(ProtocolError::FrameTruncated {
                expected: command_len + value_len,
                actual: available,
            });
        }

        let command_start = PduHeader::SIZE;
        let value_start = command_start + command_len;
        let command = Bytes::copy_from_slice(&bytes[command_start..value_start]);
        let value = Bytes::copy_from_slice(&bytes[value_start..value_start + value_len]);

        Ok(Self { header, command, value })
    }
}
