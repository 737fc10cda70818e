//! Fixed PDU header with zero-copy parsing.
//!
//! The header is a 9-byte structure serialized as raw binary (big endian).
//! The receive loop decodes it first and uses the two length fields to size
//! the exact reads for the command and value segments that follow.

use crate::errors::{ProtocolError, Result};

/// Fixed 9-byte PDU header (big-endian network byte order).
///
/// ```text
/// offset  size  field
///  0       1    version prefix = 0x46 ('F')
///  1       4    command_length (u32 BE)
///  5       4    value_length   (u32 BE)
/// ```
///
/// # Invariants
///
/// - `command_length <= MAX_COMMAND_LENGTH` and
///   `value_length <= MAX_VALUE_LENGTH`. Both constructors enforce this, so a
///   held `PduHeader` is always within bounds and encoding is infallible.
///
/// # Security
///
/// The length bounds are the allocation limit for the receive path: a peer
/// cannot make the client allocate more than ~2 MiB per frame regardless of
/// what the header claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PduHeader {
    command_length: u32,
    value_length: u32,
}

impl PduHeader {
    /// Size of the serialized header (9 bytes).
    pub const SIZE: usize = 9;

    /// Version prefix byte: `'F'`.
    pub const MAGIC: u8 = 0x46;

    /// Maximum command segment size (1 MiB).
    pub const MAX_COMMAND_LENGTH: u32 = 1024 * 1024;

    /// Maximum value segment size (1 MiB plus a 64 KiB metadata margin).
    pub const MAX_VALUE_LENGTH: u32 = 1024 * 1024 + 64 * 1024;

    /// Create a header after validating both lengths against their bounds.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::CommandTooLarge`] if the command length exceeds
    ///   [`Self::MAX_COMMAND_LENGTH`]
    /// - [`ProtocolError::ValueTooLarge`] if the value length exceeds
    ///   [`Self::MAX_VALUE_LENGTH`]
    pub fn new(command_length: u32, value_length: u32) -> Result<Self> {
        if command_length > Self::MAX_COMMAND_LENGTH {
            return Err(ProtocolError::CommandTooLarge {
                size: command_length as usize,
                max: Self::MAX_COMMAND_LENGTH as usize,
            });
        }
        if value_length > Self::MAX_VALUE_LENGTH {
            return Err(ProtocolError::ValueTooLarge {
                size: value_length as usize,
                max: Self::MAX_VALUE_LENGTH as usize,
            });
        }
        Ok(Self { command_length, value_length })
    }

    /// Parse a header from network bytes.
    ///
    /// Validation order is cheapest-first: size, version prefix, then the two
    /// length bounds. Trailing bytes beyond [`Self::SIZE`] are ignored.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::HeaderTooShort`] if fewer than 9 bytes are available
    /// - [`ProtocolError::InvalidMagic`] if the version prefix is not `'F'`
    /// - [`ProtocolError::CommandTooLarge`] / [`ProtocolError::ValueTooLarge`]
    ///   if either claimed length exceeds its bound
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let Some(raw) = bytes.get(..Self::SIZE) else {
            return Err(ProtocolError::HeaderTooShort {
                expected: Self::SIZE,
                actual: bytes.len(),
            });
        };

        if raw[0] != Self::MAGIC {
            return Err(ProtocolError::InvalidMagic(raw[0]));
        }

        // INVARIANT: raw is exactly 9 bytes, checked above; both slices are
        // in-bounds 4-byte windows.
        let command_length = u32::from_be_bytes([raw[1], raw[2], raw[3], raw[4]]);
        let value_length = u32::from_be_bytes([raw[5], raw[6], raw[7], raw[8]]);

        Self::new(command_length, value_length)
    }

    /// Serialize to the 9-byte wire representation. Infallible: both lengths
    /// were validated at construction.
    #[must_use]
    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0] = Self::MAGIC;
        out[1..5].copy_from_slice(&self.command_length.to_be_bytes());
        out[5..9].copy_from_slice(&self.value_length.to_be_bytes());
        out
    }

    /// Length of the command segment in bytes.
    #[must_use]
    pub fn command_length(self) -> u32 {
        self.command_length
    }

    /// Length of the value segment in bytes (may be zero).
    #[must_use]
    pub fn value_length(self) -> u32 {
        self.value_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let header = PduHeader::new(1234, 56789).unwrap();
        let parsed = PduHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(header, parsed);
        assert_eq!(parsed.command_length(), 1234);
        assert_eq!(parsed.value_length(), 56789);
    }

    #[test]
    fn wire_layout_is_big_endian() {
        let header = PduHeader::new(0x0102_0304, 0x0A0B_0C0D).unwrap();
        let bytes = header.to_bytes();
        assert_eq!(bytes[0], b'F');
        assert_eq!(&bytes[1..5], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(&bytes[5..9], &[0x0A, 0x0B, 0x0C, 0x0D]);
    }

    #[test]
    fn reject_short_buffer() {
        let result = PduHeader::from_bytes(&[b'F', 0, 0]);
        assert_eq!(result, Err(ProtocolError::HeaderTooShort { expected: 9, actual: 3 }));
    }

    #[test]
    fn reject_invalid_magic() {
        let mut bytes = PduHeader::new(1, 1).unwrap().to_bytes();
        bytes[0] = b'X';
        assert_eq!(PduHeader::from_bytes(&bytes), Err(ProtocolError::InvalidMagic(b'X')));
    }

    #[test]
    fn reject_oversized_command() {
        let oversized = PduHeader::MAX_COMMAND_LENGTH + 1;
        assert!(matches!(
            PduHeader::new(oversized, 0),
            Err(ProtocolError::CommandTooLarge { .. })
        ));

        let mut bytes = [0u8; PduHeader::SIZE];
        bytes[0] = PduHeader::MAGIC;
        bytes[1..5].copy_from_slice(&oversized.to_be_bytes());
        assert!(matches!(
            PduHeader::from_bytes(&bytes),
            Err(ProtocolError::CommandTooLarge { .. })
        ));
    }

    #[test]
    fn reject_oversized_value() {
        let oversized = PduHeader::MAX_VALUE_LENGTH + 1;
        assert!(matches!(PduHeader::new(0, oversized), Err(ProtocolError::ValueTooLarge { .. })));
    }

    #[test]
    fn bounds_are_inclusive() {
        assert!(PduHeader::new(PduHeader::MAX_COMMAND_LENGTH, PduHeader::MAX_VALUE_LENGTH).is_ok());
    }
}
