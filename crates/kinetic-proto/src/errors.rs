//! Error types for the wire layer.
//!
//! Every decode path returns a [`ProtocolError`] rather than panicking;
//! arbitrary network bytes must never crash the parser. Session-level policy
//! (which failures are fatal to the connection) lives in the client crate.

use thiserror::Error;

/// Convenience alias used throughout the wire layer.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding PDUs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer shorter than the fixed PDU header
    #[error("header too short: expected {expected} bytes, got {actual}")]
    HeaderTooShort {
        /// Required length
        expected: usize,
        /// Length actually available
        actual: usize,
    },

    /// Leading version byte was not `'F'`
    #[error("invalid version prefix: {0:#04x}")]
    InvalidMagic(u8),

    /// Header claims a command segment larger than the configured bound
    #[error("command segment too large: {size} bytes (max {max})")]
    CommandTooLarge {
        /// Claimed size
        size: usize,
        /// Allowed maximum
        max: usize,
    },

    /// Header claims a value segment larger than the configured bound
    #[error("value segment too large: {size} bytes (max {max})")]
    ValueTooLarge {
        /// Claimed size
        size: usize,
        /// Allowed maximum
        max: usize,
    },

    /// Fewer segment bytes than the header claims
    #[error("frame truncated: expected {expected} segment bytes, got {actual}")]
    FrameTruncated {
        /// Bytes the header promised
        expected: usize,
        /// Bytes actually present
        actual: usize,
    },

    /// CBOR serialization failed
    #[error("cbor encode error: {0}")]
    CborEncode(String),

    /// CBOR deserialization failed
    #[error("cbor decode error: {0}")]
    CborDecode(String),

    /// HMAC key was rejected by the MAC implementation
    #[error("invalid hmac key: {0}")]
    InvalidHmacKey(String),
}
