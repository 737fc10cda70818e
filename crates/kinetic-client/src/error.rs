//! Error taxonomy for the session engine.
//!
//! A closed set of variants covering socket failures, protocol failures,
//! authentication failures, and drive-reported status codes. Every public
//! entry point returns one of these; the callback path delivers the same
//! variant to the closure. Nothing is silent.
//!
//! We avoid `std::io::Error` past the transport boundary: callers match on
//! stable variants, and the detail strings go to the log instead.

use std::io;

use kinetic_proto::{ProtocolError, StatusCode};
use thiserror::Error;

/// Convenience alias used throughout the session engine.
pub type Result<T> = std::result::Result<T, KineticError>;

/// Closed error taxonomy surfaced by every operation.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum KineticError {
    /// Session configuration is unusable (missing host or secret).
    #[error("session is empty or misconfigured")]
    SessionEmpty,

    /// Socket-level failure; the session is no longer usable.
    #[error("connection error")]
    ConnectionError,

    /// The drive (or the outstanding-operation bound) is saturated.
    #[error("device busy")]
    DeviceBusy,

    /// HMAC verification failed on a sent or received message.
    #[error("hmac validation failure")]
    HmacFailure,

    /// Malformed frame, header, or command encoding.
    #[error("data error")]
    DataError,

    /// Cluster version or entry version mismatch.
    #[error("version mismatch")]
    VersionMismatch,

    /// Key not found on the drive.
    #[error("key not found")]
    NotFound,

    /// Identity lacks permission for the operation.
    #[error("not authorized")]
    NotAuthorized,

    /// Request was malformed or a local input was unusable.
    #[error("invalid request")]
    InvalidRequest,

    /// A PIN was claimed but carried no bytes.
    #[error("missing pin")]
    MissingPin,

    /// Admin operation attempted over a plain (non-TLS) session.
    #[error("ssl required")]
    SslRequired,

    /// Unknown or unsupported log type requested.
    #[error("invalid log type")]
    InvalidLogType,

    /// ACL definitions could not be loaded or parsed.
    #[error("acl error")]
    AclError,

    /// Allocation failure.
    #[error("memory error")]
    MemoryError,

    /// Operation did not resolve within its deadline.
    #[error("operation timed out")]
    OperationTimedOut,

    /// Drive reported a non-specific failure.
    #[error("operation failed")]
    OperationFailed,

    /// Unrecognized or absent status information.
    #[error("invalid status")]
    Invalid,
}

impl KineticError {
    /// Returns true if this error is transient and the caller may retry.
    ///
    /// The engine itself never retries at the protocol layer; idempotence is
    /// the caller's concern.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::DeviceBusy | Self::OperationTimedOut)
    }
}

impl From<ProtocolError> for KineticError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::InvalidHmacKey(_) => Self::HmacFailure,
            ProtocolError::HeaderTooShort { .. }
            | ProtocolError::InvalidMagic(_)
            | ProtocolError::CommandTooLarge { .. }
            | ProtocolError::ValueTooLarge { .. }
            | ProtocolError::FrameTruncated { .. }
            | ProtocolError::CborEncode(_)
            | ProtocolError::CborDecode(_) => Self::DataError,
        }
    }
}

impl From<io::Error> for KineticError {
    fn from(_err: io::Error) -> Self {
        Self::ConnectionError
    }
}

/// Map a drive-reported status code onto the taxonomy.
///
/// `Success` is the `Ok` side; everything else picks the closest variant.
pub(crate) fn status_to_result(code: StatusCode) -> Result<()> {
    match code {
        StatusCode::Success => Ok(()),
        StatusCode::HmacFailure => Err(KineticError::HmacFailure),
        StatusCode::NotAuthorized => Err(KineticError::NotAuthorized),
        StatusCode::VersionFailure | StatusCode::VersionMismatch => {
            Err(KineticError::VersionMismatch)
        },
        StatusCode::NotFound => Err(KineticError::NotFound),
        StatusCode::ServiceBusy => Err(KineticError::DeviceBusy),
        StatusCode::Expired => Err(KineticError::OperationTimedOut),
        StatusCode::DataError | StatusCode::PermDataError => Err(KineticError::DataError),
        StatusCode::RemoteConnectionError | StatusCode::ConnectionTerminated => {
            Err(KineticError::ConnectionError)
        },
        StatusCode::InvalidRequest
        | StatusCode::HeaderRequired
        | StatusCode::InvalidBatch
        | StatusCode::NoSuchHmacAlgorithm => Err(KineticError::InvalidRequest),
        StatusCode::InternalError
        | StatusCode::NestedOperationErrors
        | StatusCode::NoSpace
        | StatusCode::DeviceLocked
        | StatusCode::DeviceAlreadyUnlocked => Err(KineticError::OperationFailed),
        StatusCode::NotAttempted => Err(KineticError::Invalid),
    }
}
