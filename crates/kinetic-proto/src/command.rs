//! CBOR-encoded inner command schema.
//!
//! The PDU header is raw binary for exact-size reads, but the command is CBOR
//! for type safety and forward compatibility: field names are embedded, no
//! code generation is needed, and optional sections can be added without
//! breaking old peers.
//!
//! The session engine treats these bytes as opaque past the header fields it
//! stamps (`cluster_version`, `connection_id`, `sequence`) and the fields it
//! correlates on (`ack_sequence`, `message_type`, `status`). Everything else
//! is builder-in, caller-out.

use serde::{Deserialize, Serialize};

use crate::errors::{ProtocolError, Result};

/// Operation discriminator carried in every command header.
///
/// Requests and responses are distinct variants; the drive answers a request
/// with its paired response type. `Status` is only ever unsolicited (the
/// drive-ready announcement after TCP accept).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    /// Liveness probe.
    Noop,
    /// Response to [`Self::Noop`].
    NoopResponse,
    /// Store a key-value entry.
    Put,
    /// Response to [`Self::Put`].
    PutResponse,
    /// Read a key-value entry (optionally metadata only).
    Get,
    /// Response to [`Self::Get`].
    GetResponse,
    /// Delete a key-value entry.
    Delete,
    /// Response to [`Self::Delete`].
    DeleteResponse,
    /// Enumerate keys in a range.
    GetKeyRange,
    /// Response to [`Self::GetKeyRange`].
    GetKeyRangeResponse,
    /// Read drive log sections.
    GetLog,
    /// Response to [`Self::GetLog`].
    GetLogResponse,
    /// Admin: cluster version or firmware download.
    Setup,
    /// Response to [`Self::Setup`].
    SetupResponse,
    /// Admin: ACLs and lock/erase PINs.
    Security,
    /// Response to [`Self::Security`].
    SecurityResponse,
    /// Admin: PIN-authenticated erase/lock/unlock.
    PinOp,
    /// Response to [`Self::PinOp`].
    PinOpResponse,
    /// Unsolicited drive status (first-contact announcement).
    Status,
}

impl MessageType {
    /// True for response variants (and the unsolicited `Status`).
    #[must_use]
    pub fn is_response(self) -> bool {
        matches!(
            self,
            Self::NoopResponse
                | Self::PutResponse
                | Self::GetResponse
                | Self::DeleteResponse
                | Self::GetKeyRangeResponse
                | Self::GetLogResponse
                | Self::SetupResponse
                | Self::SecurityResponse
                | Self::PinOpResponse
                | Self::Status
        )
    }

    /// The response type the drive pairs with this request, if any.
    #[must_use]
    pub fn expected_response(self) -> Option<Self> {
        match self {
            Self::Noop => Some(Self::NoopResponse),
            Self::Put => Some(Self::PutResponse),
            Self::Get => Some(Self::GetResponse),
            Self::Delete => Some(Self::DeleteResponse),
            Self::GetKeyRange => Some(Self::GetKeyRangeResponse),
            Self::GetLog => Some(Self::GetLogResponse),
            Self::Setup => Some(Self::SetupResponse),
            Self::Security => Some(Self::SecurityResponse),
            Self::PinOp => Some(Self::PinOpResponse),
            _ => None,
        }
    }

    /// True for the administrative set that must travel over TLS.
    #[must_use]
    pub fn is_admin(self) -> bool {
        matches!(self, Self::Security | Self::Setup | Self::PinOp)
    }
}

/// Drive-side scheduling priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    /// Default priority.
    #[default]
    Normal,
    /// Lowest priority.
    Lowest,
    /// Below normal.
    Lower,
    /// Above normal.
    Higher,
    /// Highest priority.
    Highest,
}

/// Command header stamped by the session at send time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandHeader {
    /// Fencing token; the drive rejects mismatches with `VersionFailure`.
    pub cluster_version: i64,

    /// Drive-issued connection identifier (from the first-contact status).
    pub connection_id: i64,

    /// Per-connection monotonic sequence number.
    pub sequence: u64,

    /// Echo of the request's sequence, present only on responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack_sequence: Option<u64>,

    /// Operation discriminator.
    pub message_type: MessageType,

    /// Drive-side operation timeout hint in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Allow the drive to abandon the operation on first error.
    #[serde(default)]
    pub early_exit: bool,

    /// Drive-side scheduling priority.
    #[serde(default)]
    pub priority: Priority,
}

impl CommandHeader {
    /// Header for a fresh request; identity fields are stamped at send time.
    #[must_use]
    pub fn request(message_type: MessageType) -> Self {
        Self {
            cluster_version: 0,
            connection_id: 0,
            sequence: 0,
            ack_sequence: None,
            message_type,
            timeout_ms: None,
            early_exit: false,
            priority: Priority::Normal,
        }
    }
}

/// Integrity algorithm attached to a stored entry's tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    /// SHA-1 digest.
    Sha1,
    /// SHA-2 (256) digest.
    Sha2,
    /// SHA-3 digest.
    Sha3,
    /// CRC-32 checksum.
    Crc32,
    /// CRC-64 checksum.
    Crc64,
}

/// Persistence mode for writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Synchronization {
    /// Acknowledge after the entry is persistent.
    #[default]
    WriteThrough,
    /// Acknowledge once buffered.
    WriteBack,
    /// Flush all previously buffered writes with this one.
    Flush,
}

/// Key-value section used by put/get/delete and their responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    /// Entry key.
    pub key: Vec<u8>,

    /// Version the caller believes is stored (compare-and-set guard).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_version: Option<Vec<u8>>,

    /// Version to store with a put.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_version: Option<Vec<u8>>,

    /// Caller-supplied integrity tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<Vec<u8>>,

    /// Algorithm the tag was computed with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<Algorithm>,

    /// Persistence mode for this write.
    #[serde(default)]
    pub synchronization: Synchronization,

    /// Skip the version check on put/delete.
    #[serde(default)]
    pub force: bool,

    /// Return metadata without the value segment on get.
    #[serde(default)]
    pub metadata_only: bool,
}

/// Key-range section for `GetKeyRange`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    /// First key of the range.
    pub start_key: Vec<u8>,

    /// Last key of the range.
    pub end_key: Vec<u8>,

    /// Include `start_key` itself.
    #[serde(default)]
    pub start_inclusive: bool,

    /// Include `end_key` itself.
    #[serde(default)]
    pub end_inclusive: bool,

    /// Cap on the number of keys returned.
    pub max_returned: u32,

    /// Enumerate from `end_key` backwards.
    #[serde(default)]
    pub reverse: bool,

    /// Matching keys (populated on the response).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<Vec<u8>>,
}

/// Drive log sections selectable with `GetLog`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogType {
    /// Utilization counters.
    Utilization,
    /// Temperature sensors.
    Temperature,
    /// Capacity summary.
    Capacity,
    /// Drive configuration.
    Configuration,
    /// Operation statistics.
    Statistics,
    /// Kernel/firmware message ring.
    Messages,
    /// Drive limits (max key size, max value size, ...).
    Limits,
    /// Vendor-specific device log; requires a name and TLS.
    Device,
}

/// Get-log section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetLog {
    /// Requested log sections.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<LogType>,

    /// Vendor log name, only with [`LogType::Device`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<Vec<u8>>,
}

/// Setup section: cluster-version fencing and firmware download.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setup {
    /// New cluster version to install on the drive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_cluster_version: Option<i64>,

    /// The value segment carries a firmware image.
    #[serde(default)]
    pub firmware_download: bool,
}

/// Permissions grantable to an identity via ACL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permission {
    /// Read entries.
    Read,
    /// Write entries.
    Write,
    /// Delete entries.
    Delete,
    /// Enumerate key ranges.
    Range,
    /// Setup operations.
    Setup,
    /// Peer-to-peer push.
    P2pOp,
    /// Read drive logs.
    GetLog,
    /// Change security settings.
    Security,
}

/// Key-prefix scope an ACL grant applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclScope {
    /// Byte offset of the prefix match within the key.
    #[serde(default)]
    pub offset: i64,

    /// Prefix bytes to match (empty grants all keys).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub value: Vec<u8>,

    /// Permissions granted within this scope.
    pub permissions: Vec<Permission>,

    /// Grant is only usable over TLS.
    #[serde(default)]
    pub tls_required: bool,
}

/// One identity's access grant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acl {
    /// Identity the grant applies to.
    pub identity: i64,

    /// Shared HMAC secret for that identity.
    pub key: Vec<u8>,

    /// MAC algorithm for the identity's key (SHA-1 on current drives).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hmac_algorithm: Option<Algorithm>,

    /// Scopes granted to the identity.
    pub scopes: Vec<AclScope>,
}

/// Security section: ACL installation and PIN changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Security {
    /// ACL definitions to install.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acls: Vec<Acl>,

    /// Current lock PIN (empty when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_lock_pin: Option<Vec<u8>>,

    /// New lock PIN to install.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_lock_pin: Option<Vec<u8>>,

    /// Current erase PIN (empty when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_erase_pin: Option<Vec<u8>>,

    /// New erase PIN to install.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_erase_pin: Option<Vec<u8>>,
}

/// PIN-authenticated drive operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PinOpKind {
    /// Unlock the drive.
    Unlock,
    /// Lock the drive.
    Lock,
    /// Instant erase (cryptographic discard).
    Erase,
    /// Secure erase (full overwrite).
    SecureErase,
}

/// Pin-op section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinOp {
    /// Which PIN-authenticated operation to perform.
    pub kind: PinOpKind,
}

/// Optional per-operation sections; at most one is populated per command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Body {
    /// Key-value section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_value: Option<KeyValue>,

    /// Key-range section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<Range>,

    /// Get-log section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get_log: Option<GetLog>,

    /// Setup section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup: Option<Setup>,

    /// Security section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<Security>,

    /// Pin-op section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin_op: Option<PinOp>,
}

/// Drive-reported result codes. Closed set; the client maps these onto its
/// error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCode {
    /// Operation succeeded.
    Success,
    /// Drive did not attempt the operation.
    NotAttempted,
    /// Request HMAC did not verify on the drive.
    HmacFailure,
    /// Identity lacks permission.
    NotAuthorized,
    /// Cluster version fencing mismatch.
    VersionFailure,
    /// Internal drive error.
    InternalError,
    /// Command header missing required fields.
    HeaderRequired,
    /// Key not found.
    NotFound,
    /// Entry version mismatch on compare-and-set.
    VersionMismatch,
    /// Drive is saturated; retry later.
    ServiceBusy,
    /// Drive-side timeout expired.
    Expired,
    /// Recoverable data error.
    DataError,
    /// Permanent data error.
    PermDataError,
    /// Drive-to-drive connection error.
    RemoteConnectionError,
    /// Drive is full.
    NoSpace,
    /// Identity has no HMAC algorithm configured.
    NoSuchHmacAlgorithm,
    /// Request was malformed.
    InvalidRequest,
    /// Nested P2P operation failures.
    NestedOperationErrors,
    /// Drive is locked.
    DeviceLocked,
    /// Unlock of an unlocked drive.
    DeviceAlreadyUnlocked,
    /// Drive terminated the connection.
    ConnectionTerminated,
    /// Batch constraints violated.
    InvalidBatch,
}

/// Status section present on responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandStatus {
    /// Result code.
    pub code: Option<StatusCode>,

    /// Short human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Drive-specific detail bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed: Option<Vec<u8>>,
}

/// The inner command: header, optional body, optional status.
///
/// This is the unit the HMAC covers — [`Command::encode`] produces exactly
/// the bytes that are length-prefixed and MACed, and that the envelope
/// carries opaquely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Identification and sequencing fields.
    pub header: CommandHeader,

    /// Operation sections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Body>,

    /// Result (responses only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CommandStatus>,
}

impl Command {
    /// A fresh request command of the given type with an empty body.
    #[must_use]
    pub fn request(message_type: MessageType) -> Self {
        Self { header: CommandHeader::request(message_type), body: None, status: None }
    }

    /// Serialize to CBOR bytes (the exact bytes the HMAC covers).
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::CborEncode`] if serialization fails
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(self, &mut buf)
            .map_err(|e| ProtocolError::CborEncode(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::CborDecode`] if the bytes are not a valid command
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::CborDecode(e.to_string()))
    }

    /// Drive-reported status code, if this command carries one.
    #[must_use]
    pub fn status_code(&self) -> Option<StatusCode> {
        self.status.as_ref().and_then(|s| s.code)
    }

    /// Key-value section, if present.
    #[must_use]
    pub fn key_value(&self) -> Option<&KeyValue> {
        self.body.as_ref().and_then(|b| b.key_value.as_ref())
    }

    /// Key-range section, if present.
    #[must_use]
    pub fn range(&self) -> Option<&Range> {
        self.body.as_ref().and_then(|b| b.range.as_ref())
    }

    /// Get-log section, if present.
    #[must_use]
    pub fn get_log(&self) -> Option<&GetLog> {
        self.body.as_ref().and_then(|b| b.get_log.as_ref())
    }
}
