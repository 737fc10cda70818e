//! Typed command builders.
//!
//! One constructor per operation kind. Builders populate the command body and
//! mark wire requirements (authentication scheme, TLS); the session stamps
//! identity, sequencing, and fencing fields at send time.
//!
//! Local input validation happens here: PIN presence/consistency, log-type
//! checks, and file loading for firmware images. A builder error means the
//! socket was never touched.

use std::path::Path;

use bytes::Bytes;
use kinetic_proto::{
    Acl, Algorithm, Body, Command, GetLog, KeyValue, LogType, MessageType, PinOp, PinOpKind,
    Range, Security, Setup, Synchronization,
};
use tracing::debug;

use crate::{
    error::{KineticError, Result},
    operation::{AuthScheme, Operation},
};

/// Key-value metadata for put/get/delete.
#[derive(Debug, Clone, Default)]
pub struct Entry {
    /// Entry key.
    pub key: Bytes,

    /// Stored version the caller expects (compare-and-set guard).
    pub db_version: Option<Bytes>,

    /// Version to store with a put.
    pub new_version: Option<Bytes>,

    /// Caller-computed integrity tag.
    pub tag: Option<Bytes>,

    /// Algorithm the tag was computed with.
    pub algorithm: Option<Algorithm>,

    /// Persistence mode for writes.
    pub synchronization: Synchronization,

    /// Skip the drive's version check.
    pub force: bool,
}

/// Parameters for a key-range enumeration.
#[derive(Debug, Clone, Default)]
pub struct KeyRangeQuery {
    /// First key of the range.
    pub start_key: Bytes,

    /// Last key of the range.
    pub end_key: Bytes,

    /// Include `start_key` itself.
    pub start_inclusive: bool,

    /// Include `end_key` itself.
    pub end_inclusive: bool,

    /// Cap on the number of keys returned.
    pub max_returned: u32,

    /// Enumerate from `end_key` backwards.
    pub reverse: bool,
}

fn with_body(message_type: MessageType, body: Body) -> Operation {
    let mut command = Command::request(message_type);
    command.body = Some(body);
    Operation::new(command)
}

/// A PIN argument: `None` means no PIN is set on the drive; `Some` must carry
/// bytes. A claimed-but-empty PIN is the inconsistent case and fails with
/// [`KineticError::MissingPin`].
fn pin_bytes(pin: Option<&Bytes>) -> Result<Vec<u8>> {
    match pin {
        None => Ok(Vec::new()),
        Some(p) if p.is_empty() => Err(KineticError::MissingPin),
        Some(p) => Ok(p.to_vec()),
    }
}

/// Liveness probe.
#[must_use]
pub fn noop() -> Operation {
    Operation::new(Command::request(MessageType::Noop))
}

/// Store `value` under `entry.key`.
///
/// With `entry.force` set, the caller's `db_version` is ignored and no
/// version check happens at the drive; otherwise a stored-version mismatch
/// comes back as [`KineticError::VersionMismatch`].
#[must_use]
pub fn put(entry: &Entry, value: Bytes) -> Operation {
    let key_value = KeyValue {
        key: entry.key.to_vec(),
        db_version: if entry.force { None } else { entry.db_version.as_ref().map(|v| v.to_vec()) },
        new_version: entry.new_version.as_ref().map(|v| v.to_vec()),
        tag: entry.tag.as_ref().map(|v| v.to_vec()),
        algorithm: entry.algorithm,
        synchronization: entry.synchronization,
        force: entry.force,
        metadata_only: false,
    };

    let mut operation = with_body(MessageType::Put, Body { key_value: Some(key_value), ..Body::default() });
    operation.value = value;
    operation
}

/// Read the entry stored under `key`.
///
/// With `metadata_only`, the drive returns version and tag but no value
/// segment, and no receive value buffer is expected.
#[must_use]
pub fn get(key: Bytes, metadata_only: bool) -> Operation {
    let key_value = KeyValue { key: key.to_vec(), metadata_only, ..KeyValue::default() };
    with_body(MessageType::Get, Body { key_value: Some(key_value), ..Body::default() })
}

/// Delete the entry stored under `entry.key`, honoring the version guard
/// unless `entry.force` is set.
#[must_use]
pub fn delete(entry: &Entry) -> Operation {
    let key_value = KeyValue {
        key: entry.key.to_vec(),
        db_version: if entry.force { None } else { entry.db_version.as_ref().map(|v| v.to_vec()) },
        force: entry.force,
        synchronization: entry.synchronization,
        ..KeyValue::default()
    };
    with_body(MessageType::Delete, Body { key_value: Some(key_value), ..Body::default() })
}

/// Enumerate keys within a range.
#[must_use]
pub fn get_key_range(query: &KeyRangeQuery) -> Operation {
    let range = Range {
        start_key: query.start_key.to_vec(),
        end_key: query.end_key.to_vec(),
        start_inclusive: query.start_inclusive,
        end_inclusive: query.end_inclusive,
        max_returned: query.max_returned,
        reverse: query.reverse,
        keys: Vec::new(),
    };
    with_body(MessageType::GetKeyRange, Body { range: Some(range), ..Body::default() })
}

/// Read standard drive log sections.
///
/// # Errors
///
/// - [`KineticError::InvalidLogType`] for an empty selection or for
///   [`LogType::Device`] (use [`get_device_log`], which carries the vendor
///   log name and requires TLS)
pub fn get_log(types: &[LogType]) -> Result<Operation> {
    if types.is_empty() || types.contains(&LogType::Device) {
        return Err(KineticError::InvalidLogType);
    }

    let get_log = GetLog { types: types.to_vec(), device_name: None };
    Ok(with_body(MessageType::GetLog, Body { get_log: Some(get_log), ..Body::default() }))
}

/// Read a vendor-specific device log by name. TLS only.
#[must_use]
pub fn get_device_log(name: Bytes) -> Operation {
    let get_log = GetLog { types: vec![LogType::Device], device_name: Some(name.to_vec()) };
    let mut operation =
        with_body(MessageType::GetLog, Body { get_log: Some(get_log), ..Body::default() });
    operation.requires_ssl = true;
    operation
}

/// Erase all drive contents. `secure` selects a full overwrite over the
/// instant cryptographic discard. PIN-authenticated; TLS only.
///
/// # Errors
///
/// - [`KineticError::MissingPin`] if a PIN is claimed but empty
pub fn erase(secure: bool, pin: Option<&Bytes>) -> Result<Operation> {
    let pin = pin_bytes(pin)?;
    let kind = if secure { PinOpKind::SecureErase } else { PinOpKind::Erase };

    let mut operation =
        with_body(MessageType::PinOp, Body { pin_op: Some(PinOp { kind }), ..Body::default() });
    operation.auth = AuthScheme::Pin(pin);
    operation.requires_ssl = true;
    Ok(operation)
}

/// Lock or unlock the drive. PIN-authenticated; TLS only.
///
/// # Errors
///
/// - [`KineticError::MissingPin`] if a PIN is claimed but empty
pub fn lock(lock: bool, pin: Option<&Bytes>) -> Result<Operation> {
    let pin = pin_bytes(pin)?;
    let kind = if lock { PinOpKind::Lock } else { PinOpKind::Unlock };

    let mut operation =
        with_body(MessageType::PinOp, Body { pin_op: Some(PinOp { kind }), ..Body::default() });
    operation.auth = AuthScheme::Pin(pin);
    operation.requires_ssl = true;
    Ok(operation)
}

/// Change the drive's lock or erase PIN. TLS only.
///
/// # Errors
///
/// - [`KineticError::MissingPin`] if either PIN is claimed but empty
pub fn set_pin(old_pin: Option<&Bytes>, new_pin: Option<&Bytes>, lock: bool) -> Result<Operation> {
    let old_pin = pin_bytes(old_pin)?;
    let new_pin = pin_bytes(new_pin)?;

    let security = if lock {
        Security {
            old_lock_pin: Some(old_pin),
            new_lock_pin: Some(new_pin),
            ..Security::default()
        }
    } else {
        Security {
            old_erase_pin: Some(old_pin),
            new_erase_pin: Some(new_pin),
            ..Security::default()
        }
    };

    let mut operation =
        with_body(MessageType::Security, Body { security: Some(security), ..Body::default() });
    operation.requires_ssl = true;
    Ok(operation)
}

/// Install a new cluster version on the drive. TLS only.
#[must_use]
pub fn set_cluster_version(version: i64) -> Operation {
    let setup = Setup { new_cluster_version: Some(version), firmware_download: false };
    let mut operation =
        with_body(MessageType::Setup, Body { setup: Some(setup), ..Body::default() });
    operation.requires_ssl = true;
    operation
}

/// Install ACL definitions on the drive. TLS only.
///
/// The definitions are owned by the operation and dropped when it resolves.
#[must_use]
pub fn set_acl(acls: Vec<Acl>) -> Operation {
    let security = Security { acls, ..Security::default() };
    let mut operation =
        with_body(MessageType::Security, Body { security: Some(security), ..Body::default() });
    operation.requires_ssl = true;
    operation
}

/// Send a firmware image to the drive. The image travels as the value
/// segment. TLS only.
///
/// # Errors
///
/// - [`KineticError::InvalidRequest`] if the file cannot be read
pub fn update_firmware(path: &Path) -> Result<Operation> {
    let image = std::fs::read(path).map_err(|e| {
        debug!(path = %path.display(), error = %e, "firmware image unreadable");
        KineticError::InvalidRequest
    })?;

    let setup = Setup { new_cluster_version: None, firmware_download: true };
    let mut operation =
        with_body(MessageType::Setup, Body { setup: Some(setup), ..Body::default() });
    operation.value = Bytes::from(image);
    operation.requires_ssl = true;
    Ok(operation)
}
