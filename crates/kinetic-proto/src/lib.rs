//! Wire types for the Kinetic object-storage protocol.
//!
//! A Kinetic PDU is three concatenated segments:
//!
//! ```text
//! [PduHeader: 9 bytes] + [message: command_length bytes] + [value: value_length bytes]
//! ```
//!
//! The header is raw big-endian binary so the receive loop can size its reads
//! without deserialization. The message segment is the CBOR-encoded
//! authentication envelope ([`Message`]) wrapping the serialized inner
//! [`Command`]; the value segment is opaque caller data.
//!
//! Authentication is HMAC-SHA1 over the length-prefixed inner command bytes,
//! keyed with the session secret (see [`hmac_auth`]).

pub mod command;
pub mod errors;
pub mod frame;
pub mod header;
pub mod hmac_auth;
pub mod message;

pub use command::{
    Acl, AclScope, Algorithm, Body, Command, CommandHeader, CommandStatus, GetLog, KeyValue,
    LogType, MessageType, Permission, PinOp, PinOpKind, Priority, Range, Security, Setup,
    StatusCode, Synchronization,
};
pub use errors::{ProtocolError, Result};
pub use frame::Frame;
pub use header::PduHeader;
pub use message::{Auth, Message};
