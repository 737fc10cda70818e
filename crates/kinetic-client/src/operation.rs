//! Operation handle and completion plumbing.
//!
//! An [`Operation`] is allocated by the builder, registered at send, resolved
//! exactly once (at receive, on timeout, or at teardown), then released. The
//! blocking-gate and fire-and-forget-closure execution styles are unified
//! behind the internal [`Completion`] handle: the engine only ever calls
//! `resolve(result)`.

use std::time::Duration;

use bytes::Bytes;
use kinetic_proto::{Command, KeyValue, MessageType, StatusCode};
use tokio::sync::oneshot;

use crate::error::Result;

/// A resolved operation's response: the decoded command plus the value
/// segment.
///
/// The value buffer is allocated by the receive task sized exactly to the
/// frame's value length, owned here, and freed when the response drops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Decoded inner command of the response.
    pub command: Command,

    /// Value segment (empty for metadata-only and non-data responses).
    pub value: Bytes,
}

impl Response {
    /// Key-value section of the response, if present.
    #[must_use]
    pub fn key_value(&self) -> Option<&KeyValue> {
        self.command.key_value()
    }

    /// Keys returned by a key-range response (empty otherwise).
    #[must_use]
    pub fn range_keys(&self) -> &[Vec<u8>] {
        self.command.range().map_or(&[], |r| r.keys.as_slice())
    }

    /// Drive-reported status code.
    #[must_use]
    pub fn status_code(&self) -> Option<StatusCode> {
        self.command.status_code()
    }
}

/// How an operation authenticates its message on the wire.
#[derive(Debug, Clone)]
pub(crate) enum AuthScheme {
    /// HMAC under the session secret (the normal case).
    Hmac,
    /// Bare PIN envelope (erase and lock/unlock operations).
    Pin(Vec<u8>),
}

/// A unit of work against the drive.
///
/// Built by [`crate::builder`]; identity, sequencing, and fencing fields are
/// stamped into the command by the session at send time.
#[derive(Debug, Clone)]
pub struct Operation {
    pub(crate) command: Command,
    pub(crate) value: Bytes,
    pub(crate) auth: AuthScheme,
    pub(crate) requires_ssl: bool,
    pub(crate) timeout: Option<Duration>,
}

impl Operation {
    pub(crate) fn new(command: Command) -> Self {
        Self {
            command,
            value: Bytes::new(),
            auth: AuthScheme::Hmac,
            requires_ssl: false,
            timeout: None,
        }
    }

    /// The operation's message type.
    #[must_use]
    pub fn message_type(&self) -> MessageType {
        self.command.header.message_type
    }

    /// True if this operation must travel over TLS.
    #[must_use]
    pub fn requires_ssl(&self) -> bool {
        self.requires_ssl
    }

    /// Override the session's default deadline for this operation.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Closure invoked on the receive task when a callback operation resolves.
///
/// Must not block: it runs on the session's receive loop.
pub type CompletionCallback = Box<dyn FnOnce(Result<Response>) + Send + 'static>;

/// The two concrete completion styles behind one `resolve` surface.
///
/// Consuming `self` in [`Completion::resolve`] is what enforces the
/// at-most-one-resolution invariant.
pub(crate) enum Completion {
    /// Synchronous execute: wakes the parked caller.
    Gate(oneshot::Sender<Result<Response>>),
    /// Fire-and-forget: runs the caller's closure.
    Callback(CompletionCallback),
}

impl Completion {
    /// Deliver the terminal result. Exactly one call per operation.
    pub(crate) fn resolve(self, result: Result<Response>) {
        match self {
            // The caller may have given up (dropped the receiver); that is
            // its choice, not an error here.
            Self::Gate(gate) => drop(gate.send(result)),
            Self::Callback(callback) => callback(result),
        }
    }
}
