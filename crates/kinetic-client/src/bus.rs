//! Message bus: socket ownership after connect.
//!
//! The bus owns the split transport. Writes go through a shared async mutex
//! so the header, command, and value segments of a frame land contiguously on
//! the wire; the read half is owned exclusively by a dedicated receive task.
//!
//! The receive task reads one frame at a time (header, then two exact-size
//! segment reads), validates the HMAC, and correlates the response to its
//! pending operation by `ack_sequence`. The drive's first message is
//! unsolicited: a `Status` with no `ack_sequence` carrying the drive-assigned
//! connection ID; it signals the connection-ready waiter.
//!
//! Failure policy (per frame vs. per session):
//! - Undecodable envelope or command, HMAC failure, unknown `ack_sequence`:
//!   frame-level. The stream stays byte-synchronized (segment lengths were
//!   valid), so the affected operation resolves or the frame is dropped, and
//!   the session continues.
//! - Socket error or malformed header: session-level. Every registered
//!   operation fails with `ConnectionError` and no further submissions are
//!   accepted.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicI64, Ordering},
    },
};

use bytes::Bytes;
use kinetic_proto::{Command, Frame, Message, MessageType, PduHeader};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf},
    sync::Mutex,
};
use tracing::{debug, trace, warn};

use crate::{
    error::{KineticError, status_to_result},
    operation::Response,
    registry::OperationRegistry,
    transport::Conduit,
    waiter::ReadyWaiter,
};

/// Write half of the transport, shared between submitters.
pub(crate) type SharedWriter = Arc<Mutex<WriteHalf<Box<dyn Conduit>>>>;

/// State shared between submitters, the receive task, and the sweeper.
pub(crate) struct BusShared {
    /// Outstanding operations keyed by sequence.
    pub registry: OperationRegistry,

    /// Signaled when the drive's first-contact status arrives.
    pub ready: ReadyWaiter,

    /// Drive-assigned connection ID, stamped into every subsequent command.
    pub connection_id: AtomicI64,

    /// Session secret for response HMAC validation.
    pub hmac_key: Bytes,

    /// Set on session-fatal receive errors; no further submissions.
    pub failed: AtomicBool,
}

impl BusShared {
    pub(crate) fn new(capacity: usize, hmac_key: Bytes) -> Self {
        Self {
            registry: OperationRegistry::new(capacity),
            ready: ReadyWaiter::new(),
            connection_id: AtomicI64::new(0),
            hmac_key,
            failed: AtomicBool::new(false),
        }
    }

    pub(crate) fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }
}

/// Write one frame's three segments. Callers hold the send lock, which also
/// covers sequence assignment, so wire order equals sequence order.
pub(crate) async fn write_segments(
    writer: &mut WriteHalf<Box<dyn Conduit>>,
    frame: &Frame,
) -> io::Result<()> {
    let mut buf = Vec::with_capacity(frame.encoded_len());
    frame.encode(&mut buf);
    writer.write_all(&buf).await?;
    writer.flush().await
}

/// Fail every registered operation and refuse future submissions.
pub(crate) fn fail_all(shared: &BusShared) {
    shared.failed.store(true, Ordering::SeqCst);
    shared.registry.close();

    for (sequence, pending) in shared.registry.drain() {
        trace!(sequence, "failing operation on dead connection");
        pending.completion.resolve(Err(KineticError::ConnectionError));
    }

    // Wake anyone parked on the ready gate; they observe the failed flag.
    shared.ready.signal();
}

/// Receive loop: one task per connected session, sole owner of the read half.
pub(crate) async fn run_receive_loop(
    mut reader: ReadHalf<Box<dyn Conduit>>,
    shared: Arc<BusShared>,
) {
    loop {
        match read_frame(&mut reader).await {
            Ok((command_segment, value)) => dispatch(&shared, &command_segment, value),
            Err(err) => {
                debug!(error = %err, "receive loop terminating");
                fail_all(&shared);
                return;
            },
        }
    }
}

/// Read one frame off the socket: header, then two exact-size segment reads.
/// The value buffer is allocated here, sized exactly to the header's value
/// length, and handed to the resolved operation.
async fn read_frame(
    reader: &mut ReadHalf<Box<dyn Conduit>>,
) -> Result<(Bytes, Bytes), KineticError> {
    let mut header_bytes = [0u8; PduHeader::SIZE];
    reader.read_exact(&mut header_bytes).await?;
    let header = PduHeader::from_bytes(&header_bytes)?;

    let mut command_segment = vec![0u8; header.command_length() as usize];
    reader.read_exact(&mut command_segment).await?;

    let mut value = vec![0u8; header.value_length() as usize];
    if !value.is_empty() {
        reader.read_exact(&mut value).await?;
    }

    Ok((command_segment.into(), value.into()))
}

/// Hand one received frame to its destination: the ready waiter for the
/// unsolicited first-contact status, or the pending operation matching its
/// `ack_sequence`.
fn dispatch(shared: &BusShared, command_segment: &Bytes, value: Bytes) {
    let message = match Message::decode(command_segment) {
        Ok(message) => message,
        Err(err) => {
            warn!(error = %err, "dropping undecodable envelope");
            return;
        },
    };

    let hmac_ok = message.hmac_valid(&shared.hmac_key);

    let command = match Command::decode(&message.command_bytes) {
        Ok(command) => command,
        Err(err) => {
            warn!(error = %err, "dropping undecodable command");
            return;
        },
    };

    match command.header.ack_sequence {
        None => handle_unsolicited(shared, &command, hmac_ok),
        Some(ack_sequence) => {
            let Some(pending) = shared.registry.complete(ack_sequence) else {
                debug!(ack_sequence, "dropping response for unknown or expired sequence");
                return;
            };

            let result = if hmac_ok {
                match command.status_code() {
                    Some(code) => {
                        status_to_result(code).map(|()| Response { command, value })
                    },
                    None => Err(KineticError::Invalid),
                }
            } else {
                warn!(ack_sequence, "response failed hmac validation");
                Err(KineticError::HmacFailure)
            };

            pending.completion.resolve(result);
        },
    }
}

fn handle_unsolicited(shared: &BusShared, command: &Command, hmac_ok: bool) {
    if !hmac_ok {
        warn!("dropping unsolicited message with bad hmac");
        return;
    }

    if command.header.message_type != MessageType::Status {
        warn!(message_type = ?command.header.message_type, "dropping unexpected unsolicited message");
        return;
    }

    let connection_id = command.header.connection_id;
    shared.connection_id.store(connection_id, Ordering::SeqCst);
    debug!(connection_id, "drive announced connection id");
    shared.ready.signal();
}
