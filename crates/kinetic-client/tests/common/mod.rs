//! In-process fake drive speaking the Kinetic wire protocol over a duplex
//! stream.
//!
//! The drive announces itself with the unsolicited status message, then
//! serves put/get/delete/range/admin requests from an in-memory store. Knobs:
//! stall mode parks responses until released (back-pressure and timeout
//! scenarios), and tamper mode flips a bit in every signed response (HMAC
//! scenarios).

use std::{
    collections::HashMap,
    io,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use bytes::Bytes;
use kinetic_client::{Conduit, Connector};
use kinetic_proto::{
    Body, Command, CommandStatus, Frame, KeyValue, Message, MessageType, PduHeader, PinOpKind,
    Range, StatusCode,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, DuplexStream},
    sync::mpsc,
};

/// Session secret shared with the fake drive.
pub const KEY: &[u8] = b"asdfasdf";

/// Connection ID the drive announces on first contact.
pub const CONNECTION_ID: i64 = 42;

/// Behavior switches for a spawned drive.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriveOptions {
    /// Park responses until released instead of answering immediately.
    pub stall: bool,
    /// Flip one bit in every response's MACed command bytes.
    pub tamper_hmac: bool,
    /// Skip the first-contact status announcement entirely.
    pub silent: bool,
    /// Cluster version the drive enforces.
    pub cluster_version: i64,
}

/// Release instruction for a stalled drive.
#[derive(Debug, Clone, Copy)]
pub enum Release {
    /// Send the parked response for one sequence.
    One(u64),
    /// Send every parked response.
    All,
}

/// Test-side handle onto a spawned drive.
pub struct DriveHandle {
    /// Number of request frames the drive has read.
    pub frames_seen: Arc<AtomicUsize>,
    /// Request sequence numbers in arrival order.
    pub sequences: Arc<Mutex<Vec<u64>>>,
    release_tx: mpsc::UnboundedSender<Release>,
}

impl DriveHandle {
    /// Release parked responses on a stalled drive.
    pub fn release(&self, release: Release) {
        let _ = self.release_tx.send(release);
    }

    /// Request frames read so far.
    pub fn frames(&self) -> usize {
        self.frames_seen.load(Ordering::SeqCst)
    }
}

/// Connector handing out the client half of the drive's duplex stream.
pub struct DriveConnector {
    stream: Mutex<Option<DuplexStream>>,
}

#[async_trait]
impl Connector for DriveConnector {
    async fn connect(&self, _host: &str, _port: u16) -> io::Result<Box<dyn Conduit>> {
        let mut slot = self.stream.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        slot.take()
            .map(|stream| Box::new(stream) as Box<dyn Conduit>)
            .ok_or_else(|| io::Error::other("drive already connected"))
    }
}

struct Stored {
    value: Vec<u8>,
    version: Vec<u8>,
    tag: Vec<u8>,
}

/// Spawn a fake drive; returns the connector for the session plus the handle.
pub fn spawn_drive(options: DriveOptions) -> (DriveConnector, DriveHandle) {
    let (client_side, drive_side) = tokio::io::duplex(1 << 20);

    let frames_seen = Arc::new(AtomicUsize::new(0));
    let sequences = Arc::new(Mutex::new(Vec::new()));
    let (release_tx, mut release_rx) = mpsc::unbounded_channel::<Release>();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Vec<u8>>();

    let (mut drive_reader, mut drive_writer) = tokio::io::split(drive_side);

    // Writer task: the only task touching the drive's write half.
    tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if drive_writer.write_all(&frame).await.is_err() {
                return;
            }
        }
    });

    // Control task: moves parked responses to the writer on release.
    let stalled: Arc<Mutex<HashMap<u64, Vec<u8>>>> = Arc::new(Mutex::new(HashMap::new()));
    {
        let stalled = Arc::clone(&stalled);
        let out_tx = out_tx.clone();
        tokio::spawn(async move {
            while let Some(release) = release_rx.recv().await {
                let mut parked = stalled.lock().unwrap();
                match release {
                    Release::One(sequence) => {
                        if let Some(frame) = parked.remove(&sequence) {
                            drop(out_tx.send(frame));
                        }
                    },
                    Release::All => {
                        for (_, frame) in parked.drain() {
                            drop(out_tx.send(frame));
                        }
                    },
                }
            }
        });
    }

    // Reader task: serves requests from the in-memory store.
    {
        let frames_seen = Arc::clone(&frames_seen);
        let sequences = Arc::clone(&sequences);
        let stalled = Arc::clone(&stalled);
        tokio::spawn(async move {
            if !options.silent {
                let mut announce = Command::request(MessageType::Status);
                announce.header.connection_id = CONNECTION_ID;
                drop(out_tx.send(encode_response(&announce, &Bytes::new(), false)));
            }

            let mut store: HashMap<Vec<u8>, Stored> = HashMap::new();
            loop {
                let Ok((command, value)) = read_request(&mut drive_reader).await else {
                    return;
                };
                sequences
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .push(command.header.sequence);

                let (response, response_value) =
                    handle_request(&mut store, &command, &value, options.cluster_version);
                let frame = encode_response(&response, &response_value, options.tamper_hmac);

                if options.stall {
                    stalled
                        .lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner)
                        .insert(command.header.sequence, frame);
                } else {
                    drop(out_tx.send(frame));
                }

                // Count the frame only once its response is parked or sent,
                // so tests that observe the counter can release safely.
                frames_seen.fetch_add(1, Ordering::SeqCst);
            }
        });
    }

    (
        DriveConnector { stream: Mutex::new(Some(client_side)) },
        DriveHandle { frames_seen, sequences, release_tx },
    )
}

async fn read_request(
    reader: &mut tokio::io::ReadHalf<DuplexStream>,
) -> io::Result<(Command, Bytes)> {
    let mut header_bytes = [0u8; PduHeader::SIZE];
    reader.read_exact(&mut header_bytes).await?;
    let header = PduHeader::from_bytes(&header_bytes).map_err(io::Error::other)?;

    let mut command_segment = vec![0u8; header.command_length() as usize];
    reader.read_exact(&mut command_segment).await?;
    let mut value = vec![0u8; header.value_length() as usize];
    if !value.is_empty() {
        reader.read_exact(&mut value).await?;
    }

    let message = Message::decode(&command_segment).map_err(io::Error::other)?;
    let command = Command::decode(&message.command_bytes).map_err(io::Error::other)?;
    Ok((command, Bytes::from(value)))
}

fn encode_response(command: &Command, value: &Bytes, tamper: bool) -> Vec<u8> {
    let command_bytes = command.encode().expect("encode response command");
    let mut message = Message::hmac_signed(1, KEY, command_bytes).expect("sign response");
    if tamper {
        message.command_bytes[0] ^= 0x01;
    }
    let frame = Frame::new(message.encode().expect("encode envelope"), value.clone())
        .expect("response frame in bounds");
    let mut wire = Vec::new();
    frame.encode(&mut wire);
    wire
}

fn handle_request(
    store: &mut HashMap<Vec<u8>, Stored>,
    command: &Command,
    value: &Bytes,
    cluster_version: i64,
) -> (Command, Bytes) {
    let request_type = command.header.message_type;
    let mut response =
        Command::request(request_type.expected_response().unwrap_or(MessageType::Status));
    response.header.ack_sequence = Some(command.header.sequence);
    response.header.connection_id = CONNECTION_ID;

    let mut response_value = Bytes::new();

    let code = if command.header.cluster_version != cluster_version {
        StatusCode::VersionFailure
    } else {
        match request_type {
            MessageType::Noop | MessageType::GetLog | MessageType::Setup
            | MessageType::Security => StatusCode::Success,

            MessageType::Put => {
                let Some(kv) = command.key_value() else {
                    return finish(response, response_value, StatusCode::InvalidRequest);
                };
                let provided = kv.db_version.clone().unwrap_or_default();
                let stored_version = store.get(&kv.key).map(|s| s.version.clone());
                if !kv.force && stored_version.is_some_and(|v| v != provided) {
                    StatusCode::VersionMismatch
                } else {
                    store.insert(
                        kv.key.clone(),
                        Stored {
                            value: value.to_vec(),
                            version: kv.new_version.clone().unwrap_or_default(),
                            tag: kv.tag.clone().unwrap_or_default(),
                        },
                    );
                    StatusCode::Success
                }
            },

            MessageType::Get => {
                let Some(kv) = command.key_value() else {
                    return finish(response, response_value, StatusCode::InvalidRequest);
                };
                match store.get(&kv.key) {
                    None => StatusCode::NotFound,
                    Some(stored) => {
                        response.body = Some(Body {
                            key_value: Some(KeyValue {
                                key: kv.key.clone(),
                                db_version: Some(stored.version.clone()),
                                tag: Some(stored.tag.clone()),
                                metadata_only: kv.metadata_only,
                                ..KeyValue::default()
                            }),
                            ..Body::default()
                        });
                        if !kv.metadata_only {
                            response_value = Bytes::from(stored.value.clone());
                        }
                        StatusCode::Success
                    },
                }
            },

            MessageType::Delete => {
                let Some(kv) = command.key_value() else {
                    return finish(response, response_value, StatusCode::InvalidRequest);
                };
                let provided = kv.db_version.clone().unwrap_or_default();
                match store.get(&kv.key) {
                    None => StatusCode::NotFound,
                    Some(stored) if !kv.force && stored.version != provided => {
                        StatusCode::VersionMismatch
                    },
                    Some(_) => {
                        store.remove(&kv.key);
                        StatusCode::Success
                    },
                }
            },

            MessageType::GetKeyRange => {
                let Some(range) = command.range() else {
                    return finish(response, response_value, StatusCode::InvalidRequest);
                };
                let mut keys: Vec<Vec<u8>> = store
                    .keys()
                    .filter(|key| {
                        let after_start = match key.as_slice().cmp(&range.start_key[..]) {
                            std::cmp::Ordering::Greater => true,
                            std::cmp::Ordering::Equal => range.start_inclusive,
                            std::cmp::Ordering::Less => false,
                        };
                        let before_end = match key.as_slice().cmp(&range.end_key[..]) {
                            std::cmp::Ordering::Less => true,
                            std::cmp::Ordering::Equal => range.end_inclusive,
                            std::cmp::Ordering::Greater => false,
                        };
                        after_start && before_end
                    })
                    .cloned()
                    .collect();
                keys.sort();
                if range.reverse {
                    keys.reverse();
                }
                keys.truncate(range.max_returned as usize);

                response.body = Some(Body {
                    range: Some(Range { keys, ..range.clone() }),
                    ..Body::default()
                });
                StatusCode::Success
            },

            MessageType::PinOp => {
                let kind = command.body.as_ref().and_then(|b| b.pin_op).map(|p| p.kind);
                if matches!(kind, Some(PinOpKind::Erase | PinOpKind::SecureErase)) {
                    store.clear();
                }
                StatusCode::Success
            },

            _ => StatusCode::InvalidRequest,
        }
    };

    finish(response, response_value, code)
}

fn finish(mut response: Command, value: Bytes, code: StatusCode) -> (Command, Bytes) {
    response.status = Some(CommandStatus { code: Some(code), message: None, detailed: None });
    (response, value)
}
