//! Session lifecycle and the operation controller.
//!
//! A session is one long-lived conversation with one drive: a single TCP
//! stream carrying many concurrent logical operations. The controller assigns
//! sequence numbers, signs and frames each message, enforces the in-flight
//! bound, and correlates responses back to callers.
//!
//! # State Machine
//!
//! ```text
//! [Configured] --connect--> [Connecting] --ready signal--> [Ready]
//! [Connecting] --timeout / socket error--> [Failed]
//! [Ready] --fatal I/O--> [Failed]
//! [Ready] --destroy--> [Draining] --all ops resolved--> [Gone]
//! any state --destroy--> [Gone]
//! ```
//!
//! Transitions are one-way. `destroy` is legal from every state and
//! idempotent; from `Ready` it waits up to [`SHUTDOWN_TIMEOUT`] for
//! outstanding operations before force-failing the rest.
//!
//! # Ordering
//!
//! Sequence assignment and the socket write happen inside the same send-lock
//! critical section, so wire order equals sequence order. Responses are
//! matched by `ack_sequence` and may arrive in any order. Lock order on the
//! submit path is fixed: permit, then send lock, then registry insert; the
//! receive task never takes the send lock.

use std::sync::{
    Arc, Mutex as StdMutex, PoisonError,
    atomic::{AtomicU64, Ordering},
};
use std::time::Duration;

use bytes::Bytes;
use kinetic_proto::{Frame, Message};
use tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::{self, Instant},
};
use tracing::{debug, trace, warn};

use crate::{
    builder::{self, Entry, KeyRangeQuery},
    bus::{self, BusShared, SharedWriter},
    config::SessionConfig,
    error::{KineticError, Result},
    operation::{AuthScheme, Completion, Operation, Response},
    registry::Pending,
    transport::Connector,
};

/// Bound on concurrently outstanding operations per session.
pub const MAX_OUTSTANDING: usize = 64;

/// How long to wait for the drive's first-contact status after TCP connect.
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// How long `destroy` waits for outstanding operations before force-failing
/// the remainder.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout sweeper granularity.
const SWEEP_INTERVAL: Duration = Duration::from_millis(250);

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created and validated, not yet connected.
    Configured,
    /// TCP established, waiting for the drive's first-contact status.
    Connecting,
    /// Drive announced its connection ID; operations flow.
    Ready,
    /// Destroy in progress, waiting for outstanding operations.
    Draining,
    /// Fatal error; no further submissions.
    Failed,
    /// Destroyed. Terminal.
    Gone,
}

/// Connection innards that exist only between connect and destroy.
struct Link {
    writer: SharedWriter,
    recv_task: JoinHandle<()>,
    sweep_task: JoinHandle<()>,
}

/// One session with one drive.
///
/// Thread-safe: submissions may come from any number of tasks concurrently.
/// Completion closures run on the receive task and must not block.
pub struct Session {
    config: SessionConfig,
    state: StdMutex<SessionState>,
    sequence: AtomicU64,
    shared: Arc<BusShared>,
    link: StdMutex<Option<Link>>,
}

impl Session {
    /// Create a detached session from a validated configuration.
    ///
    /// # Errors
    ///
    /// - [`KineticError::SessionEmpty`] if the host or HMAC key is missing
    pub fn create(config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let shared = Arc::new(BusShared::new(MAX_OUTSTANDING, config.hmac_key.clone()));
        Ok(Self {
            config,
            state: StdMutex::new(SessionState::Configured),
            sequence: AtomicU64::new(0),
            shared,
            link: StdMutex::new(None),
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        let state = *lock(&self.state);
        if matches!(state, SessionState::Connecting | SessionState::Ready)
            && self.shared.has_failed()
        {
            return SessionState::Failed;
        }
        state
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Drive-assigned connection ID (0 before the drive announces one).
    pub fn connection_id(&self) -> i64 {
        self.shared.connection_id.load(Ordering::SeqCst)
    }

    /// Number of operations currently awaiting resolution.
    pub fn outstanding(&self) -> usize {
        self.shared.registry.len()
    }

    /// Connect to the drive and wait for its first-contact status.
    ///
    /// Spawns the receive task and the timeout sweeper, then blocks up to
    /// [`CONNECTION_TIMEOUT`] for the unsolicited status message that carries
    /// the drive-assigned connection ID.
    ///
    /// # Errors
    ///
    /// - [`KineticError::ConnectionError`] if the session is not in
    ///   `Configured`, the transport fails, or the drive never announces
    ///   itself
    pub async fn connect(&self, connector: &dyn Connector) -> Result<()> {
        {
            let mut state = lock(&self.state);
            if *state != SessionState::Configured {
                return Err(KineticError::ConnectionError);
            }
            *state = SessionState::Connecting;
        }

        let stream = match connector.connect(&self.config.host, self.config.port).await {
            Ok(stream) => stream,
            Err(err) => {
                warn!(host = %self.config.host, port = self.config.port, error = %err,
                    "transport connect failed");
                *lock(&self.state) = SessionState::Failed;
                return Err(KineticError::ConnectionError);
            },
        };

        let (reader, writer) = tokio::io::split(stream);
        let writer: SharedWriter = Arc::new(tokio::sync::Mutex::new(writer));

        let recv_task = tokio::spawn(bus::run_receive_loop(reader, Arc::clone(&self.shared)));
        let sweep_task = tokio::spawn(run_sweeper(Arc::clone(&self.shared)));

        *lock(&self.link) = Some(Link { writer, recv_task, sweep_task });

        let announced = self.shared.ready.wait(CONNECTION_TIMEOUT).await;
        if !announced || self.shared.has_failed() {
            warn!(host = %self.config.host, "drive never announced a connection id");
            self.teardown_link();
            let mut state = lock(&self.state);
            if *state == SessionState::Connecting {
                *state = SessionState::Failed;
            }
            return Err(KineticError::ConnectionError);
        }

        {
            // A concurrent destroy may have won; don't resurrect the session.
            let mut state = lock(&self.state);
            if *state != SessionState::Connecting {
                return Err(KineticError::ConnectionError);
            }
            *state = SessionState::Ready;
        }
        debug!(host = %self.config.host, connection_id = self.connection_id(), "session ready");
        Ok(())
    }

    /// Execute an operation, blocking until it resolves.
    ///
    /// Resolution comes from the receive task (response arrived), the sweeper
    /// (deadline passed), or teardown (session died); exactly one of them
    /// fires per operation.
    pub async fn execute(&self, operation: Operation) -> Result<Response> {
        let (gate, resolved) = oneshot::channel();
        self.submit(operation, Completion::Gate(gate)).await?;

        match resolved.await {
            Ok(result) => result,
            // The pending entry was dropped without resolving; only teardown
            // paths can do that.
            Err(_) => Err(KineticError::ConnectionError),
        }
    }

    /// Execute an operation, delivering the result to `callback` instead of
    /// blocking. Returns once the frame is on the wire.
    ///
    /// The callback runs on the receive task: hand off anything that blocks.
    pub async fn execute_with_callback(
        &self,
        operation: Operation,
        callback: impl FnOnce(Result<Response>) + Send + 'static,
    ) -> Result<()> {
        self.submit(operation, Completion::Callback(Box::new(callback))).await
    }

    /// Submission path: gates, permit, send critical section, registration.
    async fn submit(&self, operation: Operation, completion: Completion) -> Result<()> {
        // Admin gate: rejected before anything touches the socket.
        if operation.requires_ssl && !self.config.use_ssl {
            return Err(KineticError::SslRequired);
        }

        self.await_ready().await?;

        let timeout = operation.timeout.unwrap_or(self.config.operation_timeout);
        let permit = self.shared.registry.acquire(timeout).await?;

        let writer = {
            let link = lock(&self.link);
            match link.as_ref() {
                Some(link) => Arc::clone(&link.writer),
                None => return Err(KineticError::ConnectionError),
            }
        };

        // Send critical section: sequence assignment, registration, and the
        // write share one lock so wire order equals sequence order and a
        // response can never beat its registration.
        let mut writer = writer.lock().await;
        if self.shared.has_failed()
            || matches!(
                *lock(&self.state),
                SessionState::Draining | SessionState::Failed | SessionState::Gone
            )
        {
            return Err(KineticError::ConnectionError);
        }

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);

        let mut command = operation.command;
        command.header.cluster_version = self.config.cluster_version;
        command.header.connection_id = self.shared.connection_id.load(Ordering::SeqCst);
        command.header.sequence = sequence;
        command.header.timeout_ms = Some(timeout.as_millis() as u64);

        let command_bytes = command.encode().map_err(KineticError::from)?;
        let message = match operation.auth {
            AuthScheme::Hmac => Message::hmac_signed(
                self.config.identity,
                &self.config.hmac_key,
                command_bytes,
            )?,
            AuthScheme::Pin(pin) => Message::pin_authenticated(pin, command_bytes),
        };
        let frame = Frame::new(message.encode()?, operation.value)?;

        let deadline = Instant::now() + timeout;
        self.shared.registry.register(sequence, Pending::new(completion, deadline, permit));
        trace!(sequence, message_type = ?command.header.message_type, "sending request");

        if let Err(err) = bus::write_segments(&mut writer, &frame).await {
            warn!(sequence, error = %err, "socket write failed");
            drop(writer);
            // Take the registration back so the caller sees exactly one
            // failure, then fail the session: the stream is broken mid-frame.
            let pending = self.shared.registry.complete(sequence);
            bus::fail_all(&self.shared);
            drop(pending);
            return Err(KineticError::ConnectionError);
        }

        Ok(())
    }

    /// Queue-while-connecting gate: `Ready` passes, `Connecting` parks on the
    /// ready waiter up to [`CONNECTION_TIMEOUT`], everything else refuses.
    async fn await_ready(&self) -> Result<()> {
        let state = self.state();
        match state {
            SessionState::Ready => Ok(()),
            SessionState::Connecting => {
                let announced = self.shared.ready.wait(CONNECTION_TIMEOUT).await;
                if announced && !self.shared.has_failed() {
                    Ok(())
                } else {
                    Err(KineticError::ConnectionError)
                }
            },
            SessionState::Configured
            | SessionState::Draining
            | SessionState::Failed
            | SessionState::Gone => Err(KineticError::ConnectionError),
        }
    }

    /// Destroy the session. Legal from every state; idempotent.
    ///
    /// From `Ready`, drains outstanding operations for up to
    /// [`SHUTDOWN_TIMEOUT`], then force-fails the remainder with
    /// `ConnectionError`. Releases the socket, the registry, and the task
    /// handles.
    pub async fn destroy(&self) {
        {
            let mut state = lock(&self.state);
            match *state {
                SessionState::Gone => return,
                SessionState::Ready => *state = SessionState::Draining,
                _ => {},
            }
        }

        let deadline = Instant::now() + SHUTDOWN_TIMEOUT;
        while !self.shared.registry.is_empty() && Instant::now() < deadline {
            time::sleep(Duration::from_millis(50)).await;
        }

        self.shared.registry.close();
        let remainder = self.shared.registry.drain();
        if !remainder.is_empty() {
            warn!(count = remainder.len(), "force-failing operations at shutdown");
        }
        for (_, pending) in remainder {
            pending.completion.resolve(Err(KineticError::ConnectionError));
        }

        self.teardown_link();
        *lock(&self.state) = SessionState::Gone;
        debug!(host = %self.config.host, "session destroyed");
    }

    /// Abort the receive and sweeper tasks and drop the socket halves.
    fn teardown_link(&self) {
        if let Some(link) = lock(&self.link).take() {
            link.recv_task.abort();
            link.sweep_task.abort();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Safety net for sessions dropped without destroy: stop the tasks and
        // fail anything still registered.
        self.teardown_link();
        self.shared.registry.close();
        for (_, pending) in self.shared.registry.drain() {
            pending.completion.resolve(Err(KineticError::ConnectionError));
        }
    }
}

/// Data-path convenience wrappers: one builder call plus execute.
impl Session {
    /// Liveness probe.
    pub async fn noop(&self) -> Result<()> {
        self.execute(builder::noop()).await.map(drop)
    }

    /// Store `value` under `entry.key`.
    pub async fn put(&self, entry: &Entry, value: Bytes) -> Result<()> {
        self.execute(builder::put(entry, value)).await.map(drop)
    }

    /// Read the entry stored under `key`, value included.
    pub async fn get(&self, key: impl Into<Bytes>) -> Result<Response> {
        self.execute(builder::get(key.into(), false)).await
    }

    /// Read only version and tag for `key`; the response carries no value.
    pub async fn get_metadata(&self, key: impl Into<Bytes>) -> Result<Response> {
        self.execute(builder::get(key.into(), true)).await
    }

    /// Delete the entry stored under `entry.key`.
    pub async fn delete(&self, entry: &Entry) -> Result<()> {
        self.execute(builder::delete(entry)).await.map(drop)
    }

    /// Enumerate keys within a range.
    pub async fn get_key_range(&self, query: &KeyRangeQuery) -> Result<Vec<Vec<u8>>> {
        let response = self.execute(builder::get_key_range(query)).await?;
        Ok(response.range_keys().to_vec())
    }
}

fn lock<T>(mutex: &StdMutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Periodically expire operations whose deadline has passed.
///
/// Runs until aborted at teardown. A response arriving after expiry finds no
/// registration and is dropped by the dispatcher.
async fn run_sweeper(shared: Arc<BusShared>) {
    let mut tick = time::interval(SWEEP_INTERVAL);
    tick.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
        tick.tick().await;
        for (sequence, pending) in shared.registry.take_expired(Instant::now()) {
            debug!(sequence, "operation timed out");
            pending.completion.resolve(Err(KineticError::OperationTimedOut));
        }
    }
}
