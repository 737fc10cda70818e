//! Session-level request/response engine for the Kinetic protocol.
//!
//! Multiplexes many concurrent logical operations over a single TCP (or TLS)
//! stream to an object-storage drive: per-session monotonic sequence numbers,
//! HMAC-SHA1 message authentication, a bounded pool of in-flight operations
//! with back-pressure, response correlation by `ack_sequence`, and timeouts.
//!
//! # Architecture
//!
//! ```text
//! Session (controller)
//!   ├─ builder:    typed command constructors
//!   ├─ registry:   sequence → pending operation, bounded by a semaphore
//!   ├─ bus:        send lock + dedicated receive task on the split transport
//!   ├─ waiter:     one-shot drive-ready gate (first-contact status)
//!   └─ sweeper:    periodic timeout expiry
//! ```
//!
//! # Example
//!
//! ```no_run
//! use kinetic_client::{builder::Entry, Session, SessionConfig, TcpConnector};
//!
//! # async fn example() -> kinetic_client::Result<()> {
//! let config = SessionConfig::new("drive.local", 8123, 1, b"asdfasdf".as_slice());
//! let session = Session::create(config)?;
//! session.connect(&TcpConnector).await?;
//!
//! let entry = Entry {
//!     key: bytes::Bytes::from_static(b"object-001"),
//!     new_version: Some(bytes::Bytes::from_static(b"v1")),
//!     force: true,
//!     ..Entry::default()
//! };
//! session.put(&entry, bytes::Bytes::from_static(b"hello")).await?;
//!
//! let response = session.get("object-001".as_bytes().to_vec()).await?;
//! assert_eq!(response.value.as_ref(), b"hello");
//!
//! session.destroy().await;
//! # Ok(())
//! # }
//! ```

pub mod acl;
mod admin;
pub mod builder;
mod bus;
pub mod config;
pub mod error;
pub mod operation;
mod registry;
pub mod session;
pub mod transport;
mod waiter;

pub use builder::{Entry, KeyRangeQuery};
pub use config::{DEFAULT_OPERATION_TIMEOUT, SessionConfig};
pub use error::{KineticError, Result};
pub use operation::{CompletionCallback, Operation, Response};
pub use session::{
    CONNECTION_TIMEOUT, MAX_OUTSTANDING, SHUTDOWN_TIMEOUT, Session, SessionState,
};
pub use transport::{Conduit, Connector, TcpConnector};
