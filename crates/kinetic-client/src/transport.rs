//! Pluggable byte transport under the message bus.
//!
//! The engine only requires an ordered byte stream: [`Conduit`] is any
//! `AsyncRead + AsyncWrite` object, and a [`Connector`] produces one for a
//! host/port pair. Production uses [`TcpConnector`]; a TLS stream or an
//! in-memory duplex (tests) substitutes without the layers above noticing.

use std::io;

use async_trait::async_trait;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};

/// Byte stream the session engine drives.
///
/// Blanket-implemented for every `AsyncRead + AsyncWrite` stream, so TCP,
/// TLS, and test duplexes all qualify.
pub trait Conduit: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Conduit for T {}

/// Establishes the byte stream for a session.
///
/// This is the injection seam for tests and for TLS: the session never opens
/// sockets itself.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect to `host:port` and return the stream.
    async fn connect(&self, host: &str, port: u16) -> io::Result<Box<dyn Conduit>>;
}

/// Plain TCP connector.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, host: &str, port: u16) -> io::Result<Box<dyn Conduit>> {
        let stream = TcpStream::connect((host, port)).await?;
        // Frames are small and latency-sensitive; don't batch them.
        stream.set_nodelay(true)?;
        Ok(Box::new(stream))
    }
}
