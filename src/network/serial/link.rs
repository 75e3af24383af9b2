//! Wireless link service
//!
//! The radio stack is an external collaborator. The transport only needs to
//! open byte streams: connect to a peer endpoint, or listen on a channel and
//! accept peers.

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};

use super::address::{Channel, HardwareAddress, SerialEndpoint};

/// A connected, bidirectional byte stream
pub trait LinkStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> LinkStream for T {}

pub type BoxedStream = Box<dyn LinkStream>;

/// Opens connections over some serial link technology
#[async_trait]
pub trait SerialLink: Send + Sync {
    /// Connect to `endpoint`
    async fn connect(&self, endpoint: SerialEndpoint) -> io::Result<BoxedStream>;

    /// Listen for inbound connections on `channel`
    async fn listen(&self, channel: Channel) -> io::Result<Box<dyn SerialListener>>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// A bound acceptor
#[async_trait]
pub trait SerialListener: Send {
    /// Wait for the next peer
    async fn accept(&mut self) -> io::Result<(BoxedStream, HardwareAddress)>;
}
