//! In-process serial link
//!
//! Joins `connect` and `listen` calls made through clones of the same
//! [`MemoryLink`] by channel number, over `tokio::io::duplex` pipes. It
//! behaves like a reliable stream link without any radio hardware.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;

use super::address::{Channel, HardwareAddress, SerialEndpoint};
use super::link::{BoxedStream, SerialLink, SerialListener};

/// Pipe capacity per direction
const PIPE_CAPACITY: usize = 16 * 1024;

type Incoming = mpsc::UnboundedSender<(DuplexStream, HardwareAddress)>;

/// Loopback link shared by everything cloned from one instance
#[derive(Clone)]
pub struct MemoryLink {
    listeners: Arc<Mutex<HashMap<u8, Incoming>>>,
    local: HardwareAddress,
}

impl MemoryLink {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(HashMap::new())),
            local: HardwareAddress::ANY,
        }
    }

    /// A handle on the same link that identifies itself as `address`
    pub fn with_address(&self, address: HardwareAddress) -> Self {
        Self {
            listeners: self.listeners.clone(),
            local: address,
        }
    }

    /// Check if something listens on `channel`
    pub fn is_listening(&self, channel: Channel) -> bool {
        self.listeners
            .lock()
            .get(&channel.get())
            .is_some_and(|tx| !tx.is_closed())
    }
}

impl Default for MemoryLink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SerialLink for MemoryLink {
    async fn connect(&self, endpoint: SerialEndpoint) -> io::Result<BoxedStream> {
        let channel = endpoint.channel.get();
        let mut listeners = self.listeners.lock();

        let refused = || {
            io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("nothing listens on {}", endpoint),
            )
        };

        let incoming = listeners.get(&channel).ok_or_else(refused)?;
        let (client, server) = tokio::io::duplex(PIPE_CAPACITY);

        if incoming.send((server, self.local)).is_err() {
            listeners.remove(&channel);
            return Err(refused());
        }

        Ok(Box::new(client))
    }

    async fn listen(&self, channel: Channel) -> io::Result<Box<dyn SerialListener>> {
        let mut listeners = self.listeners.lock();

        if listeners.get(&channel.get()).is_some_and(|tx| !tx.is_closed()) {
            return Err(io::Error::new(
                io::ErrorKind::AddrInUse,
                format!("channel {} already has a listener", channel),
            ));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        listeners.insert(channel.get(), tx);

        Ok(Box::new(MemoryListener {
            incoming: rx,
            channel: channel.get(),
            listeners: self.listeners.clone(),
        }))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryListener {
    incoming: mpsc::UnboundedReceiver<(DuplexStream, HardwareAddress)>,
    channel: u8,
    listeners: Arc<Mutex<HashMap<u8, Incoming>>>,
}

#[async_trait]
impl SerialListener for MemoryListener {
    async fn accept(&mut self) -> io::Result<(BoxedStream, HardwareAddress)> {
        match self.incoming.recv().await {
            Some((stream, peer)) => Ok((Box::new(stream), peer)),
            None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "listener closed")),
        }
    }
}

impl Drop for MemoryListener {
    fn drop(&mut self) {
        self.incoming.close();

        // A newer listener may already own the channel
        let mut listeners = self.listeners.lock();
        if listeners.get(&self.channel).is_some_and(|tx| tx.is_closed()) {
            listeners.remove(&self.channel);
        }
    }
}
