//! UDP datagram transport
//!
//! Connectionless and best-effort: no handshake, no retry, no ordering.
//! Loss, reordering and duplication reach the receive callback unmitigated.

use socket2::{Domain, Protocol, Socket, Type};
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::oneshot;

use super::{Delivery, InboundChannel, OutboundChannel, Port, ReceiveCallback};
use crate::config::DatagramConfig;
use crate::error::TransportError;

/// Largest UDP payload over IPv4
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Create a non-blocking UDP socket bound to `addr`.
///
/// `SO_REUSEADDR` stays unset, so a port conflict fails the bind.
pub fn create_socket(addr: SocketAddr, recv_buffer_size: Option<usize>) -> std::io::Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;

    if let Some(size) = recv_buffer_size {
        if let Err(e) = socket.set_recv_buffer_size(size) {
            tracing::warn!("Failed to set SO_RCVBUF to {}: {}", size, e);
        }
    }

    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;

    Ok(socket.into())
}

/// Sends payloads to one peer over UDP
pub struct UdpSender {
    socket: std::net::UdpSocket,
    peer: SocketAddr,
    /// Largest payload the peer's receive buffer holds
    max_payload: usize,
    packets_sent: AtomicU64,
    bytes_sent: AtomicU64,
}

impl UdpSender {
    /// Validate the peer and open the socket.
    ///
    /// `host` may be an IP literal or a resolvable host name. The socket is
    /// connected to the peer, which fails fast when no route exists.
    pub fn new(host: &str, port: u32) -> Result<Self, TransportError> {
        Self::with_config(host, port, &DatagramConfig::default())
    }

    /// Sender whose payload bound matches the peer's `max_payload`
    pub fn with_config(host: &str, port: u32, config: &DatagramConfig) -> Result<Self, TransportError> {
        let port = Port::new(port)?;
        let peer = resolve(host, port)?;

        let local: SocketAddr = match peer.ip() {
            IpAddr::V4(_) => SocketAddr::from(([0, 0, 0, 0], 0)),
            IpAddr::V6(_) => SocketAddr::from(([0u16; 8], 0)),
        };

        let socket = std::net::UdpSocket::bind(local)
            .map_err(|e| TransportError::BindFailed(e.to_string()))?;
        socket
            .connect(peer)
            .map_err(|e| TransportError::Unreachable(peer.to_string(), e.to_string()))?;

        tracing::info!("UDP sender created for {}", peer);

        Ok(Self {
            socket,
            peer,
            max_payload: config.max_payload.min(MAX_DATAGRAM_SIZE),
            packets_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
        })
    }

    /// Peer address payloads go to
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Largest payload `send` accepts
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Get statistics
    pub fn stats(&self) -> DatagramStats {
        DatagramStats {
            packets: self.packets_sent.load(Ordering::Relaxed),
            bytes: self.bytes_sent.load(Ordering::Relaxed),
        }
    }
}

impl OutboundChannel for UdpSender {
    fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        // The receiver would truncate anything longer
        if payload.len() > self.max_payload {
            return Err(TransportError::PayloadTooLarge(payload.len()));
        }

        let sent = self
            .socket
            .send(payload)
            .map_err(|e| TransportError::SendFailed(format!("{}: {}", self.peer, e)))?;

        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(sent as u64, Ordering::Relaxed);
        Ok(())
    }
}

impl Drop for UdpSender {
    fn drop(&mut self) {
        let stats = self.stats();
        tracing::info!(
            "UDP sender for {} closed after {} packets ({} bytes)",
            self.peer,
            stats.packets,
            stats.bytes
        );
    }
}

fn resolve(host: &str, port: Port) -> Result<SocketAddr, TransportError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port.get()));
    }
    if !is_host_name(host) {
        return Err(TransportError::InvalidAddress(host.to_string()));
    }

    (host, port.get())
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| TransportError::InvalidAddress(host.to_string()))
}

/// Whether `host` is a name worth resolving: dot-separated labels of
/// letters, digits and hyphens, not all numeric (a malformed IPv4 literal)
fn is_host_name(host: &str) -> bool {
    let labels_ok = host.len() <= 253
        && host.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
        });
    labels_ok && !host.bytes().all(|b| b.is_ascii_digit() || b == b'.')
}

/// Packet counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatagramStats {
    pub packets: u64,
    pub bytes: u64,
}

#[derive(Default)]
struct ReceiverCounters {
    packets: AtomicU64,
    bytes: AtomicU64,
}

/// Receives UDP payloads on a background reactor thread
pub struct UdpReceiver {
    port: Port,
    bind_address: IpAddr,
    max_payload: usize,
    recv_buffer_bytes: Option<usize>,
    local_addr: Option<SocketAddr>,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
    counters: Arc<ReceiverCounters>,
}

impl UdpReceiver {
    /// Receiver on the loopback address with default settings
    pub fn new(port: u32) -> Result<Self, TransportError> {
        Self::with_config(port, &DatagramConfig::default())
    }

    /// Receiver with explicit bind address and buffer sizes
    pub fn with_config(port: u32, config: &DatagramConfig) -> Result<Self, TransportError> {
        let port = Port::new(port)?;

        Ok(Self {
            port,
            bind_address: config.bind_address,
            max_payload: config.max_payload,
            recv_buffer_bytes: config.recv_buffer_bytes,
            local_addr: None,
            shutdown: None,
            thread: None,
            counters: Arc::new(ReceiverCounters::default()),
        })
    }

    /// Port this receiver listens on
    pub fn port(&self) -> u16 {
        self.port.get()
    }

    /// Bound address while started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Check if the reactor is running
    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Get statistics
    pub fn stats(&self) -> DatagramStats {
        DatagramStats {
            packets: self.counters.packets.load(Ordering::Relaxed),
            bytes: self.counters.bytes.load(Ordering::Relaxed),
        }
    }
}

impl InboundChannel for UdpReceiver {
    fn start(&mut self, on_receive: ReceiveCallback) -> Result<(), TransportError> {
        if self.thread.is_some() {
            return Err(TransportError::AlreadyStarted);
        }

        let addr = SocketAddr::new(self.bind_address, self.port.get());
        let std_socket = create_socket(addr, self.recv_buffer_bytes)
            .map_err(|e| TransportError::BindFailed(format!("{}: {}", addr, e)))?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .build()
            .map_err(|e| TransportError::Spawn(e.to_string()))?;

        // Registering with the reactor needs the runtime context
        let socket = {
            let _guard = runtime.enter();
            tokio::net::UdpSocket::from_std(std_socket)
                .map_err(|e| TransportError::BindFailed(format!("{}: {}", addr, e)))?
        };
        self.local_addr = socket.local_addr().ok();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let capacity = self.max_payload;
        let counters = self.counters.clone();

        let handle = thread::Builder::new()
            .name(format!("udp-recv-{}", self.port))
            .spawn(move || {
                runtime.block_on(receive_loop(socket, on_receive, shutdown_rx, capacity, counters));
                // Dropping the runtime closes the socket
            })
            .map_err(|e| TransportError::Spawn(e.to_string()))?;

        self.shutdown = Some(shutdown_tx);
        self.thread = Some(handle);

        tracing::info!("UDP receiver started listening on {}", addr);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                tracing::error!("UDP receiver thread for port {} panicked", self.port);
            }
            self.local_addr = None;

            let stats = self.stats();
            tracing::info!(
                "UDP receiver stopped listening on port {} ({} packets, {} bytes)",
                self.port,
                stats.packets,
                stats.bytes
            );
        }
    }

    fn delivery(&self) -> Delivery {
        Delivery::Datagram
    }
}

impl Drop for UdpReceiver {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Perpetual receive: every completed receive re-arms the next one
async fn receive_loop(
    socket: tokio::net::UdpSocket,
    mut on_receive: ReceiveCallback,
    mut shutdown: oneshot::Receiver<()>,
    capacity: usize,
    counters: Arc<ReceiverCounters>,
) {
    let mut buffer = vec![0u8; capacity];

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => break,

            result = socket.recv_from(&mut buffer) => match result {
                Ok((len, peer)) => {
                    counters.packets.fetch_add(1, Ordering::Relaxed);
                    counters.bytes.fetch_add(len as u64, Ordering::Relaxed);
                    tracing::trace!("Received {} bytes from {}", len, peer);

                    on_receive(&buffer[..len]);
                }
                Err(e) => {
                    tracing::warn!("UDP receive failed: {}", e);
                }
            },
        }
    }
}
