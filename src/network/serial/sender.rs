//! Sending side of the wireless-serial transport

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::address::{Channel, HardwareAddress, SerialEndpoint};
use super::connection::{recv_loop, send_loop, ConnectionHandler};
use super::hive::{Hive, Pump};
use super::link::SerialLink;
use super::state::{LinkShared, LinkState};
use crate::config::WirelessConfig;
use crate::error::TransportError;
use crate::network::OutboundChannel;

/// Streams payloads to one peer over a connected serial link.
///
/// Construction validates the peer and starts the connect handshake without
/// waiting for it. [`send`](OutboundChannel::send) blocks until the
/// handshake has finished, so the first payloads are never dropped.
///
/// That wait is bounded by `connect_timeout_ms`. A capture callback parked
/// in `send` holds up `Recorder::stop` for at most that long, so callers
/// that cannot afford the stall should [`wait_connected`](Self::wait_connected)
/// before starting a recorder.
pub struct WirelessSender {
    endpoint: SerialEndpoint,
    connect_timeout: Duration,
    shared: Arc<LinkShared>,
    outgoing: mpsc::Sender<Bytes>,
    hive: Arc<Hive>,
    pump: Pump,
}

impl WirelessSender {
    pub fn connect(
        link: Arc<dyn SerialLink>,
        address: &str,
        channel: u32,
        config: &WirelessConfig,
    ) -> Result<Self, TransportError> {
        let address: HardwareAddress = address.parse()?;
        let channel = Channel::new(channel)?;
        let endpoint = SerialEndpoint::new(address, channel);

        let hive = Hive::new(config.poll_interval())?;
        let shared = Arc::new(LinkShared::new("sender"));
        let (outgoing, queue) = mpsc::channel(config.outgoing_queue);

        shared.set_state(LinkState::Connecting);
        tracing::info!("Connecting to {} over {} link", endpoint, link.name());

        let handler = shared.clone();
        let read_chunk = config.read_chunk;
        hive.spawn(async move {
            let stream = match link.connect(endpoint).await {
                Ok(stream) => stream,
                Err(e) => {
                    handler.on_error(&e);
                    return;
                }
            };
            handler.on_connect(endpoint.address, endpoint.channel);

            let (reader, writer) = tokio::io::split(stream);
            let result = tokio::select! {
                result = recv_loop(reader, read_chunk, &*handler) => result,
                result = send_loop(writer, queue) => result,
            };

            match result {
                Ok(()) => handler.on_close(),
                Err(e) => handler.on_error(&e),
            }
        });

        let pump = Pump::start(hive.clone(), format!("serial-send-{}", channel))?;

        Ok(Self {
            endpoint,
            connect_timeout: config.connect_timeout(),
            shared,
            outgoing,
            hive,
            pump,
        })
    }

    /// Peer this sender streams to
    pub fn endpoint(&self) -> SerialEndpoint {
        self.endpoint
    }

    /// Current link state
    pub fn state(&self) -> LinkState {
        self.shared.state()
    }

    /// Wait up to `timeout` for the handshake to finish
    pub fn wait_connected(&self, timeout: Duration) -> Result<(), TransportError> {
        match self.shared.wait_while_connecting_for(timeout) {
            LinkState::Connected => Ok(()),
            LinkState::Connecting => Err(TransportError::ConnectionFailed(format!(
                "no answer from {} within {:?}",
                self.endpoint, timeout
            ))),
            state => Err(self.not_connected(state)),
        }
    }

    fn not_connected(&self, state: LinkState) -> TransportError {
        let reason = match self.shared.last_error() {
            Some(error) => format!("{}: {}", state, error),
            None => state.to_string(),
        };
        TransportError::NotConnected(reason)
    }
}

impl OutboundChannel for WirelessSender {
    fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        self.wait_connected(self.connect_timeout)?;

        // Blocks while the peer is not draining the link
        self.outgoing
            .blocking_send(Bytes::copy_from_slice(payload))
            .map_err(|_| TransportError::LinkClosed)
    }
}

impl Drop for WirelessSender {
    fn drop(&mut self) {
        self.pump.stop();
        self.hive.stop();

        // Release anyone still waiting on the handshake
        if !self.shared.state().is_terminal() {
            self.shared.set_state(LinkState::Closed);
        }
        tracing::info!("Wireless sender to {} closed", self.endpoint);
    }
}
