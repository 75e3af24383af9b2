//! Receiving side of the wireless-serial transport

use std::sync::Arc;

use super::address::{Channel, HardwareAddress};
use super::connection::{recv_loop, ConnectionHandler};
use super::hive::{Hive, Pump};
use super::link::{SerialLink, SerialListener};
use super::state::{LinkShared, LinkState};
use crate::config::WirelessConfig;
use crate::error::TransportError;
use crate::network::{Delivery, InboundChannel, ReceiveCallback};

/// Accepts one peer at a time on a channel and forwards what it sends.
pub struct WirelessReceiver {
    link: Arc<dyn SerialLink>,
    channel: Channel,
    read_chunk: usize,
    hive: Arc<Hive>,
    pump: Option<Pump>,
    shared: Arc<LinkShared>,
}

impl WirelessReceiver {
    pub fn new(link: Arc<dyn SerialLink>, channel: u32, config: &WirelessConfig) -> Result<Self, TransportError> {
        let channel = Channel::new(channel)?;
        let hive = Hive::new(config.poll_interval())?;

        Ok(Self {
            link,
            channel,
            read_chunk: config.read_chunk,
            hive,
            pump: None,
            shared: Arc::new(LinkShared::new("receiver")),
        })
    }

    /// Channel this receiver listens on
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Current link state
    pub fn state(&self) -> LinkState {
        self.shared.state()
    }

    /// Address of the current or last peer
    pub fn peer(&self) -> Option<HardwareAddress> {
        self.shared.peer()
    }

    /// Total bytes forwarded to the callback
    pub fn bytes_received(&self) -> u64 {
        self.shared.bytes_received()
    }

    /// Connections accepted so far
    pub fn connections(&self) -> u64 {
        self.shared.connections()
    }
}

impl InboundChannel for WirelessReceiver {
    fn start(&mut self, on_receive: ReceiveCallback) -> Result<(), TransportError> {
        if self.pump.is_some() || self.hive.is_stopped() {
            return Err(TransportError::AlreadyStarted);
        }

        let link = self.link.clone();
        let channel = self.channel;
        let listener = self
            .hive
            .block_on(async move { link.listen(channel).await })
            .ok_or(TransportError::LinkClosed)?
            .map_err(|e| TransportError::BindFailed(format!("channel {}: {}", channel, e)))?;

        self.shared.set_receiver(Some(on_receive));
        self.hive
            .spawn(accept_loop(listener, channel, self.read_chunk, self.shared.clone()));

        self.pump = Some(Pump::start(self.hive.clone(), format!("serial-recv-{}", channel))?);

        tracing::info!(
            "Wireless receiver started listening on channel {} ({} link)",
            channel,
            self.link.name()
        );
        Ok(())
    }

    fn stop(&mut self) {
        let Some(mut pump) = self.pump.take() else {
            return;
        };

        pump.stop();
        self.hive.stop();
        self.shared.set_receiver(None);

        tracing::info!(
            "Wireless receiver stopped listening on channel {} ({} bytes received)",
            self.channel,
            self.shared.bytes_received()
        );
    }

    fn delivery(&self) -> Delivery {
        Delivery::Stream
    }
}

impl Drop for WirelessReceiver {
    fn drop(&mut self) {
        self.stop();
        self.hive.stop();
    }
}

/// Serve connections one after another until the acceptor fails
async fn accept_loop(
    mut listener: Box<dyn SerialListener>,
    channel: Channel,
    read_chunk: usize,
    handler: Arc<LinkShared>,
) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                // Nothing more will arrive; stays degraded until stopped
                handler.on_error(&e);
                return;
            }
        };
        handler.on_accept(peer, channel);

        match recv_loop(stream, read_chunk, &*handler).await {
            Ok(()) => handler.on_close(),
            Err(e) => handler.on_error(&e),
        }
    }
}
