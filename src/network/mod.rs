//! Transport subsystem
//!
//! Two capability interfaces decouple the audio pipelines from the wire:
//! [`OutboundChannel`] emits payloads to one peer and [`InboundChannel`]
//! delivers received payloads to a callback on a background thread.
//! [`Outbound`] and [`Inbound`] close the set of transports over those
//! interfaces: UDP datagrams and the wireless-serial link.

pub mod serial;
pub mod udp;

pub use serial::{WirelessReceiver, WirelessSender};
pub use udp::{create_socket, UdpReceiver, UdpSender};

use crate::error::TransportError;

/// Called for every received payload, on the channel's background thread.
///
/// Invocations never overlap. The callback must not block indefinitely.
pub type ReceiveCallback = Box<dyn FnMut(&[u8]) + Send + 'static>;

/// How received bytes map onto sent payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Each delivery is exactly one sent payload (or a fragment of one)
    Datagram,
    /// Deliveries are arbitrary slices of an ordered byte stream
    Stream,
}

/// Send a payload to one peer
pub trait OutboundChannel: Send + Sync {
    /// Best-effort, fire-and-forget send.
    ///
    /// An error means the payload was not handed to the network; success
    /// says nothing about delivery.
    fn send(&self, payload: &[u8]) -> Result<(), TransportError>;
}

/// Deliver received payloads to a callback
pub trait InboundChannel: Send {
    /// Register `on_receive` and begin listening. Call at most once.
    fn start(&mut self, on_receive: ReceiveCallback) -> Result<(), TransportError>;

    /// Stop listening. Blocks until the background thread has quiesced:
    /// once this returns the callback is never invoked again. Safe to call
    /// when never started, and more than once.
    fn stop(&mut self);

    /// Delivery model of this channel
    fn delivery(&self) -> Delivery;
}

impl<T: OutboundChannel + ?Sized> OutboundChannel for Box<T> {
    fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        (**self).send(payload)
    }
}

impl<T: OutboundChannel + ?Sized> OutboundChannel for std::sync::Arc<T> {
    fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        (**self).send(payload)
    }
}

impl<T: InboundChannel + ?Sized> InboundChannel for Box<T> {
    fn start(&mut self, on_receive: ReceiveCallback) -> Result<(), TransportError> {
        (**self).start(on_receive)
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn delivery(&self) -> Delivery {
        (**self).delivery()
    }
}

/// Sending side of either transport
pub enum Outbound {
    Datagram(UdpSender),
    WirelessSerial(WirelessSender),
}

impl OutboundChannel for Outbound {
    fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        match self {
            Outbound::Datagram(sender) => sender.send(payload),
            Outbound::WirelessSerial(sender) => sender.send(payload),
        }
    }
}

impl From<UdpSender> for Outbound {
    fn from(sender: UdpSender) -> Self {
        Outbound::Datagram(sender)
    }
}

impl From<WirelessSender> for Outbound {
    fn from(sender: WirelessSender) -> Self {
        Outbound::WirelessSerial(sender)
    }
}

/// Receiving side of either transport
pub enum Inbound {
    Datagram(UdpReceiver),
    WirelessSerial(WirelessReceiver),
}

impl InboundChannel for Inbound {
    fn start(&mut self, on_receive: ReceiveCallback) -> Result<(), TransportError> {
        match self {
            Inbound::Datagram(receiver) => receiver.start(on_receive),
            Inbound::WirelessSerial(receiver) => receiver.start(on_receive),
        }
    }

    fn stop(&mut self) {
        match self {
            Inbound::Datagram(receiver) => receiver.stop(),
            Inbound::WirelessSerial(receiver) => receiver.stop(),
        }
    }

    fn delivery(&self) -> Delivery {
        match self {
            Inbound::Datagram(receiver) => receiver.delivery(),
            Inbound::WirelessSerial(receiver) => receiver.delivery(),
        }
    }
}

impl From<UdpReceiver> for Inbound {
    fn from(receiver: UdpReceiver) -> Self {
        Inbound::Datagram(receiver)
    }
}

impl From<WirelessReceiver> for Inbound {
    fn from(receiver: WirelessReceiver) -> Self {
        Inbound::WirelessSerial(receiver)
    }
}

/// A validated UDP port (1-65535)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Port(u16);

impl Port {
    pub fn new(port: u32) -> Result<Self, TransportError> {
        match u16::try_from(port) {
            Ok(p) if p != 0 => Ok(Self(p)),
            _ => Err(TransportError::InvalidPort(port)),
        }
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl std::fmt::Display for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_range() {
        assert!(matches!(Port::new(0), Err(TransportError::InvalidPort(0))));
        assert!(matches!(Port::new(70000), Err(TransportError::InvalidPort(70000))));
        assert_eq!(Port::new(1).unwrap().get(), 1);
        assert_eq!(Port::new(65535).unwrap().get(), 65535);
    }
}
