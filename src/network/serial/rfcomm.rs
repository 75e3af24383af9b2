//! RFCOMM link over BlueZ

use async_trait::async_trait;
use bluer::rfcomm::{Listener, SocketAddr, Stream};
use bluer::Address;
use std::io;

use super::address::{Channel, HardwareAddress, SerialEndpoint};
use super::link::{BoxedStream, SerialLink, SerialListener};

/// The system Bluetooth adapter, through RFCOMM sockets
#[derive(Debug, Default, Clone, Copy)]
pub struct RfcommLink;

impl RfcommLink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SerialLink for RfcommLink {
    async fn connect(&self, endpoint: SerialEndpoint) -> io::Result<BoxedStream> {
        let target = SocketAddr::new(Address::new(endpoint.address.octets()), endpoint.channel.get());
        let stream = Stream::connect(target).await?;
        Ok(Box::new(stream))
    }

    async fn listen(&self, channel: Channel) -> io::Result<Box<dyn SerialListener>> {
        let local = SocketAddr::new(Address::any(), channel.get());
        let listener = Listener::bind(local).await?;
        Ok(Box::new(RfcommListener { listener }))
    }

    fn name(&self) -> &'static str {
        "rfcomm"
    }
}

struct RfcommListener {
    listener: Listener,
}

#[async_trait]
impl SerialListener for RfcommListener {
    async fn accept(&mut self) -> io::Result<(BoxedStream, HardwareAddress)> {
        let (stream, peer) = self.listener.accept().await?;
        Ok((Box::new(stream), HardwareAddress::new(peer.addr.0)))
    }
}
