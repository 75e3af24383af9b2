//! Link bookkeeping shared by the pump thread and the event handlers
//!
//! One coarse mutex guards everything. The link carries a single connection
//! at a time, so there is nothing to gain from finer locking.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::io;
use std::time::{Duration, Instant};

use super::address::{Channel, HardwareAddress};
use super::connection::ConnectionHandler;
use crate::network::ReceiveCallback;

/// Per-connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    Connecting,
    Connected,
    Closed,
    Errored,
}

impl LinkState {
    /// `Closed` and `Errored` are final for a sender
    pub fn is_terminal(self) -> bool {
        matches!(self, LinkState::Closed | LinkState::Errored)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkState::Idle => "idle",
            LinkState::Connecting => "connecting",
            LinkState::Connected => "connected",
            LinkState::Closed => "closed",
            LinkState::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Guarded bookkeeping
pub struct LinkBook {
    pub state: LinkState,
    pub peer: Option<HardwareAddress>,
    pub last_error: Option<String>,
    pub connections: u64,
    pub bytes_received: u64,
    pub on_receive: Option<ReceiveCallback>,
}

/// Bookkeeping plus a condition variable signalled on every state change
pub struct LinkShared {
    role: &'static str,
    book: Mutex<LinkBook>,
    changed: Condvar,
}

impl LinkShared {
    pub fn new(role: &'static str) -> Self {
        Self {
            role,
            book: Mutex::new(LinkBook {
                state: LinkState::Idle,
                peer: None,
                last_error: None,
                connections: 0,
                bytes_received: 0,
                on_receive: None,
            }),
            changed: Condvar::new(),
        }
    }

    pub fn state(&self) -> LinkState {
        self.book.lock().state
    }

    pub fn set_state(&self, state: LinkState) {
        let mut book = self.book.lock();
        self.transition(&mut book, state);
    }

    pub fn peer(&self) -> Option<HardwareAddress> {
        self.book.lock().peer
    }

    pub fn last_error(&self) -> Option<String> {
        self.book.lock().last_error.clone()
    }

    pub fn bytes_received(&self) -> u64 {
        self.book.lock().bytes_received
    }

    pub fn connections(&self) -> u64 {
        self.book.lock().connections
    }

    pub fn set_receiver(&self, on_receive: Option<ReceiveCallback>) {
        self.book.lock().on_receive = on_receive;
    }

    /// Block while a connect handshake is in flight, up to `timeout`, then
    /// report the state
    pub fn wait_while_connecting_for(&self, timeout: Duration) -> LinkState {
        let deadline = Instant::now() + timeout;
        let mut book = self.book.lock();
        while book.state == LinkState::Connecting {
            if self.changed.wait_until(&mut book, deadline).timed_out() {
                break;
            }
        }
        book.state
    }

    fn transition(&self, book: &mut LinkBook, state: LinkState) {
        if book.state != state {
            tracing::debug!("[{}] link {} -> {}", self.role, book.state, state);
            book.state = state;
            self.changed.notify_all();
        }
    }
}

impl ConnectionHandler for LinkShared {
    fn on_accept(&self, peer: HardwareAddress, channel: Channel) {
        let mut book = self.book.lock();
        tracing::info!("[{}] accepted {} on channel {}", self.role, peer, channel);
        book.peer = Some(peer);
        book.connections += 1;
        self.transition(&mut book, LinkState::Connected);
    }

    fn on_connect(&self, peer: HardwareAddress, channel: Channel) {
        let mut book = self.book.lock();
        tracing::info!("[{}] connected to {} on channel {}", self.role, peer, channel);
        book.peer = Some(peer);
        book.connections += 1;
        self.transition(&mut book, LinkState::Connected);
    }

    fn on_recv(&self, chunk: &[u8]) {
        let mut book = self.book.lock();
        book.bytes_received += chunk.len() as u64;
        tracing::trace!("[{}] received {} bytes", self.role, chunk.len());

        if let Some(on_receive) = book.on_receive.as_mut() {
            on_receive(chunk);
        }
    }

    fn on_error(&self, error: &io::Error) {
        let mut book = self.book.lock();
        tracing::warn!("[{}] link error: {}", self.role, error);
        book.last_error = Some(error.to_string());
        self.transition(&mut book, LinkState::Errored);
    }

    fn on_close(&self) {
        let mut book = self.book.lock();
        tracing::info!("[{}] peer closed the link", self.role);
        self.transition(&mut book, LinkState::Closed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_waiters_wake_on_connect() {
        let shared = Arc::new(LinkShared::new("test"));
        shared.set_state(LinkState::Connecting);

        let waiter = {
            let shared = shared.clone();
            thread::spawn(move || shared.wait_while_connecting_for(Duration::from_secs(5)))
        };

        thread::sleep(Duration::from_millis(20));
        shared.on_connect(HardwareAddress::ANY, Channel::new(3).unwrap());

        assert_eq!(waiter.join().unwrap(), LinkState::Connected);
        assert_eq!(shared.connections(), 1);
    }

    #[test]
    fn test_wait_with_deadline_times_out() {
        let shared = LinkShared::new("test");
        shared.set_state(LinkState::Connecting);

        let state = shared.wait_while_connecting_for(Duration::from_millis(10));
        assert_eq!(state, LinkState::Connecting);
    }

    #[test]
    fn test_recv_forwards_to_callback() {
        let shared = LinkShared::new("test");
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        shared.set_receiver(Some(Box::new(move |chunk: &[u8]| sink.lock().extend_from_slice(chunk))));
        shared.on_recv(b"abc");
        shared.on_recv(b"de");

        assert_eq!(&*seen.lock(), b"abcde");
        assert_eq!(shared.bytes_received(), 5);
    }

    #[test]
    fn test_error_is_recorded() {
        let shared = LinkShared::new("test");
        shared.on_error(&io::Error::new(io::ErrorKind::ConnectionReset, "reset"));

        assert_eq!(shared.state(), LinkState::Errored);
        assert!(shared.last_error().unwrap().contains("reset"));
        assert!(shared.state().is_terminal());
    }
}
