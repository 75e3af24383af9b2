//! Wireless-serial (RFCOMM) transport
//!
//! Unlike UDP this transport is connection-oriented. The sender resolves and
//! connects before any payload flows; the receiver listens on a channel and
//! accepts one connection at a time. All link events are produced by a
//! [`Hive`] which only makes progress while a [`Pump`] thread polls it.
//!
//! Per-connection state machine:
//!
//! ```text
//! Idle ──► Connecting ──► Connected ──► Closed
//!              │              │
//!              └──────────────┴───────► Errored
//! ```

pub mod address;
pub mod connection;
pub mod hive;
pub mod link;
pub mod memory;
#[cfg(all(feature = "bluetooth", target_os = "linux"))]
pub mod rfcomm;
pub mod receiver;
pub mod sender;
pub mod state;

pub use address::{Channel, HardwareAddress, SerialEndpoint};
pub use connection::ConnectionHandler;
pub use hive::{Hive, Pump};
pub use link::{BoxedStream, SerialLink, SerialListener};
pub use memory::MemoryLink;
#[cfg(all(feature = "bluetooth", target_os = "linux"))]
pub use rfcomm::RfcommLink;
pub use receiver::WirelessReceiver;
pub use sender::WirelessSender;
pub use state::LinkState;

/// The platform radio link, when this build has one
pub fn system_link() -> Option<std::sync::Arc<dyn SerialLink>> {
    #[cfg(all(feature = "bluetooth", target_os = "linux"))]
    {
        Some(std::sync::Arc::new(RfcommLink::new()))
    }
    #[cfg(not(all(feature = "bluetooth", target_os = "linux")))]
    {
        None
    }
}
