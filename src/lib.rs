//! # Audio Streamer
//!
//! Live point-to-point PCM audio streaming between two endpoints.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────── RECORDER ────────────────────────┐
//! │  Microphone                                               │
//! │      │  driver callback, one fixed-size frame at a time   │
//! │      ▼                                                    │
//! │  pipeline::Recorder ──► codec::encode_frame               │
//! │                              │                            │
//! │                              ▼                            │
//! │                network::OutboundChannel::send             │
//! │                 (UdpSender | serial::WirelessSender)      │
//! └──────────────────────────────┼────────────────────────────┘
//!                                │  UDP datagram / RFCOMM stream
//! ┌──────────────────────────────┼──────── PLAYER ────────────┐
//! │                              ▼                            │
//! │                network::InboundChannel (reactor thread)   │
//! │                 (UdpReceiver | serial::WirelessReceiver)  │
//! │                              │  receive callback          │
//! │                              ▼                            │
//! │  pipeline::Player ──► codec::decode_frame                 │
//! │      │  blocking write of one frame                       │
//! │      ▼                                                    │
//! │  Speaker                                                  │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Data flows in one direction only. A process is either a recorder bound to
//! one outbound channel or a player bound to one inbound channel.

pub mod audio;
pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod network;
pub mod pipeline;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default sample rate for audio processing
    pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

    /// Default number of samples per channel in one frame
    pub const DEFAULT_FRAMES_PER_BUFFER: u32 = 16;

    /// Default channel count (stereo)
    pub const DEFAULT_CHANNELS: u16 = 2;

    /// Default playback queue depth in frames
    pub const DEFAULT_OUTPUT_QUEUE_FRAMES: usize = 32;

    /// Receive buffer capacity for one transport payload
    pub const MAX_PAYLOAD_SIZE: usize = 8192;

    /// Lowest RFCOMM channel
    pub const MIN_SERIAL_CHANNEL: u8 = 1;

    /// Highest RFCOMM channel
    pub const MAX_SERIAL_CHANNEL: u8 = 30;

    /// Default hive poll interval in milliseconds
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

    /// Default outgoing payload queue for the wireless sender
    pub const DEFAULT_OUTGOING_QUEUE: usize = 64;

    /// Default bytes per wireless receive
    pub const DEFAULT_READ_CHUNK: usize = 1024;

    /// Default wait for the wireless connect handshake in milliseconds
    pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
}
