//! Error types for the audio streaming application

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio subsystem errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open stream: {0}")]
    StreamError(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid frame length: expected {expected} samples, got {actual}")]
    InvalidFrameLength { expected: usize, actual: usize },

    #[error("Output stream did not accept the frame in time")]
    WriteTimeout,

    #[error("Stream is closed")]
    StreamClosed,

    #[error("cpal error: {0}")]
    CpalError(String),
}

/// Transport (datagram and wireless-serial) errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Invalid port number {0}. Port must be between 1 and 65535")]
    InvalidPort(u32),

    #[error("Invalid IP address: {0}")]
    InvalidAddress(String),

    #[error("Peer {0} is unreachable: {1}")]
    Unreachable(String, String),

    #[error("Invalid hardware address: {0}")]
    InvalidHardwareAddress(String),

    #[error("Invalid channel {0}. Channel must be between 1 and 30")]
    InvalidChannel(u32),

    #[error("Socket bind failed: {0}")]
    BindFailed(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Link is not connected ({0})")]
    NotConnected(String),

    #[error("Link closed")]
    LinkClosed,

    #[error("Receiver already started")]
    AlreadyStarted,

    #[error("Failed to spawn worker: {0}")]
    Spawn(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
