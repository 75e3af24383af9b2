//! Application configuration
//!
//! Both ends of a stream must agree on the `[audio]` section: the frame
//! geometry is fixed up front and never negotiated over the wire.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::codec::WireFormat;
use crate::constants::*;
use crate::error::ConfigError;
use crate::network::serial::Channel;

/// Top-level configuration, loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub datagram: DatagramConfig,
    pub wireless: WirelessConfig,
}

/// Frame geometry and device selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Samples per channel in one frame
    pub frames_per_buffer: u32,
    /// Interleaved channel count
    pub channels: u16,
    /// Input device name, default device when absent
    pub input_device: Option<String>,
    /// Output device name, default device when absent
    pub output_device: Option<String>,
    /// Depth of the playback queue in frames
    pub output_queue_frames: usize,
    /// Payload serialization
    pub wire_format: WireFormat,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            frames_per_buffer: DEFAULT_FRAMES_PER_BUFFER,
            channels: DEFAULT_CHANNELS,
            input_device: None,
            output_device: None,
            output_queue_frames: DEFAULT_OUTPUT_QUEUE_FRAMES,
            wire_format: WireFormat::Binary,
        }
    }
}

impl AudioConfig {
    /// Number of interleaved samples in one frame
    pub fn samples_per_frame(&self) -> usize {
        self.frames_per_buffer as usize * self.channels as usize
    }

    /// Wall-clock duration of one frame
    pub fn frame_duration(&self) -> Duration {
        Duration::from_nanos(self.frames_per_buffer as u64 * 1_000_000_000 / self.sample_rate as u64)
    }

    /// Largest payload one frame serializes to
    pub fn max_frame_payload(&self) -> usize {
        self.wire_format.max_payload_len(self.samples_per_frame())
    }
}

/// Datagram transport settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatagramConfig {
    /// Local address the player binds to
    pub bind_address: IpAddr,
    /// Receive buffer capacity in bytes
    pub max_payload: usize,
    /// Kernel receive buffer size (SO_RCVBUF)
    pub recv_buffer_bytes: Option<usize>,
}

impl Default for DatagramConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::from([127, 0, 0, 1]),
            max_payload: MAX_PAYLOAD_SIZE,
            recv_buffer_bytes: None,
        }
    }
}

/// Wireless-serial transport settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WirelessConfig {
    /// How long one hive poll pumps events
    pub poll_interval_ms: u64,
    /// Outgoing payloads buffered before `send` blocks
    pub outgoing_queue: usize,
    /// Bytes requested per receive
    pub read_chunk: usize,
    /// Channel used when none is given on the command line
    pub default_channel: u8,
    /// Longest wait for the connect handshake, in `send` or at startup
    pub connect_timeout_ms: u64,
}

impl Default for WirelessConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            outgoing_queue: DEFAULT_OUTGOING_QUEUE,
            read_chunk: DEFAULT_READ_CHUNK,
            default_channel: 1,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

impl WirelessConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl AppConfig {
    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the platform config
    /// directory is consulted and defaults are used when nothing is there.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    tracing::debug!("No configuration file found, using defaults");
                    Self::default()
                }
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let config = Self::from_toml(&text).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })?;

        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse TOML text
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })
    }

    /// `<config dir>/audio-streamer/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "audio-streamer")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let audio = &self.audio;

        if audio.sample_rate == 0 {
            return Err(invalid("audio.sample_rate", "must be positive"));
        }
        if audio.frames_per_buffer == 0 {
            return Err(invalid("audio.frames_per_buffer", "must be positive"));
        }
        if audio.channels == 0 {
            return Err(invalid("audio.channels", "must be positive"));
        }
        if audio.output_queue_frames == 0 {
            return Err(invalid("audio.output_queue_frames", "must be positive"));
        }
        if audio.max_frame_payload() > self.datagram.max_payload {
            return Err(invalid(
                "datagram.max_payload",
                format!(
                    "{} bytes cannot hold one {:?} frame of {} bytes",
                    self.datagram.max_payload,
                    audio.wire_format,
                    audio.max_frame_payload()
                ),
            ));
        }
        if self.wireless.poll_interval_ms == 0 {
            return Err(invalid("wireless.poll_interval_ms", "must be positive"));
        }
        if self.wireless.connect_timeout_ms == 0 {
            return Err(invalid("wireless.connect_timeout_ms", "must be positive"));
        }
        if self.wireless.outgoing_queue == 0 || self.wireless.read_chunk == 0 {
            return Err(invalid("wireless", "queue and chunk sizes must be positive"));
        }
        if Channel::new(self.wireless.default_channel as u32).is_err() {
            return Err(invalid("wireless.default_channel", "must be between 1 and 30"));
        }

        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_fixed_parameters() {
        let config = AppConfig::default();
        assert_eq!(config.audio.sample_rate, 44100);
        assert_eq!(config.audio.frames_per_buffer, 16);
        assert_eq!(config.audio.channels, 2);
        assert_eq!(config.audio.samples_per_frame(), 32);
        assert_eq!(config.datagram.bind_address, IpAddr::from([127, 0, 0, 1]));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [audio]
            sample_rate = 48000
            wire_format = "text"

            [wireless]
            poll_interval_ms = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.audio.sample_rate, 48000);
        assert_eq!(config.audio.frames_per_buffer, 16);
        assert_eq!(config.audio.wire_format, WireFormat::Text);
        assert_eq!(config.wireless.poll_interval(), Duration::from_millis(5));
        assert_eq!(config.datagram.max_payload, MAX_PAYLOAD_SIZE);
    }

    #[test]
    fn test_rejects_frame_larger_than_payload() {
        let mut config = AppConfig::default();
        config.audio.frames_per_buffer = 4096;
        config.audio.channels = 2;

        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { field: "datagram.max_payload", .. }
        ));
    }

    #[test]
    fn test_rejects_bad_channel_and_zero_values() {
        let mut config = AppConfig::default();
        config.wireless.default_channel = 31;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.audio.channels = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.wireless.connect_timeout_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "wireless.connect_timeout_ms", .. })
        ));
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = AppConfig::from_toml("[audio]\nsample_rate = \"fast\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/audio-streamer.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_frame_duration() {
        let audio = AudioConfig {
            sample_rate: 48000,
            frames_per_buffer: 480,
            ..AudioConfig::default()
        };
        assert_eq!(audio.frame_duration(), Duration::from_millis(10));
    }
}
