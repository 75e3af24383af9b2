//! Capture and playback pipelines
//!
//! A [`Recorder`] turns every captured frame into one transport payload. A
//! [`Player`] turns received payloads back into frames and writes them to
//! the speaker. Each pipeline exclusively owns its audio stream and its
//! transport channel.

pub mod player;
pub mod recorder;

pub use player::{Player, PlayerStats};
pub use recorder::{Recorder, RecorderStats};
