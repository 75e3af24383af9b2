//! Audio device service
//!
//! The pipelines talk to audio hardware only through [`AudioBackend`]:
//! a callback-driven input stream that delivers exactly one frame per
//! invocation, and an output stream that accepts frames through blocking
//! writes.

use std::sync::Arc;

use super::capture::CpalInputStream;
use super::playback::CpalOutputStream;
use crate::config::AudioConfig;
use crate::error::AudioError;

/// What the capture callback asks of the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackStatus {
    /// Keep delivering frames
    Continue,
    /// This was the final frame; stop invoking the callback
    Complete,
}

/// Invoked on the audio thread with one full interleaved frame
/// (`frames_per_buffer * channels` samples).
pub type FrameCallback = Box<dyn FnMut(&[i16]) -> CallbackStatus + Send + 'static>;

/// An open capture stream
pub trait InputStream: Send {
    /// Stop the stream and release the device. Idempotent.
    fn close(&mut self) -> Result<(), AudioError>;

    /// Check if the stream is still delivering frames
    fn is_active(&self) -> bool;
}

/// An open playback stream
pub trait OutputStream: Send + Sync {
    /// Queue one full frame, blocking until the driver has room for it
    fn write(&self, frame: &[i16]) -> Result<(), AudioError>;

    /// Stop the stream and release the device. Idempotent.
    fn close(&self) -> Result<(), AudioError>;
}

/// Opens capture and playback streams
pub trait AudioBackend {
    fn open_input(&self, config: &AudioConfig, on_frame: FrameCallback) -> Result<Box<dyn InputStream>, AudioError>;

    fn open_output(&self, config: &AudioConfig) -> Result<Arc<dyn OutputStream>, AudioError>;
}

/// Streams on the default cpal host
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }
}

impl AudioBackend for CpalBackend {
    fn open_input(&self, config: &AudioConfig, on_frame: FrameCallback) -> Result<Box<dyn InputStream>, AudioError> {
        Ok(Box::new(CpalInputStream::open(config, on_frame)?))
    }

    fn open_output(&self, config: &AudioConfig) -> Result<Arc<dyn OutputStream>, AudioError> {
        Ok(Arc::new(CpalOutputStream::open(config)?))
    }
}
