//! Shared helpers for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use audio_streamer::audio::{AudioBackend, CallbackStatus, FrameCallback, InputStream, OutputStream};
use audio_streamer::config::AudioConfig;
use audio_streamer::error::AudioError;
use audio_streamer::network::serial::{BoxedStream, Channel, SerialEndpoint, SerialLink, SerialListener};

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Audio backend driven by the test instead of hardware
#[derive(Clone, Default)]
pub struct FakeBackend {
    callback: Arc<Mutex<Option<FrameCallback>>>,
    input_closed: Arc<AtomicBool>,
    input_completed: Arc<AtomicBool>,
    completed_before_close: Arc<AtomicBool>,
    output: Arc<FakeOutput>,
    fail_output: bool,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose output device cannot be opened
    pub fn without_output() -> Self {
        Self {
            fail_output: true,
            ..Self::default()
        }
    }

    /// Deliver one captured frame as the driver would
    pub fn capture(&self, frame: &[i16]) -> Option<CallbackStatus> {
        let status = self.callback.lock().as_mut().map(|on_frame| on_frame(frame));
        if status == Some(CallbackStatus::Complete) {
            self.input_completed.store(true, Ordering::SeqCst);
        }
        status
    }

    pub fn input_closed(&self) -> bool {
        self.input_closed.load(Ordering::SeqCst)
    }

    /// Whether the callback had returned `Complete` when the input was closed
    pub fn completed_before_close(&self) -> bool {
        self.completed_before_close.load(Ordering::SeqCst)
    }

    pub fn output(&self) -> &FakeOutput {
        &self.output
    }
}

impl AudioBackend for FakeBackend {
    fn open_input(&self, _config: &AudioConfig, on_frame: FrameCallback) -> Result<Box<dyn InputStream>, AudioError> {
        *self.callback.lock() = Some(on_frame);
        self.input_closed.store(false, Ordering::SeqCst);
        self.input_completed.store(false, Ordering::SeqCst);
        self.completed_before_close.store(false, Ordering::SeqCst);
        Ok(Box::new(FakeInput {
            closed: self.input_closed.clone(),
            completed: self.input_completed.clone(),
            completed_before_close: self.completed_before_close.clone(),
        }))
    }

    fn open_output(&self, config: &AudioConfig) -> Result<Arc<dyn OutputStream>, AudioError> {
        if self.fail_output {
            return Err(AudioError::DeviceNotFound("no output in test".to_string()));
        }
        self.output.configure(config.samples_per_frame());
        Ok(self.output.clone())
    }
}

struct FakeInput {
    closed: Arc<AtomicBool>,
    completed: Arc<AtomicBool>,
    completed_before_close: Arc<AtomicBool>,
}

impl InputStream for FakeInput {
    fn close(&mut self) -> Result<(), AudioError> {
        if !self.closed.load(Ordering::SeqCst) {
            self.completed_before_close
                .store(self.completed.load(Ordering::SeqCst), Ordering::SeqCst);
        }
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_active(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && !self.completed.load(Ordering::SeqCst)
    }
}

/// Records every written frame
#[derive(Default)]
pub struct FakeOutput {
    samples_per_frame: AtomicUsize,
    frames: Mutex<Vec<Vec<i16>>>,
    closed: AtomicBool,
    closes: AtomicUsize,
    writes_after_close: AtomicUsize,
}

impl FakeOutput {
    fn configure(&self, samples_per_frame: usize) {
        self.samples_per_frame.store(samples_per_frame, Ordering::SeqCst);
        self.closed.store(false, Ordering::SeqCst);
    }

    pub fn frames(&self) -> Vec<Vec<i16>> {
        self.frames.lock().clone()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn writes_after_close(&self) -> usize {
        self.writes_after_close.load(Ordering::SeqCst)
    }
}

impl OutputStream for FakeOutput {
    fn write(&self, frame: &[i16]) -> Result<(), AudioError> {
        if self.closed.load(Ordering::SeqCst) {
            self.writes_after_close.fetch_add(1, Ordering::SeqCst);
            return Err(AudioError::StreamClosed);
        }

        let expected = self.samples_per_frame.load(Ordering::SeqCst);
        if frame.len() != expected {
            return Err(AudioError::InvalidFrameLength {
                expected,
                actual: frame.len(),
            });
        }

        self.frames.lock().push(frame.to_vec());
        Ok(())
    }

    fn close(&self) -> Result<(), AudioError> {
        self.closed.store(true, Ordering::SeqCst);
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A radio whose peer never answers: connects stay pending forever
pub struct SilentLink;

#[async_trait]
impl SerialLink for SilentLink {
    async fn connect(&self, _endpoint: SerialEndpoint) -> io::Result<BoxedStream> {
        std::future::pending().await
    }

    async fn listen(&self, _channel: Channel) -> io::Result<Box<dyn SerialListener>> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "silent link cannot listen"))
    }

    fn name(&self) -> &'static str {
        "silent"
    }
}

/// Small frames keep the tests fast: 8 samples per channel, stereo
pub fn test_audio_config() -> AudioConfig {
    AudioConfig {
        frames_per_buffer: 8,
        channels: 2,
        ..AudioConfig::default()
    }
}

/// A frame whose samples encode `seq` so order and content can be checked
pub fn numbered_frame(seq: i16, len: usize) -> Vec<i16> {
    (0..len as i16).map(|i| seq.wrapping_mul(100).wrapping_sub(i * 7)).collect()
}
