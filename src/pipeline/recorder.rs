//! Capture pipeline: microphone to outbound channel

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::audio::{AudioBackend, CallbackStatus, InputStream};
use crate::codec::encode_frame;
use crate::config::AudioConfig;
use crate::error::AudioError;
use crate::network::OutboundChannel;

/// Recorder counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecorderStats {
    pub frames_captured: u64,
    pub payloads_sent: u64,
    pub send_failures: u64,
}

#[derive(Default)]
struct Counters {
    frames_captured: AtomicU64,
    payloads_sent: AtomicU64,
    send_failures: AtomicU64,
}

/// Streams captured frames to one peer
pub struct Recorder<O: OutboundChannel + 'static> {
    stream: Option<Box<dyn InputStream>>,
    outbound: Arc<O>,
    running: Arc<AtomicBool>,
    counters: Arc<Counters>,
    /// How long `stop` waits for the final callback
    stop_grace: Duration,
}

/// Shortest wait for the final callback; drivers deliver blocks larger than a frame
const MIN_STOP_GRACE: Duration = Duration::from_millis(50);

impl<O: OutboundChannel + 'static> Recorder<O> {
    /// Open the input stream and start sending.
    ///
    /// A stream that cannot be opened is fatal; the outbound channel is
    /// dropped with the error.
    pub fn start(backend: &dyn AudioBackend, config: &AudioConfig, outbound: O) -> Result<Self, AudioError> {
        let outbound = Arc::new(outbound);
        let running = Arc::new(AtomicBool::new(true));
        let counters = Arc::new(Counters::default());

        let format = config.wire_format;
        // Allocated once; the callback runs on the audio thread
        let mut payload = vec![0u8; config.max_frame_payload()];

        let sink = outbound.clone();
        let flag = running.clone();
        let stats = counters.clone();

        let on_frame = Box::new(move |frame: &[i16]| {
            if !flag.load(Ordering::Acquire) {
                return CallbackStatus::Complete;
            }
            stats.frames_captured.fetch_add(1, Ordering::Relaxed);

            let len = encode_frame(format, frame, &mut payload);
            match sink.send(&payload[..len]) {
                Ok(()) => {
                    stats.payloads_sent.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    let failures = stats.send_failures.fetch_add(1, Ordering::Relaxed) + 1;
                    if failures == 1 || failures % 1000 == 0 {
                        tracing::warn!("Send failed ({} so far): {}", failures, e);
                    }
                }
            }
            CallbackStatus::Continue
        });

        let stream = backend.open_input(config, on_frame)?;

        tracing::info!(
            "Recorder started ({:?} payloads of up to {} bytes)",
            format,
            config.max_frame_payload()
        );

        Ok(Self {
            stream: Some(stream),
            outbound,
            running,
            counters,
            stop_grace: (config.frame_duration() * 3).max(MIN_STOP_GRACE),
        })
    }

    /// Channel payloads are sent on
    pub fn outbound(&self) -> &O {
        &self.outbound
    }

    /// Check if the capture stream is still delivering frames
    pub fn is_active(&self) -> bool {
        self.stream.as_ref().is_some_and(|s| s.is_active())
    }

    /// Get statistics
    pub fn stats(&self) -> RecorderStats {
        RecorderStats {
            frames_captured: self.counters.frames_captured.load(Ordering::Relaxed),
            payloads_sent: self.counters.payloads_sent.load(Ordering::Relaxed),
            send_failures: self.counters.send_failures.load(Ordering::Relaxed),
        }
    }

    /// Signal the final callback and close the input stream. Idempotent.
    ///
    /// The driver gets a few frame durations to run the callback that
    /// returns `Complete` before the stream is closed.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);

        if let Some(mut stream) = self.stream.take() {
            let deadline = Instant::now() + self.stop_grace;
            while stream.is_active() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(1));
            }
            if stream.is_active() {
                tracing::debug!("No final capture callback within {:?}", self.stop_grace);
            }

            if let Err(e) = stream.close() {
                tracing::error!("Failed to close input stream: {}", e);
            }

            let stats = self.stats();
            tracing::info!(
                "Recorder stopped: {} frames captured, {} sent, {} failed",
                stats.frames_captured,
                stats.payloads_sent,
                stats.send_failures
            );
        }
    }
}

impl<O: OutboundChannel + 'static> Drop for Recorder<O> {
    fn drop(&mut self) {
        // The stream goes first so no callback can reach a dropped channel
        self.stop();
    }
}
