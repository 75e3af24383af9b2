//! Playback pipeline: inbound channel to speaker

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::audio::{AudioBackend, OutputStream};
use crate::codec::{decode_frame, FrameAssembler, SAMPLE_SILENCE};
use crate::config::AudioConfig;
use crate::error::Result;
use crate::network::{Delivery, InboundChannel, ReceiveCallback};

/// Player counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerStats {
    pub payloads_received: u64,
    pub frames_played: u64,
    pub write_failures: u64,
}

#[derive(Default)]
struct Counters {
    payloads_received: AtomicU64,
    frames_played: AtomicU64,
    write_failures: AtomicU64,
}

impl Counters {
    fn play(&self, output: &dyn OutputStream, frame: &[i16]) {
        match output.write(frame) {
            Ok(()) => {
                self.frames_played.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                let failures = self.write_failures.fetch_add(1, Ordering::Relaxed) + 1;
                if failures == 1 || failures % 1000 == 0 {
                    tracing::warn!("Playback write failed ({} so far): {}", failures, e);
                }
            }
        }
    }
}

/// Plays frames received on one inbound channel
pub struct Player<I: InboundChannel> {
    inbound: I,
    output: Option<Arc<dyn OutputStream>>,
    counters: Arc<Counters>,
}

impl<I: InboundChannel> Player<I> {
    /// Open the output stream, then start listening.
    ///
    /// The output stream is handed to the receive callback, so each player
    /// writes only to its own stream.
    pub fn start(backend: &dyn AudioBackend, config: &AudioConfig, mut inbound: I) -> Result<Self> {
        let output = backend.open_output(config)?;
        let counters = Arc::new(Counters::default());

        let on_receive = receive_callback(config, inbound.delivery(), output.clone(), counters.clone());

        if let Err(e) = inbound.start(on_receive) {
            if let Err(close_err) = output.close() {
                tracing::error!("Failed to close output stream: {}", close_err);
            }
            return Err(e.into());
        }

        tracing::info!("Player started ({:?} delivery, {:?} payloads)", inbound.delivery(), config.wire_format);

        Ok(Self {
            inbound,
            output: Some(output),
            counters,
        })
    }

    /// Channel payloads arrive on
    pub fn inbound(&self) -> &I {
        &self.inbound
    }

    /// Get statistics
    pub fn stats(&self) -> PlayerStats {
        PlayerStats {
            payloads_received: self.counters.payloads_received.load(Ordering::Relaxed),
            frames_played: self.counters.frames_played.load(Ordering::Relaxed),
            write_failures: self.counters.write_failures.load(Ordering::Relaxed),
        }
    }

    /// Stop the inbound channel, then close the output stream. Idempotent.
    pub fn stop(&mut self) {
        self.inbound.stop();

        if let Some(output) = self.output.take() {
            if let Err(e) = output.close() {
                tracing::error!("Failed to close output stream: {}", e);
            }

            let stats = self.stats();
            tracing::info!(
                "Player stopped: {} payloads received, {} frames played, {} failed",
                stats.payloads_received,
                stats.frames_played,
                stats.write_failures
            );
        }
    }
}

impl<I: InboundChannel> Drop for Player<I> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn receive_callback(
    config: &AudioConfig,
    delivery: Delivery,
    output: Arc<dyn OutputStream>,
    counters: Arc<Counters>,
) -> ReceiveCallback {
    let format = config.wire_format;
    let mut frame = vec![SAMPLE_SILENCE; config.samples_per_frame()];

    match delivery {
        // One payload is one frame; short or garbled payloads play as
        // partly silent frames
        Delivery::Datagram => Box::new(move |payload: &[u8]| {
            counters.payloads_received.fetch_add(1, Ordering::Relaxed);
            decode_frame(format, payload, &mut frame);
            counters.play(output.as_ref(), &frame);
        }),
        Delivery::Stream => {
            let mut assembler = FrameAssembler::new(format, frame.len());
            Box::new(move |chunk: &[u8]| {
                counters.payloads_received.fetch_add(1, Ordering::Relaxed);
                assembler.push(chunk);
                while assembler.next_frame(&mut frame) {
                    counters.play(output.as_ref(), &frame);
                }
            })
        }
    }
}

