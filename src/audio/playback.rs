//! Audio playback to an output device
//!
//! cpal pulls samples from a callback, so blocking writes are layered on a
//! bounded frame queue: [`CpalOutputStream::write`] waits for room in the
//! queue and the device callback drains it. When the queue runs dry the
//! device plays silence.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, StreamConfig};
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::backend::OutputStream;
use super::device::find_output_device;
use crate::config::AudioConfig;
use crate::error::AudioError;

/// A running cpal playback stream
pub struct CpalOutputStream {
    frames: Sender<Vec<i16>>,
    samples_per_frame: usize,
    write_timeout: Duration,

    running: Arc<AtomicBool>,
    underruns: Arc<AtomicU64>,
    thread_handle: Mutex<Option<JoinHandle<()>>>,
}

impl CpalOutputStream {
    /// Open and start the output stream
    pub fn open(config: &AudioConfig) -> Result<Self, AudioError> {
        let queue_depth = config.output_queue_frames.max(1);
        let (frames_tx, frames_rx) = bounded::<Vec<i16>>(queue_depth);
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);

        let running = Arc::new(AtomicBool::new(true));
        let underruns = Arc::new(AtomicU64::new(0));

        let stream_config = config.clone();
        let running_for_loop = running.clone();
        let underruns_for_stream = underruns.clone();

        let handle = thread::Builder::new()
            .name("audio-playback".to_string())
            .spawn(move || {
                let stream = match build_stream(&stream_config, frames_rx, underruns_for_stream) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(AudioError::StreamError(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                while running_for_loop.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(10));
                }
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        let ready = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(AudioError::StreamError("playback thread exited".to_string())));

        if let Err(e) = ready {
            let _ = handle.join();
            return Err(e);
        }

        tracing::info!(
            "Playback stream opened: {}Hz, {} channels, queue of {} frames",
            config.sample_rate,
            config.channels,
            queue_depth
        );

        Ok(Self {
            frames: frames_tx,
            samples_per_frame: config.samples_per_frame(),
            // Long enough for a full queue to drain through the device
            write_timeout: config.frame_duration() * queue_depth as u32 + Duration::from_millis(100),
            running,
            underruns,
            thread_handle: Mutex::new(Some(handle)),
        })
    }

    /// Device callbacks that found no queued frame
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    /// Frames waiting for the device
    pub fn queued_frames(&self) -> usize {
        self.frames.len()
    }
}

impl OutputStream for CpalOutputStream {
    fn write(&self, frame: &[i16]) -> Result<(), AudioError> {
        if frame.len() != self.samples_per_frame {
            return Err(AudioError::InvalidFrameLength {
                expected: self.samples_per_frame,
                actual: frame.len(),
            });
        }
        if !self.running.load(Ordering::Relaxed) {
            return Err(AudioError::StreamClosed);
        }

        match self.frames.send_timeout(frame.to_vec(), self.write_timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(AudioError::WriteTimeout),
            Err(SendTimeoutError::Disconnected(_)) => Err(AudioError::StreamClosed),
        }
    }

    fn close(&self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.lock().take() {
            handle
                .join()
                .map_err(|_| AudioError::StreamError("playback thread panicked".to_string()))?;
            tracing::info!("Playback stream closed ({} underruns)", self.underruns());
        }
        Ok(())
    }
}

impl Drop for CpalOutputStream {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!("Failed to close playback stream: {}", e);
        }
    }
}

fn build_stream(config: &AudioConfig, frames: Receiver<Vec<i16>>, underruns: Arc<AtomicU64>) -> Result<cpal::Stream, AudioError> {
    let device = find_output_device(config.output_device.as_deref())?;
    let sample_format = device
        .default_output_config()
        .map_err(|e| AudioError::DeviceNotFound(e.to_string()))?
        .sample_format();

    let stream_config = StreamConfig {
        channels: config.channels,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    match sample_format {
        SampleFormat::I16 => build_typed::<i16>(&device, &stream_config, frames, underruns),
        SampleFormat::U16 => build_typed::<u16>(&device, &stream_config, frames, underruns),
        SampleFormat::F32 => build_typed::<f32>(&device, &stream_config, frames, underruns),
        other => Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
    }
}

fn build_typed<T>(
    device: &cpal::Device,
    stream_config: &StreamConfig,
    frames: Receiver<Vec<i16>>,
    underruns: Arc<AtomicU64>,
) -> Result<cpal::Stream, AudioError>
where
    T: SizedSample + FromSample<i16>,
{
    let mut current: Vec<i16> = Vec::new();
    let mut cursor = 0usize;

    device
        .build_output_stream(
            stream_config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let mut starved = false;

                for out in data.iter_mut() {
                    if cursor >= current.len() {
                        match frames.try_recv() {
                            Ok(frame) => {
                                current = frame;
                                cursor = 0;
                            }
                            Err(_) => {
                                current.clear();
                                cursor = 0;
                                starved = true;
                                *out = T::EQUILIBRIUM;
                                continue;
                            }
                        }
                    }

                    *out = T::from_sample(current[cursor]);
                    cursor += 1;
                }

                if starved {
                    underruns.fetch_add(1, Ordering::Relaxed);
                }
            },
            |err| {
                tracing::error!("Playback stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamError(e.to_string()))
}
