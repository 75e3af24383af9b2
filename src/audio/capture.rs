//! Audio capture from an input device
//!
//! cpal streams cannot leave the thread that built them on every platform,
//! so each capture stream lives on its own thread for its whole lifetime.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, StreamConfig};
use crossbeam_channel::bounded;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::backend::{CallbackStatus, FrameCallback, InputStream};
use super::buffer::FrameBuffer;
use super::device::find_input_device;
use crate::config::AudioConfig;
use crate::error::AudioError;

/// A running cpal capture stream
pub struct CpalInputStream {
    /// Whether the stream thread should keep the stream alive
    running: Arc<AtomicBool>,

    /// Set once the callback returned `Complete`
    completed: Arc<AtomicBool>,

    /// Stream thread handle
    thread_handle: Option<JoinHandle<()>>,
}

impl CpalInputStream {
    /// Open and start the input stream.
    ///
    /// Returns once the stream is playing, or with the error that kept it
    /// from starting.
    pub fn open(config: &AudioConfig, on_frame: FrameCallback) -> Result<Self, AudioError> {
        let running = Arc::new(AtomicBool::new(true));
        let completed = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);

        let stream_config = config.clone();
        let running_for_loop = running.clone();
        let completed_for_stream = completed.clone();

        let handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                let stream = match build_stream(&stream_config, on_frame, completed_for_stream) {
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

                // Keep thread alive while running
                while running_for_loop.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(10));
                }

                // Stream is dropped here, stopping capture
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        let ready = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(AudioError::StreamError("capture thread exited".to_string())));

        if let Err(e) = ready {
            let _ = handle.join();
            return Err(e);
        }

        tracing::info!(
            "Capture stream opened: {}Hz, {} channels, {} frames per buffer",
            config.sample_rate,
            config.channels,
            config.frames_per_buffer
        );

        Ok(Self {
            running,
            completed,
            thread_handle: Some(handle),
        })
    }
}

impl InputStream for CpalInputStream {
    fn close(&mut self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            handle
                .join()
                .map_err(|_| AudioError::StreamError("capture thread panicked".to_string()))?;
            tracing::info!("Capture stream closed");
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.thread_handle.is_some() && !self.completed.load(Ordering::Relaxed)
    }
}

impl Drop for CpalInputStream {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!("Failed to close capture stream: {}", e);
        }
    }
}

fn build_stream(config: &AudioConfig, on_frame: FrameCallback, completed: Arc<AtomicBool>) -> Result<cpal::Stream, AudioError> {
    let device = find_input_device(config.input_device.as_deref())?;
    let sample_format = device
        .default_input_config()
        .map_err(|e| AudioError::DeviceNotFound(e.to_string()))?
        .sample_format();

    let stream_config = StreamConfig {
        channels: config.channels,
        sample_rate: cpal::SampleRate(config.sample_rate),
        // Few hosts accept 16-frame buffers; FrameBuffer regroups instead
        buffer_size: cpal::BufferSize::Default,
    };
    let samples_per_frame = config.samples_per_frame();

    match sample_format {
        SampleFormat::I16 => build_typed::<i16>(&device, &stream_config, samples_per_frame, on_frame, completed),
        SampleFormat::U16 => build_typed::<u16>(&device, &stream_config, samples_per_frame, on_frame, completed),
        SampleFormat::F32 => build_typed::<f32>(&device, &stream_config, samples_per_frame, on_frame, completed),
        other => Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
    }
}

fn build_typed<T>(
    device: &cpal::Device,
    stream_config: &StreamConfig,
    samples_per_frame: usize,
    mut on_frame: FrameCallback,
    completed: Arc<AtomicBool>,
) -> Result<cpal::Stream, AudioError>
where
    T: SizedSample,
    i16: FromSample<T>,
{
    // Drivers may deliver other block sizes; regroup into exact frames
    let mut frame = FrameBuffer::new(samples_per_frame);

    device
        .build_input_stream(
            stream_config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                if completed.load(Ordering::Relaxed) {
                    return;
                }

                for &sample in data {
                    if let Some(full) = frame.push(<i16 as Sample>::from_sample(sample)) {
                        if on_frame(full) == CallbackStatus::Complete {
                            completed.store(true, Ordering::Relaxed);
                            return;
                        }
                    }
                }
            },
            |err| {
                tracing::error!("Capture stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamError(e.to_string()))
}
