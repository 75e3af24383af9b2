//! Audio device enumeration and lookup

use cpal::traits::{DeviceTrait, HostTrait};

use crate::error::AudioError;

/// Description of one audio device
#[derive(Debug, Clone, PartialEq)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub is_input: bool,
    pub is_output: bool,
    pub is_default: bool,
    pub sample_rates: Vec<u32>,
    pub channels: Vec<u16>,
}

/// List all available audio devices.
///
/// A device that can both capture and play appears once.
pub fn list_devices() -> Vec<AudioDeviceInfo> {
    let host = cpal::default_host();
    let default_input = host.default_input_device().and_then(|d| d.name().ok());
    let default_output = host.default_output_device().and_then(|d| d.name().ok());

    let inputs = host.input_devices().into_iter().flatten().map(|d| (d, true));
    let outputs = host.output_devices().into_iter().flatten().map(|d| (d, false));

    let mut found: Vec<AudioDeviceInfo> = Vec::new();
    for (device, capture) in inputs.chain(outputs) {
        let Ok(name) = device.name() else { continue };
        let default_name = if capture { &default_input } else { &default_output };
        let is_default = default_name.as_deref() == Some(name.as_str());

        match found.iter_mut().find(|known| known.name == name) {
            Some(known) => {
                known.is_input |= capture;
                known.is_output |= !capture;
                known.is_default |= is_default;
            }
            None => {
                let (sample_rates, channels) = capabilities(&device, capture);
                found.push(AudioDeviceInfo {
                    name,
                    is_input: capture,
                    is_output: !capture,
                    is_default,
                    sample_rates,
                    channels,
                });
            }
        }
    }
    found
}

/// Common sample rates and channel counts the device supports
fn capabilities(device: &cpal::Device, capture: bool) -> (Vec<u32>, Vec<u16>) {
    let ranges: Vec<cpal::SupportedStreamConfigRange> = if capture {
        device.supported_input_configs().map(|c| c.collect()).unwrap_or_default()
    } else {
        device.supported_output_configs().map(|c| c.collect()).unwrap_or_default()
    };

    let mut rates: Vec<u32> = [8000u32, 16000, 22050, 44100, 48000, 96000]
        .into_iter()
        .filter(|&rate| {
            ranges.iter().any(|r| {
                (r.min_sample_rate().0..=r.max_sample_rate().0).contains(&rate)
            })
        })
        .collect();
    rates.dedup();

    let mut channels: Vec<u16> = ranges.iter().map(|r| r.channels()).collect();
    channels.sort_unstable();
    channels.dedup();

    (rates, channels)
}

/// Input device by name, or the default input device
pub fn find_input_device(name: Option<&str>) -> Result<cpal::Device, AudioError> {
    let host = cpal::default_host();

    match name {
        Some(name) => {
            let devices = host
                .input_devices()
                .map_err(|e| AudioError::CpalError(e.to_string()))?;
            find_by_name(devices, name)
        }
        None => host
            .default_input_device()
            .ok_or_else(|| AudioError::DeviceNotFound("No default input device".to_string())),
    }
}

/// Output device by name, or the default output device
pub fn find_output_device(name: Option<&str>) -> Result<cpal::Device, AudioError> {
    let host = cpal::default_host();

    match name {
        Some(name) => {
            let devices = host
                .output_devices()
                .map_err(|e| AudioError::CpalError(e.to_string()))?;
            find_by_name(devices, name)
        }
        None => host
            .default_output_device()
            .ok_or_else(|| AudioError::DeviceNotFound("No default output device".to_string())),
    }
}

fn find_by_name(mut devices: impl Iterator<Item = cpal::Device>, name: &str) -> Result<cpal::Device, AudioError> {
    devices
        .find(|device| device.name().is_ok_and(|n| n == name))
        .ok_or_else(|| AudioError::DeviceNotFound(name.to_string()))
}
