//! Live audio capture using cpal

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::thread;

use crate::error::AudioError;

/// Microphone capture source.
///
/// Runs the cpal stream on a dedicated thread since `cpal::Stream` is not
/// `Send`; mono sample batches are communicated through a crossbeam channel.
pub struct CaptureSource {
    sample_rx: Receiver<Vec<f32>>,
    stop_tx: Sender<()>,
    sample_rate: u32,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl CaptureSource {
    /// Open the named input device ("default" for the system default) and
    /// start capturing.
    pub fn open(device_name: &str) -> Result<Self, AudioError> {
        let host = cpal::default_host();

        let device = if device_name == "default" {
            host.default_input_device().ok_or(AudioError::NoDefaultInput)?
        } else {
            find_device_by_name(&host, device_name)?
        };

        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        tracing::info!("Capturing from audio device: {}", name);

        let supported = device
            .default_input_config()
            .map_err(|e| AudioError::UnsupportedConfig(e.to_string()))?;

        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();
        let sample_format = supported.sample_format();
        let stream_config: StreamConfig = supported.into();

        tracing::debug!(
            "Capture config: {} Hz, {} channels, {:?}",
            sample_rate,
            channels,
            sample_format
        );

        let (sample_tx, sample_rx) = bounded::<Vec<f32>>(32);
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let thread_handle = thread::Builder::new()
            .name("lipwave-capture".to_string())
            .spawn(move || {
                run_capture_thread(device, stream_config, sample_format, channels, sample_tx, stop_rx);
            })
            .map_err(|e| AudioError::StreamBuild(format!("Failed to spawn capture thread: {e}")))?;

        Ok(Self {
            sample_rx,
            stop_tx,
            sample_rate,
            thread_handle: Some(thread_handle),
        })
    }

    pub fn samples(&self) -> &Receiver<Vec<f32>> {
        &self.sample_rx
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for CaptureSource {
    fn drop(&mut self) {
        // Signal the capture thread to stop, then join so the device is fully
        // released before we return. Toggling capture on/off repeatedly must
        // not leak streams.
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_capture_thread(
    device: Device,
    config: StreamConfig,
    sample_format: cpal::SampleFormat,
    channels: u16,
    sample_tx: Sender<Vec<f32>>,
    stop_rx: Receiver<()>,
) {
    let stream = match build_input_stream(&device, &config, sample_format, channels, sample_tx) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to build capture stream: {}", e);
            return;
        }
    };

    if let Err(e) = stream.play() {
        tracing::error!("Failed to start capture stream: {}", e);
        return;
    }

    tracing::debug!("Capture thread started");
    let _ = stop_rx.recv();
    tracing::debug!("Capture thread stopping");
    drop(stream);
}

fn find_device_by_name(host: &cpal::Host, name: &str) -> Result<Device, AudioError> {
    let devices = host
        .input_devices()
        .map_err(|e| AudioError::DeviceEnumeration(e.to_string()))?;

    for device in devices {
        if let Ok(device_name) = device.name() {
            if device_name.contains(name) || name.contains(&device_name) {
                return Ok(device);
            }
        }
    }

    Err(AudioError::NoDeviceFound)
}

/// Average interleaved frames down to mono
fn downmix(data: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    let channels = channels as usize;
    data.chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

fn build_input_stream(
    device: &Device,
    config: &StreamConfig,
    sample_format: cpal::SampleFormat,
    channels: u16,
    tx: Sender<Vec<f32>>,
) -> Result<Stream, AudioError> {
    let err_fn = |err| tracing::error!("Capture stream error: {}", err);

    let stream = match sample_format {
        cpal::SampleFormat::F32 => device.build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let _ = tx.try_send(downmix(data, channels));
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_input_stream(
            config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let samples: Vec<f32> =
                    data.iter().map(|&s| s as f32 / i16::MAX as f32).collect();
                let _ = tx.try_send(downmix(&samples, channels));
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::U16 => device.build_input_stream(
            config,
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                let samples: Vec<f32> = data
                    .iter()
                    .map(|&s| (s as f32 / u16::MAX as f32) * 2.0 - 1.0)
                    .collect();
                let _ = tx.try_send(downmix(&samples, channels));
            },
            err_fn,
            None,
        ),
        other => {
            return Err(AudioError::UnsupportedConfig(format!(
                "Unsupported sample format: {other:?}"
            )));
        }
    }
    .map_err(|e| AudioError::StreamBuild(e.to_string()))?;

    Ok(stream)
}

/// List all available input devices
pub fn list_input_devices() -> Vec<String> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    if let Ok(input_devices) = host.input_devices() {
        for device in input_devices {
            if let Ok(name) = device.name() {
                devices.push(name);
            }
        }
    }

    devices
}

/// Get the default input device name
pub fn default_input_device_name() -> Option<String> {
    let host = cpal::default_host();
    host.default_input_device().and_then(|d| d.name().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_stereo() {
        let interleaved = [0.0, 1.0, 0.5, 0.5, -1.0, 1.0];
        let mono = downmix(&interleaved, 2);
        assert_eq!(mono, vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_downmix_mono_passthrough() {
        let data = [0.1, 0.2, 0.3];
        assert_eq!(downmix(&data, 1), data.to_vec());
    }
}
