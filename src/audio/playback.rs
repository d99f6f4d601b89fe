//! WAV file playback with analysis tap.
//!
//! File-based sources must keep playing audibly while being analysed, so the
//! output stream renders the file to the default output device and tees every
//! rendered chunk into the analysis channel.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::path::Path;
use std::thread;

use crate::error::AudioError;

/// File playback source: decodes a WAV file, plays it through the default
/// output device, and exposes the played samples for analysis.
pub struct PlaybackSource {
    sample_rx: Receiver<Vec<f32>>,
    stop_tx: Sender<()>,
    sample_rate: u32,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl PlaybackSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, AudioError> {
        let samples = decode_wav_mono(path.as_ref())?;
        let (mono, file_rate) = samples;

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoDefaultOutput)?;

        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::UnsupportedConfig(e.to_string()))?;

        if supported.sample_format() != cpal::SampleFormat::F32 {
            return Err(AudioError::UnsupportedConfig(format!(
                "Output device uses {:?}, expected f32",
                supported.sample_format()
            )));
        }

        let out_rate = supported.sample_rate().0;
        let channels = supported.channels();
        let stream_config: StreamConfig = supported.into();

        // Nearest-sample resample to the device rate; fidelity does not
        // matter here, the samples only drive mouth shapes.
        let mono = if file_rate != out_rate {
            resample_nearest(&mono, file_rate, out_rate)
        } else {
            mono
        };

        tracing::info!(
            "Playing {} ({} Hz -> {} Hz, {} samples)",
            path.as_ref().display(),
            file_rate,
            out_rate,
            mono.len()
        );

        let (sample_tx, sample_rx) = bounded::<Vec<f32>>(32);
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let thread_handle = thread::Builder::new()
            .name("lipwave-playback".to_string())
            .spawn(move || {
                run_playback_thread(device, stream_config, channels, mono, sample_tx, stop_rx);
            })
            .map_err(|e| AudioError::StreamBuild(format!("Failed to spawn playback thread: {e}")))?;

        Ok(Self {
            sample_rx,
            stop_tx,
            sample_rate: out_rate,
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

impl Drop for PlaybackSource {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_playback_thread(
    device: Device,
    config: StreamConfig,
    channels: u16,
    samples: Vec<f32>,
    sample_tx: Sender<Vec<f32>>,
    stop_rx: Receiver<()>,
) {
    let mut position = 0usize;
    let channels = channels as usize;
    let err_fn = |err| tracing::error!("Playback stream error: {}", err);

    let stream = device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            let frames = data.len() / channels;
            let mut tap = Vec::with_capacity(frames);

            for frame in data.chunks_exact_mut(channels) {
                let sample = if position < samples.len() {
                    let s = samples[position];
                    position += 1;
                    s
                } else {
                    0.0
                };
                for out in frame.iter_mut() {
                    *out = sample;
                }
                tap.push(sample);
            }

            // Analysis tap; dropped chunks are fine, the analyser only needs
            // a recent window.
            let _ = sample_tx.try_send(tap);
        },
        err_fn,
        None,
    );

    let stream = match stream {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to build playback stream: {}", e);
            return;
        }
    };

    if let Err(e) = stream.play() {
        tracing::error!("Failed to start playback stream: {}", e);
        return;
    }

    tracing::debug!("Playback thread started");
    let _ = stop_rx.recv();
    tracing::debug!("Playback thread stopping");
    drop(stream);
}

/// Decode a WAV file to normalized mono f32 samples
fn decode_wav_mono(path: &Path) -> Result<(Vec<f32>, u32), AudioError> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|e| AudioError::FileDecode(format!("{}: {}", path.display(), e)))?;
    let spec = reader.spec();

    let to_err = |e: hound::Error| AudioError::FileDecode(e.to_string());

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(to_err)?,
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max))
                .collect::<Result<Vec<_>, _>>()
                .map_err(to_err)?
        }
    };

    let channels = spec.channels.max(1) as usize;
    let mono: Vec<f32> = interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();

    Ok((mono, spec.sample_rate))
}

fn resample_nearest(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    let out_len = (samples.len() as u64 * to_rate as u64 / from_rate as u64) as usize;
    (0..out_len)
        .map(|i| {
            let src = i as u64 * from_rate as u64 / to_rate as u64;
            samples[(src as usize).min(samples.len() - 1)]
        })
        .collect()
}
