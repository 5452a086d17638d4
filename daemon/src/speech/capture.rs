use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{SyncSender, TrySendError};
use std::sync::Arc;

use super::DeviceError;

/// Microphone input delivering mono f32 chunks over a bounded channel.
pub struct AudioCapture {
    device: Device,
    sample_rate: u32,
    channels: u16,
    stream: Option<Stream>,
    failed: Arc<AtomicBool>,
}

impl AudioCapture {
    pub fn new(sample_rate: u32, channels: u16) -> Result<Self, DeviceError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| DeviceError("no default input device found".to_string()))?;

        tracing::info!(
            "Using input device: {}",
            device.name().unwrap_or_else(|_| "<unnamed>".to_string())
        );

        Ok(Self {
            device,
            sample_rate,
            channels,
            stream: None,
            failed: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_running(&self) -> bool {
        self.stream.is_some()
    }

    /// Set from the stream's error callback; the device must be reopened.
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn start(&mut self, audio_tx: SyncSender<Vec<f32>>) -> Result<(), DeviceError> {
        tracing::info!(
            "Configuring audio stream: {}Hz, {} channel(s)",
            self.sample_rate,
            self.channels
        );

        let supported_configs = self
            .device
            .supported_input_configs()
            .map_err(|e| DeviceError(format!("cannot query input configs: {e}")))?;

        let mut config: Option<StreamConfig> = None;
        for supported in supported_configs {
            tracing::debug!("Supported config: {:?}", supported);
            if supported.channels() == self.channels
                && supported.min_sample_rate().0 <= self.sample_rate
                && supported.max_sample_rate().0 >= self.sample_rate
            {
                config = Some(
                    supported
                        .with_sample_rate(cpal::SampleRate(self.sample_rate))
                        .into(),
                );
                break;
            }
        }

        let final_config =
            config.ok_or_else(|| DeviceError("no suitable audio configuration found".to_string()))?;

        let sample_format = self
            .device
            .default_input_config()
            .map(|c| c.sample_format())
            .unwrap_or(SampleFormat::F32);

        self.failed.store(false, Ordering::Relaxed);
        let failed = Arc::clone(&self.failed);
        let error_callback = move |err| {
            tracing::error!("Audio stream error: {}", err);
            failed.store(true, Ordering::Relaxed);
        };

        let channels = self.channels as usize;
        let stream = match sample_format {
            SampleFormat::F32 => self.device.build_input_stream(
                &final_config,
                move |data: &[f32], _: &_| {
                    forward_chunk(downmix(data.iter().copied(), channels), &audio_tx);
                },
                error_callback,
                None,
            ),
            SampleFormat::I16 => self.device.build_input_stream(
                &final_config,
                move |data: &[i16], _: &_| {
                    let samples = data.iter().map(|&s| s as f32 / i16::MAX as f32);
                    forward_chunk(downmix(samples, channels), &audio_tx);
                },
                error_callback,
                None,
            ),
            SampleFormat::U16 => self.device.build_input_stream(
                &final_config,
                move |data: &[u16], _: &_| {
                    let samples = data
                        .iter()
                        .map(|&s| (s as f32 - 32768.0) / i16::MAX as f32);
                    forward_chunk(downmix(samples, channels), &audio_tx);
                },
                error_callback,
                None,
            ),
            format => {
                return Err(DeviceError(format!("unsupported sample format: {format:?}")));
            }
        }
        .map_err(|e| DeviceError(format!("cannot open input stream: {e}")))?;

        stream
            .play()
            .map_err(|e| DeviceError(format!("cannot start input stream: {e}")))?;
        self.stream = Some(stream);

        tracing::info!("Audio capture started");
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            tracing::info!("Audio capture stopped");
        }
    }
}

fn downmix(samples: impl Iterator<Item = f32>, channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.collect();
    }
    let interleaved: Vec<f32> = samples.collect();
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

fn forward_chunk(chunk: Vec<f32>, audio_tx: &SyncSender<Vec<f32>>) {
    match audio_tx.try_send(chunk) {
        Ok(()) | Err(TrySendError::Disconnected(_)) => {}
        Err(TrySendError::Full(_)) => tracing::debug!("Audio consumer lagging, dropped a chunk"),
    }
}

// cpal streams are not Send on every backend. The capture is created, used
// and dropped by the listen worker only.
unsafe impl Send for AudioCapture {}
