//! Opens the input device, pushes frames through the VAD into a
//! [`RingBuffer`], and resamples on drain.
//!
//! Ownership: this struct exclusively owns the device handle, the cpal
//! stream (and therefore the OS's capture callback), the VAD, and the ring
//! buffer; nothing else touches VAD state except `reset()` on start/stop,
//! which is serialized by the `collecting` gate.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use super::resampler::resample_to_16k;
use crate::error::{PipelineError, Result};
use crate::ring_buffer::RingBuffer;
use crate::vad::{VadConfig, VoiceActivityDetector};

/// Audio device information, for device-selection UIs/CLIs.
#[derive(Debug, Clone)]
pub struct AudioDevice {
    pub id: String,
    pub name: String,
    pub is_default: bool,
}

pub fn list_input_devices() -> Result<Vec<AudioDevice>> {
    let host = cpal::default_host();
    let default_name = host
        .default_input_device()
        .and_then(|d| d.name().ok())
        .unwrap_or_default();

    let mut devices = Vec::new();
    let input_devices = host
        .input_devices()
        .map_err(|e| PipelineError::Stream(e.to_string()))?;
    for device in input_devices {
        if let Ok(name) = device.name() {
            let is_default = name == default_name;
            devices.push(AudioDevice {
                id: name.clone(),
                name,
                is_default,
            });
        }
    }
    Ok(devices)
}

fn get_device(device_id: Option<&str>) -> Result<Device> {
    let host = cpal::default_host();
    match device_id {
        Some(id) if id != "default" => {
            let input_devices = host
                .input_devices()
                .map_err(|e| PipelineError::Stream(e.to_string()))?;
            for device in input_devices {
                if device.name().map(|n| n == id).unwrap_or(false) {
                    return Ok(device);
                }
            }
            Err(PipelineError::NoInputDevice)
        }
        _ => host.default_input_device().ok_or(PipelineError::NoInputDevice),
    }
}

struct SelectedConfig {
    config: StreamConfig,
    sample_format: SampleFormat,
}

fn select_input_config(device: &Device) -> Result<SelectedConfig> {
    if let Ok(supported) = device.supported_input_configs() {
        for range in supported {
            if range.channels() == 1 {
                let supported_config = range.with_max_sample_rate();
                return Ok(SelectedConfig {
                    config: supported_config.clone().into(),
                    sample_format: supported_config.sample_format(),
                });
            }
        }
    }
    let supported_config = device
        .default_input_config()
        .map_err(|_| PipelineError::NoInputDevice)?;
    Ok(SelectedConfig {
        config: supported_config.clone().into(),
        sample_format: supported_config.sample_format(),
    })
}

const MIN_GAIN: f32 = 0.5;
const MAX_GAIN: f32 = 3.0;

pub struct AudioCapture {
    device_id: Option<String>,
    stream: Option<Stream>,
    sample_rate: Arc<AtomicU32>,
    audio_level_bits: Arc<AtomicU32>,
    input_gain_bits: Arc<AtomicU32>,
    collecting: Arc<AtomicBool>,
    vad: Arc<Mutex<VoiceActivityDetector>>,
    vad_config: VadConfig,
    ring_buffer: Arc<RingBuffer>,
}

impl AudioCapture {
    pub fn new() -> Self {
        Self {
            device_id: None,
            stream: None,
            sample_rate: Arc::new(AtomicU32::new(16000)),
            audio_level_bits: Arc::new(AtomicU32::new(0)),
            input_gain_bits: Arc::new(AtomicU32::new(1.0f32.to_bits())),
            collecting: Arc::new(AtomicBool::new(false)),
            vad: Arc::new(Mutex::new(VoiceActivityDetector::new(16000))),
            vad_config: VadConfig::default(),
            ring_buffer: Arc::new(RingBuffer::new()),
        }
    }

    pub fn with_device(device_id: Option<String>) -> Self {
        Self {
            device_id,
            ..Self::new()
        }
    }

    pub fn set_vad_config(&mut self, config: VadConfig) {
        self.vad_config = config.clone();
        self.vad.lock().unwrap().apply_config(config);
    }

    pub fn set_input_gain(&self, gain: f32) {
        self.input_gain_bits
            .store(gain.clamp(MIN_GAIN, MAX_GAIN).to_bits(), Ordering::Relaxed);
    }

    pub fn audio_level(&self) -> f32 {
        f32::from_bits(self.audio_level_bits.load(Ordering::Relaxed))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Relaxed)
    }

    pub fn is_speaking(&self) -> bool {
        self.vad.lock().unwrap().is_speaking()
    }

    /// Idempotent: opens the device and starts the capture callback if not
    /// already running.
    pub fn prepare(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let device = get_device(self.device_id.as_deref())?;
        let selected = select_input_config(&device)?;
        let sample_rate = selected.config.sample_rate.0;
        let channels = selected.config.channels as usize;

        info!(
            "opening input device at {} Hz, {} channels, format {:?}",
            sample_rate, channels, selected.sample_format
        );

        self.sample_rate.store(sample_rate, Ordering::Relaxed);
        *self.vad.lock().unwrap() =
            VoiceActivityDetector::with_config(sample_rate, self.vad_config.clone());

        let ring_buffer = self.ring_buffer.clone();
        let vad = self.vad.clone();
        let collecting = self.collecting.clone();
        let audio_level_bits = self.audio_level_bits.clone();
        let input_gain_bits = self.input_gain_bits.clone();

        let error_callback = |err| warn!("audio stream error: {}", err);

        let stream = match selected.sample_format {
            SampleFormat::F32 => device.build_input_stream(
                &selected.config,
                move |data: &[f32], _| {
                    let samples = downmix_f32(data, channels);
                    handle_frame(
                        &samples,
                        &ring_buffer,
                        &vad,
                        &collecting,
                        &audio_level_bits,
                        &input_gain_bits,
                    );
                },
                error_callback,
                None,
            ),
            SampleFormat::I16 => device.build_input_stream(
                &selected.config,
                move |data: &[i16], _| {
                    let samples: Vec<f32> =
                        data.chunks(channels).map(|c| c[0] as f32 / 32768.0).collect();
                    handle_frame(
                        &samples,
                        &ring_buffer,
                        &vad,
                        &collecting,
                        &audio_level_bits,
                        &input_gain_bits,
                    );
                },
                error_callback,
                None,
            ),
            SampleFormat::U8 => device.build_input_stream(
                &selected.config,
                move |data: &[u8], _| {
                    let samples: Vec<f32> = data
                        .chunks(channels)
                        .map(|c| (c[0] as f32 - 128.0) / 128.0)
                        .collect();
                    handle_frame(
                        &samples,
                        &ring_buffer,
                        &vad,
                        &collecting,
                        &audio_level_bits,
                        &input_gain_bits,
                    );
                },
                error_callback,
                None,
            ),
            other => {
                return Err(PipelineError::Stream(format!(
                    "unsupported sample format: {other:?}"
                )))
            }
        }
        .map_err(|e| PipelineError::Stream(e.to_string()))?;

        stream.play().map_err(|e| PipelineError::Stream(e.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }

    /// Resets the VAD, discards whatever was previously buffered, and
    /// starts gating frames into the ring buffer.
    pub fn start_recording(&mut self) -> Result<()> {
        self.prepare()?;
        self.vad.lock().unwrap().reset();
        let _ = self.ring_buffer.drain();
        self.collecting.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Stops gating, drains the buffer, resets the VAD, and resamples the
    /// captured audio to 16 kHz mono.
    pub fn stop_recording(&mut self) -> Vec<f32> {
        self.collecting.store(false, Ordering::Relaxed);
        let raw = self.ring_buffer.drain();
        self.vad.lock().unwrap().reset();
        resample_to_16k(&raw, self.sample_rate())
    }

    /// Drains without touching VAD/collecting state; used by the
    /// continuous-mode monitor tick, which drains mid-recording.
    pub fn drain_resampled(&self) -> Vec<f32> {
        let raw = self.ring_buffer.drain();
        resample_to_16k(&raw, self.sample_rate())
    }

    pub fn buffered_raw_duration_seconds(&self) -> f64 {
        self.ring_buffer.count() as f64 / self.sample_rate().max(1) as f64
    }

    /// Pushes already-gated samples straight into the ring buffer, bypassing
    /// the device callback. Lets pipeline tests exercise the record/drain
    /// path without real capture hardware.
    #[cfg(test)]
    pub(crate) fn inject_for_test(&self, samples: &[f32]) {
        self.ring_buffer.append(samples);
    }

    /// Stops the capture thread and closes the device.
    pub fn release(&mut self) {
        self.collecting.store(false, Ordering::Relaxed);
        if let Some(stream) = self.stream.take() {
            drop(stream);
            debug!("audio device released");
        }
    }
}

impl Default for AudioCapture {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_frame(
    samples: &[f32],
    ring_buffer: &RingBuffer,
    vad: &Mutex<VoiceActivityDetector>,
    collecting: &AtomicBool,
    audio_level_bits: &AtomicU32,
    input_gain_bits: &AtomicU32,
) {
    let level = rms(samples).clamp(0.0, 1.0);
    audio_level_bits.store(level.to_bits(), Ordering::Relaxed);

    if !collecting.load(Ordering::Relaxed) {
        return;
    }

    let gain = f32::from_bits(input_gain_bits.load(Ordering::Relaxed));
    let gated: Vec<f32> = if (gain - 1.0).abs() > f32::EPSILON {
        samples.iter().map(|s| s * gain).collect()
    } else {
        samples.to_vec()
    };

    let emitted = vad.lock().unwrap().process(&gated);
    if !emitted.is_empty() {
        ring_buffer.append(&emitted);
    }
}

fn downmix_f32(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        data.to_vec()
    } else {
        data.chunks(channels).map(|c| c[0]).collect()
    }
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_defaults_to_unity_and_clamps() {
        let capture = AudioCapture::new();
        capture.set_input_gain(10.0);
        assert_eq!(
            f32::from_bits(capture.input_gain_bits.load(Ordering::Relaxed)),
            MAX_GAIN
        );
        capture.set_input_gain(0.0);
        assert_eq!(
            f32::from_bits(capture.input_gain_bits.load(Ordering::Relaxed)),
            MIN_GAIN
        );
    }

    #[test]
    fn downmix_takes_first_channel() {
        let stereo = vec![1.0, -1.0, 2.0, -2.0];
        assert_eq!(downmix_f32(&stereo, 2), vec![1.0, 2.0]);
    }
}
