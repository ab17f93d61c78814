//! Audio device access via the cpal backend.
//!
//! # Design constraints
//!
//! cpal callbacks run on an OS audio thread at elevated priority. They
//! **must not** allocate on the steady path, block on a mutex, or perform I/O.
//! The input side writes into an SPSC ring producer; the output side (see
//! [`output`]) reads commands from one and returns finished voices over a
//! bounded channel.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows, CoreAudio on
//! macOS). Streams are therefore created and dropped on one dedicated thread;
//! callers talk to that thread through `Send` handles.

pub mod device;
pub mod output;
pub mod resample;

use std::sync::{atomic::AtomicBool, Arc};
#[cfg(feature = "audio-cpal")]
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{
    buffering::AudioProducer,
    error::{CallError, Result},
};

pub use output::{CpalOutput, SpeakerDevice};

/// An open input stream. Dropping it releases the device.
///
/// Not required to be `Send`: it lives and dies on the capture thread.
pub trait InputStream {
    /// Actual device sample rate (Hz) of the mono samples being produced.
    fn sample_rate(&self) -> u32;

    /// Samples the callback could not fit into the ring so far.
    fn dropped_samples(&self) -> usize {
        0
    }
}

/// Something that can open a microphone.
pub trait InputBackend: Send + Sync + 'static {
    /// Open the device on the calling thread and start pushing mono f32
    /// samples into `producer` while `running` is set.
    ///
    /// # Errors
    /// `PermissionDenied`, `DeviceUnavailable`, or `AudioStream`.
    fn open(&self, producer: AudioProducer, running: Arc<AtomicBool>)
        -> Result<Box<dyn InputStream>>;
}

/// Map a backend error message onto the call error taxonomy.
///
/// cpal reports OS permission failures as opaque backend-specific strings,
/// so the classification is textual.
pub fn classify_device_error(message: impl Into<String>) -> CallError {
    let message = message.into();
    let lowered = message.to_ascii_lowercase();
    if ["permission", "denied", "not permitted", "unauthorized", "not authorized"]
        .iter()
        .any(|k| lowered.contains(k))
    {
        CallError::PermissionDenied(message)
    } else if ["not available", "no longer available", "busy", "not found", "no device"]
        .iter()
        .any(|k| lowered.contains(k))
    {
        CallError::DeviceUnavailable(message)
    } else {
        CallError::AudioStream(message)
    }
}

/// Microphone backed by the cpal default host.
#[derive(Debug, Clone, Default)]
pub struct CpalInput {
    #[cfg_attr(not(feature = "audio-cpal"), allow(dead_code))]
    preferred_device: Option<String>,
}

impl CpalInput {
    pub fn new(preferred_device: Option<String>) -> Self {
        Self { preferred_device }
    }
}

/// Live cpal input stream.
#[cfg(feature = "audio-cpal")]
pub struct MicStream {
    /// Kept alive so the stream is not dropped prematurely.
    _stream: cpal::Stream,
    sample_rate: u32,
    dropped: Arc<AtomicUsize>,
}

#[cfg(feature = "audio-cpal")]
impl InputStream for MicStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn dropped_samples(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(feature = "audio-cpal")]
impl InputBackend for CpalInput {
    fn open(
        &self,
        producer: AudioProducer,
        running: Arc<AtomicBool>,
    ) -> Result<Box<dyn InputStream>> {
        use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
        use cpal::{SampleFormat, StreamConfig};
        use tracing::{info, warn};

        let host = cpal::default_host();
        let mut selected = None;

        if let Some(preferred) = self.preferred_device.as_deref() {
            match host.input_devices() {
                Ok(mut devices) => {
                    selected = devices.find(|d| d.name().map(|n| n == preferred).unwrap_or(false));
                    if selected.is_none() {
                        warn!("preferred input device '{preferred}' not found, falling back");
                    }
                }
                Err(e) => warn!("failed to list input devices while resolving preference: {e}"),
            }
        }

        let device = match selected.or_else(|| host.default_input_device()) {
            Some(device) => device,
            None => {
                let recommended = device::list_devices()
                    .into_iter()
                    .find(|d| d.direction == device::DeviceDirection::Input && d.is_recommended)
                    .ok_or_else(|| CallError::DeviceUnavailable("no input device found".into()))?;
                host.input_devices()
                    .map_err(|e| classify_device_error(e.to_string()))?
                    .find(|d| d.name().map(|n| n == recommended.name).unwrap_or(false))
                    .ok_or_else(|| CallError::DeviceUnavailable("no input device found".into()))?
            }
        };

        info!(
            device = device.name().unwrap_or_default().as_str(),
            "opening input device"
        );

        let supported = device
            .default_input_config()
            .map_err(|e| classify_device_error(e.to_string()))?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();
        info!(sample_rate, channels, "input config selected");

        let config = StreamConfig {
            channels,
            sample_rate: supported.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };
        let dropped = Arc::new(AtomicUsize::new(0));

        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_mono_input::<f32>(
                &device,
                &config,
                producer,
                running,
                Arc::clone(&dropped),
            ),
            SampleFormat::I16 => build_mono_input::<i16>(
                &device,
                &config,
                producer,
                running,
                Arc::clone(&dropped),
            ),
            SampleFormat::U16 => build_mono_input::<u16>(
                &device,
                &config,
                producer,
                running,
                Arc::clone(&dropped),
            ),
            SampleFormat::U8 => build_mono_input::<u8>(
                &device,
                &config,
                producer,
                running,
                Arc::clone(&dropped),
            ),
            fmt => {
                return Err(CallError::AudioStream(format!(
                    "unsupported sample format: {fmt:?}"
                )))
            }
        }?;

        stream
            .play()
            .map_err(|e| classify_device_error(e.to_string()))?;

        Ok(Box::new(MicStream {
            _stream: stream,
            sample_rate,
            dropped,
        }))
    }
}

/// Build an input stream that down-mixes any sample type to mono f32.
#[cfg(feature = "audio-cpal")]
fn build_mono_input<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut producer: AudioProducer,
    running: Arc<AtomicBool>,
    dropped: Arc<AtomicUsize>,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    use crate::buffering::Producer;
    use cpal::traits::DeviceTrait;
    use cpal::Sample;

    let ch = config.channels.max(1) as usize;
    let mut mix_buf: Vec<f32> = Vec::new();

    device
        .build_input_stream(
            config,
            move |data: &[T], _info: &cpal::InputCallbackInfo| {
                if !running.load(Ordering::Relaxed) {
                    return;
                }
                let frames = data.len() / ch;
                mix_buf.resize(frames, 0.0);
                for (f, frame) in data.chunks_exact(ch).enumerate() {
                    let sum: f32 = frame.iter().map(|s| f32::from_sample(*s)).sum();
                    mix_buf[f] = sum / ch as f32;
                }
                let written = producer.push_slice(&mix_buf);
                if written < mix_buf.len() {
                    dropped.fetch_add(mix_buf.len() - written, Ordering::Relaxed);
                }
            },
            |err| tracing::error!("input stream error: {err}"),
            None,
        )
        .map_err(|e| classify_device_error(e.to_string()))
}

/// Stub when the `audio-cpal` feature is disabled.
#[cfg(not(feature = "audio-cpal"))]
impl InputBackend for CpalInput {
    fn open(
        &self,
        _producer: AudioProducer,
        _running: Arc<AtomicBool>,
    ) -> Result<Box<dyn InputStream>> {
        Err(CallError::DeviceUnavailable(
            "compiled without audio-cpal feature".into(),
        ))
    }
}
