//! Speaker output: a lock-free mixer driven by the cpal output callback.
//!
//! ## Data flow
//!
//! ```text
//! SpeakerDevice::start ──► command ring ──► Mixer (output callback)
//! SpeakerDevice::stop_all ─► stop generation ─┤  drops voices from older generations
//!                                             │  mixes voices at their start frame
//!                                             │  advances the frame clock
//!                         finished ids ◄──────┤  (bounded crossbeam channel)
//!        dropped on caller thread ◄── graveyard ring (spent sample buffers)
//! ```
//!
//! The frame clock is the scheduler's notion of "now": frames rendered so far
//! divided by the device sample rate. Spent sample buffers travel back through
//! the graveyard ring so the callback never frees memory.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{
    audio::resample::RateConverter,
    buffering::{create_ring, frame::AudioBuffer, Consumer, Producer},
    codec::INBOUND_SAMPLE_RATE,
    error::{CallError, Result},
    playback::{OutputBackend, OutputDevice, UnitId},
};

/// Pending start/stop commands between the scheduler and the callback.
const COMMAND_CAPACITY: usize = 1024;
/// Voices the mixer holds at once. Later starts wait in the command ring.
const MAX_VOICES: usize = 1024;
/// Finished-unit notifications buffered for the completion forwarder.
const FINISHED_CAPACITY: usize = 256;
/// Block size for unit resampling.
const RESAMPLE_BLOCK: usize = 480;
/// Input samples of the preceding unit fed ahead of each conversion.
const RESAMPLE_CONTEXT: usize = 32;
/// Input samples of edge padding fed after each unit.
const RESAMPLE_TAIL: usize = 16;

pub(crate) enum MixerCommand {
    Start(Voice),
    Stop(UnitId),
}

pub(crate) struct Voice {
    id: UnitId,
    /// Stop generation the voice was queued under.
    generation: u64,
    start_frame: u64,
    samples: Vec<f32>,
}

/// Real-time side of the speaker. Owned by the output callback.
pub(crate) struct Mixer {
    commands: ringbuf::HeapCons<MixerCommand>,
    graveyard: ringbuf::HeapProd<Vec<f32>>,
    finished: crossbeam_channel::Sender<UnitId>,
    voices: Vec<Voice>,
    clock: Arc<AtomicU64>,
    stop_generation: Arc<AtomicU64>,
    /// Last stop generation acted on.
    generation: u64,
}

impl Mixer {
    fn apply_commands(&mut self) {
        loop {
            if let Some(MixerCommand::Start(voice)) = self.commands.first() {
                if voice.generation == self.generation && self.voices.len() >= MAX_VOICES {
                    break;
                }
            }
            let Some(cmd) = self.commands.try_pop() else {
                break;
            };
            match cmd {
                MixerCommand::Start(mut voice) => {
                    if voice.generation < self.generation {
                        // Queued before a stop-all.
                        self.bury(voice.samples);
                        continue;
                    }
                    if voice.generation > self.generation {
                        self.silence(voice.generation);
                    }
                    // A unit that arrives after its slot began plays from now.
                    voice.start_frame = voice.start_frame.max(self.clock.load(Ordering::Relaxed));
                    self.voices.push(voice);
                }
                MixerCommand::Stop(id) => {
                    if let Some(idx) = self.voices.iter().position(|v| v.id == id) {
                        let voice = self.voices.swap_remove(idx);
                        self.bury(voice.samples);
                    }
                }
            }
        }
    }

    /// Drop every voice without reporting completion.
    fn silence(&mut self, generation: u64) {
        self.generation = generation;
        while let Some(voice) = self.voices.pop() {
            self.bury(voice.samples);
        }
    }

    /// Render `out.len()` mono frames and advance the clock.
    pub(crate) fn render(&mut self, out: &mut [f32]) {
        let generation = self.stop_generation.load(Ordering::Acquire);
        if generation > self.generation {
            self.silence(generation);
        }
        self.apply_commands();
        out.fill(0.0);

        let base = self.clock.load(Ordering::Relaxed);
        let end = base + out.len() as u64;

        let mut idx = 0;
        while idx < self.voices.len() {
            let voice = &self.voices[idx];
            let voice_end = voice.start_frame + voice.samples.len() as u64;
            if voice.start_frame < end && voice_end > base {
                let from = voice.start_frame.max(base);
                let to = voice_end.min(end);
                for frame in from..to {
                    out[(frame - base) as usize] +=
                        voice.samples[(frame - voice.start_frame) as usize];
                }
            }
            if voice_end <= end {
                let voice = self.voices.swap_remove(idx);
                // Full channel: the scheduler keeps the id until interrupt/teardown.
                let _ = self.finished.try_send(voice.id);
                self.bury(voice.samples);
            } else {
                idx += 1;
            }
        }

        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
        self.clock.store(end, Ordering::Release);
    }

    fn bury(&mut self, samples: Vec<f32>) {
        // Graveyard full: the buffer is freed here instead.
        let _ = self.graveyard.try_push(samples);
    }
}

/// Brings scheduled units to the device rate.
///
/// Every unit is converted on its own, led in by the last input samples of
/// the unit it directly follows, and cut to exactly the device frames its
/// clock slot covers. A run of back-to-back units therefore renders as one
/// continuous signal while each unit still completes on its own.
struct UnitResampler {
    device_rate: u32,
    /// Converter for the last input rate seen.
    converter: Option<(u32, RateConverter)>,
    /// Trailing input of the previous unit.
    history: Vec<f32>,
    /// Clock time the previous unit ends at, while the run is unbroken.
    history_end: Option<f64>,
}

impl UnitResampler {
    fn new(device_rate: u32) -> Self {
        Self {
            device_rate,
            converter: None,
            history: Vec::with_capacity(RESAMPLE_CONTEXT),
            history_end: None,
        }
    }

    fn frame_at(&self, secs: f64) -> u64 {
        (secs.max(0.0) * self.device_rate as f64).round() as u64
    }

    /// Start frame and device-rate samples for `buffer` scheduled at `at`.
    fn place(&mut self, buffer: &AudioBuffer, at: f64) -> Result<(u64, Vec<f32>)> {
        let start_frame = self.frame_at(at);
        let mono = buffer.to_mono();
        let input_rate = buffer.sample_rate();
        if input_rate == self.device_rate {
            self.forget();
            return Ok((start_frame, mono));
        }
        let (Some(&first), Some(&last)) = (mono.first(), mono.last()) else {
            return Ok((start_frame, mono));
        };

        let end = at + buffer.duration_secs();
        let frames = self.frame_at(end).saturating_sub(start_frame) as usize;

        let mut converter = match self.converter.take() {
            Some((rate, converter)) if rate == input_rate => converter,
            _ => {
                self.forget();
                RateConverter::new(input_rate, self.device_rate, RESAMPLE_BLOCK)?
            }
        };

        let contiguous = self
            .history_end
            .is_some_and(|prev| (prev - at).abs() * (input_rate as f64) < 0.5);
        let mut input = Vec::with_capacity(RESAMPLE_CONTEXT + mono.len() + RESAMPLE_TAIL);
        if contiguous {
            input.extend_from_slice(&self.history);
        } else {
            input.resize(RESAMPLE_CONTEXT, first);
        }
        let lead_in = input.len();
        input.extend_from_slice(&mono);
        let body_end = input.len();
        input.resize(body_end + RESAMPLE_TAIL, last);

        converter.reset();
        let converted = converter.process_all(&input);
        let offset =
            converter.output_delay() + (lead_in as f64 * converter.ratio()).round() as usize;
        let mut samples: Vec<f32> = converted.into_iter().skip(offset).take(frames).collect();
        samples.resize(frames, last);

        self.history.clear();
        self.history
            .extend_from_slice(&input[body_end.saturating_sub(RESAMPLE_CONTEXT)..body_end]);
        self.history_end = Some(end);
        self.converter = Some((input_rate, converter));
        Ok((start_frame, samples))
    }

    /// Break the run. The next unit gets no lead-in from this one.
    fn forget(&mut self) {
        self.history.clear();
        self.history_end = None;
    }
}

/// `Send + Sync` control handle for an open speaker.
pub struct SpeakerDevice {
    commands: Mutex<ringbuf::HeapProd<MixerCommand>>,
    graveyard: Mutex<ringbuf::HeapCons<Vec<f32>>>,
    resampler: Mutex<UnitResampler>,
    clock: Arc<AtomicU64>,
    /// Bumped by `stop_all`; the mixer drops every voice from older generations.
    stop_generation: Arc<AtomicU64>,
    sample_rate: u32,
    completions: Mutex<Option<crossbeam_channel::Receiver<UnitId>>>,
    shutdown: Mutex<Option<crossbeam_channel::Sender<()>>>,
}

impl SpeakerDevice {
    /// Build a connected device/mixer pair. The mixer goes to the callback.
    pub(crate) fn wire(
        sample_rate: u32,
        shutdown: Option<crossbeam_channel::Sender<()>>,
    ) -> (Self, Mixer) {
        let (cmd_tx, cmd_rx) = create_ring::<MixerCommand>(COMMAND_CAPACITY);
        let (grave_tx, grave_rx) = create_ring::<Vec<f32>>(COMMAND_CAPACITY + MAX_VOICES);
        let (finished_tx, finished_rx) = crossbeam_channel::bounded(FINISHED_CAPACITY);
        let clock = Arc::new(AtomicU64::new(0));
        let stop_generation = Arc::new(AtomicU64::new(0));

        let mixer = Mixer {
            commands: cmd_rx,
            graveyard: grave_tx,
            finished: finished_tx,
            voices: Vec::with_capacity(MAX_VOICES),
            clock: Arc::clone(&clock),
            stop_generation: Arc::clone(&stop_generation),
            generation: 0,
        };
        let device = Self {
            commands: Mutex::new(cmd_tx),
            graveyard: Mutex::new(grave_rx),
            resampler: Mutex::new(UnitResampler::new(sample_rate)),
            clock,
            stop_generation,
            sample_rate,
            completions: Mutex::new(Some(finished_rx)),
            shutdown: Mutex::new(shutdown),
        };
        (device, mixer)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn push(&self, cmd: MixerCommand) -> bool {
        self.commands.lock().try_push(cmd).is_ok()
    }

    fn reap(&self) {
        let mut graveyard = self.graveyard.lock();
        while graveyard.try_pop().is_some() {}
    }
}

impl OutputDevice for SpeakerDevice {
    fn now(&self) -> f64 {
        self.clock.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }

    fn start(&self, id: UnitId, buffer: &AudioBuffer, at: f64) -> Result<()> {
        self.reap();

        let mut resampler = self.resampler.lock();
        let (start_frame, samples) = resampler.place(buffer, at)?;
        let voice = Voice {
            id,
            generation: self.stop_generation.load(Ordering::Acquire),
            start_frame,
            samples,
        };

        if self.push(MixerCommand::Start(voice)) {
            Ok(())
        } else {
            resampler.forget();
            Err(CallError::PlaybackQueueFull)
        }
    }

    fn stop(&self, id: UnitId) {
        if !self.push(MixerCommand::Stop(id)) {
            warn!(unit = id.0, "playback command queue full, stop not delivered");
        }
    }

    fn stop_all(&self) -> bool {
        self.stop_generation.fetch_add(1, Ordering::AcqRel);
        self.resampler.lock().forget();
        true
    }

    fn close(&self) {
        if let Some(shutdown) = self.shutdown.lock().take() {
            let _ = shutdown.try_send(());
            debug!("speaker close requested");
        }
    }

    fn completions(&self) -> Option<crossbeam_channel::Receiver<UnitId>> {
        self.completions.lock().take()
    }
}

impl Drop for SpeakerDevice {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens the default speaker through cpal.
#[derive(Debug, Clone)]
pub struct CpalOutput {
    /// Rate to request from the device when it supports it.
    #[cfg_attr(not(feature = "audio-cpal"), allow(dead_code))]
    preferred_rate: u32,
}

impl Default for CpalOutput {
    fn default() -> Self {
        Self {
            preferred_rate: INBOUND_SAMPLE_RATE,
        }
    }
}

impl CpalOutput {
    pub fn new(preferred_rate: u32) -> Self {
        Self { preferred_rate }
    }
}

#[cfg(feature = "audio-cpal")]
impl OutputBackend for CpalOutput {
    fn open(&self) -> Result<Arc<dyn OutputDevice>> {
        let preferred_rate = self.preferred_rate;
        let (open_tx, open_rx) = std::sync::mpsc::channel::<Result<SpeakerDevice>>();

        std::thread::Builder::new()
            .name("callbridge-speaker".into())
            .spawn(move || {
                let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
                let config = match speaker_config(preferred_rate) {
                    Ok(config) => config,
                    Err(e) => {
                        let _ = open_tx.send(Err(e));
                        return;
                    }
                };
                let (device, mixer) =
                    SpeakerDevice::wire(config.stream.sample_rate.0, Some(shutdown_tx));
                let stream = match build_speaker_stream(&config, mixer) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = open_tx.send(Err(e));
                        return;
                    }
                };
                let _ = open_tx.send(Ok(device));

                // Parks until close() or the device handle is dropped.
                let _ = shutdown_rx.recv();
                drop(stream);
                debug!("speaker stream released");
            })
            .map_err(CallError::Io)?;

        let device = open_rx
            .recv()
            .map_err(|_| CallError::AudioStream("speaker thread died unexpectedly".into()))??;
        tracing::info!(sample_rate = device.sample_rate(), "speaker opened");
        Ok(Arc::new(device))
    }
}

/// Mono frames rendered per mixer pass inside the output callback.
#[cfg(feature = "audio-cpal")]
const SCRATCH_FRAMES: usize = 4096;

#[cfg(feature = "audio-cpal")]
struct SpeakerConfig {
    device: cpal::Device,
    stream: cpal::StreamConfig,
    format: cpal::SampleFormat,
}

#[cfg(feature = "audio-cpal")]
fn speaker_config(preferred_rate: u32) -> Result<SpeakerConfig> {
    use cpal::traits::{DeviceTrait, HostTrait};
    use cpal::SampleRate;

    use crate::audio::classify_device_error;

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| CallError::DeviceUnavailable("no output device available".into()))?;

    let wanted = SampleRate(preferred_rate);
    let exact = device.supported_output_configs().ok().and_then(|mut configs| {
        configs.find(|c| c.min_sample_rate() <= wanted && c.max_sample_rate() >= wanted)
    });

    let supported = match exact {
        Some(range) => range.with_sample_rate(wanted),
        None => device
            .default_output_config()
            .map_err(|e| classify_device_error(e.to_string()))?,
    };

    debug!(
        device = device.name().unwrap_or_default().as_str(),
        sample_rate = supported.sample_rate().0,
        channels = supported.channels(),
        "speaker config selected"
    );

    Ok(SpeakerConfig {
        format: supported.sample_format(),
        stream: supported.config(),
        device,
    })
}

#[cfg(feature = "audio-cpal")]
fn build_speaker_stream(config: &SpeakerConfig, mixer: Mixer) -> Result<cpal::Stream> {
    use cpal::traits::StreamTrait;
    use cpal::SampleFormat;

    let stream = match config.format {
        SampleFormat::F32 => build_output::<f32>(config, mixer),
        SampleFormat::I16 => build_output::<i16>(config, mixer),
        SampleFormat::U16 => build_output::<u16>(config, mixer),
        fmt => {
            return Err(CallError::AudioStream(format!(
                "unsupported output sample format: {fmt:?}"
            )))
        }
    }?;
    stream
        .play()
        .map_err(|e| crate::audio::classify_device_error(e.to_string()))?;
    Ok(stream)
}

#[cfg(feature = "audio-cpal")]
fn build_output<T>(config: &SpeakerConfig, mut mixer: Mixer) -> Result<cpal::Stream>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    use cpal::traits::DeviceTrait;
    use cpal::Sample;

    let ch = config.stream.channels.max(1) as usize;
    let mut scratch = vec![0.0f32; SCRATCH_FRAMES];

    config
        .device
        .build_output_stream(
            &config.stream,
            move |data: &mut [T], _info: &cpal::OutputCallbackInfo| {
                // Oversized callbacks are rendered in scratch-sized slices.
                for block in data.chunks_mut(SCRATCH_FRAMES * ch) {
                    let mono = &mut scratch[..block.len() / ch];
                    mixer.render(mono);
                    for (frame, value) in block.chunks_exact_mut(ch).zip(mono.iter()) {
                        let sample = T::from_sample(*value);
                        for out in frame.iter_mut() {
                            *out = sample;
                        }
                    }
                }
            },
            |err| tracing::error!("output stream error: {err}"),
            None,
        )
        .map_err(|e| crate::audio::classify_device_error(e.to_string()))
}

/// Stub when the `audio-cpal` feature is disabled.
#[cfg(not(feature = "audio-cpal"))]
impl OutputBackend for CpalOutput {
    fn open(&self) -> Result<Arc<dyn OutputDevice>> {
        Err(CallError::DeviceUnavailable(
            "compiled without audio-cpal feature".into(),
        ))
    }
}
