//! Microphone capture thread.
//!
//! ## Per-iteration stages
//!
//! ```text
//! 1. Drain the SPSC ring filled by the input callback
//! 2. Resample device rate → 16 kHz (passthrough when equal)
//! 3. Accumulate until `frame_samples` are available
//! 4. Hand each full AudioFrame to `on_frame`
//! ```
//!
//! The loop runs on its own OS thread because the input stream is `!Send`:
//! it is opened, polled and dropped there. `on_frame` must not block; the
//! controller's callback only does a `try_send`.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, OnceLock,
    },
    time::Duration,
};

use tracing::{debug, error, info, warn};

use crate::{
    audio::{resample::RateConverter, InputBackend},
    buffering::{create_capture_ring, frame::AudioFrame, Consumer},
    codec::OUTBOUND_SAMPLE_RATE,
    error::{CallError, Result},
};

/// Samples drained from the ring per iteration (20 ms at 48 kHz).
const DRAIN_CHUNK: usize = 960;
const DEFAULT_SLEEP_EMPTY_MS: u64 = 5;

#[derive(Debug, Clone, Copy)]
pub struct CaptureConfig {
    /// Samples per emitted frame. Default: 4096.
    pub frame_samples: usize,
    /// Rate frames are emitted at. Default: 16000.
    pub sample_rate: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frame_samples: 4096,
            sample_rate: OUTBOUND_SAMPLE_RATE,
        }
    }
}

/// Running capture. Stops on drop.
pub struct CaptureHandle {
    running: Arc<AtomicBool>,
    device_rate: u32,
}

impl CaptureHandle {
    /// Signal the capture thread to exit. The thread drops the input stream,
    /// which releases the microphone. Idempotent.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("capture stop requested");
        }
    }

    pub fn is_active(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Native rate of the opened device.
    pub fn device_rate(&self) -> u32 {
        self.device_rate
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Stop and consume a capture handle.
pub fn stop_capture(handle: CaptureHandle) {
    handle.stop();
}

/// Open the microphone and start emitting frames.
///
/// Blocks until the device is confirmed open or has failed.
///
/// # Errors
/// `PermissionDenied`, `DeviceUnavailable` or `AudioStream` from the backend.
pub fn start_capture<F>(
    backend: Arc<dyn InputBackend>,
    config: CaptureConfig,
    on_frame: F,
) -> Result<CaptureHandle>
where
    F: FnMut(AudioFrame) + Send + 'static,
{
    let running = Arc::new(AtomicBool::new(true));
    let (open_tx, open_rx) = std::sync::mpsc::channel::<Result<u32>>();
    let thread_running = Arc::clone(&running);

    std::thread::Builder::new()
        .name("callbridge-capture".into())
        .spawn(move || {
            let (producer, consumer) = create_capture_ring();
            // Must happen on this thread: the stream is !Send.
            let stream = match backend.open(producer, Arc::clone(&thread_running)) {
                Ok(stream) => {
                    let _ = open_tx.send(Ok(stream.sample_rate()));
                    stream
                }
                Err(e) => {
                    thread_running.store(false, Ordering::SeqCst);
                    let _ = open_tx.send(Err(e));
                    return;
                }
            };

            run_loop(
                consumer,
                stream.sample_rate(),
                config,
                &thread_running,
                on_frame,
            );

            let dropped = stream.dropped_samples();
            if dropped > 0 {
                warn!(dropped, "input callback overflowed the capture ring");
            }
            drop(stream);
            debug!("microphone released");
        })
        .map_err(CallError::Io)?;

    match open_rx.recv() {
        Ok(Ok(device_rate)) => {
            info!(device_rate, target_rate = config.sample_rate, "capture started");
            Ok(CaptureHandle {
                running,
                device_rate,
            })
        }
        Ok(Err(e)) => {
            warn!("capture open failed: {e}");
            Err(e)
        }
        Err(_) => {
            running.store(false, Ordering::SeqCst);
            Err(CallError::Other(anyhow::anyhow!(
                "capture thread died unexpectedly"
            )))
        }
    }
}

fn run_loop<F>(
    mut consumer: crate::buffering::AudioConsumer,
    device_rate: u32,
    config: CaptureConfig,
    running: &AtomicBool,
    mut on_frame: F,
) where
    F: FnMut(AudioFrame),
{
    let mut resampler = match RateConverter::new(device_rate, config.sample_rate, DRAIN_CHUNK) {
        Ok(r) => r,
        Err(e) => {
            error!("failed to create capture resampler: {e}");
            running.store(false, Ordering::SeqCst);
            return;
        }
    };
    if !resampler.is_passthrough() {
        info!(from = device_rate, to = config.sample_rate, "capture resampling enabled");
    }

    let frame_samples = config.frame_samples.max(1);
    let mut raw = vec![0f32; DRAIN_CHUNK];
    let mut pending: Vec<f32> = Vec::with_capacity(frame_samples * 2);
    let mut frames_out = 0u64;

    while running.load(Ordering::Relaxed) {
        let n = consumer.pop_slice(&mut raw);
        if n == 0 {
            std::thread::sleep(Duration::from_millis(empty_sleep_ms()));
            continue;
        }

        pending.extend(resampler.process(&raw[..n]));

        while pending.len() >= frame_samples {
            let samples: Vec<f32> = pending.drain(..frame_samples).collect();
            on_frame(AudioFrame::mono(samples, config.sample_rate));
            frames_out += 1;
        }
    }

    debug!(frames_out, discarded = pending.len(), "capture loop exited");
}

fn empty_sleep_ms() -> u64 {
    static EMPTY_SLEEP_MS: OnceLock<u64> = OnceLock::new();
    *EMPTY_SLEEP_MS.get_or_init(|| {
        std::env::var("CALLBRIDGE_CAPTURE_EMPTY_SLEEP_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(|v| v.clamp(1, 20))
            .unwrap_or(DEFAULT_SLEEP_EMPTY_MS)
    })
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::AtomicUsize,
        time::Instant,
    };

    use crate::{
        audio::InputStream,
        buffering::{AudioProducer, Producer},
    };

    use super::*;

    /// Pushes a fixed ramp into the ring once, on open.
    struct RampInput {
        samples: usize,
        rate: u32,
        released: Arc<AtomicUsize>,
    }

    struct RampStream {
        rate: u32,
        released: Arc<AtomicUsize>,
    }

    impl InputStream for RampStream {
        fn sample_rate(&self) -> u32 {
            self.rate
        }
    }

    impl Drop for RampStream {
        fn drop(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl InputBackend for RampInput {
        fn open(
            &self,
            mut producer: AudioProducer,
            _running: Arc<AtomicBool>,
        ) -> Result<Box<dyn InputStream>> {
            let ramp: Vec<f32> = (0..self.samples).map(|i| i as f32 / 1e5).collect();
            producer.push_slice(&ramp);
            Ok(Box::new(RampStream {
                rate: self.rate,
                released: Arc::clone(&self.released),
            }))
        }
    }

    struct DeniedInput;

    impl InputBackend for DeniedInput {
        fn open(&self, _: AudioProducer, _: Arc<AtomicBool>) -> Result<Box<dyn InputStream>> {
            Err(CallError::PermissionDenied("user said no".into()))
        }
    }

    fn wait_for(mut cond: impl FnMut() -> bool) {
        let start = Instant::now();
        while !cond() {
            assert!(
                start.elapsed() < Duration::from_secs(2),
                "timed out waiting for condition"
            );
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn emits_fixed_size_frames_in_order() {
        let released = Arc::new(AtomicUsize::new(0));
        let backend = Arc::new(RampInput {
            samples: 4096 * 2 + 100,
            rate: 16_000,
            released: Arc::clone(&released),
        });
        let (tx, rx) = crossbeam_channel::unbounded();

        let handle = start_capture(backend, CaptureConfig::default(), move |frame| {
            let _ = tx.send(frame);
        })
        .unwrap();
        assert!(handle.is_active());
        assert_eq!(handle.device_rate(), 16_000);

        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(first.samples.len(), 4096);
        assert_eq!(first.sample_rate, 16_000);
        assert_eq!(first.channels, 1);
        assert_eq!(second.samples[0], 4096.0 / 1e5);
        // The 100-sample tail never fills a frame.
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

        stop_capture(handle);
        wait_for(|| released.load(Ordering::SeqCst) == 1);
    }

    #[test]
    fn resamples_device_rate_to_target() {
        let released = Arc::new(AtomicUsize::new(0));
        let backend = Arc::new(RampInput {
            samples: 48_000,
            rate: 48_000,
            released: Arc::clone(&released),
        });
        let (tx, rx) = crossbeam_channel::unbounded();
        let config = CaptureConfig {
            frame_samples: 1600,
            sample_rate: 16_000,
        };
        let handle = start_capture(backend, config, move |frame| {
            let _ = tx.send(frame);
        })
        .unwrap();

        // One second at 48 kHz ≈ 16_000 samples ≈ 10 frames of 1600.
        let mut frames = 0;
        while rx.recv_timeout(Duration::from_millis(200)).is_ok() {
            frames += 1;
        }
        assert!((9..=10).contains(&frames), "frames={frames}");

        drop(handle);
        wait_for(|| released.load(Ordering::SeqCst) == 1);
    }

    #[test]
    fn open_failure_is_reported_synchronously() {
        let result = start_capture(Arc::new(DeniedInput), CaptureConfig::default(), |_| {});
        assert!(matches!(result, Err(CallError::PermissionDenied(_))));
    }

    #[test]
    fn stop_is_idempotent() {
        let released = Arc::new(AtomicUsize::new(0));
        let backend = Arc::new(RampInput {
            samples: 0,
            rate: 16_000,
            released: Arc::clone(&released),
        });
        let handle = start_capture(backend, CaptureConfig::default(), |_| {}).unwrap();
        handle.stop();
        handle.stop();
        assert!(!handle.is_active());
        wait_for(|| released.load(Ordering::SeqCst) == 1);
    }
}
