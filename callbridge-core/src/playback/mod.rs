//! Gapless playback scheduling on an output device clock.
//!
//! Inbound chunks arrive faster or slower than real time. Each one is started
//! at `max(cursor, now)` so consecutive chunks butt up against each other
//! with no gap and no overlap, and the cursor only jumps forward to "now"
//! after an underrun or an interruption.

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::{
    buffering::frame::AudioBuffer,
    error::{CallError, Result},
};

/// Opaque handle for one scheduled unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub u64);

/// A scheduled buffer: where it sits on the output clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackUnit {
    pub id: UnitId,
    /// Seconds on the device clock.
    pub start_at: f64,
    pub duration: f64,
}

impl PlaybackUnit {
    pub fn end_at(&self) -> f64 {
        self.start_at + self.duration
    }
}

/// An open speaker.
pub trait OutputDevice: Send + Sync {
    /// Monotonic output clock in seconds.
    fn now(&self) -> f64;

    /// Start `buffer` at clock time `at`.
    fn start(&self, id: UnitId, buffer: &AudioBuffer, at: f64) -> Result<()>;

    /// Stop one unit. Unknown or already finished ids are ignored.
    fn stop(&self, id: UnitId);

    /// Stop every unit in one step.
    ///
    /// Returns `true` when the device handled it, in which case no per-unit
    /// stops are sent. The default does nothing and returns `false`.
    fn stop_all(&self) -> bool {
        false
    }

    /// Release the device. Idempotent.
    fn close(&self);

    /// Natural-completion notifications. Yields the receiver once.
    fn completions(&self) -> Option<crossbeam_channel::Receiver<UnitId>> {
        None
    }
}

/// Something that can open a speaker.
pub trait OutputBackend: Send + Sync + 'static {
    /// # Errors
    /// `DeviceUnavailable`, `PermissionDenied`, or `AudioStream`.
    fn open(&self) -> Result<Arc<dyn OutputDevice>>;
}

#[derive(Default)]
struct SchedulerState {
    cursor: f64,
    active: HashMap<UnitId, PlaybackUnit>,
    next_id: u64,
    epoch: u64,
    closed: bool,
}

/// Owns the next-start cursor and the set of in-flight units.
///
/// Every mutation goes through one mutex, so an interrupt can never land
/// between the cursor read and the registration of a schedule.
pub struct PlaybackScheduler {
    device: Arc<dyn OutputDevice>,
    state: Mutex<SchedulerState>,
}

impl PlaybackScheduler {
    pub fn new(device: Arc<dyn OutputDevice>) -> Self {
        Self {
            device,
            state: Mutex::new(SchedulerState::default()),
        }
    }

    pub fn device(&self) -> &Arc<dyn OutputDevice> {
        &self.device
    }

    /// Schedule `buffer` right after everything already queued.
    ///
    /// Returns `Ok(None)` for an empty buffer.
    ///
    /// # Errors
    /// `TransportFailure` once the scheduler is drained, or the device's
    /// start error.
    pub fn schedule(&self, buffer: &AudioBuffer) -> Result<Option<PlaybackUnit>> {
        let mut state = self.state.lock();
        self.schedule_locked(&mut state, buffer)
    }

    /// Like [`schedule`](Self::schedule), but discards the buffer when an
    /// interruption happened after `epoch` was observed.
    pub fn schedule_if_current(
        &self,
        buffer: &AudioBuffer,
        epoch: u64,
    ) -> Result<Option<PlaybackUnit>> {
        let mut state = self.state.lock();
        if state.epoch != epoch {
            debug!(
                observed = epoch,
                current = state.epoch,
                "discarding chunk from before interruption"
            );
            return Ok(None);
        }
        self.schedule_locked(&mut state, buffer)
    }

    fn schedule_locked(
        &self,
        state: &mut SchedulerState,
        buffer: &AudioBuffer,
    ) -> Result<Option<PlaybackUnit>> {
        if state.closed {
            return Err(CallError::TransportFailure("playback closed".into()));
        }
        if buffer.is_empty() {
            return Ok(None);
        }

        let start_at = state.cursor.max(self.device.now());
        let duration = buffer.duration_secs();
        let id = UnitId(state.next_id);
        state.next_id += 1;

        self.device.start(id, buffer, start_at)?;

        let unit = PlaybackUnit {
            id,
            start_at,
            duration,
        };
        state.cursor = unit.end_at();
        state.active.insert(id, unit);
        debug!(
            unit = id.0,
            start_at,
            duration,
            active = state.active.len(),
            "scheduled playback unit"
        );
        Ok(Some(unit))
    }

    /// A unit played to the end.
    pub fn finished(&self, id: UnitId) {
        let mut state = self.state.lock();
        if state.active.remove(&id).is_some() {
            debug!(unit = id.0, active = state.active.len(), "playback unit finished");
        }
    }

    /// Cut all playback now. The next unit starts at the device's "now".
    pub fn interrupt_all(&self) {
        let mut state = self.state.lock();
        let stopped = self.stop_locked(&mut state);
        state.epoch += 1;
        info!(stopped, epoch = state.epoch, "playback interrupted");
    }

    /// Stop everything and refuse further schedules.
    pub fn drain_all(&self) {
        let mut state = self.state.lock();
        let stopped = self.stop_locked(&mut state);
        state.epoch += 1;
        state.closed = true;
        debug!(stopped, "playback drained");
    }

    fn stop_locked(&self, state: &mut SchedulerState) -> usize {
        let stopped = state.active.len();
        if !self.device.stop_all() {
            for id in state.active.keys() {
                self.device.stop(*id);
            }
        }
        state.active.clear();
        state.cursor = 0.0;
        stopped
    }

    /// Close the output device. Safe to call repeatedly.
    pub fn release_output(&self) {
        self.device.close();
    }

    pub fn active_len(&self) -> usize {
        self.state.lock().active.len()
    }

    pub fn cursor(&self) -> f64 {
        self.state.lock().cursor
    }

    pub fn epoch(&self) -> u64 {
        self.state.lock().epoch
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}
