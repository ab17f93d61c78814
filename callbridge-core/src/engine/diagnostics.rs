//! Per-call counters, reset on every `start_call`.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

#[derive(Default)]
pub struct CallDiagnostics {
    pub frames_captured: AtomicUsize,
    pub frames_sent: AtomicUsize,
    /// Frame channel full: capture outran the encoder.
    pub frames_dropped_queue: AtomicUsize,
    /// Handshake not acknowledged yet.
    pub frames_dropped_not_ready: AtomicUsize,
    /// Socket writer queue full.
    pub frames_dropped_backpressure: AtomicUsize,
    pub chunks_received: AtomicUsize,
    pub chunks_scheduled: AtomicUsize,
    pub chunks_malformed: AtomicUsize,
    pub units_completed: AtomicUsize,
    pub interruptions: AtomicUsize,
}

impl CallDiagnostics {
    pub fn reset(&self) {
        for counter in self.counters() {
            counter.store(0, Ordering::Relaxed);
        }
    }

    fn counters(&self) -> [&AtomicUsize; 10] {
        [
            &self.frames_captured,
            &self.frames_sent,
            &self.frames_dropped_queue,
            &self.frames_dropped_not_ready,
            &self.frames_dropped_backpressure,
            &self.chunks_received,
            &self.chunks_scheduled,
            &self.chunks_malformed,
            &self.units_completed,
            &self.interruptions,
        ]
    }

    pub fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_dropped_queue: self.frames_dropped_queue.load(Ordering::Relaxed),
            frames_dropped_not_ready: self.frames_dropped_not_ready.load(Ordering::Relaxed),
            frames_dropped_backpressure: self.frames_dropped_backpressure.load(Ordering::Relaxed),
            chunks_received: self.chunks_received.load(Ordering::Relaxed),
            chunks_scheduled: self.chunks_scheduled.load(Ordering::Relaxed),
            chunks_malformed: self.chunks_malformed.load(Ordering::Relaxed),
            units_completed: self.units_completed.load(Ordering::Relaxed),
            interruptions: self.interruptions.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub frames_captured: usize,
    pub frames_sent: usize,
    pub frames_dropped_queue: usize,
    pub frames_dropped_not_ready: usize,
    pub frames_dropped_backpressure: usize,
    pub chunks_received: usize,
    pub chunks_scheduled: usize,
    pub chunks_malformed: usize,
    pub units_completed: usize,
    pub interruptions: usize,
}
