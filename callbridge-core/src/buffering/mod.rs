//! Lock-free SPSC ring buffers between real-time audio callbacks and the
//! threads that feed or drain them.
//!
//! Uses `ringbuf::HeapRb` whose `push_slice` / `try_push` are wait-free and
//! safe to call from a cpal callback.

pub mod frame;

use ringbuf::{traits::Split, HeapRb};

pub use ringbuf::traits::{Consumer, Producer};

/// Producer half, held by the input callback.
pub type AudioProducer = ringbuf::HeapProd<f32>;

/// Consumer half, held by the capture thread.
pub type AudioConsumer = ringbuf::HeapCons<f32>;

/// Capture ring capacity: 2^20 = 1 048 576 f32 samples ≈ 21.8 s at 48 kHz.
/// Frames are drained every few milliseconds, so this only fills if the
/// capture thread stalls.
pub const CAPTURE_RING_CAPACITY: usize = 1 << 20;

/// Create a matched producer/consumer pair for microphone samples.
pub fn create_capture_ring() -> (AudioProducer, AudioConsumer) {
    create_ring(CAPTURE_RING_CAPACITY)
}

/// Create a heap-backed SPSC ring of arbitrary items.
pub fn create_ring<T>(capacity: usize) -> (ringbuf::HeapProd<T>, ringbuf::HeapCons<T>) {
    HeapRb::<T>::new(capacity).split()
}
