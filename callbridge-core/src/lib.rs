//! # callbridge-core
//!
//! Real-time voice-call bridge between a microphone/speaker pair and a
//! streaming speech model, plus a grounded text chat path.
//!
//! ## Architecture
//!
//! ```text
//! Microphone → InputBackend → SPSC ring → capture thread (resample, frame)
//!                                              │ bounded mpsc
//!                                        encode_frame → SessionTransport ──► remote
//!
//! remote ──► inbound task → decode_chunk → PlaybackScheduler → OutputDevice mixer
//! ```
//!
//! Both audio callbacks are lock-free and allocation-free on the steady path.
//! All heap work happens on the capture thread and the session's tasks.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod assistant;
pub mod audio;
pub mod buffering;
pub mod capture;
pub mod codec;
pub mod engine;
pub mod error;
pub mod ipc;
pub mod playback;
pub mod transport;

// Convenience re-exports for downstream crates
pub use assistant::{Candidate, ChatMessage, ChatRole, Conversation, GeminiTextClient, TextBackend};
pub use audio::{CpalInput, CpalOutput, InputBackend};
pub use engine::{CallConfig, CallController, DiagnosticsSnapshot};
pub use error::{CallError, Result};
pub use ipc::events::{AudioActivityEvent, CallStatusEvent, TranscriptEvent};
pub use playback::{OutputBackend, OutputDevice, PlaybackScheduler, PlaybackUnit, UnitId};
pub use transport::{GeminiLiveConnector, SessionState, VoiceConnector};
