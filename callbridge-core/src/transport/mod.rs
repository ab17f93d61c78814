//! Streaming session transport: lifecycle state machine and send gating.
//!
//! ```text
//! Idle ──► Opening ──► Open ──► Closing ──► Closed
//!   │         │          │         │
//!   └─────────┴──────────┴─────────┴──► Failed
//! ```
//!
//! `Closed` and `Failed` are terminal for a session; a new session may start
//! from either. Outbound audio is only written once the remote side has
//! acknowledged the setup message (state `Open`).

pub mod live;
pub mod protocol;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::{
    codec::EncodedChunk,
    error::{CallError, Result},
};

pub use live::GeminiLiveConnector;

/// Lifecycle of one streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Opening,
    Open,
    Closing,
    Closed,
    Failed,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle | Closed | Failed, Opening)
                | (Opening, Open)
                | (Opening | Open, Closing)
                | (Closing, Closed)
                | (Idle | Opening | Open | Closing, Failed)
        )
    }

    /// `Closed` or `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }

    /// A session exists and has not ended yet.
    pub fn is_live(self) -> bool {
        matches!(
            self,
            SessionState::Opening | SessionState::Open | SessionState::Closing
        )
    }
}

/// Result of a non-blocking [`SessionTransport::send_audio`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Handshake not acknowledged yet. Chunk dropped.
    NotReady,
    /// Outbound queue full. Chunk dropped.
    Backpressure,
    Closed,
}

/// Something the remote side told us, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Setup acknowledged.
    Ready,
    Audio(EncodedChunk),
    /// The user talked over the model; stop local playback.
    Interrupted,
    TurnComplete,
    /// Server announced it will disconnect soon.
    GoingAway { time_left: Option<String> },
    /// A payload that could not be decoded. The session continues.
    Malformed(String),
    /// Orderly end of the session by the remote side.
    Closed { reason: Option<String> },
    /// Socket or protocol failure. The session is unusable.
    Error(String),
}

/// Messages the controller hands to the connection writer.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Audio(EncodedChunk),
    Close,
}

/// Channel pair connecting the controller to one remote session.
pub struct SessionLink {
    pub outbound: mpsc::Sender<ClientEvent>,
    pub inbound: mpsc::Receiver<ServerEvent>,
}

/// What the first message of a voice session carries.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSetup {
    pub model: String,
    pub voice_name: String,
    pub system_instruction: String,
}

/// Opens a streaming voice session.
///
/// The returned link is connected but not necessarily acknowledged; the
/// first [`ServerEvent::Ready`] on `inbound` marks the handshake.
pub trait VoiceConnector: Send + Sync + 'static {
    fn connect(&self, setup: SessionSetup) -> BoxFuture<'_, Result<SessionLink>>;
}

struct Inner {
    state: SessionState,
    outbound: Option<mpsc::Sender<ClientEvent>>,
}

/// State machine plus the gated outbound half of a [`SessionLink`].
pub struct SessionTransport {
    inner: Mutex<Inner>,
    sent: AtomicU64,
    dropped_not_ready: AtomicU64,
    dropped_backpressure: AtomicU64,
}

impl Default for SessionTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTransport {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: SessionState::Idle,
                outbound: None,
            }),
            sent: AtomicU64::new(0),
            dropped_not_ready: AtomicU64::new(0),
            dropped_backpressure: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    fn transition(inner: &mut Inner, next: SessionState) -> bool {
        if inner.state.can_transition_to(next) {
            debug!(from = ?inner.state, to = ?next, "session transition");
            inner.state = next;
            true
        } else {
            false
        }
    }

    /// Enter `Opening`.
    ///
    /// # Errors
    /// `AlreadyActive` if a session is live.
    pub fn begin_open(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if Self::transition(&mut inner, SessionState::Opening) {
            inner.outbound = None;
            Ok(())
        } else {
            Err(CallError::AlreadyActive)
        }
    }

    /// Hand over the writer half of a freshly connected link.
    pub fn attach(&self, outbound: mpsc::Sender<ClientEvent>) {
        let mut inner = self.inner.lock();
        if inner.state == SessionState::Opening {
            inner.outbound = Some(outbound);
        }
    }

    /// `Opening → Open`. `false` if the session was closed meanwhile.
    pub fn mark_open(&self) -> bool {
        let mut inner = self.inner.lock();
        let ok = inner.state == SessionState::Opening
            && inner.outbound.is_some()
            && Self::transition(&mut inner, SessionState::Open);
        if ok {
            info!("session open");
        }
        ok
    }

    /// Queue an outbound chunk without blocking.
    pub fn send_audio(&self, chunk: EncodedChunk) -> SendOutcome {
        let inner = self.inner.lock();
        match inner.state {
            SessionState::Open => {}
            SessionState::Idle | SessionState::Opening => {
                self.dropped_not_ready.fetch_add(1, Ordering::Relaxed);
                return SendOutcome::NotReady;
            }
            _ => return SendOutcome::Closed,
        }
        let Some(outbound) = inner.outbound.as_ref() else {
            return SendOutcome::Closed;
        };
        match outbound.try_send(ClientEvent::Audio(chunk)) {
            Ok(()) => {
                self.sent.fetch_add(1, Ordering::Relaxed);
                SendOutcome::Sent
            }
            Err(TrySendError::Full(_)) => {
                self.dropped_backpressure.fetch_add(1, Ordering::Relaxed);
                SendOutcome::Backpressure
            }
            Err(TrySendError::Closed(_)) => SendOutcome::Closed,
        }
    }

    /// `Opening | Open → Closing`. Returns whether this call made the move.
    pub fn begin_close(&self) -> bool {
        let mut inner = self.inner.lock();
        Self::transition(&mut inner, SessionState::Closing)
    }

    /// Ask the writer to close the connection, drop the link and settle in
    /// `Closed` (unless already `Failed`).
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if let Some(outbound) = inner.outbound.take() {
            let _ = outbound.try_send(ClientEvent::Close);
        }
        if inner.state != SessionState::Failed {
            if inner.state != SessionState::Closing {
                Self::transition(&mut inner, SessionState::Closing);
            }
            Self::transition(&mut inner, SessionState::Closed);
        }
    }

    /// Move to `Failed` from any live state. Returns whether it moved.
    pub fn fail(&self, reason: &str) -> bool {
        let mut inner = self.inner.lock();
        let moved = Self::transition(&mut inner, SessionState::Failed);
        if moved {
            warn!(reason, "session failed");
        }
        moved
    }

    pub fn sent_chunks(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn dropped_not_ready(&self) -> u64 {
        self.dropped_not_ready.load(Ordering::Relaxed)
    }

    pub fn dropped_backpressure(&self) -> u64 {
        self.dropped_backpressure.load(Ordering::Relaxed)
    }
}
