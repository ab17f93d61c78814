//! `CallController`: one voice-call lifecycle plus the text chat path.
//!
//! ## Lifecycle
//!
//! ```text
//! CallController::new()
//!     └─► start_call()   Idle → Opening: mic, speaker and handshake acquired
//!         │                              concurrently, then Opening → Open
//!         └─► stop_call() / remote close / error
//!                         Open → Closing → Closed   (or → Failed)
//! ```
//!
//! ## Data flow while open
//!
//! ```text
//! capture thread ──(bounded mpsc, try_send)──► send task ──► SessionTransport
//! link.inbound ──► inbound task ──decode──► PlaybackScheduler ──► OutputDevice
//! OutputDevice completions ──► forwarder thread ──► PlaybackScheduler::finished
//! ```
//!
//! Teardown runs at most once per session, from whichever path gets there
//! first, in a fixed order: capture, playback, transport, output device,
//! background tasks.

pub mod diagnostics;

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::{Mutex, RwLock};
use rand::Rng;
use tokio::{
    sync::{broadcast, mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::{
    assistant::{
        text_system_instruction, voice_system_instruction, Candidate, ChatMessage, TextBackend,
        NO_ANSWER_REPLY, OFFLINE_REPLY,
    },
    audio::InputBackend,
    buffering::frame::AudioFrame,
    capture::{start_capture, CaptureConfig, CaptureHandle},
    codec::{decode_chunk, encode_frame, INBOUND_SAMPLE_RATE},
    error::{CallError, Result},
    ipc::events::{AudioActivityEvent, CallStatusEvent, TranscriptEvent},
    playback::{OutputBackend, PlaybackScheduler},
    transport::{
        SendOutcome, ServerEvent, SessionLink, SessionSetup, SessionState, SessionTransport,
        VoiceConnector,
    },
};

pub use diagnostics::{CallDiagnostics, DiagnosticsSnapshot};

/// Broadcast channel capacity for status and activity events.
const BROADCAST_CAP: usize = 256;

pub const DEFAULT_VOICE_MODEL: &str = "gemini-2.5-flash-native-audio-preview-12-2025";
pub const DEFAULT_VOICE_NAME: &str = "Zephyr";

/// Configuration for `CallController`.
#[derive(Debug, Clone)]
pub struct CallConfig {
    pub capture: CaptureConfig,
    pub voice_model: String,
    pub voice_name: String,
    pub voice_instruction: String,
    /// How long to wait for `setupComplete`. Default: 10 s.
    pub handshake_timeout: Duration,
    /// Upper bound for one text reply. Default: 30 s.
    pub text_timeout: Duration,
    /// Captured frames buffered ahead of the encoder. Default: 32.
    pub frame_queue: usize,
    /// Connect attempts on call start. Default: 1 (no retry).
    pub connect_attempts: u32,
    /// Base delay of the exponential connect backoff. Default: 500 ms.
    pub connect_backoff: Duration,
    /// RMS above which a mic frame counts as voiced. Default: 0.01.
    pub voice_threshold: f32,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            voice_model: DEFAULT_VOICE_MODEL.to_string(),
            voice_name: DEFAULT_VOICE_NAME.to_string(),
            voice_instruction: voice_system_instruction(),
            handshake_timeout: Duration::from_secs(10),
            text_timeout: Duration::from_secs(30),
            frame_queue: 32,
            connect_attempts: 1,
            connect_backoff: Duration::from_millis(500),
            voice_threshold: 0.01,
        }
    }
}

/// Everything a live session holds that must be released on teardown.
#[derive(Default)]
struct Resources {
    capture: Option<CaptureHandle>,
    scheduler: Option<Arc<PlaybackScheduler>>,
    tasks: Vec<JoinHandle<()>>,
    /// Dropping it ends the completion forwarder thread.
    completion_stop: Option<crossbeam_channel::Sender<()>>,
}

struct Session {
    id: u64,
    transport: Arc<SessionTransport>,
    resources: Mutex<Resources>,
    torn_down: AtomicBool,
    cancel: watch::Sender<bool>,
}

impl Session {
    fn new(id: u64) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            id,
            transport: Arc::new(SessionTransport::new()),
            resources: Mutex::new(Resources::default()),
            torn_down: AtomicBool::new(false),
            cancel,
        }
    }

    fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    async fn cancelled(&self) {
        let mut rx = self.cancel.subscribe();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

struct Inner {
    config: CallConfig,
    input: Arc<dyn InputBackend>,
    output: Arc<dyn OutputBackend>,
    connector: Arc<dyn VoiceConnector>,
    text: Arc<dyn TextBackend>,
    roster: RwLock<Vec<Candidate>>,
    /// Current or most recent session.
    session: Mutex<Option<Arc<Session>>>,
    next_session_id: AtomicU64,
    status_tx: broadcast::Sender<CallStatusEvent>,
    activity_tx: broadcast::Sender<AudioActivityEvent>,
    transcript_tx: broadcast::Sender<TranscriptEvent>,
    seq: AtomicU64,
    diagnostics: Arc<CallDiagnostics>,
}

/// The top-level call handle.
///
/// Cheap to clone; all clones drive the same controller.
#[derive(Clone)]
pub struct CallController {
    inner: Arc<Inner>,
}

impl CallController {
    pub fn new(
        config: CallConfig,
        input: Arc<dyn InputBackend>,
        output: Arc<dyn OutputBackend>,
        connector: Arc<dyn VoiceConnector>,
        text: Arc<dyn TextBackend>,
        roster: Vec<Candidate>,
    ) -> Self {
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (activity_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (transcript_tx, _) = broadcast::channel(BROADCAST_CAP);
        Self {
            inner: Arc::new(Inner {
                config,
                input,
                output,
                connector,
                text,
                roster: RwLock::new(roster),
                session: Mutex::new(None),
                next_session_id: AtomicU64::new(1),
                status_tx,
                activity_tx,
                transcript_tx,
                seq: AtomicU64::new(0),
                diagnostics: Arc::new(CallDiagnostics::default()),
            }),
        }
    }

    /// Open a voice call. Returns once the session is open or has failed.
    ///
    /// # Errors
    /// - `AlreadyActive` if a call is live (the existing call is untouched).
    /// - `Cancelled` if `stop_call` ran while the call was opening.
    /// - Device or transport errors; everything acquired is released first.
    pub async fn start_call(&self) -> Result<()> {
        let session = {
            let mut slot = self.inner.session.lock();
            if slot
                .as_ref()
                .is_some_and(|s| s.transport.state().is_live())
            {
                return Err(CallError::AlreadyActive);
            }
            let id = self.inner.next_session_id.fetch_add(1, Ordering::Relaxed);
            let session = Arc::new(Session::new(id));
            session.transport.begin_open()?;
            *slot = Some(Arc::clone(&session));
            session
        };

        self.inner.diagnostics.reset();
        self.inner.emit_status(SessionState::Opening, None);

        let span = info_span!("call", session = session.id);
        let result = Arc::clone(&self.inner)
            .open_session(Arc::clone(&session))
            .instrument(span)
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(CallError::Cancelled) => Err(CallError::Cancelled),
            Err(e) => {
                if session.is_torn_down() && session.transport.state() == SessionState::Closed {
                    return Err(CallError::Cancelled);
                }
                self.inner.teardown(&session, Some(e.to_string()));
                Err(e)
            }
        }
    }

    /// End the current call. A no-op when no call is live.
    pub fn stop_call(&self) {
        let session = self.inner.session.lock().clone();
        match session {
            Some(session) if session.transport.state().is_live() => {
                info!(session = session.id, "stop requested");
                self.inner.teardown(&session, None);
            }
            _ => debug!("stop_call with no live session"),
        }
    }

    /// One grounded text exchange. Never fails; errors become a fallback reply.
    ///
    /// Emits a `TranscriptEvent` for the message and another for the reply.
    pub async fn send_text(&self, message: &str) -> String {
        self.inner.emit_transcript(ChatMessage::user(message));
        let reply = self.inner.ask(message).await;
        self.inner.emit_transcript(ChatMessage::assistant(reply.clone()));
        reply
    }

    /// Replace the candidate roster used to ground text replies.
    pub fn set_roster(&self, roster: Vec<Candidate>) {
        *self.inner.roster.write() = roster;
    }

    pub fn roster(&self) -> Vec<Candidate> {
        self.inner.roster.read().clone()
    }

    /// State of the current (or most recent) session.
    pub fn state(&self) -> SessionState {
        self.inner
            .session
            .lock()
            .as_ref()
            .map(|s| s.transport.state())
            .unwrap_or(SessionState::Idle)
    }

    pub fn is_call_active(&self) -> bool {
        self.state().is_live()
    }

    /// In-flight playback units of the live session.
    pub fn active_playback_units(&self) -> usize {
        self.inner
            .session
            .lock()
            .as_ref()
            .and_then(|s| s.resources.lock().scheduler.as_ref().map(|p| p.active_len()))
            .unwrap_or(0)
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<CallStatusEvent> {
        self.inner.status_tx.subscribe()
    }

    pub fn subscribe_activity(&self) -> broadcast::Receiver<AudioActivityEvent> {
        self.inner.activity_tx.subscribe()
    }

    pub fn subscribe_transcript(&self) -> broadcast::Receiver<TranscriptEvent> {
        self.inner.transcript_tx.subscribe()
    }

    pub fn diagnostics_snapshot(&self) -> DiagnosticsSnapshot {
        self.inner.diagnostics.snapshot()
    }
}

impl Inner {
    async fn ask(&self, message: &str) -> String {
        let instruction = text_system_instruction(&self.roster.read());
        let reply = tokio::time::timeout(
            self.config.text_timeout,
            self.text.generate(&instruction, message),
        )
        .await;

        match reply {
            Ok(Ok(text)) if !text.trim().is_empty() => text,
            Ok(Ok(_)) => {
                warn!("assistant returned an empty reply");
                NO_ANSWER_REPLY.to_string()
            }
            Ok(Err(e)) => {
                warn!("assistant request failed: {e}");
                OFFLINE_REPLY.to_string()
            }
            Err(_) => {
                warn!(timeout = ?self.config.text_timeout, "assistant request timed out");
                OFFLINE_REPLY.to_string()
            }
        }
    }

    async fn open_session(self: Arc<Self>, session: Arc<Session>) -> Result<()> {
        let (frame_tx, frame_rx) = mpsc::channel::<AudioFrame>(self.config.frame_queue.max(1));

        // The send task runs from the start so frames captured before the
        // handshake is acknowledged are dropped instead of queued.
        let send_task = tokio::spawn(
            Arc::clone(&self)
                .pump_outbound(Arc::clone(&session.transport), frame_rx)
                .in_current_span(),
        );
        session.resources.lock().tasks.push(send_task);

        let input = Arc::clone(&self.input);
        let capture_config = self.config.capture;
        let capture_diagnostics = Arc::clone(&self.diagnostics);
        let capture = tokio::task::spawn_blocking(move || {
            start_capture(input, capture_config, move |frame| {
                CallDiagnostics::bump(&capture_diagnostics.frames_captured);
                if frame_tx.try_send(frame).is_err() {
                    CallDiagnostics::bump(&capture_diagnostics.frames_dropped_queue);
                    warn!("frame queue full, dropping captured frame");
                }
            })
        });

        let output_backend = Arc::clone(&self.output);
        let output = tokio::task::spawn_blocking(move || output_backend.open());

        let acquire = async {
            tokio::join!(
                async { capture.await.map_err(join_error).and_then(|r| r) },
                async { output.await.map_err(join_error).and_then(|r| r) },
                self.connect(&session),
            )
        };

        let (capture, output, link) = tokio::select! {
            acquired = acquire => acquired,
            _ = session.cancelled() => return Err(CallError::Cancelled),
        };

        let mut first_error = None;
        let capture = keep_ok(capture, &mut first_error);
        let scheduler =
            keep_ok(output, &mut first_error).map(|device| Arc::new(PlaybackScheduler::new(device)));
        let link = keep_ok(link, &mut first_error);

        {
            let mut resources = session.resources.lock();
            if session.is_torn_down() {
                drop(resources);
                release_unowned(capture, scheduler);
                return Err(CallError::Cancelled);
            }
            resources.capture = capture;
            resources.scheduler = scheduler.clone();
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        let (Some(scheduler), Some(SessionLink { outbound, inbound })) = (scheduler, link) else {
            return Err(CallError::Other(anyhow::anyhow!("session resources missing")));
        };

        session.transport.attach(outbound);
        if !session.transport.mark_open() {
            return Err(CallError::Cancelled);
        }

        let mut resources = session.resources.lock();
        if session.is_torn_down() {
            return Err(CallError::Cancelled);
        }
        let inbound_task = tokio::spawn(
            Arc::clone(&self)
                .pump_inbound(Arc::clone(&session), Arc::clone(&scheduler), inbound)
                .in_current_span(),
        );
        resources.tasks.push(inbound_task);
        resources.completion_stop = self.forward_completions(&scheduler);
        self.emit_status(SessionState::Open, None);
        info!("voice call open");
        Ok(())
    }

    /// Connect and wait for the setup acknowledgement, retrying transport
    /// failures up to `connect_attempts` times.
    async fn connect(&self, session: &Session) -> Result<SessionLink> {
        let attempts = self.config.connect_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.connect_once().await {
                Ok(link) => return Ok(link),
                Err(CallError::TransportFailure(reason))
                    if attempt < attempts && !session.is_torn_down() =>
                {
                    let delay = backoff_delay(self.config.connect_backoff, attempt);
                    warn!(attempt, reason = %reason, ?delay, "connect failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn connect_once(&self) -> Result<SessionLink> {
        let setup = SessionSetup {
            model: self.config.voice_model.clone(),
            voice_name: self.config.voice_name.clone(),
            system_instruction: self.config.voice_instruction.clone(),
        };
        let mut link = self.connector.connect(setup).await?;

        let handshake = async {
            loop {
                match link.inbound.recv().await {
                    Some(ServerEvent::Ready) => return Ok(()),
                    Some(ServerEvent::Closed { reason }) => {
                        return Err(CallError::TransportFailure(format!(
                            "session closed during handshake: {}",
                            reason.unwrap_or_default()
                        )))
                    }
                    Some(ServerEvent::Error(e)) => return Err(CallError::TransportFailure(e)),
                    Some(other) => debug!(?other, "ignoring event before setup ack"),
                    None => {
                        return Err(CallError::TransportFailure(
                            "connection dropped during handshake".into(),
                        ))
                    }
                }
            }
        };
        let outcome = tokio::time::timeout(self.config.handshake_timeout, handshake).await;

        match outcome {
            Ok(Ok(())) => {
                debug!("setup acknowledged");
                Ok(link)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CallError::TransportFailure("handshake timed out".into())),
        }
    }

    /// Captured frames → codec → transport.
    async fn pump_outbound(
        self: Arc<Self>,
        transport: Arc<SessionTransport>,
        mut frames: mpsc::Receiver<AudioFrame>,
    ) {
        while let Some(frame) = frames.recv().await {
            let rms = frame.rms();
            let outcome = transport.send_audio(encode_frame(&frame.samples));
            match outcome {
                SendOutcome::Sent => CallDiagnostics::bump(&self.diagnostics.frames_sent),
                SendOutcome::NotReady => {
                    CallDiagnostics::bump(&self.diagnostics.frames_dropped_not_ready);
                    debug!("dropping frame captured before setup ack");
                }
                SendOutcome::Backpressure => {
                    CallDiagnostics::bump(&self.diagnostics.frames_dropped_backpressure);
                    warn!("socket writer backed up, dropping frame");
                }
                SendOutcome::Closed => break,
            }
            let _ = self.activity_tx.send(AudioActivityEvent {
                seq: self.seq.fetch_add(1, Ordering::Relaxed),
                rms,
                is_voiced: rms >= self.config.voice_threshold,
                sent: outcome == SendOutcome::Sent,
            });
        }
        debug!("outbound pump finished");
    }

    /// Server events, strictly in arrival order.
    async fn pump_inbound(
        self: Arc<Self>,
        session: Arc<Session>,
        scheduler: Arc<PlaybackScheduler>,
        mut inbound: mpsc::Receiver<ServerEvent>,
    ) {
        let mut epoch = scheduler.epoch();
        let failure = loop {
            let Some(event) = inbound.recv().await else {
                break None;
            };
            match event {
                ServerEvent::Audio(chunk) => {
                    CallDiagnostics::bump(&self.diagnostics.chunks_received);
                    let rate = chunk.sample_rate().unwrap_or(INBOUND_SAMPLE_RATE);
                    let buffer = match decode_chunk(chunk.data(), rate, 1) {
                        Ok(buffer) => buffer,
                        Err(e) => {
                            CallDiagnostics::bump(&self.diagnostics.chunks_malformed);
                            warn!("dropping inbound chunk: {e}");
                            continue;
                        }
                    };
                    match scheduler.schedule_if_current(&buffer, epoch) {
                        Ok(Some(_)) => CallDiagnostics::bump(&self.diagnostics.chunks_scheduled),
                        Ok(None) => {}
                        Err(e) if e.is_terminal() => break Some(e.to_string()),
                        Err(e) => warn!("failed to schedule chunk: {e}"),
                    }
                }
                ServerEvent::Interrupted => {
                    CallDiagnostics::bump(&self.diagnostics.interruptions);
                    scheduler.interrupt_all();
                    epoch = scheduler.epoch();
                }
                ServerEvent::TurnComplete => debug!("model turn complete"),
                ServerEvent::GoingAway { time_left } => {
                    info!(time_left = time_left.as_deref().unwrap_or("unknown"), "server going away")
                }
                ServerEvent::Malformed(reason) => {
                    CallDiagnostics::bump(&self.diagnostics.chunks_malformed);
                    warn!("malformed server message: {reason}");
                }
                ServerEvent::Ready => debug!("duplicate setup ack"),
                ServerEvent::Closed { reason } => {
                    info!(reason = reason.as_deref().unwrap_or(""), "remote closed the session");
                    break None;
                }
                ServerEvent::Error(e) => break Some(e),
            }
        };
        self.teardown(&session, failure);
    }

    /// Feed device completion notices back to the scheduler on a plain thread.
    fn forward_completions(
        &self,
        scheduler: &Arc<PlaybackScheduler>,
    ) -> Option<crossbeam_channel::Sender<()>> {
        let completions = scheduler.device().completions()?;
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let scheduler = Arc::clone(scheduler);
        let diagnostics = Arc::clone(&self.diagnostics);

        let spawned = std::thread::Builder::new()
            .name("callbridge-playback-done".into())
            .spawn(move || loop {
                crossbeam_channel::select! {
                    recv(completions) -> msg => match msg {
                        Ok(id) => {
                            scheduler.finished(id);
                            CallDiagnostics::bump(&diagnostics.units_completed);
                        }
                        Err(_) => break,
                    },
                    recv(stop_rx) -> _ => break,
                }
            });
        match spawned {
            Ok(_) => Some(stop_tx),
            Err(e) => {
                warn!("failed to spawn completion forwarder: {e}");
                None
            }
        }
    }

    /// Release everything the session holds. Runs at most once per session.
    fn teardown(&self, session: &Session, failure: Option<String>) {
        if session.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        session.cancel.send_replace(true);
        match failure.as_deref() {
            Some(reason) => {
                session.transport.fail(reason);
            }
            None => {
                session.transport.begin_close();
            }
        }

        let resources = std::mem::take(&mut *session.resources.lock());
        if let Some(capture) = &resources.capture {
            capture.stop();
        }
        if let Some(scheduler) = &resources.scheduler {
            scheduler.drain_all();
        }
        session.transport.close();
        if let Some(scheduler) = &resources.scheduler {
            scheduler.release_output();
        }
        drop(resources.completion_stop);
        for task in resources.tasks {
            task.abort();
        }

        let state = session.transport.state();
        let snap = self.diagnostics.snapshot();
        info!(
            session = session.id,
            state = ?state,
            frames_captured = snap.frames_captured,
            frames_sent = snap.frames_sent,
            frames_dropped_queue = snap.frames_dropped_queue,
            frames_dropped_not_ready = snap.frames_dropped_not_ready,
            frames_dropped_backpressure = snap.frames_dropped_backpressure,
            chunks_received = snap.chunks_received,
            chunks_scheduled = snap.chunks_scheduled,
            chunks_malformed = snap.chunks_malformed,
            interruptions = snap.interruptions,
            "call ended, diagnostics"
        );
        self.emit_status(state, failure);
    }

    fn emit_transcript(&self, message: ChatMessage) {
        let _ = self.transcript_tx.send(TranscriptEvent {
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            message,
        });
    }

    fn emit_status(&self, state: SessionState, detail: Option<String>) {
        let _ = self.status_tx.send(CallStatusEvent {
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            state,
            detail,
        });
    }
}

fn join_error(e: tokio::task::JoinError) -> CallError {
    CallError::Other(anyhow::anyhow!("device task died unexpectedly: {e}"))
}

/// `Some(value)` on success; otherwise remember the first error.
fn keep_ok<T>(result: Result<T>, first_error: &mut Option<CallError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            if first_error.is_none() {
                *first_error = Some(e);
            }
            None
        }
    }
}

/// Release resources that were acquired after the session was torn down.
fn release_unowned(capture: Option<CaptureHandle>, scheduler: Option<Arc<PlaybackScheduler>>) {
    if let Some(capture) = capture {
        capture.stop();
    }
    if let Some(scheduler) = scheduler {
        scheduler.drain_all();
        scheduler.release_output();
    }
}

/// `base * 2^(attempt-1)` plus up to `base / 2` of jitter.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exp = base.saturating_mul(1u32 << (attempt.saturating_sub(1)).min(6));
    let jitter_ms = (base.as_millis() / 2) as u64;
    let jitter = if jitter_ms == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..=jitter_ms)
    };
    exp + Duration::from_millis(jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_stays_bounded() {
        let base = Duration::from_millis(100);
        let first = backoff_delay(base, 1);
        assert!(first >= base && first <= base + Duration::from_millis(50));
        let third = backoff_delay(base, 3);
        assert!(third >= Duration::from_millis(400) && third <= Duration::from_millis(450));
        // Exponent is capped.
        assert!(backoff_delay(base, 40) <= Duration::from_millis(6_450));
    }

    #[test]
    fn keep_ok_remembers_only_the_first_error() {
        let mut first = None;
        assert_eq!(keep_ok(Ok(1), &mut first), Some(1));
        assert_eq!(keep_ok::<u8>(Err(CallError::AlreadyActive), &mut first), None);
        assert_eq!(keep_ok::<u8>(Err(CallError::Cancelled), &mut first), None);
        assert!(matches!(first, Some(CallError::AlreadyActive)));
    }

    #[test]
    fn default_config_matches_documented_values() {
        let config = CallConfig::default();
        assert_eq!(config.capture.frame_samples, 4096);
        assert_eq!(config.capture.sample_rate, 16_000);
        assert_eq!(config.frame_queue, 32);
        assert_eq!(config.connect_attempts, 1);
        assert_eq!(config.handshake_timeout, Duration::from_secs(10));
        assert_eq!(config.voice_name, "Zephyr");
    }
}
