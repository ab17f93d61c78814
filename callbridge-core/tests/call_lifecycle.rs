use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use approx::assert_abs_diff_eq;
use callbridge_core::assistant::{default_roster, TextBackend, NO_ANSWER_REPLY, OFFLINE_REPLY};
use callbridge_core::audio::{InputBackend, InputStream};
use callbridge_core::buffering::{frame::AudioBuffer, AudioProducer, Producer};
use callbridge_core::codec::{encode_frame_at, EncodedChunk};
use callbridge_core::ipc::events::CallStatusEvent;
use callbridge_core::playback::{OutputBackend, OutputDevice, UnitId};
use callbridge_core::transport::{
    ClientEvent, ServerEvent, SessionLink, SessionSetup, SessionState, VoiceConnector,
};
use callbridge_core::{CallConfig, CallController, CallError, ChatRole, Result};
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Microphone that pushes a fixed number of samples when opened.
struct ScriptedInput {
    rate: u32,
    samples: usize,
    /// Push the samples from a helper thread after this long.
    delay: Duration,
    fail_with: Option<fn() -> CallError>,
    opens: AtomicUsize,
    released: Arc<AtomicUsize>,
}

impl ScriptedInput {
    fn with_samples(samples: usize) -> Self {
        Self {
            rate: 16_000,
            samples,
            delay: Duration::ZERO,
            fail_with: None,
            opens: AtomicUsize::new(0),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn denied() -> Self {
        Self {
            fail_with: Some(|| CallError::PermissionDenied("user dismissed the prompt".into())),
            ..Self::with_samples(0)
        }
    }
}

struct ScriptedStream {
    rate: u32,
    released: Arc<AtomicUsize>,
}

impl InputStream for ScriptedStream {
    fn sample_rate(&self) -> u32 {
        self.rate
    }
}

impl Drop for ScriptedStream {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl InputBackend for ScriptedInput {
    fn open(
        &self,
        mut producer: AudioProducer,
        _running: Arc<AtomicBool>,
    ) -> Result<Box<dyn InputStream>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(fail) = self.fail_with {
            return Err(fail());
        }
        let samples = vec![0.05f32; self.samples];
        if self.delay.is_zero() {
            producer.push_slice(&samples);
        } else {
            let delay = self.delay;
            std::thread::spawn(move || {
                std::thread::sleep(delay);
                producer.push_slice(&samples);
            });
        }
        Ok(Box::new(ScriptedStream {
            rate: self.rate,
            released: Arc::clone(&self.released),
        }))
    }
}

/// Speaker with a hand-driven clock that records what it was told to do.
struct FakeDevice {
    clock_us: AtomicU64,
    starts: Mutex<Vec<(UnitId, f64)>>,
    stops: Mutex<Vec<UnitId>>,
    closes: AtomicUsize,
    done_tx: crossbeam_channel::Sender<UnitId>,
    done_rx: Mutex<Option<crossbeam_channel::Receiver<UnitId>>>,
}

impl FakeDevice {
    fn new(now: f64) -> Self {
        let (done_tx, done_rx) = crossbeam_channel::unbounded();
        Self {
            clock_us: AtomicU64::new((now * 1e6) as u64),
            starts: Mutex::new(Vec::new()),
            stops: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
            done_tx,
            done_rx: Mutex::new(Some(done_rx)),
        }
    }

    fn advance(&self, secs: f64) {
        self.clock_us
            .fetch_add((secs * 1e6).round() as u64, Ordering::SeqCst);
    }

    fn starts(&self) -> Vec<(UnitId, f64)> {
        self.starts.lock().clone()
    }

    fn complete(&self, id: UnitId) {
        self.done_tx.send(id).unwrap();
    }
}

impl OutputDevice for FakeDevice {
    fn now(&self) -> f64 {
        self.clock_us.load(Ordering::SeqCst) as f64 / 1e6
    }

    fn start(&self, id: UnitId, _buffer: &AudioBuffer, at: f64) -> Result<()> {
        self.starts.lock().push((id, at));
        Ok(())
    }

    fn stop(&self, id: UnitId) {
        self.stops.lock().push(id);
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn completions(&self) -> Option<crossbeam_channel::Receiver<UnitId>> {
        self.done_rx.lock().take()
    }
}

struct FakeOutput {
    device: Arc<FakeDevice>,
    opens: AtomicUsize,
}

impl OutputBackend for FakeOutput {
    fn open(&self) -> Result<Arc<dyn OutputDevice>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&self.device) as Arc<dyn OutputDevice>)
    }
}

/// Remote end of an in-memory session.
struct ServerSide {
    from_client: mpsc::Receiver<ClientEvent>,
    to_client: mpsc::Sender<ServerEvent>,
    setup: SessionSetup,
}

struct LoopbackConnector {
    auto_ready: bool,
    refuse_first: AtomicUsize,
    accepted: mpsc::UnboundedSender<ServerSide>,
}

impl VoiceConnector for LoopbackConnector {
    fn connect(&self, setup: SessionSetup) -> BoxFuture<'_, Result<SessionLink>> {
        Box::pin(async move {
            if self
                .refuse_first
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(CallError::TransportFailure("connection refused".into()));
            }
            let (out_tx, out_rx) = mpsc::channel(64);
            let (in_tx, in_rx) = mpsc::channel(64);
            if self.auto_ready {
                in_tx.send(ServerEvent::Ready).await.unwrap();
            }
            let _ = self.accepted.send(ServerSide {
                from_client: out_rx,
                to_client: in_tx,
                setup,
            });
            Ok(SessionLink {
                outbound: out_tx,
                inbound: in_rx,
            })
        })
    }
}

struct CannedText {
    reply: std::result::Result<String, String>,
    delay: Duration,
    last_instruction: Mutex<String>,
}

impl CannedText {
    fn replying(reply: std::result::Result<&str, &str>) -> Self {
        Self {
            reply: reply.map(str::to_string).map_err(str::to_string),
            delay: Duration::ZERO,
            last_instruction: Mutex::new(String::new()),
        }
    }
}

impl TextBackend for CannedText {
    fn generate<'a>(
        &'a self,
        system_instruction: &'a str,
        _message: &'a str,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            *self.last_instruction.lock() = system_instruction.to_string();
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.reply
                .clone()
                .map_err(CallError::TransportFailure)
        })
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    controller: CallController,
    input: Arc<ScriptedInput>,
    output: Arc<FakeOutput>,
    text: Arc<CannedText>,
    accepted: mpsc::UnboundedReceiver<ServerSide>,
}

struct Options {
    input: ScriptedInput,
    auto_ready: bool,
    refuse_first: usize,
    text: CannedText,
    config: CallConfig,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            input: ScriptedInput::with_samples(0),
            auto_ready: true,
            refuse_first: 0,
            text: CannedText::replying(Ok("Apnar vote, apnar shokti.")),
            config: CallConfig::default(),
        }
    }
}

fn harness(options: Options) -> Harness {
    let input = Arc::new(options.input);
    let output = Arc::new(FakeOutput {
        device: Arc::new(FakeDevice::new(1.0)),
        opens: AtomicUsize::new(0),
    });
    let text = Arc::new(options.text);
    let (accepted_tx, accepted) = mpsc::unbounded_channel();
    let connector = Arc::new(LoopbackConnector {
        auto_ready: options.auto_ready,
        refuse_first: AtomicUsize::new(options.refuse_first),
        accepted: accepted_tx,
    });
    let controller = CallController::new(
        options.config,
        Arc::clone(&input) as Arc<dyn InputBackend>,
        Arc::clone(&output) as Arc<dyn OutputBackend>,
        connector,
        Arc::clone(&text) as Arc<dyn TextBackend>,
        default_roster(),
    );
    Harness {
        controller,
        input,
        output,
        text,
        accepted,
    }
}

impl Harness {
    fn device(&self) -> &FakeDevice {
        &self.output.device
    }

    async fn server(&mut self) -> ServerSide {
        tokio::time::timeout(Duration::from_secs(2), self.accepted.recv())
            .await
            .expect("timed out waiting for connect")
            .expect("connector dropped")
    }
}

fn chunk(secs: f64) -> ServerEvent {
    let samples = vec![0.1f32; (secs * 24_000.0).round() as usize];
    ServerEvent::Audio(encode_frame_at(&samples, 24_000))
}

async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let start = Instant::now();
    while !cond() {
        if start.elapsed() >= Duration::from_secs(2) {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

async fn next_status(rx: &mut broadcast::Receiver<CallStatusEvent>) -> CallStatusEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for status event")
        .expect("status channel closed")
}

// ---------------------------------------------------------------------------
// Voice call lifecycle
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn inbound_chunks_play_back_to_back() {
    let mut h = harness(Options::default());
    h.controller.start_call().await.unwrap();
    assert_eq!(h.controller.state(), SessionState::Open);

    let server = h.server().await;
    assert_eq!(server.setup.voice_name, "Zephyr");
    for secs in [0.5, 0.3, 0.2] {
        server.to_client.send(chunk(secs)).await.unwrap();
    }

    wait_until("three scheduled units", || h.device().starts().len() == 3).await;
    let starts = h.device().starts();
    assert_abs_diff_eq!(starts[0].1, 1.0, epsilon = 1e-9);
    assert_abs_diff_eq!(starts[1].1, 1.5, epsilon = 1e-9);
    assert_abs_diff_eq!(starts[2].1, 1.8, epsilon = 1e-9);
    assert_eq!(h.controller.active_playback_units(), 3);

    // Natural completion is pushed, not polled.
    h.device().complete(starts[0].0);
    wait_until("completion forwarded", || {
        h.controller.active_playback_units() == 2
    })
    .await;
    assert_eq!(h.controller.diagnostics_snapshot().chunks_scheduled, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn interruption_cuts_playback_and_restarts_at_now() {
    let mut h = harness(Options::default());
    h.controller.start_call().await.unwrap();
    let server = h.server().await;

    for secs in [0.5, 0.3, 0.2] {
        server.to_client.send(chunk(secs)).await.unwrap();
    }
    wait_until("three scheduled units", || h.device().starts().len() == 3).await;
    let first_three: Vec<UnitId> = h.device().starts().iter().map(|(id, _)| *id).collect();

    h.device().advance(0.2);
    server.to_client.send(ServerEvent::Interrupted).await.unwrap();
    server.to_client.send(chunk(0.25)).await.unwrap();

    wait_until("fourth unit", || h.device().starts().len() == 4).await;
    let mut stopped = h.device().stops.lock().clone();
    stopped.sort();
    assert_eq!(stopped, first_three);
    assert_abs_diff_eq!(h.device().starts()[3].1, 1.2, epsilon = 1e-9);
    assert_eq!(h.controller.active_playback_units(), 1);
    assert_eq!(h.controller.diagnostics_snapshot().interruptions, 1);
    assert_eq!(h.controller.state(), SessionState::Open);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn second_start_is_rejected_without_touching_the_call() {
    let h = harness(Options::default());
    h.controller.start_call().await.unwrap();

    let err = h.controller.start_call().await.unwrap_err();
    assert!(matches!(err, CallError::AlreadyActive));
    assert_eq!(h.controller.state(), SessionState::Open);
    assert_eq!(h.input.opens.load(Ordering::SeqCst), 1);
    assert_eq!(h.output.opens.load(Ordering::SeqCst), 1);
    assert_eq!(h.device().closes.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_without_a_call_is_a_no_op() {
    let h = harness(Options::default());
    let mut status = h.controller.subscribe_status();

    h.controller.stop_call();
    h.controller.stop_call();

    assert_eq!(h.controller.state(), SessionState::Idle);
    assert_eq!(h.input.opens.load(Ordering::SeqCst), 0);
    assert_eq!(h.output.opens.load(Ordering::SeqCst), 0);
    assert!(status.try_recv().is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_releases_everything_and_allows_a_new_call() {
    let mut h = harness(Options::default());
    let mut status = h.controller.subscribe_status();
    h.controller.start_call().await.unwrap();
    let mut server = h.server().await;
    assert_eq!(next_status(&mut status).await.state, SessionState::Opening);
    assert_eq!(next_status(&mut status).await.state, SessionState::Open);

    h.controller.stop_call();
    assert_eq!(h.controller.state(), SessionState::Closed);
    assert_eq!(next_status(&mut status).await.state, SessionState::Closed);
    assert_eq!(h.device().closes.load(Ordering::SeqCst), 1);
    wait_until("microphone released", || {
        h.input.released.load(Ordering::SeqCst) == 1
    })
    .await;
    assert_eq!(server.from_client.recv().await, Some(ClientEvent::Close));

    // Idempotent.
    h.controller.stop_call();
    assert_eq!(h.device().closes.load(Ordering::SeqCst), 1);

    h.controller.start_call().await.unwrap();
    assert_eq!(h.controller.state(), SessionState::Open);
    assert_eq!(h.input.opens.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn malformed_chunk_is_dropped_and_the_call_continues() {
    let mut h = harness(Options::default());
    h.controller.start_call().await.unwrap();
    let server = h.server().await;

    // Odd byte count cannot be 16-bit PCM.
    let odd = EncodedChunk::new("audio/pcm;rate=24000", vec![1, 2, 3]);
    server.to_client.send(ServerEvent::Audio(odd)).await.unwrap();
    server
        .to_client
        .send(ServerEvent::Malformed("bad base64".into()))
        .await
        .unwrap();
    server.to_client.send(chunk(0.1)).await.unwrap();

    wait_until("valid chunk scheduled", || h.device().starts().len() == 1).await;
    assert_eq!(h.controller.state(), SessionState::Open);
    assert_eq!(h.controller.diagnostics_snapshot().chunks_malformed, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn audio_captured_before_setup_ack_never_reaches_the_link() {
    let mut h = harness(Options {
        input: ScriptedInput::with_samples(4096 * 4),
        auto_ready: false,
        ..Options::default()
    });

    let controller = h.controller.clone();
    let start = tokio::spawn(async move { controller.start_call().await });
    let mut server = h.server().await;

    wait_until("pre-ack frames dropped", || {
        h.controller.diagnostics_snapshot().frames_dropped_not_ready == 4
    })
    .await;
    assert_eq!(h.controller.state(), SessionState::Opening);
    assert!(server.from_client.try_recv().is_err());

    server.to_client.send(ServerEvent::Ready).await.unwrap();
    start.await.unwrap().unwrap();
    assert_eq!(h.controller.state(), SessionState::Open);
    assert!(server.from_client.try_recv().is_err());
    assert_eq!(h.controller.diagnostics_snapshot().frames_sent, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn captured_frames_are_encoded_and_sent_once_open() {
    let mut h = harness(Options {
        input: ScriptedInput {
            delay: Duration::from_millis(200),
            ..ScriptedInput::with_samples(4096 * 2)
        },
        ..Options::default()
    });
    let mut activity = h.controller.subscribe_activity();
    h.controller.start_call().await.unwrap();
    let mut server = h.server().await;

    let mut sent = 0;
    while sent < 2 {
        match tokio::time::timeout(Duration::from_secs(2), server.from_client.recv()).await {
            Ok(Some(ClientEvent::Audio(chunk))) => {
                assert_eq!(chunk.mime_type(), "audio/pcm;rate=16000");
                assert_eq!(chunk.len(), 4096 * 2);
                sent += 1;
            }
            other => panic!("expected audio, got {other:?}"),
        }
    }
    let event = tokio::time::timeout(Duration::from_secs(2), activity.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(event.sent);
    assert!(event.is_voiced);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn remote_close_ends_the_call_cleanly() {
    let mut h = harness(Options::default());
    let mut status = h.controller.subscribe_status();
    h.controller.start_call().await.unwrap();
    let server = h.server().await;
    next_status(&mut status).await;
    next_status(&mut status).await;

    server
        .to_client
        .send(ServerEvent::Closed { reason: None })
        .await
        .unwrap();

    let ended = next_status(&mut status).await;
    assert_eq!(ended.state, SessionState::Closed);
    assert!(ended.is_ended());
    assert_eq!(h.controller.state(), SessionState::Closed);
    assert_eq!(h.device().closes.load(Ordering::SeqCst), 1);
    wait_until("microphone released", || {
        h.input.released.load(Ordering::SeqCst) == 1
    })
    .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn transport_error_fails_the_call() {
    let mut h = harness(Options::default());
    let mut status = h.controller.subscribe_status();
    h.controller.start_call().await.unwrap();
    let server = h.server().await;
    next_status(&mut status).await;
    next_status(&mut status).await;

    server
        .to_client
        .send(ServerEvent::Error("connection reset by peer".into()))
        .await
        .unwrap();

    let failed = next_status(&mut status).await;
    assert_eq!(failed.state, SessionState::Failed);
    assert_eq!(failed.detail.as_deref(), Some("connection reset by peer"));
    assert_eq!(h.device().closes.load(Ordering::SeqCst), 1);
    assert!(!h.controller.is_call_active());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn denied_microphone_fails_start_and_releases_the_speaker() {
    let h = harness(Options {
        input: ScriptedInput::denied(),
        ..Options::default()
    });
    let mut status = h.controller.subscribe_status();

    let err = h.controller.start_call().await.unwrap_err();
    assert!(matches!(err, CallError::PermissionDenied(_)));
    assert_eq!(h.controller.state(), SessionState::Failed);
    assert_eq!(h.device().closes.load(Ordering::SeqCst), 1);

    assert_eq!(next_status(&mut status).await.state, SessionState::Opening);
    let failed = next_status(&mut status).await;
    assert_eq!(failed.state, SessionState::Failed);
    assert!(failed.detail.unwrap().contains("denied"));

    // A failed call does not block the next attempt.
    let err = h.controller.start_call().await.unwrap_err();
    assert!(matches!(err, CallError::PermissionDenied(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_during_opening_cancels_the_start() {
    let mut h = harness(Options {
        auto_ready: false,
        ..Options::default()
    });
    let controller = h.controller.clone();
    let start = tokio::spawn(async move { controller.start_call().await });
    let _server = h.server().await;
    assert_eq!(h.controller.state(), SessionState::Opening);

    h.controller.stop_call();
    let result = start.await.unwrap();
    assert!(matches!(result, Err(CallError::Cancelled)));
    assert_eq!(h.controller.state(), SessionState::Closed);
    wait_until("microphone released", || {
        h.input.released.load(Ordering::SeqCst) == h.input.opens.load(Ordering::SeqCst)
    })
    .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn handshake_timeout_fails_the_start() {
    let mut h = harness(Options {
        auto_ready: false,
        config: CallConfig {
            handshake_timeout: Duration::from_millis(50),
            ..CallConfig::default()
        },
        ..Options::default()
    });
    let err = h.controller.start_call().await.unwrap_err();
    assert!(matches!(err, CallError::TransportFailure(_)));
    assert_eq!(h.controller.state(), SessionState::Failed);
    assert_eq!(h.device().closes.load(Ordering::SeqCst), 1);
    let _ = h.server().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn connect_retries_only_when_configured() {
    let h = harness(Options {
        refuse_first: 1,
        ..Options::default()
    });
    assert!(matches!(
        h.controller.start_call().await,
        Err(CallError::TransportFailure(_))
    ));

    let h = harness(Options {
        refuse_first: 2,
        config: CallConfig {
            connect_attempts: 3,
            connect_backoff: Duration::from_millis(1),
            ..CallConfig::default()
        },
        ..Options::default()
    });
    h.controller.start_call().await.unwrap();
    assert_eq!(h.controller.state(), SessionState::Open);
}

// ---------------------------------------------------------------------------
// Text chat
// ---------------------------------------------------------------------------

#[tokio::test]
async fn text_reply_is_grounded_with_the_roster() {
    let h = harness(Options::default());
    let reply = h.controller.send_text("Ke ke darachhen?").await;
    assert_eq!(reply, "Apnar vote, apnar shokti.");

    let instruction = h.text.last_instruction.lock().clone();
    for candidate in default_roster() {
        assert!(instruction.contains(&candidate.context_line()));
    }
}

#[tokio::test]
async fn text_exchange_is_broadcast_as_transcript_events() {
    let h = harness(Options::default());
    let mut transcript = h.controller.subscribe_transcript();

    h.controller.send_text("Ke ke darachhen?").await;

    let asked = transcript.try_recv().unwrap();
    let answered = transcript.try_recv().unwrap();
    assert_eq!(asked.message.role, ChatRole::User);
    assert_eq!(asked.message.text, "Ke ke darachhen?");
    assert_eq!(answered.message.role, ChatRole::Assistant);
    assert_eq!(answered.message.text, "Apnar vote, apnar shokti.");
    assert!(asked.seq < answered.seq);
}

#[tokio::test]
async fn empty_text_reply_becomes_the_no_answer_fallback() {
    let h = harness(Options {
        text: CannedText::replying(Ok("   ")),
        ..Options::default()
    });
    assert_eq!(h.controller.send_text("hello").await, NO_ANSWER_REPLY);
}

#[tokio::test]
async fn text_failure_becomes_the_offline_fallback() {
    let h = harness(Options {
        text: CannedText::replying(Err("503")),
        ..Options::default()
    });
    assert_eq!(h.controller.send_text("hello").await, OFFLINE_REPLY);
}

#[tokio::test]
async fn slow_text_reply_times_out_to_the_offline_fallback() {
    let h = harness(Options {
        text: CannedText {
            delay: Duration::from_secs(5),
            ..CannedText::replying(Ok("too late"))
        },
        config: CallConfig {
            text_timeout: Duration::from_millis(50),
            ..CallConfig::default()
        },
        ..Options::default()
    });
    assert_eq!(h.controller.send_text("hello").await, OFFLINE_REPLY);
}
