//! WebSocket connector for the Gemini Live API.
//!
//! `connect` dials the socket and writes the setup message, then splits the
//! stream into two tasks:
//!
//! - **writer**: drains `ClientEvent`s and writes JSON text frames; a
//!   `ClientEvent::Close` (or the sender being dropped) sends a close frame.
//! - **reader**: parses every text/binary frame into `ServerEvent`s and
//!   forwards them in arrival order; the stream ending becomes
//!   `ServerEvent::Closed`, a socket error becomes `ServerEvent::Error`.

use futures_util::{future::BoxFuture, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::{
    error::{CallError, Result},
    transport::{
        protocol::{parse_server_message, ClientMessage},
        ClientEvent, ServerEvent, SessionLink, SessionSetup, VoiceConnector,
    },
};

pub const DEFAULT_LIVE_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Outbound queue depth (chunks). Full → `SendOutcome::Backpressure`.
const OUTBOUND_CAPACITY: usize = 64;
const INBOUND_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct GeminiLiveConnector {
    endpoint: String,
    api_key: String,
}

impl GeminiLiveConnector {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_LIVE_ENDPOINT.to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn url(&self) -> String {
        if self.api_key.is_empty() {
            self.endpoint.clone()
        } else {
            format!("{}?key={}", self.endpoint, self.api_key)
        }
    }
}

impl VoiceConnector for GeminiLiveConnector {
    fn connect(&self, setup: SessionSetup) -> BoxFuture<'_, Result<SessionLink>> {
        Box::pin(async move {
            if self.api_key.is_empty() {
                return Err(CallError::TransportFailure("no API key configured".into()));
            }

            info!(endpoint = %self.endpoint, model = %setup.model, "connecting voice session");
            let (ws, _response) = connect_async(self.url())
                .await
                .map_err(|e| CallError::TransportFailure(format!("connect failed: {e}")))?;
            let (mut sink, mut stream) = ws.split();

            let setup_json = ClientMessage::setup(&setup).to_json()?;
            sink.send(Message::Text(setup_json))
                .await
                .map_err(|e| CallError::TransportFailure(format!("setup send failed: {e}")))?;

            let (out_tx, mut out_rx) = mpsc::channel::<ClientEvent>(OUTBOUND_CAPACITY);
            let (in_tx, in_rx) = mpsc::channel::<ServerEvent>(INBOUND_CAPACITY);

            tokio::spawn(async move {
                while let Some(event) = out_rx.recv().await {
                    let chunk = match event {
                        ClientEvent::Audio(chunk) => chunk,
                        ClientEvent::Close => break,
                    };
                    let frame = match ClientMessage::audio(&chunk).to_json() {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!("failed to serialize audio frame: {e}");
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(Message::Text(frame)).await {
                        debug!("voice socket write failed: {e}");
                        return;
                    }
                }
                let _ = sink.send(Message::Close(None)).await;
                let _ = sink.close().await;
                debug!("voice socket writer finished");
            });

            tokio::spawn(async move {
                let outcome = loop {
                    let text = match stream.next().await {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                            Ok(text) => text,
                            Err(_) => {
                                let _ = in_tx
                                    .send(ServerEvent::Malformed("binary frame is not UTF-8".into()))
                                    .await;
                                continue;
                            }
                        },
                        Some(Ok(Message::Close(frame))) => {
                            break ServerEvent::Closed {
                                reason: frame
                                    .map(|f| f.reason.to_string())
                                    .filter(|r| !r.is_empty()),
                            };
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => break ServerEvent::Error(e.to_string()),
                        None => break ServerEvent::Closed { reason: None },
                    };

                    match parse_server_message(&text) {
                        Ok(events) => {
                            for event in events {
                                if in_tx.send(event).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            debug!("unrecognised server frame: {e}");
                            if in_tx.send(ServerEvent::Malformed(e.to_string())).await.is_err() {
                                return;
                            }
                        }
                    }
                };
                let _ = in_tx.send(outcome).await;
                debug!("voice socket reader finished");
            });

            Ok(SessionLink {
                outbound: out_tx,
                inbound: in_rx,
            })
        })
    }
}
