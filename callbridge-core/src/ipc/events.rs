//! Events broadcast by the call controller.
//!
//! | Event | Subscribe with |
//! |-------|----------------|
//! | `CallStatusEvent` | `CallController::subscribe_status` |
//! | `AudioActivityEvent` | `CallController::subscribe_activity` |
//! | `TranscriptEvent` | `CallController::subscribe_transcript` |

use serde::{Deserialize, Serialize};

use crate::{assistant::ChatMessage, transport::SessionState};

// ---------------------------------------------------------------------------
// Call status events
// ---------------------------------------------------------------------------

/// Emitted on every session state change the host should know about.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStatusEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    pub state: SessionState,
    /// Optional human-readable detail (e.g. the failure reason).
    pub detail: Option<String>,
}

impl CallStatusEvent {
    /// The call is over and the host should fall back to text chat.
    pub fn is_ended(&self) -> bool {
        self.state.is_terminal()
    }
}

// ---------------------------------------------------------------------------
// Audio activity events
// ---------------------------------------------------------------------------

/// Emitted for each captured microphone frame while a call is live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioActivityEvent {
    pub seq: u64,
    /// Root-mean-square level of the frame in [0.0, 1.0].
    pub rms: f32,
    /// Level above the voice threshold.
    pub is_voiced: bool,
    /// Whether the frame made it onto the wire.
    pub sent: bool,
}

// ---------------------------------------------------------------------------
// Transcript events
// ---------------------------------------------------------------------------

/// A message added to the text conversation: the user's utterance as sent,
/// then the assistant's reply (or fallback).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEvent {
    pub seq: u64,
    pub message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_status_event_serializes_with_lowercase_state() {
        let event = CallStatusEvent {
            seq: 4,
            state: SessionState::Failed,
            detail: Some("microphone access denied".into()),
        };

        let json = serde_json::to_value(&event).expect("serialize status event");
        assert_eq!(json["seq"], 4);
        assert_eq!(json["state"], "failed");
        assert_eq!(json["detail"], "microphone access denied");

        let round_trip: CallStatusEvent =
            serde_json::from_value(json).expect("deserialize status event");
        assert_eq!(round_trip.state, SessionState::Failed);
        assert!(round_trip.is_ended());
    }

    #[test]
    fn session_state_rejects_non_lowercase_values() {
        assert!(serde_json::from_str::<SessionState>(r#""Open""#).is_err());
        assert_eq!(
            serde_json::from_str::<SessionState>(r#""open""#).unwrap(),
            SessionState::Open
        );
    }

    #[test]
    fn audio_activity_event_serializes_with_camel_case_fields() {
        let event = AudioActivityEvent {
            seq: 3,
            rms: 0.18,
            is_voiced: true,
            sent: false,
        };

        let json = serde_json::to_value(&event).expect("serialize activity event");
        let rms = json["rms"].as_f64().expect("rms should serialize as number");
        assert!((rms - 0.18).abs() < 1e-5);
        assert_eq!(json["isVoiced"], true);
        assert_eq!(json["sent"], false);
    }

    #[test]
    fn transcript_event_nests_the_message() {
        let event = TranscriptEvent {
            seq: 9,
            message: ChatMessage::assistant("Apnar vote, apnar shokti."),
        };
        let json = serde_json::to_value(&event).expect("serialize transcript event");
        assert_eq!(json["message"]["role"], "assistant");
        assert_eq!(json["message"]["text"], "Apnar vote, apnar shokti.");
    }
}
