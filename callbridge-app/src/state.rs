//! Host application state.
//!
//! One `AppState` is built at startup and handed by reference to every
//! command handler.

use std::path::PathBuf;
use std::sync::Arc;

use callbridge_core::{
    transport::SessionState, CallController, ChatMessage, Conversation, DiagnosticsSnapshot,
};
use parking_lot::Mutex;
use serde::Serialize;

use crate::settings::AppSettings;

pub struct AppState {
    pub controller: CallController,
    pub chat: Arc<Mutex<ChatPanel>>,
    /// Persisted settings cache.
    pub settings: Arc<Mutex<AppSettings>>,
    /// Absolute path to `settings.json`.
    pub settings_path: PathBuf,
    pub has_api_key: bool,
}

impl AppState {
    pub fn new(
        controller: CallController,
        settings: AppSettings,
        settings_path: PathBuf,
        has_api_key: bool,
    ) -> Self {
        Self {
            controller,
            chat: Arc::new(Mutex::new(ChatPanel::default())),
            settings: Arc::new(Mutex::new(settings)),
            settings_path,
            has_api_key,
        }
    }

    pub fn call_status(&self) -> CallStatus {
        let state = self.controller.state();
        let chat = self.chat.lock();
        CallStatus {
            state,
            is_call_active: state.is_live(),
            chat_open: chat.is_open,
            awaiting_reply: chat.is_loading,
            messages: chat.conversation.len(),
            active_playback_units: self.controller.active_playback_units(),
            diagnostics: self.controller.diagnostics_snapshot(),
        }
    }
}

/// The chat window: open flag, transcript, and whether a reply is pending.
#[derive(Debug, Default)]
pub struct ChatPanel {
    pub is_open: bool,
    pub is_loading: bool,
    pub conversation: Conversation,
}

impl ChatPanel {
    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.conversation.messages().to_vec()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStatus {
    pub state: SessionState,
    pub is_call_active: bool,
    pub chat_open: bool,
    pub awaiting_reply: bool,
    pub messages: usize,
    pub active_playback_units: usize,
    pub diagnostics: DiagnosticsSnapshot,
}
