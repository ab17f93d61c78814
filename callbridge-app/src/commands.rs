//! Command handlers behind the terminal UI.
//!
//! Each handler maps core errors to `String` so the UI layer only ever
//! prints them.

use callbridge_core::{audio::device::DeviceInfo, ChatMessage};
use tracing::info;

use crate::settings::{save_settings, RuntimeSettings};
use crate::state::{AppState, CallStatus};

/// Show the chat panel and return the transcript so far.
pub async fn open_chat(state: &AppState) -> Result<Vec<ChatMessage>, String> {
    let mut chat = state.chat.lock();
    chat.is_open = true;
    Ok(chat.transcript())
}

/// Hide the chat panel. A live call keeps running.
pub async fn close_chat(state: &AppState) -> Result<(), String> {
    state.chat.lock().is_open = false;
    Ok(())
}

/// Append the user's message, ask the assistant, append and return its reply.
pub async fn send_text(state: &AppState, text: &str) -> Result<ChatMessage, String> {
    let message = text.trim();
    {
        let mut chat = state.chat.lock();
        if !chat.is_open {
            return Err("chat is closed; /open it first".into());
        }
        if message.is_empty() {
            return Err("message is empty".into());
        }
        if chat.is_loading {
            return Err("still waiting for the previous reply".into());
        }
        chat.conversation.push(ChatMessage::user(message));
        chat.is_loading = true;
    }

    let reply = ChatMessage::assistant(state.controller.send_text(message).await);

    let mut chat = state.chat.lock();
    chat.conversation.push(reply.clone());
    chat.is_loading = false;
    Ok(reply)
}

/// Start a voice call from the open chat panel.
pub async fn start_call(state: &AppState) -> Result<(), String> {
    if !state.chat.lock().is_open {
        return Err("chat is closed; /open it first".into());
    }
    state.controller.start_call().await.map_err(|e| e.to_string())
}

pub async fn stop_call(state: &AppState) -> Result<(), String> {
    state.controller.stop_call();
    let diag = state.controller.diagnostics_snapshot();
    info!(
        frames_sent = diag.frames_sent,
        chunks_scheduled = diag.chunks_scheduled,
        interruptions = diag.interruptions,
        "call diagnostics snapshot on hang-up"
    );
    Ok(())
}

pub async fn call_status(state: &AppState) -> Result<CallStatus, String> {
    Ok(state.call_status())
}

pub async fn list_audio_devices(_state: &AppState) -> Result<Vec<DeviceInfo>, String> {
    Ok(callbridge_core::audio::device::list_devices())
}

pub async fn get_runtime_settings(state: &AppState) -> Result<RuntimeSettings, String> {
    Ok(state.settings.lock().runtime_settings(state.has_api_key))
}

/// Persist the preferred microphone. Takes effect on the next launch.
pub async fn set_preferred_input_device(
    state: &AppState,
    device_name: Option<String>,
) -> Result<(), String> {
    let normalized = device_name
        .as_ref()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let mut settings = state.settings.lock();
    settings.preferred_input_device = normalized;
    save_settings(&state.settings_path, &settings).map_err(|e| e.to_string())
}
