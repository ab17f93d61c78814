//! Dhaka-17 assistant terminal host.
//!
//! Reads commands from stdin: `/open`, `/close`, `/call`, `/hangup`,
//! `/status`, `/settings`, `/devices`, `/mic <name>`, `/quit`. Any other line is
//! sent to the assistant as a chat message.

mod commands;
mod roster;
mod settings;
mod state;

use std::sync::Arc;

use anyhow::Context;
use callbridge_core::{
    ipc::events::CallStatusEvent, CallController, ChatMessage, ChatRole, CpalInput,
    CpalOutput, GeminiLiveConnector, GeminiTextClient, SessionState,
};
use settings::{load_settings, settings_path};
use state::AppState;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const HELP: &str = "\
commands:
  /open           open the chat panel
  /close          close the chat panel
  /call           start a voice call
  /hangup         end the voice call
  /status         call and chat status
  /settings       models, voice and key status
  /devices        list audio devices
  /mic <name>     remember a microphone for the next launch
  /quit           exit
anything else is sent to the assistant";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("callbridge=info,callbridge_core=info")),
        )
        .init();

    info!("callbridge starting");

    let settings_path = settings_path();
    let app_settings = load_settings(&settings_path);
    let api_key = app_settings.resolve_api_key();
    info!(
        settings_path = ?settings_path,
        text_model = %app_settings.text_model,
        voice_model = %app_settings.voice_model,
        voice_name = %app_settings.voice_name,
        has_api_key = api_key.is_some(),
        "settings loaded"
    );
    if api_key.is_none() {
        warn!("no API key configured; set CALLBRIDGE_API_KEY or GEMINI_API_KEY");
    }
    let api_key = api_key.unwrap_or_default();

    let roster = roster::load_roster(app_settings.roster_path.as_deref());
    let controller = CallController::new(
        app_settings.call_config(),
        Arc::new(CpalInput::new(app_settings.preferred_input_device.clone())),
        Arc::new(CpalOutput::new(app_settings.output_sample_rate)),
        Arc::new(GeminiLiveConnector::new(api_key.clone())),
        Arc::new(
            GeminiTextClient::new(api_key.clone(), app_settings.text_model.clone())
                .with_temperature(app_settings.temperature),
        ),
        roster,
    );

    let state = Arc::new(AppState::new(
        controller.clone(),
        app_settings,
        settings_path,
        !api_key.is_empty(),
    ));

    tokio::spawn(report_call_status(controller.subscribe_status()));

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (command, arg) = line.split_once(' ').unwrap_or((line, ""));
        match command {
            "/quit" | "/exit" => break,
            "/help" => println!("{HELP}"),
            "/open" => match commands::open_chat(&state).await {
                Ok(transcript) => transcript.iter().for_each(print_message),
                Err(e) => println!("! {e}"),
            },
            "/close" => {
                let _ = commands::close_chat(&state).await;
                println!("chat closed");
            }
            "/call" => {
                if !state.chat.lock().is_open {
                    println!("! chat is closed; /open it first");
                    continue;
                }
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    println!("connecting...");
                    match commands::start_call(&state).await {
                        Ok(()) => {}
                        // Already reported by the status watcher.
                        Err(e) if state.controller.state().is_terminal() => {
                            debug!("call start failed: {e}")
                        }
                        Err(e) => println!("! {e}"),
                    }
                });
            }
            "/hangup" => {
                let _ = commands::stop_call(&state).await;
            }
            "/status" => match commands::call_status(&state).await {
                Ok(status) => print_json(&status),
                Err(e) => println!("! {e}"),
            },
            "/settings" => match commands::get_runtime_settings(&state).await {
                Ok(settings) => print_json(&settings),
                Err(e) => println!("! {e}"),
            },
            "/devices" => match commands::list_audio_devices(&state).await {
                Ok(devices) if devices.is_empty() => println!("no audio devices found"),
                Ok(devices) => {
                    for device in devices {
                        println!(
                            "{:>6} {}{}{}",
                            format!("{:?}", device.direction).to_lowercase(),
                            device.name,
                            if device.is_default { " [default]" } else { "" },
                            if device.is_recommended { " [recommended]" } else { "" },
                        );
                    }
                }
                Err(e) => println!("! {e}"),
            },
            "/mic" => {
                let name = Some(arg.to_string()).filter(|a| !a.trim().is_empty());
                match commands::set_preferred_input_device(&state, name).await {
                    Ok(()) => println!("microphone preference saved; restart to apply"),
                    Err(e) => println!("! could not save settings: {e}"),
                }
            }
            _ if command.starts_with('/') => println!("unknown command {command}; try /help"),
            _ => {
                let state = Arc::clone(&state);
                let text = line.to_string();
                tokio::spawn(async move {
                    match commands::send_text(&state, &text).await {
                        Ok(reply) => print_message(&reply),
                        Err(e) => println!("! {e}"),
                    }
                });
            }
        }
    }

    controller.stop_call();
    info!("callbridge exiting");
    Ok(())
}

/// Tell the user when a call connects or ends; the host then falls back to
/// text chat.
async fn report_call_status(mut rx: broadcast::Receiver<CallStatusEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => match event.state {
                SessionState::Open => println!("call connected, listening... (/hangup to end)"),
                SessionState::Failed => println!(
                    "call ended: {}",
                    event.detail.as_deref().unwrap_or("connection failed")
                ),
                _ if event.is_ended() => println!("call ended"),
                _ => {}
            },
            Err(broadcast::error::RecvError::Lagged(n)) => warn!(skipped = n, "status events lagged"),
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_message(message: &ChatMessage) {
    let who = match message.role {
        ChatRole::User => "you",
        ChatRole::Assistant => "assistant",
    };
    println!("[{}] {who}: {}", message.at.format("%H:%M"), message.text);
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => println!("! {e}"),
    }
}
