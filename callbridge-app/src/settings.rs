//! Persistent host settings (JSON file in the app data directory).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use callbridge_core::{
    assistant::gemini::{DEFAULT_TEMPERATURE, DEFAULT_TEXT_MODEL},
    engine::{DEFAULT_VOICE_MODEL, DEFAULT_VOICE_NAME},
    CallConfig,
};
use serde::{Deserialize, Serialize};

/// Environment variables checked for the API key, in order.
pub const API_KEY_VARS: &[&str] = &["CALLBRIDGE_API_KEY", "GEMINI_API_KEY", "API_KEY"];

/// Overrides the settings file location.
pub const SETTINGS_PATH_VAR: &str = "CALLBRIDGE_SETTINGS";

const DEFAULT_OUTPUT_RATE: u32 = 24_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub preferred_input_device: Option<String>,
    pub api_key: Option<String>,
    pub text_model: String,
    pub voice_model: String,
    pub voice_name: String,
    pub temperature: f32,
    pub text_timeout_secs: u64,
    pub handshake_timeout_secs: u64,
    pub connect_attempts: u32,
    pub output_sample_rate: u32,
    /// JSON file with the candidate roster; the built-in roster when unset.
    pub roster_path: Option<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            preferred_input_device: None,
            api_key: None,
            text_model: DEFAULT_TEXT_MODEL.into(),
            voice_model: DEFAULT_VOICE_MODEL.into(),
            voice_name: DEFAULT_VOICE_NAME.into(),
            temperature: DEFAULT_TEMPERATURE,
            text_timeout_secs: 30,
            handshake_timeout_secs: 10,
            connect_attempts: 1,
            output_sample_rate: DEFAULT_OUTPUT_RATE,
            roster_path: None,
        }
    }
}

/// What `/status` shows; never includes the key itself.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSettings {
    pub text_model: String,
    pub voice_model: String,
    pub voice_name: String,
    pub has_api_key: bool,
    pub preferred_input_device: Option<String>,
}

impl AppSettings {
    pub fn normalize(&mut self) {
        self.text_model = non_empty_or(&self.text_model, DEFAULT_TEXT_MODEL);
        self.voice_model = non_empty_or(&self.voice_model, DEFAULT_VOICE_MODEL);
        self.voice_name = non_empty_or(&self.voice_name, DEFAULT_VOICE_NAME);
        self.temperature = if self.temperature.is_finite() {
            self.temperature.clamp(0.0, 2.0)
        } else {
            DEFAULT_TEMPERATURE
        };
        self.text_timeout_secs = self.text_timeout_secs.clamp(1, 300);
        self.handshake_timeout_secs = self.handshake_timeout_secs.clamp(1, 120);
        self.connect_attempts = self.connect_attempts.clamp(1, 5);
        self.output_sample_rate = self.output_sample_rate.clamp(8_000, 96_000);
        self.api_key = trimmed(self.api_key.as_deref());
        self.preferred_input_device = trimmed(self.preferred_input_device.as_deref());
        self.roster_path = self
            .roster_path
            .take()
            .filter(|p| !p.as_os_str().is_empty());
    }

    pub fn runtime_settings(&self, has_api_key: bool) -> RuntimeSettings {
        RuntimeSettings {
            text_model: self.text_model.clone(),
            voice_model: self.voice_model.clone(),
            voice_name: self.voice_name.clone(),
            has_api_key,
            preferred_input_device: self.preferred_input_device.clone(),
        }
    }

    pub fn call_config(&self) -> CallConfig {
        CallConfig {
            voice_model: self.voice_model.clone(),
            voice_name: self.voice_name.clone(),
            handshake_timeout: Duration::from_secs(self.handshake_timeout_secs),
            text_timeout: Duration::from_secs(self.text_timeout_secs),
            connect_attempts: self.connect_attempts,
            ..CallConfig::default()
        }
    }

    /// Environment first (`API_KEY_VARS` order), then the settings file.
    pub fn resolve_api_key(&self) -> Option<String> {
        api_key_from(|name| std::env::var(name).ok(), self)
    }
}

fn api_key_from(lookup: impl Fn(&str) -> Option<String>, settings: &AppSettings) -> Option<String> {
    API_KEY_VARS
        .iter()
        .find_map(|name| trimmed(lookup(name).as_deref()))
        .or_else(|| settings.api_key.clone())
}

fn non_empty_or(raw: &str, default: &str) -> String {
    let value = raw.trim();
    if value.is_empty() {
        default.into()
    } else {
        value.into()
    }
}

fn trimmed(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Callbridge")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("callbridge")
            .join("settings.json")
    }
}

/// `CALLBRIDGE_SETTINGS` when set, otherwise the platform default.
pub fn settings_path() -> PathBuf {
    std::env::var_os(SETTINGS_PATH_VAR)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(default_settings_path)
}

/// Missing or unreadable files give the defaults.
pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<AppSettings>(&raw).ok())
        .unwrap_or_default();
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}
