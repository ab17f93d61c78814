//! `generateContent` client for the text chat.

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    assistant::TextBackend,
    error::{CallError, Result},
    transport::protocol::{Content, GenerationConfig},
};

pub const DEFAULT_TEXT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TEMPERATURE: f32 = 0.6;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    system_instruction: Content,
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize, Default)]
struct ResponseCandidate {
    #[serde(default)]
    content: Option<Content>,
}

/// Reply text of the first candidate, empty when there is none.
fn reply_text(response: &GenerateResponse) -> String {
    response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(Content::joined_text)
        .unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct GeminiTextClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl GeminiTextClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }

    async fn request(&self, system_instruction: &str, message: &str) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(CallError::TransportFailure("no API key configured".into()));
        }

        let body = GenerateRequest {
            contents: vec![Content::text(message)],
            system_instruction: Content::text(system_instruction),
            generation_config: GenerationConfig {
                temperature: Some(self.temperature),
                ..GenerationConfig::default()
            },
        };

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CallError::TransportFailure(format!("text request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(CallError::TransportFailure(format!(
                "text backend returned {status}: {}",
                detail.chars().take(200).collect::<String>()
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| CallError::TransportFailure(format!("unreadable text reply: {e}")))?;
        let text = reply_text(&parsed);
        debug!(model = %self.model, chars = text.len(), "text reply received");
        Ok(text)
    }
}

impl TextBackend for GeminiTextClient {
    fn generate<'a>(
        &'a self,
        system_instruction: &'a str,
        message: &'a str,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.request(system_instruction, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let body = GenerateRequest {
            contents: vec![Content::text("Who is running?")],
            system_instruction: Content::text("Be neutral."),
            generation_config: GenerationConfig {
                temperature: Some(0.6),
                ..GenerationConfig::default()
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Who is running?");
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "Be neutral.");
        approx::assert_abs_diff_eq!(
            json["generationConfig"]["temperature"].as_f64().unwrap(),
            0.6,
            epsilon = 1e-6
        );
        assert!(json["generationConfig"].get("responseModalities").is_none());
    }

    #[test]
    fn reply_text_joins_first_candidate_parts() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[
                {"content":{"role":"model","parts":[{"text":"Apni "},{"text":"vote korun."}]}},
                {"content":{"parts":[{"text":"ignored"}]}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(reply_text(&response), "Apni vote korun.");
    }

    #[test]
    fn missing_candidates_give_empty_text() {
        let response: GenerateResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        assert_eq!(reply_text(&response), "");
    }

    #[test]
    fn endpoint_uses_model_path() {
        let client = GeminiTextClient::new("k", DEFAULT_TEXT_MODEL).with_api_base("http://localhost:9/v1beta/");
        assert_eq!(
            client.endpoint(),
            "http://localhost:9/v1beta/models/gemini-3-flash-preview:generateContent"
        );
    }

    #[tokio::test]
    async fn missing_key_is_an_error() {
        let client = GeminiTextClient::new("", DEFAULT_TEXT_MODEL);
        assert!(client.generate("sys", "hi").await.is_err());
    }
}
