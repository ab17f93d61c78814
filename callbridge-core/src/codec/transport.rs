//! Binary ⇄ text encoding for embedding PCM in the JSON session protocol.
//!
//! Standard base64 alphabet with padding, which is what the voice backend
//! expects in `inlineData.data` / `mediaChunks[].data`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::error::{CallError, Result};

/// Encode bytes for a text-based protocol field.
pub fn to_transport(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Inverse of [`to_transport`].
///
/// # Errors
/// `CallError::MalformedAudio` if `text` is not valid base64.
pub fn from_transport(text: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(text.trim())
        .map_err(|e| CallError::MalformedAudio(format!("invalid base64 payload: {e}")))
}
