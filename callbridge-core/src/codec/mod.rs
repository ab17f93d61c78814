//! PCM codec: f32 samples ⇄ 16-bit little-endian PCM.
//!
//! The streaming session speaks 16-bit signed mono PCM in both directions
//! (16 kHz up, 24 kHz down). Samples are scaled by 32768 and truncated toward
//! zero; the result saturates at the i16 range so a hot input of `2.0` encodes
//! exactly like `1.0` instead of wrapping negative.

pub mod transport;

pub use transport::{from_transport, to_transport};

use crate::buffering::frame::AudioBuffer;
use crate::error::{CallError, Result};

/// Sample rate of outbound (microphone) audio on the wire.
pub const OUTBOUND_SAMPLE_RATE: u32 = 16_000;

/// Sample rate of inbound (synthesized) audio on the wire.
pub const INBOUND_SAMPLE_RATE: u32 = 24_000;

/// MIME tag attached to outbound chunks.
pub const OUTBOUND_MIME: &str = "audio/pcm;rate=16000";

const PCM_SCALE: f32 = 32_768.0;

/// PCM bytes plus the MIME-like tag describing them.
///
/// Immutable once built; the transport only ever reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedChunk {
    mime_type: String,
    data: Vec<u8>,
}

impl EncodedChunk {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sample rate declared by the tag, if any.
    pub fn sample_rate(&self) -> Option<u32> {
        sample_rate_of(&self.mime_type)
    }
}

/// Encode one frame of samples as 16 kHz PCM.
pub fn encode_frame(samples: &[f32]) -> EncodedChunk {
    EncodedChunk::new(OUTBOUND_MIME, encode_pcm16(samples))
}

/// Encode samples and tag them with an arbitrary sample rate.
pub fn encode_frame_at(samples: &[f32], sample_rate: u32) -> EncodedChunk {
    EncodedChunk::new(format!("audio/pcm;rate={sample_rate}"), encode_pcm16(samples))
}

fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        out.extend_from_slice(&quantize(sample).to_le_bytes());
    }
    out
}

/// Scale, truncate and saturate one sample. NaN maps to silence.
fn quantize(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    let scaled = (sample * PCM_SCALE).trunc();
    scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Decode interleaved 16-bit PCM into one `Vec<f32>` per channel.
///
/// # Errors
/// `CallError::MalformedAudio` when `channels` is zero or the byte length is
/// not a whole number of frames (`2 * channels` bytes each).
pub fn decode_chunk(bytes: &[u8], sample_rate: u32, channels: u16) -> Result<AudioBuffer> {
    if channels == 0 {
        return Err(CallError::MalformedAudio("channel count is zero".into()));
    }
    let ch = channels as usize;
    let frame_bytes = 2 * ch;
    if bytes.len() % frame_bytes != 0 {
        return Err(CallError::MalformedAudio(format!(
            "{} bytes is not a multiple of {} ({} channel(s) × 16-bit)",
            bytes.len(),
            frame_bytes,
            channels
        )));
    }

    let frames = bytes.len() / frame_bytes;
    let mut data = vec![Vec::with_capacity(frames); ch];
    for frame in bytes.chunks_exact(frame_bytes) {
        for (c, pair) in frame.chunks_exact(2).enumerate() {
            let value = i16::from_le_bytes([pair[0], pair[1]]);
            data[c].push(value as f32 / PCM_SCALE);
        }
    }

    Ok(AudioBuffer::new(data, sample_rate))
}

/// Parse the `rate=` parameter of a tag like `audio/pcm;rate=24000`.
pub fn sample_rate_of(mime_type: &str) -> Option<u32> {
    mime_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("rate"))
        .and_then(|(_, value)| value.trim().parse().ok())
}
