use thiserror::Error;

/// All errors produced by callbridge-core.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("microphone access denied: {0}")]
    PermissionDenied(String),

    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("playback queue full, chunk dropped")]
    PlaybackQueueFull,

    #[error("malformed audio: {0}")]
    MalformedAudio(String),

    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("a voice call is already active")]
    AlreadyActive,

    #[error("call was stopped before it finished opening")]
    Cancelled,

    #[error("protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CallError {
    /// Whether this error ends the call it occurred in.
    ///
    /// `MalformedAudio` and `PlaybackQueueFull` only cost the offending
    /// chunk. `AlreadyActive` leaves the existing session alone.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            CallError::MalformedAudio(_) | CallError::PlaybackQueueFull | CallError::AlreadyActive
        )
    }
}

pub type Result<T> = std::result::Result<T, CallError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_audio_and_misuse_are_not_terminal() {
        assert!(!CallError::MalformedAudio("odd length".into()).is_terminal());
        assert!(!CallError::AlreadyActive.is_terminal());
        assert!(!CallError::PlaybackQueueFull.is_terminal());
        assert!(CallError::TransportFailure("reset".into()).is_terminal());
        assert!(CallError::PermissionDenied("denied".into()).is_terminal());
    }
}
