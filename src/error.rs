//! Error types for the conversation session.

/// Top-level error type for the turn-taking coordinator.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    /// Speech recognition is not available on this host. Fatal: the session
    /// cannot start and there is no point retrying.
    #[error("speech input unsupported: {0}")]
    CapabilityUnsupported(String),

    /// Speech input failed to start or aborted unexpectedly.
    #[error("speech input error: {0}")]
    Input(String),

    /// Model stream transport error (connection, HTTP status).
    #[error("model stream error: {0}")]
    Stream(String),

    /// Speech synthesis / playback error.
    #[error("playback error: {0}")]
    Playback(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, VoiceError>;
