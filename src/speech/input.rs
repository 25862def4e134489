//! Speech input collaborator trait and events.

use crate::error::Result;
use async_trait::async_trait;

/// A recognition result delivered by the speech input collaborator.
#[derive(Debug, Clone)]
pub struct TranscriptEvent {
    /// Recognized text.
    pub text: String,
    /// Whether this is a settled result. Interim results may still be
    /// revised and only feed the debounce timer.
    pub is_final: bool,
}

/// An event from the speech input collaborator.
#[derive(Debug, Clone)]
pub enum InputEvent {
    /// A recognition result (interim or final).
    Transcript(TranscriptEvent),
    /// The recognizer ended its session on its own. The coordinator
    /// restarts it if the conversation is still listening.
    Ended,
    /// A recoverable failure. Governed by the restart policy.
    Error(String),
}

/// Speech recognition collaborator.
///
/// Implementations deliver a sequence of [`InputEvent`]s between `start`
/// and `stop`. Exactly one consumer polls `next_event` at a time; after
/// `stop`, no further transcript events should be delivered until the next
/// `start`.
#[async_trait]
pub trait SpeechInput: Send {
    /// Start (or resume) recognition.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VoiceError::CapabilityUnsupported`] if recognition
    /// is unavailable on this host (fatal), or
    /// [`crate::VoiceError::Input`] for a transient start failure
    /// (retried with backoff).
    async fn start(&mut self) -> Result<()>;

    /// Stop recognition. Idempotent; a deliberate stop must not surface as
    /// an [`InputEvent::Error`].
    async fn stop(&mut self);

    /// Set the recognition language tag (e.g. `en-US`).
    fn set_language(&mut self, tag: &str);

    /// Wait for the next event. `None` means the collaborator is gone for
    /// good and will never deliver again.
    async fn next_event(&mut self) -> Option<InputEvent>;
}
