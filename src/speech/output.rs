//! Speech output collaborator trait.

use crate::error::Result;
use async_trait::async_trait;

/// Speech synthesis collaborator.
///
/// `speak` resolves when playback of the given text has completed. The
/// output queue guarantees exactly one outstanding call at a time.
#[async_trait]
pub trait SpeechOutput: Send {
    /// Speak one text segment to completion.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VoiceError::Playback`] if synthesis or playback
    /// fails. The queue logs the error and moves on to the next segment.
    async fn speak(&mut self, text: &str, voice: &str) -> Result<()>;

    /// Stop any in-flight playback immediately. Idempotent.
    async fn cancel(&mut self);
}
