//! Message types passed between session tasks.

use crate::error::VoiceError;

/// A speakable text segment queued for playback.
#[derive(Debug, Clone)]
pub struct SpeechQueueEntry {
    /// Non-empty, whitespace-trimmed sentence text.
    pub text: String,
}

/// Events from the per-turn model-stream task to the coordinator.
#[derive(Debug)]
pub(crate) enum TurnEvent {
    /// One sentence was queued for playback.
    Sentence(String),
    /// The stream finished; `reply` is the full raw assistant text.
    Completed { reply: String },
    /// The stream failed at the transport level.
    Failed(VoiceError),
}

/// Events from the speech output queue to the coordinator.
#[derive(Debug, Clone, Copy)]
pub(crate) enum QueueEvent {
    /// One segment finished playing (successfully or not).
    SegmentDone,
}

/// Commands to the speech output queue.
#[derive(Debug, Clone, Copy)]
pub(crate) enum QueueCommand {
    /// Drop all pending entries and interrupt the in-flight segment.
    CancelAll,
}

/// Commands accepted by a running session.
#[derive(Debug, Clone, Copy)]
pub enum SessionCommand {
    /// Stop the session. With `keep_output_queue`, already-queued speech
    /// still plays out (used when swapping voices/collaborators).
    Stop {
        /// Whether queued playback survives the stop.
        keep_output_queue: bool,
    },
}
