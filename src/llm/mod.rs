//! Language model streaming.
//!
//! The session talks to the model through the [`ModelStream`] trait; the
//! [`api`] module implements it for any OpenAI-compatible chat completions
//! endpoint with SSE streaming.

pub mod api;
pub mod sse;

pub use api::ApiModelStream;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Message role in the conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// System prompt.
    System,
    /// User turn.
    User,
    /// Assistant reply.
    Assistant,
}

/// A single message in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Speaker role.
    pub role: ChatRole,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Construct a message.
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Streaming model collaborator.
///
/// `stream_reply` sends incremental text deltas on `delta_tx` as they
/// arrive and returns once the stream terminates. Dropping the receiver
/// is treated as cancellation, not an error.
#[async_trait]
pub trait ModelStream: Send + Sync {
    /// Request a streamed reply to the given history.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VoiceError::Stream`] on transport-level failure.
    /// Malformed individual records are skipped, never an error.
    async fn stream_reply(
        &self,
        history: &[ChatMessage],
        delta_tx: mpsc::Sender<String>,
    ) -> Result<()>;
}

/// Trim `history` to the system prompt plus at most `max` later messages.
///
/// A `max` of 0 disables trimming.
pub fn trim_history(history: &mut Vec<ChatMessage>, max: usize) {
    if max == 0 {
        return;
    }
    if history.len() > 1 + max {
        let drain_end = history.len().saturating_sub(max);
        if drain_end > 1 {
            history.drain(1..drain_end);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    fn history_of(n: usize) -> Vec<ChatMessage> {
        let mut h = vec![ChatMessage::new(ChatRole::System, "sys")];
        for i in 0..n {
            h.push(ChatMessage::new(ChatRole::User, format!("m{i}")));
        }
        h
    }

    #[test]
    fn trim_keeps_system_prompt() {
        let mut h = history_of(10);
        trim_history(&mut h, 4);
        assert_eq!(h.len(), 5);
        assert_eq!(h[0].role, ChatRole::System);
        assert_eq!(h[1].content, "m6");
        assert_eq!(h[4].content, "m9");
    }

    #[test]
    fn trim_zero_disables() {
        let mut h = history_of(10);
        trim_history(&mut h, 0);
        assert_eq!(h.len(), 11);
    }

    #[test]
    fn trim_short_history_untouched() {
        let mut h = history_of(3);
        trim_history(&mut h, 4);
        assert_eq!(h.len(), 4);
    }

    #[test]
    fn roles_serialize_lowercase() {
        let msg = ChatMessage::new(ChatRole::Assistant, "hi");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }
}
