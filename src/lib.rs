//! Colloquy: turn-taking coordinator for spoken AI conversations.
//!
//! Coordinates one spoken conversational turn end to end:
//! user speech → transcript → streamed model reply → sentence playback →
//! cooldown → listening again, while suppressing feedback loops where the
//! system's own voice is re-captured as user input.
//!
//! # Architecture
//!
//! One orchestrator task per session owns all state; the external
//! capabilities hang off trait seams connected by async channels:
//! - **Speech input**: [`speech::SpeechInput`] delivers interim/final
//!   transcripts
//! - **Feedback guard**: rejects echoes, duplicates, and too-short input
//! - **Model stream**: [`llm::ModelStream`] yields incremental text deltas
//! - **Think filter + segmenter**: strip reasoning spans, cut speakable
//!   sentences
//! - **Speech output queue**: strictly sequential playback via
//!   [`speech::SpeechOutput`]

pub mod config;
pub mod error;
pub mod llm;
pub mod session;
pub mod speech;

pub use config::SessionConfig;
pub use error::{Result, VoiceError};
pub use llm::{ApiModelStream, ChatMessage, ChatRole, ModelStream};
pub use session::{ConversationState, SessionCoordinator, SessionHandle};
pub use speech::{InputEvent, SpeechInput, SpeechOutput, TranscriptEvent};
