//! Speech input/output collaborator seams.
//!
//! Recognition and synthesis are external, imperfect, asynchronously
//! completing capabilities. The session only depends on the [`SpeechInput`]
//! and [`SpeechOutput`] traits; the `console` module provides headless
//! reference implementations for the demo binary.

pub mod console;
pub mod input;
pub mod output;

pub use console::{ConsoleInput, ConsoleOutput};
pub use input::{InputEvent, SpeechInput, TranscriptEvent};
pub use output::SpeechOutput;
