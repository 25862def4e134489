//! Console collaborators for headless use.
//!
//! `ConsoleInput` turns stdin lines into final transcripts; `ConsoleOutput`
//! prints segments and paces itself to simulate playback time. Together they
//! let the whole turn lifecycle run without any audio device.

use crate::error::Result;
use crate::speech::input::{InputEvent, SpeechInput, TranscriptEvent};
use crate::speech::output::SpeechOutput;
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing::debug;

/// Speech input backed by stdin. Each line is one final transcript.
pub struct ConsoleInput {
    running: bool,
    language: String,
    line_rx: mpsc::UnboundedReceiver<String>,
}

impl ConsoleInput {
    /// Spawn the stdin reader and return the collaborator.
    pub fn new() -> Self {
        let (line_tx, line_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line_tx.send(line).is_err() {
                    break;
                }
            }
            // EOF: dropping the sender ends the input collaborator.
        });
        Self {
            running: false,
            language: String::new(),
            line_rx,
        }
    }
}

impl Default for ConsoleInput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechInput for ConsoleInput {
    async fn start(&mut self) -> Result<()> {
        self.running = true;
        debug!("console input listening (language: {})", self.language);
        Ok(())
    }

    async fn stop(&mut self) {
        self.running = false;
    }

    fn set_language(&mut self, tag: &str) {
        self.language = tag.to_owned();
    }

    async fn next_event(&mut self) -> Option<InputEvent> {
        if !self.running {
            // Lines typed while paused stay buffered until the session
            // resumes listening.
            return std::future::pending().await;
        }
        let line = self.line_rx.recv().await?;
        Some(InputEvent::Transcript(TranscriptEvent {
            text: line,
            is_final: true,
        }))
    }
}

/// Speech output that prints segments and sleeps for a per-character pace.
pub struct ConsoleOutput {
    /// Simulated playback time per character.
    pace: Duration,
}

impl ConsoleOutput {
    /// Create a console output with the given per-character pace.
    pub fn new(pace: Duration) -> Self {
        Self { pace }
    }
}

impl Default for ConsoleOutput {
    fn default() -> Self {
        Self::new(Duration::from_millis(25))
    }
}

#[async_trait]
impl SpeechOutput for ConsoleOutput {
    async fn speak(&mut self, text: &str, _voice: &str) -> Result<()> {
        println!("[assistant] {text}");
        tokio::time::sleep(self.pace * text.chars().count() as u32).await;
        Ok(())
    }

    async fn cancel(&mut self) {
        // Nothing persistent to tear down; the queue drops the in-flight
        // `speak` future on cancellation.
    }
}
