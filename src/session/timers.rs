//! Silence timeout and debounce deadlines.
//!
//! Two timers bound how long the session waits for user speech:
//!
//! - **Silence timeout** (default 30 s): armed on every entry into
//!   `Listening`. If it fires, the user is presumed gone and the session
//!   stops.
//! - **Debounce** (default 1 s): every substantial interim transcript
//!   re-arms it; only when the debounce itself fires is the silence
//!   timeout restarted. This keeps partial fragments from resetting the
//!   30 s window on every keystroke of recognition.
//!
//! Deadlines are plain `Option<Instant>` values; the coordinator turns
//! them into `sleep_until` futures (absent deadlines park forever).

use crate::config::TurnConfig;
use std::time::Duration;
use tokio::time::Instant;

/// Deadline state for one session.
#[derive(Debug)]
pub struct TurnTimers {
    silence_timeout: Duration,
    debounce: Duration,
    min_interim_len: usize,
    silence_deadline: Option<Instant>,
    debounce_deadline: Option<Instant>,
}

impl TurnTimers {
    /// Build timers from config.
    pub fn new(config: &TurnConfig) -> Self {
        Self {
            silence_timeout: Duration::from_millis(config.silence_timeout_ms),
            debounce: Duration::from_millis(config.debounce_ms),
            min_interim_len: config.min_interim_len,
            silence_deadline: None,
            debounce_deadline: None,
        }
    }

    /// (Re)arm the silence timeout. Called once per `Listening` entry and
    /// whenever the debounce fires.
    pub fn arm_silence(&mut self) {
        self.silence_deadline = Some(Instant::now() + self.silence_timeout);
    }

    /// Record interim speech activity. Substantial fragments re-arm the
    /// debounce; short blips are ignored.
    pub fn note_interim(&mut self, transcript: &str) {
        if transcript.trim().chars().count() > self.min_interim_len {
            self.debounce_deadline = Some(Instant::now() + self.debounce);
        }
    }

    /// The debounce fired: speech activity has been stable long enough to
    /// count, so push the silence timeout out again.
    pub fn debounce_fired(&mut self) {
        self.debounce_deadline = None;
        self.arm_silence();
    }

    /// Cancel both timers. Called whenever `Listening` is left.
    pub fn clear(&mut self) {
        self.silence_deadline = None;
        self.debounce_deadline = None;
    }

    /// Current silence deadline, if armed.
    pub fn silence_deadline(&self) -> Option<Instant> {
        self.silence_deadline
    }

    /// Current debounce deadline, if armed.
    pub fn debounce_deadline(&self) -> Option<Instant> {
        self.debounce_deadline
    }
}
