//! Feedback guard: keeps the assistant from talking to itself.
//!
//! Finalized transcripts pass through here before a turn starts. The guard
//! drops input that is too short, a duplicate of the previous turn, likely
//! the system's own voice leaking back through the microphone, or arriving
//! while a turn is already in flight.

use crate::config::GuardConfig;
use tracing::debug;

/// Why a transcript was rejected, or that it was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardVerdict {
    /// Transcript accepted; a turn should start.
    Accepted,
    /// Shorter than the configured minimum.
    TooShort,
    /// Case-insensitive repeat of the previous accepted transcript.
    Duplicate,
    /// Matches the echo phrase policy — probably the assistant's own voice.
    ProbableEcho,
    /// A turn is already being processed.
    Busy,
}

/// Policy deciding whether a transcript sounds like the assistant itself.
///
/// The phrase heuristic is fragile and language-specific, so it is a
/// replaceable seam rather than a hard-coded constant. Implementations
/// should prefer false negatives over false positives.
pub trait EchoPhrasePolicy: Send {
    /// `transcript` is already lowercased.
    fn is_probable_echo(&self, transcript: &str) -> bool;
}

/// Default policy: substring match against a fixed lowercase phrase list.
#[derive(Debug, Clone)]
pub struct PhraseListPolicy {
    phrases: Vec<String>,
}

impl PhraseListPolicy {
    /// Build from a phrase list; phrases are lowercased.
    pub fn new(phrases: impl IntoIterator<Item = String>) -> Self {
        Self {
            phrases: phrases.into_iter().map(|p| p.to_lowercase()).collect(),
        }
    }
}

impl Default for PhraseListPolicy {
    fn default() -> Self {
        Self::new(GuardConfig::default_echo_phrases())
    }
}

impl EchoPhrasePolicy for PhraseListPolicy {
    fn is_probable_echo(&self, transcript: &str) -> bool {
        self.phrases.iter().any(|p| transcript.contains(p.as_str()))
    }
}

/// Stateful transcript filter for one session.
pub struct FeedbackGuard {
    min_len: usize,
    policy: Box<dyn EchoPhrasePolicy>,
    last_accepted: Option<String>,
}

impl FeedbackGuard {
    /// Build a guard from config with the default phrase policy.
    pub fn new(config: &GuardConfig) -> Self {
        Self::with_policy(
            config,
            Box::new(PhraseListPolicy::new(config.echo_phrases.clone())),
        )
    }

    /// Build a guard with a custom echo policy.
    pub fn with_policy(config: &GuardConfig, policy: Box<dyn EchoPhrasePolicy>) -> Self {
        Self {
            min_len: config.min_transcript_len,
            policy,
            last_accepted: None,
        }
    }

    /// Evaluate a finalized transcript. `busy` is the cooperative latch:
    /// true whenever the session is not listening or a turn is in flight.
    ///
    /// On acceptance the transcript is recorded for the duplicate check.
    pub fn evaluate(&mut self, transcript: &str, busy: bool) -> GuardVerdict {
        let transcript = transcript.trim();
        if transcript.chars().count() < self.min_len {
            debug!("guard: dropping too-short transcript {transcript:?}");
            return GuardVerdict::TooShort;
        }

        let lower = transcript.to_lowercase();
        if let Some(last) = &self.last_accepted
            && last.to_lowercase() == lower
        {
            debug!("guard: dropping duplicate transcript {transcript:?}");
            return GuardVerdict::Duplicate;
        }

        if self.policy.is_probable_echo(&lower) {
            debug!("guard: dropping probable echo {transcript:?}");
            return GuardVerdict::ProbableEcho;
        }

        if busy {
            debug!("guard: dropping transcript while busy {transcript:?}");
            return GuardVerdict::Busy;
        }

        self.last_accepted = Some(transcript.to_owned());
        GuardVerdict::Accepted
    }

    /// The most recent accepted transcript, if any.
    pub fn last_accepted(&self) -> Option<&str> {
        self.last_accepted.as_deref()
    }
}
