//! End-to-end turn lifecycle tests with scripted collaborators.
//!
//! No audio and no network: speech input is a scripted event feed, speech
//! output records what it is asked to say, and the model replays canned
//! deltas. The paused tokio clock drives the cooldown and silence timers
//! deterministically.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use async_trait::async_trait;
use colloquy::config::SessionConfig;
use colloquy::error::{Result, VoiceError};
use colloquy::llm::{ChatMessage, ModelStream};
use colloquy::session::SessionCoordinator;
use colloquy::speech::{InputEvent, SpeechInput, SpeechOutput, TranscriptEvent};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Semaphore, mpsc};

/// Shared ordered log of collaborator activity ("start", "stop", "speak:...").
type ActivityLog = Arc<Mutex<Vec<String>>>;

fn log_of(log: &ActivityLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

// ────────────────────────────────────────────────────────────────────────────
// Scripted collaborators
// ────────────────────────────────────────────────────────────────────────────

struct ScriptedInput {
    running: bool,
    event_rx: mpsc::UnboundedReceiver<InputEvent>,
    start_results: VecDeque<Result<()>>,
    starts: Arc<AtomicUsize>,
    log: ActivityLog,
}

impl ScriptedInput {
    fn new(log: ActivityLog) -> (Self, mpsc::UnboundedSender<InputEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (
            Self {
                running: false,
                event_rx,
                start_results: VecDeque::new(),
                starts: Arc::new(AtomicUsize::new(0)),
                log,
            },
            event_tx,
        )
    }

    fn with_start_results(mut self, results: Vec<Result<()>>) -> Self {
        self.start_results = results.into();
        self
    }

    fn start_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.starts)
    }
}

#[async_trait]
impl SpeechInput for ScriptedInput {
    async fn start(&mut self) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        match self.start_results.pop_front() {
            Some(Err(e)) => Err(e),
            _ => {
                self.running = true;
                self.log.lock().unwrap().push("start".to_owned());
                Ok(())
            }
        }
    }

    async fn stop(&mut self) {
        if self.running {
            self.running = false;
            self.log.lock().unwrap().push("stop".to_owned());
        }
    }

    fn set_language(&mut self, _tag: &str) {}

    async fn next_event(&mut self) -> Option<InputEvent> {
        if !self.running {
            return std::future::pending().await;
        }
        self.event_rx.recv().await
    }
}

struct RecordingOutput {
    log: ActivityLog,
    /// When set, each `speak` signals its text here and then waits on the
    /// gate, so tests control exactly when playback "finishes".
    speak_calls: Option<mpsc::UnboundedSender<String>>,
    gate: Option<Arc<Semaphore>>,
}

impl RecordingOutput {
    fn instant(log: ActivityLog) -> Self {
        Self {
            log,
            speak_calls: None,
            gate: None,
        }
    }

    fn gated(log: ActivityLog) -> (Self, mpsc::UnboundedReceiver<String>, Arc<Semaphore>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let gate = Arc::new(Semaphore::new(0));
        (
            Self {
                log,
                speak_calls: Some(tx),
                gate: Some(Arc::clone(&gate)),
            },
            rx,
            gate,
        )
    }
}

#[async_trait]
impl SpeechOutput for RecordingOutput {
    async fn speak(&mut self, text: &str, _voice: &str) -> Result<()> {
        self.log.lock().unwrap().push(format!("speak:{text}"));
        if let Some(calls) = &self.speak_calls {
            let _ = calls.send(text.to_owned());
        }
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        Ok(())
    }

    async fn cancel(&mut self) {}
}

struct ScriptedModel {
    deltas: Vec<String>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    fn new(deltas: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            deltas: deltas.iter().map(|s| (*s).to_owned()).collect(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ModelStream for ScriptedModel {
    async fn stream_reply(
        &self,
        _history: &[ChatMessage],
        delta_tx: mpsc::Sender<String>,
    ) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for delta in &self.deltas {
            if delta_tx.send(delta.clone()).await.is_err() {
                return Ok(());
            }
        }
        Ok(())
    }
}

fn final_transcript(text: &str) -> InputEvent {
    InputEvent::Transcript(TranscriptEvent {
        text: text.to_owned(),
        is_final: true,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Lifecycle
// ────────────────────────────────────────────────────────────────────────────

/// One full turn: transcript in, sentences spoken in order while input is
/// paused, listening resumes after cooldown, silence timeout ends the
/// session.
#[tokio::test(start_paused = true)]
async fn full_turn_then_silence_timeout() {
    let log: ActivityLog = Arc::default();
    let (input, events) = ScriptedInput::new(Arc::clone(&log));
    let output = RecordingOutput::instant(Arc::clone(&log));
    let model = ScriptedModel::new(&["Hello there. ", "How lovely."]);

    let coordinator = SessionCoordinator::new(
        SessionConfig::default(),
        Box::new(input),
        Box::new(output),
        model,
    );

    events.send(final_transcript("what's new today")).unwrap();
    coordinator.run().await.unwrap();

    let log = log_of(&log);
    assert_eq!(
        log,
        vec![
            "start",              // session start: listening
            "stop",               // transcript accepted: input paused
            "speak:Hello there.", // sentences in production order
            "speak:How lovely.",
            "start",              // cooldown over: listening again
            "stop",               // silence timeout: session stops
        ]
    );
}

/// Speech input is never active between transcript acceptance and the end
/// of cooldown — the echo-prevention invariant.
#[tokio::test(start_paused = true)]
async fn input_paused_while_speaking_and_cooling_down() {
    let log: ActivityLog = Arc::default();
    let (input, events) = ScriptedInput::new(Arc::clone(&log));
    let output = RecordingOutput::instant(Arc::clone(&log));
    let model = ScriptedModel::new(&["One. Two. Three."]);

    let coordinator = SessionCoordinator::new(
        SessionConfig::default(),
        Box::new(input),
        Box::new(output),
        model,
    );

    events.send(final_transcript("count for me")).unwrap();
    coordinator.run().await.unwrap();

    let log = log_of(&log);
    let pause = log.iter().position(|e| e == "stop").unwrap();
    let resume = log.iter().rposition(|e| e == "start").unwrap();
    for (i, entry) in log.iter().enumerate() {
        if entry.starts_with("speak:") {
            assert!(pause < i && i < resume, "spoke at {i} outside pause window: {log:?}");
        }
    }
}

/// Reasoning spans never reach playback, even split across deltas.
#[tokio::test(start_paused = true)]
async fn think_spans_are_not_spoken() {
    let log: ActivityLog = Arc::default();
    let (input, events) = ScriptedInput::new(Arc::clone(&log));
    let output = RecordingOutput::instant(Arc::clone(&log));
    let model = ScriptedModel::new(&["<thi", "nk>secret plan</think>Sure thing. ", "Done"]);

    let coordinator = SessionCoordinator::new(
        SessionConfig::default(),
        Box::new(input),
        Box::new(output),
        model,
    );

    events.send(final_transcript("make a plan")).unwrap();
    coordinator.run().await.unwrap();

    let spoken: Vec<String> = log_of(&log)
        .into_iter()
        .filter(|e| e.starts_with("speak:"))
        .collect();
    assert_eq!(spoken, vec!["speak:Sure thing.", "speak:Done"]);
}

/// A consecutive duplicate transcript is dropped by the feedback guard:
/// the model is only consulted once.
#[tokio::test(start_paused = true)]
async fn duplicate_transcript_is_dropped() {
    let log: ActivityLog = Arc::default();
    let (input, events) = ScriptedInput::new(Arc::clone(&log));
    let output = RecordingOutput::instant(Arc::clone(&log));
    let model = ScriptedModel::new(&["Hi."]);
    let model_probe = Arc::clone(&model);

    let coordinator = SessionCoordinator::new(
        SessionConfig::default(),
        Box::new(input),
        Box::new(output),
        model,
    );

    events.send(final_transcript("hello")).unwrap();
    events.send(final_transcript("hello")).unwrap();
    coordinator.run().await.unwrap();

    assert_eq!(model_probe.calls.load(Ordering::SeqCst), 1);
}

// ────────────────────────────────────────────────────────────────────────────
// Input restart policy
// ────────────────────────────────────────────────────────────────────────────

/// Three consecutive start failures exhaust the restart budget: the
/// initial attempt plus exactly three retries, then the failure surfaces.
#[tokio::test(start_paused = true)]
async fn input_start_retries_are_bounded() {
    let log: ActivityLog = Arc::default();
    let (input, _events) = ScriptedInput::new(Arc::clone(&log));
    let input = input.with_start_results(vec![
        Err(VoiceError::Input("no mic".to_owned())),
        Err(VoiceError::Input("no mic".to_owned())),
        Err(VoiceError::Input("no mic".to_owned())),
        Err(VoiceError::Input("no mic".to_owned())),
        Err(VoiceError::Input("no mic".to_owned())),
    ]);
    let starts = input.start_counter();
    let output = RecordingOutput::instant(Arc::clone(&log));
    let model = ScriptedModel::new(&[]);

    let coordinator = SessionCoordinator::new(
        SessionConfig::default(),
        Box::new(input),
        Box::new(output),
        model,
    );

    let result = coordinator.run().await;
    assert!(matches!(result, Err(VoiceError::Input(_))));
    assert_eq!(starts.load(Ordering::SeqCst), 4, "initial start + 3 retries");
}

/// An unsupported capability is fatal immediately, with no retries.
#[tokio::test(start_paused = true)]
async fn unsupported_capability_is_fatal() {
    let log: ActivityLog = Arc::default();
    let (input, _events) = ScriptedInput::new(Arc::clone(&log));
    let input = input.with_start_results(vec![Err(VoiceError::CapabilityUnsupported(
        "no recognizer".to_owned(),
    ))]);
    let starts = input.start_counter();
    let output = RecordingOutput::instant(Arc::clone(&log));
    let model = ScriptedModel::new(&[]);

    let coordinator = SessionCoordinator::new(
        SessionConfig::default(),
        Box::new(input),
        Box::new(output),
        model,
    );

    let result = coordinator.run().await;
    assert!(matches!(result, Err(VoiceError::CapabilityUnsupported(_))));
    assert_eq!(starts.load(Ordering::SeqCst), 1);
}

// ────────────────────────────────────────────────────────────────────────────
// Stop semantics
// ────────────────────────────────────────────────────────────────────────────

/// `stop(keep_output_queue = true)` lets already-queued speech play out.
#[tokio::test(start_paused = true)]
async fn stop_keeping_queue_plays_out_backlog() {
    let log: ActivityLog = Arc::default();
    let (input, events) = ScriptedInput::new(Arc::clone(&log));
    let (output, mut speak_calls, gate) = RecordingOutput::gated(Arc::clone(&log));
    let model = ScriptedModel::new(&["First one. Second one."]);

    let coordinator = SessionCoordinator::new(
        SessionConfig::default(),
        Box::new(input),
        Box::new(output),
        model,
    );
    let handle = coordinator.handle();
    let session = tokio::spawn(coordinator.run());

    events.send(final_transcript("say two things")).unwrap();
    assert_eq!(speak_calls.recv().await.unwrap(), "First one.");
    gate.add_permits(1);
    assert_eq!(speak_calls.recv().await.unwrap(), "Second one.");

    // Stop with the second segment still in flight; it must play out.
    handle.stop(true);
    gate.add_permits(1);
    session.await.unwrap().unwrap();

    let spoken: Vec<String> = log_of(&log)
        .into_iter()
        .filter(|e| e.starts_with("speak:"))
        .collect();
    assert_eq!(spoken, vec!["speak:First one.", "speak:Second one."]);
}

/// A plain stop flushes the queue: nothing after the in-flight segment is
/// spoken.
#[tokio::test(start_paused = true)]
async fn stop_flushes_pending_segments() {
    let log: ActivityLog = Arc::default();
    let (input, events) = ScriptedInput::new(Arc::clone(&log));
    let (output, mut speak_calls, _gate) = RecordingOutput::gated(Arc::clone(&log));
    let model = ScriptedModel::new(&["First one. Second one."]);

    let coordinator = SessionCoordinator::new(
        SessionConfig::default(),
        Box::new(input),
        Box::new(output),
        model,
    );
    let handle = coordinator.handle();
    let session = tokio::spawn(coordinator.run());

    events.send(final_transcript("say two things")).unwrap();
    let first = speak_calls.recv().await.unwrap();
    assert_eq!(first, "First one.");

    handle.stop(false);
    session.await.unwrap().unwrap();

    let spoken: Vec<String> = log_of(&log)
        .into_iter()
        .filter(|e| e.starts_with("speak:"))
        .collect();
    assert_eq!(spoken, vec!["speak:First one."]);
}
