//! Session coordinator: owns the state machine and drives the turn
//! lifecycle end to end.
//!
//! One task owns all session state. Collaborators run behind channels (the
//! output queue stage, the per-turn model stream task); every deadline is an
//! `Option<Instant>` turned into a `sleep_until` future each iteration, with
//! absent deadlines parked on `std::future::pending()`. Each loop iteration
//! first resolves a single [`Wake`] reason, then handles it with full access
//! to the session state, so the lifecycle reads as a straight-line sequence
//! instead of nested callbacks.

use crate::config::SessionConfig;
use crate::error::{Result, VoiceError};
use crate::llm::{ChatMessage, ChatRole, ModelStream, trim_history};
use crate::session::guard::{EchoPhrasePolicy, FeedbackGuard, GuardVerdict};
use crate::session::messages::{
    QueueCommand, QueueEvent, SessionCommand, SpeechQueueEntry, TurnEvent,
};
use crate::session::queue::run_output_queue;
use crate::session::retry::RestartPolicy;
use crate::session::segmenter::SentenceSegmenter;
use crate::session::state::{ConversationState, StateMachine};
use crate::session::think::ThinkBlockFilter;
use crate::session::timers::TurnTimers;
use crate::speech::input::{InputEvent, SpeechInput};
use crate::speech::output::SpeechOutput;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Buffer size for raw model deltas between the stream and the turn task.
const DELTA_CHANNEL_SIZE: usize = 64;

/// Control handle for a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::UnboundedSender<SessionCommand>,
    cancel: CancellationToken,
}

impl SessionHandle {
    /// Stop the session gracefully. With `keep_output_queue`, speech that is
    /// already queued still plays out — used when swapping voices or
    /// collaborators without cutting the assistant off mid-reply.
    pub fn stop(&self, keep_output_queue: bool) {
        let _ = self.cmd_tx.send(SessionCommand::Stop { keep_output_queue });
    }

    /// Token that hard-cancels the session and all its stages.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Why the event loop woke up. Resolved by the select, handled afterwards.
enum Wake {
    Cancelled,
    Command(SessionCommand),
    Input(Option<InputEvent>),
    Turn(Option<TurnEvent>),
    Queue(QueueEvent),
    SilenceTimeout,
    DebounceFired,
    CooldownOver,
    RetryDue,
}

/// Orchestrates one conversation session.
///
/// Multi-session hosts instantiate one coordinator per session; there is no
/// shared global state.
pub struct SessionCoordinator {
    config: SessionConfig,
    input: Box<dyn SpeechInput>,
    output: Box<dyn SpeechOutput>,
    model: Arc<dyn ModelStream>,
    echo_policy: Option<Box<dyn EchoPhrasePolicy>>,
    cancel: CancellationToken,
    cmd_tx: mpsc::UnboundedSender<SessionCommand>,
    cmd_rx: mpsc::UnboundedReceiver<SessionCommand>,
}

impl SessionCoordinator {
    /// Create a coordinator from config and collaborators.
    pub fn new(
        config: SessionConfig,
        input: Box<dyn SpeechInput>,
        output: Box<dyn SpeechOutput>,
        model: Arc<dyn ModelStream>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        Self {
            config,
            input,
            output,
            model,
            echo_policy: None,
            cancel: CancellationToken::new(),
            cmd_tx,
            cmd_rx,
        }
    }

    /// Replace the default echo phrase policy of the feedback guard.
    pub fn with_echo_policy(mut self, policy: Box<dyn EchoPhrasePolicy>) -> Self {
        self.echo_policy = Some(policy);
        self
    }

    /// Control handle usable from other tasks.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            cmd_tx: self.cmd_tx.clone(),
            cancel: self.cancel.clone(),
        }
    }

    /// Run the session until it stops: explicit stop, silence timeout,
    /// cancellation, or a fatal input failure.
    ///
    /// # Errors
    ///
    /// Returns an error if speech input is unsupported on this host or its
    /// restart attempts are exhausted. All other conditions are handled in
    /// place and end with `Ok(())`.
    pub async fn run(mut self) -> Result<()> {
        let session_id = Uuid::new_v4();
        info!("session {session_id} starting (language: {})", self.config.input.language);

        let mut state = StateMachine::new();
        let mut timers = TurnTimers::new(&self.config.turn);
        let mut restart = RestartPolicy::new(&self.config.input);
        let mut guard = match self.echo_policy.take() {
            Some(policy) => FeedbackGuard::with_policy(&self.config.guard, policy),
            None => FeedbackGuard::new(&self.config.guard),
        };
        let cooldown = Duration::from_millis(self.config.turn.cooldown_ms);

        let mut history = vec![ChatMessage::new(
            ChatRole::System,
            self.config.model.system_message(&self.config.input.language),
        )];

        // Output queue stage.
        let (entry_tx, entry_rx) = mpsc::unbounded_channel::<SpeechQueueEntry>();
        let (queue_cmd_tx, queue_cmd_rx) = mpsc::unbounded_channel::<QueueCommand>();
        let (queue_event_tx, mut queue_event_rx) = mpsc::unbounded_channel::<QueueEvent>();
        let queue_handle = tokio::spawn(run_output_queue(
            self.output,
            self.config.output.voice.clone(),
            entry_rx,
            queue_cmd_rx,
            queue_event_tx,
            self.cancel.clone(),
        ));

        let mut input = self.input;
        input.set_language(&self.config.input.language);
        // Holding a sender keeps the command channel open even if every
        // handle is dropped.
        let _cmd_tx = self.cmd_tx;
        let mut cmd_rx = self.cmd_rx;
        let model = self.model;
        let cancel = self.cancel;

        // Per-turn bookkeeping. `turn_rx` doubles as the "turn in flight"
        // latch; `pending_segments`/`stream_done` decide when speaking is
        // really over.
        let mut turn_rx: Option<mpsc::UnboundedReceiver<TurnEvent>> = None;
        let mut turn_handle: Option<tokio::task::JoinHandle<()>> = None;
        let mut pending_segments: usize = 0;
        let mut stream_done = false;
        let mut cooldown_deadline: Option<Instant> = None;
        let mut retry_deadline: Option<Instant> = None;
        let mut input_alive = true;
        let mut keep_queue = false;

        // Enter Listening.
        state.request(ConversationState::Listening);
        timers.arm_silence();
        let started = try_start_input(
            input.as_mut(),
            &mut restart,
            &mut retry_deadline,
            self.config.input.max_restart_attempts,
        )
        .await;

        let outcome: Result<()> = if let Err(e) = started {
            Err(e)
        } else {
            loop {
                let wake = {
                    let silence_at = timers.silence_deadline();
                    let debounce_at = timers.debounce_deadline();
                    tokio::select! {
                        () = cancel.cancelled() => Wake::Cancelled,
                        Some(cmd) = cmd_rx.recv() => Wake::Command(cmd),
                        ev = input.next_event(), if input_alive => Wake::Input(ev),
                        ev = recv_turn_event(turn_rx.as_mut()) => Wake::Turn(ev),
                        Some(ev) = queue_event_rx.recv() => Wake::Queue(ev),
                        () = sleep_until_opt(silence_at) => Wake::SilenceTimeout,
                        () = sleep_until_opt(debounce_at) => Wake::DebounceFired,
                        () = sleep_until_opt(cooldown_deadline) => Wake::CooldownOver,
                        () = sleep_until_opt(retry_deadline) => Wake::RetryDue,
                    }
                };

                match wake {
                    Wake::Cancelled => {
                        info!("session {session_id} cancelled");
                        break Ok(());
                    }

                    Wake::Command(SessionCommand::Stop { keep_output_queue }) => {
                        info!("session {session_id} stop requested (keep queue: {keep_output_queue})");
                        keep_queue = keep_output_queue;
                        break Ok(());
                    }

                    Wake::Input(None) => {
                        warn!("speech input collaborator is gone");
                        input_alive = false;
                        // Nothing more will be recognized; the silence
                        // timeout ends the session if it stays Listening.
                    }

                    Wake::Input(Some(InputEvent::Transcript(t))) => {
                        if !t.is_final {
                            if state.current() == ConversationState::Listening {
                                timers.note_interim(&t.text);
                            }
                            continue;
                        }

                        let busy = state.current() != ConversationState::Listening
                            || turn_rx.is_some();
                        if guard.evaluate(&t.text, busy) != GuardVerdict::Accepted {
                            continue;
                        }

                        let transcript = t.text.trim().to_owned();
                        info!("user: {transcript}");

                        // Leaving Listening: timers off, input paused before
                        // any reply audio can exist.
                        timers.clear();
                        state.request(ConversationState::Processing);
                        input.stop().await;

                        history.push(ChatMessage::new(ChatRole::User, transcript));
                        trim_history(&mut history, self.config.model.max_history_messages);

                        let (turn_tx, rx) = mpsc::unbounded_channel();
                        turn_rx = Some(rx);
                        pending_segments = 0;
                        stream_done = false;
                        turn_handle = Some(tokio::spawn(run_turn(
                            Arc::clone(&model),
                            history.clone(),
                            turn_tx,
                        )));
                    }

                    Wake::Input(Some(InputEvent::Ended)) => {
                        if state.current() == ConversationState::Listening {
                            debug!("speech input ended, restarting");
                            if let Err(e) = try_start_input(
                                input.as_mut(),
                                &mut restart,
                                &mut retry_deadline,
                                self.config.input.max_restart_attempts,
                            )
                            .await
                            {
                                break Err(e);
                            }
                        }
                    }

                    Wake::Input(Some(InputEvent::Error(reason))) => {
                        if state.current() == ConversationState::Listening {
                            warn!("speech input error: {reason}");
                            match restart.next_attempt() {
                                Some(backoff) => {
                                    retry_deadline = Some(Instant::now() + backoff);
                                }
                                None => {
                                    error!("speech input restart attempts exhausted");
                                    break Err(VoiceError::Input(format!(
                                        "restart attempts exhausted after: {reason}"
                                    )));
                                }
                            }
                        } else {
                            debug!("ignoring input error while not listening: {reason}");
                        }
                    }

                    Wake::Turn(Some(TurnEvent::Sentence(text))) => {
                        if state.current() == ConversationState::Processing {
                            state.request(ConversationState::Speaking);
                        }
                        if state.current() == ConversationState::Speaking {
                            let _ = entry_tx.send(SpeechQueueEntry { text });
                            pending_segments += 1;
                        } else {
                            warn!("dropping sentence outside speaking turn: {text:?}");
                        }
                    }

                    Wake::Turn(Some(TurnEvent::Completed { reply })) => {
                        let reply = reply.trim();
                        if !reply.is_empty() {
                            history.push(ChatMessage::new(ChatRole::Assistant, reply));
                            trim_history(&mut history, self.config.model.max_history_messages);
                        }
                        debug!("model stream complete ({pending_segments} segments pending)");
                        turn_rx = None;
                        turn_handle = None;
                        stream_done = true;
                        finish_speaking_if_drained(
                            &mut state,
                            stream_done,
                            pending_segments,
                            &mut cooldown_deadline,
                            cooldown,
                        );
                    }

                    Wake::Turn(Some(TurnEvent::Failed(e))) => {
                        // The turn is over either way; recover along legal
                        // transitions so listening resumes after cooldown.
                        error!("model stream failed: {e}");
                        turn_rx = None;
                        turn_handle = None;
                        stream_done = true;
                        finish_speaking_if_drained(
                            &mut state,
                            stream_done,
                            pending_segments,
                            &mut cooldown_deadline,
                            cooldown,
                        );
                    }

                    Wake::Turn(None) => {
                        // Turn task died without a final event.
                        warn!("turn task ended unexpectedly");
                        turn_rx = None;
                        turn_handle = None;
                        stream_done = true;
                        finish_speaking_if_drained(
                            &mut state,
                            stream_done,
                            pending_segments,
                            &mut cooldown_deadline,
                            cooldown,
                        );
                    }

                    Wake::Queue(QueueEvent::SegmentDone) => {
                        pending_segments = pending_segments.saturating_sub(1);
                        finish_speaking_if_drained(
                            &mut state,
                            stream_done,
                            pending_segments,
                            &mut cooldown_deadline,
                            cooldown,
                        );
                    }

                    Wake::SilenceTimeout => {
                        info!("no speech activity, stopping session {session_id}");
                        break Ok(());
                    }

                    Wake::DebounceFired => {
                        debug!("speech activity stable, re-arming silence timeout");
                        timers.debounce_fired();
                    }

                    Wake::CooldownOver => {
                        cooldown_deadline = None;
                        if state.current() == ConversationState::Cooldown {
                            state.request(ConversationState::Listening);
                            timers.arm_silence();
                            if let Err(e) = try_start_input(
                                input.as_mut(),
                                &mut restart,
                                &mut retry_deadline,
                                self.config.input.max_restart_attempts,
                            )
                            .await
                            {
                                break Err(e);
                            }
                        }
                    }

                    Wake::RetryDue => {
                        retry_deadline = None;
                        if state.current() == ConversationState::Listening {
                            if let Err(e) = try_start_input(
                                input.as_mut(),
                                &mut restart,
                                &mut retry_deadline,
                                self.config.input.max_restart_attempts,
                            )
                            .await
                            {
                                break Err(e);
                            }
                        }
                    }
                }
            }
        };

        // Teardown: every stop path releases everything. Queued speech
        // survives only an explicit keep-queue stop.
        timers.clear();
        if let Some(handle) = turn_handle.take() {
            handle.abort();
        }
        drop(turn_rx);
        input.stop().await;
        if state.current() != ConversationState::Idle {
            state.request(ConversationState::Idle);
        }
        if !keep_queue {
            let _ = queue_cmd_tx.send(QueueCommand::CancelAll);
        }
        drop(entry_tx);
        drop(queue_cmd_tx);
        let _ = queue_handle.await;

        match &outcome {
            Ok(()) => info!("session {session_id} stopped"),
            Err(e) => error!("session {session_id} stopped: {e}"),
        }
        outcome
    }
}

/// Start (or restart) the speech input collaborator.
///
/// A transient failure schedules a retry and returns `Ok`; an unsupported
/// capability or an exhausted restart budget is fatal.
async fn try_start_input(
    input: &mut dyn SpeechInput,
    restart: &mut RestartPolicy,
    retry_deadline: &mut Option<Instant>,
    max_attempts: u32,
) -> Result<()> {
    match input.start().await {
        Ok(()) => {
            restart.reset();
            Ok(())
        }
        Err(e @ VoiceError::CapabilityUnsupported(_)) => Err(e),
        Err(e) => match restart.next_attempt() {
            Some(backoff) => {
                warn!(
                    "speech input start failed (attempt {}/{max_attempts}), retrying in {backoff:?}: {e}",
                    restart.attempts(),
                );
                *retry_deadline = Some(Instant::now() + backoff);
                Ok(())
            }
            None => {
                error!("speech input restart attempts exhausted: {e}");
                Err(VoiceError::Input(format!(
                    "restart attempts exhausted: {e}"
                )))
            }
        },
    }
}

/// `Speaking -> Cooldown` happens only when the model stream has completed
/// AND every queued segment has played. A turn with no speakable output
/// still passes through `Speaking` so every edge stays legal.
fn finish_speaking_if_drained(
    state: &mut StateMachine,
    stream_done: bool,
    pending_segments: usize,
    cooldown_deadline: &mut Option<Instant>,
    cooldown: Duration,
) {
    if !stream_done || pending_segments > 0 {
        return;
    }
    if state.current() == ConversationState::Processing {
        state.request(ConversationState::Speaking);
    }
    if state.current() == ConversationState::Speaking {
        state.request(ConversationState::Cooldown);
        *cooldown_deadline = Some(Instant::now() + cooldown);
        debug!("speech drained, cooling down for {cooldown:?}");
    }
}

/// Stream one model reply: deltas through the think filter and segmenter,
/// sentences out to the coordinator as they complete.
async fn run_turn(
    model: Arc<dyn ModelStream>,
    history: Vec<ChatMessage>,
    events: mpsc::UnboundedSender<TurnEvent>,
) {
    let (delta_tx, mut delta_rx) = mpsc::channel::<String>(DELTA_CHANNEL_SIZE);
    let stream_handle =
        tokio::spawn(async move { model.stream_reply(&history, delta_tx).await });

    let mut filter = ThinkBlockFilter::new();
    let mut segmenter = SentenceSegmenter::new();
    let mut raw_reply = String::new();

    while let Some(delta) = delta_rx.recv().await {
        raw_reply.push_str(&delta);
        let safe = filter.push(&delta);
        for sentence in segmenter.push(&safe) {
            if events.send(TurnEvent::Sentence(sentence)).is_err() {
                // Coordinator is gone; the stream task notices once its
                // delta channel closes.
                return;
            }
        }
    }

    let stream_result = match stream_handle.await {
        Ok(result) => result,
        Err(e) => Err(VoiceError::Stream(format!("stream task panicked: {e}"))),
    };

    match stream_result {
        Ok(()) => {
            // Flush the withheld tail and the unterminated last sentence.
            let tail = filter.finish();
            let mut flushed = segmenter.push(&tail);
            if let Some(rest) = segmenter.finish() {
                flushed.push(rest);
            }
            for sentence in flushed {
                if events.send(TurnEvent::Sentence(sentence)).is_err() {
                    return;
                }
            }
            let _ = events.send(TurnEvent::Completed { reply: raw_reply });
        }
        Err(e) => {
            let _ = events.send(TurnEvent::Failed(e));
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn recv_turn_event(
    rx: Option<&mut mpsc::UnboundedReceiver<TurnEvent>>,
) -> Option<TurnEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
