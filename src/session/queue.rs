//! Speech output queue stage.
//!
//! Owns the [`SpeechOutput`] collaborator and plays queued segments
//! strictly one at a time, in arrival order. Playback failures are local:
//! the failed segment is logged and the queue moves on. A `CancelAll`
//! command interrupts the in-flight segment and drops everything pending.
//!
//! The stage exits when the entry channel closes and the backlog is
//! played out — which is what lets `stop(keep_output_queue = true)` swap
//! collaborators without cutting off speech already under way.

use crate::session::messages::{QueueCommand, QueueEvent, SpeechQueueEntry};
use crate::speech::output::SpeechOutput;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// What woke the stage while idle.
enum Wake {
    Shutdown,
    Cancel,
    Entry(Option<SpeechQueueEntry>),
}

/// How an in-flight segment ended.
enum SpeakOutcome {
    Done(crate::error::Result<()>),
    Cancel,
    Shutdown,
}

pub(crate) async fn run_output_queue(
    mut output: Box<dyn SpeechOutput>,
    voice: String,
    mut entry_rx: mpsc::UnboundedReceiver<SpeechQueueEntry>,
    mut cmd_rx: mpsc::UnboundedReceiver<QueueCommand>,
    event_tx: mpsc::UnboundedSender<QueueEvent>,
    cancel: CancellationToken,
) {
    loop {
        let wake = tokio::select! {
            () = cancel.cancelled() => Wake::Shutdown,
            Some(QueueCommand::CancelAll) = cmd_rx.recv() => Wake::Cancel,
            entry = entry_rx.recv() => Wake::Entry(entry),
        };

        match wake {
            Wake::Shutdown => {
                output.cancel().await;
                break;
            }
            Wake::Cancel => {
                output.cancel().await;
                drain_pending(&mut entry_rx);
            }
            Wake::Entry(None) => {
                // Session ended and the backlog is played out.
                break;
            }
            Wake::Entry(Some(entry)) => {
                debug!("speaking segment: {:?}", entry.text);
                let outcome = tokio::select! {
                    result = output.speak(&entry.text, &voice) => SpeakOutcome::Done(result),
                    Some(QueueCommand::CancelAll) = cmd_rx.recv() => SpeakOutcome::Cancel,
                    () = cancel.cancelled() => SpeakOutcome::Shutdown,
                };
                match outcome {
                    SpeakOutcome::Done(result) => {
                        if let Err(e) = result {
                            error!("playback error, skipping segment: {e}");
                        }
                        let _ = event_tx.send(QueueEvent::SegmentDone);
                    }
                    SpeakOutcome::Cancel => {
                        output.cancel().await;
                        drain_pending(&mut entry_rx);
                    }
                    SpeakOutcome::Shutdown => {
                        output.cancel().await;
                        return;
                    }
                }
            }
        }
    }
}

fn drain_pending(entry_rx: &mut mpsc::UnboundedReceiver<SpeechQueueEntry>) {
    let mut dropped = 0usize;
    while entry_rx.try_recv().is_ok() {
        dropped += 1;
    }
    if dropped > 0 {
        debug!("dropped {dropped} queued segments");
    }
}
