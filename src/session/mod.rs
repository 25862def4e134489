//! Conversation session: state machine, turn coordination, and the
//! streaming text plumbing between the collaborators.

pub mod coordinator;
pub mod guard;
pub mod messages;
pub mod queue;
pub mod retry;
pub mod segmenter;
pub mod state;
pub mod think;
pub mod timers;

pub use coordinator::{SessionCoordinator, SessionHandle};
pub use guard::{EchoPhrasePolicy, FeedbackGuard, GuardVerdict, PhraseListPolicy};
pub use messages::{SessionCommand, SpeechQueueEntry};
pub use segmenter::{SentenceSegmenter, split_sentences};
pub use state::{ConversationState, StateMachine};
pub use think::ThinkBlockFilter;
pub use timers::TurnTimers;
