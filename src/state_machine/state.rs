//! Chat session state types

use crate::intent::{BookingIntentDetector, KeywordBookingIntent};
use crate::message::{MessageLog, QuickReply, UserContext};
use crate::suggestions::{KeywordQuickReplies, QuickReplySelector};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Turn State
// ============================================================================

/// Where the current request/response cycle stands
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TurnState {
    /// Ready for user input, no request in flight
    #[default]
    Idle,

    /// Request in flight for `turn`
    AwaitingReply { turn: u64, utterance: String },

    /// Last request failed. Accepts input like `Idle`.
    Failed { turn: u64, utterance: String },
}

impl TurnState {
    pub fn is_pending(&self) -> bool {
        matches!(self, TurnState::AwaitingReply { .. })
    }
}

// ============================================================================
// Prompt Surface
// ============================================================================

/// What is offered under the conversation: suggestions, the booking picker,
/// or nothing. Quick replies and booking can never be shown together.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PromptSurface {
    #[default]
    Hidden,
    /// Always non-empty; use [`PromptSurface::from_replies`]
    QuickReplies(Vec<QuickReply>),
    Booking,
}

impl PromptSurface {
    pub fn from_replies(replies: Vec<QuickReply>) -> Self {
        if replies.is_empty() {
            PromptSurface::Hidden
        } else {
            PromptSurface::QuickReplies(replies)
        }
    }

    pub fn quick_replies(&self) -> Option<&[QuickReply]> {
        match self {
            PromptSurface::QuickReplies(replies) => Some(replies),
            PromptSurface::Hidden | PromptSurface::Booking => None,
        }
    }

    pub fn is_booking(&self) -> bool {
        matches!(self, PromptSurface::Booking)
    }
}

// ============================================================================
// Conversation Session
// ============================================================================

/// All controller-owned state for one widget session.
///
/// Speaking and listening are tracked by the speech adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSession {
    pub history: MessageLog,
    pub turn: TurnState,
    pub prompt: PromptSurface,
    pub voice_enabled: bool,
    /// Id of the latest accepted submission, 0 before the first
    pub turn_seq: u64,
    pub activated: bool,
}

impl ConversationSession {
    pub fn new(voice_enabled: bool) -> Self {
        Self {
            history: MessageLog::new(),
            turn: TurnState::Idle,
            prompt: PromptSurface::Hidden,
            voice_enabled,
            turn_seq: 0,
            activated: false,
        }
    }

    pub fn pending_reply(&self) -> bool {
        self.turn.is_pending()
    }

    pub fn active_quick_replies(&self) -> Option<&[QuickReply]> {
        self.prompt.quick_replies()
    }

    pub fn booking_visible(&self) -> bool {
        self.prompt.is_booking()
    }
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new(true)
    }
}

// ============================================================================
// Session Context
// ============================================================================

/// Staggering delays so the UI renders before audio or the booking picker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub welcome_speech_delay: Duration,
    pub reply_speech_delay: Duration,
    pub booking_reveal_delay: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            welcome_speech_delay: Duration::from_millis(1000),
            reply_speech_delay: Duration::from_millis(500),
            booking_reveal_delay: Duration::from_millis(1000),
        }
    }
}

/// Context for a session (immutable configuration)
#[derive(Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub user: UserContext,
    pub timings: Timings,
    /// Submit recognized speech directly instead of filling the input box
    pub auto_submit_transcripts: bool,
    pub quick_replies: Arc<dyn QuickReplySelector>,
    pub booking_intent: Arc<dyn BookingIntentDetector>,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>, user: UserContext) -> Self {
        Self {
            session_id: session_id.into(),
            user,
            timings: Timings::default(),
            auto_submit_transcripts: false,
            quick_replies: Arc::new(KeywordQuickReplies),
            booking_intent: Arc::new(KeywordBookingIntent),
        }
    }

    #[must_use]
    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    #[must_use]
    pub fn with_auto_submit_transcripts(mut self, enabled: bool) -> Self {
        self.auto_submit_transcripts = enabled;
        self
    }

    #[must_use]
    pub fn with_quick_replies(mut self, selector: Arc<dyn QuickReplySelector>) -> Self {
        self.quick_replies = selector;
        self
    }

    #[must_use]
    pub fn with_booking_intent(mut self, detector: Arc<dyn BookingIntentDetector>) -> Self {
        self.booking_intent = detector;
        self
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("session_id", &self.session_id)
            .field("user", &self.user)
            .field("timings", &self.timings)
            .field("auto_submit_transcripts", &self.auto_submit_transcripts)
            .finish_non_exhaustive()
    }
}
