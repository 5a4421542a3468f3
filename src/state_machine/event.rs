//! Events that can occur in a chat session

use crate::backend::{BackendError, ChatReply};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    /// Widget opened for the first time
    Activate,
    UserSubmit {
        text: String,
    },
    ChooseQuickReply {
        index: usize,
    },
    /// The booking picker was dismissed
    CloseBooking,
    ToggleVoice,
    StartListening,
    StopListening,
    CancelPending,

    // Voice input events
    TranscriptReceived {
        text: String,
    },

    // Backend events
    ReplyReceived {
        turn: u64,
        reply: ChatReply,
    },
    ReplyFailed {
        turn: u64,
        error: BackendError,
    },

    // Timer events
    SpeechDue {
        text: String,
        /// Turn that was current when the speech was scheduled
        turn: u64,
    },
    BookingRevealDue {
        turn: u64,
    },
}

impl Event {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Event::Activate => "activate",
            Event::UserSubmit { .. } => "user_submit",
            Event::ChooseQuickReply { .. } => "choose_quick_reply",
            Event::CloseBooking => "close_booking",
            Event::ToggleVoice => "toggle_voice",
            Event::StartListening => "start_listening",
            Event::StopListening => "stop_listening",
            Event::CancelPending => "cancel_pending",
            Event::TranscriptReceived { .. } => "transcript_received",
            Event::ReplyReceived { .. } => "reply_received",
            Event::ReplyFailed { .. } => "reply_failed",
            Event::SpeechDue { .. } => "speech_due",
            Event::BookingRevealDue { .. } => "booking_reveal_due",
        }
    }
}
