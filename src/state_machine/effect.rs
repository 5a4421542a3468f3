//! Effects produced by state transitions

use crate::backend::ChatRequest;
use crate::message::Message;
use crate::state_machine::state::PromptSurface;
use std::time::Duration;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send one turn to the assistant backend (spawns as background task)
    RequestReply { turn: u64, request: ChatRequest },

    /// Abort the in-flight backend request
    AbortRequest,

    /// Emit `SpeechDue` after `delay`
    ScheduleSpeech {
        text: String,
        delay: Duration,
        turn: u64,
    },

    /// Speak now, preempting any current utterance
    Speak { text: String },

    /// Silence speech output
    CancelSpeech,

    /// Emit `BookingRevealDue` after `delay`
    ScheduleBookingReveal { turn: u64, delay: Duration },

    StartListening,

    StopListening,

    /// Publish an update to the presentation layer
    Notify(WidgetUpdate),
}

impl Effect {
    pub fn message_appended(message: Message) -> Self {
        Effect::Notify(WidgetUpdate::MessageAppended(message))
    }

    pub fn prompt_changed(prompt: PromptSurface) -> Self {
        Effect::Notify(WidgetUpdate::PromptChanged(prompt))
    }

    pub fn typing(pending: bool) -> Self {
        Effect::Notify(WidgetUpdate::TypingChanged(pending))
    }
}

/// Updates published to whatever renders the widget
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetUpdate {
    MessageAppended(Message),
    /// Typing indicator on/off
    TypingChanged(bool),
    PromptChanged(PromptSurface),
    VoiceChanged(bool),
    SpeakingChanged(bool),
    ListeningChanged(bool),
    /// Recognized speech for the input box
    TranscriptReady(String),
    Notice(Notice),
}

/// User-facing notices that are not part of the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    MicrophoneDenied,
    VoiceInputUnsupported,
}

impl Notice {
    pub fn text(self) -> &'static str {
        match self {
            Notice::MicrophoneDenied => {
                "Microphone access denied. Please allow microphone access in your settings."
            }
            Notice::VoiceInputUnsupported => {
                "🎤 Voice input is not supported on this device. You can still type your message."
            }
        }
    }
}
