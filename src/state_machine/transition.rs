//! Pure state transition function
//!
//! Given the same session, context, event and clock reading, `transition`
//! always returns the same result and performs no I/O.

use super::{ConversationSession, Effect, Event, PromptSurface, SessionContext, TurnState};
use super::effect::WidgetUpdate;
use crate::backend::{BackendError, ChatReply, ChatRequest};
use crate::message::Message;
use crate::suggestions::{after_booking_closed_replies, retry_reply, starter_replies};
use chrono::{DateTime, Utc};
use thiserror::Error;

pub const APOLOGY_TEXT: &str = "Sorry, I'm having trouble connecting. Please try again!";

pub const BOOKING_CLOSED_TEXT: &str =
    "No problem! Feel free to ask me any other questions. I'm here to help! 😊";

/// Turn id used for speech scheduled before any submission
const WELCOME_TURN: u64 = 0;

pub fn welcome_text(topic: &str) -> String {
    let topic = topic.trim();
    if topic.is_empty() {
        "Hey! 👋 Thanks for attending the masterclass! What did you think of it?".to_string()
    } else {
        format!("Hey! 👋 Thanks for attending the {topic} masterclass! What did you think of it?")
    }
}

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConversationSession,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConversationSession) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    #[must_use]
    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Reasons an event is rejected. A rejected event leaves the session as it was.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Utterance is empty")]
    EmptyUtterance,
    #[error("A reply is still pending")]
    ReplyPending,
    #[error("Session is already active")]
    AlreadyActive,
    #[error("Booking picker is not visible")]
    BookingNotVisible,
    #[error("No quick reply at index {0}")]
    NoSuchQuickReply(usize),
    #[error("Stale event for turn {0}")]
    StaleEvent(u64),
    #[error("No request is pending")]
    NothingPending,
}

/// Pure transition function
pub fn transition(
    state: &ConversationSession,
    context: &SessionContext,
    event: Event,
    now: DateTime<Utc>,
) -> Result<TransitionResult, TransitionError> {
    match event {
        // ============================================================
        // Session start
        // ============================================================
        Event::Activate => {
            if state.activated {
                return Err(TransitionError::AlreadyActive);
            }

            let welcome = Message::assistant(welcome_text(&context.user.masterclass_topic), now);
            let mut next = state.clone();
            next.activated = true;
            next.history.append(welcome.clone());
            next.prompt = PromptSurface::from_replies(starter_replies());
            let prompt = next.prompt.clone();

            Ok(TransitionResult::new(next)
                .with_effect(Effect::ScheduleSpeech {
                    text: welcome.text.clone(),
                    delay: context.timings.welcome_speech_delay,
                    turn: WELCOME_TURN,
                })
                .with_effect(Effect::message_appended(welcome))
                .with_effect(Effect::prompt_changed(prompt)))
        }

        // ============================================================
        // Submissions
        // ============================================================
        Event::UserSubmit { text } => submit(state, context, &text, now),

        Event::ChooseQuickReply { index } => {
            let utterance = state
                .active_quick_replies()
                .and_then(|replies| replies.get(index))
                .map(|reply| reply.utterance().to_string())
                .ok_or(TransitionError::NoSuchQuickReply(index))?;
            submit(state, context, &utterance, now)
        }

        Event::TranscriptReceived { text } => {
            // Never drop speech: while a reply is pending it goes to the input box
            if context.auto_submit_transcripts && !state.pending_reply() {
                submit(state, context, &text, now)
            } else {
                Ok(TransitionResult::new(state.clone())
                    .with_effect(Effect::Notify(WidgetUpdate::TranscriptReady(text))))
            }
        }

        // ============================================================
        // Backend results
        // ============================================================
        Event::ReplyReceived { turn, reply } => match &state.turn {
            TurnState::AwaitingReply { turn: pending, .. } if *pending == turn => {
                Ok(reply_received(state, context, turn, &reply, now))
            }
            _ => Err(TransitionError::StaleEvent(turn)),
        },

        Event::ReplyFailed { turn, error } => match &state.turn {
            TurnState::AwaitingReply {
                turn: pending,
                utterance,
            } if *pending == turn => Ok(reply_failed(state, turn, utterance, &error, now)),
            _ => Err(TransitionError::StaleEvent(turn)),
        },

        Event::CancelPending => match &state.turn {
            TurnState::AwaitingReply { utterance, .. } => {
                let mut next = state.clone();
                next.prompt = PromptSurface::from_replies(vec![retry_reply(utterance)]);
                next.turn = TurnState::Idle;
                let prompt = next.prompt.clone();

                Ok(TransitionResult::new(next)
                    .with_effect(Effect::AbortRequest)
                    .with_effect(Effect::typing(false))
                    .with_effect(Effect::prompt_changed(prompt)))
            }
            TurnState::Idle | TurnState::Failed { .. } => Err(TransitionError::NothingPending),
        },

        // ============================================================
        // Timers
        // ============================================================
        Event::SpeechDue { text, turn } => {
            if turn != state.turn_seq {
                // A newer submission already silenced this turn
                return Err(TransitionError::StaleEvent(turn));
            }
            Ok(TransitionResult::new(state.clone()).with_effects(speak(state, text)))
        }

        Event::BookingRevealDue { turn } => {
            if turn != state.turn_seq || state.pending_reply() {
                return Err(TransitionError::StaleEvent(turn));
            }
            let mut next = state.clone();
            next.prompt = PromptSurface::Booking;

            Ok(TransitionResult::new(next).with_effect(Effect::prompt_changed(PromptSurface::Booking)))
        }

        // ============================================================
        // Booking
        // ============================================================
        Event::CloseBooking => {
            if !state.booking_visible() {
                return Err(TransitionError::BookingNotVisible);
            }

            let message = Message::assistant(BOOKING_CLOSED_TEXT, now);
            let mut next = state.clone();
            next.history.append(message.clone());
            next.prompt = PromptSurface::from_replies(after_booking_closed_replies());
            let prompt = next.prompt.clone();

            Ok(TransitionResult::new(next)
                .with_effect(Effect::message_appended(message))
                .with_effects(speak(state, BOOKING_CLOSED_TEXT.to_string()))
                .with_effect(Effect::prompt_changed(prompt)))
        }

        // ============================================================
        // Voice
        // ============================================================
        Event::ToggleVoice => {
            let mut next = state.clone();
            next.voice_enabled = !state.voice_enabled;
            let mut result = TransitionResult::new(next)
                .with_effect(Effect::Notify(WidgetUpdate::VoiceChanged(!state.voice_enabled)));
            if state.voice_enabled {
                result = result.with_effect(Effect::CancelSpeech);
            }
            Ok(result)
        }

        Event::StartListening => {
            if state.pending_reply() {
                return Err(TransitionError::ReplyPending);
            }
            // Never listen while talking over the microphone
            Ok(TransitionResult::new(state.clone())
                .with_effect(Effect::CancelSpeech)
                .with_effect(Effect::StartListening))
        }

        Event::StopListening => {
            Ok(TransitionResult::new(state.clone()).with_effect(Effect::StopListening))
        }
    }
}

fn submit(
    state: &ConversationSession,
    context: &SessionContext,
    text: &str,
    now: DateTime<Utc>,
) -> Result<TransitionResult, TransitionError> {
    let utterance = text.trim();
    if utterance.is_empty() {
        return Err(TransitionError::EmptyUtterance);
    }
    if state.pending_reply() {
        return Err(TransitionError::ReplyPending);
    }

    let turn = state.turn_seq + 1;
    let request = ChatRequest {
        message: utterance.to_string(),
        conversation_history: state.history.to_vec(),
        user_context: context.user.clone(),
    };

    let message = Message::user(utterance, now);
    let mut next = state.clone();
    next.history.append(message.clone());
    next.turn = TurnState::AwaitingReply {
        turn,
        utterance: utterance.to_string(),
    };
    next.turn_seq = turn;
    // Suggestions go away; an open booking picker stays open
    if !state.booking_visible() {
        next.prompt = PromptSurface::Hidden;
    }
    let prompt = next.prompt.clone();

    Ok(TransitionResult::new(next)
        .with_effect(Effect::CancelSpeech)
        .with_effect(Effect::message_appended(message))
        .with_effect(Effect::prompt_changed(prompt))
        .with_effect(Effect::typing(true))
        .with_effect(Effect::RequestReply { turn, request }))
}

fn reply_received(
    state: &ConversationSession,
    context: &SessionContext,
    turn: u64,
    reply: &ChatReply,
    now: DateTime<Utc>,
) -> TransitionResult {
    let text = reply.message.clone();
    let message = Message::assistant(&text, reply.timestamp.unwrap_or(now));

    let replies = reply
        .suggested_replies()
        .map_or_else(|| context.quick_replies.select(&text), <[_]>::to_vec);

    let mut next = state.clone();
    next.history.append(message.clone());
    next.turn = TurnState::Idle;
    next.prompt = PromptSurface::from_replies(replies);
    let prompt = next.prompt.clone();

    let mut result = TransitionResult::new(next)
        .with_effect(Effect::message_appended(message))
        .with_effect(Effect::typing(false))
        .with_effect(Effect::ScheduleSpeech {
            text: text.clone(),
            delay: context.timings.reply_speech_delay,
            turn,
        })
        .with_effect(Effect::prompt_changed(prompt));

    if context.booking_intent.detects(&text) {
        result = result.with_effect(Effect::ScheduleBookingReveal {
            turn,
            delay: context.timings.booking_reveal_delay,
        });
    }

    result
}

fn reply_failed(
    state: &ConversationSession,
    turn: u64,
    utterance: &str,
    _error: &BackendError,
    now: DateTime<Utc>,
) -> TransitionResult {
    let message = Message::error(APOLOGY_TEXT, now);

    let mut next = state.clone();
    next.history.append(message.clone());
    next.turn = TurnState::Failed {
        turn,
        utterance: utterance.to_string(),
    };
    next.prompt = PromptSurface::from_replies(vec![retry_reply(utterance)]);
    let prompt = next.prompt.clone();

    TransitionResult::new(next)
        .with_effect(Effect::message_appended(message))
        .with_effect(Effect::typing(false))
        .with_effects(speak(state, APOLOGY_TEXT.to_string()))
        .with_effect(Effect::prompt_changed(prompt))
}

/// Speak immediately if voice output is on
fn speak(state: &ConversationSession, text: String) -> Option<Effect> {
    state.voice_enabled.then_some(Effect::Speak { text })
}
