//! Conversation state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions:
//! the runtime feeds [`Event`]s in and performs the returned [`Effect`]s.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;


pub use effect::{Effect, Notice, WidgetUpdate};
pub use event::Event;
pub use state::{ConversationSession, PromptSurface, SessionContext, Timings, TurnState};
pub use transition::{transition, TransitionError, TransitionResult};
