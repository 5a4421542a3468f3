//! Coach chat - conversational support widget controller
//!
//! Drives a text-and-voice chat with a remote assistant backend: message
//! history, quick-reply suggestions, booking intent detection and optional
//! speech output and input.

pub mod backend;
pub mod config;
pub mod intent;
pub mod message;
pub mod runtime;
pub mod speech;
pub mod state_machine;
pub mod suggestions;

pub use config::{ConfigError, WidgetConfig};
pub use runtime::{spawn_chat, ChatHandle, RuntimeOptions, SessionSnapshot, SpeechDevices};
