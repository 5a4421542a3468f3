//! Conversation data types
//!
//! Messages, quick replies and the user context travel to the assistant
//! backend as camelCase JSON, so their serde shape is the wire shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Messages
// ============================================================================

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sender {
    #[serde(rename = "user")]
    User,
    /// Serialized as `ai`, which is what the backend expects in history
    #[serde(rename = "ai")]
    Assistant,
}

/// A single chat message. Immutable once appended to a [`MessageLog`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl Message {
    pub fn user(text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::User,
            timestamp,
            is_error: false,
        }
    }

    pub fn assistant(text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::Assistant,
            timestamp,
            is_error: false,
        }
    }

    /// Synthetic assistant message shown when the backend could not answer
    pub fn error(text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            is_error: true,
            ..Self::assistant(text, timestamp)
        }
    }
}

/// Append-only, ordered message history for one session.
///
/// There is deliberately no way to remove or edit an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }

    /// Owned copy of the history, in append order
    pub fn to_vec(&self) -> Vec<Message> {
        self.messages.clone()
    }
}

// ============================================================================
// Quick replies
// ============================================================================

/// A suggested next utterance the user can pick instead of typing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickReply {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub value: String,
}

impl QuickReply {
    pub fn new(label: impl Into<String>, icon: &str, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            icon: Some(icon.to_string()),
            value: value.into(),
        }
    }

    /// Text submitted when this reply is chosen. Backends sometimes send
    /// label-only replies, in which case the label is the utterance.
    pub fn utterance(&self) -> &str {
        if self.value.trim().is_empty() {
            &self.label
        } else {
            &self.value
        }
    }
}

// ============================================================================
// User context
// ============================================================================

/// Identity and lead metadata attached to every backend request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    pub user_name: String,
    pub user_email: String,
    pub user_phone: String,
    pub masterclass_topic: String,
    pub attended_date: String,
    pub lead_source: String,
}

impl UserContext {
    pub fn from_env() -> Self {
        let var = |name: &str, default: &str| {
            std::env::var(name).unwrap_or_else(|_| default.to_string())
        };
        Self {
            user_name: var("COACH_USER_NAME", ""),
            user_email: var("COACH_USER_EMAIL", ""),
            user_phone: var("COACH_USER_PHONE", ""),
            masterclass_topic: var("COACH_TOPIC", "Data Engineering"),
            attended_date: var("COACH_ATTENDED_DATE", ""),
            lead_source: var("COACH_LEAD_SOURCE", "masterclass"),
        }
    }
}
