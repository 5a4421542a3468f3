//! Wire types for the assistant backend

use crate::message::{Message, QuickReply, UserContext};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One turn's request: the new utterance plus everything said before it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub conversation_history: Vec<Message>,
    pub user_context: UserContext,
}

/// The assistant's answer to a [`ChatRequest`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quick_replies: Option<Vec<QuickReply>>,
}

impl ChatReply {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timestamp: None,
            quick_replies: None,
        }
    }

    #[must_use]
    pub fn with_quick_replies(mut self, replies: Vec<QuickReply>) -> Self {
        self.quick_replies = Some(replies);
        self
    }

    /// Backend-supplied suggestions, if there are any
    pub fn suggested_replies(&self) -> Option<&[QuickReply]> {
        self.quick_replies
            .as_deref()
            .filter(|replies| !replies.is_empty())
    }
}
