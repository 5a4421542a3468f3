//! Quick-reply suggestions
//!
//! The backend may attach its own quick replies to a reply. When it does not,
//! a [`QuickReplySelector`] picks a fallback set from the assistant's text.

use crate::message::QuickReply;

/// Strategy for choosing fallback quick replies from an assistant message.
///
/// Implementations must be total: every input yields a non-empty list.
pub trait QuickReplySelector: Send + Sync {
    fn select(&self, assistant_text: &str) -> Vec<QuickReply>;
}

/// Keyword-category selector. Categories are checked in a fixed priority
/// order and the first one with a matching keyword wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordQuickReplies;

/// Suggestion category, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Career,
    Pricing,
    Time,
    Curriculum,
    General,
}

const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (Category::Career, &["career", "goals"]),
    (Category::Pricing, &["price", "cost", "expensive"]),
    (Category::Time, &["time", "schedule"]),
    (Category::Curriculum, &["curriculum", "learn", "topics"]),
];

impl KeywordQuickReplies {
    pub fn categorize(assistant_text: &str) -> Category {
        let lower = assistant_text.to_lowercase();
        CATEGORY_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
            .map_or(Category::General, |(category, _)| *category)
    }
}

impl QuickReplySelector for KeywordQuickReplies {
    fn select(&self, assistant_text: &str) -> Vec<QuickReply> {
        replies_for(Self::categorize(assistant_text))
    }
}

pub fn replies_for(category: Category) -> Vec<QuickReply> {
    match category {
        Category::Career => vec![
            QuickReply::new("Career growth 📈", "📈", "I want to grow in my current role"),
            QuickReply::new("Switch careers 🔄", "🔄", "I want to switch to a different role"),
            QuickReply::new("Learn new skills 🎓", "🎓", "I want to learn new technical skills"),
        ],
        Category::Pricing => vec![
            QuickReply::new("💳 EMI options", "💳", "Tell me about EMI options"),
            QuickReply::new("💰 ROI details", "💰", "What's the return on investment?"),
            QuickReply::new("📅 Book call", "📅", "Yes, I'd like to book a consultation"),
        ],
        Category::Time => vec![
            QuickReply::new("✅ Sounds good", "✅", "That sounds manageable"),
            QuickReply::new("⏰ Still concerned", "⏰", "I'm still worried about time"),
            QuickReply::new("📚 See schedule", "📚", "Show me the schedule"),
        ],
        Category::Curriculum => vec![
            QuickReply::new("📚 See curriculum", "📚", "What will I learn?"),
            QuickReply::new("⏰ Duration?", "⏰", "How long is the program?"),
            QuickReply::new("💼 Job support?", "💼", "Do you provide job support?"),
        ],
        Category::General => vec![
            QuickReply::new("💰 Pricing details", "💰", "How much does it cost?"),
            QuickReply::new("⏰ Time commitment", "⏰", "How much time do I need?"),
            QuickReply::new("📚 See curriculum", "📚", "What will I learn?"),
            QuickReply::new("📅 Book a call", "📅", "I'd like to book a consultation call"),
        ],
    }
}

/// Shown alongside the welcome message
pub fn starter_replies() -> Vec<QuickReply> {
    vec![
        QuickReply::new("It was great! 🎉", "🎉", "It was really great!"),
        QuickReply::new(
            "Need more info ℹ️",
            "ℹ️",
            "I need more information about the program",
        ),
    ]
}

/// Shown after the user dismisses the booking picker
pub fn after_booking_closed_replies() -> Vec<QuickReply> {
    vec![
        QuickReply::new("💰 Pricing info", "💰", "Tell me about pricing"),
        QuickReply::new("📚 Curriculum", "📚", "What will I learn?"),
        QuickReply::new("💼 Job support", "💼", "Do you help with jobs?"),
    ]
}

/// Single reply that resubmits a failed or aborted utterance
pub fn retry_reply(utterance: &str) -> QuickReply {
    QuickReply::new("🔄 Try again", "🔄", utterance)
}
