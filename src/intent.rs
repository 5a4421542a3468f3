//! Booking-intent detection
//!
//! Decides whether an assistant reply is steering the user toward a call,
//! in which case the booking picker is revealed.

/// Strategy for recognising booking intent in an assistant message
pub trait BookingIntentDetector: Send + Sync {
    fn detects(&self, assistant_text: &str) -> bool;
}

/// Phrase-fragment matcher.
///
/// Plain substring matching with no negation handling: "you don't need to
/// book a call" still counts as booking intent.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordBookingIntent;

const BOOKING_PHRASES: &[&str] = &[
    "book a consultation",
    "speak with our advisor",
    "speak with an advisor",
    "schedule a call",
    "book a call",
    "would you like to book",
    "talk to our career advisor",
    "connect you with",
    "free consultation",
    "30-min call",
    "book you a free",
];

impl BookingIntentDetector for KeywordBookingIntent {
    fn detects(&self, assistant_text: &str) -> bool {
        let lower = assistant_text.to_lowercase();
        BOOKING_PHRASES.iter().any(|phrase| lower.contains(phrase))
    }
}
