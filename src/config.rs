//! Widget configuration from environment variables

use crate::runtime::RuntimeOptions;
use crate::state_machine::Timings;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000/api/chat";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a whole number, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
    #[error("{name} must be true or false, got {value:?}")]
    InvalidFlag { name: &'static str, value: String },
}

/// Configuration for the chat widget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetConfig {
    pub backend_url: String,
    pub request_timeout: Duration,
    pub voice_enabled: bool,
    pub auto_submit_transcripts: bool,
    pub timings: Timings,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            voice_enabled: true,
            auto_submit_transcripts: false,
            timings: Timings::default(),
        }
    }
}

impl WidgetConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Unset variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let millis = |name: &'static str, default: Duration| {
            parse_number(name, lookup(name)).map(|v| v.map_or(default, Duration::from_millis))
        };

        Ok(Self {
            backend_url: lookup("COACH_BACKEND_URL")
                .filter(|url| !url.trim().is_empty())
                .unwrap_or(defaults.backend_url),
            request_timeout: parse_timeout(lookup("COACH_REQUEST_TIMEOUT_SECS"))?
                .unwrap_or(defaults.request_timeout),
            voice_enabled: parse_flag("COACH_VOICE_ENABLED", lookup("COACH_VOICE_ENABLED"))?
                .unwrap_or(defaults.voice_enabled),
            auto_submit_transcripts: parse_flag(
                "COACH_AUTO_SUBMIT_TRANSCRIPTS",
                lookup("COACH_AUTO_SUBMIT_TRANSCRIPTS"),
            )?
            .unwrap_or(defaults.auto_submit_transcripts),
            timings: Timings {
                welcome_speech_delay: millis(
                    "COACH_WELCOME_DELAY_MS",
                    defaults.timings.welcome_speech_delay,
                )?,
                reply_speech_delay: millis(
                    "COACH_REPLY_SPEECH_DELAY_MS",
                    defaults.timings.reply_speech_delay,
                )?,
                booking_reveal_delay: millis(
                    "COACH_BOOKING_REVEAL_DELAY_MS",
                    defaults.timings.booking_reveal_delay,
                )?,
            },
        })
    }

    pub fn runtime_options(&self) -> RuntimeOptions {
        RuntimeOptions {
            request_timeout: self.request_timeout,
            voice_enabled: self.voice_enabled,
            activate_on_start: true,
        }
    }
}

fn parse_number(name: &'static str, raw: Option<String>) -> Result<Option<u64>, ConfigError> {
    raw.map(|value| {
        value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { name, value })
    })
    .transpose()
}

/// Request deadline in seconds; zero would fail every request
fn parse_timeout(raw: Option<String>) -> Result<Option<Duration>, ConfigError> {
    const NAME: &str = "COACH_REQUEST_TIMEOUT_SECS";
    match parse_number(NAME, raw.clone())? {
        Some(0) => Err(ConfigError::InvalidNumber {
            name: NAME,
            value: raw.unwrap_or_default(),
        }),
        secs => Ok(secs.map(Duration::from_secs)),
    }
}

fn parse_flag(name: &'static str, raw: Option<String>) -> Result<Option<bool>, ConfigError> {
    raw.map(|value| match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag { name, value }),
    })
    .transpose()
}
