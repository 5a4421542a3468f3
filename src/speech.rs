//! Speech input and output
//!
//! Host speech capabilities (synthesis and recognition) are injected as
//! optional trait objects. They report progress through callback handles
//! that forward [`DeviceEvent`]s to the runtime, which routes them back to
//! the owning adapter.

mod input;
mod output;

pub use input::{
    classify_recognition_error, InputOutcome, InputState, RecognitionErrorKind, SpeechInput,
    SpeechInputError,
};
pub use output::{OutputState, SpeechOutput, VoiceSettings};

use thiserror::Error;
use tokio::sync::mpsc;

/// Identifies one `speak` request
pub type UtteranceId = u64;

/// Identifies one `start` of the recognizer
pub type RecognitionSessionId = u64;

/// Callback traffic from the host speech devices
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    SynthesisStarted(UtteranceId),
    SynthesisEnded(UtteranceId),
    SynthesisFailed {
        utterance: UtteranceId,
        reason: String,
    },
    RecognitionResult {
        session: RecognitionSessionId,
        transcript: String,
    },
    RecognitionError {
        session: RecognitionSessionId,
        code: String,
    },
    RecognitionEnded {
        session: RecognitionSessionId,
    },
}

/// Failure reported synchronously by a host device
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct DeviceError(pub String);

// ============================================================================
// Speech synthesis
// ============================================================================

/// A synthetic voice offered by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub name: String,
    pub lang: String,
}

impl Voice {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
        }
    }
}

/// Fully configured utterance handed to the synthesizer
#[derive(Debug, Clone, PartialEq)]
pub struct UtteranceRequest {
    pub text: String,
    /// Voice name, `None` for the host default
    pub voice: Option<String>,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    pub lang: String,
}

/// Text-to-speech capability of the host
pub trait SpeechSynthesizer: Send + Sync {
    /// Voices currently available. May be empty while the host is still
    /// loading them.
    fn voices(&self) -> Vec<Voice>;

    /// Start speaking. Progress is reported through `callbacks`.
    fn speak(&self, request: UtteranceRequest, callbacks: UtteranceCallbacks);

    /// Stop whatever is being spoken
    fn cancel(&self);
}

/// Handle a synthesizer uses to report on one utterance
#[derive(Debug, Clone)]
pub struct UtteranceCallbacks {
    id: UtteranceId,
    tx: mpsc::UnboundedSender<DeviceEvent>,
}

impl UtteranceCallbacks {
    pub fn new(id: UtteranceId, tx: mpsc::UnboundedSender<DeviceEvent>) -> Self {
        Self { id, tx }
    }

    // Send failures mean the runtime is gone; nothing left to notify.

    pub fn started(&self) {
        let _ = self.tx.send(DeviceEvent::SynthesisStarted(self.id));
    }

    pub fn ended(&self) {
        let _ = self.tx.send(DeviceEvent::SynthesisEnded(self.id));
    }

    pub fn failed(&self, reason: impl Into<String>) {
        let _ = self.tx.send(DeviceEvent::SynthesisFailed {
            utterance: self.id,
            reason: reason.into(),
        });
    }
}

// ============================================================================
// Speech recognition
// ============================================================================

/// Recognizer settings applied on every start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionConfig {
    /// Keep listening after the first phrase
    pub continuous: bool,
    /// Report partial transcripts
    pub interim_results: bool,
    pub lang: String,
    pub max_alternatives: u32,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            continuous: false,
            interim_results: false,
            lang: "en-US".to_string(),
            max_alternatives: 1,
        }
    }
}

/// Speech-to-text capability of the host
pub trait SpeechRecognizer: Send + Sync {
    /// Begin listening. Results arrive through `callbacks`.
    fn start(
        &self,
        config: &RecognitionConfig,
        callbacks: RecognitionCallbacks,
    ) -> Result<(), DeviceError>;

    fn stop(&self);
}

/// Handle a recognizer uses to report on one listening session
#[derive(Debug, Clone)]
pub struct RecognitionCallbacks {
    session: RecognitionSessionId,
    tx: mpsc::UnboundedSender<DeviceEvent>,
}

impl RecognitionCallbacks {
    pub fn new(session: RecognitionSessionId, tx: mpsc::UnboundedSender<DeviceEvent>) -> Self {
        Self { session, tx }
    }

    pub fn result(&self, transcript: impl Into<String>) {
        let _ = self.tx.send(DeviceEvent::RecognitionResult {
            session: self.session,
            transcript: transcript.into(),
        });
    }

    /// Report a host error code such as `not-allowed` or `no-speech`
    pub fn error(&self, code: impl Into<String>) {
        let _ = self.tx.send(DeviceEvent::RecognitionError {
            session: self.session,
            code: code.into(),
        });
    }

    pub fn ended(&self) {
        let _ = self.tx.send(DeviceEvent::RecognitionEnded {
            session: self.session,
        });
    }
}
