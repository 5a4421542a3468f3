//! Speech input adapter

use super::{
    DeviceEvent, RecognitionCallbacks, RecognitionConfig, RecognitionSessionId, SpeechRecognizer,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputState {
    #[default]
    Idle,
    Listening { session: RecognitionSessionId },
}

/// How a recognition error should be reported to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionErrorKind {
    /// Microphone access refused; the user needs to change a setting
    PermissionDenied,
    /// Anything else (no speech, aborted, network). Reset silently.
    Generic,
}

pub fn classify_recognition_error(code: &str) -> RecognitionErrorKind {
    match code {
        "not-allowed" | "service-not-allowed" => RecognitionErrorKind::PermissionDenied,
        _ => RecognitionErrorKind::Generic,
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SpeechInputError {
    #[error("Voice input is not supported on this device")]
    Unsupported,
    #[error("Speech recognizer failed to start: {0}")]
    Device(String),
}

/// What a recognition callback meant for the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputOutcome {
    /// Final transcript; the adapter is idle again
    Transcript(String),
    Failed(RecognitionErrorKind),
    /// Listening stopped without a result
    Ended,
    /// Callback for a session that is no longer current
    Ignored,
}

/// Owns the recognizer and tracks whether we are listening
pub struct SpeechInput {
    device: Option<Arc<dyn SpeechRecognizer>>,
    events: mpsc::UnboundedSender<DeviceEvent>,
    config: RecognitionConfig,
    state: InputState,
    next_session: RecognitionSessionId,
}

impl SpeechInput {
    pub fn new(
        device: Option<Arc<dyn SpeechRecognizer>>,
        events: mpsc::UnboundedSender<DeviceEvent>,
    ) -> Self {
        Self {
            device,
            events,
            config: RecognitionConfig::default(),
            state: InputState::Idle,
            next_session: 1,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.device.is_some()
    }

    pub fn state(&self) -> InputState {
        self.state
    }

    pub fn is_listening(&self) -> bool {
        matches!(self.state, InputState::Listening { .. })
    }

    /// Start listening for one utterance.
    ///
    /// Returns `Ok(false)` if already listening.
    pub fn start(&mut self) -> Result<bool, SpeechInputError> {
        let device = self.device.clone().ok_or(SpeechInputError::Unsupported)?;
        if self.is_listening() {
            return Ok(false);
        }

        let session = self.next_session;
        self.next_session += 1;
        self.state = InputState::Listening { session };

        let callbacks = RecognitionCallbacks::new(session, self.events.clone());
        if let Err(e) = device.start(&self.config, callbacks) {
            self.state = InputState::Idle;
            return Err(SpeechInputError::Device(e.0));
        }

        tracing::debug!(session, "Listening");
        Ok(true)
    }

    /// Force idle. Safe to call in any state.
    pub fn stop(&mut self) {
        if let InputState::Listening { session } = self.state {
            tracing::debug!(session, "Stopping recognition");
            if let Some(device) = &self.device {
                device.stop();
            }
        }
        self.state = InputState::Idle;
    }

    /// Apply a recognition callback
    pub fn handle(&mut self, event: &DeviceEvent) -> InputOutcome {
        let InputState::Listening { session: current } = self.state else {
            return InputOutcome::Ignored;
        };

        match event {
            DeviceEvent::RecognitionResult { session, transcript } if *session == current => {
                self.state = InputState::Idle;
                InputOutcome::Transcript(transcript.clone())
            }
            DeviceEvent::RecognitionError { session, code } if *session == current => {
                self.state = InputState::Idle;
                let kind = classify_recognition_error(code);
                tracing::warn!(code = %code, ?kind, "Speech recognition error");
                InputOutcome::Failed(kind)
            }
            DeviceEvent::RecognitionEnded { session } if *session == current => {
                self.state = InputState::Idle;
                InputOutcome::Ended
            }
            _ => InputOutcome::Ignored,
        }
    }
}
