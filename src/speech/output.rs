//! Speech output adapter

use super::{
    DeviceEvent, SpeechSynthesizer, UtteranceCallbacks, UtteranceId, UtteranceRequest, Voice,
};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Name fragments of preferred voices, best first
const PREFERRED_VOICES: &[&str] = &["Google", "Female", "Samantha", "Karen", "Zira"];

/// Voice output state. At most one utterance is ever current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputState {
    #[default]
    Idle,
    /// Handed to the device, not started yet
    Queued(UtteranceId),
    Speaking(UtteranceId),
}

impl OutputState {
    fn current(self) -> Option<UtteranceId> {
        match self {
            OutputState::Idle => None,
            OutputState::Queued(id) | OutputState::Speaking(id) => Some(id),
        }
    }
}

/// Fixed delivery parameters for every utterance
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSettings {
    /// Slightly slower than normal for clarity
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    pub lang: String,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            rate: 0.95,
            pitch: 1.1,
            volume: 1.0,
            lang: "en-US".to_string(),
        }
    }
}

/// Owns the synthesizer and tracks the single in-flight utterance
pub struct SpeechOutput {
    device: Option<Arc<dyn SpeechSynthesizer>>,
    events: mpsc::UnboundedSender<DeviceEvent>,
    settings: VoiceSettings,
    state: OutputState,
    next_id: UtteranceId,
}

impl SpeechOutput {
    pub fn new(
        device: Option<Arc<dyn SpeechSynthesizer>>,
        events: mpsc::UnboundedSender<DeviceEvent>,
    ) -> Self {
        Self {
            device,
            events,
            settings: VoiceSettings::default(),
            state: OutputState::Idle,
            next_id: 1,
        }
    }

    pub fn is_available(&self) -> bool {
        self.device.is_some()
    }

    pub fn state(&self) -> OutputState {
        self.state
    }

    pub fn is_speaking(&self) -> bool {
        matches!(self.state, OutputState::Speaking(_))
    }

    /// Speak `text`, preempting anything already queued or speaking.
    ///
    /// Returns the new utterance id, or `None` when there is no synthesizer.
    pub fn speak(&mut self, text: &str) -> Option<UtteranceId> {
        let device = self.device.clone()?;

        if self.state != OutputState::Idle {
            device.cancel();
        }

        let id = self.next_id;
        self.next_id += 1;

        let voices = device.voices();
        let voice = select_voice(&voices);
        let request = UtteranceRequest {
            text: text.to_string(),
            voice: voice.map(|v| v.name.clone()),
            rate: self.settings.rate,
            pitch: self.settings.pitch,
            volume: self.settings.volume,
            lang: self.settings.lang.clone(),
        };

        tracing::debug!(utterance = id, voice = ?request.voice, "Speaking");
        self.state = OutputState::Queued(id);
        device.speak(request, UtteranceCallbacks::new(id, self.events.clone()));
        Some(id)
    }

    /// Force idle. Safe to call in any state.
    pub fn cancel(&mut self) {
        if let Some(id) = self.state.current() {
            tracing::debug!(utterance = id, "Cancelling speech");
            if let Some(device) = &self.device {
                device.cancel();
            }
        }
        self.state = OutputState::Idle;
    }

    /// Apply a synthesis callback. Callbacks for preempted utterances are
    /// ignored. Returns `true` if the state changed.
    pub fn handle(&mut self, event: &DeviceEvent) -> bool {
        let before = self.state;
        let current = self.state.current();

        match event {
            DeviceEvent::SynthesisStarted(id) if current == Some(*id) => {
                self.state = OutputState::Speaking(*id);
            }
            DeviceEvent::SynthesisEnded(id) if current == Some(*id) => {
                self.state = OutputState::Idle;
            }
            DeviceEvent::SynthesisFailed { utterance, reason } if current == Some(*utterance) => {
                tracing::warn!(utterance = *utterance, reason = %reason, "Speech output failed");
                self.state = OutputState::Idle;
            }
            _ => {}
        }

        before != self.state
    }
}

/// Pick the first available voice matching the preference list, in
/// preference order. `None` means the host default.
pub fn select_voice(voices: &[Voice]) -> Option<&Voice> {
    PREFERRED_VOICES
        .iter()
        .find_map(|fragment| voices.iter().find(|v| v.name.contains(fragment)))
}
