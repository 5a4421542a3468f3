//! Chat runtime executor

use super::{RuntimeOptions, SessionSnapshot, SpeechDevices};

use crate::backend::{AssistantBackend, BackendError};
use crate::speech::{DeviceEvent, InputOutcome, RecognitionErrorKind, SpeechInput, SpeechInputError, SpeechOutput};
use crate::state_machine::{
    transition, ConversationSession, Effect, Event, Notice, SessionContext, WidgetUpdate,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Single writer of a chat session's state. Works with any backend.
pub struct ChatRuntime<B>
where
    B: AssistantBackend + 'static,
{
    context: SessionContext,
    state: ConversationSession,
    backend: Arc<B>,
    output: SpeechOutput,
    input: SpeechInput,
    options: RuntimeOptions,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    device_rx: mpsc::UnboundedReceiver<DeviceEvent>,
    updates_tx: broadcast::Sender<WidgetUpdate>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    /// Token to cancel the in-flight backend request
    request_cancel_token: Option<CancellationToken>,
    /// Cancels everything the runtime spawned
    shutdown: CancellationToken,
}

impl<B> ChatRuntime<B>
where
    B: AssistantBackend + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: SessionContext,
        backend: B,
        devices: SpeechDevices,
        options: RuntimeOptions,
        event_rx: mpsc::Receiver<Event>,
        event_tx: mpsc::Sender<Event>,
        updates_tx: broadcast::Sender<WidgetUpdate>,
        snapshot_tx: watch::Sender<SessionSnapshot>,
        shutdown: CancellationToken,
    ) -> Self {
        let (device_tx, device_rx) = mpsc::unbounded_channel();
        Self {
            context,
            state: ConversationSession::new(options.voice_enabled),
            backend: Arc::new(backend),
            output: SpeechOutput::new(devices.synthesizer, device_tx.clone()),
            input: SpeechInput::new(devices.recognizer, device_tx),
            options,
            event_rx,
            event_tx,
            device_rx,
            updates_tx,
            snapshot_tx,
            request_cancel_token: None,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            session_id = %self.context.session_id,
            voice_output = self.output.is_available(),
            voice_input = self.input.is_supported(),
            "Starting chat runtime"
        );

        if self.options.activate_on_start {
            self.process_event(Event::Activate);
        }
        self.publish_snapshot();

        // Process events in a loop - no recursion
        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                Some(event) = self.event_rx.recv() => self.process_event(event),
                Some(event) = self.device_rx.recv() => self.process_device_event(&event),
                else => break,
            }
        }

        self.teardown();
        tracing::info!(session_id = %self.context.session_id, "Chat runtime stopped");
    }

    fn process_event(&mut self, event: Event) {
        let name = event.name();

        // Pure state transition
        let result = match transition(&self.state, &self.context, event, Utc::now()) {
            Ok(r) => r,
            Err(e) => {
                // Rejections are expected (double submits, late replies)
                tracing::debug!(
                    session_id = %self.context.session_id,
                    event = name,
                    reason = %e,
                    "Event ignored"
                );
                return;
            }
        };

        self.state = result.new_state;
        for effect in result.effects {
            self.execute_effect(effect);
        }
        self.publish_snapshot();
    }

    fn process_device_event(&mut self, event: &DeviceEvent) {
        match event {
            DeviceEvent::SynthesisStarted(_)
            | DeviceEvent::SynthesisEnded(_)
            | DeviceEvent::SynthesisFailed { .. } => {
                let was_speaking = self.output.is_speaking();
                self.output.handle(event);
                self.publish_speaking_change(was_speaking);
            }
            DeviceEvent::RecognitionResult { .. }
            | DeviceEvent::RecognitionError { .. }
            | DeviceEvent::RecognitionEnded { .. } => match self.input.handle(event) {
                InputOutcome::Transcript(text) => {
                    self.publish(WidgetUpdate::ListeningChanged(false));
                    tracing::info!(session_id = %self.context.session_id, "Voice input received");
                    self.process_event(Event::TranscriptReceived { text });
                }
                InputOutcome::Failed(RecognitionErrorKind::PermissionDenied) => {
                    self.publish(WidgetUpdate::ListeningChanged(false));
                    self.publish(WidgetUpdate::Notice(Notice::MicrophoneDenied));
                }
                InputOutcome::Failed(RecognitionErrorKind::Generic) | InputOutcome::Ended => {
                    self.publish(WidgetUpdate::ListeningChanged(false));
                }
                InputOutcome::Ignored => {}
            },
        }
        self.publish_snapshot();
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::RequestReply { turn, request } => {
                // Create cancellation token for this request
                let cancel_token = self.shutdown.child_token();
                self.request_cancel_token = Some(cancel_token.clone());

                let backend = self.backend.clone();
                let event_tx = self.event_tx.clone();
                let deadline = self.options.request_timeout;
                let session_id = self.context.session_id.clone();

                tokio::spawn(async move {
                    tracing::info!(session_id = %session_id, turn, "Requesting assistant reply");

                    let outcome = tokio::select! {
                        () = cancel_token.cancelled() => {
                            tracing::info!(session_id = %session_id, turn, "Assistant request aborted");
                            return;
                        }
                        outcome = tokio::time::timeout(deadline, backend.send(&request)) => outcome,
                    };

                    let event = match outcome {
                        Ok(Ok(reply)) => Event::ReplyReceived { turn, reply },
                        Ok(Err(error)) => Event::ReplyFailed { turn, error },
                        Err(_) => {
                            tracing::warn!(
                                session_id = %session_id,
                                turn,
                                timeout_ms = %deadline.as_millis(),
                                "Assistant request deadline elapsed"
                            );
                            Event::ReplyFailed {
                                turn,
                                error: BackendError::timeout(format!(
                                    "No reply within {}ms",
                                    deadline.as_millis()
                                )),
                            }
                        }
                    };

                    let _ = event_tx.send(event).await;
                });
            }

            Effect::AbortRequest => {
                if let Some(token) = self.request_cancel_token.take() {
                    token.cancel();
                }
            }

            Effect::ScheduleSpeech { text, delay, turn } => {
                self.schedule(delay, Event::SpeechDue { text, turn });
            }

            Effect::ScheduleBookingReveal { turn, delay } => {
                self.schedule(delay, Event::BookingRevealDue { turn });
            }

            Effect::Speak { text } => {
                if self.input.is_listening() {
                    tracing::debug!("Skipping speech while listening");
                    return;
                }
                let was_speaking = self.output.is_speaking();
                self.output.speak(&text);
                self.publish_speaking_change(was_speaking);
            }

            Effect::CancelSpeech => {
                let was_speaking = self.output.is_speaking();
                self.output.cancel();
                self.publish_speaking_change(was_speaking);
            }

            Effect::StartListening => match self.input.start() {
                Ok(true) => self.publish(WidgetUpdate::ListeningChanged(true)),
                Ok(false) => {}
                Err(SpeechInputError::Unsupported) => {
                    self.publish(WidgetUpdate::Notice(Notice::VoiceInputUnsupported));
                }
                Err(e @ SpeechInputError::Device(_)) => {
                    tracing::warn!(error = %e, "Could not start voice input");
                }
            },

            Effect::StopListening => {
                if self.input.is_listening() {
                    self.input.stop();
                    self.publish(WidgetUpdate::ListeningChanged(false));
                }
            }

            Effect::Notify(update) => self.publish(update),
        }
    }

    /// Deliver `event` after `delay` unless the runtime shuts down first
    fn schedule(&self, delay: Duration, event: Event) {
        let event_tx = self.event_tx.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = shutdown.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    let _ = event_tx.send(event).await;
                }
            }
        });
    }

    fn publish(&self, update: WidgetUpdate) {
        // No subscribers is fine
        let _ = self.updates_tx.send(update);
    }

    fn publish_speaking_change(&self, was_speaking: bool) {
        let speaking = self.output.is_speaking();
        if speaking != was_speaking {
            self.publish(WidgetUpdate::SpeakingChanged(speaking));
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            history: self.state.history.to_vec(),
            pending_reply: self.state.pending_reply(),
            active_quick_replies: self.state.active_quick_replies().map(<[_]>::to_vec),
            booking_visible: self.state.booking_visible(),
            voice_enabled: self.state.voice_enabled,
            speaking: self.output.is_speaking(),
            listening: self.input.is_listening(),
            voice_input_supported: self.input.is_supported(),
        }
    }

    fn publish_snapshot(&self) {
        self.snapshot_tx.send_replace(self.snapshot());
    }

    /// Release devices and abandon in-flight work
    fn teardown(&mut self) {
        if let Some(token) = self.request_cancel_token.take() {
            token.cancel();
        }
        self.output.cancel();
        self.input.stop();
        self.shutdown.cancel();
        self.publish_snapshot();
    }
}
