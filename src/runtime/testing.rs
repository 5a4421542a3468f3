//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use crate::backend::{AssistantBackend, BackendError, ChatReply, ChatRequest};
use crate::message::UserContext;
use crate::speech::{
    DeviceError, RecognitionCallbacks, RecognitionConfig, SpeechRecognizer, SpeechSynthesizer,
    UtteranceCallbacks, UtteranceRequest, Voice,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Mock Backend
// ============================================================================

/// Mock backend that returns queued replies
#[allow(dead_code)]
pub struct MockBackend {
    replies: Mutex<VecDeque<Result<ChatReply, BackendError>>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<ChatRequest>>,
}

#[allow(dead_code)]
impl MockBackend {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful reply
    pub fn queue_reply(&self, reply: ChatReply) {
        self.replies.lock().unwrap().push_back(Ok(reply));
    }

    /// Queue an error reply
    pub fn queue_error(&self, error: BackendError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_reply(&self) -> Result<ChatReply, BackendError> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::network("No mock reply queued")))
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssistantBackend for MockBackend {
    async fn send(&self, request: &ChatRequest) -> Result<ChatReply, BackendError> {
        self.requests.lock().unwrap().push(request.clone());
        self.next_reply()
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ============================================================================
// Delayed Mock Backend (for cancellation and deadline testing)
// ============================================================================

use std::time::Duration;
use tokio::sync::Notify;

/// Mock backend with configurable delay
pub struct DelayedMockBackend {
    inner: MockBackend,
    delay: Duration,
    /// Notified when request starts (for test synchronization)
    pub request_started: Arc<Notify>,
}

impl DelayedMockBackend {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MockBackend::new(),
            delay,
            request_started: Arc::new(Notify::new()),
        }
    }

    pub fn queue_reply(&self, reply: ChatReply) {
        self.inner.queue_reply(reply);
    }

    pub fn recorded_requests(&self) -> Vec<ChatRequest> {
        self.inner.recorded_requests()
    }
}

#[async_trait]
impl AssistantBackend for DelayedMockBackend {
    async fn send(&self, request: &ChatRequest) -> Result<ChatReply, BackendError> {
        self.inner.requests.lock().unwrap().push(request.clone());
        self.request_started.notify_waiters();
        tokio::time::sleep(self.delay).await;
        self.inner.next_reply()
    }

    fn name(&self) -> &str {
        "delayed-mock"
    }
}

// ============================================================================
// Fake Speech Devices
// ============================================================================

/// Synthesizer that records requests. Callbacks fire only when a test
/// drives them, unless built with [`FakeSynthesizer::auto_starting`].
pub struct FakeSynthesizer {
    voices: Vec<Voice>,
    auto_start: bool,
    spoken: Mutex<Vec<UtteranceRequest>>,
    callbacks: Mutex<Vec<UtteranceCallbacks>>,
    cancels: AtomicUsize,
}

#[allow(dead_code)]
impl FakeSynthesizer {
    pub fn new() -> Self {
        Self::with_voices(Vec::new())
    }

    pub fn with_voices(voices: Vec<Voice>) -> Self {
        Self {
            voices,
            auto_start: false,
            spoken: Mutex::new(Vec::new()),
            callbacks: Mutex::new(Vec::new()),
            cancels: AtomicUsize::new(0),
        }
    }

    /// Reports playback start as soon as an utterance is queued
    pub fn auto_starting() -> Self {
        Self {
            auto_start: true,
            ..Self::new()
        }
    }

    pub fn spoken(&self) -> Vec<UtteranceRequest> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn spoken_texts(&self) -> Vec<String> {
        self.spoken().into_iter().map(|u| u.text).collect()
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    /// Report the most recent utterance as finished
    pub fn finish_latest(&self) {
        if let Some(callbacks) = self.callbacks.lock().unwrap().last() {
            callbacks.ended();
        }
    }
}

impl Default for FakeSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechSynthesizer for FakeSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn speak(&self, request: UtteranceRequest, callbacks: UtteranceCallbacks) {
        self.spoken.lock().unwrap().push(request);
        if self.auto_start {
            callbacks.started();
        }
        self.callbacks.lock().unwrap().push(callbacks);
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

/// Recognizer driven by the test through [`FakeRecognizer::hear`] and
/// [`FakeRecognizer::fail`]
pub struct FakeRecognizer {
    refuse_with: Option<String>,
    configs: Mutex<Vec<RecognitionConfig>>,
    callbacks: Mutex<Option<RecognitionCallbacks>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

#[allow(dead_code)]
impl FakeRecognizer {
    pub fn new() -> Self {
        Self {
            refuse_with: None,
            configs: Mutex::new(Vec::new()),
            callbacks: Mutex::new(None),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        }
    }

    /// Recognizer whose `start` is refused with `code`
    pub fn failing(code: impl Into<String>) -> Self {
        Self {
            refuse_with: Some(code.into()),
            ..Self::new()
        }
    }

    pub fn last_config(&self) -> Option<RecognitionConfig> {
        self.configs.lock().unwrap().last().cloned()
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Deliver a final transcript for the current session
    pub fn hear(&self, transcript: &str) {
        if let Some(callbacks) = self.callbacks.lock().unwrap().as_ref() {
            callbacks.result(transcript);
            callbacks.ended();
        }
    }

    /// Report a recognition error for the current session
    pub fn fail(&self, code: &str) {
        if let Some(callbacks) = self.callbacks.lock().unwrap().as_ref() {
            callbacks.error(code);
            callbacks.ended();
        }
    }
}

impl Default for FakeRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechRecognizer for FakeRecognizer {
    fn start(
        &self,
        config: &RecognitionConfig,
        callbacks: RecognitionCallbacks,
    ) -> Result<(), DeviceError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if let Some(code) = &self.refuse_with {
            return Err(DeviceError(code.clone()));
        }
        self.configs.lock().unwrap().push(config.clone());
        *self.callbacks.lock().unwrap() = Some(callbacks);
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Test Runtime Builder
// ============================================================================

use crate::runtime::{spawn_chat, ChatHandle, RuntimeOptions, SessionSnapshot, SpeechDevices};
use crate::state_machine::{SessionContext, Timings, WidgetUpdate};
use tokio::sync::broadcast;

/// Delays short enough to keep tests fast
pub fn fast_timings() -> Timings {
    Timings {
        welcome_speech_delay: Duration::from_millis(10),
        reply_speech_delay: Duration::from_millis(10),
        booking_reveal_delay: Duration::from_millis(10),
    }
}

/// Helper for building test runtimes with minimal boilerplate
pub struct TestRuntime<B: AssistantBackend + 'static> {
    pub handle: ChatHandle,
    pub backend: Arc<B>,
    pub synthesizer: Option<Arc<FakeSynthesizer>>,
    pub recognizer: Option<Arc<FakeRecognizer>>,
    pub updates: broadcast::Receiver<WidgetUpdate>,
    pub runtime_handle: tokio::task::JoinHandle<()>,
}

impl TestRuntime<MockBackend> {
    /// Create a simple test runtime with instant mocks
    pub fn new() -> TestRuntimeBuilder<MockBackend> {
        TestRuntimeBuilder::new(MockBackend::new())
    }
}

pub struct TestRuntimeBuilder<B> {
    backend: B,
    synthesizer: Option<FakeSynthesizer>,
    recognizer: Option<FakeRecognizer>,
    options: RuntimeOptions,
    auto_submit: bool,
}

#[allow(dead_code)]
impl<B: AssistantBackend + 'static> TestRuntimeBuilder<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            synthesizer: Some(FakeSynthesizer::new()),
            recognizer: Some(FakeRecognizer::new()),
            options: RuntimeOptions::default(),
            auto_submit: false,
        }
    }

    pub fn synthesizer(mut self, synthesizer: FakeSynthesizer) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn without_synthesizer(mut self) -> Self {
        self.synthesizer = None;
        self
    }

    pub fn without_recognizer(mut self) -> Self {
        self.recognizer = None;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.options.request_timeout = timeout;
        self
    }

    pub fn voice_enabled(mut self, enabled: bool) -> Self {
        self.options.voice_enabled = enabled;
        self
    }

    pub fn auto_submit_transcripts(mut self) -> Self {
        self.auto_submit = true;
        self
    }

    pub fn build(self) -> TestRuntime<B> {
        let synthesizer = self.synthesizer.map(Arc::new);
        let recognizer = self.recognizer.map(Arc::new);

        let devices = SpeechDevices {
            synthesizer: synthesizer
                .clone()
                .map(|s| s as Arc<dyn SpeechSynthesizer>),
            recognizer: recognizer.clone().map(|r| r as Arc<dyn SpeechRecognizer>),
        };

        let context = SessionContext::new("test-session", UserContext::default())
            .with_timings(fast_timings())
            .with_auto_submit_transcripts(self.auto_submit);

        let backend = Arc::new(self.backend);
        let (handle, runtime_handle) = spawn_chat(context, backend.clone(), devices, self.options);
        let updates = handle.subscribe();

        TestRuntime {
            handle,
            backend,
            synthesizer,
            recognizer,
            updates,
            runtime_handle,
        }
    }
}

#[allow(dead_code)]
impl<B: AssistantBackend + 'static> TestRuntime<B> {
    /// Wait until the snapshot satisfies `pred`
    pub async fn wait_for(
        &self,
        pred: impl FnMut(&SessionSnapshot) -> bool,
        timeout: Duration,
    ) -> Option<SessionSnapshot> {
        let mut rx = self.handle.watch();
        let snapshot = match tokio::time::timeout(timeout, rx.wait_for(pred)).await {
            Ok(Ok(snapshot)) => Some(snapshot.clone()),
            _ => None,
        };
        snapshot
    }

    /// Wait for a matching update event
    pub async fn wait_for_update(
        &mut self,
        mut pred: impl FnMut(&WidgetUpdate) -> bool,
        timeout: Duration,
    ) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(50), self.updates.recv()).await {
                Ok(Ok(update)) if pred(&update) => return true,
                _ => continue,
            }
        }
        false
    }

    /// Wait until the welcome message is in place
    pub async fn wait_until_active(&self) -> SessionSnapshot {
        self.wait_for(|s| !s.history.is_empty(), WAIT)
            .await
            .expect("Session never activated")
    }

    pub fn synth(&self) -> &FakeSynthesizer {
        self.synthesizer.as_deref().expect("No synthesizer configured")
    }

    pub fn mic(&self) -> &FakeRecognizer {
        self.recognizer.as_deref().expect("No recognizer configured")
    }
}

const WAIT: Duration = Duration::from_secs(2);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{QuickReply, Sender};
    use crate::state_machine::transition::{APOLOGY_TEXT, BOOKING_CLOSED_TEXT};
    use crate::state_machine::Notice;

    #[tokio::test]
    async fn test_mock_backend() {
        let mock = MockBackend::new();
        mock.queue_reply(ChatReply::text("Hello!"));

        let request = ChatRequest {
            message: "Hi".into(),
            conversation_history: vec![],
            user_context: UserContext::default(),
        };
        let reply = mock.send(&request).await.unwrap();
        assert_eq!(reply.message, "Hello!");
        assert_eq!(mock.recorded_requests().len(), 1);

        // Empty queue surfaces as a network error
        let err = mock.send(&request).await.unwrap_err();
        assert_eq!(err.kind, crate::backend::BackendErrorKind::Network);
    }

    #[tokio::test]
    async fn test_activation_seeds_welcome_and_speaks_it() {
        let rt = TestRuntime::new().build();

        let snapshot = rt.wait_until_active().await;
        assert_eq!(snapshot.history.len(), 1);
        assert_eq!(snapshot.history[0].sender, Sender::Assistant);
        assert!(snapshot.history[0].text.contains("masterclass"));
        assert_eq!(snapshot.active_quick_replies.as_ref().map(Vec::len), Some(2));
        assert!(!snapshot.pending_reply);
        assert!(snapshot.voice_input_supported);

        let synth = rt.synthesizer.clone().unwrap();
        let deadline = tokio::time::Instant::now() + WAIT;
        while synth.spoken().is_empty() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(synth.spoken_texts(), vec![snapshot.history[0].text.clone()]);
    }

    #[tokio::test]
    async fn test_simple_turn() {
        let rt = TestRuntime::new().build();
        rt.wait_until_active().await;
        rt.backend.queue_reply(ChatReply::text("Our program runs twelve weeks."));

        rt.handle.submit("  How long is it?  ").await.unwrap();

        let snapshot = rt
            .wait_for(|s| s.history.len() == 3 && !s.pending_reply, WAIT)
            .await
            .expect("Reply never arrived");
        assert_eq!(snapshot.history[1].sender, Sender::User);
        assert_eq!(snapshot.history[1].text, "How long is it?");
        assert_eq!(snapshot.history[2].text, "Our program runs twelve weeks.");
        assert!(snapshot.active_quick_replies.is_some());

        let requests = rt.backend.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].message, "How long is it?");
        // Only the welcome precedes the utterance
        assert_eq!(requests[0].conversation_history.len(), 1);
    }

    #[tokio::test]
    async fn test_backend_quick_replies_are_used() {
        let rt = TestRuntime::new().build();
        rt.wait_until_active().await;
        let offered = vec![QuickReply::new("Yes please", "", "yes")];
        rt.backend
            .queue_reply(ChatReply::text("Want the syllabus?").with_quick_replies(offered.clone()));

        rt.handle.submit("Tell me more").await.unwrap();

        let snapshot = rt
            .wait_for(|s| s.history.len() == 3, WAIT)
            .await
            .unwrap();
        assert_eq!(snapshot.active_quick_replies, Some(offered));
    }

    #[tokio::test]
    async fn test_submit_while_pending_is_ignored() {
        let backend = DelayedMockBackend::new(Duration::from_millis(200));
        backend.queue_reply(ChatReply::text("First answer"));
        let rt = TestRuntimeBuilder::new(backend).build();
        rt.wait_until_active().await;

        rt.handle.submit("first").await.unwrap();
        rt.wait_for(|s| s.pending_reply, WAIT).await.unwrap();

        rt.handle.submit("second").await.unwrap();
        rt.handle.choose_quick_reply(0).await.unwrap();

        let snapshot = rt
            .wait_for(|s| !s.pending_reply && s.history.len() >= 3, WAIT)
            .await
            .unwrap();
        assert_eq!(snapshot.history.len(), 3);
        assert_eq!(snapshot.history[2].text, "First answer");
        assert_eq!(rt.backend.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_backend_failure_offers_retry() {
        let rt = TestRuntime::new().build();
        rt.wait_until_active().await;
        rt.backend
            .queue_error(BackendError::server_error("HTTP 500"));
        rt.backend.queue_reply(ChatReply::text("Back online."));

        rt.handle.submit("What does it cost?").await.unwrap();

        let snapshot = rt
            .wait_for(|s| s.history.len() == 3 && !s.pending_reply, WAIT)
            .await
            .unwrap();
        let last = snapshot.history.last().unwrap();
        assert!(last.is_error);
        assert_eq!(last.text, APOLOGY_TEXT);
        let retry = snapshot.active_quick_replies.unwrap();
        assert_eq!(retry.len(), 1);
        assert_eq!(retry[0].utterance(), "What does it cost?");

        // Retry resubmits the original utterance
        rt.handle.choose_quick_reply(0).await.unwrap();
        let snapshot = rt
            .wait_for(|s| s.history.len() == 5 && !s.pending_reply, WAIT)
            .await
            .unwrap();
        assert_eq!(snapshot.history[3].text, "What does it cost?");
        assert_eq!(snapshot.history[4].text, "Back online.");

        let requests = rt.backend.recorded_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].message, "What does it cost?");
    }

    #[tokio::test]
    async fn test_request_deadline_fails_turn() {
        let backend = DelayedMockBackend::new(Duration::from_secs(10));
        let rt = TestRuntimeBuilder::new(backend)
            .request_timeout(Duration::from_millis(100))
            .build();
        rt.wait_until_active().await;

        rt.handle.submit("Anyone there?").await.unwrap();

        let snapshot = rt
            .wait_for(|s| s.history.len() == 3 && !s.pending_reply, WAIT)
            .await
            .expect("Deadline never fired");
        assert!(snapshot.history[2].is_error);
        assert_eq!(
            snapshot.active_quick_replies.unwrap()[0].utterance(),
            "Anyone there?"
        );
    }

    #[tokio::test]
    async fn test_cancel_pending_drops_late_reply() {
        let backend = DelayedMockBackend::new(Duration::from_millis(150));
        backend.queue_reply(ChatReply::text("Too late"));
        let started = backend.request_started.clone();
        let rt = TestRuntimeBuilder::new(backend).build();
        rt.wait_until_active().await;

        let notified = started.notified();
        rt.handle.submit("Slow question").await.unwrap();
        tokio::time::timeout(WAIT, notified).await.unwrap();

        rt.handle.cancel_pending().await.unwrap();
        let snapshot = rt.wait_for(|s| !s.pending_reply, WAIT).await.unwrap();
        assert_eq!(snapshot.history.len(), 2);
        assert_eq!(
            snapshot.active_quick_replies.unwrap()[0].utterance(),
            "Slow question"
        );

        tokio::time::sleep(Duration::from_millis(300)).await;
        let snapshot = rt.handle.snapshot();
        assert_eq!(snapshot.history.len(), 2);
        assert!(snapshot.history.iter().all(|m| m.text != "Too late"));
    }

    #[tokio::test]
    async fn test_booking_intent_reveals_and_closes() {
        let rt = TestRuntime::new().build();
        rt.wait_until_active().await;
        rt.backend.queue_reply(ChatReply::text(
            "Great fit! Would you like to book a consultation?",
        ));

        rt.handle.submit("I want to switch careers").await.unwrap();

        let snapshot = rt
            .wait_for(|s| s.booking_visible, WAIT)
            .await
            .expect("Booking never revealed");
        assert!(snapshot.active_quick_replies.is_none());

        rt.handle.close_booking().await.unwrap();
        let snapshot = rt.wait_for(|s| !s.booking_visible, WAIT).await.unwrap();
        assert_eq!(snapshot.history.last().unwrap().text, BOOKING_CLOSED_TEXT);
        assert_eq!(snapshot.active_quick_replies.map(|r| r.len()), Some(3));
    }

    #[tokio::test]
    async fn test_toggle_voice_off_silences_output() {
        let rt = TestRuntime::new()
            .synthesizer(FakeSynthesizer::auto_starting())
            .build();
        rt.wait_for(|s| s.speaking, WAIT)
            .await
            .expect("Welcome never spoken");

        rt.handle.toggle_voice().await.unwrap();

        let snapshot = rt
            .wait_for(|s| !s.speaking && !s.voice_enabled, WAIT)
            .await
            .unwrap();
        assert!(!snapshot.voice_enabled);
        assert!(rt.synth().cancel_count() >= 1);
    }

    #[tokio::test]
    async fn test_voice_disabled_never_speaks() {
        let rt = TestRuntime::new().voice_enabled(false).build();
        rt.wait_until_active().await;
        rt.backend.queue_reply(ChatReply::text("Quiet reply"));

        rt.handle.submit("hello").await.unwrap();
        rt.wait_for(|s| s.history.len() == 3, WAIT).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(rt.synth().spoken().is_empty());
    }

    #[tokio::test]
    async fn test_speech_finishes() {
        let rt = TestRuntime::new()
            .synthesizer(FakeSynthesizer::auto_starting())
            .build();
        rt.wait_for(|s| s.speaking, WAIT).await.unwrap();

        rt.synth().finish_latest();
        rt.wait_for(|s| !s.speaking, WAIT)
            .await
            .expect("Speech never ended");
    }

    #[tokio::test]
    async fn test_listening_preempts_speech() {
        let rt = TestRuntime::new()
            .synthesizer(FakeSynthesizer::auto_starting())
            .build();
        rt.wait_for(|s| s.speaking, WAIT).await.unwrap();

        rt.handle.start_listening().await.unwrap();

        let snapshot = rt
            .wait_for(|s| s.listening, WAIT)
            .await
            .expect("Never started listening");
        assert!(!snapshot.speaking);
        assert_eq!(rt.synth().cancel_count(), 1);
        assert_eq!(rt.mic().start_count(), 1);
    }

    #[tokio::test]
    async fn test_transcript_fills_input() {
        let mut rt = TestRuntime::new().build();
        rt.wait_until_active().await;

        rt.handle.start_listening().await.unwrap();
        rt.wait_for(|s| s.listening, WAIT).await.unwrap();
        rt.mic().hear("how much does it cost");

        let got = rt
            .wait_for_update(
                |u| matches!(u, WidgetUpdate::TranscriptReady(t) if t == "how much does it cost"),
                WAIT,
            )
            .await;
        assert!(got, "Transcript never surfaced");

        let snapshot = rt.wait_for(|s| !s.listening, WAIT).await.unwrap();
        // Not submitted on its own
        assert_eq!(snapshot.history.len(), 1);
        assert!(rt.backend.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn test_transcript_auto_submits_when_configured() {
        let rt = TestRuntime::new().auto_submit_transcripts().build();
        rt.wait_until_active().await;
        rt.backend.queue_reply(ChatReply::text("It depends on the plan."));

        rt.handle.start_listening().await.unwrap();
        rt.wait_for(|s| s.listening, WAIT).await.unwrap();
        rt.mic().hear("what is the price");

        let snapshot = rt
            .wait_for(|s| s.history.len() == 3, WAIT)
            .await
            .unwrap();
        assert_eq!(snapshot.history[1].text, "what is the price");
        assert_eq!(rt.backend.recorded_requests()[0].message, "what is the price");
    }

    #[tokio::test]
    async fn test_microphone_denied_notice() {
        let mut rt = TestRuntime::new().build();
        rt.wait_until_active().await;

        rt.handle.start_listening().await.unwrap();
        rt.wait_for(|s| s.listening, WAIT).await.unwrap();
        rt.mic().fail("not-allowed");

        let got = rt
            .wait_for_update(
                |u| matches!(u, WidgetUpdate::Notice(Notice::MicrophoneDenied)),
                WAIT,
            )
            .await;
        assert!(got);
        assert!(!rt.handle.snapshot().listening);
    }

    #[tokio::test]
    async fn test_generic_recognition_error_is_silent() {
        let mut rt = TestRuntime::new().build();
        rt.wait_until_active().await;

        rt.handle.start_listening().await.unwrap();
        rt.wait_for(|s| s.listening, WAIT).await.unwrap();
        rt.mic().fail("no-speech");

        rt.wait_for(|s| !s.listening, WAIT).await.unwrap();
        let noticed = rt
            .wait_for_update(|u| matches!(u, WidgetUpdate::Notice(_)), Duration::from_millis(200))
            .await;
        assert!(!noticed);
    }

    #[tokio::test]
    async fn test_voice_input_unsupported_notice() {
        let mut rt = TestRuntime::new().without_recognizer().build();
        let snapshot = rt.wait_until_active().await;
        assert!(!snapshot.voice_input_supported);

        rt.handle.start_listening().await.unwrap();
        let got = rt
            .wait_for_update(
                |u| matches!(u, WidgetUpdate::Notice(Notice::VoiceInputUnsupported)),
                WAIT,
            )
            .await;
        assert!(got);
        assert!(!rt.handle.snapshot().listening);
    }

    #[tokio::test]
    async fn test_works_without_speech_devices() {
        let rt = TestRuntime::new()
            .without_synthesizer()
            .without_recognizer()
            .build();
        rt.wait_until_active().await;
        rt.backend.queue_reply(ChatReply::text("Text only works fine."));

        rt.handle.submit("hello").await.unwrap();
        let snapshot = rt
            .wait_for(|s| s.history.len() == 3, WAIT)
            .await
            .unwrap();
        assert!(!snapshot.speaking);
        assert!(!snapshot.listening);
    }

    #[tokio::test]
    async fn test_stop_listening() {
        let rt = TestRuntime::new().build();
        rt.wait_until_active().await;

        rt.handle.start_listening().await.unwrap();
        rt.wait_for(|s| s.listening, WAIT).await.unwrap();
        rt.handle.stop_listening().await.unwrap();

        rt.wait_for(|s| !s.listening, WAIT).await.unwrap();
        assert_eq!(rt.mic().stop_count(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_runtime() {
        let rt = TestRuntime::new().build();
        rt.wait_until_active().await;

        rt.handle.shutdown();
        tokio::time::timeout(WAIT, rt.runtime_handle)
            .await
            .expect("Runtime did not stop")
            .unwrap();

        assert!(rt.handle.submit("anyone?").await.is_err());
    }

    #[tokio::test]
    async fn test_dropping_last_handle_releases_devices() {
        let synthesizer = Arc::new(FakeSynthesizer::new());
        let recognizer = Arc::new(FakeRecognizer::new());
        let devices = SpeechDevices {
            synthesizer: Some(synthesizer.clone() as Arc<dyn SpeechSynthesizer>),
            recognizer: Some(recognizer.clone() as Arc<dyn SpeechRecognizer>),
        };
        let context = SessionContext::new("drop-session", UserContext::default())
            .with_timings(fast_timings());

        let (handle, join) = spawn_chat(context, MockBackend::new(), devices, RuntimeOptions::default());
        let other = handle.clone();
        drop(handle);

        // A surviving clone keeps the session alive
        other.submit("still here").await.unwrap();
        drop(other);

        tokio::time::timeout(WAIT, join)
            .await
            .expect("Runtime kept running without handles")
            .unwrap();
        assert_eq!(Arc::strong_count(&synthesizer), 1);
        assert_eq!(Arc::strong_count(&recognizer), 1);
    }
}
