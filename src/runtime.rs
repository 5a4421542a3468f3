//! Runtime for executing a chat session
//!
//! [`spawn_chat`] starts a [`ChatRuntime`] task that owns the session state,
//! the speech adapters and the backend client. Callers drive it through a
//! [`ChatHandle`] and observe it through snapshots and update events.

mod executor;

#[cfg(test)]
pub mod testing;

pub use executor::ChatRuntime;

use crate::backend::AssistantBackend;
use crate::message::{Message, QuickReply};
use crate::speech::{SpeechRecognizer, SpeechSynthesizer};
use crate::state_machine::{Event, SessionContext, WidgetUpdate};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::{CancellationToken, DropGuard};

/// Read model of the session for presentation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    pub history: Vec<Message>,
    pub pending_reply: bool,
    pub active_quick_replies: Option<Vec<QuickReply>>,
    pub booking_visible: bool,
    pub voice_enabled: bool,
    pub speaking: bool,
    pub listening: bool,
    pub voice_input_supported: bool,
}

/// Optional host speech capabilities
#[derive(Clone, Default)]
pub struct SpeechDevices {
    pub synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    pub recognizer: Option<Arc<dyn SpeechRecognizer>>,
}

/// Runtime knobs that are not part of the pure session context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeOptions {
    /// Deadline for one backend request
    pub request_timeout: Duration,
    pub voice_enabled: bool,
    /// Seed the welcome message as soon as the runtime starts
    pub activate_on_start: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            voice_enabled: true,
            activate_on_start: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Chat runtime has stopped")]
pub struct RuntimeClosed;

/// Handle to interact with a running chat session.
///
/// The runtime shuts down once the last clone is dropped.
#[derive(Clone)]
pub struct ChatHandle {
    event_tx: mpsc::Sender<Event>,
    updates_tx: broadcast::Sender<WidgetUpdate>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    shutdown: CancellationToken,
    _shutdown_on_drop: Arc<DropGuard>,
}

impl ChatHandle {
    async fn send(&self, event: Event) -> Result<(), RuntimeClosed> {
        self.event_tx.send(event).await.map_err(|_| RuntimeClosed)
    }

    /// Seed the session. Only needed when `activate_on_start` is off.
    pub async fn activate(&self) -> Result<(), RuntimeClosed> {
        self.send(Event::Activate).await
    }

    pub async fn submit(&self, text: impl Into<String>) -> Result<(), RuntimeClosed> {
        self.send(Event::UserSubmit { text: text.into() }).await
    }

    pub async fn choose_quick_reply(&self, index: usize) -> Result<(), RuntimeClosed> {
        self.send(Event::ChooseQuickReply { index }).await
    }

    pub async fn close_booking(&self) -> Result<(), RuntimeClosed> {
        self.send(Event::CloseBooking).await
    }

    pub async fn toggle_voice(&self) -> Result<(), RuntimeClosed> {
        self.send(Event::ToggleVoice).await
    }

    pub async fn start_listening(&self) -> Result<(), RuntimeClosed> {
        self.send(Event::StartListening).await
    }

    pub async fn stop_listening(&self) -> Result<(), RuntimeClosed> {
        self.send(Event::StopListening).await
    }

    pub async fn cancel_pending(&self) -> Result<(), RuntimeClosed> {
        self.send(Event::CancelPending).await
    }

    /// Stop the runtime, silencing devices and dropping pending work
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WidgetUpdate> {
        self.updates_tx.subscribe()
    }

    /// Current session state
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Receiver that is notified on every state change
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }
}

/// Start a chat session on the current tokio runtime
pub fn spawn_chat<B: AssistantBackend + 'static>(
    context: SessionContext,
    backend: B,
    devices: SpeechDevices,
    options: RuntimeOptions,
) -> (ChatHandle, tokio::task::JoinHandle<()>) {
    let (event_tx, event_rx) = mpsc::channel(32);
    let (updates_tx, _) = broadcast::channel(128);
    let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());
    let shutdown = CancellationToken::new();

    let runtime = ChatRuntime::new(
        context,
        backend,
        devices,
        options,
        event_rx,
        event_tx.clone(),
        updates_tx.clone(),
        snapshot_tx,
        shutdown.clone(),
    );

    let join = tokio::spawn(async move {
        runtime.run().await;
    });

    let handle = ChatHandle {
        event_tx,
        updates_tx,
        snapshot_rx,
        _shutdown_on_drop: Arc::new(shutdown.clone().drop_guard()),
        shutdown,
    };
    (handle, join)
}
