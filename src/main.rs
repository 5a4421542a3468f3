//! Coach chat - terminal front end
//!
//! Talks to the assistant backend through the chat runtime. Lines typed on
//! stdin are sent as messages; a few slash commands drive the widget.

use coach_chat::backend::{HttpAssistantBackend, LoggingBackend};
use coach_chat::message::{Sender, UserContext};
use coach_chat::state_machine::{PromptSurface, SessionContext, WidgetUpdate};
use coach_chat::{spawn_chat, ChatHandle, SpeechDevices, WidgetConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging; stdout belongs to the conversation
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coach_chat=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Configuration
    let config = WidgetConfig::from_env()?;
    let user = UserContext::from_env();

    let backend = LoggingBackend::new(HttpAssistantBackend::new(
        config.backend_url.clone(),
        config.request_timeout,
    )?);

    let session_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(
        session_id = %session_id,
        backend = %config.backend_url,
        topic = %user.masterclass_topic,
        "Starting coach chat"
    );

    let context = SessionContext::new(session_id, user)
        .with_timings(config.timings)
        .with_auto_submit_transcripts(config.auto_submit_transcripts);

    // No speech devices in a terminal; activate once the renderer listens
    let mut options = config.runtime_options();
    options.activate_on_start = false;
    let (handle, runtime) = spawn_chat(context, backend, SpeechDevices::default(), options);

    let renderer = tokio::spawn(render_updates(handle.subscribe()));
    handle.activate().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match Command::parse(&line) {
            Some(Command::Quit) => break,
            Some(command) => dispatch(&handle, command).await?,
            None => {}
        }
    }

    handle.shutdown();
    runtime.await?;
    renderer.abort();
    Ok(())
}

/// One line of terminal input
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Say(String),
    /// 1-based index as shown on screen
    QuickReply(usize),
    CloseBooking,
    ToggleVoice,
    Cancel,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Some(Command::Say(line.to_string()));
        };
        match rest {
            "close" => Some(Command::CloseBooking),
            "voice" => Some(Command::ToggleVoice),
            "cancel" => Some(Command::Cancel),
            "quit" | "exit" => Some(Command::Quit),
            other => match other.parse::<usize>() {
                Ok(n) if n > 0 => Some(Command::QuickReply(n)),
                _ => Some(Command::Say(line.to_string())),
            },
        }
    }
}

async fn dispatch(
    handle: &ChatHandle,
    command: Command,
) -> Result<(), coach_chat::runtime::RuntimeClosed> {
    match command {
        Command::Say(text) => handle.submit(text).await,
        Command::QuickReply(n) => handle.choose_quick_reply(n - 1).await,
        Command::CloseBooking => handle.close_booking().await,
        Command::ToggleVoice => handle.toggle_voice().await,
        Command::Cancel => handle.cancel_pending().await,
        Command::Quit => Ok(()),
    }
}

async fn render_updates(mut updates: broadcast::Receiver<WidgetUpdate>) {
    loop {
        match updates.recv().await {
            Ok(update) => render(&update),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Renderer fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn render(update: &WidgetUpdate) {
    match update {
        WidgetUpdate::MessageAppended(message) => match message.sender {
            // Already on screen as typed
            Sender::User => {}
            Sender::Assistant if message.is_error => println!("coach (!)> {}", message.text),
            Sender::Assistant => println!("coach> {}", message.text),
        },
        WidgetUpdate::TypingChanged(true) => println!("  ..."),
        WidgetUpdate::PromptChanged(PromptSurface::QuickReplies(replies)) => {
            for (i, reply) in replies.iter().enumerate() {
                println!("  /{} {}", i + 1, reply.label);
            }
        }
        WidgetUpdate::PromptChanged(PromptSurface::Booking) => {
            println!("  [Pick a slot to book your call, or /close to keep chatting]");
        }
        WidgetUpdate::VoiceChanged(enabled) => {
            println!("  voice {}", if *enabled { "on" } else { "off" });
        }
        WidgetUpdate::TranscriptReady(text) => println!("  heard: {text}"),
        WidgetUpdate::Notice(notice) => println!("  ! {}", notice.text()),
        WidgetUpdate::TypingChanged(false)
        | WidgetUpdate::PromptChanged(PromptSurface::Hidden)
        | WidgetUpdate::SpeakingChanged(_)
        | WidgetUpdate::ListeningChanged(_) => {}
    }
}
