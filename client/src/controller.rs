//! # Connection Controller
//!
//! Owns the single backend connection and turns everything that happens to
//! it into transcript updates and view changes. Handles:
//! - Connection establishment and auto-reconnect after a fixed delay
//! - Outbound user messages (only while the connection is open)
//! - Inbound envelope dispatch (responses, typing indicator, errors)
//! - Voice input/output hand-off to the speech sinks
//!
//! Every producer (connection tasks, retry timers, stdin, speech input)
//! posts a [`ControllerEvent`] into one channel, and [`Controller::run`]
//! applies them one at a time. Connection events carry the
//! [`Generation`] of the attempt they belong to; once `connect()` has moved
//! on to a newer generation, late events from the old one are dropped.

use std::ops::ControlFlow;

use chat_protocol::{ClientMessage, Decoded, ServerMessage};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::connection::{Connection, Connector};
use crate::error::ClientError;
use crate::speech::{Silent, SpeechInput, SpeechOutput};
use crate::state::{CloseReason, ConnectionState, ConnectionStatus, Generation};
use crate::transcript::{Speaker, Transcript};
use crate::view::View;

/// Sending half of the controller's event channel.
pub type EventSender = mpsc::UnboundedSender<ControllerEvent>;

/// Outbound queue of an open connection, drained by its writer task.
pub type Link = mpsc::UnboundedSender<ClientMessage>;

/// Prefix of the agent entry shown for server-reported errors.
const ERROR_PREFIX: &str = "Sorry, there was an error: ";

#[derive(Debug)]
pub enum ControllerEvent {
    // ── Connection ──
    /// The handshake of attempt `generation` completed.
    Opened { generation: Generation, link: Link },

    /// A text frame arrived on attempt `generation`.
    Frame { generation: Generation, text: String },

    /// Attempt `generation` ended. Sent exactly once per attempt.
    Closed {
        generation: Generation,
        reason: CloseReason,
    },

    /// The reconnect delay scheduled after `generation` closed has elapsed.
    RetryDue { generation: Generation },

    // ── User ──
    /// Typed or recognised text to send.
    Submit(String),
    Reconnect,
    ClearSession,
    RequestSessionInfo,
    ToggleVoice,
    Shutdown,
}

pub struct Controller {
    config: ClientConfig,
    state: ConnectionState,
    generation: Generation,

    /// Outbound queue of the current connection; `Some` only while open.
    link: Option<Link>,

    /// Guard of the current connection attempt. Dropping it aborts the attempt.
    connection: Option<Connection>,

    transcript: Transcript,
    events: EventSender,
    connector: Box<dyn Connector>,
    view: Box<dyn View>,
    speech_out: Box<dyn SpeechOutput>,
    speech_in: Option<Box<dyn SpeechInput>>,
}

impl Controller {
    /// Creates the controller and starts the first connection attempt.
    pub fn new(
        config: ClientConfig,
        connector: impl Connector + 'static,
        view: impl View + 'static,
        events: EventSender,
    ) -> Self {
        let mut controller = Self {
            config,
            state: ConnectionState::Connecting,
            generation: Generation::default(),
            link: None,
            connection: None,
            transcript: Transcript::new(),
            events,
            connector: Box::new(connector),
            view: Box::new(view),
            speech_out: Box::new(Silent),
            speech_in: None,
        };
        controller.connect();
        controller
    }

    pub fn with_speech_output(mut self, speech_out: impl SpeechOutput + 'static) -> Self {
        self.speech_out = Box::new(speech_out);
        self
    }

    pub fn with_speech_input(mut self, speech_in: impl SpeechInput + 'static) -> Self {
        self.speech_in = Some(Box::new(speech_in));
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Whether the user can currently send messages.
    pub fn input_enabled(&self) -> bool {
        self.state == ConnectionState::Open
    }

    // ─── Event Loop ─────────────────────────────────────────────

    /// Applies events until a [`ControllerEvent::Shutdown`] arrives.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<ControllerEvent>) {
        while let Some(event) = events.recv().await {
            if self.handle(event).is_break() {
                break;
            }
        }
    }

    /// Applies a single event.
    pub fn handle(&mut self, event: ControllerEvent) -> ControlFlow<()> {
        match event {
            ControllerEvent::Opened { generation, link } => self.on_open(generation, link),
            ControllerEvent::Frame { generation, text } => {
                if generation == self.generation {
                    self.on_inbound_message(&text);
                } else {
                    debug!(%generation, "Dropping frame from superseded connection");
                }
            }
            ControllerEvent::Closed { generation, reason } => self.on_close(generation, reason),
            ControllerEvent::RetryDue { generation } => self.on_retry_due(generation),
            ControllerEvent::Submit(text) => self.send(&text),
            ControllerEvent::Reconnect => self.connect(),
            ControllerEvent::ClearSession => self.transmit(ClientMessage::ClearSession),
            ControllerEvent::RequestSessionInfo => self.transmit(ClientMessage::GetSessionInfo),
            ControllerEvent::ToggleVoice => self.toggle_voice(),
            ControllerEvent::Shutdown => {
                self.shutdown();
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    // ─── Connection Lifecycle ───────────────────────────────────

    /// Starts a new connection attempt, superseding any current one.
    pub fn connect(&mut self) {
        let was_open = self.state == ConnectionState::Open;

        self.generation = self.generation.next();
        self.state = ConnectionState::Connecting;
        self.link = None;
        self.connection = None;

        info!(generation = %self.generation, "Connecting to {}", self.config.endpoint);
        self.view
            .status_changed(&ConnectionStatus::connecting(self.config.endpoint.as_str()));
        if was_open {
            self.view.input_toggled(false);
        }

        self.connection = Some(self.connector.open(self.generation, self.events.clone()));
    }

    fn on_open(&mut self, generation: Generation, link: Link) {
        if generation != self.generation || self.state != ConnectionState::Connecting {
            debug!(%generation, current = %self.generation, "Ignoring open of superseded connection");
            return;
        }
        info!(%generation, "Connected to server!");
        self.state = ConnectionState::Open;
        self.link = Some(link);
        self.view.status_changed(&ConnectionStatus::open());
        self.view.input_toggled(true);
    }

    fn on_close(&mut self, generation: Generation, reason: CloseReason) {
        if generation != self.generation || self.state == ConnectionState::Closed {
            debug!(%generation, current = %self.generation, "Ignoring close of superseded connection");
            return;
        }
        let was_open = self.state == ConnectionState::Open;
        warn!(%generation, ?reason, "Disconnected from server");

        self.state = ConnectionState::Closed;
        self.link = None;
        self.connection = None;
        if let Some(input) = self.speech_in.as_mut() {
            input.stop();
        }

        self.view.status_changed(&ConnectionStatus::closed(&reason));
        if was_open {
            self.view.input_toggled(false);
        }
        self.schedule_retry(generation);
    }

    /// Arms a single retry for `generation` after the reconnect delay.
    fn schedule_retry(&self, generation: Generation) {
        let delay = self.config.reconnect_delay;
        let events = self.events.clone();
        info!("Reconnecting in {}ms...", delay.as_millis());
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The controller may be gone by now; nothing to do then.
            let _ = events.send(ControllerEvent::RetryDue { generation });
        });
    }

    fn on_retry_due(&mut self, generation: Generation) {
        if generation != self.generation || self.state != ConnectionState::Closed {
            debug!(%generation, state = ?self.state, "Retry no longer needed");
            return;
        }
        self.connect();
    }

    // ─── Outbound ───────────────────────────────────────────────

    /// Sends user text. A no-op for blank text or while not connected.
    pub fn send(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let Some(link) = self.open_link() else {
            debug!("Not connected; message dropped");
            return;
        };

        let entry = self.transcript.push(Speaker::User, text);
        self.view.entry_added(entry);
        if link.send(ClientMessage::Message(text.to_string())).is_err() {
            warn!("Outbound queue closed; message not delivered");
        }
    }

    /// Sends a control envelope under the same precondition as [`send`](Self::send).
    fn transmit(&mut self, message: ClientMessage) {
        let Some(link) = self.open_link() else {
            debug!(?message, "Not connected; request dropped");
            return;
        };
        if link.send(message).is_err() {
            warn!("Outbound queue closed; request not delivered");
        }
    }

    fn open_link(&self) -> Option<Link> {
        match self.state {
            ConnectionState::Open => self.link.clone(),
            _ => None,
        }
    }

    // ─── Inbound ────────────────────────────────────────────────

    /// Handles one inbound text frame.
    ///
    /// Malformed frames are logged and dropped; unknown tags are ignored.
    pub fn on_inbound_message(&mut self, text: &str) {
        let message = match parse_inbound(text) {
            Ok(Decoded::Known(message)) => message,
            Ok(Decoded::Unrecognized(tag)) => {
                debug!(tag, "Ignoring unrecognized envelope");
                return;
            }
            Err(e) => {
                warn!("{e}");
                return;
            }
        };

        match message {
            ServerMessage::Response(content) => {
                self.clear_typing();
                self.append(Speaker::Agent, &content);
                if !self.config.embedded {
                    self.speech_out.speak(&content);
                }
            }
            ServerMessage::Typing(true) => {
                if self.transcript.show_typing() {
                    self.view.typing_changed(true);
                }
            }
            ServerMessage::Typing(false) => self.clear_typing(),
            ServerMessage::Error(content) => {
                self.clear_typing();
                self.append(Speaker::Agent, &format!("{ERROR_PREFIX}{content}"));
            }
            ServerMessage::SessionCleared(content) => self.append(Speaker::System, &content),
            ServerMessage::SessionInfo(session) => {
                info!(
                    session_id = %session.session_id,
                    message_count = session.message_count,
                    started_at = %session.started_at,
                    "Session info"
                );
            }
        }
    }

    fn append(&mut self, speaker: Speaker, text: &str) {
        let entry = self.transcript.push(speaker, text);
        self.view.entry_added(entry);
    }

    fn clear_typing(&mut self) {
        if self.transcript.clear_typing() {
            self.view.typing_changed(false);
        }
    }

    // ─── Voice ──────────────────────────────────────────────────

    fn toggle_voice(&mut self) {
        if self.state != ConnectionState::Open {
            debug!("Voice input is disabled while not connected");
            return;
        }
        let Some(input) = self.speech_in.as_mut() else {
            let err = ClientError::SpeechUnavailable("no speech-to-text command configured");
            warn!("{err}");
            self.view.notice(&err.to_string());
            return;
        };

        if input.is_listening() {
            input.stop();
            self.view.notice("Stopped listening");
            return;
        }
        match input.start(self.events.clone()) {
            Ok(()) => self.view.notice("Listening..."),
            Err(e) => {
                warn!("Voice input failed: {e}");
                self.view.notice(&e.to_string());
            }
        }
    }

    fn shutdown(&mut self) {
        info!("Shutting down");
        self.speech_out.cancel();
        if let Some(input) = self.speech_in.as_mut() {
            input.stop();
        }
        self.link = None;
        self.connection = None;
    }
}

fn parse_inbound(text: &str) -> Result<Decoded<ServerMessage>, ClientError> {
    Ok(chat_protocol::decode::<ServerMessage>(text)?)
}
