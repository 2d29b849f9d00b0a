//! # Chat Client
//!
//! Terminal client for a conversational backend reachable over WebSocket.
//! The [`controller::Controller`] owns the single connection and the
//! transcript; everything else feeds it events or renders what it reports.

pub mod commands;
pub mod config;
pub mod connection;
pub mod controller;
pub mod error;
pub mod speech;
pub mod state;
pub mod transcript;
pub mod view;

pub use config::{ClientArgs, ClientConfig};
pub use controller::{Controller, ControllerEvent};
pub use error::ClientError;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::connection::WsConnector;
use crate::speech::{CommandRecognizer, CommandSpeaker};
use crate::view::TerminalView;

// ─── Composition Root ───────────────────────────────────────────

/// Wires the controller to the terminal, the speech commands and the
/// network, then runs until the user quits.
pub async fn run(config: ClientConfig) {
    let (events, events_rx) = mpsc::unbounded_channel();

    let connector = WsConnector::new(config.endpoint.clone());
    let view = TerminalView::new(config.agent_name.clone());
    let speak_cmd = config.speak_cmd.clone();
    let listen_cmd = config.listen_cmd.clone();

    let mut controller = Controller::new(config, connector, view, events.clone());
    if let Some(cmd) = speak_cmd {
        info!("Speaking replies with `{}`", cmd);
        controller = controller.with_speech_output(CommandSpeaker::new(cmd));
    }
    if let Some(cmd) = listen_cmd {
        info!("Voice input through `{}`", cmd);
        controller = controller.with_speech_input(CommandRecognizer::new(cmd));
    }

    commands::spawn_stdin_reader(events.clone());

    let interrupt = events.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = interrupt.send(ControllerEvent::Shutdown);
            }
            Err(e) => warn!("Cannot listen for Ctrl-C: {}", e),
        }
    });
    drop(events);

    controller.run(events_rx).await;
}
