//! # WebSocket Connection
//!
//! Opens one connection attempt to the backend and reports everything that
//! happens to it back to the controller as events. Each attempt:
//! 1. Performs the WebSocket handshake
//! 2. Spawns an outbound writer that serializes queued messages to JSON text
//!    frames and keeps the connection alive with periodic pings
//! 3. Forwards every inbound text frame to the controller
//! 4. Reports exactly one `Closed` event when the attempt ends, however it ends

use std::time::Duration;

use chat_protocol::ClientMessage;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{error, info, warn};
use url::Url;

use crate::controller::{ControllerEvent, EventSender};
use crate::error::ClientError;
use crate::state::{CloseReason, Generation};

/// Interval between WebSocket pings on an open connection.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

// ─── Connector Seam ─────────────────────────────────────────────

/// Starts connection attempts on behalf of the controller.
pub trait Connector: Send {
    /// Starts attempt `generation`. All of its events are posted to `events`.
    fn open(&mut self, generation: Generation, events: EventSender) -> Connection;
}

/// Guard for one connection attempt. Dropping it aborts the attempt.
#[derive(Debug)]
pub struct Connection {
    task: Option<AbortHandle>,
}

impl Connection {
    pub fn spawned(handle: JoinHandle<()>) -> Self {
        Self {
            task: Some(handle.abort_handle()),
        }
    }

    /// A guard that owns nothing, for connectors without a background task.
    pub fn detached() -> Self {
        Self { task: None }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ─── WebSocket Connector ────────────────────────────────────────

pub struct WsConnector {
    endpoint: Url,
}

impl WsConnector {
    pub fn new(endpoint: Url) -> Self {
        Self { endpoint }
    }
}

impl Connector for WsConnector {
    fn open(&mut self, generation: Generation, events: EventSender) -> Connection {
        let endpoint = self.endpoint.clone();
        Connection::spawned(tokio::spawn(run_connection(endpoint, generation, events)))
    }
}

/// Drives a single connection attempt from handshake to close.
async fn run_connection(endpoint: Url, generation: Generation, events: EventSender) {
    let ws_stream = match connect_async(endpoint.as_str()).await {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            let err = ClientError::from(e);
            error!(%generation, "Connection failed: {}", err);
            let _ = events.send(ControllerEvent::Closed {
                generation,
                reason: CloseReason::HandshakeFailed(err.to_string()),
            });
            return;
        }
    };
    info!(%generation, "Handshake with {} complete", endpoint);

    // Split the WebSocket into read and write halves
    let (mut ws_sink, mut ws_stream_rx) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ClientMessage>();

    // ── Outbound Writer ──
    // Runs until the controller drops the link or the socket fails.
    let outbound = tokio::spawn(async move {
        let mut keepalive = tokio::time::interval(KEEPALIVE_INTERVAL);
        keepalive.tick().await;
        loop {
            let frame = tokio::select! {
                msg = rx.recv() => match msg {
                    Some(msg) => match serde_json::to_string(&msg) {
                        Ok(text) => Message::Text(text.into()),
                        Err(e) => {
                            error!("Serialize error: {}", e);
                            continue;
                        }
                    },
                    None => break,
                },
                _ = keepalive.tick() => Message::Ping(Vec::new().into()),
            };
            if ws_sink.send(frame).await.is_err() {
                break;
            }
        }
        let _ = ws_sink.close().await;
    });

    if events
        .send(ControllerEvent::Opened {
            generation,
            link: tx,
        })
        .is_err()
    {
        outbound.abort();
        return;
    }

    // ── Inbound Loop ──
    // Only text frames carry envelopes; pings are answered by tungstenite.
    let reason = loop {
        match ws_stream_rx.next().await {
            Some(Ok(Message::Text(text))) => {
                let frame = ControllerEvent::Frame {
                    generation,
                    text: text.as_str().to_owned(),
                };
                if events.send(frame).is_err() {
                    outbound.abort();
                    return;
                }
            }
            Some(Ok(Message::Close(_))) | None => break CloseReason::Remote,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                let err = ClientError::from(e);
                warn!(%generation, "{}", err);
                break CloseReason::Transport(err.to_string());
            }
        }
    };

    outbound.abort();
    let _ = events.send(ControllerEvent::Closed { generation, reason });
}
