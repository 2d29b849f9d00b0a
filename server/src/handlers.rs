//! # WebSocket Handlers
//!
//! Contains the WebSocket logic of the chat server:
//! - Upgrading HTTP connections to WebSocket
//! - Managing the lifecycle of each connection (session, outbound task, cleanup)
//! - Dispatching incoming envelopes to the appropriate handler
//! - Bracketing every agent reply with typing indicators

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use chat_protocol::{ClientMessage, Decoded, ServerMessage};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::agent::AgentError;
use crate::state::{AppState, ClientTx};

/// Reply sent when the agent fails to answer.
const AGENT_FAILURE: &str = "Sorry, I had trouble processing that message.";

/// Outbound envelope with the time it was sent.
#[derive(Serialize)]
struct Stamped<'a> {
    #[serde(flatten)]
    message: &'a ServerMessage,
    timestamp: String,
}

// ─── WebSocket Upgrade Endpoint ─────────────────────────────────

/// `GET /ws`: Upgrades the HTTP connection to a WebSocket connection.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

// ─── Connection Lifecycle ───────────────────────────────────────

/// Manages the full lifecycle of a single WebSocket connection.
///
/// ## Flow:
/// 1. Open a session for this connection
/// 2. Spawn an outbound task that stamps, serializes and sends queued messages
/// 3. Greet the client with the agent's welcome message
/// 4. Process incoming messages on the current task, one at a time
/// 5. On disconnect: stop the outbound task and drop the session
async fn handle_connection(socket: WebSocket, state: AppState) {
    let session_id = state.open_session();
    info!("New connection: session {}", session_id);

    let (mut ws_sink, mut ws_stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    // ── Outbound Task ──
    let outbound_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let stamped = Stamped {
                message: &msg,
                timestamp: Utc::now().to_rfc3339(),
            };
            let text = match serde_json::to_string(&stamped) {
                Ok(t) => t,
                Err(e) => {
                    error!("Serialize error: {}", e);
                    continue;
                }
            };
            if ws_sink.send(Message::Text(text.into())).await.is_err() {
                break; // WebSocket closed; stop sending
            }
        }
    });

    let _ = tx.send(ServerMessage::Response(state.agent.welcome()));

    // ── Inbound Loop ──
    while let Some(Ok(msg)) = ws_stream.next().await {
        match msg {
            Message::Text(text) => handle_text(&state, &session_id, &tx, text.as_str()).await,
            Message::Close(_) => break,
            _ => {}
        }
    }

    // ── Cleanup on Disconnect ──
    info!("Connection closed: session {}", session_id);
    outbound_task.abort();
    state.close_session(&session_id);
}

// ─── Message Dispatcher ─────────────────────────────────────────

/// Handles a single text frame from a client.
///
/// Frames the server cannot make sense of are answered with an `error`
/// envelope rather than dropped, so the user sees what went wrong.
async fn handle_text(state: &AppState, session_id: &str, tx: &ClientTx, text: &str) {
    let message = match chat_protocol::decode::<ClientMessage>(text) {
        Ok(Decoded::Known(message)) => message,
        Ok(Decoded::Unrecognized(tag)) => {
            warn!("Unknown message type `{}` from session {}", tag, session_id);
            let _ = tx.send(ServerMessage::Error("Unknown message type".into()));
            return;
        }
        Err(e) if e.is_syntax() || e.is_eof() => {
            let _ = tx.send(ServerMessage::Error("Invalid JSON format".into()));
            return;
        }
        Err(e) => {
            error!("Error handling message: {}", e);
            let _ = tx.send(ServerMessage::Error("Error processing message".into()));
            return;
        }
    };

    match message {
        ClientMessage::Message(content) => handle_chat(state, session_id, tx, &content).await,

        ClientMessage::ClearSession => {
            state.clear_session(session_id);
            info!("Cleared session {}", session_id);
            let _ = tx.send(ServerMessage::SessionCleared(
                "Session cleared successfully".into(),
            ));
        }

        ClientMessage::GetSessionInfo => {
            if let Some(info) = state.session_info(session_id) {
                let _ = tx.send(ServerMessage::SessionInfo(info));
            }
        }
    }
}

/// Runs one user message through the agent.
///
/// The reply (or the failure notice) is always preceded by `typing: true`
/// and followed by `typing: false`.
async fn handle_chat(state: &AppState, session_id: &str, tx: &ClientTx, content: &str) {
    let content = content.trim();
    if content.is_empty() {
        let _ = tx.send(ServerMessage::Error("Empty message".into()));
        return;
    }
    info!("Received: {}", preview(content));

    let _ = tx.send(ServerMessage::Typing(true));

    match ask_agent(state, session_id, content).await {
        Ok(reply) => {
            state.record_exchange(session_id, content, &reply);
            let _ = tx.send(ServerMessage::Response(reply));
        }
        Err(e) => {
            error!("Error getting agent response: {}", e);
            let _ = tx.send(ServerMessage::Error(AGENT_FAILURE.into()));
        }
    }

    let _ = tx.send(ServerMessage::Typing(false));
}

/// Asks the agent for a reply. A blank reply counts as a failure.
async fn ask_agent(
    state: &AppState,
    session_id: &str,
    content: &str,
) -> Result<String, AgentError> {
    let history = state.history(session_id);
    let reply = state.agent.reply(&history, content).await?;
    if reply.trim().is_empty() {
        return Err(AgentError::EmptyReply);
    }
    Ok(reply)
}

/// First 50 characters of a message, for logging.
fn preview(text: &str) -> String {
    match text.char_indices().nth(50) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
