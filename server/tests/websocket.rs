//! End-to-end tests of the chat server using a real WebSocket client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chat_server::agent::{Agent, AgentError, EchoAgent};
use chat_server::state::{AppState, Turn};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Boot a server on an ephemeral port and return its WebSocket URL.
async fn boot_server(agent: impl Agent + 'static) -> String {
    let app = chat_server::router(AppState::new(Arc::new(agent)));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("ws://{addr}/ws")
}

/// Connects and consumes the welcome message.
async fn connect(url: &str) -> WsStream {
    let (mut ws, _) = connect_async(url).await.unwrap();
    let welcome = recv(&mut ws).await;
    assert_eq!(welcome["type"], "response");
    ws
}

async fn recv(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next()).await.unwrap().unwrap().unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Receives a frame and drops its timestamp.
async fn recv_envelope(ws: &mut WsStream) -> Value {
    let mut value = recv(ws).await;
    let stamp = value
        .as_object_mut()
        .unwrap()
        .remove("timestamp")
        .expect("every envelope is stamped");
    assert!(chrono::DateTime::parse_from_rfc3339(stamp.as_str().unwrap()).is_ok());
    value
}

async fn send(ws: &mut WsStream, frame: &str) {
    ws.send(Message::Text(frame.to_owned().into())).await.unwrap();
}

struct BrokenAgent;

#[async_trait]
impl Agent for BrokenAgent {
    fn welcome(&self) -> String {
        "hello".into()
    }

    async fn reply(&self, _history: &[Turn], _message: &str) -> Result<String, AgentError> {
        Err(AgentError::Unavailable("model offline".into()))
    }
}

#[tokio::test]
async fn greets_every_new_connection() {
    let url = boot_server(EchoAgent::new(Duration::ZERO)).await;
    let (mut ws, _) = connect_async(&url).await.unwrap();
    let welcome = recv_envelope(&mut ws).await;
    assert_eq!(welcome["type"], "response");
    assert!(welcome["content"].as_str().unwrap().starts_with("Welcome!"));
}

#[tokio::test]
async fn replies_are_bracketed_by_typing_indicators() {
    let url = boot_server(EchoAgent::new(Duration::from_millis(20))).await;
    let mut ws = connect(&url).await;

    send(&mut ws, r#"{"type":"message","content":"  Tokyo in spring?  "}"#).await;
    assert_eq!(recv_envelope(&mut ws).await, json!({"type": "typing", "content": true}));
    assert_eq!(
        recv_envelope(&mut ws).await,
        json!({"type": "response", "content": "You said: Tokyo in spring?"})
    );
    assert_eq!(recv_envelope(&mut ws).await, json!({"type": "typing", "content": false}));
}

#[tokio::test]
async fn rejects_frames_it_cannot_handle() {
    let url = boot_server(EchoAgent::new(Duration::ZERO)).await;
    let mut ws = connect(&url).await;

    send(&mut ws, r#"{"type":"message","content":"   "}"#).await;
    assert_eq!(recv_envelope(&mut ws).await, json!({"type": "error", "content": "Empty message"}));

    send(&mut ws, r#"{"type":"message"}"#).await;
    assert_eq!(recv_envelope(&mut ws).await, json!({"type": "error", "content": "Empty message"}));

    send(&mut ws, "{not json").await;
    assert_eq!(
        recv_envelope(&mut ws).await,
        json!({"type": "error", "content": "Invalid JSON format"})
    );

    send(&mut ws, r#"{"type":"teleport","content":"Mars"}"#).await;
    assert_eq!(
        recv_envelope(&mut ws).await,
        json!({"type": "error", "content": "Unknown message type"})
    );

    send(&mut ws, r#"{"type":"message","content":42}"#).await;
    assert_eq!(
        recv_envelope(&mut ws).await,
        json!({"type": "error", "content": "Error processing message"})
    );
}

#[tokio::test]
async fn agent_failures_become_error_envelopes() {
    let url = boot_server(BrokenAgent).await;
    let mut ws = connect(&url).await;

    send(&mut ws, r#"{"type":"message","content":"hi"}"#).await;
    assert_eq!(recv_envelope(&mut ws).await, json!({"type": "typing", "content": true}));
    assert_eq!(
        recv_envelope(&mut ws).await,
        json!({"type": "error", "content": "Sorry, I had trouble processing that message."})
    );
    assert_eq!(recv_envelope(&mut ws).await, json!({"type": "typing", "content": false}));
}

#[tokio::test]
async fn session_can_be_inspected_and_cleared() {
    let url = boot_server(EchoAgent::new(Duration::ZERO)).await;
    let mut ws = connect(&url).await;

    send(&mut ws, r#"{"type":"message","content":"Kyoto"}"#).await;
    for _ in 0..3 {
        let _ = recv(&mut ws).await;
    }

    send(&mut ws, r#"{"type":"get_session_info"}"#).await;
    let info = recv_envelope(&mut ws).await;
    assert_eq!(info["type"], "session_info");
    assert_eq!(info["content"]["message_count"], 2);
    let session_id = info["content"]["session_id"].as_str().unwrap().to_string();

    send(&mut ws, r#"{"type":"clear_session"}"#).await;
    assert_eq!(
        recv_envelope(&mut ws).await,
        json!({"type": "session_cleared", "content": "Session cleared successfully"})
    );

    send(&mut ws, r#"{"type":"get_session_info"}"#).await;
    let info = recv_envelope(&mut ws).await;
    assert_eq!(info["content"]["message_count"], 0);
    assert_eq!(info["content"]["session_id"], session_id.as_str());
}

#[tokio::test]
async fn each_connection_is_its_own_session() {
    let url = boot_server(EchoAgent::new(Duration::ZERO)).await;
    let mut first = connect(&url).await;
    let mut second = connect(&url).await;

    send(&mut first, r#"{"type":"message","content":"Oslo"}"#).await;
    for _ in 0..3 {
        let _ = recv(&mut first).await;
    }

    send(&mut second, r#"{"type":"get_session_info"}"#).await;
    let info = recv_envelope(&mut second).await;
    assert_eq!(info["content"]["message_count"], 0);
}
