//! # Server State
//!
//! Holds the shared application state for the chat server:
//! - **Agent**: the reply generator shared by every connection
//! - **Session registry**: one session per WebSocket connection, holding
//!   its conversation history
//!
//! The registry uses [`DashMap`] because every connection is handled on
//! its own task.

use std::sync::Arc;

use chat_protocol::{ServerMessage, SessionInfo};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::agent::Agent;

/// Number of most recent exchanges a session remembers.
pub const HISTORY_WINDOW: usize = 10;

/// Unbounded sender used to push messages to a client's outbound queue.
pub type ClientTx = mpsc::UnboundedSender<ServerMessage>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Agent,
}

/// One message of a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug)]
pub struct Session {
    pub history: Vec<Turn>,
    pub started_at: DateTime<Utc>,
}

/// Shared application state, cloned into each request handler.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<dyn Agent>,

    /// Active sessions, keyed by session ID.
    pub sessions: Arc<DashMap<String, Session>>,
}

impl AppState {
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self {
            agent,
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Registers a new empty session and returns its ID.
    pub fn open_session(&self) -> String {
        let session_id = Uuid::new_v4().to_string();
        self.sessions.insert(
            session_id.clone(),
            Session {
                history: Vec::new(),
                started_at: Utc::now(),
            },
        );
        session_id
    }

    pub fn close_session(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    /// Forgets the conversation but keeps the session itself.
    pub fn clear_session(&self, session_id: &str) {
        if let Some(mut session) = self.sessions.get_mut(session_id) {
            session.history.clear();
        }
    }

    /// Snapshot of the history, safe to hold across an `.await`.
    pub fn history(&self, session_id: &str) -> Vec<Turn> {
        self.sessions
            .get(session_id)
            .map(|s| s.history.clone())
            .unwrap_or_default()
    }

    /// Records one user message and the agent's reply to it, forgetting
    /// exchanges older than [`HISTORY_WINDOW`].
    pub fn record_exchange(&self, session_id: &str, message: &str, reply: &str) {
        if let Some(mut session) = self.sessions.get_mut(session_id) {
            session.history.push(Turn::new(Role::User, message));
            session.history.push(Turn::new(Role::Agent, reply));
            let excess = session.history.len().saturating_sub(HISTORY_WINDOW * 2);
            session.history.drain(..excess);
        }
    }

    pub fn session_info(&self, session_id: &str) -> Option<SessionInfo> {
        self.sessions.get(session_id).map(|s| SessionInfo {
            session_id: session_id.to_string(),
            message_count: s.history.len(),
            started_at: s.started_at.to_rfc3339(),
        })
    }
}
