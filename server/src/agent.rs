//! # Agent
//!
//! The reply generator behind the WebSocket endpoint. The server only needs
//! a welcome line and one reply per user message; [`EchoAgent`] provides
//! both deterministically so the client can be exercised without a model.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::state::Turn;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent unavailable: {0}")]
    Unavailable(String),

    #[error("agent returned an empty reply")]
    EmptyReply,
}

#[async_trait]
pub trait Agent: Send + Sync {
    /// First message sent on every new connection.
    fn welcome(&self) -> String;

    /// Produces the reply to `message`, given the earlier turns of the session.
    async fn reply(&self, history: &[Turn], message: &str) -> Result<String, AgentError>;
}

/// Answers by repeating the user's message.
///
/// An optional delay simulates a model taking time to answer, which keeps
/// the typing indicator visible on the client.
pub struct EchoAgent {
    delay: Duration,
}

impl EchoAgent {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Agent for EchoAgent {
    fn welcome(&self) -> String {
        "Welcome! I'm here to help plan your perfect trip. \
         Ask me about destinations, weather, restaurants or hotels."
            .to_string()
    }

    async fn reply(&self, history: &[Turn], message: &str) -> Result<String, AgentError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let exchanged = history.len() / 2;
        Ok(match exchanged {
            0 => format!("You said: {message}"),
            n => format!("You said: {message} ({n} earlier exchanges)"),
        })
    }
}
