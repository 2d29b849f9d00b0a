//! # Connection State
//!
//! Types describing the single backend connection:
//! - [`ConnectionState`]: where the connection is in its lifecycle
//! - [`Generation`]: identity of one connection attempt
//! - [`CloseReason`]: why an attempt ended, used for the status text

use std::fmt;

// ─── Lifecycle ──────────────────────────────────────────────────

/// Lifecycle of the backend connection.
///
/// ```text
/// Connecting ──handshake ok──▶ Open ──close / error──▶ Closed
///     │                                                  │
///     └──────────handshake failed──────────▶ Closed ◀────┘
/// Closed ──reconnect delay──▶ Connecting
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// Identity of one connection attempt.
///
/// Every call to `connect()` bumps the generation. Events and retry timers
/// are stamped with the generation they belong to, so anything arriving
/// from a superseded attempt can be recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why a connection attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The handshake never completed.
    HandshakeFailed(String),

    /// The server closed the connection or the stream ended.
    Remote,

    /// Reading from an open connection failed.
    Transport(String),
}

// ─── Status Text ────────────────────────────────────────────────

/// Human-readable connection status, shown by the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub text: String,
}

impl ConnectionStatus {
    pub fn connecting(endpoint: &str) -> Self {
        Self {
            state: ConnectionState::Connecting,
            text: format!("Connecting to {endpoint}..."),
        }
    }

    pub fn open() -> Self {
        Self {
            state: ConnectionState::Open,
            text: "Connected! Agent ready".to_string(),
        }
    }

    pub fn closed(reason: &CloseReason) -> Self {
        let text = match reason {
            CloseReason::HandshakeFailed(e) => format!("Failed to connect: {e}"),
            CloseReason::Remote => "Disconnected from agent".to_string(),
            CloseReason::Transport(e) => format!("Connection error occurred: {e}"),
        };
        Self {
            state: ConnectionState::Closed,
            text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generations_increase() {
        let first = Generation::default().next();
        let second = first.next();
        assert!(second > first);
        assert_eq!(second.to_string(), "#2");
    }

    #[test]
    fn closed_status_names_the_failure() {
        let status = ConnectionStatus::closed(&CloseReason::HandshakeFailed("refused".into()));
        assert_eq!(status.state, ConnectionState::Closed);
        assert_eq!(status.text, "Failed to connect: refused");
        assert_eq!(
            ConnectionStatus::closed(&CloseReason::Remote).text,
            "Disconnected from agent"
        );
    }
}
