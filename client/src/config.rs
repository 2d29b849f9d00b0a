//! # Client Configuration
//!
//! Command-line flags (with environment fallbacks) and the validated
//! [`ClientConfig`] the rest of the client is built from.

use std::time::Duration;

use clap::Parser;
use url::Url;

use crate::error::ClientError;

/// Default backend endpoint. Used when neither `--url` nor `CHAT_URL` is set.
pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:8080/ws";

/// How long to wait before reconnecting after the connection is lost.
pub const RECONNECT_DELAY_MS: u64 = 5000;

/// Name shown in the typing placeholder when none is configured.
pub const DEFAULT_AGENT_NAME: &str = "Travel Agent";

#[derive(Debug, Parser)]
#[command(name = "chat", version, about = "Chat with a conversational backend over WebSocket")]
pub struct ClientArgs {
    /// WebSocket endpoint of the backend.
    #[arg(long, env = "CHAT_URL", default_value = DEFAULT_SERVER_URL)]
    pub url: String,

    /// Delay before an automatic reconnect, in milliseconds.
    #[arg(long, default_value_t = RECONNECT_DELAY_MS)]
    pub reconnect_delay_ms: u64,

    /// Running inside a host application: replies are not spoken aloud.
    #[arg(long)]
    pub embedded: bool,

    /// Text-to-speech command; the reply is passed as its last argument.
    #[arg(long, env = "CHAT_SPEAK_CMD")]
    pub speak_cmd: Option<String>,

    /// Speech-to-text command; its last non-empty stdout line is sent as a message.
    #[arg(long, env = "CHAT_LISTEN_CMD")]
    pub listen_cmd: Option<String>,

    /// Name shown while the agent is composing a reply.
    #[arg(long, default_value = DEFAULT_AGENT_NAME)]
    pub agent_name: String,
}

/// Validated client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: Url,
    pub reconnect_delay: Duration,

    /// Suppresses spoken replies.
    pub embedded: bool,
    pub speak_cmd: Option<String>,
    pub listen_cmd: Option<String>,
    pub agent_name: String,
}

impl ClientConfig {
    /// Configuration pointing at `endpoint` with every other setting at its default.
    pub fn new(endpoint: &str) -> Result<Self, ClientError> {
        Ok(Self {
            endpoint: parse_endpoint(endpoint)?,
            reconnect_delay: Duration::from_millis(RECONNECT_DELAY_MS),
            embedded: false,
            speak_cmd: None,
            listen_cmd: None,
            agent_name: DEFAULT_AGENT_NAME.to_string(),
        })
    }
}

impl TryFrom<ClientArgs> for ClientConfig {
    type Error = ClientError;

    fn try_from(args: ClientArgs) -> Result<Self, Self::Error> {
        Ok(Self {
            endpoint: parse_endpoint(&args.url)?,
            reconnect_delay: Duration::from_millis(args.reconnect_delay_ms),
            embedded: args.embedded,
            speak_cmd: args.speak_cmd.filter(|c| !c.trim().is_empty()),
            listen_cmd: args.listen_cmd.filter(|c| !c.trim().is_empty()),
            agent_name: args.agent_name,
        })
    }
}

fn parse_endpoint(raw: &str) -> Result<Url, ClientError> {
    let url = Url::parse(raw).map_err(|source| ClientError::InvalidEndpoint {
        url: raw.to_string(),
        source,
    })?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(ClientError::UnsupportedScheme(other.to_string())),
    }
}
