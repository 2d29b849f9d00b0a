//! # Client Errors
//!
//! Failures the client can run into. None of them is fatal while the
//! controller is running: transport failures turn into a reconnect,
//! malformed payloads are dropped and a missing speech capability only
//! disables voice input.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid endpoint `{url}`: {source}")]
    InvalidEndpoint {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported endpoint scheme `{0}` (expected ws or wss)")]
    UnsupportedScheme(String),

    #[error("transport failure: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("malformed inbound payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("speech capability unavailable: {0}")]
    SpeechUnavailable(&'static str),

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}
