use std::sync::Arc;

use anyhow::Context;
use chat_server::agent::EchoAgent;
use chat_server::config::ServerArgs;
use chat_server::state::AppState;
use clap::Parser;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_server=info".into()),
        )
        .init();

    let args = ServerArgs::parse();
    let state = AppState::new(Arc::new(EchoAgent::new(args.reply_delay())));
    let app = chat_server::router(state);

    let addr = args.addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Chat server listening on {}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
