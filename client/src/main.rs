use anyhow::Context;
use chat_client::{ClientArgs, ClientConfig};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout belongs to the transcript.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "chat_client=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = ClientArgs::parse();
    let config = ClientConfig::try_from(args).context("invalid client configuration")?;

    chat_client::run(config).await;
    Ok(())
}
