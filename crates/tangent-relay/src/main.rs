//! Tangent relay
//!
//! Stateless HTTP service that forwards canvas chat requests to the vendor
//! named in each request, using the API key supplied with it.

mod server;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tangent_core::{Config, Relay};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tangent-relay")]
#[command(about = "Relay chat requests from the tangent canvas to LLM providers")]
struct Cli {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    /// Port to listen on
    #[arg(short, long, default_value = "3000")]
    port: u16,
    /// Config file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let server = server::start_relay_server(Relay::new(config.relay), &cli.host, cli.port).await?;
    tracing::info!("Starting tangent relay on {}", server.address);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    server.close().await
}
