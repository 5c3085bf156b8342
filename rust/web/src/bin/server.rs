//! Standalone game server binary
//!
//! Usage: cargo run -p tictac_web --bin tictac-server -- --port 8080

use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;
use tictac_web::{init_logging, ServerConfig, Settings, WebServer, CONFIG_PATH_VAR};

#[derive(Debug, Parser)]
#[command(name = "tictac-server", about = "Two-player tic-tac-toe room server")]
struct Args {
    /// Address to bind
    #[arg(long)]
    host: Option<IpAddr>,
    /// Port to bind, 0 picks a free port
    #[arg(long, short)]
    port: Option<u16>,
    /// TOML settings file, overrides TICTAC_CONFIG
    #[arg(long, short)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(|| {
        std::env::var(CONFIG_PATH_VAR)
            .ok()
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    });
    let mut settings = Settings::from_sources(config_path.as_deref(), |key| std::env::var(key).ok())?;
    if let Some(host) = args.host {
        settings.host = host;
    }
    if let Some(port) = args.port {
        settings.port = port;
    }

    init_logging(settings.log_format)?;

    tracing::info!(
        host = %settings.host,
        port = settings.port,
        room_ttl_secs = settings.room_ttl_secs,
        sweep_interval_secs = settings.sweep_interval_secs,
        seeded = settings.seed.is_some(),
        "starting tictac server"
    );

    let server = WebServer::new(ServerConfig::from_settings(&settings));
    let handle = server.start().await?;
    tracing::info!(address = %handle.address(), "server running, press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;

    tracing::info!("shutting down server");
    handle.shutdown().await?;
    tracing::info!("server stopped cleanly");

    Ok(())
}
