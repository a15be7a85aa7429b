use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use ircbridge::config;
use ircbridge::logging;
use ircbridge::relay::RelayServer;

#[tokio::main]
async fn main() -> Result<()> {
    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let cfg = config::load_relay_config(path.as_deref())?;
    logging::init_tracing(&cfg.log_level);

    let server = RelayServer::bind(&cfg)
        .await
        .context("Failed to start relay listeners")?;
    info!(version = %cfg.version, "relay running");

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }
    Ok(())
}
