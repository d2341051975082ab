//! Pong Server
//!
//! Runs the authoritative pong match over WebSocket.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use pong_server::{GameServer, ServerConfig, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env();

    info!("Pong Server v{}", VERSION);
    info!("Tick Rate: {} Hz", config.tick_rate);
    info!("Broadcast Rate: {} Hz", config.broadcast_rate);

    let match_config = config.match_config();
    let server = Arc::new(GameServer::new(config, match_config));

    let running = server.clone();
    let mut serve = tokio::spawn(async move { running.run().await });

    tokio::select! {
        result = &mut serve => {
            result??;
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Ctrl-C received, shutting down");
            server.shutdown();
            serve.await??;
        }
    }

    Ok(())
}
