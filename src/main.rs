// src/main.rs

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use aegis_hud::config::HudConfig;

#[derive(Parser, Debug)]
#[command(name = "aegis-hud", about = "Headless HUD sync engine for the Aegis-1 gesture feed")]
struct Cli {
    /// Gesture controller WebSocket endpoint
    #[arg(long, env = "GESTURE_WS_URL")]
    url: Option<String>,

    /// Log filter (overrides HUD_LOG_LEVEL)
    #[arg(long)]
    log_level: Option<String>,
}

/// Graceful shutdown signal handler for SIGTERM and Ctrl+C
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping engine...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = HudConfig::from_env();
    if let Some(url) = cli.url {
        config.socket.endpoint = url;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.level)?)
        .init();

    info!("Starting Aegis-1 HUD sync engine");
    info!("Gesture feed: {}", config.socket.endpoint);

    let hud = aegis_hud::spawn(config.socket)?;
    let mut snapshots = hud.watch();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                info!(
                    "phase={:?} markers={} alerts={} listening={} speaking={} tool={}",
                    snapshot.phase,
                    snapshot.markers.len(),
                    snapshot.alerts.len(),
                    snapshot.is_listening,
                    snapshot.is_speaking,
                    snapshot
                        .current_tool
                        .as_ref()
                        .map(|t| t.tool.as_str())
                        .unwrap_or("-"),
                );
            }
        }
    }

    hud.shutdown().await;
    info!("Engine stopped");
    Ok(())
}
