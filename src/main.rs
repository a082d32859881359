mod config;
mod events;
mod frame;
mod routes;
mod services;
mod state;

use tokio::signal;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt::init();

    if let Err(e) = dotenvy::dotenv() {
        debug!(error = %e, "no .env file loaded");
    }

    let config = config::RelayConfig::from_env();
    let bind = (config.bind_addr, config.port);
    let static_dir = config.static_dir.clone();
    let state = state::AppState::new(config);

    // Spawn the presence snapshot broadcaster.
    let snapshots = services::presence::spawn_snapshot_task(state.clone());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;

    info!(addr = %listener.local_addr()?, static_dir = %static_dir.display(), "presence relay listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    snapshots.abort();
    info!("presence relay shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}
