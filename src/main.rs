//! dashfeed - JSON endpoints for a personal dashboard
//!
//! Serves transit departures, the currently playing track, weather, news
//! headlines and network time, each behind a short-lived in-memory cache.

use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;

use dashfeed::cli::Cli;
use dashfeed::config::Config;
use dashfeed::server::{router, AppState};
use dashfeed::{clock, logging};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_logging(&cli.log, cli.log_json);

    let mut config = Config::load(cli.env_file.as_deref())?;
    cli.apply(&mut config);

    if config.spotify.credentials().is_none() {
        tracing::warn!("Spotify credentials incomplete, /api/spotify will report missing credentials");
    }

    let state = AppState::from_config(&config, clock::system())?;
    let listener = TcpListener::bind(config.bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "dashfeed listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("dashfeed stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
