//! Mission Control API server.
//!
//! # Environment Variables
//!
//! - `STORAGE_MODE`, `DATABASE_URL`, `SEED_FILE`: see `RepositoryConfig`
//! - `HOST`: bind address (default `0.0.0.0`)
//! - `PORT`: bind port (default `3001`)
//! - `RUST_LOG`: log filter (default `mission_control=debug,tower_http=debug`)

use std::env;
use std::net::SocketAddr;
use std::process::ExitCode;

use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mission_control::api::{AppState, create_router};
use mission_control::infrastructure::{RepositoryConfig, RepositoryFactory, seed_if_empty};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3001;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mission_control=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Mission Control API");

    let config = match RepositoryConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            tracing::error!("Configuration error: {}", error);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        storage_mode = ?config.storage_mode,
        seed_file = ?config.seed_file,
        "Repository configuration loaded"
    );

    let seed_file = config.seed_file.clone();
    let task_repository = match RepositoryFactory::new(config).create().await {
        Ok(repository) => repository,
        Err(error) => {
            tracing::error!("Failed to initialize task storage: {}", error);
            return ExitCode::FAILURE;
        }
    };

    if let Some(path) = seed_file
        && let Err(error) = seed_if_empty(task_repository.as_ref(), &path).await
    {
        tracing::error!(%error, path = %path.display(), "Failed to seed initial data");
    }

    let application = create_router(AppState::new(task_repository));

    let address = match server_address() {
        Ok(address) => address,
        Err(message) => {
            tracing::error!("{}", message);
            return ExitCode::FAILURE;
        }
    };

    let listener = match TcpListener::bind(address).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(%error, "Failed to bind to address {}", address);
            return ExitCode::FAILURE;
        }
    };

    match listener.local_addr() {
        Ok(address) => tracing::info!("Listening on {}", address),
        Err(error) => tracing::warn!(%error, "Could not determine local address"),
    }

    if let Err(error) = axum::serve(listener, application)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(%error, "Server error");
        return ExitCode::FAILURE;
    }

    tracing::info!("Server shutdown complete");
    ExitCode::SUCCESS
}

/// Reads `HOST` and `PORT`, falling back to the defaults when unset.
fn server_address() -> Result<SocketAddr, String> {
    let host = env::var("HOST")
        .ok()
        .filter(|host| !host.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = match env::var("PORT") {
        Ok(port) if !port.trim().is_empty() => port
            .trim()
            .parse::<u16>()
            .map_err(|error| format!("Invalid PORT '{port}': {error}"))?,
        _ => DEFAULT_PORT,
    };

    format!("{host}:{port}")
        .parse()
        .map_err(|error| format!("Invalid server address {host}:{port}: {error}"))
}

/// Completes when SIGINT (Ctrl+C) or, on Unix, SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::warn!(%error, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::warn!(%error, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
