//! Undercover game server.
//!
//! - `POST /api/v1/rooms/create` opens a room
//! - `GET /api/v1/ws/join` attaches a player over WebSocket
//! - Config from `UNDERCOVER_CONFIG` (default `undercover.yaml`)

use std::net::SocketAddr;
use std::path::Path;
use std::process::ExitCode;

use tracing_subscriber::{fmt, EnvFilter};

use undercover_gateway::{app_state::AppState, config, router};

#[tokio::main]
async fn main() -> ExitCode {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "undercover-gateway failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> undercover_core::Result<()> {
    use undercover_core::UndercoverError;

    let path = config::config_path();
    let cfg = if Path::new(&path).exists() {
        config::load_from_file(&path)?
    } else {
        tracing::warn!(%path, "config file not found, using defaults");
        config::GatewayConfig::default()
    };
    let listen: SocketAddr = cfg
        .gateway
        .listen
        .parse()
        .map_err(|e| UndercoverError::BadRequest(format!("gateway.listen must be a valid SocketAddr: {e}")))?;

    let state = AppState::new(cfg)?;
    let app = router::build_router(state.clone());

    tracing::info!(%listen, "undercover-gateway starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| UndercoverError::Internal(format!("bind {listen} failed: {e}")))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            state.drain().await;
        })
        .await
        .map_err(|e| UndercoverError::Internal(format!("server failed: {e}")))?;

    tracing::info!("undercover-gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
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
    tracing::info!("signal received, starting graceful shutdown");
}
