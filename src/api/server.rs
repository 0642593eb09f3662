//! API server lifecycle: starts/stops the axum HTTP server.
//!
//! Flow: bind → spawn background task → return handle with shutdown channel.
//! `serve` is the foreground variant used by the binary; it stops on Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::oneshot;

use crate::api::router::api_router;
use crate::app_state::AppState;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Handle to a running API server.
pub struct ApiServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl ApiServer {
    /// Shut down the server gracefully.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("API server shutdown signal sent");
        }
    }
}

async fn bind(addr: SocketAddr) -> Result<tokio::net::TcpListener, ServerError> {
    tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

/// Start the API server in a background task.
pub async fn start_api_server(
    state: Arc<AppState>,
    addr: SocketAddr,
) -> Result<ApiServer, ServerError> {
    let listener = bind(addr).await?;
    let addr = listener.local_addr()?;
    let app = api_router(state);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("API server received shutdown signal");
        };

        tracing::info!(%addr, "API server started");

        if let Err(e) = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal)
        .await
        {
            tracing::error!("API server error: {e}");
        }

        tracing::info!("API server stopped");
    });

    Ok(ApiServer {
        addr,
        shutdown_tx: Some(shutdown_tx),
    })
}

/// Serve on the configured address until Ctrl-C.
pub async fn serve(state: Arc<AppState>) -> Result<(), ServerError> {
    let listener = bind(state.config.bind_addr).await?;
    let addr = listener.local_addr()?;
    let app = api_router(state);

    tracing::info!(%addr, "Listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown requested");
    })
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}
