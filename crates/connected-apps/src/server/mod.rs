//! HTTP service: callback, token and administration endpoints.

mod context;
mod error;
pub mod handlers;
pub mod transport;

pub use transport::{HttpState, create_router};

use std::net::SocketAddr;

use crate::flows::TokenManager;

/// Connected apps HTTP server.
pub struct ConnectedAppsServer {
    manager: TokenManager,
}

impl ConnectedAppsServer {
    #[must_use]
    pub const fn new(manager: TokenManager) -> Self {
        Self { manager }
    }

    /// Serve until Ctrl+C.
    ///
    /// # Errors
    ///
    /// Returns error if the port cannot be bound or the server fails.
    pub async fn run_http(self, port: u16) -> anyhow::Result<()> {
        tracing::info!(host_url = %self.manager.config().host(), "Starting connected apps server on port {}", port);

        let router = create_router(self.manager);
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        tracing::info!("HTTP server listening on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

        tracing::info!("HTTP server shut down");
        Ok(())
    }
}

impl std::fmt::Debug for ConnectedAppsServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectedAppsServer").field("manager", &self.manager).finish()
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
