//! HTTP server bootstrap shared by the node and balancer roles

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {reason}")]
    BindError { addr: String, reason: String },

    #[error("Server error: {0}")]
    ServeError(String),
}

/// Attach request tracing to a router
pub fn with_tracing(router: Router) -> Router {
    router.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Bind `addr` and serve `router` until `shutdown` resolves
pub async fn serve(
    router: Router,
    addr: &str,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::BindError {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;

    let local: Option<SocketAddr> = listener.local_addr().ok();
    tracing::info!(address = ?local, "Listening (with graceful shutdown)");

    axum::serve(listener, with_tracing(router))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServerError::ServeError(e.to_string()))?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl-C
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
