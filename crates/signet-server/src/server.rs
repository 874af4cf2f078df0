//! HTTP server lifecycle.
//!
//! Owns the listener, the middleware stack, the periodic cleanup sweep,
//! and the shutdown sequence. Shutdown order matters: the listener
//! drains first, then the sweeper stops, then the audit pipeline is
//! flushed by dropping the last emitter handle.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::Request;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use signet_auth::storage::{AuthorizationCodeStorage, TokenStorage};

use crate::bootstrap::App;

/// Errors raised by the server lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Binding or serving the listener failed.
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A configured server ready to run.
pub struct Server {
    addr: SocketAddr,
    app: App,
    cleanup_interval: Duration,
}

impl Server {
    /// Creates a server from a bound address and an assembled application.
    #[must_use]
    pub fn new(addr: SocketAddr, app: App, cleanup_interval: Duration) -> Self {
        Self {
            addr,
            app,
            cleanup_interval,
        }
    }

    /// Runs until Ctrl+C, then drains and flushes.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot bind or serving fails.
    pub async fn run(self) -> Result<(), ServerError> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!(addr = %self.addr, "Authorization server listening");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sweeper = tokio::spawn(run_cleanup(
            Arc::clone(&self.app.codes),
            Arc::clone(&self.app.tokens),
            self.cleanup_interval,
            shutdown_rx,
        ));

        let router = apply_middleware(self.app.router.clone());
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        let _ = shutdown_tx.send(true);
        if sweeper.await.is_err() {
            tracing::warn!("Cleanup task ended abnormally");
        }

        // Release every audit emitter handle so the drain task sees the
        // channel close and writes out what is still queued.
        let App {
            router,
            state,
            audit_task,
            ..
        } = self.app;
        drop(router);
        drop(state);
        if audit_task.await.is_err() {
            tracing::warn!("Audit drain task ended abnormally");
        }

        tracing::info!("Shutdown complete");
        Ok(())
    }
}

/// Wraps the application routes with the HTTP middleware stack.
pub fn apply_middleware(router: Router) -> Router {
    router
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::info_span!(
                    "http.request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
}

/// Periodically deletes expired authorization codes and tokens.
async fn run_cleanup(
    codes: Arc<dyn AuthorizationCodeStorage>,
    tokens: Arc<dyn TokenStorage>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::debug!(interval = ?interval, "Starting storage cleanup task");

    loop {
        tokio::select! {
            biased;

            result = shutdown.changed() => {
                match result {
                    Ok(()) if *shutdown.borrow() => break,
                    Ok(()) => {}
                    // Sender dropped, the server is going away
                    Err(_) => break,
                }
            }
            _ = tokio::time::sleep(interval) => {
                sweep(codes.as_ref(), tokens.as_ref()).await;
            }
        }
    }

    tracing::debug!("Storage cleanup task stopped");
}

async fn sweep(codes: &dyn AuthorizationCodeStorage, tokens: &dyn TokenStorage) {
    match codes.cleanup_expired().await {
        Ok(removed) if removed > 0 => {
            tracing::debug!(removed, "Swept expired authorization codes");
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "Authorization code sweep failed"),
    }

    match tokens.cleanup_expired().await {
        Ok(removed) if removed > 0 => {
            tracing::debug!(removed, "Swept expired tokens");
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "Token sweep failed"),
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutdown signal received");
}
