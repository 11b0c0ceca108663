//! HTTP server for Prometheus metrics endpoint.

use std::io;
use std::net::SocketAddr;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::collector::SharedCollector;
use crate::error::{Error, Result};

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    collector: SharedCollector,
}

/// Create the HTTP router.
pub fn create_router(collector: SharedCollector, metrics_path: &str) -> Router {
    let state = AppState { collector };

    Router::new()
        .route(metrics_path, get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handler for the /metrics endpoint.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    // stat(2) blocks, keep it off the async workers
    let collector = state.collector.clone();
    let body = match tokio::task::spawn_blocking(move || collector.render()).await {
        Ok(body) => body,
        Err(e) => {
            error!("Metric collection failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "collection failed\n").into_response();
        }
    };

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}

/// HTTP server configuration.
pub struct HttpServer {
    collector: SharedCollector,
    listen_addr: String,
    metrics_path: String,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(collector: SharedCollector, listen_addr: String, metrics_path: String) -> Self {
        Self {
            collector,
            listen_addr,
            metrics_path,
        }
    }

    /// Bind the listen address. Failure here is fatal to the exporter.
    pub async fn bind(self) -> Result<BoundHttpServer> {
        info!(
            addr = %self.listen_addr,
            path = %self.metrics_path,
            "Starting HTTP server"
        );

        let listener = bind_listener(&self.listen_addr)
            .await
            .map_err(|source| Error::Bind {
                addr: self.listen_addr.clone(),
                source,
            })?;

        let local_addr = listener.local_addr().map_err(|source| Error::Bind {
            addr: self.listen_addr.clone(),
            source,
        })?;

        Ok(BoundHttpServer {
            router: create_router(self.collector, &self.metrics_path),
            listener,
            local_addr,
            metrics_path: self.metrics_path,
        })
    }
}

/// Bind the address, falling back from the IPv6 wildcard to IPv4 on hosts
/// without IPv6 support.
async fn bind_listener(addr: &str) -> io::Result<TcpListener> {
    let err = match TcpListener::bind(addr).await {
        Ok(listener) => return Ok(listener),
        Err(e) => e,
    };

    match addr.strip_prefix("[::]:") {
        Some(port)
            if !matches!(
                err.kind(),
                io::ErrorKind::AddrInUse | io::ErrorKind::PermissionDenied
            ) =>
        {
            warn!(addr, error = %err, "IPv6 wildcard unavailable, listening on IPv4 only");
            TcpListener::bind(format!("0.0.0.0:{}", port)).await
        }
        _ => Err(err),
    }
}

/// A server whose listener is open and ready to accept scrapes.
pub struct BoundHttpServer {
    router: Router,
    listener: TcpListener,
    local_addr: SocketAddr,
    metrics_path: String,
}

impl BoundHttpServer {
    /// The address actually bound, useful when listening on port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve scrapes until the shutdown signal is received.
    pub async fn serve(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(
            addr = %self.local_addr,
            path = %self.metrics_path,
            "HTTP server listening"
        );

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                // Wait for shutdown signal
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(Error::Serve)?;

        info!("HTTP server stopped");
        Ok(())
    }
}
