//! Foreground status server.

use crate::config::Config;
use crate::listener::ListenerState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::{future::Future, sync::Arc};
use tokio::{net::TcpListener, sync::watch};

use super::{ServerError, ServerResult};

/// Shared state for the status routes
#[derive(Clone)]
struct StatusApp {
    body: Arc<str>,
    listener: watch::Receiver<ListenerState>,
}

#[derive(Debug, Serialize)]
struct HealthReport {
    listener: ListenerState,
}

async fn index(State(app): State<StatusApp>) -> String {
    app.body.to_string()
}

async fn health(State(app): State<StatusApp>) -> Json<HealthReport> {
    let listener = app.listener.borrow().clone();
    Json(HealthReport { listener })
}

/// Build the status routes.
///
/// - `GET /` answers `200 OK` with `body` as `text/plain`
/// - `GET /health` reports the listener state as JSON
///
/// Anything else falls through to the default 404.
pub fn router(body: impl Into<Arc<str>>, listener: watch::Receiver<ListenerState>) -> Router {
    let app = StatusApp {
        body: body.into(),
        listener,
    };

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .with_state(app)
}

/// Status server bound to a configured address.
///
/// # Example
///
/// ```rust,ignore
/// use sse_sentinel::{Config, StatusServer};
///
/// let config = Config::from_env();
/// let server = StatusServer::new(&config, listener_handle.state());
/// server.serve(async { let _ = tokio::signal::ctrl_c().await; }).await?;
/// ```
pub struct StatusServer {
    addr: String,
    router: Router,
}

impl StatusServer {
    /// Create a server for `config.socket_addr()` serving `config.status_body`.
    pub fn new(config: &Config, listener: watch::Receiver<ListenerState>) -> Self {
        Self {
            addr: config.socket_addr(),
            router: router(config.status_body.clone(), listener),
        }
    }

    /// Bind and serve until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(&self.addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: self.addr.clone(),
                source,
            })?;
        serve_on(listener, self.router, shutdown).await
    }
}

/// Serve `router` on an already-bound listener until `shutdown` resolves.
pub async fn serve_on<F>(listener: TcpListener, router: Router, shutdown: F) -> ServerResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local = listener.local_addr().map_err(ServerError::Serve)?;
    tracing::info!(addr = %local, "status server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServerError::Serve)?;

    tracing::info!("status server stopped");
    Ok(())
}
