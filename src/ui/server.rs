//! Web server

use axum::{routing::get, Router};
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::broadcast::BroadcastHub;
use crate::error::Result;
use crate::status::StatusSurface;
use crate::ui::handlers;

/// Shared handler state
pub struct AppState {
    pub hub: Arc<BroadcastHub>,
    pub status: StatusSurface,
}

pub struct WebServer {
    state: Arc<AppState>,
    static_dir: Option<PathBuf>,
}

impl WebServer {
    pub fn new(hub: Arc<BroadcastHub>, status: StatusSurface) -> Self {
        Self {
            state: Arc::new(AppState { hub, status }),
            static_dir: None,
        }
    }

    /// Also serve files from `dir` under `/static`
    pub fn with_static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    pub fn router(&self) -> Router {
        let mut app = Router::new()
            .route("/", get(handlers::index))
            .route("/health", get(handlers::health))
            .route("/tracks", get(handlers::tracks))
            .route("/ws", get(handlers::ws_upgrade))
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone());

        if let Some(dir) = &self.static_dir {
            if dir.exists() {
                tracing::info!("Serving static files from {:?}", dir);
                app = app.nest_service("/static", ServeDir::new(dir));
            } else {
                tracing::warn!("Static dir {:?} does not exist, skipping", dir);
            }
        }

        app
    }

    /// Bind `addr` and serve until `shutdown` resolves
    pub async fn serve(
        self,
        addr: SocketAddr,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already-bound listener
    pub async fn serve_on(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        tracing::info!("Web server listening on http://{}", listener.local_addr()?);
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}
