//! HTTP API handlers

use axum::{
    extract::{State, WebSocketUpgrade},
    response::{Html, IntoResponse},
    Json,
};
use futures_util::StreamExt;
use std::sync::Arc;

use crate::pipeline::TrackSummary;
use crate::session::run_session;
use crate::status::HealthReport;
use crate::ui::server::AppState;

/// Presentation page
const INDEX_HTML: &str = include_str!("index.html");

/// API response wrapper
#[derive(serde::Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// GET /
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
    Json(state.status.health())
}

/// GET /tracks
pub async fn tracks(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<Vec<TrackSummary>>> {
    Json(ApiResponse::ok(state.status.tracks()))
}

/// GET /ws
pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let (sink, stream) = socket.split();
        run_session(
            sink,
            stream,
            state.hub.clone(),
            state.status.config().clone(),
        )
        .await;
    })
}
