//! Web UI module
//!
//! - `GET /`        presentation page
//! - `GET /health`  status surface
//! - `GET /tracks`  active tracks
//! - `WS  /ws`      live annotated feed

pub mod handlers;
pub mod server;

pub use server::{AppState, WebServer};
