//! Live Vision Server
//!
//! Opens the camera, runs detection and tracking on every frame and streams
//! the annotated feed to websocket viewers.

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use live_vision_streamer::{
    broadcast::BroadcastHub,
    capture::{CaptureSource, SyntheticDriver},
    codec::FrameEncoder,
    config::{AppConfig, TrackerConfig},
    inference::{load_detector, InferenceStage, InferenceWorker},
    pipeline::{DriverSettings, PipelineDriver, PipelineState},
    status::StatusSurface,
    ui::WebServer,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Live Vision Server");

    let config = AppConfig::load()?;
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    let state = Arc::new(PipelineState::new());
    let hub = Arc::new(BroadcastHub::new(config.stream.mailbox_capacity, state.clone()));
    let status = StatusSurface::new(state.clone(), config.public_view());

    let stage = match load_detector(&config.model.model) {
        Ok(detector) => {
            let tracker = TrackerConfig::load(&config.model.tracker_config)?;
            InferenceStage::new(detector, tracker, config.model.confidence_threshold)
        }
        Err(e) => {
            tracing::warn!("{}; streaming without detections", e);
            InferenceStage::disabled()
        }
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    let mut pipeline_handle = None;

    match CaptureSource::open(&SyntheticDriver::default(), &config.camera) {
        Ok(capture) => {
            let worker = InferenceWorker::spawn(stage)?;
            let driver = PipelineDriver::new(
                capture,
                worker,
                FrameEncoder::new(config.stream.jpeg_quality),
                hub.clone(),
                DriverSettings::from_config(&config),
            );
            pipeline_handle = Some(driver.spawn(shutdown.clone())?);
        }
        Err(e) => {
            // Keep serving so /health can report the fault
            tracing::error!("Camera unavailable: {}", e);
        }
    }

    println!("\n=== Live Vision Server ===");
    println!("  Viewer:  http://{}/", addr);
    println!("  Health:  http://{}/health", addr);
    println!("  Stream:  ws://{}/ws", addr);
    println!();

    let server = WebServer::new(hub.clone(), status).with_static_dir(config.server.static_dir.clone());
    let stop = shutdown.clone();
    let stop_hub = hub.clone();
    server
        .serve(addr, async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
            }
            tracing::info!("Shutting down...");
            stop.store(true, Ordering::SeqCst);
            // Sessions see their mailboxes close and wind down
            stop_hub.close();
        })
        .await?;

    if let Some(handle) = pipeline_handle {
        let _ = tokio::task::spawn_blocking(move || handle.join()).await;
    }

    tracing::info!("Server stopped");
    Ok(())
}
