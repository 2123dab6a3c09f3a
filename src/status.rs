//! Status surface
//!
//! Read-only view over [`PipelineState`] for health polling. Every query reads
//! the latest published counters and never waits on the pipeline.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::pipeline::{PipelineState, TrackSummary};
use crate::protocol::ConfigData;

/// Body of `GET /health`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// `"ok"` while the camera is open, `"degraded"` otherwise
    pub status: String,
    pub camera_opened: bool,
    pub active_connections: usize,
    pub config: ConfigData,
    pub frame_count: u64,
    pub fps: f32,
    pub active_tracks: usize,
    pub dropped_frames: u64,
}

#[derive(Clone)]
pub struct StatusSurface {
    state: Arc<PipelineState>,
    config: ConfigData,
}

impl StatusSurface {
    pub fn new(state: Arc<PipelineState>, config: ConfigData) -> Self {
        Self { state, config }
    }

    pub fn health(&self) -> HealthReport {
        let snap = self.state.snapshot();
        HealthReport {
            status: if snap.camera_open { "ok" } else { "degraded" }.to_string(),
            camera_opened: snap.camera_open,
            active_connections: snap.active_sessions,
            config: self.config.clone(),
            frame_count: snap.frame_count,
            fps: snap.fps,
            active_tracks: snap.active_tracks,
            dropped_frames: snap.dropped_frames,
        }
    }

    /// Tracks currently held in the ledger, ordered by id
    pub fn tracks(&self) -> Vec<TrackSummary> {
        self.state.tracks().as_ref().clone()
    }

    pub fn config(&self) -> &ConfigData {
        &self.config
    }

    pub fn state(&self) -> &Arc<PipelineState> {
        &self.state
    }
}
