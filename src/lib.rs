//! # Live Vision Streamer
//!
//! Captures camera frames, runs object detection with track identities,
//! encodes each frame to JPEG and fans the result out to websocket viewers.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                        PIPELINE THREAD (pipeline::driver)                 │
//! │  ┌─────────────┐   ┌──────────────────┐   ┌─────────────┐                 │
//! │  │   Capture   │──▶│  Inference Stage │──▶│ JPEG Encoder│──┐              │
//! │  │   Source    │   │ detector+tracker │   │   (codec)   │  │              │
//! │  └─────────────┘   └──────────────────┘   └─────────────┘  │              │
//! │     next_frame(timeout)   worker thread                     ▼              │
//! │                                               FrameMessage (Arc, shared)   │
//! └───────────────────────────────────────────────────────────┬──────────────┘
//!                                                             │ publish()
//!                                                             ▼
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                    Broadcast Hub (broadcast::hub)                         │
//! │     session registry ── one bounded drop-oldest mailbox per session       │
//! └───────┬──────────────────────┬──────────────────────┬────────────────────┘
//!         ▼                      ▼                      ▼
//! ┌──────────────┐       ┌──────────────┐       ┌──────────────┐
//! │ ClientSession│       │ ClientSession│       │ ClientSession│   (session)
//! │ read │ write │       │ read │ write │       │ read │ write │
//! └──────┴───────┘       └──────┴───────┘       └──────┴───────┘
//!         │  websocket /ws       │                      │
//!         ▼                      ▼                      ▼
//!      viewers               viewers                viewers
//!
//!   GET /health ──▶ Status Surface ──▶ PipelineState (atomics, no locks held)
//! ```

pub mod broadcast;
pub mod capture;
pub mod codec;
pub mod config;
pub mod error;
pub mod inference;
pub mod pipeline;
pub mod protocol;
pub mod session;
pub mod status;
pub mod ui;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default HTTP bind address
    pub const DEFAULT_HOST: &str = "0.0.0.0";

    /// Default HTTP port
    pub const DEFAULT_PORT: u16 = 8000;

    /// Default capture resolution
    pub const DEFAULT_WIDTH: u32 = 640;
    pub const DEFAULT_HEIGHT: u32 = 480;

    /// Default pipeline rate in frames per second
    pub const DEFAULT_TARGET_FPS: u32 = 30;

    /// Default JPEG quality (1-100)
    pub const DEFAULT_JPEG_QUALITY: u8 = 80;

    /// Default minimum detection confidence
    pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

    /// Built-in detector that needs no model weights
    pub const DEFAULT_MODEL: &str = "marker";

    /// Default tracker configuration file
    pub const DEFAULT_TRACKER_CONFIG: &str = "tracker.toml";

    /// Pending frames per session mailbox
    pub const DEFAULT_MAILBOX_CAPACITY: usize = 2;

    /// How long the driver waits for a camera frame
    pub const DEFAULT_CAPTURE_TIMEOUT_MS: u64 = 500;

    /// How long the driver waits for detections
    pub const DEFAULT_INFERENCE_TIMEOUT_MS: u64 = 200;

    /// Tracks unseen for this long are retired from the ledger
    pub const TRACK_PERSISTENCE_SECS: u64 = 10;

    /// Interval between pipeline stats log lines
    pub const STATS_INTERVAL_SECS: u64 = 5;
}
