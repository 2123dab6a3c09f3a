//! Error types for the vision streaming application

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Capture subsystem errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    /// The device could not be opened at all. Fatal for the pipeline.
    #[error("Failed to open camera {index}: {reason}")]
    OpenFailed { index: u32, reason: String },

    /// A single read failed. The capture loop retries.
    #[error("Frame read failed: {0}")]
    ReadFailed(String),

    #[error("No frame within {0} ms")]
    Timeout(u64),

    #[error("Capture source is closed")]
    Closed,
}

impl CaptureError {
    /// Whether the pipeline can keep going after this error
    pub fn is_transient(&self) -> bool {
        matches!(self, CaptureError::ReadFailed(_) | CaptureError::Timeout(_))
    }
}

/// Detection and tracking errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("Inference failed: {0}")]
    Failed(String),

    #[error("Inference exceeded {0} ms")]
    Timeout(u64),

    #[error("Inference worker is gone")]
    WorkerGone,

    #[error("Unknown detection model: {0}")]
    UnknownModel(String),
}

/// Codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Encoding failed: {0}")]
    EncodingFailed(String),
}

/// Per-session errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Handshake rejected: {0}")]
    Handshake(String),

    #[error("Invalid session transition from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
