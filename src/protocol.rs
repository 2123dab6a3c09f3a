//! Websocket wire protocol
//!
//! Every message is a JSON object carrying a `type` discriminator.
//!
//! Server → client:
//!   `config` (once, first)  `{type, data: {host, port, camera_resolution, target_fps, yolo_model, jpeg_quality}}`
//!   `frame`                 `{type, image: <base64 JPEG>, metadata: {...}}`
//!   `error`                 `{type, message}`
//!
//! Client → server:
//!   `ping`                  keepalive, no reply
//!   `get_config`            server re-sends `config`

use serde::{Deserialize, Serialize};

use crate::inference::Detection;

/// Pipeline settings advertised at handshake
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigData {
    pub host: String,
    pub port: u16,
    pub camera_resolution: String,
    pub target_fps: u32,
    pub yolo_model: String,
    pub jpeg_quality: u8,
}

/// Per-frame annotation and stats
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameMetadata {
    pub num_detections: usize,
    pub detections: Vec<Detection>,
    pub detected_classes: Vec<String>,
    pub fps: f32,
    pub frame_count: u64,
}

/// Messages sent to viewers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Config { data: ConfigData },
    Frame { image: String, metadata: FrameMetadata },
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Messages accepted from viewers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
    GetConfig,
}

impl ClientMessage {
    /// Parse an inbound text payload; the error string is sent back verbatim
    pub fn parse(text: &str) -> Result<Self, String> {
        serde_json::from_str(text).map_err(|e| format!("invalid message: {e}"))
    }
}
