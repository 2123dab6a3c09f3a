//! Immutable per-frame record shared with every subscriber

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use crate::inference::Detection;
use crate::protocol::{FrameMetadata, ServerMessage};

/// Encoded frame plus annotations and stats.
///
/// The base64 and JSON rendering happens once at construction and every
/// subscriber shares the result. Each session still copies the finished text
/// into its own websocket frame, since a text frame owns its buffer.
#[derive(Debug)]
pub struct FrameMessage {
    sequence: u64,
    captured_at: DateTime<Utc>,
    jpeg: Bytes,
    metadata: FrameMetadata,
    wire: String,
}

impl FrameMessage {
    pub fn new(
        sequence: u64,
        captured_at: DateTime<Utc>,
        jpeg: Bytes,
        detections: Vec<Detection>,
        fps: f32,
        frame_count: u64,
    ) -> Result<Self, serde_json::Error> {
        let detected_classes: Vec<String> = detections
            .iter()
            .map(|d| d.class_name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let metadata = FrameMetadata {
            num_detections: detections.len(),
            detections,
            detected_classes,
            fps,
            frame_count,
        };

        let wire = ServerMessage::Frame {
            image: BASE64.encode(&jpeg),
            metadata: metadata.clone(),
        }
        .to_json()?;

        Ok(Self {
            sequence,
            captured_at,
            jpeg,
            metadata,
            wire,
        })
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn jpeg(&self) -> &Bytes {
        &self.jpeg
    }

    pub fn metadata(&self) -> &FrameMetadata {
        &self.metadata
    }

    pub fn detections(&self) -> &[Detection] {
        &self.metadata.detections
    }

    /// The `frame` message as sent on the wire
    pub fn wire_text(&self) -> &str {
        &self.wire
    }
}
