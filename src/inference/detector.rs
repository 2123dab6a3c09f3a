//! Detector backends

use crate::capture::synthetic::MARKER_COLOR;
use crate::capture::RawFrame;
use crate::error::InferenceError;
use crate::inference::detection::{BoundingBox, RawDetection};

/// Object detection backend. Owned by exactly one inference worker.
pub trait Detector: Send {
    fn name(&self) -> &str;

    /// Whether the backend fills in `track_id` itself
    fn tracks_objects(&self) -> bool {
        false
    }

    fn detect(&mut self, frame: &RawFrame) -> Result<Vec<RawDetection>, InferenceError>;
}

/// Resolve a model name to a backend
pub fn load_detector(model: &str) -> Result<Box<dyn Detector>, InferenceError> {
    match model {
        "marker" => Ok(Box::new(MarkerDetector::new())),
        other => Err(InferenceError::UnknownModel(other.to_string())),
    }
}

/// Finds the solid marker square drawn by the synthetic camera
pub struct MarkerDetector {
    color: [u8; 3],
}

impl MarkerDetector {
    pub const CLASS_ID: u32 = 0;
    pub const CLASS_NAME: &'static str = "marker";

    pub fn new() -> Self {
        Self {
            color: MARKER_COLOR,
        }
    }
}

impl Default for MarkerDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for MarkerDetector {
    fn name(&self) -> &str {
        "marker"
    }

    fn detect(&mut self, frame: &RawFrame) -> Result<Vec<RawDetection>, InferenceError> {
        if !frame.is_valid() {
            return Err(InferenceError::Failed(format!(
                "frame {} has {} bytes for {}x{}",
                frame.sequence,
                frame.pixels.len(),
                frame.width,
                frame.height
            )));
        }

        let width = frame.width as usize;
        let (mut min_x, mut min_y) = (usize::MAX, usize::MAX);
        let (mut max_x, mut max_y) = (0usize, 0usize);
        let mut hits = 0usize;

        for (i, px) in frame.pixels.chunks_exact(3).enumerate() {
            if px != self.color {
                continue;
            }
            let (x, y) = (i % width, i / width);
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
            hits += 1;
        }

        if hits == 0 {
            return Ok(Vec::new());
        }

        let area = (max_x - min_x + 1) * (max_y - min_y + 1);
        Ok(vec![RawDetection {
            class_id: Self::CLASS_ID,
            class_name: Self::CLASS_NAME.to_string(),
            confidence: hits as f32 / area as f32,
            bbox: BoundingBox::new(
                min_x as f32,
                min_y as f32,
                (max_x + 1) as f32,
                (max_y + 1) as f32,
            ),
            track_id: None,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CameraDriver, SyntheticDriver};

    #[test]
    fn test_unknown_model() {
        assert!(matches!(
            load_detector("yolov8n.pt"),
            Err(InferenceError::UnknownModel(_))
        ));
        assert!(load_detector("marker").is_ok());
    }

    #[test]
    fn test_marker_found_in_synthetic_frame() {
        let driver = SyntheticDriver::default().with_cadence(None);
        let mut grabber = driver.open(0, 96, 48).unwrap();
        let frame = RawFrame::new(grabber.grab().unwrap(), 96, 48, 0);

        let detections = MarkerDetector::new().detect(&frame).unwrap();
        assert_eq!(detections.len(), 1);
        let det = &detections[0];
        assert!((det.confidence - 1.0).abs() < 1e-6);
        assert_eq!(det.bbox.width(), 8.0);
        assert_eq!(det.bbox.height(), 8.0);
        assert!(det.bbox.x2 <= 96.0 && det.bbox.y2 <= 48.0);
    }

    #[test]
    fn test_empty_scene() {
        let frame = RawFrame::new(vec![0; 16 * 16 * 3], 16, 16, 0);
        assert!(MarkerDetector::new().detect(&frame).unwrap().is_empty());
    }
}
