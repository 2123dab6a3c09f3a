//! Object detection and tracking

pub mod detection;
pub mod detector;
pub mod stage;
pub mod tracker;

pub use detection::{BoundingBox, Detection, RawDetection};
pub use detector::{load_detector, Detector, MarkerDetector};
pub use stage::{InferenceStage, InferenceWorker};
pub use tracker::IouTracker;
