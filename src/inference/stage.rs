//! Inference stage: detector, confidence filter, box sanitising and tracking
//!
//! The stage runs on its own worker thread. The pipeline hands it a frame and
//! waits at most the inference timeout; results that arrive late are matched
//! by sequence number and discarded.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::capture::RawFrame;
use crate::config::TrackerConfig;
use crate::error::InferenceError;
use crate::inference::detection::Detection;
use crate::inference::detector::Detector;
use crate::inference::tracker::IouTracker;

/// Detector plus tracker, producing viewer-ready detections
pub struct InferenceStage {
    detector: Option<Box<dyn Detector>>,
    tracker: IouTracker,
    confidence_threshold: f32,
}

impl InferenceStage {
    pub fn new(
        detector: Box<dyn Detector>,
        tracker_config: TrackerConfig,
        confidence_threshold: f32,
    ) -> Self {
        Self {
            detector: Some(detector),
            tracker: IouTracker::new(tracker_config),
            confidence_threshold,
        }
    }

    /// Stage without a model: every frame yields no detections
    pub fn disabled() -> Self {
        Self {
            detector: None,
            tracker: IouTracker::new(TrackerConfig::default()),
            confidence_threshold: 1.0,
        }
    }

    pub fn detector_name(&self) -> Option<&str> {
        self.detector.as_ref().map(|d| d.name())
    }

    pub fn process(&mut self, frame: &RawFrame) -> Result<Vec<Detection>, InferenceError> {
        let Some(detector) = self.detector.as_mut() else {
            return Ok(Vec::new());
        };

        let raw = detector.detect(frame)?;
        let mut detections: Vec<Detection> = raw
            .into_iter()
            .filter(|d| d.confidence.is_finite() && d.bbox.is_finite())
            .filter(|d| d.confidence >= self.confidence_threshold && d.confidence <= 1.0)
            .map(|d| Detection {
                track_id: d.track_id,
                class_id: d.class_id,
                class_name: d.class_name,
                confidence: d.confidence,
                bbox: d.bbox.clamped(frame.width, frame.height),
            })
            .collect();

        if !detector.tracks_objects() {
            self.tracker.update(&mut detections);
        }

        Ok(detections)
    }
}

type InferenceResponse = (u64, Result<Vec<Detection>, InferenceError>);

/// Dedicated thread owning an [`InferenceStage`]
pub struct InferenceWorker {
    request_tx: Option<Sender<Arc<RawFrame>>>,
    response_rx: Receiver<InferenceResponse>,
    thread_handle: Option<JoinHandle<()>>,
}

impl InferenceWorker {
    pub fn spawn(mut stage: InferenceStage) -> Result<Self, InferenceError> {
        let (request_tx, request_rx) = bounded::<Arc<RawFrame>>(1);
        let (response_tx, response_rx) = bounded::<InferenceResponse>(2);

        let handle = thread::Builder::new()
            .name("inference-worker".to_string())
            .spawn(move || {
                for frame in request_rx {
                    let sequence = frame.sequence;
                    let result = stage.process(&frame);
                    drop(frame);
                    if response_tx.send((sequence, result)).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| InferenceError::Failed(format!("failed to spawn worker: {e}")))?;

        Ok(Self {
            request_tx: Some(request_tx),
            response_rx,
            thread_handle: Some(handle),
        })
    }

    /// Run inference on `frame`, waiting at most `timeout`
    pub fn infer(
        &self,
        frame: Arc<RawFrame>,
        timeout: Duration,
    ) -> Result<Vec<Detection>, InferenceError> {
        let request_tx = self.request_tx.as_ref().ok_or(InferenceError::WorkerGone)?;
        let sequence = frame.sequence;
        let timeout_ms = timeout.as_millis() as u64;

        // Drop results that arrived after their caller gave up
        while self.response_rx.try_recv().is_ok() {}

        match request_tx.try_send(frame) {
            Ok(()) => {}
            // Still busy with a frame that already timed out
            Err(TrySendError::Full(_)) => return Err(InferenceError::Timeout(timeout_ms)),
            Err(TrySendError::Disconnected(_)) => return Err(InferenceError::WorkerGone),
        }

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.response_rx.recv_timeout(remaining) {
                Ok((seq, result)) if seq == sequence => return result,
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) => return Err(InferenceError::Timeout(timeout_ms)),
                Err(RecvTimeoutError::Disconnected) => return Err(InferenceError::WorkerGone),
            }
        }
    }
}

impl Drop for InferenceWorker {
    fn drop(&mut self) {
        self.request_tx.take();
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::detection::{BoundingBox, RawDetection};

    struct FixedDetector {
        detections: Vec<RawDetection>,
        delay: Duration,
        fail: bool,
    }

    impl Detector for FixedDetector {
        fn name(&self) -> &str {
            "fixed"
        }

        fn detect(&mut self, _frame: &RawFrame) -> Result<Vec<RawDetection>, InferenceError> {
            thread::sleep(self.delay);
            if self.fail {
                return Err(InferenceError::Failed("model crashed".into()));
            }
            Ok(self.detections.clone())
        }
    }

    fn raw(confidence: f32, bbox: BoundingBox) -> RawDetection {
        RawDetection {
            class_id: 2,
            class_name: "car".into(),
            confidence,
            bbox,
            track_id: None,
        }
    }

    fn frame(sequence: u64) -> RawFrame {
        RawFrame::new(vec![0; 100 * 50 * 3], 100, 50, sequence)
    }

    fn stage(detections: Vec<RawDetection>, delay: Duration, fail: bool) -> InferenceStage {
        InferenceStage::new(
            Box::new(FixedDetector {
                detections,
                delay,
                fail,
            }),
            TrackerConfig::default(),
            0.5,
        )
    }

    #[test]
    fn test_threshold_clamp_and_track_ids() {
        let mut stage = stage(
            vec![
                raw(0.9, BoundingBox::new(90.0, 40.0, 120.0, -5.0)),
                raw(0.2, BoundingBox::new(0.0, 0.0, 10.0, 10.0)),
                raw(f32::NAN, BoundingBox::new(0.0, 0.0, 10.0, 10.0)),
            ],
            Duration::ZERO,
            false,
        );

        let detections = stage.process(&frame(0)).unwrap();
        assert_eq!(detections.len(), 1);
        let det = &detections[0];
        assert!(det.confidence >= 0.5);
        assert_eq!(det.bbox, BoundingBox::new(90.0, 0.0, 100.0, 40.0));
        assert!(det.track_id.is_some());

        let again = stage.process(&frame(1)).unwrap();
        assert_eq!(again[0].track_id, det.track_id);
    }

    #[test]
    fn test_disabled_stage_is_empty() {
        let mut stage = InferenceStage::disabled();
        assert!(stage.detector_name().is_none());
        assert!(stage.process(&frame(0)).unwrap().is_empty());
    }

    #[test]
    fn test_worker_round_trip() {
        let worker = InferenceWorker::spawn(stage(
            vec![raw(0.8, BoundingBox::new(1.0, 1.0, 5.0, 5.0))],
            Duration::ZERO,
            false,
        ))
        .unwrap();
        let detections = worker
            .infer(Arc::new(frame(7)), Duration::from_secs(1))
            .unwrap();
        assert_eq!(detections.len(), 1);
    }

    #[test]
    fn test_worker_timeout_then_recovers() {
        let worker = InferenceWorker::spawn(stage(
            vec![raw(0.8, BoundingBox::new(1.0, 1.0, 5.0, 5.0))],
            Duration::from_millis(100),
            false,
        ))
        .unwrap();

        let err = worker
            .infer(Arc::new(frame(1)), Duration::from_millis(10))
            .unwrap_err();
        assert!(matches!(err, InferenceError::Timeout(_)));

        thread::sleep(Duration::from_millis(150));
        let detections = worker
            .infer(Arc::new(frame(2)), Duration::from_secs(1))
            .unwrap();
        assert_eq!(detections.len(), 1);
    }

    #[test]
    fn test_worker_propagates_failure() {
        let worker = InferenceWorker::spawn(stage(Vec::new(), Duration::ZERO, true)).unwrap();
        let err = worker
            .infer(Arc::new(frame(0)), Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, InferenceError::Failed(_)));
    }
}
