//! Pipeline driver
//!
//! One loop, one thread: pull a frame, annotate it, encode it, publish it,
//! then sleep out the rest of the target period. Owns the capture source and
//! the inference worker exclusively.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::broadcast::{BroadcastHub, PublishReport};
use crate::capture::CaptureSource;
use crate::codec::FrameEncoder;
use crate::config::AppConfig;
use crate::constants::{STATS_INTERVAL_SECS, TRACK_PERSISTENCE_SECS};
use crate::error::{CaptureError, Error, Result};
use crate::inference::{Detection, InferenceWorker};
use crate::pipeline::fps::FpsMeter;
use crate::pipeline::message::FrameMessage;
use crate::pipeline::state::PipelineState;
use crate::pipeline::tracks::TrackLedger;

/// Timing knobs for the driver loop
#[derive(Debug, Clone, Copy)]
pub struct DriverSettings {
    pub target_period: Duration,
    pub capture_timeout: Duration,
    pub inference_timeout: Duration,
}

impl DriverSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            target_period: config.camera.target_period(),
            capture_timeout: config.stream.capture_timeout(),
            inference_timeout: config.stream.inference_timeout(),
        }
    }
}

/// What one loop iteration did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A frame was published
    Published(PublishReport),
    /// No frame arrived within the capture timeout
    NoFrame,
    /// The frame could not be encoded and was dropped
    EncodeFailed,
}

/// Time left to sleep so the iteration lasts `period`; zero when already late
pub fn remaining_period(elapsed: Duration, period: Duration) -> Duration {
    period.saturating_sub(elapsed)
}

pub struct PipelineDriver {
    capture: CaptureSource,
    inference: InferenceWorker,
    encoder: FrameEncoder,
    hub: Arc<BroadcastHub>,
    state: Arc<PipelineState>,
    settings: DriverSettings,
    fps: FpsMeter,
    tracks: TrackLedger,
    frame_count: u64,
}

impl PipelineDriver {
    pub fn new(
        capture: CaptureSource,
        inference: InferenceWorker,
        encoder: FrameEncoder,
        hub: Arc<BroadcastHub>,
        settings: DriverSettings,
    ) -> Self {
        let state = hub.state().clone();
        state.set_camera_open(capture.is_open());
        Self {
            capture,
            inference,
            encoder,
            hub,
            state,
            settings,
            fps: FpsMeter::default(),
            tracks: TrackLedger::new(Duration::from_secs(TRACK_PERSISTENCE_SECS)),
            frame_count: 0,
        }
    }

    /// Run a single capture → inference → encode → publish pass.
    ///
    /// Only a closed capture source is an error; everything else is absorbed
    /// here so the loop keeps going.
    pub fn step(&mut self) -> std::result::Result<StepOutcome, CaptureError> {
        let frame = match self.capture.next_frame(self.settings.capture_timeout)? {
            Some(frame) => Arc::new(frame),
            None => {
                self.state.record_capture_timeout();
                tracing::debug!(
                    "No frame within {:?}, skipping iteration",
                    self.settings.capture_timeout
                );
                return Ok(StepOutcome::NoFrame);
            }
        };

        let detections: Vec<Detection> =
            match self.inference.infer(frame.clone(), self.settings.inference_timeout) {
                Ok(detections) => detections,
                Err(e) => {
                    self.state.record_inference_failure();
                    tracing::warn!("Inference on frame {} failed: {}", frame.sequence, e);
                    Vec::new()
                }
            };

        let jpeg = match self.encoder.encode(&frame) {
            Ok(jpeg) => jpeg,
            Err(e) => {
                tracing::warn!("Dropping frame {}: {}", frame.sequence, e);
                return Ok(StepOutcome::EncodeFailed);
            }
        };

        let changes = self.tracks.update(&detections, frame.captured_at);
        for id in &changes.new {
            tracing::info!("New track {}", id);
        }
        for id in &changes.removed {
            tracing::info!("Track {} retired", id);
        }
        self.state.publish_tracks(self.tracks.snapshot());

        self.frame_count += 1;
        let fps = self.fps.tick(Instant::now());

        let message = match FrameMessage::new(
            frame.sequence,
            frame.captured_at,
            jpeg,
            detections,
            fps,
            self.frame_count,
        ) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Failed to serialize frame {}: {}", frame.sequence, e);
                return Ok(StepOutcome::EncodeFailed);
            }
        };
        drop(frame);

        self.state.record_frame(self.frame_count, fps);
        let report = self.hub.publish(Arc::new(message));
        if report.evicted > 0 {
            tracing::debug!("{} session(s) behind, evicted oldest frame", report.evicted);
        }
        Ok(StepOutcome::Published(report))
    }

    /// Drive the loop until `shutdown` is set or the capture source closes
    pub fn run(mut self, shutdown: Arc<AtomicBool>) {
        tracing::info!(
            "Pipeline started (target period {:?})",
            self.settings.target_period
        );
        let stats_interval = Duration::from_secs(STATS_INTERVAL_SECS);
        let mut last_stats = Instant::now();

        while !shutdown.load(Ordering::Relaxed) {
            let started = Instant::now();

            if let Err(e) = self.step() {
                tracing::error!("Capture stopped: {}", e);
                break;
            }

            if last_stats.elapsed() >= stats_interval {
                let snap = self.state.snapshot();
                tracing::info!(
                    "Pipeline: {} frames, {:.1} fps, {} sessions, {} dropped, {} inference failures",
                    snap.frame_count,
                    snap.fps,
                    snap.active_sessions,
                    snap.dropped_frames,
                    snap.inference_failures
                );
                last_stats = Instant::now();
            }

            let remaining = remaining_period(started.elapsed(), self.settings.target_period);
            if !remaining.is_zero() {
                thread::sleep(remaining);
            }
        }

        self.shutdown();
    }

    /// Run the loop on its own thread
    pub fn spawn(self, shutdown: Arc<AtomicBool>) -> Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("pipeline-driver".to_string())
            .spawn(move || self.run(shutdown))
            .map_err(Error::Io)
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn shutdown(&mut self) {
        self.capture.close();
        self.state.set_camera_open(false);
        self.hub.close();

        let stats = self.encoder.stats();
        tracing::info!(
            "Pipeline stopped after {} frames ({} bytes encoded, avg {} bytes)",
            self.frame_count,
            stats.bytes_produced,
            stats.average_frame_size
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{RawFrame, SyntheticDriver};
    use crate::config::{CameraConfig, TrackerConfig};
    use crate::error::InferenceError;
    use crate::inference::{Detector, InferenceStage, MarkerDetector, RawDetection};
    use crate::session::SessionId;

    /// Detector that stalls for `delay`, then fails if asked to
    struct StuckDetector {
        delay: Duration,
        fail: bool,
    }

    impl Detector for StuckDetector {
        fn name(&self) -> &str {
            "stuck"
        }

        fn detect(&mut self, _frame: &RawFrame) -> std::result::Result<Vec<RawDetection>, InferenceError> {
            thread::sleep(self.delay);
            if self.fail {
                return Err(InferenceError::Failed("out of device memory".into()));
            }
            Ok(Vec::new())
        }
    }

    fn settings(target_fps: u32) -> DriverSettings {
        DriverSettings {
            target_period: Duration::from_secs_f64(1.0 / target_fps as f64),
            capture_timeout: Duration::from_millis(500),
            inference_timeout: Duration::from_millis(200),
        }
    }

    fn build_driver(
        camera: SyntheticDriver,
        detector: Box<dyn Detector>,
        settings: DriverSettings,
    ) -> (PipelineDriver, Arc<BroadcastHub>) {
        let config = CameraConfig {
            width: 64,
            height: 48,
            ..CameraConfig::default()
        };
        let capture = CaptureSource::open(&camera, &config).unwrap();
        let stage = InferenceStage::new(detector, TrackerConfig::default(), 0.1);
        let worker = InferenceWorker::spawn(stage).unwrap();
        let hub = Arc::new(BroadcastHub::new(2, Arc::new(PipelineState::new())));
        let driver = PipelineDriver::new(capture, worker, FrameEncoder::new(80), hub.clone(), settings);
        (driver, hub)
    }

    fn driver(target_fps: u32) -> (PipelineDriver, Arc<BroadcastHub>) {
        build_driver(
            SyntheticDriver::default().with_cadence(Some(Duration::from_millis(2))),
            Box::new(MarkerDetector::new()),
            settings(target_fps),
        )
    }

    fn stuck_driver(delay: Duration, fail: bool, inference_timeout: Duration) -> (PipelineDriver, Arc<BroadcastHub>) {
        build_driver(
            SyntheticDriver::default().with_cadence(Some(Duration::from_millis(2))),
            Box::new(StuckDetector { delay, fail }),
            DriverSettings {
                inference_timeout,
                ..settings(30)
            },
        )
    }

    #[test]
    fn test_remaining_period() {
        let period = Duration::from_millis(33);
        assert_eq!(remaining_period(Duration::from_millis(10), period), Duration::from_millis(23));
        assert_eq!(remaining_period(Duration::from_millis(50), period), Duration::ZERO);
    }

    #[test]
    fn test_step_publishes_annotated_frame() {
        let (mut driver, hub) = driver(30);
        let mailbox = hub.subscribe(SessionId::new());

        let outcome = driver.step().unwrap();
        assert!(matches!(outcome, StepOutcome::Published(PublishReport { delivered: 1, .. })));

        let frame = mailbox.try_recv().unwrap();
        assert_eq!(frame.metadata().frame_count, 1);
        assert_eq!(frame.metadata().detected_classes, vec!["marker".to_string()]);
        assert_eq!(&frame.jpeg()[..2], &[0xFF, 0xD8]);
        let det = &frame.detections()[0];
        assert_eq!(det.track_id, Some(1));
        assert!(det.bbox.x1 <= det.bbox.x2 && det.bbox.y1 <= det.bbox.y2);
        assert!(det.bbox.x2 <= 64.0 && det.bbox.y2 <= 48.0);

        assert!(hub.state().camera_open());
        assert_eq!(hub.state().frame_count(), 1);
        assert_eq!(hub.state().tracks().len(), 1);
    }

    #[test]
    fn test_sequences_never_decrease() {
        let (mut driver, hub) = driver(30);
        let mailbox = hub.subscribe(SessionId::new());

        let mut last = None;
        for _ in 0..10 {
            driver.step().unwrap();
            while let Some(frame) = mailbox.try_recv() {
                if let Some(prev) = last {
                    assert!(frame.sequence() >= prev);
                }
                last = Some(frame.sequence());
            }
        }
        assert!(last.is_some());
    }

    #[test]
    fn test_paced_rate_near_target() {
        let (driver, hub) = driver(30);
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = driver.spawn(shutdown.clone()).unwrap();

        // Let the first frames settle before measuring
        thread::sleep(Duration::from_millis(300));
        let start_count = hub.state().frame_count();
        let start = Instant::now();
        thread::sleep(Duration::from_secs(2));
        let produced = hub.state().frame_count() - start_count;
        let rate = produced as f64 / start.elapsed().as_secs_f64();

        shutdown.store(true, Ordering::Relaxed);
        handle.join().unwrap();

        assert!((27.0..=33.0).contains(&rate), "rate = {rate}");
    }

    #[test]
    fn test_shutdown_closes_everything() {
        let (driver, hub) = driver(60);
        let mailbox = hub.subscribe(SessionId::new());
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = driver.spawn(shutdown.clone()).unwrap();

        thread::sleep(Duration::from_millis(100));
        shutdown.store(true, Ordering::Relaxed);
        handle.join().unwrap();

        assert!(!hub.state().camera_open());
        assert!(hub.is_closed());
        assert!(mailbox.is_closed());
    }

    #[test]
    fn test_inference_failure_still_publishes() {
        let (mut driver, hub) = stuck_driver(Duration::ZERO, true, Duration::from_millis(200));
        let mailbox = hub.subscribe(SessionId::new());

        let outcome = driver.step().unwrap();
        assert!(matches!(outcome, StepOutcome::Published(PublishReport { delivered: 1, .. })));

        let frame = mailbox.try_recv().unwrap();
        assert!(frame.detections().is_empty());
        assert_eq!(&frame.jpeg()[..2], &[0xFF, 0xD8]);

        let snap = hub.state().snapshot();
        assert_eq!(snap.inference_failures, 1);
        assert_eq!(snap.frame_count, 1);
    }

    #[test]
    fn test_inference_timeout_still_publishes() {
        let (mut driver, hub) = stuck_driver(Duration::from_millis(400), false, Duration::from_millis(50));
        let mailbox = hub.subscribe(SessionId::new());

        let started = Instant::now();
        let outcome = driver.step().unwrap();
        // Bounded by the inference timeout, not the detector
        assert!(started.elapsed() < Duration::from_millis(300));
        assert!(matches!(outcome, StepOutcome::Published(PublishReport { delivered: 1, .. })));

        let frame = mailbox.try_recv().unwrap();
        assert!(frame.detections().is_empty());
        assert_eq!(hub.state().snapshot().inference_failures, 1);
    }

    #[test]
    fn test_capture_timeout_skips_iteration() {
        let (mut driver, hub) = build_driver(
            SyntheticDriver::default().with_cadence(Some(Duration::from_millis(300))),
            Box::new(MarkerDetector::new()),
            DriverSettings {
                capture_timeout: Duration::from_millis(20),
                ..settings(30)
            },
        );
        let mailbox = hub.subscribe(SessionId::new());

        assert_eq!(driver.step().unwrap(), StepOutcome::NoFrame);
        assert!(mailbox.try_recv().is_none());
        assert_eq!(hub.published(), 0);

        let snap = hub.state().snapshot();
        assert_eq!(snap.frame_count, 0);
        assert_eq!(snap.capture_timeouts, 1);
        assert_eq!(snap.inference_failures, 0);
        assert!(snap.camera_open);
    }
}
