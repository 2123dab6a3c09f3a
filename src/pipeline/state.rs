//! Process-wide pipeline counters
//!
//! Written by the pipeline driver and the broadcast hub, read by the status
//! surface. Scalars are atomics; the active track list is swapped in whole
//! behind an `Arc` so readers never wait on a writer mid-update.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::pipeline::tracks::TrackSummary;

/// Point-in-time copy of the pipeline counters
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSnapshot {
    pub camera_open: bool,
    pub frame_count: u64,
    pub fps: f32,
    pub active_sessions: usize,
    pub dropped_frames: u64,
    pub inference_failures: u64,
    pub capture_timeouts: u64,
    pub active_tracks: usize,
    pub uptime: Duration,
}

#[derive(Debug)]
pub struct PipelineState {
    camera_open: AtomicBool,
    frame_count: AtomicU64,
    fps_bits: AtomicU32,
    active_sessions: AtomicUsize,
    dropped_frames: AtomicU64,
    inference_failures: AtomicU64,
    capture_timeouts: AtomicU64,
    tracks: RwLock<Arc<Vec<TrackSummary>>>,
    started_at: Instant,
}

impl PipelineState {
    pub fn new() -> Self {
        Self {
            camera_open: AtomicBool::new(false),
            frame_count: AtomicU64::new(0),
            fps_bits: AtomicU32::new(0f32.to_bits()),
            active_sessions: AtomicUsize::new(0),
            dropped_frames: AtomicU64::new(0),
            inference_failures: AtomicU64::new(0),
            capture_timeouts: AtomicU64::new(0),
            tracks: RwLock::new(Arc::new(Vec::new())),
            started_at: Instant::now(),
        }
    }

    pub fn set_camera_open(&self, open: bool) {
        self.camera_open.store(open, Ordering::SeqCst);
    }

    pub fn camera_open(&self) -> bool {
        self.camera_open.load(Ordering::SeqCst)
    }

    /// Publish the latest frame count and rate together
    pub fn record_frame(&self, frame_count: u64, fps: f32) {
        self.fps_bits.store(fps.to_bits(), Ordering::Relaxed);
        self.frame_count.store(frame_count, Ordering::Release);
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count.load(Ordering::Acquire)
    }

    pub fn fps(&self) -> f32 {
        f32::from_bits(self.fps_bits.load(Ordering::Relaxed))
    }

    pub fn session_added(&self) {
        self.active_sessions.fetch_add(1, Ordering::SeqCst);
    }

    /// Saturates at zero
    pub fn session_removed(&self) {
        let _ = self
            .active_sessions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)));
    }

    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::SeqCst)
    }

    pub fn add_dropped_frames(&self, count: u64) {
        if count > 0 {
            self.dropped_frames.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub fn record_inference_failure(&self) {
        self.inference_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_capture_timeout(&self) {
        self.capture_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn publish_tracks(&self, tracks: Vec<TrackSummary>) {
        *self.tracks.write() = Arc::new(tracks);
    }

    pub fn tracks(&self) -> Arc<Vec<TrackSummary>> {
        self.tracks.read().clone()
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            camera_open: self.camera_open(),
            frame_count: self.frame_count(),
            fps: self.fps(),
            active_sessions: self.active_sessions(),
            dropped_frames: self.dropped_frames.load(Ordering::Relaxed),
            inference_failures: self.inference_failures.load(Ordering::Relaxed),
            capture_timeouts: self.capture_timeouts.load(Ordering::Relaxed),
            active_tracks: self.tracks.read().len(),
            uptime: self.started_at.elapsed(),
        }
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let state = PipelineState::new();
        assert!(!state.camera_open());

        state.set_camera_open(true);
        state.record_frame(42, 29.7);
        for _ in 0..4 {
            state.session_added();
        }
        state.session_removed();
        state.add_dropped_frames(2);
        state.add_dropped_frames(0);
        state.record_inference_failure();

        let snap = state.snapshot();
        assert!(snap.camera_open);
        assert_eq!(snap.frame_count, 42);
        assert!((snap.fps - 29.7).abs() < 1e-6);
        assert_eq!(snap.active_sessions, 3);
        assert_eq!(snap.dropped_frames, 2);
        assert_eq!(snap.inference_failures, 1);
        assert_eq!(snap.active_tracks, 0);

        for _ in 0..5 {
            state.session_removed();
        }
        assert_eq!(state.active_sessions(), 0);
    }

    #[test]
    fn test_concurrent_readers_and_writer() {
        let state = Arc::new(PipelineState::new());
        let writer = {
            let state = state.clone();
            std::thread::spawn(move || {
                for i in 1..=10_000u64 {
                    state.record_frame(i, 30.0);
                }
            })
        };
        let reader = {
            let state = state.clone();
            std::thread::spawn(move || {
                let mut last = 0;
                for _ in 0..10_000 {
                    let count = state.snapshot().frame_count;
                    assert!(count >= last);
                    last = count;
                }
            })
        };
        writer.join().unwrap();
        reader.join().unwrap();
        assert_eq!(state.frame_count(), 10_000);
    }
}
