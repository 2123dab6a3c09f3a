//! Capture source service object
//!
//! Owns an opened device and a dedicated reader thread. The thread keeps only
//! the most recent frame; the pipeline pulls it with [`CaptureSource::next_frame`].

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::capture::device::{CameraDriver, FrameGrabber};
use crate::capture::frame::RawFrame;
use crate::config::CameraConfig;
use crate::error::CaptureError;

/// Back-off after a failed device read
const READ_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Capture statistics
#[derive(Debug, Clone, Default)]
pub struct CaptureStats {
    pub frames_captured: u64,
    pub read_errors: u64,
}

/// Opened camera plus its reader thread
pub struct CaptureSource {
    index: u32,
    width: u32,
    height: u32,
    running: Arc<AtomicBool>,
    frames: Receiver<RawFrame>,
    thread_handle: Option<JoinHandle<()>>,
    frames_captured: Arc<AtomicU64>,
    read_errors: Arc<AtomicU64>,
}

impl CaptureSource {
    /// Open the configured device and start reading.
    ///
    /// Failure here is fatal for the pipeline and is reported as
    /// [`CaptureError::OpenFailed`].
    pub fn open(driver: &dyn CameraDriver, config: &CameraConfig) -> Result<Self, CaptureError> {
        let grabber = driver.open(config.index, config.width, config.height)?;
        let (width, height) = grabber.resolution();

        tracing::info!(
            "Opened camera {} via {} driver at {}x{}",
            config.index,
            driver.name(),
            width,
            height
        );

        let (frame_tx, frame_rx) = bounded::<RawFrame>(1);
        let evict_rx = frame_rx.clone();
        let running = Arc::new(AtomicBool::new(true));
        let frames_captured = Arc::new(AtomicU64::new(0));
        let read_errors = Arc::new(AtomicU64::new(0));

        let thread_running = running.clone();
        let thread_captured = frames_captured.clone();
        let thread_errors = read_errors.clone();
        let index = config.index;

        let handle = thread::Builder::new()
            .name(format!("capture-camera-{}", index))
            .spawn(move || {
                read_loop(
                    grabber,
                    (width, height),
                    thread_running,
                    |frame| match frame_tx.try_send(frame) {
                        Ok(()) => true,
                        Err(TrySendError::Full(frame)) => {
                            // Keep only the freshest frame
                            let _ = evict_rx.try_recv();
                            !matches!(frame_tx.try_send(frame), Err(TrySendError::Disconnected(_)))
                        }
                        Err(TrySendError::Disconnected(_)) => false,
                    },
                    thread_captured,
                    thread_errors,
                );
                tracing::debug!("Capture thread for camera {} exited", index);
            })
            .map_err(|e| CaptureError::OpenFailed {
                index,
                reason: format!("failed to spawn capture thread: {e}"),
            })?;

        Ok(Self {
            index,
            width,
            height,
            running,
            frames: frame_rx,
            thread_handle: Some(handle),
            frames_captured,
            read_errors,
        })
    }

    /// Wait up to `timeout` for the next frame.
    ///
    /// Returns `Ok(None)` when nothing arrived in time and
    /// [`CaptureError::Closed`] once the reader has stopped.
    pub fn next_frame(&self, timeout: Duration) -> Result<Option<RawFrame>, CaptureError> {
        if !self.is_open() {
            return Err(CaptureError::Closed);
        }
        match self.frames.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(CaptureError::Closed),
        }
    }

    /// Stop the reader thread and release the device
    pub fn close(&mut self) {
        let was_running = self.running.swap(false, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }

        if was_running {
            tracing::info!("Closed camera {}", self.index);
        }
    }

    pub fn is_open(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn stats(&self) -> CaptureStats {
        CaptureStats {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
        }
    }
}

impl Drop for CaptureSource {
    fn drop(&mut self) {
        self.close();
    }
}

fn read_loop(
    mut grabber: Box<dyn FrameGrabber>,
    (width, height): (u32, u32),
    running: Arc<AtomicBool>,
    mut deliver: impl FnMut(RawFrame) -> bool,
    frames_captured: Arc<AtomicU64>,
    read_errors: Arc<AtomicU64>,
) {
    let mut sequence: u64 = 0;
    let mut consecutive_failures: u64 = 0;

    while running.load(Ordering::Relaxed) {
        match grabber.grab() {
            Ok(pixels) => {
                consecutive_failures = 0;
                let frame = RawFrame::new(pixels, width, height, sequence);
                if !frame.is_valid() {
                    read_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        "Dropping frame {} with {} bytes (expected {})",
                        sequence,
                        frame.pixels.len(),
                        RawFrame::expected_len(width, height)
                    );
                    continue;
                }
                sequence += 1;
                frames_captured.fetch_add(1, Ordering::Relaxed);
                if !deliver(frame) {
                    break;
                }
            }
            Err(e) => {
                read_errors.fetch_add(1, Ordering::Relaxed);
                consecutive_failures += 1;
                if consecutive_failures == 1 || consecutive_failures % 100 == 0 {
                    tracing::warn!("{} ({} in a row), retrying", e, consecutive_failures);
                }
                thread::sleep(READ_RETRY_DELAY);
            }
        }
    }
}
