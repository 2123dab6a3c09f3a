//! Synthetic camera driver
//!
//! Generates a gradient background with a single magenta marker square that
//! bounces across the frame. The built-in `marker` detector looks for it, so
//! the whole pipeline can run without hardware.

use std::thread;
use std::time::Duration;

use crate::capture::device::{CameraDriver, FrameGrabber};
use crate::error::CaptureError;

/// Colour of the moving marker
pub const MARKER_COLOR: [u8; 3] = [255, 0, 255];

/// Driver exposing a fixed set of synthetic device indices
#[derive(Debug, Clone)]
pub struct SyntheticDriver {
    available: Vec<u32>,
    cadence: Option<Duration>,
    fail_every: Option<u64>,
}

impl SyntheticDriver {
    /// Driver where only the given indices can be opened
    pub fn new(available: Vec<u32>) -> Self {
        Self {
            available,
            cadence: Some(Duration::from_millis(16)),
            fail_every: None,
        }
    }

    /// Simulated device frame interval; None reads as fast as possible
    pub fn with_cadence(mut self, cadence: Option<Duration>) -> Self {
        self.cadence = cadence;
        self
    }

    /// Make every n-th read fail with a transient error
    pub fn with_read_failures(mut self, every: u64) -> Self {
        self.fail_every = Some(every.max(1));
        self
    }
}

impl Default for SyntheticDriver {
    fn default() -> Self {
        Self::new(vec![0])
    }
}

impl CameraDriver for SyntheticDriver {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn open(
        &self,
        index: u32,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn FrameGrabber>, CaptureError> {
        if !self.available.contains(&index) {
            return Err(CaptureError::OpenFailed {
                index,
                reason: "no such device".to_string(),
            });
        }
        if width < 8 || height < 8 {
            return Err(CaptureError::OpenFailed {
                index,
                reason: format!("unsupported resolution {width}x{height}"),
            });
        }

        Ok(Box::new(SyntheticCamera {
            width,
            height,
            cadence: self.cadence,
            fail_every: self.fail_every,
            reads: 0,
            marker_x: 0,
            // Slow enough that consecutive frames overlap for the tracker
            velocity: ((width.min(height) / 6) / 8).max(1) as i32,
        }))
    }
}

struct SyntheticCamera {
    width: u32,
    height: u32,
    cadence: Option<Duration>,
    fail_every: Option<u64>,
    reads: u64,
    marker_x: u32,
    velocity: i32,
}

impl SyntheticCamera {
    fn marker_size(&self) -> u32 {
        (self.width.min(self.height) / 6).max(2)
    }

    fn advance_marker(&mut self) {
        let max_x = self.width - self.marker_size();
        let next = self.marker_x as i32 + self.velocity;
        if next < 0 || next > max_x as i32 {
            self.velocity = -self.velocity;
        }
        self.marker_x = (self.marker_x as i32 + self.velocity).clamp(0, max_x as i32) as u32;
    }

    fn render(&self) -> Vec<u8> {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut pixels = vec![0u8; w * h * 3];

        for y in 0..h {
            for x in 0..w {
                let i = (y * w + x) * 3;
                // Green channel stays low so the background never matches the marker
                pixels[i] = (x * 200 / w) as u8;
                pixels[i + 1] = 32;
                pixels[i + 2] = (y * 200 / h) as u8;
            }
        }

        let size = self.marker_size() as usize;
        let top = (h - size) / 2;
        let left = self.marker_x as usize;
        for y in top..top + size {
            for x in left..left + size {
                let i = (y * w + x) * 3;
                pixels[i..i + 3].copy_from_slice(&MARKER_COLOR);
            }
        }

        pixels
    }
}

impl FrameGrabber for SyntheticCamera {
    fn grab(&mut self) -> Result<Vec<u8>, CaptureError> {
        if let Some(cadence) = self.cadence {
            thread::sleep(cadence);
        }

        self.reads += 1;
        if let Some(every) = self.fail_every {
            if self.reads % every == 0 {
                return Err(CaptureError::ReadFailed(format!(
                    "simulated read failure #{}",
                    self.reads
                )));
            }
        }

        self.advance_marker();
        Ok(self.render())
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
