//! Rolling frame-rate estimate

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Frames-per-second over a sliding window of recent frame times
#[derive(Debug)]
pub struct FpsMeter {
    window: Duration,
    ticks: VecDeque<Instant>,
}

impl FpsMeter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            ticks: VecDeque::new(),
        }
    }

    /// Record a produced frame and return the updated estimate
    pub fn tick(&mut self, now: Instant) -> f32 {
        self.ticks.push_back(now);
        while let Some(&oldest) = self.ticks.front() {
            if now.duration_since(oldest) > self.window && self.ticks.len() > 2 {
                self.ticks.pop_front();
            } else {
                break;
            }
        }
        self.fps()
    }

    pub fn fps(&self) -> f32 {
        match (self.ticks.front(), self.ticks.back()) {
            (Some(first), Some(last)) if self.ticks.len() > 1 => {
                let span = last.duration_since(*first).as_secs_f32();
                if span > 0.0 {
                    (self.ticks.len() - 1) as f32 / span
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }
}

impl Default for FpsMeter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
