//! IoU tracker
//!
//! Assigns stable track ids to detections from backends that do not track
//! on their own. Matching is greedy by descending overlap, per class.

use crate::config::TrackerConfig;
use crate::inference::detection::{BoundingBox, Detection};

#[derive(Debug, Clone)]
struct Track {
    id: u64,
    class_id: u32,
    bbox: BoundingBox,
    missed: u32,
}

/// Greedy intersection-over-union tracker
#[derive(Debug)]
pub struct IouTracker {
    config: TrackerConfig,
    tracks: Vec<Track>,
    next_id: u64,
}

impl IouTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: Vec::new(),
            next_id: 1,
        }
    }

    /// Fill in `track_id` for every detection of the current frame
    pub fn update(&mut self, detections: &mut [Detection]) {
        let mut candidates: Vec<(f32, usize, usize)> = Vec::new();
        for (ti, track) in self.tracks.iter().enumerate() {
            for (di, det) in detections.iter().enumerate() {
                if det.class_id != track.class_id {
                    continue;
                }
                let iou = track.bbox.iou(&det.bbox);
                if iou >= self.config.iou_threshold {
                    candidates.push((iou, ti, di));
                }
            }
        }
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut track_taken = vec![false; self.tracks.len()];
        let mut det_taken = vec![false; detections.len()];
        for (_, ti, di) in candidates {
            if track_taken[ti] || det_taken[di] {
                continue;
            }
            track_taken[ti] = true;
            det_taken[di] = true;

            let track = &mut self.tracks[ti];
            track.bbox = detections[di].bbox;
            track.missed = 0;
            detections[di].track_id = Some(track.id);
        }

        for (track, taken) in self.tracks.iter_mut().zip(&track_taken) {
            if !taken {
                track.missed += 1;
            }
        }
        let max_missed = self.config.max_missed_frames;
        self.tracks.retain(|t| t.missed <= max_missed);

        for (det, taken) in detections.iter_mut().zip(det_taken) {
            if taken {
                continue;
            }
            let id = self.next_id;
            self.next_id += 1;
            det.track_id = Some(id);
            self.tracks.push(Track {
                id,
                class_id: det.class_id,
                bbox: det.bbox,
                missed: 0,
            });
        }
    }

    /// Number of live tracks, including ones currently unmatched
    pub fn active_tracks(&self) -> usize {
        self.tracks.len()
    }
}
