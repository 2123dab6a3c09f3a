//! Track ledger
//!
//! Follows which track ids are currently in view. A track that drops out of
//! the detections is kept for a persistence window before it is retired, so
//! brief occlusions do not show up as a new object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::inference::Detection;

/// One active track as reported by the status surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSummary {
    pub track_id: u64,
    pub class_name: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Tracks that appeared or were retired during one update
#[derive(Debug, Default, PartialEq)]
pub struct TrackChanges {
    pub new: Vec<u64>,
    pub removed: Vec<u64>,
}

impl TrackChanges {
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug)]
pub struct TrackLedger {
    active: HashMap<u64, TrackSummary>,
    persistence: chrono::Duration,
}

impl TrackLedger {
    pub fn new(persistence: Duration) -> Self {
        Self {
            active: HashMap::new(),
            persistence: chrono::Duration::from_std(persistence)
                .unwrap_or_else(|_| chrono::Duration::seconds(10)),
        }
    }

    /// Fold one frame's detections into the ledger.
    ///
    /// Detections without a track id are ignored.
    pub fn update(&mut self, detections: &[Detection], now: DateTime<Utc>) -> TrackChanges {
        let mut changes = TrackChanges::default();

        for det in detections {
            let Some(track_id) = det.track_id else {
                continue;
            };
            match self.active.get_mut(&track_id) {
                Some(entry) => entry.last_seen = now,
                None => {
                    self.active.insert(
                        track_id,
                        TrackSummary {
                            track_id,
                            class_name: det.class_name.clone(),
                            first_seen: now,
                            last_seen: now,
                        },
                    );
                    changes.new.push(track_id);
                }
            }
        }

        let persistence = self.persistence;
        self.active.retain(|&track_id, entry| {
            let keep = now - entry.last_seen <= persistence;
            if !keep {
                changes.removed.push(track_id);
            }
            keep
        });

        changes.new.sort_unstable();
        changes.removed.sort_unstable();
        changes
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Active tracks ordered by id
    pub fn snapshot(&self) -> Vec<TrackSummary> {
        let mut tracks: Vec<TrackSummary> = self.active.values().cloned().collect();
        tracks.sort_by_key(|t| t.track_id);
        tracks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::BoundingBox;

    fn det(track_id: Option<u64>) -> Detection {
        Detection {
            track_id,
            class_id: 16,
            class_name: "dog".into(),
            confidence: 0.8,
            bbox: BoundingBox::new(0.0, 0.0, 1.0, 1.0),
        }
    }

    #[test]
    fn test_new_and_persisting_tracks() {
        let mut ledger = TrackLedger::new(Duration::from_secs(10));
        let t0 = Utc::now();

        let changes = ledger.update(&[det(Some(1)), det(Some(2)), det(None)], t0);
        assert_eq!(changes.new, vec![1, 2]);
        assert!(changes.removed.is_empty());

        // Track 2 missing but inside the persistence window
        let changes = ledger.update(&[det(Some(1))], t0 + chrono::Duration::seconds(5));
        assert!(changes.is_empty());
        assert_eq!(ledger.len(), 2);

        let changes = ledger.update(&[det(Some(1))], t0 + chrono::Duration::seconds(11));
        assert_eq!(changes.removed, vec![2]);
        assert_eq!(ledger.snapshot().len(), 1);
        assert_eq!(ledger.snapshot()[0].first_seen, t0);
    }
}
