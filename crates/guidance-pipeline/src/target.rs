//! Target identity across frames
//!
//! Detections carry no identity of their own. Each frame they are matched to
//! the previous frame's tracks by equal label and nearest centre, greedily
//! from the closest pair. Tracks that go unmatched for too long are lost.
//! Detections below the detector confidence floor are ignored entirely.

use depth_frame::RegionOfInterest;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::ConfigError;

/// Key of a smoothed target
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TargetKey {
    /// The fixed focus box
    FocusBox,
    /// A tracked detection
    Track(u64),
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKey::FocusBox => write!(f, "focus"),
            TargetKey::Track(id) => write!(f, "track-{}", id),
        }
    }
}

/// Object detection from the detector layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    pub bbox: RegionOfInterest,
}

/// Identity matching parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Largest centre distance (normalized units) for a match
    pub match_distance: f32,
    /// Frames a track may go unmatched before it is lost
    pub max_missed_frames: u32,
    /// Detector confidence below which a detection is dropped
    pub min_detection_confidence: f32,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            match_distance: 0.15,
            max_missed_frames: 2,
            min_detection_confidence: 0.3,
        }
    }
}

impl IdentityConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.match_distance.is_finite() && self.match_distance > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "match_distance {} must be positive",
                self.match_distance
            )));
        }
        if !(0.0..=1.0).contains(&self.min_detection_confidence) {
            return Err(ConfigError::Invalid(format!(
                "min_detection_confidence {} outside [0, 1]",
                self.min_detection_confidence
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Track {
    id: u64,
    label: String,
    center: (f32, f32),
    missed: u32,
}

/// Result of matching one frame of detections
#[derive(Debug, Clone, Default)]
pub struct IdentityUpdate {
    /// Detections with their keys, in input order
    pub assigned: Vec<(TargetKey, Detection)>,
    /// Tracks that were dropped this frame
    pub lost: Vec<TargetKey>,
}

/// Greedy label + nearest-centre tracker
#[derive(Debug, Clone)]
pub struct IdentityTracker {
    config: IdentityConfig,
    tracks: Vec<Track>,
    next_id: u64,
}

impl IdentityTracker {
    pub fn new(config: IdentityConfig) -> Self {
        Self {
            config,
            tracks: Vec::new(),
            next_id: 1,
        }
    }

    /// Match `detections` against the current tracks
    pub fn update(&mut self, mut detections: Vec<Detection>) -> IdentityUpdate {
        let floor = self.config.min_detection_confidence;
        detections.retain(|d| {
            let keep = d.confidence >= floor;
            if !keep {
                debug!("Ignoring {} detection at confidence {:.2}", d.label, d.confidence);
            }
            keep
        });

        let centers: Vec<(f32, f32)> = detections
            .iter()
            .map(|d| d.bbox.to_top_left().center())
            .collect();

        let mut candidates = Vec::new();
        for (t, track) in self.tracks.iter().enumerate() {
            for (d, det) in detections.iter().enumerate() {
                if det.label != track.label {
                    continue;
                }
                let (dx, dy) = (centers[d].0 - track.center.0, centers[d].1 - track.center.1);
                let dist = (dx * dx + dy * dy).sqrt();
                if dist <= self.config.match_distance {
                    candidates.push((dist, t, d));
                }
            }
        }
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut track_taken = vec![false; self.tracks.len()];
        let mut det_key: Vec<Option<TargetKey>> = vec![None; detections.len()];
        for (_, t, d) in candidates {
            if track_taken[t] || det_key[d].is_some() {
                continue;
            }
            track_taken[t] = true;
            let track = &mut self.tracks[t];
            track.center = centers[d];
            track.missed = 0;
            det_key[d] = Some(TargetKey::Track(track.id));
        }

        let mut lost = Vec::new();
        let max_missed = self.config.max_missed_frames;
        let mut index = 0;
        self.tracks.retain_mut(|track| {
            let matched = track_taken[index];
            index += 1;
            if matched {
                return true;
            }
            track.missed += 1;
            if track.missed > max_missed {
                debug!("Track {} ({}) lost", track.id, track.label);
                lost.push(TargetKey::Track(track.id));
                false
            } else {
                true
            }
        });

        let mut assigned = Vec::with_capacity(detections.len());
        for ((detection, key), center) in detections.into_iter().zip(det_key).zip(centers) {
            let key = match key {
                Some(key) => key,
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    debug!("New track {} ({})", id, detection.label);
                    self.tracks.push(Track {
                        id,
                        label: detection.label.clone(),
                        center,
                        missed: 0,
                    });
                    TargetKey::Track(id)
                }
            };
            assigned.push((key, detection));
        }

        IdentityUpdate { assigned, lost }
    }

    /// Live tracks
    pub fn active(&self) -> usize {
        self.tracks.len()
    }

    /// Drop every track (session stop); ids are never reused
    pub fn reset(&mut self) {
        self.tracks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depth_frame::Origin;

    fn det(label: &str, x: f32, y: f32) -> Detection {
        Detection {
            label: label.to_string(),
            confidence: 0.9,
            bbox: RegionOfInterest::new(x, y, 0.2, 0.2, Origin::TopLeft).unwrap(),
        }
    }

    fn keys(update: &IdentityUpdate) -> Vec<TargetKey> {
        update.assigned.iter().map(|(k, _)| *k).collect()
    }

    #[test]
    fn test_identity_kept_across_small_motion() {
        let mut tracker = IdentityTracker::new(IdentityConfig::default());
        let first = tracker.update(vec![det("person", 0.1, 0.1), det("chair", 0.6, 0.6)]);
        let second = tracker.update(vec![det("chair", 0.62, 0.6), det("person", 0.15, 0.1)]);

        assert_eq!(keys(&first), vec![TargetKey::Track(1), TargetKey::Track(2)]);
        assert_eq!(keys(&second), vec![TargetKey::Track(2), TargetKey::Track(1)]);
        assert!(second.lost.is_empty());
    }

    #[test]
    fn test_label_must_match() {
        let mut tracker = IdentityTracker::new(IdentityConfig::default());
        tracker.update(vec![det("person", 0.1, 0.1)]);
        let update = tracker.update(vec![det("dog", 0.1, 0.1)]);
        assert_eq!(keys(&update), vec![TargetKey::Track(2)]);
    }

    #[test]
    fn test_jump_creates_new_track() {
        let mut tracker = IdentityTracker::new(IdentityConfig::default());
        tracker.update(vec![det("person", 0.1, 0.1)]);
        let update = tracker.update(vec![det("person", 0.7, 0.7)]);
        assert_eq!(keys(&update), vec![TargetKey::Track(2)]);
    }

    #[test]
    fn test_closest_pair_wins() {
        let mut tracker = IdentityTracker::new(IdentityConfig::default());
        tracker.update(vec![det("person", 0.3, 0.3)]);
        let update = tracker.update(vec![det("person", 0.4, 0.3), det("person", 0.32, 0.3)]);
        assert_eq!(keys(&update), vec![TargetKey::Track(2), TargetKey::Track(1)]);
    }

    #[test]
    fn test_track_lost_after_missed_frames() {
        let mut tracker = IdentityTracker::new(IdentityConfig::default());
        tracker.update(vec![det("person", 0.1, 0.1)]);

        assert!(tracker.update(vec![]).lost.is_empty());
        assert!(tracker.update(vec![]).lost.is_empty());
        let update = tracker.update(vec![]);
        assert_eq!(update.lost, vec![TargetKey::Track(1)]);
        assert_eq!(tracker.active(), 0);

        // Reappearing gets a fresh identity
        let update = tracker.update(vec![det("person", 0.1, 0.1)]);
        assert_eq!(keys(&update), vec![TargetKey::Track(2)]);
    }

    #[test]
    fn test_weak_detections_ignored() {
        let mut tracker = IdentityTracker::new(IdentityConfig::default());
        let weak = Detection {
            confidence: 0.1,
            ..det("person", 0.1, 0.1)
        };
        let nan = Detection {
            confidence: f32::NAN,
            ..det("chair", 0.5, 0.5)
        };

        let update = tracker.update(vec![weak, det("dog", 0.6, 0.1), nan]);
        assert_eq!(keys(&update), vec![TargetKey::Track(1)]);
        assert_eq!(update.assigned[0].1.label, "dog");
        assert_eq!(tracker.active(), 1);
    }

    #[test]
    fn test_detection_floor_validated() {
        let config = IdentityConfig {
            min_detection_confidence: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bottom_left_boxes_compared_in_one_space() {
        let mut tracker = IdentityTracker::new(IdentityConfig::default());
        let top_left = det("person", 0.1, 0.1);
        let same_box = Detection {
            bbox: top_left.bbox.with_origin(Origin::BottomLeft),
            ..top_left.clone()
        };
        tracker.update(vec![top_left]);
        let update = tracker.update(vec![same_box]);
        assert_eq!(keys(&update), vec![TargetKey::Track(1)]);
    }
}
