//! Robust Distance Estimation
//!
//! Reduces a set of weighted depth samples to one distance and a confidence
//! score: weighted median, weighted MAD, and a four-factor confidence model.

mod confidence;
mod estimator;
mod weighted;

pub use confidence::{ConfidenceFactors, ConfidenceModel, RangeQuality};
pub use estimator::{Estimation, RobustEstimator};
pub use weighted::{weighted_mad, weighted_median};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Estimator error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimatorError {
    #[error("Invalid confidence model: {0}")]
    Config(String),
}

/// One distance reading for one region
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceEstimate {
    /// Distance in meters; `None` means no reading
    pub distance: Option<f32>,
    /// Trust in `distance`, 0.0 to 1.0 (0 = do not use)
    pub confidence: f32,
    /// Samples that contributed
    pub sample_count: usize,
    /// Frame timestamp (nanoseconds)
    pub timestamp_ns: u64,
}

impl DistanceEstimate {
    /// No usable reading for this frame
    pub fn no_reading(timestamp_ns: u64) -> Self {
        Self {
            distance: None,
            confidence: 0.0,
            sample_count: 0,
            timestamp_ns,
        }
    }

    pub fn is_reading(&self) -> bool {
        self.distance.is_some() && self.confidence > 0.0
    }

    /// Distance, if confidence reaches `min_confidence`
    pub fn reliable_distance(&self, min_confidence: f32) -> Option<f32> {
        self.distance.filter(|_| self.confidence >= min_confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_reading_is_untrusted() {
        let e = DistanceEstimate::no_reading(42);
        assert!(!e.is_reading());
        assert_eq!(e.reliable_distance(0.0), None);
        assert_eq!(e.timestamp_ns, 42);
    }

    #[test]
    fn test_reliable_distance_gate() {
        let e = DistanceEstimate {
            distance: Some(1.5),
            confidence: 0.6,
            sample_count: 20,
            timestamp_ns: 0,
        };
        assert_eq!(e.reliable_distance(0.5), Some(1.5));
        assert_eq!(e.reliable_distance(0.7), None);
    }
}
