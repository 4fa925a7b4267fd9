//! Depth Sampling
//!
//! Extracts weighted depth samples from a region of a depth map:
//! confidence filtering, range validation, and a centre-weighted Gaussian prior.

mod config;
mod error;
mod sampler;
mod validator;

pub use config::{SamplerConfig, SamplingGrid};
pub use error::SampleError;
pub use sampler::DepthSampler;
pub use validator::{DepthValidator, Rejection};

use serde::{Deserialize, Serialize};

/// A validated depth reading with its trust weight
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthSample {
    /// Depth in meters, finite and within the sensor's valid range
    pub value: f32,
    /// Non-negative weight
    pub weight: f32,
}

impl DepthSample {
    pub fn new(value: f32, weight: f32) -> Self {
        Self { value, weight }
    }
}

/// Counts of grid points dropped by each filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionStats {
    pub low_confidence: usize,
    pub non_finite: usize,
    pub non_positive: usize,
    pub out_of_range: usize,
}

impl RejectionStats {
    pub fn total(&self) -> usize {
        self.low_confidence + self.non_finite + self.non_positive + self.out_of_range
    }

    fn record(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::LowConfidence => self.low_confidence += 1,
            Rejection::NonFinite => self.non_finite += 1,
            Rejection::NonPositive => self.non_positive += 1,
            Rejection::OutOfRange => self.out_of_range += 1,
        }
    }
}

/// Samples accepted from one region
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleSet {
    /// Accepted samples
    pub samples: Vec<DepthSample>,
    /// Grid points visited (upper bound on `samples.len()`)
    pub grid_points: usize,
    /// Why the remaining grid points were dropped
    pub rejected: RejectionStats,
}

impl SampleSet {
    /// Build a set from pre-weighted samples with no grid information
    pub fn from_samples(samples: Vec<DepthSample>) -> Self {
        Self {
            grid_points: samples.len(),
            samples,
            rejected: RejectionStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
