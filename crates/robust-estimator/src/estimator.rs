//! Distance estimator

use depth_sampler::{DepthSample, SampleSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::confidence::{ConfidenceFactors, ConfidenceModel};
use crate::weighted::{weighted_mad, weighted_median};
use crate::{DistanceEstimate, EstimatorError};

/// Estimate plus the statistics behind its confidence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimation {
    pub estimate: DistanceEstimate,
    /// Weighted median absolute deviation (meters)
    pub mad: f32,
    /// MAD divided by the median
    pub normalized_mad: f32,
    /// Weight share of samples far from the median
    pub tail_fraction: f32,
    pub factors: ConfidenceFactors,
}

/// Reduces weighted samples to a single distance and confidence
#[derive(Debug, Clone)]
pub struct RobustEstimator {
    model: ConfidenceModel,
}

impl Default for RobustEstimator {
    fn default() -> Self {
        Self {
            model: ConfidenceModel::default(),
        }
    }
}

impl RobustEstimator {
    /// Create an estimator; rejects malformed curve parameters
    pub fn new(model: ConfidenceModel) -> Result<Self, EstimatorError> {
        model.validate()?;
        info!("Creating robust estimator with model: {:?}", model);
        Ok(Self { model })
    }

    pub fn model(&self) -> &ConfidenceModel {
        &self.model
    }

    /// Estimate distance for a sampled region
    pub fn estimate(&self, set: &SampleSet, timestamp_ns: u64) -> DistanceEstimate {
        self.estimate_detailed(&set.samples, set.grid_points, timestamp_ns)
            .map(|e| e.estimate)
            .unwrap_or_else(|| DistanceEstimate::no_reading(timestamp_ns))
    }

    /// Estimate from bare samples with no grid information
    pub fn estimate_samples(&self, samples: &[DepthSample], timestamp_ns: u64) -> DistanceEstimate {
        self.estimate_detailed(samples, samples.len(), timestamp_ns)
            .map(|e| e.estimate)
            .unwrap_or_else(|| DistanceEstimate::no_reading(timestamp_ns))
    }

    /// Full estimation; `None` when there are no samples
    pub fn estimate_detailed(
        &self,
        samples: &[DepthSample],
        grid_points: usize,
        timestamp_ns: u64,
    ) -> Option<Estimation> {
        let median = weighted_median(samples)?;
        let mad = weighted_mad(samples, median)?;
        let normalized_mad = self.model.normalize_mad(mad, median);
        let tail_fraction = self.tail_fraction(samples, median);

        let count = samples.len();
        let factors = ConfidenceFactors {
            coverage: self.model.coverage(count, grid_points),
            consistency: self.model.consistency(normalized_mad, tail_fraction),
            range: self.model.range.score(median),
            density: self.model.density(count),
        };
        let confidence = factors.product();

        debug!(
            "Estimate {:.3} m (conf={:.2}, n={}, nmad={:.3}, tail={:.2})",
            median, confidence, count, normalized_mad, tail_fraction
        );

        Some(Estimation {
            estimate: DistanceEstimate {
                distance: Some(median),
                confidence,
                sample_count: count,
                timestamp_ns,
            },
            mad,
            normalized_mad,
            tail_fraction,
            factors,
        })
    }

    /// Weight share of samples deviating more than `tail_tolerance * median`
    fn tail_fraction(&self, samples: &[DepthSample], median: f32) -> f32 {
        let limit = self.model.tail_tolerance * median.max(self.model.epsilon);
        let (tail, total) = samples.iter().fold((0.0f64, 0.0f64), |(tail, total), s| {
            let w = if s.weight.is_finite() { s.weight.max(0.0) as f64 } else { 0.0 };
            let tail = if (s.value - median).abs() > limit { tail + w } else { tail };
            (tail, total + w)
        });
        if total > 0.0 {
            (tail / total) as f32
        } else {
            let outliers = samples
                .iter()
                .filter(|s| (s.value - median).abs() > limit)
                .count();
            outliers as f32 / samples.len().max(1) as f32
        }
    }
}
