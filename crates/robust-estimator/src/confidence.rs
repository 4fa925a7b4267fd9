//! Confidence scoring
//!
//! Confidence is the product of four independent factors in [0, 1]. Each
//! factor is monotonic in its input and bounded, so the product is too.

use serde::{Deserialize, Serialize};

use crate::EstimatorError;

/// Range-quality bump: 1.0 inside the sensor sweet spot, ramping down to
/// `floor` at `near_limit` and `far_limit`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeQuality {
    pub near_limit: f32,
    pub ideal_min: f32,
    pub ideal_max: f32,
    pub far_limit: f32,
    pub floor: f32,
}

impl Default for RangeQuality {
    fn default() -> Self {
        Self {
            near_limit: 0.3,
            ideal_min: 0.5,
            ideal_max: 3.0,
            far_limit: 5.0,
            floor: 0.4,
        }
    }
}

impl RangeQuality {
    /// Quality of a reading at `distance` meters
    pub fn score(&self, distance: f32) -> f32 {
        let t = if distance < self.ideal_min {
            (distance - self.near_limit) / (self.ideal_min - self.near_limit)
        } else if distance > self.ideal_max {
            1.0 - (distance - self.ideal_max) / (self.far_limit - self.ideal_max)
        } else {
            1.0
        };
        if t >= 1.0 {
            1.0
        } else {
            self.floor + (1.0 - self.floor) * t.max(0.0)
        }
    }
}

/// Tunable shape of the confidence curves
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceModel {
    /// Accepted/visited grid ratio at which coverage saturates
    pub coverage_saturation: f32,
    /// Sharpness `k` in `1 - k * normalized_mad`
    pub consistency_sharpness: f32,
    /// Deviation (fraction of the median) beyond which a sample is a tail sample
    pub tail_tolerance: f32,
    /// Penalty per unit of tail weight fraction
    pub tail_gain: f32,
    /// Distance quality curve
    pub range: RangeQuality,
    /// Density factor with a single sample
    pub density_floor: f32,
    /// Sample count scale of the density curve
    pub density_scale: f32,
    /// Lower bound on the median when normalizing MAD
    pub epsilon: f32,
}

impl Default for ConfidenceModel {
    fn default() -> Self {
        Self {
            coverage_saturation: 0.6,
            consistency_sharpness: 4.0,
            tail_tolerance: 0.15,
            tail_gain: 1.0,
            range: RangeQuality::default(),
            density_floor: 0.7,
            density_scale: 15.0,
            epsilon: 1e-3,
        }
    }
}

/// Individual confidence factors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceFactors {
    pub coverage: f32,
    pub consistency: f32,
    pub range: f32,
    pub density: f32,
}

impl ConfidenceFactors {
    /// Combined confidence
    pub fn product(&self) -> f32 {
        (self.coverage * self.consistency * self.range * self.density).clamp(0.0, 1.0)
    }
}

impl ConfidenceModel {
    /// Check curve parameters (construction-time only)
    pub fn validate(&self) -> Result<(), EstimatorError> {
        let r = &self.range;
        if !(r.near_limit < r.ideal_min && r.ideal_min <= r.ideal_max && r.ideal_max < r.far_limit) {
            return Err(EstimatorError::Config(format!(
                "range breakpoints must increase: {} < {} <= {} < {}",
                r.near_limit, r.ideal_min, r.ideal_max, r.far_limit
            )));
        }
        let unit = |name: &str, v: f32| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(EstimatorError::Config(format!("{} must be in [0, 1], got {}", name, v)))
            }
        };
        unit("range floor", r.floor)?;
        unit("density_floor", self.density_floor)?;
        if !(self.coverage_saturation > 0.0 && self.coverage_saturation <= 1.0) {
            return Err(EstimatorError::Config("coverage_saturation must be in (0, 1]".to_string()));
        }
        let positive = [
            ("consistency_sharpness", self.consistency_sharpness),
            ("tail_tolerance", self.tail_tolerance),
            ("density_scale", self.density_scale),
            ("epsilon", self.epsilon),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(EstimatorError::Config(format!("{} must be > 0, got {}", name, value)));
            }
        }
        if !(self.tail_gain.is_finite() && self.tail_gain >= 0.0) {
            return Err(EstimatorError::Config("tail_gain must be >= 0".to_string()));
        }
        Ok(())
    }

    /// Accepted samples relative to grid points visited, saturating
    pub fn coverage(&self, sample_count: usize, grid_points: usize) -> f32 {
        if sample_count == 0 {
            return 0.0;
        }
        let ratio = sample_count as f32 / grid_points.max(sample_count) as f32;
        (ratio / self.coverage_saturation).min(1.0)
    }

    /// Spread penalty: `normalized_mad` plus the weight share of tail samples
    pub fn consistency(&self, normalized_mad: f32, tail_fraction: f32) -> f32 {
        let mad_term = (1.0 - normalized_mad * self.consistency_sharpness).max(0.0);
        let tail_term = (1.0 - tail_fraction * self.tail_gain).max(0.0);
        mad_term * tail_term
    }

    /// Diminishing returns in absolute sample count
    pub fn density(&self, sample_count: usize) -> f32 {
        if sample_count == 0 {
            return 0.0;
        }
        let saturation = 1.0 - (-(sample_count as f32) / self.density_scale).exp();
        self.density_floor + (1.0 - self.density_floor) * saturation
    }

    /// MAD relative to the median
    pub fn normalize_mad(&self, mad: f32, median: f32) -> f32 {
        mad / median.max(self.epsilon)
    }
}
