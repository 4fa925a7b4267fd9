//! Sampler configuration

use depth_frame::{ConfidenceLevel, SensorProfile};
use serde::{Deserialize, Serialize};

use crate::SampleError;

/// How grid points are laid over a region
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SamplingGrid {
    /// Every `step`-th pixel on both axes
    Stride { step: usize },
    /// Per-axis count scaled to the region extent
    Adaptive {
        min_per_side: usize,
        max_per_side: usize,
        pixels_per_sample: usize,
    },
}

impl Default for SamplingGrid {
    fn default() -> Self {
        SamplingGrid::Adaptive {
            min_per_side: 5,
            max_per_side: 20,
            pixels_per_sample: 8,
        }
    }
}

/// Sampler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Nearest accepted depth (meters)
    pub min_valid_depth: f32,
    /// Farthest accepted depth (meters)
    pub max_valid_depth: f32,
    /// Lowest confidence tier kept when a confidence map is present
    pub min_confidence: ConfidenceLevel,
    /// Fewer accepted samples than this is "no reading"
    pub min_samples: usize,
    /// Grid layout
    pub grid: SamplingGrid,
    /// Gaussian falloff `k` in `exp(-k (u² + v²))`
    pub center_falloff: f32,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self::for_sensor(&SensorProfile::default())
    }
}

impl SamplerConfig {
    /// Config using the sensor's usable range
    pub fn for_sensor(profile: &SensorProfile) -> Self {
        Self {
            min_valid_depth: profile.min_valid_depth,
            max_valid_depth: profile.max_valid_depth,
            min_confidence: ConfidenceLevel::Medium,
            min_samples: 8,
            grid: SamplingGrid::default(),
            center_falloff: 2.0,
        }
    }

    /// Check parameter consistency (construction-time only)
    pub fn validate(&self) -> Result<(), SampleError> {
        if !self.min_valid_depth.is_finite() || !self.max_valid_depth.is_finite() {
            return Err(SampleError::Config("depth range must be finite".to_string()));
        }
        if self.min_valid_depth <= 0.0 || self.min_valid_depth >= self.max_valid_depth {
            return Err(SampleError::Config(format!(
                "depth range [{}, {}] must satisfy 0 < min < max",
                self.min_valid_depth, self.max_valid_depth
            )));
        }
        if self.min_samples == 0 {
            return Err(SampleError::Config("min_samples must be at least 1".to_string()));
        }
        if !(self.center_falloff.is_finite() && self.center_falloff >= 0.0) {
            return Err(SampleError::Config("center_falloff must be >= 0".to_string()));
        }
        match self.grid {
            SamplingGrid::Stride { step: 0 } => {
                Err(SampleError::Config("stride step must be at least 1".to_string()))
            }
            SamplingGrid::Adaptive {
                min_per_side,
                max_per_side,
                pixels_per_sample,
            } if min_per_side == 0 || min_per_side > max_per_side || pixels_per_sample == 0 => {
                Err(SampleError::Config(format!(
                    "adaptive grid {}..{} per side, {} px/sample is invalid",
                    min_per_side, max_per_side, pixels_per_sample
                )))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(SamplerConfig::default().validate().is_ok());
        assert!(SamplerConfig::for_sensor(&SensorProfile::stereo()).validate().is_ok());
    }

    #[test]
    fn test_inverted_range_rejected() {
        let config = SamplerConfig {
            min_valid_depth: 5.0,
            max_valid_depth: 5.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_grid_rejected() {
        let config = SamplerConfig {
            grid: SamplingGrid::Stride { step: 0 },
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SamplerConfig {
            grid: SamplingGrid::Adaptive {
                min_per_side: 10,
                max_per_side: 5,
                pixels_per_sample: 8,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
