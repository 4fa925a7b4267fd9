//! Per-pixel depth validation

use depth_frame::ConfidenceLevel;

use crate::SamplerConfig;

/// Why a grid point was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    LowConfidence,
    NonFinite,
    NonPositive,
    OutOfRange,
}

/// Range and confidence checks for raw readings
#[derive(Debug, Clone)]
pub struct DepthValidator {
    min_depth: f32,
    max_depth: f32,
    min_confidence: ConfidenceLevel,
}

impl DepthValidator {
    pub fn new(config: &SamplerConfig) -> Self {
        Self {
            min_depth: config.min_valid_depth,
            max_depth: config.max_valid_depth,
            min_confidence: config.min_confidence,
        }
    }

    /// Validate a reading; confidence is checked before the value itself
    pub fn validate(&self, depth: f32, confidence: Option<ConfidenceLevel>) -> Result<f32, Rejection> {
        if let Some(level) = confidence {
            if level < self.min_confidence {
                return Err(Rejection::LowConfidence);
            }
        }
        self.validate_range(depth)
    }

    /// Validate a depth value against the sensor range
    pub fn validate_range(&self, depth: f32) -> Result<f32, Rejection> {
        if !depth.is_finite() {
            Err(Rejection::NonFinite)
        } else if depth <= 0.0 {
            Err(Rejection::NonPositive)
        } else if depth < self.min_depth || depth > self.max_depth {
            Err(Rejection::OutOfRange)
        } else {
            Ok(depth)
        }
    }
}
