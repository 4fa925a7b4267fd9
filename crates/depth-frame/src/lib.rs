//! Depth Frame Library for Depth Guidance
//!
//! Provides read-only access to depth sensor output:
//! - Strided 32-bit float depth maps (meters)
//! - Optional 1 byte/pixel confidence maps
//! - Normalized regions of interest with a declared origin
//! - Scoped leases over producer-owned frame buffers

pub mod frame;
pub mod lease;
pub mod region;

pub use frame::{ConfidenceLevel, ConfidenceMap, DepthMap, OwnedConfidenceMap, OwnedDepthMap};
pub use lease::SharedDepthFrame;
pub use region::{Origin, PixelRect, RegionOfInterest};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Depth frame error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DepthFrameError {
    #[error("Row stride {stride} is smaller than {min} bytes")]
    Stride { stride: usize, min: usize },

    #[error("Buffer holds {actual} bytes, {required} required")]
    BufferTooSmall { actual: usize, required: usize },

    #[error("Invalid dimensions {width}x{height}")]
    Dimensions { width: usize, height: usize },

    #[error("Confidence map is {actual:?}, depth map is {expected:?}")]
    ConfidenceMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Invalid region: {0}")]
    Region(String),

    #[error("Frame buffer was released by its producer")]
    Released,

    #[error("Frame buffer lock poisoned")]
    Poisoned,
}

/// Depth sensor class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorKind {
    /// Time-of-flight scanner with per-pixel confidence
    Lidar,
    /// Stereo / dual-camera disparity depth, no confidence map
    Stereo,
}

/// Capabilities and usable range of a depth sensor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorProfile {
    /// Sensor class
    pub kind: SensorKind,
    /// Whether frames carry a confidence map
    pub has_confidence_map: bool,
    /// Nearest trustworthy depth (meters)
    pub min_valid_depth: f32,
    /// Farthest trustworthy depth (meters)
    pub max_valid_depth: f32,
}

impl Default for SensorProfile {
    fn default() -> Self {
        Self::lidar()
    }
}

impl SensorProfile {
    /// LiDAR-class sensor profile
    pub fn lidar() -> Self {
        Self {
            kind: SensorKind::Lidar,
            has_confidence_map: true,
            min_valid_depth: 0.05,
            max_valid_depth: 25.0,
        }
    }

    /// Stereo-depth sensor profile (shorter usable range)
    pub fn stereo() -> Self {
        Self {
            kind: SensorKind::Stereo,
            has_confidence_map: false,
            min_valid_depth: 0.1,
            max_valid_depth: 10.0,
        }
    }
}
