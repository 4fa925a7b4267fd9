//! Sampling Error Types

use depth_frame::DepthFrameError;
use thiserror::Error;

/// Errors during depth sampling
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SampleError {
    /// Too few readings survived filtering; treat as "no reading"
    #[error("Insufficient samples: {found} valid, {required} required")]
    InsufficientSamples { found: usize, required: usize },

    /// Frame buffer or region could not be used
    #[error("Frame error: {0}")]
    Frame(#[from] DepthFrameError),

    /// Malformed sampler configuration
    #[error("Invalid sampler config: {0}")]
    Config(String),
}
