//! Temporal Smoothing
//!
//! Bounded per-target histories with median output, plus step/curb
//! detection from differences between floor strips over time.

mod smoother;
mod step;

pub use smoother::{median, TemporalSmoother};
pub use step::{StepConfig, StepDetector, StepKind, StepReading, StepThresholds, Strip, StripReadings};

use ring_buffer::RingBufferError;
use thiserror::Error;

/// Smoother error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SmootherError {
    #[error("Smoothing window: {0}")]
    Window(#[from] RingBufferError),

    #[error("Step thresholds must satisfy 0 <= low < high, got low={low}, high={high}")]
    Thresholds { low: f32, high: f32 },

    #[error("Step history window {window} cannot satisfy min_history {min_history}")]
    History { window: usize, min_history: usize },

    #[error("Step detection must compare the near strip against a strip ahead of it")]
    CompareStrip,

    #[error("Non-finite value rejected: {0}")]
    NonFinite(f32),
}
