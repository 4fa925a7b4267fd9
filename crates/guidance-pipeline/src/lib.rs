//! Depth Guidance Pipeline
//!
//! Fuses detections with depth frames into guidance events:
//! - Identity matching of detections across frames
//! - Region sampling under a scoped frame lease
//! - Robust estimation off the lease (pure, `Send`)
//! - Temporal smoothing, step/curb detection, proximity tiers
//! - Latest-wins async runner with generation-checked commits

pub mod generation;
pub mod pipeline;
pub mod runner;
pub mod settings;
pub mod target;

pub use generation::{Generations, Ticket};
pub use pipeline::{
    FrameEstimates, FramePlan, FrameReport, GuidancePipeline, ProximityEvent, TargetUpdate,
};
pub use runner::{Command, GuidanceHandle, GuidanceRunner};
pub use settings::{ConfigError, PipelineConfig, StripLayout};
pub use target::{Detection, IdentityConfig, IdentityTracker, IdentityUpdate, TargetKey};

use thiserror::Error;

/// Pipeline error types
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid region: {0}")]
    Region(#[from] depth_frame::DepthFrameError),

    #[error("Estimation task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Guidance runner has shut down")]
    Closed,
}
