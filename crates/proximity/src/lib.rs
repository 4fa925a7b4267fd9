//! Proximity Classification
//!
//! Maps smoothed distances to urgency tiers, signals tier changes with the
//! haptic cadence to use, and throttles spoken alerts per category.

mod cadence;
mod classifier;
mod throttle;
mod tier;

pub use cadence::{Cadence, CadencePolicy, CadenceSignal};
pub use classifier::{ClassifierConfig, ProximityClassifier, TierChange};
pub use throttle::{AlertThrottle, ThrottleConfig};
pub use tier::{ProximityThresholds, ProximityTier};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Proximity error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProximityError {
    #[error("Proximity thresholds must satisfy 0 < high < medium < low, got {0:?}")]
    Thresholds([f32; 3]),

    #[error("Invalid proximity config: {0}")]
    Config(String),
}

/// Speech request priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SpeechPriority {
    Info,
    Warning,
    Urgent,
}

impl From<ProximityTier> for SpeechPriority {
    fn from(tier: ProximityTier) -> Self {
        match tier {
            ProximityTier::High => SpeechPriority::Urgent,
            ProximityTier::Medium => SpeechPriority::Warning,
            ProximityTier::Low | ProximityTier::None => SpeechPriority::Info,
        }
    }
}

/// Utterance handed to the speech layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechRequest {
    /// Throttle category; pass it back to acknowledge the alert
    pub category: String,
    pub text: String,
    pub priority: SpeechPriority,
}
