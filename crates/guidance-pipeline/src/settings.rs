//! Pipeline configuration
//!
//! One serde bundle for every tunable. `load` layers defaults, an optional
//! file and `DEPTH_GUIDANCE__*` environment variables, then validates.

use depth_frame::{ConfidenceLevel, DepthFrameError, Origin, RegionOfInterest, SensorKind, SensorProfile};
use depth_sampler::{SampleError, SamplerConfig, SamplingGrid};
use proximity::{CadencePolicy, ClassifierConfig, ProximityError, ProximityThresholds, ThrottleConfig};
use robust_estimator::{ConfidenceModel, EstimatorError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use temporal_smoother::{SmootherError, StepConfig, StepThresholds, Strip};
use thiserror::Error;
use tracing::info;

use crate::IdentityConfig;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "DEPTH_GUIDANCE";

/// Configuration error types (fatal at construction only)
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Source(#[from] ::config::ConfigError),

    #[error(transparent)]
    Sampler(#[from] SampleError),

    #[error(transparent)]
    Estimator(#[from] EstimatorError),

    #[error(transparent)]
    Smoother(#[from] SmootherError),

    #[error(transparent)]
    Proximity(#[from] ProximityError),

    #[error(transparent)]
    Region(#[from] DepthFrameError),

    #[error("Invalid pipeline config: {0}")]
    Invalid(String),
}

/// Placement of the three step strips inside the focus box
///
/// Offsets and thickness are fractions of the focus box height, measured
/// from its image-bottom edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripLayout {
    pub near: f32,
    pub mid: f32,
    pub far: f32,
    pub thickness: f32,
}

impl Default for StripLayout {
    fn default() -> Self {
        Self {
            near: 0.0,
            mid: 0.4,
            far: 0.8,
            thickness: 0.2,
        }
    }
}

impl StripLayout {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ordered = 0.0 <= self.near && self.near < self.mid && self.mid < self.far && self.far < 1.0;
        if !ordered || !(self.thickness > 0.0 && self.thickness <= 1.0) {
            return Err(ConfigError::Invalid(format!("strip layout {:?}", self)));
        }
        Ok(())
    }

    pub fn offset(&self, strip: Strip) -> f32 {
        match strip {
            Strip::Near => self.near,
            Strip::Mid => self.mid,
            Strip::Far => self.far,
        }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Sensor class the frames come from
    pub sensor: SensorKind,
    /// Apply the per-pixel confidence map when frames carry one
    pub use_confidence_map: bool,
    /// Nearest accepted depth (meters)
    pub min_valid_depth: f32,
    /// Farthest accepted depth (meters)
    pub max_valid_depth: f32,
    /// Lowest per-pixel confidence kept
    pub min_confidence_tier: ConfidenceLevel,
    /// Fewer accepted samples than this is "no reading"
    pub min_samples: usize,
    pub grid: SamplingGrid,
    pub center_falloff: f32,
    pub confidence_model: ConfidenceModel,
    /// Values per smoothed target
    pub smoothing_window_size: usize,
    pub step_low_threshold: f32,
    pub step_high_threshold: f32,
    /// Differences collected before a step is classified
    pub step_min_history: usize,
    /// Strip compared against the near strip
    pub step_compare: Strip,
    pub strips: StripLayout,
    /// Tier breakpoints in meters: `[high, medium, low]`
    pub proximity_thresholds: [f32; 3],
    pub min_alert_confidence: f32,
    /// Extra distance needed before easing to a less urgent tier (meters)
    pub hysteresis_margin: f32,
    pub min_alert_interval_ms: u64,
    pub max_alerts_per_minute: usize,
    pub cadence: CadencePolicy,
    /// Origin of incoming normalized boxes
    pub origin: Origin,
    /// Initial focus box
    pub focus_box: RegionOfInterest,
    pub identity: IdentityConfig,
    /// Bounded report channel size for the async runner
    pub report_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::for_sensor(&SensorProfile::default())
    }
}

impl PipelineConfig {
    /// Defaults for a sensor class
    pub fn for_sensor(profile: &SensorProfile) -> Self {
        let sampler = SamplerConfig::for_sensor(profile);
        let step = StepConfig::default();
        let classifier = ClassifierConfig::default();
        let throttle = ThrottleConfig::default();
        Self {
            sensor: profile.kind,
            use_confidence_map: profile.has_confidence_map,
            min_valid_depth: sampler.min_valid_depth,
            max_valid_depth: sampler.max_valid_depth,
            min_confidence_tier: sampler.min_confidence,
            min_samples: sampler.min_samples,
            grid: sampler.grid,
            center_falloff: sampler.center_falloff,
            confidence_model: ConfidenceModel::default(),
            smoothing_window_size: 5,
            step_low_threshold: step.thresholds.low(),
            step_high_threshold: step.thresholds.high(),
            step_min_history: step.min_history,
            step_compare: step.compare,
            strips: StripLayout::default(),
            proximity_thresholds: classifier.thresholds.as_array(),
            min_alert_confidence: classifier.min_alert_confidence,
            hysteresis_margin: classifier.hysteresis_margin,
            min_alert_interval_ms: throttle.min_interval_ms,
            max_alerts_per_minute: throttle.max_alerts_per_minute,
            cadence: CadencePolicy::default(),
            origin: Origin::TopLeft,
            focus_box: RegionOfInterest {
                x: 0.35,
                y: 0.3,
                width: 0.3,
                height: 0.5,
                origin: Origin::TopLeft,
            },
            identity: IdentityConfig::default(),
            report_capacity: 16,
        }
    }

    /// Load from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ::config::Config::builder().add_source(::config::Config::try_from(&Self::default())?);
        if let Some(path) = path {
            info!("Loading pipeline config from {}", path.display());
            builder = builder.add_source(::config::File::from(path));
        }
        let config: Self = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            min_valid_depth: self.min_valid_depth,
            max_valid_depth: self.max_valid_depth,
            min_confidence: self.min_confidence_tier,
            min_samples: self.min_samples,
            grid: self.grid,
            center_falloff: self.center_falloff,
        }
    }

    pub fn step_config(&self) -> Result<StepConfig, ConfigError> {
        Ok(StepConfig {
            thresholds: StepThresholds::new(self.step_low_threshold, self.step_high_threshold)?,
            strip_window: self.smoothing_window_size,
            delta_window: self.smoothing_window_size.max(self.step_min_history),
            min_history: self.step_min_history,
            compare: self.step_compare,
        })
    }

    pub fn classifier_config(&self) -> Result<ClassifierConfig, ConfigError> {
        Ok(ClassifierConfig {
            thresholds: ProximityThresholds::new(self.proximity_thresholds)?,
            min_alert_confidence: self.min_alert_confidence,
            hysteresis_margin: self.hysteresis_margin,
        })
    }

    pub fn throttle_config(&self) -> ThrottleConfig {
        ThrottleConfig {
            min_confidence: self.min_alert_confidence,
            min_interval_ms: self.min_alert_interval_ms,
            max_alerts_per_minute: self.max_alerts_per_minute,
        }
    }

    /// Check every parameter
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sampler_config().validate()?;
        self.confidence_model.validate()?;
        if self.smoothing_window_size == 0 {
            return Err(ConfigError::Invalid("smoothing_window_size must be at least 1".to_string()));
        }
        if self.step_min_history == 0 {
            return Err(ConfigError::Invalid("step_min_history must be at least 1".to_string()));
        }
        self.step_config()?.validate()?;
        self.strips.validate()?;
        self.classifier_config()?.validate()?;
        self.throttle_config().validate()?;
        self.cadence.validate()?;
        self.focus_box.validate()?;
        self.identity.validate()?;
        if self.report_capacity == 0 {
            return Err(ConfigError::Invalid("report_capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}
