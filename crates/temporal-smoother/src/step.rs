//! Step and curb detection
//!
//! Three floor strips at increasing distance ahead of the user are smoothed
//! independently. The difference between the near strip and a strip further
//! ahead is tracked over time and classified once enough history exists.

use ring_buffer::RingBuffer;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::smoother::{median, TemporalSmoother};
use crate::SmootherError;

/// Floor strip, nearest to the user first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strip {
    Near,
    Mid,
    Far,
}

/// Surface discontinuity ahead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    /// Level surface
    None,
    /// Small discontinuity in either direction
    Curb,
    /// Surface rises ahead
    StepUp,
    /// Surface recedes ahead
    StepDown,
}

/// Classification thresholds on the far-minus-near difference (meters)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepThresholds {
    low: f32,
    high: f32,
}

impl Default for StepThresholds {
    fn default() -> Self {
        Self { low: 0.04, high: 0.07 }
    }
}

impl StepThresholds {
    /// Thresholds must satisfy `0 <= low < high`
    pub fn new(low: f32, high: f32) -> Result<Self, SmootherError> {
        if !(low.is_finite() && high.is_finite() && low >= 0.0 && low < high) {
            return Err(SmootherError::Thresholds { low, high });
        }
        Ok(Self { low, high })
    }

    pub fn low(&self) -> f32 {
        self.low
    }

    pub fn high(&self) -> f32 {
        self.high
    }

    /// Classify a difference; every finite value maps to exactly one kind
    pub fn classify(&self, delta: f32) -> StepKind {
        let magnitude = delta.abs();
        if !(magnitude >= self.low) {
            // Below the low threshold, or NaN
            StepKind::None
        } else if magnitude <= self.high {
            StepKind::Curb
        } else if delta > 0.0 {
            StepKind::StepDown
        } else {
            StepKind::StepUp
        }
    }
}

/// Step detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    pub thresholds: StepThresholds,
    /// Smoothing window per strip
    pub strip_window: usize,
    /// Difference history length
    pub delta_window: usize,
    /// Differences needed before classifying
    pub min_history: usize,
    /// Strip compared against `Strip::Near`
    pub compare: Strip,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            thresholds: StepThresholds::default(),
            strip_window: 5,
            delta_window: 5,
            min_history: 3,
            compare: Strip::Far,
        }
    }
}

impl StepConfig {
    /// Thresholds ordered, history satisfiable, compare strip ahead of Near
    pub fn validate(&self) -> Result<(), SmootherError> {
        StepThresholds::new(self.thresholds.low, self.thresholds.high)?;
        if self.min_history == 0 || self.min_history > self.delta_window {
            return Err(SmootherError::History {
                window: self.delta_window,
                min_history: self.min_history,
            });
        }
        if self.compare == Strip::Near {
            return Err(SmootherError::CompareStrip);
        }
        Ok(())
    }
}

/// Raw per-strip distances for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StripReadings {
    pub near: Option<f32>,
    pub mid: Option<f32>,
    pub far: Option<f32>,
}

impl StripReadings {
    pub fn get(&self, strip: Strip) -> Option<f32> {
        match strip {
            Strip::Near => self.near,
            Strip::Mid => self.mid,
            Strip::Far => self.far,
        }
    }
}

/// Classified step signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepReading {
    pub kind: StepKind,
    /// Median compare-minus-near difference (meters)
    pub delta: f32,
}

/// Step/curb detector over three floor strips
#[derive(Debug, Clone)]
pub struct StepDetector {
    config: StepConfig,
    strips: TemporalSmoother<Strip>,
    deltas: RingBuffer<f32>,
}

impl StepDetector {
    pub fn new(config: StepConfig) -> Result<Self, SmootherError> {
        config.validate()?;
        let t = config.thresholds;
        info!(
            "Creating step detector: low={} m, high={} m, compare {:?}",
            t.low, t.high, config.compare
        );
        Ok(Self {
            strips: TemporalSmoother::new(config.strip_window)?,
            deltas: RingBuffer::new(config.delta_window)?,
            config,
        })
    }

    pub fn config(&self) -> &StepConfig {
        &self.config
    }

    /// Feed one frame of strip readings
    ///
    /// Returns `None` until `min_history` differences have been collected.
    /// A frame missing the near or compare strip adds no difference.
    pub fn update(&mut self, readings: StripReadings) -> Option<StepReading> {
        let mut smoothed = StripReadings::default();
        for strip in [Strip::Near, Strip::Mid, Strip::Far] {
            let Some(value) = readings.get(strip) else {
                continue;
            };
            if let Ok(s) = self.strips.update(strip, value) {
                match strip {
                    Strip::Near => smoothed.near = Some(s),
                    Strip::Mid => smoothed.mid = Some(s),
                    Strip::Far => smoothed.far = Some(s),
                }
            }
        }

        if let (Some(near), Some(ahead)) = (smoothed.near, smoothed.get(self.config.compare)) {
            self.deltas.push(ahead - near);
        }

        if self.deltas.len() < self.config.min_history {
            return None;
        }
        let delta = median(&self.deltas.to_vec())?;
        let kind = self.config.thresholds.classify(delta);
        if kind != StepKind::None {
            debug!("Step signal {:?} (delta={:.3} m)", kind, delta);
        }
        Some(StepReading { kind, delta })
    }

    /// Forget all strip and difference history (focus box redefined)
    pub fn reset(&mut self) {
        self.strips.reset_all();
        self.deltas.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn readings(near: f32, far: f32) -> StripReadings {
        StripReadings {
            near: Some(near),
            mid: Some((near + far) / 2.0),
            far: Some(far),
        }
    }

    #[test]
    fn test_threshold_ordering_enforced() {
        assert!(StepThresholds::new(0.07, 0.04).is_err());
        assert!(StepThresholds::new(0.05, 0.05).is_err());
        assert!(StepThresholds::new(-0.01, 0.05).is_err());
        assert!(StepThresholds::new(0.04, 0.07).is_ok());
    }

    #[test]
    fn test_classification_buckets() {
        let t = StepThresholds::default();
        assert_eq!(t.classify(0.0), StepKind::None);
        assert_eq!(t.classify(0.03), StepKind::None);
        assert_eq!(t.classify(-0.03), StepKind::None);
        assert_eq!(t.classify(0.05), StepKind::Curb);
        assert_eq!(t.classify(-0.05), StepKind::Curb);
        assert_eq!(t.classify(0.2), StepKind::StepDown);
        assert_eq!(t.classify(-0.2), StepKind::StepUp);
    }

    #[test]
    fn test_step_down_detected() {
        let mut detector = StepDetector::new(StepConfig::default()).unwrap();

        // Near strip converges to 1.0 m, far strip to 1.5 m
        let frames = [(1.05, 1.45), (1.02, 1.52), (1.0, 1.5), (1.0, 1.5)];
        let mut results = Vec::new();
        for (near, far) in frames {
            results.push(detector.update(readings(near, far)));
        }

        assert_eq!(results[0], None);
        assert_eq!(results[1], None);
        let last = results[3].unwrap();
        assert_eq!(last.kind, StepKind::StepDown);
        assert!((last.delta - 0.5).abs() < 0.05);
    }

    #[test]
    fn test_step_up_detected() {
        let mut detector = StepDetector::new(StepConfig::default()).unwrap();
        let mut last = None;
        for _ in 0..4 {
            last = detector.update(readings(1.6, 1.3));
        }
        assert_eq!(last.map(|r| r.kind), Some(StepKind::StepUp));
    }

    #[test]
    fn test_level_floor() {
        let mut detector = StepDetector::new(StepConfig::default()).unwrap();
        let mut last = None;
        for i in 0..5 {
            let jitter = if i % 2 == 0 { 0.01 } else { -0.01 };
            last = detector.update(readings(1.2, 1.2 + jitter));
        }
        assert_eq!(last.map(|r| r.kind), Some(StepKind::None));
    }

    #[test]
    fn test_missing_strip_adds_no_history() {
        let mut detector = StepDetector::new(StepConfig::default()).unwrap();
        for _ in 0..5 {
            let r = detector.update(StripReadings {
                near: Some(1.0),
                mid: Some(1.1),
                far: None,
            });
            assert_eq!(r, None);
        }
    }

    #[test]
    fn test_reset_clears_history() {
        let mut detector = StepDetector::new(StepConfig::default()).unwrap();
        for _ in 0..3 {
            detector.update(readings(1.0, 1.5));
        }
        detector.reset();
        assert_eq!(detector.update(readings(1.0, 1.5)), None);
    }

    #[test]
    fn test_compare_mid_strip() {
        let config = StepConfig {
            compare: Strip::Mid,
            ..Default::default()
        };
        let mut detector = StepDetector::new(config).unwrap();
        let mut last = None;
        for _ in 0..3 {
            // Mid strip 5 cm further than near: a curb
            last = detector.update(StripReadings {
                near: Some(1.0),
                mid: Some(1.05),
                far: Some(3.0),
            });
        }
        assert_eq!(last.map(|r| r.kind), Some(StepKind::Curb));
    }

    #[test]
    fn test_bad_history_rejected() {
        let config = StepConfig {
            min_history: 6,
            delta_window: 5,
            ..Default::default()
        };
        assert!(StepDetector::new(config).is_err());
    }

    #[test]
    fn test_near_compare_strip_rejected() {
        let config = StepConfig {
            compare: Strip::Near,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(SmootherError::CompareStrip));
        assert!(StepDetector::new(config).is_err());
    }

    #[test]
    fn test_non_finite_strip_adds_no_history() {
        let mut detector = StepDetector::new(StepConfig::default()).unwrap();
        for _ in 0..5 {
            let r = detector.update(StripReadings {
                near: Some(1.0),
                mid: Some(1.2),
                far: Some(f32::NAN),
            });
            assert_eq!(r, None);
        }
    }

    proptest! {
        #[test]
        fn prop_classification_total_and_consistent(delta in -2.0f32..2.0) {
            let t = StepThresholds::default();
            let kind = t.classify(delta);
            let m = delta.abs();
            let expected = if m < t.low() {
                StepKind::None
            } else if m <= t.high() {
                StepKind::Curb
            } else if delta > 0.0 {
                StepKind::StepDown
            } else {
                StepKind::StepUp
            };
            prop_assert_eq!(kind, expected);
        }
    }
}
