//! Edge-triggered tier classification

use robust_estimator::DistanceEstimate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use tracing::{debug, info};

use crate::{ProximityError, ProximityThresholds, ProximityTier};

/// Classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub thresholds: ProximityThresholds,
    /// Estimates below this confidence classify as `ProximityTier::None`
    pub min_alert_confidence: f32,
    /// Extra distance (meters) needed to leave a tier toward a less urgent one
    pub hysteresis_margin: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            thresholds: ProximityThresholds::default(),
            min_alert_confidence: 0.5,
            hysteresis_margin: 0.05,
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<(), ProximityError> {
        ProximityThresholds::new(self.thresholds.as_array())?;
        if !(0.0..=1.0).contains(&self.min_alert_confidence) {
            return Err(ProximityError::Config(format!(
                "min_alert_confidence {} outside [0, 1]",
                self.min_alert_confidence
            )));
        }
        if !(self.hysteresis_margin.is_finite() && self.hysteresis_margin >= 0.0) {
            return Err(ProximityError::Config(format!(
                "hysteresis_margin {} must be non-negative",
                self.hysteresis_margin
            )));
        }
        Ok(())
    }
}

/// A target moved between tiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierChange<K> {
    pub key: K,
    pub previous: ProximityTier,
    pub tier: ProximityTier,
    pub distance: Option<f32>,
    pub confidence: f32,
}

/// Tier classifier remembering the last tier per target
#[derive(Debug, Clone)]
pub struct ProximityClassifier<K> {
    config: ClassifierConfig,
    current: HashMap<K, ProximityTier>,
}

impl<K: Eq + Hash + Clone + Debug> ProximityClassifier<K> {
    pub fn new(config: ClassifierConfig) -> Result<Self, ProximityError> {
        config.validate()?;
        info!(
            "Creating proximity classifier: thresholds={:?}, min_conf={}",
            config.thresholds.as_array(),
            config.min_alert_confidence
        );
        Ok(Self {
            config,
            current: HashMap::new(),
        })
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Stateless tier for an estimate
    pub fn classify(&self, estimate: &DistanceEstimate) -> ProximityTier {
        match estimate.reliable_distance(self.config.min_alert_confidence) {
            Some(distance) => self.config.thresholds.bucket(distance),
            None => ProximityTier::None,
        }
    }

    /// Update the tier for `key`; returns a change only when the tier moves
    pub fn observe(&mut self, key: K, estimate: &DistanceEstimate) -> Option<TierChange<K>> {
        let previous = self.tier(&key);
        let next = match estimate.reliable_distance(self.config.min_alert_confidence) {
            None => ProximityTier::None,
            Some(distance) => {
                let raw = self.config.thresholds.bucket(distance);
                if raw >= previous {
                    raw
                } else {
                    // Leaving toward a less urgent tier needs the margin
                    self.config
                        .thresholds
                        .bucket(distance - self.config.hysteresis_margin)
                        .min(previous)
                }
            }
        };

        if next == previous {
            return None;
        }

        debug!("Tier change for {:?}: {:?} -> {:?}", key, previous, next);
        if next == ProximityTier::None {
            self.current.remove(&key);
        } else {
            self.current.insert(key.clone(), next);
        }
        Some(TierChange {
            key,
            previous,
            tier: next,
            distance: estimate.distance,
            confidence: estimate.confidence,
        })
    }

    /// Last tier reported for `key`
    pub fn tier(&self, key: &K) -> ProximityTier {
        self.current.get(key).copied().unwrap_or_default()
    }

    /// Forget one target; unknown keys are ignored
    pub fn reset(&mut self, key: &K) {
        self.current.remove(key);
    }

    pub fn reset_all(&mut self) {
        self.current.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reading(distance: f32, confidence: f32) -> DistanceEstimate {
        DistanceEstimate {
            distance: Some(distance),
            confidence,
            sample_count: 20,
            timestamp_ns: 0,
        }
    }

    fn classifier() -> ProximityClassifier<&'static str> {
        ProximityClassifier::new(ClassifierConfig::default()).unwrap()
    }

    #[test]
    fn test_classify() {
        let c = classifier();
        assert_eq!(c.classify(&reading(0.8, 0.9)), ProximityTier::High);
        assert_eq!(c.classify(&reading(1.8, 0.9)), ProximityTier::Medium);
        assert_eq!(c.classify(&reading(2.8, 0.9)), ProximityTier::Low);
        assert_eq!(c.classify(&reading(4.0, 0.9)), ProximityTier::None);

        // Low confidence or no distance never alerts
        assert_eq!(c.classify(&reading(0.5, 0.3)), ProximityTier::None);
        assert_eq!(c.classify(&DistanceEstimate::no_reading(0)), ProximityTier::None);
    }

    #[test]
    fn test_fires_only_on_change() {
        let mut c = classifier();

        let first = c.observe("fov", &reading(1.5, 0.9)).unwrap();
        assert_eq!(first.previous, ProximityTier::None);
        assert_eq!(first.tier, ProximityTier::Medium);

        assert!(c.observe("fov", &reading(1.6, 0.9)).is_none());
        assert!(c.observe("fov", &reading(1.4, 0.9)).is_none());

        let closer = c.observe("fov", &reading(0.9, 0.9)).unwrap();
        assert_eq!(closer.previous, ProximityTier::Medium);
        assert_eq!(closer.tier, ProximityTier::High);
    }

    #[test]
    fn test_hysteresis_on_retreat() {
        let mut c = classifier();
        c.observe("fov", &reading(0.9, 0.9));

        // Inside the margin: stays High
        assert!(c.observe("fov", &reading(1.03, 0.9)).is_none());
        assert_eq!(c.tier(&"fov"), ProximityTier::High);

        let change = c.observe("fov", &reading(1.1, 0.9)).unwrap();
        assert_eq!(change.tier, ProximityTier::Medium);
    }

    #[test]
    fn test_unreliable_drops_to_none() {
        let mut c = classifier();
        c.observe("fov", &reading(0.9, 0.9));

        let change = c.observe("fov", &DistanceEstimate::no_reading(0)).unwrap();
        assert_eq!(change.tier, ProximityTier::None);
        assert_eq!(change.distance, None);
        assert!(c.observe("fov", &DistanceEstimate::no_reading(0)).is_none());
    }

    #[test]
    fn test_keys_independent_and_reset() {
        let mut c = classifier();
        c.observe("a", &reading(0.5, 0.9));
        c.observe("b", &reading(2.5, 0.9));
        assert_eq!(c.tier(&"a"), ProximityTier::High);
        assert_eq!(c.tier(&"b"), ProximityTier::Low);

        c.reset(&"a");
        c.reset(&"missing");
        assert_eq!(c.tier(&"a"), ProximityTier::None);
        assert_eq!(c.tier(&"b"), ProximityTier::Low);

        // After reset the same reading fires again
        assert!(c.observe("a", &reading(0.5, 0.9)).is_some());

        c.reset_all();
        assert_eq!(c.tier(&"b"), ProximityTier::None);
    }

    proptest! {
        #[test]
        fn prop_changes_only_on_crossing(distances in proptest::collection::vec(0.1f32..5.0, 1..40)) {
            let config = ClassifierConfig {
                hysteresis_margin: 0.0,
                ..Default::default()
            };
            let mut c = ProximityClassifier::new(config).unwrap();
            let mut last = ProximityTier::None;
            for d in distances {
                let tier = c.classify(&reading(d, 0.9));
                let change = c.observe(0u8, &reading(d, 0.9));
                prop_assert_eq!(change.is_some(), tier != last);
                last = tier;
            }
        }
    }
}
