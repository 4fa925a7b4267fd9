//! Haptic cadence per tier

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{ProximityError, ProximityTier};

/// Repeating pulse pattern
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cadence {
    /// Time between pulses (milliseconds)
    pub interval_ms: u64,
    /// Pulse intensity, 0.0 to 1.0
    pub intensity: f32,
}

impl Cadence {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// What the haptic layer should do after a tier change
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CadenceSignal {
    pub previous: ProximityTier,
    pub tier: ProximityTier,
    /// Pulse pattern to (re)start; `None` stops pulsing
    pub cadence: Option<Cadence>,
    /// Whether the change moved to a more urgent tier
    pub escalated: bool,
}

/// Tier to cadence table; closer tiers pulse faster and harder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CadencePolicy {
    pub high: Cadence,
    pub medium: Cadence,
    pub low: Cadence,
}

impl Default for CadencePolicy {
    fn default() -> Self {
        Self {
            high: Cadence {
                interval_ms: 250,
                intensity: 1.0,
            },
            medium: Cadence {
                interval_ms: 500,
                intensity: 0.7,
            },
            low: Cadence {
                interval_ms: 1000,
                intensity: 0.4,
            },
        }
    }
}

impl CadencePolicy {
    /// Urgency must strictly shorten the interval and never lower intensity
    pub fn validate(&self) -> Result<(), ProximityError> {
        let monotonic = self.high.interval_ms < self.medium.interval_ms
            && self.medium.interval_ms < self.low.interval_ms
            && self.high.intensity >= self.medium.intensity
            && self.medium.intensity >= self.low.intensity;
        let bounded = [self.high, self.medium, self.low]
            .iter()
            .all(|c| c.interval_ms > 0 && (0.0..=1.0).contains(&c.intensity));
        if !(monotonic && bounded) {
            return Err(ProximityError::Config(format!(
                "cadence must tighten with urgency: {:?}",
                self
            )));
        }
        Ok(())
    }

    pub fn cadence(&self, tier: ProximityTier) -> Option<Cadence> {
        match tier {
            ProximityTier::High => Some(self.high),
            ProximityTier::Medium => Some(self.medium),
            ProximityTier::Low => Some(self.low),
            ProximityTier::None => None,
        }
    }

    /// Cadence parameters for a tier change
    pub fn on_tier_change(&self, previous: ProximityTier, tier: ProximityTier) -> CadenceSignal {
        CadenceSignal {
            previous,
            tier,
            cadence: self.cadence(tier),
            escalated: tier > previous,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_monotonic() {
        let policy = CadencePolicy::default();
        assert!(policy.validate().is_ok());

        let tiers = [ProximityTier::Low, ProximityTier::Medium, ProximityTier::High];
        for pair in tiers.windows(2) {
            let far = policy.cadence(pair[0]).unwrap();
            let near = policy.cadence(pair[1]).unwrap();
            assert!(near.interval() < far.interval());
            assert!(near.intensity >= far.intensity);
        }
    }

    #[test]
    fn test_inverted_policy_rejected() {
        let policy = CadencePolicy {
            high: Cadence {
                interval_ms: 2000,
                intensity: 1.0,
            },
            ..Default::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_on_tier_change() {
        let policy = CadencePolicy::default();

        let up = policy.on_tier_change(ProximityTier::Low, ProximityTier::High);
        assert!(up.escalated);
        assert_eq!(up.cadence, Some(policy.high));

        let stop = policy.on_tier_change(ProximityTier::Medium, ProximityTier::None);
        assert!(!stop.escalated);
        assert_eq!(stop.cadence, None);
    }
}
