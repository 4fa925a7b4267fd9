//! Proximity tiers

use serde::{Deserialize, Serialize};

use crate::ProximityError;

/// Urgency bucket, least urgent first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum ProximityTier {
    #[default]
    None,
    Low,
    Medium,
    High,
}

/// Distance breakpoints (meters); a distance at or below a breakpoint falls in that tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProximityThresholds {
    high: f32,
    medium: f32,
    low: f32,
}

impl Default for ProximityThresholds {
    fn default() -> Self {
        Self {
            high: 1.0,
            medium: 2.0,
            low: 3.0,
        }
    }
}

impl ProximityThresholds {
    /// Breakpoints ordered closest first: `[high, medium, low]`
    pub fn new(breakpoints: [f32; 3]) -> Result<Self, ProximityError> {
        let [high, medium, low] = breakpoints;
        let ordered = breakpoints.iter().all(|v| v.is_finite()) && 0.0 < high && high < medium && medium < low;
        if !ordered {
            return Err(ProximityError::Thresholds(breakpoints));
        }
        Ok(Self { high, medium, low })
    }

    pub fn as_array(&self) -> [f32; 3] {
        [self.high, self.medium, self.low]
    }

    /// Tier for a trusted distance
    pub fn bucket(&self, distance: f32) -> ProximityTier {
        if distance <= self.high {
            ProximityTier::High
        } else if distance <= self.medium {
            ProximityTier::Medium
        } else if distance <= self.low {
            ProximityTier::Low
        } else {
            ProximityTier::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_enforced() {
        assert!(ProximityThresholds::new([1.0, 2.0, 3.0]).is_ok());
        assert!(ProximityThresholds::new([2.0, 1.0, 3.0]).is_err());
        assert!(ProximityThresholds::new([1.0, 1.0, 3.0]).is_err());
        assert!(ProximityThresholds::new([0.0, 1.0, 3.0]).is_err());
        assert!(ProximityThresholds::new([1.0, 2.0, f32::NAN]).is_err());
    }

    #[test]
    fn test_buckets() {
        let t = ProximityThresholds::default();
        assert_eq!(t.bucket(0.4), ProximityTier::High);
        assert_eq!(t.bucket(1.0), ProximityTier::High);
        assert_eq!(t.bucket(1.5), ProximityTier::Medium);
        assert_eq!(t.bucket(2.5), ProximityTier::Low);
        assert_eq!(t.bucket(3.5), ProximityTier::None);
    }

    #[test]
    fn test_tier_order() {
        assert!(ProximityTier::None < ProximityTier::Low);
        assert!(ProximityTier::Low < ProximityTier::Medium);
        assert!(ProximityTier::Medium < ProximityTier::High);
    }
}
