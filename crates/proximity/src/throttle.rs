//! Alert throttling
//!
//! Spoken alerts are deduplicated per category: an alert needs enough
//! confidence, must respect a minimum interval since the last alert of the
//! same category, and all categories share a per-minute cap.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::ProximityError;

/// Throttle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Minimum confidence for an alert (default: 0.5)
    pub min_confidence: f32,
    /// Minimum time between alerts of one category (milliseconds)
    pub min_interval_ms: u64,
    /// Maximum alerts per rolling minute, all categories
    pub max_alerts_per_minute: usize,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            min_interval_ms: 2000,
            max_alerts_per_minute: 20,
        }
    }
}

impl ThrottleConfig {
    pub fn validate(&self) -> Result<(), ProximityError> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ProximityError::Config(format!(
                "throttle min_confidence {} outside [0, 1]",
                self.min_confidence
            )));
        }
        if self.max_alerts_per_minute == 0 {
            return Err(ProximityError::Config(
                "max_alerts_per_minute must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// State of one alert category
#[derive(Debug, Clone)]
struct AlertState {
    /// Last time this category fired
    last_fired: Instant,
    /// Muted by the user until the hazard clears
    acknowledged: bool,
}

/// Per-category alert throttle
#[derive(Debug)]
pub struct AlertThrottle {
    config: ThrottleConfig,
    states: HashMap<String, AlertState>,
    minute_count: usize,
    minute_start: Instant,
}

impl AlertThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        info!("Creating alert throttle with config: {:?}", config);
        Self {
            config,
            states: HashMap::new(),
            minute_count: 0,
            minute_start: Instant::now(),
        }
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// Fire an alert at `now` if it passes every check, recording it
    pub fn try_fire_at(&mut self, category: &str, confidence: f32, now: Instant) -> bool {
        let fire = self.should_fire_at(category, confidence, now);
        if fire {
            self.record_fire_at(category, now);
        }
        fire
    }

    fn should_fire_at(&mut self, category: &str, confidence: f32, now: Instant) -> bool {
        if !(confidence >= self.config.min_confidence) {
            debug!(
                "Alert suppressed: confidence {} < threshold {}",
                confidence, self.config.min_confidence
            );
            return false;
        }

        if now.saturating_duration_since(self.minute_start) >= Duration::from_secs(60) {
            self.minute_count = 0;
            self.minute_start = now;
        }

        if self.minute_count >= self.config.max_alerts_per_minute {
            warn!("Alert throttled: max alerts per minute reached");
            return false;
        }

        if let Some(state) = self.states.get(category) {
            if state.acknowledged {
                debug!("Alert suppressed: {} acknowledged", category);
                return false;
            }
            let interval = Duration::from_millis(self.config.min_interval_ms);
            if now.saturating_duration_since(state.last_fired) < interval {
                debug!("Alert suppressed: {} within minimum interval", category);
                return false;
            }
        }

        true
    }

    fn record_fire_at(&mut self, category: &str, now: Instant) {
        self.minute_count += 1;
        self.states
            .entry(category.to_string())
            .and_modify(|state| state.last_fired = now)
            .or_insert(AlertState {
                last_fired: now,
                acknowledged: false,
            });
        debug!("Alert recorded: {} ({} this minute)", category, self.minute_count);
    }

    /// Mute a category until `rearm`; false when it never fired
    pub fn acknowledge(&mut self, category: &str) -> bool {
        if let Some(state) = self.states.get_mut(category) {
            state.acknowledged = true;
            info!("Alert acknowledged: {}", category);
            true
        } else {
            false
        }
    }

    /// Lift an acknowledgement once the hazard behind it has cleared
    pub fn rearm(&mut self, category: &str) {
        if let Some(state) = self.states.get_mut(category) {
            if state.acknowledged {
                debug!("Alert re-armed: {}", category);
                state.acknowledged = false;
            }
        }
    }

    /// Forget all categories (session stop)
    pub fn clear(&mut self) {
        self.states.clear();
        self.minute_count = 0;
    }
}

impl Default for AlertThrottle {
    fn default() -> Self {
        Self::new(ThrottleConfig::default())
    }
}
