//! Per-target median smoother

use ring_buffer::RingBuffer;
use std::collections::HashMap;
use std::hash::Hash;
use tracing::debug;

use crate::SmootherError;

/// Median of `values`; even counts average the two middle values
pub fn median(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

#[derive(Debug, Clone)]
struct History {
    buffer: RingBuffer<f32>,
    last_smoothed: Option<f32>,
}

/// Median smoother keeping one bounded history per target key
#[derive(Debug, Clone)]
pub struct TemporalSmoother<K> {
    template: RingBuffer<f32>,
    histories: HashMap<K, History>,
}

impl<K: Eq + Hash + Clone + std::fmt::Debug> TemporalSmoother<K> {
    /// Create a smoother with `window` values per target
    pub fn new(window: usize) -> Result<Self, SmootherError> {
        Ok(Self {
            template: RingBuffer::new(window)?,
            histories: HashMap::new(),
        })
    }

    /// Push a value for `key` and return the median of its history
    ///
    /// Non-finite values are rejected and leave the history untouched.
    pub fn update(&mut self, key: K, value: f32) -> Result<f32, SmootherError> {
        if !value.is_finite() {
            debug!("Rejecting non-finite value for {:?}", key);
            return Err(SmootherError::NonFinite(value));
        }

        let template = &self.template;
        let history = self.histories.entry(key).or_insert_with(|| History {
            buffer: template.clone(),
            last_smoothed: None,
        });
        history.buffer.push(value);

        let smoothed = median(&history.buffer.to_vec()).unwrap_or(value);
        history.last_smoothed = Some(smoothed);
        Ok(smoothed)
    }

    /// Last smoothed value for `key` (the explicit no-reading fallback)
    pub fn last(&self, key: &K) -> Option<f32> {
        self.histories.get(key).and_then(|h| h.last_smoothed)
    }

    /// Clear one target; unknown keys are ignored
    pub fn reset(&mut self, key: &K) {
        if self.histories.remove(key).is_some() {
            debug!("Smoother history reset for {:?}", key);
        }
    }

    /// Clear every target (session stop)
    pub fn reset_all(&mut self) {
        self.histories.clear();
    }

    /// Number of targets with history
    pub fn tracked(&self) -> usize {
        self.histories.len()
    }

    #[cfg(test)]
    fn history(&self, key: &K) -> Option<Vec<f32>> {
        self.histories.get(key).map(|h| h.buffer.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_zero_window_rejected() {
        assert!(TemporalSmoother::<u32>::new(0).is_err());
    }

    #[test]
    fn test_spike_rejected() {
        let mut smoother = TemporalSmoother::new(5).unwrap();
        let mut out = 0.0;
        for v in [2.0, 2.1, 1.9, 2.0, 5.0] {
            out = smoother.update("fov", v).unwrap();
        }
        assert_eq!(out, 2.0);

        // Evicts the first 2.0
        let out = smoother.update("fov", 2.05).unwrap();
        assert_eq!(smoother.history(&"fov"), Some(vec![2.1, 1.9, 2.0, 5.0, 2.05]));
        assert_eq!(out, 2.05);
    }

    #[test]
    fn test_targets_independent() {
        let mut smoother = TemporalSmoother::new(3).unwrap();
        smoother.update(1u64, 1.0).unwrap();
        smoother.update(2u64, 4.0).unwrap();
        smoother.update(1u64, 1.2).unwrap();

        assert_eq!(smoother.history(&1), Some(vec![1.0, 1.2]));
        assert_eq!(smoother.history(&2), Some(vec![4.0]));
        assert_eq!(smoother.tracked(), 2);
    }

    #[test]
    fn test_reset() {
        let mut smoother = TemporalSmoother::new(3).unwrap();
        smoother.update(1u64, 1.0).unwrap();
        smoother.update(2u64, 2.0).unwrap();

        smoother.reset(&1);
        assert_eq!(smoother.last(&1), None);
        assert_eq!(smoother.last(&2), Some(2.0));

        // Unknown key is a no-op
        smoother.reset(&99);

        smoother.reset_all();
        assert_eq!(smoother.tracked(), 0);
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut smoother = TemporalSmoother::new(3).unwrap();
        smoother.update(1u64, 1.5).unwrap();
        assert!(matches!(smoother.update(1u64, f32::NAN), Err(SmootherError::NonFinite(_))));
        assert_eq!(smoother.history(&1), Some(vec![1.5]));
        assert_eq!(smoother.last(&1), Some(1.5));

        // A fresh key gets no history and no fallback
        assert!(smoother.update(2u64, f32::INFINITY).is_err());
        assert_eq!(smoother.last(&2), None);
        assert_eq!(smoother.tracked(), 1);
    }

    #[test]
    fn test_even_median() {
        assert_eq!(median(&[1.0, 3.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    proptest! {
        #[test]
        fn prop_window_holds_last_n(
            window in 1usize..7,
            values in proptest::collection::vec(0.1f32..20.0, 1..30),
        ) {
            let mut smoother = TemporalSmoother::new(window).unwrap();
            let mut out = 0.0;
            for v in &values {
                out = smoother.update(0u8, *v).unwrap();
            }
            let start = values.len().saturating_sub(window);
            let expected = &values[start..];
            prop_assert_eq!(smoother.history(&0), Some(expected.to_vec()));
            prop_assert_eq!(Some(out), median(expected));
        }
    }
}
