//! Weighted order statistics

use depth_sampler::DepthSample;

/// Relative tolerance for landing exactly on the half-weight point
const HALF_WEIGHT_TOLERANCE: f64 = 1e-6;

/// Weighted median of `(value, weight)` pairs
///
/// Walks the values in ascending order accumulating weight. When the running
/// weight lands exactly on half of the total, the next larger value wins.
/// Non-positive and non-finite weights are ignored; if no weight is left,
/// every value counts equally.
fn median_of_pairs(mut pairs: Vec<(f32, f64)>) -> Option<f32> {
    if pairs.is_empty() {
        return None;
    }

    let weighted: Vec<(f32, f64)> = pairs
        .iter()
        .copied()
        .filter(|(_, w)| w.is_finite() && *w > 0.0)
        .collect();
    if weighted.is_empty() {
        pairs.iter_mut().for_each(|p| p.1 = 1.0);
    } else {
        pairs = weighted;
    }

    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let total: f64 = pairs.iter().map(|p| p.1).sum();
    let half = total / 2.0;
    let tolerance = total * HALF_WEIGHT_TOLERANCE;

    let mut cumulative = 0.0;
    for (i, &(value, weight)) in pairs.iter().enumerate() {
        cumulative += weight;
        if cumulative > half + tolerance {
            return Some(value);
        }
        if cumulative >= half - tolerance {
            return Some(pairs.get(i + 1).map_or(value, |next| next.0));
        }
    }
    pairs.last().map(|p| p.0)
}

/// Weighted median of sample values
pub fn weighted_median(samples: &[DepthSample]) -> Option<f32> {
    median_of_pairs(
        samples
            .iter()
            .map(|s| (s.value, s.weight as f64))
            .collect(),
    )
}

/// Weighted median absolute deviation around `median`
pub fn weighted_mad(samples: &[DepthSample], median: f32) -> Option<f32> {
    median_of_pairs(
        samples
            .iter()
            .map(|s| ((s.value - median).abs(), s.weight as f64))
            .collect(),
    )
}
