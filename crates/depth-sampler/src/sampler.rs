//! Region sampler

use depth_frame::{ConfidenceMap, DepthMap, RegionOfInterest};
use tracing::{debug, info};

use crate::validator::DepthValidator;
use crate::{DepthSample, RejectionStats, SampleError, SampleSet, SamplerConfig, SamplingGrid};

/// Extracts weighted depth samples from a region of a depth map
#[derive(Debug, Clone)]
pub struct DepthSampler {
    config: SamplerConfig,
    validator: DepthValidator,
}

impl DepthSampler {
    /// Create a sampler; rejects malformed configuration
    pub fn new(config: SamplerConfig) -> Result<Self, SampleError> {
        config.validate()?;
        info!(
            "Creating depth sampler: range [{}, {}] m, min confidence {:?}, min samples {}",
            config.min_valid_depth, config.max_valid_depth, config.min_confidence, config.min_samples
        );
        Ok(Self {
            validator: DepthValidator::new(&config),
            config,
        })
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Sample `region` of `depth`, dropping low-confidence and out-of-range pixels
    ///
    /// Returns `InsufficientSamples` when fewer than `min_samples` readings
    /// survive. Nothing borrowed from the maps is kept after returning.
    pub fn sample(
        &self,
        depth: &DepthMap<'_>,
        confidence: Option<&ConfidenceMap<'_>>,
        region: &RegionOfInterest,
    ) -> Result<SampleSet, SampleError> {
        region.validate()?;
        if let Some(conf) = confidence {
            conf.check_matches(depth)?;
        }

        let required = self.config.min_samples;
        let Some(rect) = region.to_pixel_rect(depth.width(), depth.height()) else {
            debug!("Region {:?} lies outside the frame", region);
            return Err(SampleError::InsufficientSamples { found: 0, required });
        };

        let xs = self.axis_points(rect.x0, rect.x1);
        let ys = self.axis_points(rect.y0, rect.y1);

        let cx = (rect.x0 + rect.x1) as f32 / 2.0;
        let cy = (rect.y0 + rect.y1) as f32 / 2.0;
        let half_w = ((rect.x1 - rect.x0) as f32 / 2.0).max(0.5);
        let half_h = ((rect.y1 - rect.y0) as f32 / 2.0).max(0.5);

        let mut samples = Vec::with_capacity(xs.len() * ys.len());
        let mut rejected = RejectionStats::default();

        for &y in &ys {
            let v = ((y as f32 - cy) / half_h).clamp(-1.0, 1.0);
            for &x in &xs {
                let Some(raw) = depth.depth_at(x, y) else {
                    rejected.record(crate::Rejection::NonFinite);
                    continue;
                };
                let level = confidence.and_then(|c| c.level_at(x, y));
                match self.validator.validate(raw, level) {
                    Ok(value) => {
                        let u = ((x as f32 - cx) / half_w).clamp(-1.0, 1.0);
                        let weight = (-self.config.center_falloff * (u * u + v * v)).exp();
                        samples.push(DepthSample { value, weight });
                    }
                    Err(rejection) => rejected.record(rejection),
                }
            }
        }

        let grid_points = xs.len() * ys.len();
        if samples.len() < required {
            debug!(
                "Insufficient samples: {}/{} valid ({:?})",
                samples.len(),
                grid_points,
                rejected
            );
            return Err(SampleError::InsufficientSamples {
                found: samples.len(),
                required,
            });
        }

        Ok(SampleSet {
            samples,
            grid_points,
            rejected,
        })
    }

    /// Grid coordinates along one axis of the inclusive range `[start, end]`
    fn axis_points(&self, start: usize, end: usize) -> Vec<usize> {
        let extent = end - start + 1;
        match self.config.grid {
            SamplingGrid::Stride { step } => (start..=end).step_by(step.max(1)).collect(),
            SamplingGrid::Adaptive {
                min_per_side,
                max_per_side,
                pixels_per_sample,
            } => {
                let n = (extent / pixels_per_sample.max(1))
                    .clamp(min_per_side, max_per_side)
                    .min(extent)
                    .max(1);
                // Cell centres
                (0..n).map(|i| start + (2 * i + 1) * extent / (2 * n)).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depth_frame::{ConfidenceLevel, Origin, OwnedConfidenceMap, OwnedDepthMap};
    use proptest::prelude::*;

    fn sampler() -> DepthSampler {
        DepthSampler::new(SamplerConfig::default()).unwrap()
    }

    fn full_frame() -> RegionOfInterest {
        RegionOfInterest::new(0.0, 0.0, 1.0, 1.0, Origin::TopLeft).unwrap()
    }

    #[test]
    fn test_uniform_map() {
        let map = OwnedDepthMap::uniform(64, 48, 1.2).unwrap();
        let set = sampler().sample(&map.view(), None, &full_frame()).unwrap();

        // 64/8 = 8 columns, 48/8 = 6 rows
        assert_eq!(set.grid_points, 48);
        assert_eq!(set.len(), 48);
        assert!(set.samples.iter().all(|s| s.value == 1.2));
        assert_eq!(set.rejected.total(), 0);
    }

    #[test]
    fn test_weights_peak_at_center() {
        let map = OwnedDepthMap::uniform(41, 41, 2.0).unwrap();
        let config = SamplerConfig {
            grid: SamplingGrid::Stride { step: 20 },
            min_samples: 1,
            ..Default::default()
        };
        let set = DepthSampler::new(config)
            .unwrap()
            .sample(&map.view(), None, &full_frame())
            .unwrap();

        // 3x3 grid at 0, 20, 40
        assert_eq!(set.len(), 9);
        let center = set.samples[4].weight;
        let corner = set.samples[0].weight;
        let edge = set.samples[1].weight;
        assert!((center - 1.0).abs() < 1e-6);
        assert!((corner - (-4.0f32).exp()).abs() < 1e-6);
        assert!((edge - (-2.0f32).exp()).abs() < 1e-6);
    }

    #[test]
    fn test_stride_respected_with_padding() {
        // Rows padded by 12 bytes; values encode the column index
        let width = 10;
        let height = 10;
        let depths: Vec<f32> = (0..width * height).map(|i| 1.0 + (i % width) as f32 * 0.1).collect();
        let map = OwnedDepthMap::from_depths(width, height, &depths, 12).unwrap();
        let config = SamplerConfig {
            grid: SamplingGrid::Stride { step: 3 },
            min_samples: 1,
            ..Default::default()
        };
        let set = DepthSampler::new(config)
            .unwrap()
            .sample(&map.view(), None, &full_frame())
            .unwrap();

        // Columns 0, 3, 6, 9 on every sampled row
        let first_row: Vec<f32> = set.samples[..4].iter().map(|s| s.value).collect();
        for (got, col) in first_row.iter().zip([0.0f32, 3.0, 6.0, 9.0]) {
            assert!((got - (1.0 + col * 0.1)).abs() < 1e-5);
        }
        assert_eq!(set.len(), 16);
    }

    #[test]
    fn test_low_confidence_discarded() {
        let map = OwnedDepthMap::uniform(40, 40, 1.0).unwrap();
        let mut conf_bytes = vec![ConfidenceLevel::High as u8; 40 * 40];
        // Left half low confidence
        for row in conf_bytes.chunks_mut(40) {
            row[..20].fill(ConfidenceLevel::Low as u8);
        }
        let conf = OwnedConfidenceMap::new(conf_bytes, 40, 40, 40).unwrap();

        let set = sampler()
            .sample(&map.view(), Some(&conf.view()), &full_frame())
            .unwrap();

        assert_eq!(set.grid_points, 25);
        assert_eq!(set.rejected.low_confidence, 10);
        assert_eq!(set.len(), 15);
    }

    #[test]
    fn test_insufficient_samples() {
        let map = OwnedDepthMap::uniform(40, 40, f32::NAN).unwrap();
        let err = sampler().sample(&map.view(), None, &full_frame()).unwrap_err();
        assert_eq!(err, SampleError::InsufficientSamples { found: 0, required: 8 });
    }

    #[test]
    fn test_region_outside_frame() {
        let map = OwnedDepthMap::uniform(40, 40, 1.0).unwrap();
        let region = RegionOfInterest::new(1.2, 0.0, 0.3, 0.3, Origin::TopLeft).unwrap();
        assert!(matches!(
            sampler().sample(&map.view(), None, &region),
            Err(SampleError::InsufficientSamples { found: 0, .. })
        ));
    }

    #[test]
    fn test_small_region_still_covered() {
        // 6x6 pixel region: adaptive grid caps at the pixel extent
        let map = OwnedDepthMap::uniform(60, 60, 1.5).unwrap();
        let region = RegionOfInterest::new(0.5, 0.5, 0.1, 0.1, Origin::TopLeft).unwrap();
        let set = sampler().sample(&map.view(), None, &region).unwrap();
        assert_eq!(set.grid_points, 25);
    }

    #[test]
    fn test_deterministic() {
        let depths: Vec<f32> = (0..100 * 80).map(|i| 0.5 + (i % 37) as f32 * 0.05).collect();
        let map = OwnedDepthMap::from_depths(100, 80, &depths, 4).unwrap();
        let region = RegionOfInterest::new(0.1, 0.2, 0.6, 0.5, Origin::BottomLeft).unwrap();

        let a = sampler().sample(&map.view(), None, &region).unwrap();
        let b = sampler().sample(&map.view(), None, &region).unwrap();
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn prop_out_of_range_never_sampled(
            depths in proptest::collection::vec(-5.0f32..40.0, 30 * 30),
        ) {
            let map = OwnedDepthMap::from_depths(30, 30, &depths, 0).unwrap();
            let config = SamplerConfig {
                grid: SamplingGrid::Stride { step: 1 },
                min_samples: 1,
                ..Default::default()
            };
            let sampler = DepthSampler::new(config.clone()).unwrap();
            if let Ok(set) = sampler.sample(&map.view(), None, &full_frame()) {
                for s in &set.samples {
                    prop_assert!(s.value >= config.min_valid_depth);
                    prop_assert!(s.value <= config.max_valid_depth);
                    prop_assert!(s.weight > 0.0 && s.weight <= 1.0);
                }
                prop_assert_eq!(set.len() + set.rejected.total(), set.grid_points);
            }
        }
    }
}
