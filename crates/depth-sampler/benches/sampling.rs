use criterion::{black_box, criterion_group, criterion_main, Criterion};
use depth_frame::{ConfidenceLevel, Origin, OwnedConfidenceMap, OwnedDepthMap, RegionOfInterest};
use depth_sampler::{DepthSampler, SamplerConfig, SamplingGrid};

fn bench_sampling(c: &mut Criterion) {
    // LiDAR-sized depth map with aligned rows
    let (width, height) = (256, 192);
    let depths: Vec<f32> = (0..width * height)
        .map(|i| 0.8 + ((i * 7) % 97) as f32 * 0.02)
        .collect();
    let depth = OwnedDepthMap::from_depths(width, height, &depths, 64).unwrap();
    let confidence = OwnedConfidenceMap::uniform(width, height, ConfidenceLevel::High).unwrap();
    let focus = RegionOfInterest::new(0.3, 0.3, 0.4, 0.4, Origin::TopLeft).unwrap();

    let adaptive = DepthSampler::new(SamplerConfig::default()).unwrap();
    c.bench_function("sample_focus_box_adaptive", |b| {
        b.iter(|| {
            adaptive.sample(
                black_box(&depth.view()),
                Some(&confidence.view()),
                black_box(&focus),
            )
        })
    });

    let stride = DepthSampler::new(SamplerConfig {
        grid: SamplingGrid::Stride { step: 2 },
        ..Default::default()
    })
    .unwrap();
    c.bench_function("sample_focus_box_stride2", |b| {
        b.iter(|| {
            stride.sample(
                black_box(&depth.view()),
                Some(&confidence.view()),
                black_box(&focus),
            )
        })
    });
}

criterion_group!(benches, bench_sampling);
criterion_main!(benches);
