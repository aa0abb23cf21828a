//! Criterion benchmarks for per-virtual-source DSP stages
//!
//! Run with: cargo bench -p sonido-effects
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use sonido_core::Effect;
use sonido_effects::diffraction::{AttenuateFilter, DiffractionFilter, NnSmallFilter, UdfaFilter, UtdFilter};
use sonido_effects::{AirAbsorption, ReflectionEq};
use sonido_geometry::{DiffractionPath, Vec3, id::Id, room::Edge};

const SAMPLE_RATE: f32 = 48000.0;
const BLOCK_SIZES: &[usize] = &[64, 128, 256, 512, 1024];
const BAND_FREQS: [f32; 4] = [125.0, 500.0, 2000.0, 8000.0];

fn generate_test_signal(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE;
            (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5
        })
        .collect()
}

fn test_path() -> DiffractionPath {
    let edge = Edge {
        wall_a: Id::from_raw(0),
        wall_b: Id::from_raw(1),
        origin: Vec3::new(0.0, 0.0, 0.0),
        direction: Vec3::new(0.0, 0.0, 1.0),
        length: 4.0,
        exterior_angle: core::f32::consts::PI * 1.5,
    };
    DiffractionPath::compute(Vec3::new(2.0, 0.0, 1.0), Vec3::new(2.0, 0.0, 3.0), &edge, Vec3::new(1.0, 0.0, 0.0)).unwrap()
}

fn bench_reflection_eq(c: &mut Criterion) {
    let mut group = c.benchmark_group("ReflectionEq");

    for &block_size in BLOCK_SIZES {
        let input = generate_test_signal(block_size);

        group.bench_with_input(BenchmarkId::new("settled", block_size), &block_size, |b, _| {
            let mut eq = ReflectionEq::new(SAMPLE_RATE, &BAND_FREQS);
            eq.set_target_gains_db(&[-3.0, 1.5, -6.0, 2.0]);
            for _ in 0..(SAMPLE_RATE as usize / 10) {
                eq.process(0.0);
            }
            b.iter(|| {
                for &sample in &input {
                    black_box(eq.process(black_box(sample)));
                }
            });
        });
    }

    group.finish();
}

fn bench_air_absorption(c: &mut Criterion) {
    let mut group = c.benchmark_group("AirAbsorption");

    for &block_size in BLOCK_SIZES {
        let input = generate_test_signal(block_size);

        group.bench_with_input(BenchmarkId::from_parameter(block_size), &block_size, |b, _| {
            let mut filter = AirAbsorption::new(SAMPLE_RATE);
            filter.set_distance(12.0);
            b.iter(|| {
                for &sample in &input {
                    black_box(filter.process(black_box(sample)));
                }
            });
        });
    }

    group.finish();
}

fn bench_diffraction_models(c: &mut Criterion) {
    let mut group = c.benchmark_group("DiffractionModels");
    let path = test_path();
    let input = generate_test_signal(1024);

    group.bench_function("attenuate", |b| {
        let mut filter = AttenuateFilter::new(SAMPLE_RATE);
        filter.update_geometry(&path, SAMPLE_RATE);
        b.iter(|| {
            for &sample in &input {
                black_box(filter.process(black_box(sample)));
            }
        });
    });

    group.bench_function("udfa", |b| {
        let mut filter = UdfaFilter::new(SAMPLE_RATE);
        filter.update_geometry(&path, SAMPLE_RATE);
        b.iter(|| {
            for &sample in &input {
                black_box(filter.process(black_box(sample)));
            }
        });
    });

    group.bench_function("utd", |b| {
        let mut filter = UtdFilter::new(SAMPLE_RATE);
        filter.update_geometry(&path, SAMPLE_RATE);
        b.iter(|| {
            for &sample in &input {
                black_box(filter.process(black_box(sample)));
            }
        });
    });

    group.bench_function("nn_small", |b| {
        let mut filter = NnSmallFilter::new(SAMPLE_RATE);
        filter.update_geometry(&path, SAMPLE_RATE);
        b.iter(|| {
            for &sample in &input {
                black_box(filter.process(black_box(sample)));
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_reflection_eq, bench_air_absorption, bench_diffraction_models);

criterion_main!(benches);
