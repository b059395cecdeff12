//! Throughput of the per-trial stages
//!
//! A batch of 34 patients with a few sessions each is a few hundred trials,
//! so the single-trial path dominates run time.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use imu_core::{Intervention, ScaleFactors, TrialId};
use imu_processing::filters::ButterworthLowpass;
use imu_processing::peaks::find_peaks;
use imu_processing::{FilterSettings, PipelineConfig, TrialPipeline};
use imu_simulation::{TrialSimulator, TrialSimulatorConfig};

fn recording(duration_s: f64) -> imu_core::TrialRecording {
    let config = TrialSimulatorConfig {
        duration_s,
        seed: Some(1),
        ..Default::default()
    };
    TrialSimulator::new(config)
        .unwrap()
        .generate(TrialId::new("p1", Intervention::No, "bench", "imu_104_0.csv"))
        .unwrap()
}

/// Benchmark zero-phase filtering of one channel
fn bench_filtfilt(c: &mut Criterion) {
    let mut group = c.benchmark_group("filtfilt");
    let filter = ButterworthLowpass::design(&FilterSettings::default(), 100.0).unwrap();

    for &size in &[500usize, 2000, 10_000] {
        let data: Vec<f64> = (0..size).map(|i| (i as f64 * 0.05).sin()).collect();
        group.bench_with_input(BenchmarkId::new("order_2", size), &data, |b, data| {
            b.iter(|| black_box(filter.filtfilt(black_box(data)).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark peak search with distance pruning
fn bench_find_peaks(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_peaks");
    let channels = recording(20.0).to_channels(&ScaleFactors::default());

    for &distance in &[1usize, 20, 100] {
        group.bench_with_input(BenchmarkId::new("distance", distance), &distance, |b, &distance| {
            b.iter(|| black_box(find_peaks(black_box(&channels.accel[2]), distance)));
        });
    }

    group.finish();
}

/// Benchmark the complete trial pipeline
fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    let pipeline = TrialPipeline::new(PipelineConfig::default()).unwrap();

    for &duration in &[5.0f64, 30.0] {
        let trial = recording(duration);
        group.bench_with_input(BenchmarkId::new("analyze", trial.len()), &trial, |b, trial| {
            b.iter(|| black_box(pipeline.analyze(black_box(trial))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_filtfilt, bench_find_peaks, bench_pipeline);
criterion_main!(benches);
