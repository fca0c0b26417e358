use criterion::{black_box, criterion_group, criterion_main, Criterion};
use strapdown_core::{
    IntegratedDelta, LinearFilter, Pipeline, PipelineConfig, Recording, Resampler, TimeSeries,
    WindowConfig,
};

fn recording(samples: usize) -> Recording {
    let imu_ts: Vec<f64> = (0..samples).map(|i| i as f64 / 200.0).collect();
    let imu_rows: Vec<Vec<f64>> = (0..samples)
        .map(|i| (0..6).map(|c| ((i + c) as f64 * 0.01).sin()).collect())
        .collect();
    let gt_ts: Vec<f64> = (0..=samples / 10).map(|i| i as f64 / 20.0).collect();
    let gt_rows: Vec<Vec<f64>> = gt_ts.iter().map(|&t| vec![t.cos(), t.sin(), 0.5]).collect();
    Recording::new(
        TimeSeries::from_rows(imu_ts, &imu_rows).unwrap(),
        TimeSeries::from_rows(gt_ts, &gt_rows).unwrap(),
    )
}

fn bench_pipeline(c: &mut Criterion) {
    let rec = recording(20_000);
    let truth_ts = rec.imu.clip(0.0, 99.9).timestamps().to_vec();

    c.bench_function("resample_linear_20k", |b| {
        let resampler = Resampler::new();
        b.iter(|| resampler.resample(black_box(&rec.ground_truth), &truth_ts).unwrap());
    });

    c.bench_function("butterworth_filter_20k", |b| {
        let filter = LinearFilter::butterworth_lowpass(2, 20.0, 200.0).unwrap();
        b.iter(|| filter.apply(black_box(&rec.imu)).unwrap());
    });

    c.bench_function("prepare_recording_20k", |b| {
        let config = PipelineConfig::new(WindowConfig::new(200))
            .with_filter(LinearFilter::butterworth_lowpass(2, 20.0, 200.0).unwrap());
        let pipeline = Pipeline::new(config, 6, Box::new(IntegratedDelta::new(vec![6, 7, 8])));
        b.iter(|| pipeline.prepare(black_box(&rec)).unwrap());
    });
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
