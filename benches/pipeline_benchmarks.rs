//! Throughput of the per-metric pipeline and of a full analysis pass.
//!
//! ```bash
//! cargo bench --bench pipeline_benchmarks
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uplift::experiments::metrics::summarize_histogram;
use uplift::spline::{Spline, SplineDegree};
use uplift::{analyze, AnalysisConfig, Histogram, InMemoryTelemetry};

const THRESHOLDS: [f64; 12] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 0.95, 0.99, 1.0];

fn random_histogram(rng: &mut StdRng, buckets: usize) -> Histogram {
    let bins = (0..buckets).map(|i| (i * 10) as f64).collect();
    let counts = (0..buckets).map(|_| rng.gen_range(0..10_000)).collect();
    Histogram::new(bins, counts).unwrap()
}

fn bench_summarize(c: &mut Criterion) {
    let mut group = c.benchmark_group("summarize_histogram");
    let mut rng = StdRng::seed_from_u64(1);
    for buckets in [50, 500, 5000] {
        let h = random_histogram(&mut rng, buckets);
        group.bench_with_input(BenchmarkId::from_parameter(buckets), &h, |b, h| {
            b.iter(|| summarize_histogram(black_box(h), &THRESHOLDS, 0.95).unwrap())
        });
    }
    group.finish();
}

fn bench_spline(c: &mut Criterion) {
    let points: Vec<(f64, f64)> = THRESHOLDS.iter().map(|&q| (q, q * q * 1000.0)).collect();
    let grid: Vec<f64> = (0..=80).map(|i| 0.1 + i as f64 * 0.01).collect();
    for degree in [SplineDegree::Linear, SplineDegree::Cubic] {
        c.bench_function(&format!("spline_fit_eval_{:?}", degree), |b| {
            b.iter(|| {
                let s = Spline::fit(black_box(&points), degree).unwrap();
                grid.iter().map(|&x| s.evaluate(x)).sum::<f64>()
            })
        });
    }
}

fn bench_analyze(c: &mut Criterion) {
    let config = AnalysisConfig::from_json(
        r#"{
            "slug": "bench",
            "branches": ["control", "a", "b"],
            "segments": ["All", "Windows", "Mac", "Linux"],
            "histograms": {"fcp": {"kind": "numerical"}, "lcp": {"kind": "numerical"}},
            "events": {"load": [0, 10000]}
        }"#,
    )
    .unwrap();

    let mut rng = StdRng::seed_from_u64(2);
    let mut data = InMemoryTelemetry::new();
    for branch in &config.branches {
        for segment in &config.segments {
            for metric in ["fcp", "lcp"] {
                let h = random_histogram(&mut rng, 200);
                data.insert_histogram(branch, segment, metric, h.bins().to_vec(), h.counts().to_vec());
            }
            let samples = (0..2000).map(|_| rng.gen_range(0.0..10000.0)).collect();
            data.insert_samples(branch, segment, "load", samples);
        }
    }

    c.bench_function("analyze_3x4x3", |b| {
        b.iter(|| analyze(black_box(&config), black_box(&data)).unwrap())
    });
}

criterion_group!(benches, bench_summarize, bench_spline, bench_analyze);
criterion_main!(benches);
