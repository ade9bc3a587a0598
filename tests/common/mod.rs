use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uplift::{AnalysisConfig, InMemoryTelemetry};

pub const BINS: [f64; 8] = [0.0, 50.0, 100.0, 200.0, 400.0, 800.0, 1600.0, 3200.0];

/// Counts roughly shaped like a page-load timing histogram, with `shift`
/// moving mass towards the slower buckets.
pub fn timing_counts(rng: &mut StdRng, shift: usize) -> Vec<u64> {
    let shape = [5u64, 40, 120, 300, 220, 90, 30, 8];
    (0..shape.len())
        .map(|i| {
            let base = shape[i.saturating_sub(shift)];
            base * 10 + rng.gen_range(0..50)
        })
        .collect()
}

pub fn samples(rng: &mut StdRng, n: usize, offset: f64) -> Vec<f64> {
    (0..n).map(|_| offset + rng.gen_range(0.0..1000.0)).collect()
}

/// Three branches over two segments with a numerical histogram, a
/// categorical histogram and an event metric.
pub fn experiment() -> (AnalysisConfig, InMemoryTelemetry) {
    let config = AnalysisConfig::from_json(
        r#"{
            "slug": "pageload-perf",
            "branches": ["control", "slower", "same"],
            "segments": ["All", "Windows"],
            "histograms": {
                "fcp_time": {"kind": "numerical"},
                "gfx_status": {"kind": "categorical", "labels": ["ok", "fallback", "failed"]}
            },
            "pageload_event_fields": {"load_time": [0, 5000]},
            "uplift": {"degree": 3}
        }"#,
    )
    .unwrap();

    let mut rng = StdRng::seed_from_u64(42);
    let mut data = InMemoryTelemetry::new();
    for segment in ["All", "Windows"] {
        let control = timing_counts(&mut rng, 0);
        let slower = timing_counts(&mut rng, 1);
        let load = samples(&mut rng, 500, 0.0);
        let slow_load = samples(&mut rng, 500, 300.0);
        for (branch, counts, events) in [
            ("control", control.clone(), load.clone()),
            ("slower", slower, slow_load),
            ("same", control, load),
        ] {
            data.insert_histogram(branch, segment, "fcp_time", BINS.to_vec(), counts)
                .insert_histogram(
                    branch,
                    segment,
                    "gfx_status",
                    vec![0.0, 1.0, 2.0, 3.0],
                    vec![900, 80, 20, 0],
                )
                .insert_samples(branch, segment, "load_time", events);
        }
    }
    (config, data)
}
