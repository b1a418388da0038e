//! Detection throughput benchmark
//!
//! Measures scoring of fresh tables with an already fitted pipeline, plus the
//! isolation forest fit that dominates training time at default settings.
//!
//! # Run Instructions
//!
//! ```bash
//! cargo bench --bench detection_throughput
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use netsentry::config::{DetectorConfig, IsolationForestConfig};
use netsentry::isolation_forest::IsolationForest;
use netsentry::pipeline::Pipeline;
use netsentry::schema::Record;
use netsentry::table::RawTable;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn bench_records(n: usize, seed: u64) -> Vec<Record> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| Record {
            duration: rng.gen_range(0.0..2.0),
            src_bytes: rng.gen_range(200.0..1_500.0),
            dst_bytes: rng.gen_range(100.0..5_000.0),
            count: rng.gen_range(1..20) as f64,
            srv_count: rng.gen_range(1..10) as f64,
            protocol: ["tcp", "udp", "icmp"][i % 3].to_string(),
            service: ["http", "dns", "ftp", "smtp"][i % 4].to_string(),
            flag: ["SF", "S0", "REJ"][i % 3].to_string(),
            label: None,
        })
        .collect()
}

fn bench_detect(c: &mut Criterion) {
    let mut config = DetectorConfig::default();
    config.autoencoder.epochs = 5;
    let trained = Pipeline::new(config)
        .unwrap()
        .train(&RawTable::from_records(&bench_records(1_000, 1)))
        .unwrap();

    let mut group = c.benchmark_group("detect");
    for size in [100, 1_000, 5_000] {
        let table = RawTable::from_records(&bench_records(size, 2));
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &table, |b, table| {
            b.iter(|| trained.fitted.detect(black_box(table)).unwrap());
        });
    }
    group.finish();
}

fn bench_isolation_fit(c: &mut Criterion) {
    let matrix: Vec<Vec<f64>> = bench_records(2_000, 3)
        .iter()
        .map(|r| r.numeric().to_vec())
        .collect();

    c.bench_function("isolation_forest_fit_2000x5", |b| {
        b.iter(|| {
            let mut forest = IsolationForest::from_config(&IsolationForestConfig::default());
            forest.fit(black_box(&matrix)).unwrap();
            forest
        });
    });
}

criterion_group!(benches, bench_detect, bench_isolation_fit);
criterion_main!(benches);
