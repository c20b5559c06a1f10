use criterion::{black_box, criterion_group, criterion_main, Criterion};
use report_figures::series;

fn leaf_counts(n: usize) -> Vec<f64> {
    // deterministic spread over the 0..5000 range of the report
    (0..n).map(|i| ((i * 7919) % 5000) as f64).collect()
}

fn bench_cdf(c: &mut Criterion) {
    let samples = leaf_counts(100_000);
    c.bench_function("cdf 100k", |b| b.iter(|| series::cdf(black_box(&samples))));
}

fn bench_stack(c: &mut Criterion) {
    let phases: Vec<Vec<f64>> = (0..4).map(|p| leaf_counts(10_000 + p)).collect();
    let columns: Vec<&[f64]> = phases.iter().map(|p| p.as_slice()).collect();
    c.bench_function("sum 4x10k", |b| b.iter(|| series::sum(black_box(&columns))));
    c.bench_function("cumulative 4x10k", |b| {
        b.iter(|| series::cumulative(black_box(&columns)))
    });
}

criterion_group!(benches, bench_cdf, bench_stack);
criterion_main!(benches);
