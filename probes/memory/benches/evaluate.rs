use criterion::{black_box, criterion_group, criterion_main, Criterion};
use snmpcheck_rs_core::{Threshold, Thresholds};
use snmpcheck_rs_memory::{evaluate, MemoryReading};

fn bench_evaluate(c: &mut Criterion) {
    let reading = MemoryReading::new(8_000_000, 4_200_000);
    let percent = Thresholds::default();
    let absolute = Thresholds::new(Threshold::AbsoluteMb(90.0), Threshold::AbsoluteMb(50.0));

    c.bench_function("evaluate_percent", |b| {
        b.iter(|| evaluate(black_box(&reading), black_box(&percent)))
    });
    c.bench_function("evaluate_absolute", |b| {
        b.iter(|| evaluate(black_box(&reading), black_box(&absolute)))
    });
}

criterion_group!(benches, bench_evaluate);
criterion_main!(benches);
