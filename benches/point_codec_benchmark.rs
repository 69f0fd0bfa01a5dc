use criterion::{criterion_group, criterion_main, Criterion};
use hyve::db::rows::{format_point, parse_point};
use hyve::models::{Bounds, Coordinates};
use std::hint::black_box;

fn benchmark_point_codec(c: &mut Criterion) {
    // Points scattered across the default Nairobi viewport
    let points: Vec<Coordinates> = (0..1000)
        .map(|i| {
            let t = f64::from(i) / 1000.0;
            Coordinates::new(-1.45 + 0.3 * t, 36.65 + 0.35 * (1.0 - t))
        })
        .collect();
    let encoded: Vec<String> = points.iter().copied().map(format_point).collect();

    let mut group = c.benchmark_group("point_codec");

    group.bench_function("format_1000", |b| {
        b.iter(|| {
            for p in black_box(&points) {
                black_box(format_point(*p));
            }
        })
    });

    group.bench_function("parse_1000", |b| {
        b.iter(|| {
            for raw in black_box(&encoded) {
                black_box(parse_point(raw));
            }
        })
    });

    group.bench_function("parse_malformed", |b| {
        b.iter(|| parse_point(black_box("(-1.2921, not-a-number)")))
    });

    group.finish();
}

fn benchmark_bounds_filter(c: &mut Criterion) {
    let points: Vec<Coordinates> = (0..10_000)
        .map(|i| {
            let t = f64::from(i) / 10_000.0;
            Coordinates::new(-2.0 + t, 36.0 + 1.5 * t)
        })
        .collect();

    c.bench_function("bounds_contains_10000", |b| {
        b.iter(|| {
            black_box(&points)
                .iter()
                .filter(|p| Bounds::DEFAULT.contains(**p))
                .count()
        })
    });
}

criterion_group!(benches, benchmark_point_codec, benchmark_bounds_filter);
criterion_main!(benches);
