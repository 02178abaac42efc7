//! Benchmarks for pattern queries
//!
//! Run with: cargo bench --bench query_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tessel::config::Limits;
use tessel::fractal::Generator;
use tessel::morph::TensionCurve;
use tessel::pattern::{Fraction, Pattern};
use tessel::value::Value;

fn drums() -> Pattern<Value> {
    let kick = Pattern::pure(Value::from("bd")).euclid_struct(3, 8, 0).unwrap();
    let hats = Pattern::fastcat((0..8).map(|_| Pattern::pure(Value::from("hh"))).collect());
    Pattern::stack(vec![kick, hats.degrade_by_with_seed(0.3, 1).unwrap()])
}

/// Query cost of a layered drum pattern over growing spans
fn bench_query_span(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_span");
    let pattern = drums();

    for cycles in [1i64, 4, 16] {
        group.bench_with_input(BenchmarkId::from_parameter(cycles), &cycles, |b, &cycles| {
            b.iter(|| {
                pattern
                    .query_span(Fraction::ZERO, black_box(Fraction::from_integer(cycles)))
                    .unwrap()
            })
        });
    }
    group.finish();
}

/// Fractal generators rebuilt at increasing depth
fn bench_generators(c: &mut Criterion) {
    let mut group = c.benchmark_group("generators");
    let limits = Limits::default();

    for spec in ["cantor:6", "dragon:8", "ca:110,64", "euclid:13,32,3"] {
        let generator: Generator = spec.parse().unwrap();
        group.bench_function(spec, |b| {
            b.iter(|| black_box(&generator).build(&limits).unwrap().first_cycle().unwrap())
        });
    }
    group.finish();
}

/// Morph with the Lorenz curve, which re-integrates per query
fn bench_morph(c: &mut Criterion) {
    let morphed = drums()
        .morph(
            Pattern::pure(Value::from("pad")),
            TensionCurve::Lorenz,
            Fraction::from_integer(8),
        )
        .unwrap();

    c.bench_function("morph_lorenz_8_cycles", |b| {
        b.iter(|| {
            morphed
                .query_span(Fraction::ZERO, black_box(Fraction::from_integer(8)))
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_query_span, bench_generators, bench_morph);
criterion_main!(benches);
