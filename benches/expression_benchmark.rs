//! Expression evaluation benchmarks.
//!
//! Measures:
//! - Constant broadcast into a repeating column
//! - The same literal materialized into every row
//! - Column arithmetic against a repeating operand

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vexec::{
    ArithmeticOp, ColumnVector, ColumnVectorType, ConstantVectorExpression, LongColumnArithmetic,
    TypeInfo, Value, VectorExpression, VectorizedRowBatch, DEFAULT_BATCH_SIZE,
};

fn long_batch(columns: usize) -> VectorizedRowBatch {
    let mut batch =
        VectorizedRowBatch::new(&vec![TypeInfo::BigInt; columns], DEFAULT_BATCH_SIZE)
            .expect("create batch");
    batch.set_size(DEFAULT_BATCH_SIZE).expect("set size");
    batch
}

/// Benchmark repeating broadcast against per-row materialization
fn bench_constant_broadcast(c: &mut Criterion) {
    let mut group = c.benchmark_group("constant_broadcast");
    group.throughput(Throughput::Elements(DEFAULT_BATCH_SIZE as u64));

    let expr = ConstantVectorExpression::new(0, TypeInfo::BigInt, Value::Int64(42))
        .expect("build constant");
    let mut batch = long_batch(1);
    group.bench_function("repeating", |b| {
        b.iter(|| {
            expr.evaluate(black_box(&mut batch)).expect("evaluate");
        });
    });

    let mut column = ColumnVector::new(ColumnVectorType::Int64, DEFAULT_BATCH_SIZE);
    group.bench_function("materialized", |b| {
        b.iter(|| {
            for row in 0..DEFAULT_BATCH_SIZE {
                column.set_long(row, black_box(42)).expect("write");
            }
        });
    });

    group.finish();
}

/// Benchmark byte-sequence broadcast for several literal lengths
fn bench_bytes_broadcast(c: &mut Criterion) {
    let mut group = c.benchmark_group("bytes_broadcast");

    for len in &[8usize, 64, 512] {
        let literal = vec![b'x'; *len];
        let expr = ConstantVectorExpression::builder(0, TypeInfo::String)
            .bytes(&literal)
            .build()
            .expect("build constant");
        let mut batch = VectorizedRowBatch::new(&[TypeInfo::String], DEFAULT_BATCH_SIZE)
            .expect("create batch");
        batch.set_size(DEFAULT_BATCH_SIZE).expect("set size");

        group.bench_with_input(BenchmarkId::from_parameter(len), len, |b, _| {
            b.iter(|| {
                expr.evaluate(black_box(&mut batch)).expect("evaluate");
            });
        });
    }

    group.finish();
}

/// Benchmark column + constant addition, unchecked and checked
fn bench_add_constant(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_constant");
    group.throughput(Throughput::Elements(DEFAULT_BATCH_SIZE as u64));

    for checked in [false, true] {
        let constant = ConstantVectorExpression::new(1, TypeInfo::BigInt, Value::Int64(7))
            .expect("build constant");
        let mut add = LongColumnArithmetic::new(ArithmeticOp::Add, 0, 1, 2)
            .with_children(vec![Box::new(constant)]);
        if checked {
            add = add.checked();
        }
        let mut rng = StdRng::seed_from_u64(0x5EED);
        let mut batch = long_batch(3);
        {
            let input = batch.column_mut(0).expect("column 0");
            for row in 0..DEFAULT_BATCH_SIZE {
                input
                    .set_long(row, rng.gen_range(-1_000_000..1_000_000))
                    .expect("write");
            }
        }

        let name = if checked { "checked" } else { "unchecked" };
        group.bench_function(name, |b| {
            b.iter(|| {
                add.evaluate(black_box(&mut batch)).expect("evaluate");
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_constant_broadcast,
    bench_bytes_broadcast,
    bench_add_constant
);
criterion_main!(benches);
