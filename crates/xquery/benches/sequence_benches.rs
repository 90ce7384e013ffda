use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use xquery_core::engine::functions::{Function, StandardFunc};
use xquery_core::expr::Range;
use xquery_core::{Expr, Item, QueryContext, Value, compile, evaluate};

const SIZES: [i64; 3] = [1_000, 10_000, 100_000];

fn items(n: i64) -> Value {
    Value::from_items((0..n).map(Item::integer).collect())
}

fn benchmark_build_and_concat(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_build");
    for n in SIZES {
        group.bench_with_input(BenchmarkId::new("from_items", n), &n, |b, &n| {
            b.iter(|| black_box(items(n)).size())
        });
        let half = items(n / 2);
        group.bench_with_input(BenchmarkId::new("concat", n), &half, |b, half| {
            b.iter(|| black_box(half.concat(half)).size())
        });
    }
    group.finish();
}

fn benchmark_edits(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_edits");
    for n in SIZES {
        let value = items(n);
        group.bench_with_input(BenchmarkId::new("insert_middle", n), &value, |b, v| {
            b.iter(|| black_box(v.insert(v.size() / 2, Item::integer(-1))).size())
        });
        group.bench_with_input(BenchmarkId::new("remove_front", n), &value, |b, v| {
            b.iter(|| black_box(v.remove(0)).size())
        });
        group.bench_with_input(BenchmarkId::new("sub_seq", n), &value, |b, v| {
            b.iter(|| black_box(v.sub_seq(v.size() / 4, v.size() / 2)).size())
        });
    }
    group.finish();
}

fn benchmark_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_access");
    for n in SIZES {
        let value = items(n);
        group.bench_with_input(BenchmarkId::new("item_at", n), &value, |b, v| {
            let size = v.size();
            let mut pos = 0;
            b.iter(|| {
                pos = (pos + 7919) % size;
                black_box(v.item_at(pos))
            })
        });
        group.bench_with_input(BenchmarkId::new("iterate", n), &value, |b, v| {
            b.iter(|| v.iter().filter(|i| i.as_node().is_none()).count())
        });
    }
    group.finish();
}

fn benchmark_sum_of_range(c: &mut Criterion) {
    let mut group = c.benchmark_group("sum_of_range");
    for n in SIZES {
        group.bench_with_input(BenchmarkId::new("compile_and_evaluate", n), &n, |b, &n| {
            b.iter(|| {
                let mut qc = QueryContext::new();
                let range: Box<dyn Expr> =
                    Box::new(Range::new(Box::new(Value::integer(1)), Box::new(Value::integer(n))));
                let call = StandardFunc::new(Function::Sum, vec![range]).unwrap();
                let q = compile(Box::new(call), &mut qc).unwrap();
                black_box(evaluate(&q, &mut qc).unwrap())
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_build_and_concat,
    benchmark_edits,
    benchmark_access,
    benchmark_sum_of_range
);
criterion_main!(benches);
