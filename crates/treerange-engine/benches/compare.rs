use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use treerange_engine::{Position, compare};
mod common;

fn bench_position_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare");
    group.sample_size(20);

    let (doc, body) = common::generate_document(50, 6);
    let (first, last) = common::text_extremes(&doc, body);
    let a = Position::new(first, 3);
    let b = Position::new(last, 2);

    group.bench_function("distant_text", |bench| {
        bench.iter(|| compare(black_box(&doc), black_box(a), black_box(b)).unwrap());
    });

    let same = Position::new(first, 1);
    group.bench_function("same_node", |bench| {
        bench.iter(|| compare(black_box(&doc), black_box(a), black_box(same)).unwrap());
    });

    group.bench_function("container_offsets", |bench| {
        let x = Position::new(body, 10);
        let y = Position::new(body, 40);
        bench.iter(|| compare(black_box(&doc), black_box(x), black_box(y)).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_position_compare);
criterion_main!(benches);
