use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use treerange_engine::{Boundaries, LiveRange, Position, StaticRange};
mod common;

fn bench_content_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("content");
    group.sample_size(10);

    let (doc, body) = common::generate_document(20, 4);
    let (first, last) = common::text_extremes(&doc, body);
    let boundaries = Boundaries::new(Position::new(first, 2), Position::new(last, 3));

    group.bench_function("to_text", |b| {
        let mut d = doc.clone();
        let range = StaticRange::from_boundaries(&mut d, boundaries).unwrap();
        b.iter(|| black_box(range.to_text(&d).unwrap()));
    });

    group.bench_function("clone_contents", |b| {
        b.iter_batched(
            || doc.clone(),
            |mut d| {
                let range = StaticRange::from_boundaries(&mut d, boundaries).unwrap();
                black_box(range.clone_contents(&mut d).unwrap());
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("extract_contents", |b| {
        b.iter_batched(
            || doc.clone(),
            |mut d| {
                let mut range = LiveRange::from_boundaries(&mut d, boundaries).unwrap();
                black_box(range.extract_contents(&mut d).unwrap());
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("split_and_normalize", |b| {
        b.iter_batched(
            || doc.clone(),
            |mut d| {
                let mut range = StaticRange::from_boundaries(&mut d, boundaries).unwrap();
                range.split_boundaries(&mut d).unwrap();
                range.normalize_boundaries(&mut d).unwrap();
                black_box(range);
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_content_operations);
criterion_main!(benches);
