//! Merge-join benchmarks
//!
//! Run with: cargo bench

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use shardjoin::expr::Expr;
use shardjoin::index::{
    DefaultUidIntersector, IndexEntry, IndexInfo, IndexMatch, IndexStream, InfiniteIntersectionStrategy,
    Intersection, ScannerStream, Union, collect_entries,
};
use shardjoin::iterator::{AndIterator, ArrayIterator, NestedIterator, OrIterator, collect_keys};

/// `days` days of `shards` shards each, every `stride`th shard populated
fn shard_entries(days: u32, shards: u32, stride: u32, ids_per_shard: u32) -> Vec<IndexEntry> {
    let mut entries = Vec::new();
    for day in 0..days {
        for shard in (0..shards).step_by(stride as usize) {
            let key = format!("2020{:02}{:02}_{}", 1 + day / 28, 1 + day % 28, shard);
            let info = IndexInfo::from_ids((0..ids_per_shard).map(|i| IndexMatch::new(format!("uid.{}", i))));
            entries.push((key, info));
        }
    }
    entries
}

fn bench_index_info(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_info");
    let left = IndexInfo::from_ids((0..500).map(|i| IndexMatch::with_node(format!("uid.{}", i * 2), Expr::eq("A", "1"))));
    let right = IndexInfo::from_ids((0..500).map(|i| IndexMatch::with_node(format!("uid.{}", i * 3), Expr::eq("B", "2"))));

    group.bench_function("union_exact_500", |b| b.iter(|| black_box(&left).union(black_box(&right), &[])));
    group.bench_function("intersect_exact_500", |b| {
        b.iter(|| {
            black_box(&left).intersect(
                black_box(&right),
                &[],
                &DefaultUidIntersector,
                InfiniteIntersectionStrategy::Conservative,
            )
        })
    });
    group.bench_function("encode_decode_500", |b| {
        b.iter(|| IndexInfo::from_bytes(&black_box(&left).to_bytes()))
    });
    group.finish();
}

fn bench_streams(c: &mut Criterion) {
    let mut group = c.benchmark_group("streams");
    for children in [2usize, 8, 32] {
        group.bench_with_input(BenchmarkId::new("union", children), &children, |b, &children| {
            b.iter(|| {
                let streams: Vec<Box<dyn IndexStream>> = (0..children)
                    .map(|i| {
                        let entries = shard_entries(30, 16, 1 + (i as u32 % 3), 4);
                        Box::new(ScannerStream::with_data(entries, Expr::eq("F", i.to_string()))) as Box<dyn IndexStream>
                    })
                    .collect();
                let mut union = Union::new(streams).unwrap();
                collect_entries(&mut union).len()
            })
        });
        group.bench_with_input(BenchmarkId::new("intersection", children), &children, |b, &children| {
            b.iter(|| {
                let streams: Vec<Box<dyn IndexStream>> = (0..children)
                    .map(|i| {
                        let entries = shard_entries(30, 16, 1 + (i as u32 % 3), 4);
                        Box::new(ScannerStream::with_data(entries, Expr::eq("F", i.to_string()))) as Box<dyn IndexStream>
                    })
                    .collect();
                let mut intersection =
                    Intersection::new(streams, InfiniteIntersectionStrategy::Conservative).unwrap();
                collect_entries(&mut intersection).len()
            })
        });
    }
    group.finish();
}

fn bench_iterators(c: &mut Criterion) {
    let mut group = c.benchmark_group("iterators");
    let evens: Vec<u64> = (0..100_000).step_by(2).collect();
    let threes: Vec<u64> = (0..100_000).step_by(3).collect();
    let sevens: Vec<u64> = (0..100_000).step_by(7).collect();

    group.bench_function("and_with_exclude", |b| {
        b.iter(|| {
            let includes: Vec<Box<dyn NestedIterator<u64>>> = vec![
                Box::new(ArrayIterator::new(evens.iter().copied())),
                Box::new(ArrayIterator::new(threes.iter().copied())),
            ];
            let excludes: Vec<Box<dyn NestedIterator<u64>>> = vec![Box::new(ArrayIterator::new(sevens.iter().copied()))];
            let mut and = AndIterator::new(includes, excludes);
            and.initialize().unwrap();
            collect_keys(&mut and).unwrap().len()
        })
    });
    group.bench_function("or_three_way", |b| {
        b.iter(|| {
            let includes: Vec<Box<dyn NestedIterator<u64>>> = vec![
                Box::new(ArrayIterator::new(evens.iter().copied())),
                Box::new(ArrayIterator::new(threes.iter().copied())),
                Box::new(ArrayIterator::new(sevens.iter().copied())),
            ];
            let mut or = OrIterator::new(includes, Vec::new());
            or.initialize().unwrap();
            collect_keys(&mut or).unwrap().len()
        })
    });
    group.finish();
}

criterion_group!(benches, bench_index_info, bench_streams, bench_iterators);
criterion_main!(benches);
