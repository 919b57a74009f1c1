use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use provkg::embedding::{Embedder, LexicalEmbedder};
use provkg::entity::{EntityId, LabelIndex};
use provkg::mapping::MappingPair;
use provkg::retrieval::RetrievalIndex;
use provkg::MergeEngine;

fn corpus(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| {
            format!(
                "new_province: http://example.org/vn/entity/region-{} | new_label: Region {} | \
                 old_province: http://dbpedia.org/resource/Province_{i} | old_label: Province {i}",
                i / 3,
                i / 3
            )
        })
        .collect()
}

fn bench_index_build(c: &mut Criterion) {
    let embedder: Arc<dyn Embedder> = Arc::new(LexicalEmbedder::default());
    let mut group = c.benchmark_group("retrieval/build");
    for n in [64usize, 512, 4096] {
        let facts = corpus(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &facts, |b, facts| {
            b.iter(|| RetrievalIndex::build(Arc::clone(&embedder), facts.clone()).unwrap());
        });
    }
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let embedder: Arc<dyn Embedder> = Arc::new(LexicalEmbedder::default());
    let mut group = c.benchmark_group("retrieval/search");
    group.throughput(Throughput::Elements(1));
    for n in [64usize, 512, 4096] {
        let index = RetrievalIndex::build(Arc::clone(&embedder), corpus(n)).unwrap();
        group.bench_with_input(BenchmarkId::new("k8", n), &index, |b, index| {
            b.iter(|| index.search(black_box("Which regions formed Region 7?"), 8).unwrap());
        });
    }
    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let n = 1024usize;
    let index = LabelIndex::build(
        (0..n).map(|i| (EntityId::new(format!("http://dbpedia.org/resource/Province_{i}")), format!("Province {i}"))),
    );
    let pairs: Vec<MappingPair> = (0..n)
        .map(|i| MappingPair::new(format!("Province {i}"), format!("Region {}", i / 3)))
        .collect();
    let engine = MergeEngine::default();

    let mut group = c.benchmark_group("merge");
    group.throughput(Throughput::Elements(n as u64));
    group.bench_function("1024_pairs", |b| {
        b.iter(|| engine.merge(&index, black_box(&pairs)));
    });
    group.finish();
}

criterion_group!(benches, bench_index_build, bench_search, bench_merge);
criterion_main!(benches);
