use bbrng::{BlockHash, CompletedBlocks, DrawRange, SeedEngine};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn window(block_count: u8) -> CompletedBlocks {
    let hashes = (0..block_count)
        .map(|i| BlockHash::from_bytes([i.wrapping_mul(37).wrapping_add(11); 32]))
        .collect();
    CompletedBlocks::from_hashes(850_000, hashes).expect("non-empty window")
}

fn draw_many(c: &mut Criterion) {
    let mut group = c.benchmark_group("draw_many");
    for (min, max) in [(1i64, 6i64), (1, 100), (0, 999_999_999_999)] {
        let range = DrawRange::new(min, max).expect("valid range");
        for blocks in [1u8, 5] {
            let engine = SeedEngine::new(&window(blocks), range);
            group.bench_function(BenchmarkId::new(format!("k{blocks}"), max - min + 1), |b| {
                b.iter(|| black_box(engine.draw_many(10).expect("draws")))
            });
        }
    }
    group.finish();
}

criterion_group!(benches, draw_many);
criterion_main!(benches);
