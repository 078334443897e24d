//! Fixed-size pool benchmarks: the cost of a freelist hit versus a
//! batch refill from the parent context.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dnsmem_core::{MemoryContext, MemoryPool};

fn bench_get_put_steady_state(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_get_put");

    for &element_size in &[16usize, 64, 256] {
        group.bench_with_input(
            BenchmarkId::new("warm_freelist", element_size),
            &element_size,
            |b, &sz| {
                let ctx = MemoryContext::create(None, 0, 0).unwrap();
                let pool = MemoryPool::create(&ctx, sz).unwrap();
                pool.set_free_max(32);
                // Warm the freelist so steady-state iterations don't pay
                // for a batch refill.
                let warm = pool.get().unwrap();
                pool.put(warm);

                b.iter(|| {
                    let block = pool.get().unwrap();
                    black_box(block.as_ptr());
                    pool.put(block);
                });
            },
        );
    }
    group.finish();
}

fn bench_batch_refill(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_batch_refill");

    group.bench_function("fill_count_64", |b| {
        let ctx = MemoryContext::create(None, 0, 0).unwrap();
        let pool = MemoryPool::create(&ctx, 32).unwrap();
        pool.set_free_max(64);
        pool.set_fill_count(64);

        b.iter(|| {
            let blocks: Vec<_> = (0..64).map(|_| pool.get().unwrap()).collect();
            for block in blocks {
                pool.put(block);
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_get_put_steady_state, bench_batch_refill);
criterion_main!(benches);
