//! Throughput comparison of the allocation strategies.
//!
//! Workloads mirror the classic harness shapes: repeated fixed-size
//! allocation, a sweep over a table of sizes at alignment 8, and randomized
//! draws from that table.

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use memarena::allocator::{
    Allocator, FreeListAllocator, LinearAllocator, PlacementPolicy, PoolAllocator, Resettable,
    StackAllocator, SystemAllocator,
};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::alloc::Layout;

const ALLOCATION_SIZES: [usize; 7] = [32, 64, 256, 512, 1024, 2048, 4096];
const ARENA_SIZE: usize = 1 << 20;

fn bench_fixed_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("fixed_size_4096");
    group.throughput(Throughput::Elements(1));

    group.bench_function("pool", |b| {
        let pool = PoolAllocator::new(16 * 1024 * 1024, 4096).unwrap();
        let layout = Layout::from_size_align(4096, 8).unwrap();
        b.iter(|| unsafe {
            let ptr = pool.allocate(layout).unwrap();
            pool.deallocate(black_box(ptr).cast(), layout);
        });
    });

    group.bench_function("free_list_first", |b| {
        let allocator = FreeListAllocator::new(ARENA_SIZE, PlacementPolicy::FindFirst).unwrap();
        let layout = Layout::from_size_align(4096, 8).unwrap();
        b.iter(|| unsafe {
            let ptr = allocator.allocate(layout).unwrap();
            allocator.deallocate(black_box(ptr).cast(), layout);
        });
    });

    group.bench_function("system", |b| {
        let allocator = SystemAllocator::new();
        let layout = Layout::from_size_align(4096, 8).unwrap();
        b.iter(|| unsafe {
            let ptr = allocator.allocate(layout).unwrap();
            allocator.deallocate(black_box(ptr).cast(), layout);
        });
    });

    group.finish();
}

fn bench_size_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("size_table_sweep");
    group.throughput(Throughput::Elements(ALLOCATION_SIZES.len() as u64));

    group.bench_function("linear_with_reset", |b| {
        let allocator = LinearAllocator::new(ARENA_SIZE).unwrap();
        b.iter(|| unsafe {
            for size in ALLOCATION_SIZES {
                let layout = Layout::from_size_align(size, 8).unwrap();
                black_box(allocator.allocate(layout).unwrap());
            }
            allocator.reset();
        });
    });

    group.bench_function("stack_lifo", |b| {
        let allocator = StackAllocator::new(ARENA_SIZE).unwrap();
        b.iter(|| unsafe {
            let mut live = Vec::with_capacity(ALLOCATION_SIZES.len());
            for size in ALLOCATION_SIZES {
                let layout = Layout::from_size_align(size, 8).unwrap();
                live.push((allocator.allocate(layout).unwrap(), layout));
            }
            while let Some((ptr, layout)) = live.pop() {
                allocator.deallocate(ptr.cast(), layout);
            }
        });
    });

    for policy in [PlacementPolicy::FindFirst, PlacementPolicy::FindBest] {
        let name = match policy {
            PlacementPolicy::FindFirst => "free_list_first",
            PlacementPolicy::FindBest => "free_list_best",
        };
        group.bench_function(name, |b| {
            let allocator = FreeListAllocator::new(ARENA_SIZE, policy).unwrap();
            b.iter(|| unsafe {
                let mut live = Vec::with_capacity(ALLOCATION_SIZES.len());
                for size in ALLOCATION_SIZES {
                    let layout = Layout::from_size_align(size, 8).unwrap();
                    live.push((allocator.allocate(layout).unwrap(), layout));
                }
                for (ptr, layout) in live {
                    allocator.deallocate(ptr.cast(), layout);
                }
            });
        });
    }

    group.bench_function("system", |b| {
        let allocator = SystemAllocator::new();
        b.iter(|| unsafe {
            let mut live = Vec::with_capacity(ALLOCATION_SIZES.len());
            for size in ALLOCATION_SIZES {
                let layout = Layout::from_size_align(size, 8).unwrap();
                live.push((allocator.allocate(layout).unwrap(), layout));
            }
            for (ptr, layout) in live {
                allocator.deallocate(ptr.cast(), layout);
            }
        });
    });

    group.finish();
}

fn bench_random_workload(c: &mut Criterion) {
    let mut group = c.benchmark_group("random_workload");
    group.throughput(Throughput::Elements(64));

    group.bench_function("free_list_first", |b| {
        let allocator = FreeListAllocator::new(ARENA_SIZE, PlacementPolicy::FindFirst).unwrap();
        let mut rng = StdRng::seed_from_u64(0x5EED);
        b.iter(|| unsafe {
            let mut live = Vec::with_capacity(64);
            for _ in 0..64 {
                let size = ALLOCATION_SIZES[rng.random_range(0..ALLOCATION_SIZES.len())];
                let layout = Layout::from_size_align(size, 8).unwrap();
                match allocator.allocate(layout) {
                    Ok(ptr) => live.push((ptr, layout)),
                    Err(_) => {
                        // Drain half the live set and keep going.
                        for _ in 0..live.len() / 2 {
                            let (ptr, layout) = live.swap_remove(rng.random_range(0..live.len()));
                            allocator.deallocate(ptr.cast(), layout);
                        }
                    }
                }
            }
            for (ptr, layout) in live {
                allocator.deallocate(ptr.cast(), layout);
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_fixed_size,
    bench_size_table,
    bench_random_workload
);
criterion_main!(benches);
