//! Criterion benchmarks: arena allocation against the system allocator,
//! and string building across the storage families.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use regioned::arena::{Arena, ArenaOptions};
use regioned::string::{ArenaCowString, CowString, SmallString};

fn bench_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocation");

    group.bench_function("arena_create_u64", |b| {
        let mut arena = Arena::new(ArenaOptions::default());
        b.iter(|| {
            for i in 0..1000u64 {
                black_box(arena.create(i).unwrap());
            }
            arena.reset();
        });
    });

    group.bench_function("box_u64", |b| {
        b.iter(|| {
            for i in 0..1000u64 {
                black_box(Box::new(i));
            }
        });
    });

    group.bench_function("arena_mixed_sizes", |b| {
        let mut arena = Arena::new(ArenaOptions::default());
        b.iter(|| {
            for size in [8usize, 64, 256, 1024, 40] {
                black_box(arena.allocate_aligned(size).unwrap());
            }
            arena.reset();
        });
    });

    group.finish();
}

fn bench_strings(c: &mut Criterion) {
    let mut group = c.benchmark_group("strings");

    group.bench_function("cow_append_small", |b| {
        b.iter(|| {
            let mut s = CowString::new();
            for _ in 0..16 {
                s.push(black_box(b'x'));
            }
            black_box(s.len())
        });
    });

    group.bench_function("small_string_append", |b| {
        b.iter(|| {
            let mut s = SmallString::new();
            for _ in 0..64 {
                s.push(black_box(b'x'));
            }
            black_box(s.len())
        });
    });

    group.bench_function("arena_string_build", |b| {
        let mut arena = Arena::new(ArenaOptions::default());
        b.iter(|| {
            {
                let mut s = ArenaCowString::new_in(arena.allocator());
                for _ in 0..256 {
                    s.push(black_box(b'x'));
                }
                black_box(s.len());
            }
            arena.reset();
        });
    });

    group.bench_function("cow_clone_large", |b| {
        let s = CowString::from(&"c".repeat(4096)[..]);
        b.iter(|| black_box(s.clone()));
    });

    group.finish();
}

criterion_group!(benches, bench_allocation, bench_strings);
criterion_main!(benches);
