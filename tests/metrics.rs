//! Metrics hook coverage: per-thread counters, bucketing, and the fold
//! into the global aggregate.

use regioned::arena::metrics::{
    global_metrics, metrics_hooks, report_to_global, reset_local_metrics, with_local_metrics,
};
use regioned::arena::{Arena, ArenaOptions, KILOBYTE};

fn metered_options() -> ArenaOptions {
    ArenaOptions::default()
        .with_normal_block_size(KILOBYTE)
        .with_suggested_init_block_size(KILOBYTE)
        .with_hooks(metrics_hooks())
}

#[test]
fn init_allocation_and_newblock_counts() {
    reset_local_metrics();

    let arena = Arena::new(metered_options());
    with_local_metrics(|m| assert_eq!(m.init_count, 1));

    arena.allocate_aligned(100).unwrap();
    arena.create(42u64).unwrap();
    arena.create_array(8, 0u8).unwrap();

    with_local_metrics(|m| {
        assert_eq!(m.alloc_count, 3);
        assert_eq!(m.space_allocated, 100 + 8 + 8);
        // One block serves everything so far.
        assert_eq!(m.newblock_count, 1);
        // Every sample fell into the smallest buckets.
        assert_eq!(m.alloc_size_buckets.iter().sum::<u64>(), 3);
    });

    // Force a second block.
    arena.allocate_aligned(4 * KILOBYTE).unwrap();
    with_local_metrics(|m| assert_eq!(m.newblock_count, 2));
}

#[test]
fn reset_and_destruction_counts() {
    reset_local_metrics();

    {
        let mut arena = Arena::new(metered_options());
        arena.allocate_aligned(256).unwrap();
        arena.reset();
        with_local_metrics(|m| {
            assert_eq!(m.reset_count, 1);
            assert!(m.space_resettled >= KILOBYTE as u64);
        });
    }

    with_local_metrics(|m| {
        assert_eq!(m.destruct_count, 1);
        // The short-lived arena lands in a lifetime bucket.
        assert_eq!(m.lifetime_buckets.iter().sum::<u64>(), 1);
    });
}

#[test]
fn call_site_attribution() {
    reset_local_metrics();

    let arena = Arena::new(metered_options());
    arena.allocate_aligned(64).unwrap();
    arena.allocate_aligned(64).unwrap();

    with_local_metrics(|m| {
        assert_eq!(m.arena_alloc_bytes.len(), 1);
        let (site, bytes) = m.arena_alloc_bytes.iter().next().unwrap();
        assert!(site.contains("metrics.rs"));
        assert_eq!(*bytes, 128);
    });
}

#[test]
fn report_folds_into_global_and_resets_local() {
    reset_local_metrics();

    {
        let arena = Arena::new(metered_options());
        arena.allocate_aligned(2048).unwrap();
    }

    let before_init = global_metrics().init_count.load(std::sync::atomic::Ordering::Relaxed);
    report_to_global();

    with_local_metrics(|m| {
        assert_eq!(m.init_count, 0);
        assert_eq!(m.alloc_count, 0);
        assert!(m.arena_alloc_bytes.is_empty());
    });

    let after_init = global_metrics().init_count.load(std::sync::atomic::Ordering::Relaxed);
    assert!(after_init > before_init);

    let summary = global_metrics().summary();
    assert!(summary.contains("init_count"));
    assert!(summary.contains("AllocSize distribution"));
    assert!(summary.contains("Lifetime distribution"));
}
