//! Reference metrics implementation for the arena hooks
//!
//! Per-thread counters accumulate without synchronisation; a separate
//! [`report_to_global`] step folds them into the process-wide
//! [`GlobalArenaMetrics`] using relaxed atomic adds. Install
//! [`metrics_hooks()`] into [`ArenaOptions`](super::ArenaOptions) to feed
//! the counters.
//!
//! ```rust
//! use regioned::arena::{metrics, Arena, ArenaOptions};
//!
//! let options = ArenaOptions::default().with_hooks(metrics::metrics_hooks());
//! {
//!     let arena = Arena::new(options);
//!     let _ = arena.create(1u64).unwrap();
//! }
//! metrics::report_to_global();
//! let summary = metrics::global_metrics().summary();
//! assert!(summary.contains("init_count"));
//! ```

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::Location;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use super::ArenaHooks;

/// Allocation-size histogram edges; a sample lands in the first bucket
/// whose edge is >= the size
pub const ALLOC_SIZE_BUCKETS: [usize; 8] = [64, 128, 256, 512, 1024, 2048, 4096, 1 << 20];

/// Arena-lifetime histogram edges, in milliseconds
pub const LIFETIME_BUCKETS_MS: [u64; 8] = [1, 5, 10, 50, 100, 200, 500, 1000];

/// Per-thread arena metrics, accumulated without synchronisation
#[derive(Debug, Default)]
pub struct LocalArenaMetrics {
    pub init_count: u64,
    pub destruct_count: u64,
    pub alloc_count: u64,
    pub newblock_count: u64,
    pub reset_count: u64,
    pub space_allocated: u64,
    pub space_resettled: u64,
    // space_allocated > space_used means memory reused;
    // space_allocated < space_used means the arena used extra memory.
    pub space_used: u64,
    pub space_wasted: u64,
    pub alloc_size_buckets: [u64; ALLOC_SIZE_BUCKETS.len()],
    pub lifetime_buckets: [u64; LIFETIME_BUCKETS_MS.len()],
    /// Arena identified by its construction call site
    pub arena_alloc_bytes: HashMap<String, u64>,
}

impl LocalArenaMetrics {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn record_alloc_size(&mut self, size: usize) {
        for (i, edge) in ALLOC_SIZE_BUCKETS.iter().enumerate() {
            if size <= *edge {
                self.alloc_size_buckets[i] += 1;
                break;
            }
        }
    }

    fn record_lifetime_ms(&mut self, millis: u64) {
        for (i, edge) in LIFETIME_BUCKETS_MS.iter().enumerate() {
            if millis <= *edge {
                self.lifetime_buckets[i] += 1;
                break;
            }
        }
    }

    fn record_call_site(&mut self, location: &'static Location<'static>, size: usize) {
        let key = format!("{}:{}", location.file(), location.line());
        *self.arena_alloc_bytes.entry(key).or_insert(0) += size as u64;
    }

    /// Fold these counters into the global aggregator and reset them
    ///
    /// Only relaxed atomicity is guaranteed (and is enough: the aggregate
    /// is diagnostic data, not a synchronisation device).
    pub fn report_to_global(&mut self) {
        let global = global_metrics();
        global.init_count.fetch_add(self.init_count, Ordering::Relaxed);
        global.reset_count.fetch_add(self.reset_count, Ordering::Relaxed);
        global.alloc_count.fetch_add(self.alloc_count, Ordering::Relaxed);
        global
            .newblock_count
            .fetch_add(self.newblock_count, Ordering::Relaxed);
        global
            .destruct_count
            .fetch_add(self.destruct_count, Ordering::Relaxed);
        global
            .space_allocated
            .fetch_add(self.space_allocated, Ordering::Relaxed);
        global.space_used.fetch_add(self.space_used, Ordering::Relaxed);
        global
            .space_wasted
            .fetch_add(self.space_wasted, Ordering::Relaxed);
        global
            .space_resettled
            .fetch_add(self.space_resettled, Ordering::Relaxed);
        for (i, count) in self.alloc_size_buckets.iter().enumerate() {
            global.alloc_size_buckets[i].fetch_add(*count, Ordering::Relaxed);
        }
        for (i, count) in self.lifetime_buckets.iter().enumerate() {
            global.lifetime_buckets[i].fetch_add(*count, Ordering::Relaxed);
        }
        {
            let mut map = global.arena_alloc_bytes.lock();
            for (key, bytes) in self.arena_alloc_bytes.drain() {
                *map.entry(key).or_insert(0) += bytes;
            }
        }
        self.reset();
    }
}

/// Process-wide arena metrics aggregate
#[derive(Debug, Default)]
pub struct GlobalArenaMetrics {
    pub init_count: AtomicU64,
    pub destruct_count: AtomicU64,
    pub alloc_count: AtomicU64,
    pub newblock_count: AtomicU64,
    pub reset_count: AtomicU64,
    pub space_allocated: AtomicU64,
    pub space_resettled: AtomicU64,
    pub space_used: AtomicU64,
    pub space_wasted: AtomicU64,
    pub alloc_size_buckets: [AtomicU64; ALLOC_SIZE_BUCKETS.len()],
    pub lifetime_buckets: [AtomicU64; LIFETIME_BUCKETS_MS.len()],
    pub arena_alloc_bytes: Mutex<HashMap<String, u64>>,
}

impl GlobalArenaMetrics {
    /// Zero every counter. Lockless for the scalars; racing reporters are
    /// acceptable for metric data.
    pub fn reset(&self) {
        self.init_count.store(0, Ordering::Relaxed);
        self.destruct_count.store(0, Ordering::Relaxed);
        self.alloc_count.store(0, Ordering::Relaxed);
        self.newblock_count.store(0, Ordering::Relaxed);
        self.reset_count.store(0, Ordering::Relaxed);
        self.space_allocated.store(0, Ordering::Relaxed);
        self.space_resettled.store(0, Ordering::Relaxed);
        self.space_used.store(0, Ordering::Relaxed);
        self.space_wasted.store(0, Ordering::Relaxed);
        for counter in &self.alloc_size_buckets {
            counter.store(0, Ordering::Relaxed);
        }
        for counter in &self.lifetime_buckets {
            counter.store(0, Ordering::Relaxed);
        }
        self.arena_alloc_bytes.lock().clear();
    }

    /// Human-readable dump of the aggregate
    pub fn summary(&self) -> String {
        let alloc_count = self.alloc_count.load(Ordering::Relaxed);
        let destruct_count = self.destruct_count.load(Ordering::Relaxed);

        let mut out = format!(
            "Summary:\n  init_count: {}\n  reset_count: {}\n  destruct_count: {}\n  \
             alloc_count: {}\n  newblock_count: {}\n  space_allocated: {}\n  \
             space_used: {}\n  space_wasted: {}\n  space_resettled: {}\nAllocSize distribution:",
            self.init_count.load(Ordering::Relaxed),
            self.reset_count.load(Ordering::Relaxed),
            destruct_count,
            alloc_count,
            self.newblock_count.load(Ordering::Relaxed),
            self.space_allocated.load(Ordering::Relaxed),
            self.space_used.load(Ordering::Relaxed),
            self.space_wasted.load(Ordering::Relaxed),
            self.space_resettled.load(Ordering::Relaxed),
        );

        let mut cumulative = 0;
        for (i, edge) in ALLOC_SIZE_BUCKETS.iter().enumerate() {
            cumulative += self.alloc_size_buckets[i].load(Ordering::Relaxed);
            let percent = if alloc_count == 0 {
                0
            } else {
                cumulative * 100 / alloc_count
            };
            out.push_str(&format!("\n  le={edge}: {percent}%"));
        }

        out.push_str("\nLifetime distribution:");
        let mut cumulative = 0;
        for (i, edge) in LIFETIME_BUCKETS_MS.iter().enumerate() {
            cumulative += self.lifetime_buckets[i].load(Ordering::Relaxed);
            let percent = if destruct_count == 0 {
                0
            } else {
                cumulative * 100 / destruct_count
            };
            out.push_str(&format!("\n  le={edge}ms: {percent}%"));
        }

        out.push_str("\nArena Location/AllocSize:");
        for (location, bytes) in self.arena_alloc_bytes.lock().iter() {
            out.push_str(&format!("\n  {location}: {bytes}"));
        }

        out
    }
}

static GLOBAL_ARENA_METRICS: Lazy<GlobalArenaMetrics> = Lazy::new(GlobalArenaMetrics::default);

/// The process-wide metrics aggregate
pub fn global_metrics() -> &'static GlobalArenaMetrics {
    &GLOBAL_ARENA_METRICS
}

thread_local! {
    static LOCAL_ARENA_METRICS: RefCell<LocalArenaMetrics> =
        RefCell::new(LocalArenaMetrics::default());
}

/// Read this thread's counters
pub fn with_local_metrics<R>(f: impl FnOnce(&LocalArenaMetrics) -> R) -> R {
    LOCAL_ARENA_METRICS.with(|metrics| f(&metrics.borrow()))
}

/// Zero this thread's counters
pub fn reset_local_metrics() {
    LOCAL_ARENA_METRICS.with(|metrics| metrics.borrow_mut().reset());
}

/// Fold this thread's counters into the global aggregate and reset them
pub fn report_to_global() {
    LOCAL_ARENA_METRICS.with(|metrics| metrics.borrow_mut().report_to_global());
}

/// Cookie carried from init to destruction: creation time and call site
struct MetricsCookie {
    created: Instant,
    location: &'static Location<'static>,
}

/// The hook set feeding the metrics counters
struct MetricsHooks;

static METRICS_HOOKS: MetricsHooks = MetricsHooks;

/// The reference hook implementation, ready for
/// [`ArenaOptions::with_hooks`](super::ArenaOptions::with_hooks)
pub fn metrics_hooks() -> &'static dyn ArenaHooks {
    &METRICS_HOOKS
}

impl ArenaHooks for MetricsHooks {
    fn on_init(&self, location: &'static Location<'static>) -> Option<Box<dyn Any>> {
        LOCAL_ARENA_METRICS.with(|metrics| metrics.borrow_mut().init_count += 1);
        Some(Box::new(MetricsCookie {
            created: Instant::now(),
            location,
        }))
    }

    fn on_allocation(
        &self,
        _type_name: Option<&'static str>,
        size: usize,
        cookie: Option<&dyn Any>,
    ) {
        LOCAL_ARENA_METRICS.with(|metrics| {
            let mut metrics = metrics.borrow_mut();
            metrics.alloc_count += 1;
            metrics.space_allocated += size as u64;
            metrics.record_alloc_size(size);
            if let Some(cookie) = cookie.and_then(|c| c.downcast_ref::<MetricsCookie>()) {
                metrics.record_call_site(cookie.location, size);
            }
        });
    }

    fn on_new_block(&self, _block_index: usize, _block_size: usize, _cookie: Option<&dyn Any>) {
        LOCAL_ARENA_METRICS.with(|metrics| metrics.borrow_mut().newblock_count += 1);
    }

    fn on_reset(&self, _cookie: Option<&dyn Any>, space_used: usize, space_wasted: usize) {
        LOCAL_ARENA_METRICS.with(|metrics| {
            let mut metrics = metrics.borrow_mut();
            metrics.reset_count += 1;
            metrics.space_resettled += space_used as u64;
            metrics.space_wasted += space_wasted as u64;
        });
    }

    fn on_destruction(
        &self,
        cookie: Option<Box<dyn Any>>,
        space_used: usize,
        space_wasted: usize,
    ) {
        LOCAL_ARENA_METRICS.with(|metrics| {
            let mut metrics = metrics.borrow_mut();
            metrics.destruct_count += 1;
            metrics.space_used += space_used as u64;
            metrics.space_wasted += space_wasted as u64;
            if let Some(cookie) = cookie.and_then(|c| c.downcast::<MetricsCookie>().ok()) {
                let millis = cookie.created.elapsed().as_millis() as u64;
                metrics.record_lifetime_ms(millis);
            }
        });
    }
}
