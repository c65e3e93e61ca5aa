//! Region allocation for request-scoped object graphs
//!
//! An [`Arena`] serves many short-lived allocations from a chain of large
//! blocks and releases them all at once. Objects with destructors register a
//! cleanup node that runs on reset or teardown; everything else is reclaimed
//! wholesale with no per-object bookkeeping.
//!
//! Basic usage:
//!
//! ```rust
//! use regioned::arena::{Arena, ArenaOptions};
//!
//! let arena = Arena::new(ArenaOptions::default());
//! let value = arena.create(42u64).unwrap();
//! assert_eq!(*value, 42);
//!
//! let greeting = arena.alloc_str("hello").unwrap();
//! assert_eq!(greeting, "hello");
//! ```
//!
//! Block sizing is governed by [`ArenaOptions`]: ordinary growth uses
//! `normal_block_size`, oversized requests round up towards
//! `huge_block_size`, and anything beyond that monopolises its own block.

use std::alloc::Layout;

use crate::allocator::BYTE_ALIGNMENT;
use crate::error::{MemoryError, MemoryResult};

mod block;
#[allow(clippy::module_inception)]
mod arena;
mod hooks;
pub mod metrics;

pub(crate) use self::block::{Block, BLOCK_HEADER_SIZE, CLEANUP_NODE_SIZE};

pub use self::arena::Arena;
pub use self::hooks::ArenaHooks;

pub const KILOBYTE: usize = 1024;
pub const MEGABYTE: usize = 1024 * 1024;

/// Requests above `huge_block_size / THRESHOLD_HUGE` stop rounding to
/// multiples of the normal block size and jump to the huge size.
pub(crate) const THRESHOLD_HUGE: usize = 4;

/// Raw backing-memory provider for arena blocks
pub type BlockAllocFn = fn(usize) -> *mut u8;
/// Releases a buffer obtained from the paired [`BlockAllocFn`]. Must not fail.
pub type BlockDeallocFn = fn(*mut u8, usize);
/// Receives non-fatal diagnostics (size overflow and the like)
pub type LoggerFn = fn(&str);

fn system_block_alloc(size: usize) -> *mut u8 {
    match Layout::from_size_align(size, BYTE_ALIGNMENT) {
        // Safety: layout has non-zero size (blocks always include a header)
        Ok(layout) => unsafe { std::alloc::alloc(layout) },
        Err(_) => std::ptr::null_mut(),
    }
}

fn system_block_dealloc(ptr: *mut u8, size: usize) {
    // Safety: ptr was produced by system_block_alloc with the same size
    unsafe {
        std::alloc::dealloc(ptr, Layout::from_size_align_unchecked(size, BYTE_ALIGNMENT));
    }
}

/// Where a pointer falls inside an arena, if anywhere
///
/// Debugging aid returned by [`Arena::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainStatus {
    /// The pointer does not land in any block of this arena
    NotContained,
    /// The pointer lands in a block header
    Header,
    /// The pointer lands in the allocated (bump-served) part of a block
    Used,
    /// The pointer lands in the free middle of a block
    Unused,
    /// The pointer lands in a block's cleanup-node tail
    CleanupArea,
}

/// Arena configuration
///
/// Sizes should match OS page sizes for cache-friendly behaviour: a block is
/// intended to be a memory page. Zero-valued `suggested_init_block_size` and
/// `huge_block_size` inherit `normal_block_size` on construction.
#[derive(Clone)]
pub struct ArenaOptions {
    /// Preferred block size for ordinary growth
    pub normal_block_size: usize,
    /// Ceiling above which a request monopolises its own block
    pub huge_block_size: usize,
    /// Preferred first-block size (defaults to `normal_block_size`)
    pub suggested_init_block_size: usize,
    /// Raw backing memory provider
    pub block_alloc: BlockAllocFn,
    /// Paired release function; required to be infallible
    pub block_dealloc: BlockDeallocFn,
    /// Non-fatal diagnostics sink
    pub logger: Option<LoggerFn>,
    /// Optional observability hooks
    pub hooks: Option<&'static dyn ArenaHooks>,
}

impl ArenaOptions {
    /// Default options: 4 KiB normal blocks, 2 MiB huge blocks, system heap
    pub fn new() -> Self {
        Self {
            normal_block_size: 4 * KILOBYTE,
            huge_block_size: 2 * MEGABYTE,
            suggested_init_block_size: 4 * KILOBYTE,
            block_alloc: system_block_alloc,
            block_dealloc: system_block_dealloc,
            logger: None,
            hooks: None,
        }
    }

    /// Sets the preferred block size for ordinary growth
    #[must_use = "builder methods must be chained or built"]
    pub fn with_normal_block_size(mut self, size: usize) -> Self {
        self.normal_block_size = size;
        self
    }

    /// Sets the huge-block ceiling
    #[must_use = "builder methods must be chained or built"]
    pub fn with_huge_block_size(mut self, size: usize) -> Self {
        self.huge_block_size = size;
        self
    }

    /// Sets the preferred first-block size
    #[must_use = "builder methods must be chained or built"]
    pub fn with_suggested_init_block_size(mut self, size: usize) -> Self {
        self.suggested_init_block_size = size;
        self
    }

    /// Sets the backing memory provider pair
    #[must_use = "builder methods must be chained or built"]
    pub fn with_block_allocator(mut self, alloc: BlockAllocFn, dealloc: BlockDeallocFn) -> Self {
        self.block_alloc = alloc;
        self.block_dealloc = dealloc;
        self
    }

    /// Sets the diagnostics sink
    #[must_use = "builder methods must be chained or built"]
    pub fn with_logger(mut self, logger: LoggerFn) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Installs observability hooks
    #[must_use = "builder methods must be chained or built"]
    pub fn with_hooks(mut self, hooks: &'static dyn ArenaHooks) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Normalises zero-valued fields: an unset init size and an unset huge
    /// size inherit `normal_block_size`.
    pub(crate) fn normalize(&mut self) {
        debug_assert!(self.normal_block_size > 0);
        if self.suggested_init_block_size == 0 {
            self.suggested_init_block_size = self.normal_block_size;
        }
        if self.huge_block_size == 0 {
            self.huge_block_size = self.normal_block_size;
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> MemoryResult<()> {
        if self.normal_block_size == 0 {
            return Err(MemoryError::invalid_config(
                "normal_block_size must be greater than 0",
            ));
        }
        if self.huge_block_size != 0 && self.huge_block_size < self.normal_block_size {
            return Err(MemoryError::invalid_config(
                "huge_block_size must be >= normal_block_size",
            ));
        }
        Ok(())
    }
}

impl Default for ArenaOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ArenaOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArenaOptions")
            .field("normal_block_size", &self.normal_block_size)
            .field("huge_block_size", &self.huge_block_size)
            .field("suggested_init_block_size", &self.suggested_init_block_size)
            .field("logger", &self.logger.is_some())
            .field("hooks", &self.hooks.is_some())
            .finish()
    }
}
