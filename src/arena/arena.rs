//! The region allocator itself
//!
//! An arena owns a singly-linked chain of [`Block`]s, newest first. All
//! allocation goes through the last block; when it cannot serve a request a
//! new block is sized by the growth policy and chained in. Reset frees every
//! block except the head, which is rewound in place.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::panic::Location;
use std::ptr::{self, NonNull};

use super::{
    ArenaOptions, Block, ContainStatus, BLOCK_HEADER_SIZE, CLEANUP_NODE_SIZE, THRESHOLD_HUGE,
};
use crate::allocator::{ArenaAllocator, BYTE_ALIGNMENT};
use crate::error::{MemoryError, MemoryResult};
use crate::utils::align_up;

/// Runs `T`'s destructor in place; registered for non-trivial arena objects
unsafe fn destruct_object<T>(element: *mut ()) {
    unsafe { ptr::drop_in_place(element as *mut T) }
}

/// Releases a heap object handed over through [`Arena::own`]
unsafe fn delete_object<T>(element: *mut ()) {
    unsafe { drop(Box::from_raw(element as *mut T)) }
}

/// A region allocator for request-scoped object graphs
///
/// Single-threaded by design: the block chain is raw-pointer linked, so the
/// type is neither `Send` nor `Sync`. Pointers returned by the allocation
/// methods stay valid until [`reset`](Arena::reset) or drop; `reset` takes
/// `&mut self`, so outstanding borrows cannot survive it.
pub struct Arena {
    options: ArenaOptions,
    last_block: Cell<*mut Block>,
    // Initialized by on_init, consumed by on_destruction.
    cookie: RefCell<Option<Box<dyn Any>>>,
    space_allocated: Cell<usize>,
}

impl Arena {
    /// Creates an arena with the given options
    ///
    /// Fires the init hook exactly once, capturing the caller's location.
    #[track_caller]
    pub fn new(mut options: ArenaOptions) -> Self {
        options.normalize();
        let location = Location::caller();
        let arena = Self {
            options,
            last_block: Cell::new(ptr::null_mut()),
            cookie: RefCell::new(None),
            space_allocated: Cell::new(0),
        };
        if let Some(hooks) = arena.options.hooks {
            *arena.cookie.borrow_mut() = hooks.on_init(location);
        }
        arena
    }

    /// Creates an arena with default options
    #[track_caller]
    pub fn with_defaults() -> Self {
        Self::new(ArenaOptions::default())
    }

    /// The options this arena was built with (after normalisation)
    pub fn options(&self) -> &ArenaOptions {
        &self.options
    }

    /// An allocator adaptor for strings and allocator-aware containers
    pub fn allocator(&self) -> ArenaAllocator<'_> {
        ArenaAllocator::new(self)
    }

    /// Total bytes obtained from the backing provider across all blocks
    pub fn space_allocated(&self) -> usize {
        self.space_allocated.get()
    }

    /// Bytes still servable across all chained blocks
    pub fn space_remains(&self) -> usize {
        let mut remains = 0;
        let mut curr = self.last_block.get();
        while !curr.is_null() {
            // Safety: chain members are live blocks owned by this arena
            let block = unsafe { &*curr };
            remains += block.remain();
            curr = block.prev();
        }
        remains
    }

    /// Number of registered cleanup nodes across all blocks
    pub fn cleanups(&self) -> usize {
        let mut total = 0;
        let mut curr = self.last_block.get();
        while !curr.is_null() {
            // Safety: chain members are live blocks owned by this arena
            let block = unsafe { &*curr };
            total += block.cleanups();
            curr = block.prev();
        }
        total
    }

    fn log_diag(&self, message: &str) {
        #[cfg(feature = "logging")]
        tracing::warn!(target: "regioned::arena", "{message}");
        if let Some(logger) = self.options.logger {
            logger(message);
        }
    }

    fn with_hooks(&self, f: impl FnOnce(&'static dyn super::ArenaHooks, Option<&dyn Any>)) {
        if let Some(hooks) = self.options.hooks {
            let cookie = self.cookie.borrow();
            f(hooks, cookie.as_deref());
        }
    }

    #[inline]
    fn need_new_block(&self, need_bytes: usize) -> bool {
        let last = self.last_block.get();
        if last.is_null() {
            return true;
        }
        // Safety: last points at a live block
        need_bytes > unsafe { (*last).remain() }
    }

    /// Sizes and chains in a new block able to serve `min_bytes`
    ///
    /// Sizing, given `required = min_bytes + header`:
    /// - first block: the suggested init size
    /// - `required <= normal`: the normal block size
    /// - `required <= huge / 4`: `min_bytes` rounded up to a multiple of normal
    /// - `required <= huge`: the huge block size
    /// - beyond huge (and undersized earlier picks): exactly `required`,
    ///   monopolising the block
    fn new_block(&self, min_bytes: usize, prev: *mut Block) -> Option<NonNull<Block>> {
        let required = match min_bytes.checked_add(BLOCK_HEADER_SIZE) {
            Some(required) => required,
            None => {
                self.log_diag(&format!(
                    "new block needs too many bytes: {min_bytes}, adding the header overflows usize"
                ));
                return None;
            }
        };

        let normal = self.options.normal_block_size;
        let huge = self.options.huge_block_size;
        let mut size = if prev.is_null() {
            // The suggestion may still be insufficient; fixed below.
            self.options.suggested_init_block_size
        } else if required <= normal {
            normal
        } else if required <= huge / THRESHOLD_HUGE {
            // Round to a multiple of the normal size; the normal size need
            // not be a power of two.
            min_bytes.div_ceil(normal) * normal
        } else if required <= huge {
            huge
        } else {
            // Monopolised block.
            0
        };
        size = size.max(required);

        let mem = (self.options.block_alloc)(size);
        if mem.is_null() {
            return None;
        }

        // Block counting is useless work when nobody listens.
        if let Some(hooks) = self.options.hooks {
            let mut index = 0;
            let mut curr = prev;
            while !curr.is_null() {
                index += 1;
                // Safety: chain members are live blocks
                curr = unsafe { (*curr).prev() };
            }
            let cookie = self.cookie.borrow();
            hooks.on_new_block(index, size, cookie.as_deref());
        }

        // Safety: mem is a fresh buffer of `size >= required` bytes
        let block = unsafe { Block::init(mem, size, prev) };
        self.space_allocated.set(self.space_allocated.get() + size);
        NonNull::new(block)
    }

    /// Aligned bump allocation without the allocation hook
    ///
    /// This is the path the allocator adaptor and the string storages use;
    /// external callers go through [`allocate_aligned`](Self::allocate_aligned).
    pub(crate) fn alloc_raw(&self, bytes: usize) -> Option<NonNull<u8>> {
        if bytes > usize::MAX - BYTE_ALIGNMENT {
            self.log_diag(&format!(
                "allocation of {bytes} bytes overflows when aligned"
            ));
            return None;
        }
        let needed = align_up(bytes, BYTE_ALIGNMENT);
        if self.need_new_block(needed) {
            let block = self.new_block(needed, self.last_block.get())?;
            self.last_block.set(block.as_ptr());
        }
        // Safety: last_block was just ensured to exist with enough room
        let ptr = unsafe { (*self.last_block.get()).alloc(needed) };
        debug_assert!(crate::utils::is_aligned_ptr(ptr, BYTE_ALIGNMENT));
        NonNull::new(ptr)
    }

    /// Allocate `bytes` bytes, 8-byte aligned
    ///
    /// The returned pointer is valid until the next reset or the arena is
    /// dropped.
    pub fn allocate_aligned(&self, bytes: usize) -> MemoryResult<NonNull<u8>> {
        let ptr = self
            .alloc_raw(bytes)
            .ok_or_else(|| MemoryError::allocation_failed(bytes, BYTE_ALIGNMENT))?;
        self.with_hooks(|hooks, cookie| hooks.on_allocation(None, bytes, cookie));
        Ok(ptr)
    }

    fn add_cleanup(&self, element: *mut (), cleanup: unsafe fn(*mut ())) -> bool {
        if self.need_new_block(CLEANUP_NODE_SIZE) {
            match self.new_block(CLEANUP_NODE_SIZE, self.last_block.get()) {
                Some(block) => self.last_block.set(block.as_ptr()),
                None => return false,
            }
        }
        // Safety: last_block exists with room for one node
        unsafe { (*self.last_block.get()).register_cleanup(element, cleanup) };
        true
    }

    /// Move `value` into the arena
    ///
    /// If `T` has a destructor, a cleanup node is registered so it runs on
    /// reset or teardown. `T`'s alignment must not exceed 8.
    pub fn create<T>(&self, value: T) -> MemoryResult<&mut T> {
        if std::mem::align_of::<T>() > BYTE_ALIGNMENT {
            return Err(MemoryError::invalid_layout(
                "type alignment exceeds arena alignment",
            ));
        }
        let ptr = self
            .alloc_raw(std::mem::size_of::<T>())
            .ok_or_else(|| {
                MemoryError::allocation_failed(std::mem::size_of::<T>(), BYTE_ALIGNMENT)
            })?
            .as_ptr() as *mut T;
        // Safety: ptr is fresh, aligned, and sized for T
        unsafe { ptr.write(value) };
        if std::mem::needs_drop::<T>() && !self.add_cleanup(ptr as *mut (), destruct_object::<T>) {
            // The object would leak its resources without a cleanup node;
            // finalise it now and report the failure.
            unsafe { ptr::drop_in_place(ptr) };
            return Err(MemoryError::allocation_failed(
                CLEANUP_NODE_SIZE,
                BYTE_ALIGNMENT,
            ));
        }
        self.with_hooks(|hooks, cookie| {
            hooks.on_allocation(
                Some(std::any::type_name::<T>()),
                std::mem::size_of::<T>(),
                cookie,
            );
        });
        // Safety: initialised above
        Ok(unsafe { &mut *ptr })
    }

    /// Move the result of `f` into the arena, giving `f` access to the
    /// arena for nested allocation
    pub fn create_with<T>(&self, f: impl FnOnce(&Self) -> T) -> MemoryResult<&mut T> {
        let value = f(self);
        self.create(value)
    }

    /// Move `value` into the arena without registering its destructor
    ///
    /// # Safety
    ///
    /// `T`'s destructor will never run; the caller must ensure that leaking
    /// `value`'s resources is acceptable.
    pub unsafe fn create_skip_cleanup<T>(&self, value: T) -> MemoryResult<&mut T> {
        if std::mem::align_of::<T>() > BYTE_ALIGNMENT {
            return Err(MemoryError::invalid_layout(
                "type alignment exceeds arena alignment",
            ));
        }
        let ptr = self
            .alloc_raw(std::mem::size_of::<T>())
            .ok_or_else(|| {
                MemoryError::allocation_failed(std::mem::size_of::<T>(), BYTE_ALIGNMENT)
            })?
            .as_ptr() as *mut T;
        unsafe { ptr.write(value) };
        self.with_hooks(|hooks, cookie| {
            hooks.on_allocation(
                Some(std::any::type_name::<T>()),
                std::mem::size_of::<T>(),
                cookie,
            );
        });
        Ok(unsafe { &mut *ptr })
    }

    /// Allocate an array of `len` copies of `value`
    ///
    /// Restricted to `Copy` element types: array elements get no per-element
    /// cleanup registration.
    pub fn create_array<T: Copy>(&self, len: usize, value: T) -> MemoryResult<&mut [T]> {
        if std::mem::align_of::<T>() > BYTE_ALIGNMENT {
            return Err(MemoryError::invalid_layout(
                "type alignment exceeds arena alignment",
            ));
        }
        let total = match crate::utils::checked_muladd(len, std::mem::size_of::<T>(), 0) {
            Some(total) => total,
            None => {
                self.log_diag(&format!(
                    "array of {len} x {} bytes overflows usize",
                    std::mem::size_of::<T>()
                ));
                return Err(MemoryError::size_overflow("create_array"));
            }
        };
        let ptr = self
            .alloc_raw(total)
            .ok_or_else(|| MemoryError::allocation_failed(total, BYTE_ALIGNMENT))?
            .as_ptr() as *mut T;
        // Safety: the buffer holds `len` properly aligned slots
        unsafe {
            for i in 0..len {
                ptr.add(i).write(value);
            }
        }
        self.with_hooks(|hooks, cookie| {
            hooks.on_allocation(Some(std::any::type_name::<T>()), total, cookie);
        });
        // Safety: all slots initialised above
        Ok(unsafe { std::slice::from_raw_parts_mut(ptr, len) })
    }

    /// Copy a slice into the arena
    pub fn alloc_slice<T: Copy>(&self, slice: &[T]) -> MemoryResult<&mut [T]> {
        if slice.is_empty() {
            return Ok(&mut []);
        }
        if std::mem::align_of::<T>() > BYTE_ALIGNMENT {
            return Err(MemoryError::invalid_layout(
                "type alignment exceeds arena alignment",
            ));
        }
        let total = std::mem::size_of_val(slice);
        let ptr = self
            .alloc_raw(total)
            .ok_or_else(|| MemoryError::allocation_failed(total, BYTE_ALIGNMENT))?
            .as_ptr() as *mut T;
        // Safety: destination is fresh and sized for the slice
        unsafe {
            ptr::copy_nonoverlapping(slice.as_ptr(), ptr, slice.len());
        }
        self.with_hooks(|hooks, cookie| {
            hooks.on_allocation(Some(std::any::type_name::<T>()), total, cookie);
        });
        // Safety: initialised above
        Ok(unsafe { std::slice::from_raw_parts_mut(ptr, slice.len()) })
    }

    /// Copy a string into the arena
    pub fn alloc_str(&self, s: &str) -> MemoryResult<&str> {
        let bytes = self.alloc_slice(s.as_bytes())?;
        // Safety: bytes came from valid UTF-8
        unsafe { Ok(std::str::from_utf8_unchecked(bytes)) }
    }

    /// Register an externally heap-allocated object for teardown
    ///
    /// The bytes stay where they are; only a cleanup node is added, so the
    /// box is released when the arena resets or drops. On failure the value
    /// is dropped immediately and an error returned.
    pub fn own<T>(&self, value: Box<T>) -> MemoryResult<&mut T> {
        let raw = Box::into_raw(value);
        if self.add_cleanup(raw as *mut (), delete_object::<T>) {
            // Safety: raw stays valid until the cleanup runs
            Ok(unsafe { &mut *raw })
        } else {
            // The arena never took ownership; don't leak the object.
            unsafe { drop(Box::from_raw(raw)) };
            Err(MemoryError::allocation_failed(
                CLEANUP_NODE_SIZE,
                BYTE_ALIGNMENT,
            ))
        }
    }

    /// Run all cleanups and free every block except the head
    ///
    /// The head block is rewound in place, so an arena that has warmed up a
    /// page keeps it across requests. Fires the reset hook before any block
    /// is touched. Returns the space that was allocated before the reset.
    pub fn reset(&mut self) -> usize {
        let wasted = self.count_waste();
        if let Some(hooks) = self.options.hooks {
            let cookie = self.cookie.borrow();
            hooks.on_reset(cookie.as_deref(), self.space_allocated.get(), wasted);
        }
        self.free_blocks_except_head();
        let reset_size = self.space_allocated.get();
        let head = self.last_block.get();
        if head.is_null() {
            return reset_size;
        }
        // Safety: head is the last live block
        unsafe {
            self.space_allocated.set((*head).size());
            (*head).reset();
        }
        reset_size
    }

    fn count_waste(&self) -> usize {
        self.space_remains()
    }

    fn free_blocks_except_head(&self) {
        let mut curr = self.last_block.get();
        if curr.is_null() {
            return;
        }
        // Safety: walking live blocks newest to oldest; each is finalised
        // and released exactly once
        unsafe {
            while !(*curr).prev().is_null() {
                let prev = (*curr).prev();
                let size = (*curr).size();
                (*curr).run_cleanups();
                (self.options.block_dealloc)(curr as *mut u8, size);
                curr = prev;
            }
        }
        self.last_block.set(curr);
    }

    fn free_all_blocks(&self) -> usize {
        let mut curr = self.last_block.get();
        let mut wasted = 0;
        // Safety: as in free_blocks_except_head; afterwards the chain is gone
        unsafe {
            while !curr.is_null() {
                let prev = (*curr).prev();
                let size = (*curr).size();
                wasted += (*curr).remain();
                (*curr).run_cleanups();
                (self.options.block_dealloc)(curr as *mut u8, size);
                curr = prev;
            }
        }
        self.last_block.set(ptr::null_mut());
        wasted
    }

    /// Locate which, if any, block contains the addressed byte
    ///
    /// Debugging aid for stale-pointer hunts; classification follows the
    /// block layout `[header | used | unused | cleanup nodes]`.
    pub fn check(&self, ptr: *const u8) -> ContainStatus {
        let addr = ptr as usize;
        let mut curr = self.last_block.get();
        while !curr.is_null() {
            // Safety: chain members are live blocks
            let block = unsafe { &*curr };
            let base = curr as usize;
            if addr >= base && addr < base + block.size() {
                let offset = addr - base;
                return if offset < BLOCK_HEADER_SIZE {
                    ContainStatus::Header
                } else if offset < block.pos() {
                    ContainStatus::Used
                } else if offset < block.limit() {
                    ContainStatus::Unused
                } else {
                    ContainStatus::CleanupArea
                };
            }
            curr = block.prev();
        }
        ContainStatus::NotContained
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        let wasted = self.free_all_blocks();
        if let Some(hooks) = self.options.hooks {
            let cookie = self.cookie.borrow_mut().take();
            hooks.on_destruction(cookie, self.space_allocated.get(), wasted);
        }
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("space_allocated", &self.space_allocated.get())
            .field("space_remains", &self.space_remains())
            .field("cleanups", &self.cleanups())
            .finish()
    }
}
