//! The storage contract behind the string facade
//!
//! A storage core owns the bytes and knows its discriminated layout; the
//! facade layers sequence semantics on top. Cores are parameterised over
//! the allocator so the hot paths monomorphise per backing store.

use crate::allocator::RawAllocator;
use crate::error::MemoryResult;

/// Which concrete layout a string currently uses
///
/// `Small`/`Medium`/`Large` are the copy-on-write states; `Internal`,
/// `Delta5`, `Delta9` and `Ladder` are the tagged-word states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Small,
    Medium,
    Large,
    Internal,
    Delta5,
    Delta9,
    Ladder,
}

/// A discriminated string storage
///
/// Length, capacity and the data pointer are storage-defined; every growing
/// operation goes through `try_reserve`/`expand_noinit`, every shrinking one
/// through `shrink`. `clone_core` is the cheap category-aware copy (bumps
/// the refcount for shared large buffers); `deep_clone_core` never shares.
pub trait StringCore: Sized {
    type Alloc: RawAllocator;

    /// Whether the byte past the end is always a NUL terminator
    const NUL_TERMINATED: bool;

    /// An empty core using `alloc`
    fn with_allocator(alloc: Self::Alloc) -> Self;

    /// A core holding a copy of `bytes`
    fn from_slice(bytes: &[u8], alloc: Self::Alloc) -> MemoryResult<Self>;

    fn allocator(&self) -> &Self::Alloc;

    fn as_ptr(&self) -> *const u8;

    fn len(&self) -> usize;

    fn capacity(&self) -> usize;

    fn max_size(&self) -> usize;

    /// True when the buffer is shared with other strings
    fn is_shared(&self) -> bool;

    /// The current concrete layout
    fn storage_class(&self) -> StorageClass;

    /// Pointer for in-place mutation; unshares copy-on-write storage first
    fn mutable_ptr(&mut self) -> MemoryResult<*mut u8>;

    /// Ensure `capacity() >= min_capacity`
    fn try_reserve(&mut self, min_capacity: usize) -> MemoryResult<()>;

    /// Grow by `delta` uninitialised bytes and return a pointer to the
    /// first new byte. With `exp_growth`, capacity grows to at least
    /// `1 + capacity * 3 / 2` when an extension would otherwise exceed it.
    fn expand_noinit(&mut self, delta: usize, exp_growth: bool) -> MemoryResult<*mut u8>;

    /// Reduce the length by `delta`
    ///
    /// Fallible: shrinking a shared large buffer materialises a fresh
    /// unique copy (the shared bytes cannot take a terminator write).
    fn shrink(&mut self, delta: usize) -> MemoryResult<()>;

    /// Drop excess capacity, preserving the value
    fn shrink_to_fit(&mut self) -> MemoryResult<()>;

    /// Category-aware copy; panics on allocation failure (like `Clone`)
    fn clone_core(&self) -> Self;

    /// A copy that never shares storage
    fn deep_clone_core(&self) -> MemoryResult<Self>;

    /// The bytes currently held
    fn as_slice(&self) -> &[u8] {
        let len = self.len();
        if len == 0 {
            return &[];
        }
        // Safety: the core guarantees `len` initialised bytes at `as_ptr`
        unsafe { std::slice::from_raw_parts(self.as_ptr(), len) }
    }
}

/// Marker for storages that maintain a NUL byte past the end
///
/// The byte-string variant does not implement this, which removes the
/// C-string accessors at the type level.
pub trait NulTerminated: StringCore {}
