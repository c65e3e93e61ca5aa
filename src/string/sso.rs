//! Single-word small-string storage with a tagged pointer
//!
//! The whole storage is one pointer-width word. The low two bits of the
//! word value discriminate the layout:
//!
//! - `00` **internal**: the word's own bytes hold up to 6 characters (7 for
//!   the byte-string variant) plus the embedded length
//! - `01` **delta-5**: pointer to a buffer headed by a 24-bit length and an
//!   8-bit capacity field
//! - `11` **delta-9**: pointer to a buffer headed by a 32-bit length and a
//!   32-bit capacity field
//! - `10` **ladder**: pointer to a buffer whose header carries a capacity
//!   class indexing the rung table
//!
//! External buffers are 8-aligned, so the tag bits are recoverable from the
//! pointer. Requested capacities map to the smallest rung that fits; the
//! rung table runs 15, 23, 31, 55, 111, 183, 287, and larger capacities are
//! exact-fit 8-byte-aligned buffers. The `C_STR = false` variant drops the
//! NUL terminator and gains one byte of capacity at every rung.

use std::marker::PhantomData;
use std::ptr::{self, NonNull};

use super::core::{NulTerminated, StorageClass, StringCore};
use crate::allocator::RawAllocator;
use crate::error::{MemoryError, MemoryResult};
use crate::utils::align_up;

const _: () = assert!(
    std::mem::size_of::<usize>() == 8,
    "tagged-word storage assumes 64-bit pointers"
);

const TAG_MASK: usize = 0b11;
const TAG_INTERNAL: usize = 0b00;
const TAG_DELTA5: usize = 0b01;
const TAG_DELTA9: usize = 0b11;
const TAG_LADDER: usize = 0b10;

/// External buffers are 8-aligned; mask the tag off to recover the pointer
const PTR_MASK: usize = !0b111;

/// Capacity rungs served by the ladder layout
const LADDER_RUNGS: [usize; 7] = [15, 23, 31, 55, 111, 183, 287];

const LADDER_HEADER: usize = 8;
const DELTA5_HEADER: usize = 4;
const DELTA9_HEADER: usize = 8;

/// Largest buffer the 8-bit capacity field can describe (in 8-byte units)
const DELTA5_MAX_BYTES: usize = 255 * 8;

cfg_if::cfg_if! {
    if #[cfg(target_endian = "little")] {
        // The tag byte is the word's low-order byte, which sits first in
        // memory; inline content follows it.
        const INLINE_OFFSET: usize = 1;
    } else {
        // Low-order byte sits last in memory; content occupies the front.
        const INLINE_OFFSET: usize = 0;
    }
}

/// Tagged-word string storage over an allocator
///
/// `C_STR = true` maintains a NUL byte past the content; `C_STR = false`
/// reclaims that byte for capacity and provides no C-string view.
pub struct SsoCore<A: RawAllocator, const C_STR: bool> {
    word: usize,
    alloc: A,
    // Tagged pointers are single-owner; keep the type !Send/!Sync.
    _single_owner: PhantomData<*mut u8>,
}

impl<A: RawAllocator, const C_STR: bool> SsoCore<A, C_STR> {
    /// In-place capacity: 6 characters, 7 without the NUL byte
    pub const INLINE_CAPACITY: usize = if C_STR { 6 } else { 7 };

    /// NUL slot size for this variant
    const NUL_BYTE: usize = if C_STR { 1 } else { 0 };

    /// Per-rung capacity bonus for the byte variant
    const EXTRA: usize = 1 - Self::NUL_BYTE;

    #[inline]
    fn tag(&self) -> usize {
        self.word & TAG_MASK
    }

    #[inline]
    fn word_bytes(&self) -> *const u8 {
        &self.word as *const usize as *const u8
    }

    #[inline]
    fn word_bytes_mut(&mut self) -> *mut u8 {
        &mut self.word as *mut usize as *mut u8
    }

    #[inline]
    fn inline_len(&self) -> usize {
        debug_assert!(self.tag() == TAG_INTERNAL);
        (self.word & 0xFF) >> 2
    }

    #[inline]
    fn set_inline_len(&mut self, len: usize) {
        debug_assert!(len <= Self::INLINE_CAPACITY);
        self.word = (self.word & !0xFF) | (len << 2);
        if C_STR {
            // Safety: content byte `len` stays within the word
            unsafe {
                *self.word_bytes_mut().add(INLINE_OFFSET + len) = 0;
            }
        }
    }

    #[inline]
    fn buffer(&self) -> *mut u8 {
        debug_assert!(self.tag() != TAG_INTERNAL);
        (self.word & PTR_MASK) as *mut u8
    }

    #[inline]
    fn data_offset(tag: usize) -> usize {
        match tag {
            TAG_DELTA5 => DELTA5_HEADER,
            TAG_DELTA9 => DELTA9_HEADER,
            _ => LADDER_HEADER,
        }
    }

    // --- external header accessors ----------------------------------------

    fn external_len(&self) -> usize {
        let buf = self.buffer();
        // Safety: buf points at a live header of the tagged shape
        unsafe {
            match self.tag() {
                TAG_DELTA5 => {
                    (*buf as usize) | ((*buf.add(1) as usize) << 8) | ((*buf.add(2) as usize) << 16)
                }
                // Ladder and delta-9 both lead with a 32-bit length.
                _ => (*(buf as *const u32)) as usize,
            }
        }
    }

    fn set_external_len(&mut self, len: usize) {
        let tag = self.tag();
        let buf = self.buffer();
        // Safety: buf points at a live header; len fits the field by
        // construction (capacity checks bound it)
        unsafe {
            match tag {
                TAG_DELTA5 => {
                    debug_assert!(len < (1 << 24));
                    *buf = (len & 0xFF) as u8;
                    *buf.add(1) = ((len >> 8) & 0xFF) as u8;
                    *buf.add(2) = ((len >> 16) & 0xFF) as u8;
                }
                _ => {
                    debug_assert!(len <= u32::MAX as usize);
                    *(buf as *mut u32) = len as u32;
                }
            }
            if C_STR {
                *buf.add(Self::data_offset(tag) + len) = 0;
            }
        }
    }

    /// Total allocation backing the current external buffer
    fn buffer_total(&self) -> usize {
        let buf = self.buffer();
        // Safety: buf points at a live header
        unsafe {
            match self.tag() {
                TAG_DELTA5 => (*buf.add(3) as usize) * 8,
                TAG_DELTA9 => (*(buf.add(4) as *const u32) as usize) * 8,
                _ => {
                    let class = *buf.add(4) as usize;
                    LADDER_HEADER + LADDER_RUNGS[class] + 1
                }
            }
        }
    }

    fn external_capacity(&self) -> usize {
        let buf = self.buffer();
        // Safety: buf points at a live header
        unsafe {
            match self.tag() {
                TAG_DELTA5 => (*buf.add(3) as usize) * 8 - DELTA5_HEADER - Self::NUL_BYTE,
                TAG_DELTA9 => {
                    (*(buf.add(4) as *const u32) as usize) * 8 - DELTA9_HEADER - Self::NUL_BYTE
                }
                _ => {
                    let class = *buf.add(4) as usize;
                    LADDER_RUNGS[class] + Self::EXTRA
                }
            }
        }
    }

    /// Allocate an external buffer able to hold `capacity` characters,
    /// write its header with `len`, and return the tagged word plus the
    /// data pointer
    fn alloc_external(&self, capacity: usize, len: usize) -> MemoryResult<(usize, *mut u8)> {
        let last_rung = LADDER_RUNGS[LADDER_RUNGS.len() - 1] + Self::EXTRA;
        if capacity <= last_rung {
            let mut class = LADDER_RUNGS.len() - 1;
            for (i, rung) in LADDER_RUNGS.iter().enumerate() {
                if rung + Self::EXTRA >= capacity {
                    class = i;
                    break;
                }
            }
            let total = LADDER_HEADER + LADDER_RUNGS[class] + 1;
            let buf = self.alloc.allocate(total)?.as_ptr();
            // Safety: fresh 8-aligned buffer with an 8-byte header
            unsafe {
                *(buf as *mut u32) = len as u32;
                *buf.add(4) = class as u8;
            }
            return Ok((buf as usize | TAG_LADDER, unsafe { buf.add(LADDER_HEADER) }));
        }

        let total5 = capacity
            .checked_add(DELTA5_HEADER + Self::NUL_BYTE)
            .map(|t| align_up(t, 8))
            .ok_or(MemoryError::size_overflow("string capacity"))?;
        if total5 <= DELTA5_MAX_BYTES {
            let buf = self.alloc.allocate(total5)?.as_ptr();
            // Safety: fresh buffer with a 4-byte header
            unsafe {
                *buf = (len & 0xFF) as u8;
                *buf.add(1) = ((len >> 8) & 0xFF) as u8;
                *buf.add(2) = ((len >> 16) & 0xFF) as u8;
                *buf.add(3) = (total5 / 8) as u8;
            }
            return Ok((buf as usize | TAG_DELTA5, unsafe { buf.add(DELTA5_HEADER) }));
        }

        let total9 = capacity
            .checked_add(DELTA9_HEADER + Self::NUL_BYTE)
            .map(|t| align_up(t, 8))
            .ok_or(MemoryError::size_overflow("string capacity"))?;
        let buf = self.alloc.allocate(total9)?.as_ptr();
        // Safety: fresh buffer with an 8-byte header
        unsafe {
            *(buf as *mut u32) = len as u32;
            *(buf.add(4) as *mut u32) = (total9 / 8) as u32;
        }
        Ok((buf as usize | TAG_DELTA9, unsafe { buf.add(DELTA9_HEADER) }))
    }

    fn release_external(&mut self) {
        if self.tag() != TAG_INTERNAL && A::MANAGES_FREE {
            let total = self.buffer_total();
            // Safety: the buffer came from this allocator with `total` bytes
            unsafe {
                self.alloc
                    .deallocate(NonNull::new_unchecked(self.buffer()), total);
            }
        }
    }

    fn data_ptr(&self) -> *const u8 {
        if self.tag() == TAG_INTERNAL {
            // Safety: inline content lives inside the word
            unsafe { self.word_bytes().add(INLINE_OFFSET) }
        } else {
            // Safety: external data follows the header
            unsafe { self.buffer().add(Self::data_offset(self.tag())) }
        }
    }

    fn data_ptr_mut(&mut self) -> *mut u8 {
        if self.tag() == TAG_INTERNAL {
            // Safety: inline content lives inside the word
            unsafe { self.word_bytes_mut().add(INLINE_OFFSET) }
        } else {
            // Safety: external data follows the header
            unsafe { self.buffer().add(Self::data_offset(self.tag())) }
        }
    }

    fn set_len(&mut self, len: usize) {
        if self.tag() == TAG_INTERNAL {
            self.set_inline_len(len);
        } else {
            self.set_external_len(len);
        }
    }
}

impl<A: RawAllocator, const C_STR: bool> StringCore for SsoCore<A, C_STR> {
    type Alloc = A;

    const NUL_TERMINATED: bool = C_STR;

    fn with_allocator(alloc: A) -> Self {
        // All-zero word: internal tag, length zero, NUL in place.
        Self {
            word: 0,
            alloc,
            _single_owner: PhantomData,
        }
    }

    fn from_slice(bytes: &[u8], alloc: A) -> MemoryResult<Self> {
        let mut core = Self::with_allocator(alloc);
        if bytes.len() <= Self::INLINE_CAPACITY {
            if !bytes.is_empty() {
                // Safety: inline content area holds INLINE_CAPACITY bytes
                unsafe {
                    ptr::copy_nonoverlapping(
                        bytes.as_ptr(),
                        core.word_bytes_mut().add(INLINE_OFFSET),
                        bytes.len(),
                    );
                }
            }
            core.set_inline_len(bytes.len());
        } else {
            let (word, data) = core.alloc_external(bytes.len(), bytes.len())?;
            // Safety: the new buffer holds at least len (+ NUL) bytes
            unsafe {
                ptr::copy_nonoverlapping(bytes.as_ptr(), data, bytes.len());
                if C_STR {
                    *data.add(bytes.len()) = 0;
                }
            }
            core.word = word;
        }
        Ok(core)
    }

    fn allocator(&self) -> &A {
        &self.alloc
    }

    fn as_ptr(&self) -> *const u8 {
        self.data_ptr()
    }

    fn len(&self) -> usize {
        if self.tag() == TAG_INTERNAL {
            self.inline_len()
        } else {
            self.external_len()
        }
    }

    fn capacity(&self) -> usize {
        if self.tag() == TAG_INTERNAL {
            Self::INLINE_CAPACITY
        } else {
            self.external_capacity()
        }
    }

    fn max_size(&self) -> usize {
        // Length fields top out at 32 bits.
        u32::MAX as usize - 16
    }

    fn is_shared(&self) -> bool {
        false
    }

    fn storage_class(&self) -> StorageClass {
        match self.tag() {
            TAG_INTERNAL => StorageClass::Internal,
            TAG_DELTA5 => StorageClass::Delta5,
            TAG_DELTA9 => StorageClass::Delta9,
            _ => StorageClass::Ladder,
        }
    }

    fn mutable_ptr(&mut self) -> MemoryResult<*mut u8> {
        Ok(self.data_ptr_mut())
    }

    fn try_reserve(&mut self, min_capacity: usize) -> MemoryResult<()> {
        if min_capacity <= self.capacity() {
            return Ok(());
        }
        if min_capacity > self.max_size() {
            return Err(MemoryError::exceeds_max_size(min_capacity, self.max_size()));
        }
        let len = self.len();
        let (word, data) = self.alloc_external(min_capacity, len)?;
        // Safety: both buffers hold at least `len` bytes
        unsafe {
            ptr::copy_nonoverlapping(self.data_ptr(), data, len);
            if C_STR {
                *data.add(len) = 0;
            }
        }
        self.release_external();
        self.word = word;
        debug_assert!(self.capacity() >= min_capacity);
        Ok(())
    }

    fn expand_noinit(&mut self, delta: usize, exp_growth: bool) -> MemoryResult<*mut u8> {
        let old_len = self.len();
        let new_len = old_len
            .checked_add(delta)
            .ok_or(MemoryError::size_overflow("string growth"))?;
        if new_len > self.capacity() {
            let capacity = self.capacity();
            let target = if exp_growth {
                // Grow by 1.5x, rounded up to the rung that fits.
                new_len.max(capacity.saturating_add(capacity / 2).saturating_add(1))
            } else {
                new_len
            };
            self.try_reserve(target)?;
        }
        self.set_len(new_len);
        // Safety: capacity now covers new_len
        Ok(unsafe { self.data_ptr_mut().add(old_len) })
    }

    fn shrink(&mut self, delta: usize) -> MemoryResult<()> {
        let len = self.len();
        debug_assert!(delta <= len);
        self.set_len(len - delta);
        Ok(())
    }

    fn shrink_to_fit(&mut self) -> MemoryResult<()> {
        let tight = Self::from_slice(self.as_slice(), self.alloc.clone())?;
        if tight.capacity() < self.capacity() {
            *self = tight;
        }
        Ok(())
    }

    fn clone_core(&self) -> Self {
        match self.deep_clone_core() {
            Ok(core) => core,
            Err(e) => panic!("string clone failed: {e}"),
        }
    }

    fn deep_clone_core(&self) -> MemoryResult<Self> {
        Self::from_slice(self.as_slice(), self.alloc.clone())
    }
}

impl<A: RawAllocator, const C_STR: bool> Drop for SsoCore<A, C_STR> {
    fn drop(&mut self) {
        self.release_external();
    }
}

impl<A: RawAllocator> NulTerminated for SsoCore<A, true> {}
