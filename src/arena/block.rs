//! A single backing block, bump-allocated from both ends
//!
//! Layout: `[header | objects → ... ← cleanup nodes]`. Objects grow forward
//! from the header; cleanup nodes are packed densely downward from the end
//! of the block. The header itself lives at offset 0 of the raw buffer.

use crate::utils::align_up;

/// A registered finaliser: element pointer plus destructor thunk
#[repr(C)]
pub(crate) struct CleanupNode {
    element: *mut (),
    cleanup: unsafe fn(*mut ()),
}

/// Node stride in the cleanup tail; `size - limit` is always a multiple
pub(crate) const CLEANUP_NODE_SIZE: usize = align_up(std::mem::size_of::<CleanupNode>(), 8);

/// Block header placed at offset 0 of each backing buffer
#[repr(C)]
pub(crate) struct Block {
    prev: *mut Block,
    pos: usize,
    size: usize,
    limit: usize,
}

pub(crate) const BLOCK_HEADER_SIZE: usize = align_up(std::mem::size_of::<Block>(), 8);

impl Block {
    /// Emplace a header into a fresh `size`-byte buffer
    ///
    /// # Safety
    ///
    /// `mem` must point to at least `size` writable bytes, 8-byte aligned,
    /// with `size >= BLOCK_HEADER_SIZE`.
    pub(crate) unsafe fn init(mem: *mut u8, size: usize, prev: *mut Block) -> *mut Block {
        debug_assert!(size >= BLOCK_HEADER_SIZE);
        let block = mem as *mut Block;
        unsafe {
            block.write(Block {
                prev,
                pos: BLOCK_HEADER_SIZE,
                size,
                limit: size,
            });
        }
        block
    }

    #[inline]
    fn base(&self) -> *const u8 {
        self as *const Block as *const u8
    }

    #[inline]
    fn base_mut(&mut self) -> *mut u8 {
        self as *mut Block as *mut u8
    }

    /// Serve `size` bytes from the front cursor. Caller checks `remain()`.
    #[inline]
    pub(crate) fn alloc(&mut self, size: usize) -> *mut u8 {
        debug_assert!(size <= self.limit - self.pos);
        let pos = self.pos;
        self.pos += size;
        // Safety: pos + size <= limit <= size of the buffer
        unsafe { self.base_mut().add(pos) }
    }

    /// Claim one cleanup-node slot from the tail cursor
    #[inline]
    fn alloc_cleanup(&mut self) -> *mut CleanupNode {
        debug_assert!(self.pos + CLEANUP_NODE_SIZE <= self.limit);
        self.limit -= CLEANUP_NODE_SIZE;
        // Safety: limit stays within the buffer and above pos
        unsafe { self.base_mut().add(self.limit) as *mut CleanupNode }
    }

    /// Write a cleanup node at the tail. Caller checks `remain()`.
    #[inline]
    pub(crate) fn register_cleanup(&mut self, element: *mut (), cleanup: unsafe fn(*mut ())) {
        let node = self.alloc_cleanup();
        // Safety: alloc_cleanup returned a properly aligned in-bounds slot
        unsafe {
            node.write(CleanupNode { element, cleanup });
        }
    }

    /// Run every registered cleanup, in ascending address order
    ///
    /// Nodes grow downward from the end of the block, so ascending address
    /// order is the reverse of registration order.
    pub(crate) fn run_cleanups(&mut self) {
        let mut offset = self.limit;
        while offset < self.size {
            // Safety: the tail region holds densely packed nodes
            unsafe {
                let node = &*(self.base().add(offset) as *const CleanupNode);
                (node.cleanup)(node.element);
            }
            offset += CLEANUP_NODE_SIZE;
        }
    }

    /// Run cleanups and rewind both cursors; the backing memory stays put
    pub(crate) fn reset(&mut self) {
        self.run_cleanups();
        self.pos = BLOCK_HEADER_SIZE;
        self.limit = self.size;
    }

    #[inline]
    pub(crate) fn prev(&self) -> *mut Block {
        self.prev
    }

    #[inline]
    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    pub(crate) fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub(crate) fn limit(&self) -> usize {
        self.limit
    }

    /// Bytes still servable between the two cursors
    #[inline]
    pub(crate) fn remain(&self) -> usize {
        debug_assert!(self.limit >= self.pos);
        self.limit - self.pos
    }

    /// Number of registered cleanup nodes
    #[inline]
    pub(crate) fn cleanups(&self) -> usize {
        let space = self.size - self.limit;
        debug_assert!(space % CLEANUP_NODE_SIZE == 0);
        space / CLEANUP_NODE_SIZE
    }
}
