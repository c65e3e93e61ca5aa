//! Short-string types with allocator-parameterised storage
//!
//! Two storage families sit under one sequence-operation facade
//! ([`BasicString`]):
//!
//! - [`CowCore`]: a three-word payload discriminated into small (in place),
//!   medium (uniquely owned heap buffer) and large (reference-counted
//!   copy-on-write buffer) states
//! - [`SsoCore`]: a single tagged word packing either up to 6–7 bytes in
//!   place or a pointer to an external buffer on a quantised capacity
//!   ladder
//!
//! Both are generic over the crate's [`RawAllocator`] seam, so the same
//! string type works on the process heap or inside an
//! [`Arena`](crate::arena::Arena). Arena-backed strings never free
//! individually; growth leaves superseded buffers behind in the region.
//!
//! ```rust
//! use regioned::string::{CowString, SmallString};
//!
//! let mut s = CowString::from("hello");
//! s.push_str(", region");
//! assert_eq!(s, "hello, region");
//! assert!(s.starts_with(b"hello"));
//!
//! let t = SmallString::from("tiny");
//! assert_eq!(t.capacity(), 6); // lives in the word itself
//! ```

mod core;
mod cow;
mod facade;
mod sso;

pub use self::core::{NulTerminated, StorageClass, StringCore};
pub use self::cow::{CowCore, MAX_MEDIUM, MAX_SMALL};
pub use self::facade::BasicString;
pub use self::sso::SsoCore;

use crate::allocator::{ArenaAllocator, SystemAllocator};

/// Heap-backed copy-on-write string
pub type CowString = BasicString<CowCore<SystemAllocator>>;
/// Arena-backed copy-on-write string
pub type ArenaCowString<'a> = BasicString<CowCore<ArenaAllocator<'a>>>;

/// Heap-backed small string, NUL-terminated
pub type SmallString = BasicString<SsoCore<SystemAllocator, true>>;
/// Heap-backed small byte string; no NUL terminator, one more in-place byte
pub type SmallByteString = BasicString<SsoCore<SystemAllocator, false>>;
/// Arena-backed small string, NUL-terminated
pub type ArenaSmallString<'a> = BasicString<SsoCore<ArenaAllocator<'a>, true>>;
/// Arena-backed small byte string
pub type ArenaSmallByteString<'a> = BasicString<SsoCore<ArenaAllocator<'a>, false>>;

/// The stable content hash shared by every string in the family
///
/// Seeded with the length so that equal byte sequences hash equal across
/// all storage variants (and across the NUL/byte flavours).
pub fn content_hash(bytes: &[u8]) -> u64 {
    xxhash_rust::xxh64::xxh64(bytes, bytes.len() as u64)
}

/// 32-bit flavour of [`content_hash`] for size-constrained tables
pub fn content_hash32(bytes: &[u8]) -> u32 {
    xxhash_rust::xxh32::xxh32(bytes, bytes.len() as u32)
}
