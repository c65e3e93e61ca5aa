//! # regioned
//!
//! Region allocation and region-friendly string types for request-scoped
//! workloads where allocation churn dominates cost.
//!
//! The crate provides two tightly coupled primitives:
//! - [`Arena`]: a region allocator that serves many short-lived objects from
//!   a chain of large blocks and releases them all at once
//! - a family of short-string types ([`CowString`], [`SmallString`],
//!   [`SmallByteString`] and their arena-backed counterparts) whose storage
//!   is parameterised over the allocator, so strings can live inside an
//!   arena with no individual frees
//!
//! ## Quick Start
//!
//! ```rust
//! use regioned::arena::{Arena, ArenaOptions};
//! use regioned::string::ArenaCowString;
//!
//! let arena = Arena::new(ArenaOptions::default());
//!
//! // Typed creation: the value lives in the arena, its destructor runs on
//! // reset or teardown.
//! let hello = arena.create(String::from("hello")).unwrap();
//! assert_eq!(*hello, "hello");
//!
//! // Strings routed through the arena never free individually.
//! let mut s = ArenaCowString::from_str_in("request-scoped", arena.allocator()).unwrap();
//! s.push_str("-scratch");
//! assert_eq!(s, "request-scoped-scratch");
//! ```
//!
//! ## Features
//!
//! - `logging` (default): non-fatal diagnostics through `tracing`
//!
//! ## Architecture
//!
//! - Standalone error handling via the [`error`] module
//! - Alignment and size helpers in [`utils`]
//! - The allocator seam ([`allocator::RawAllocator`]) is a generic
//!   parameter, so the string hot paths monomorphise per backing store

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(clippy::all)]
#![warn(clippy::perf)]
#![warn(rust_2018_idioms)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
// Precision loss in usize -> f64 casts is acceptable for metrics
#![allow(clippy::cast_precision_loss)]
// Cast truncation/sign-loss in memory code is reviewed per-site
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
// inline(always) on small alignment helpers is intentional for hot paths
#![allow(clippy::inline_always)]

// Error types
pub mod error;

// Core modules
pub mod allocator;
pub mod arena;
pub mod string;
pub mod utils;

// Re-export core types for convenience
pub use crate::arena::{Arena, ArenaOptions};
pub use crate::error::{MemoryError, MemoryResult};
pub use crate::string::{CowString, SmallByteString, SmallString};

// Public API exports
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::allocator::{ArenaAllocator, RawAllocator, SystemAllocator};
    pub use crate::arena::{Arena, ArenaHooks, ArenaOptions, ContainStatus};
    pub use crate::error::{MemoryError, MemoryResult};
    pub use crate::string::{
        ArenaCowString, ArenaSmallByteString, ArenaSmallString, BasicString, CowString,
        SmallByteString, SmallString,
    };
    pub use crate::utils::{align_up, is_aligned};
}
