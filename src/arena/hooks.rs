//! Observability hooks for arena lifecycles
//!
//! Every callback is optional (the trait has empty defaults). `on_init` may
//! return a cookie which the arena stores and hands back to every later
//! hook; the reference metrics implementation uses it to carry the creation
//! timestamp and call site.

use std::any::Any;
use std::panic::Location;

/// Callbacks observing one arena's lifecycle
///
/// Implementations are installed through
/// [`ArenaOptions::with_hooks`](super::ArenaOptions::with_hooks) as a
/// `&'static` reference, so state lives in statics or thread-locals.
pub trait ArenaHooks: Sync {
    /// Invoked exactly once, at arena construction. The returned cookie is
    /// stored in the arena and passed to every later hook.
    fn on_init(&self, location: &'static Location<'static>) -> Option<Box<dyn Any>> {
        let _ = location;
        None
    }

    /// Invoked after each successful external allocation. `type_name` is
    /// set for typed creation and `None` for raw aligned allocation.
    fn on_allocation(&self, type_name: Option<&'static str>, size: usize, cookie: Option<&dyn Any>) {
        let _ = (type_name, size, cookie);
    }

    /// Invoked when a new block is chained in. `block_index` is the
    /// zero-based count of already-existing blocks.
    fn on_new_block(&self, block_index: usize, block_size: usize, cookie: Option<&dyn Any>) {
        let _ = (block_index, block_size, cookie);
    }

    /// Invoked before a reset frees blocks
    fn on_reset(&self, cookie: Option<&dyn Any>, space_used: usize, space_wasted: usize) {
        let _ = (cookie, space_used, space_wasted);
    }

    /// Invoked before final teardown; consumes the cookie
    fn on_destruction(&self, cookie: Option<Box<dyn Any>>, space_used: usize, space_wasted: usize) {
        let _ = (cookie, space_used, space_wasted);
    }
}
