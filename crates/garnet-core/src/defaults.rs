//! Default configuration constants.
//!
//! Centralizes tuning knobs used by [`crate::options`], the method cache,
//! the collector and the task stack.

/// Default number of slots in the global method cache. Must be a power of two.
pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

/// Default number of allocations between collections.
pub const DEFAULT_GC_THRESHOLD: usize = 64 * 1024;

/// Whether collections compact the promoted-scope arena by default.
pub const DEFAULT_GC_COMPACT: bool = true;

/// Default maximum number of activations on a task.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 10_000;
