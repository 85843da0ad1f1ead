//! Runtime configuration

use crate::cache::InvalidationGranularity;
use crate::defaults::{
    DEFAULT_CACHE_CAPACITY, DEFAULT_GC_COMPACT, DEFAULT_GC_THRESHOLD, DEFAULT_MAX_CALL_DEPTH,
};

/// Global method cache configuration
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Number of slots (rounded up to a power of two)
    pub capacity: usize,

    /// What `clear(module, name)` invalidates
    pub invalidation: InvalidationGranularity,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            invalidation: InvalidationGranularity::Whole,
        }
    }
}

/// Collector configuration
#[derive(Debug, Clone)]
pub struct GcOptions {
    /// Allocations between collections
    pub threshold: usize,

    /// Compact the promoted-scope arena after sweeping
    pub compact: bool,
}

impl Default for GcOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_GC_THRESHOLD,
            compact: DEFAULT_GC_COMPACT,
        }
    }
}

/// Options for booting a [`crate::Runtime`]
#[derive(Debug, Clone)]
pub struct VmOptions {
    /// Method cache settings
    pub cache: CacheOptions,

    /// Collector settings
    pub gc: GcOptions,

    /// Maximum activations per task before `StackOverflow`
    pub max_call_depth: usize,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            cache: CacheOptions::default(),
            gc: GcOptions::default(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl VmOptions {
    /// Options with a specific cache invalidation granularity
    pub fn with_invalidation(invalidation: InvalidationGranularity) -> Self {
        Self {
            cache: CacheOptions {
                invalidation,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Options with a specific collection threshold
    pub fn with_gc_threshold(threshold: usize) -> Self {
        Self {
            gc: GcOptions {
                threshold,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}
