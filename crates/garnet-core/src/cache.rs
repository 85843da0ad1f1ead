//! Global method cache
//!
//! Memoizes `(lookup class, name) -> (method, defining module, visibility)`.
//!
//! # Concurrency
//!
//! Slots are epoch-managed atomic pointers, so [`GlobalMethodCache::probe`]
//! never takes a lock. Stores and invalidations serialize on a mutex.
//!
//! Two counters keep the cache coherent with the method tables:
//!
//! - `generation` stamps every entry; an entry whose stamp differs from the
//!   current generation is treated as empty. Bumping it invalidates the whole
//!   cache in O(1).
//! - `mutations` counts every invalidation. A miss hands out a [`MissToken`]
//!   carrying the count observed *before* the caller walks the hierarchy;
//!   [`GlobalMethodCache::store`] refuses the result if any invalidation
//!   happened in between, so a walk that raced with a redefinition cannot
//!   publish what it saw.
//!
//! ```text
//!   probe ──hit──────────────────────────────► method
//!     │
//!    miss(token) ──► walk ancestors ──► store(token, ...)
//!                                          │ token stale → discarded
//! ```

use crate::method::ExecutableMethod;
use crate::method_table::Visibility;
use crate::module::ModuleId;
use crate::options::CacheOptions;
use crate::symbol::Symbol;
use crossbeam::epoch::{self, Atomic, Owned};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// What `clear(module, name)` invalidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvalidationGranularity {
    /// Every entry (O(1) generation bump)
    #[default]
    Whole,
    /// Only entries for the same name, whatever their class
    ByName,
}

struct CacheEntry {
    class: ModuleId,
    name: Symbol,
    generation: u64,
    method: Arc<ExecutableMethod>,
    module: ModuleId,
    visibility: Visibility,
}

/// A cache hit
#[derive(Debug, Clone)]
pub struct CachedMethod {
    /// Resolved method
    pub method: Arc<ExecutableMethod>,
    /// Module whose table held it
    pub module: ModuleId,
    /// Visibility at that module
    pub visibility: Visibility,
}

/// Proof of the cache state observed at a miss
#[derive(Debug, Clone, Copy)]
pub struct MissToken {
    mutations: u64,
}

/// Result of [`GlobalMethodCache::probe`]
#[derive(Debug)]
pub enum CacheProbe {
    /// Valid entry for the key
    Hit(CachedMethod),
    /// No valid entry; walk the hierarchy and store with the token
    Miss(MissToken),
}

/// Cache counters
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Probes answered from the cache
    pub hits: u64,
    /// Probes that required a walk
    pub misses: u64,
    /// Entries published
    pub stores: u64,
    /// Stores discarded because of an intervening invalidation
    pub rejected_stores: u64,
    /// Invalidations performed
    pub invalidations: u64,
    /// Current generation
    pub generation: u64,
}

/// Process-wide memo of method resolutions
pub struct GlobalMethodCache {
    slots: Box<[Atomic<CacheEntry>]>,
    mask: usize,
    granularity: InvalidationGranularity,
    generation: AtomicU64,
    mutations: AtomicU64,
    write_lock: Mutex<()>,
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
    rejected_stores: AtomicU64,
    invalidations: AtomicU64,
}

impl GlobalMethodCache {
    /// Create a cache; capacity is rounded up to a power of two
    pub fn new(options: &CacheOptions) -> Self {
        let capacity = options.capacity.max(1).next_power_of_two();
        let slots = (0..capacity).map(|_| Atomic::null()).collect::<Vec<_>>();
        Self {
            slots: slots.into_boxed_slice(),
            mask: capacity - 1,
            granularity: options.invalidation,
            generation: AtomicU64::new(1),
            mutations: AtomicU64::new(0),
            write_lock: Mutex::new(()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stores: AtomicU64::new(0),
            rejected_stores: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    #[inline]
    fn index(&self, class: ModuleId, name: Symbol) -> usize {
        let key = (u64::from(class.as_u32()) << 32) | u64::from(name.as_u32());
        let hash = key.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        (hash >> 32) as usize & self.mask
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Invalidation mode
    pub fn granularity(&self) -> InvalidationGranularity {
        self.granularity
    }

    /// Look up `(class, name)` without blocking
    pub fn probe(&self, class: ModuleId, name: Symbol) -> CacheProbe {
        // Read before the slot so a concurrent invalidation makes the token stale.
        let mutations = self.mutations.load(Ordering::Acquire);
        let guard = epoch::pin();
        let shared = self.slots[self.index(class, name)].load(Ordering::Acquire, &guard);
        // SAFETY: entries are only freed through `defer_destroy` while pinned
        // readers may still hold them, or in `Drop` when no reader exists.
        if let Some(entry) = unsafe { shared.as_ref() } {
            if entry.class == class
                && entry.name == name
                && entry.generation == self.generation.load(Ordering::Acquire)
            {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(class = class.as_u32(), name = name.as_u32(), "method cache hit");
                return CacheProbe::Hit(CachedMethod {
                    method: Arc::clone(&entry.method),
                    module: entry.module,
                    visibility: entry.visibility,
                });
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(class = class.as_u32(), name = name.as_u32(), "method cache miss");
        CacheProbe::Miss(MissToken { mutations })
    }

    /// Publish a resolution found after a miss
    ///
    /// Returns false if an invalidation happened since `token` was issued;
    /// the entry is then discarded.
    pub fn store(
        &self,
        token: MissToken,
        class: ModuleId,
        name: Symbol,
        method: Arc<ExecutableMethod>,
        module: ModuleId,
        visibility: Visibility,
    ) -> bool {
        let _lock = self.write_lock.lock();
        if self.mutations.load(Ordering::Acquire) != token.mutations {
            self.rejected_stores.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        let entry = Owned::new(CacheEntry {
            class,
            name,
            generation: self.generation.load(Ordering::Acquire),
            method,
            module,
            visibility,
        });
        let guard = epoch::pin();
        let old = self.slots[self.index(class, name)].swap(entry, Ordering::AcqRel, &guard);
        if !old.is_null() {
            // SAFETY: `old` is unreachable from the slot now; pinned readers
            // keep it alive until their guards drop.
            unsafe { guard.defer_destroy(old) };
        }
        self.stores.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Invalidate every entry whose resolution could pass through `module` for `name`
    pub fn clear(&self, module: ModuleId, name: Symbol) {
        match self.granularity {
            InvalidationGranularity::Whole => self.clear_all(),
            InvalidationGranularity::ByName => {
                let _lock = self.write_lock.lock();
                self.mutations.fetch_add(1, Ordering::AcqRel);
                let guard = epoch::pin();
                let mut evicted = 0usize;
                for slot in self.slots.iter() {
                    let shared = slot.load(Ordering::Acquire, &guard);
                    // SAFETY: see `probe`.
                    let matches = unsafe { shared.as_ref() }.is_some_and(|e| e.name == name);
                    if matches {
                        let old = slot.swap(epoch::Shared::null(), Ordering::AcqRel, &guard);
                        if !old.is_null() {
                            // SAFETY: see `store`.
                            unsafe { guard.defer_destroy(old) };
                            evicted += 1;
                        }
                    }
                }
                self.invalidations.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    module = module.as_u32(),
                    name = name.as_u32(),
                    evicted,
                    "method cache cleared by name"
                );
            }
        }
    }

    /// Invalidate the whole cache
    pub fn clear_all(&self) {
        let _lock = self.write_lock.lock();
        self.mutations.fetch_add(1, Ordering::AcqRel);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.invalidations.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(generation, "method cache cleared");
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            rejected_stores: self.rejected_stores.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            generation: self.generation.load(Ordering::Relaxed),
        }
    }
}

impl Drop for GlobalMethodCache {
    fn drop(&mut self) {
        // SAFETY: `&mut self` means no reader or writer can be active.
        let guard = unsafe { epoch::unprotected() };
        for slot in self.slots.iter() {
            let shared = slot.load(Ordering::Relaxed, guard);
            if !shared.is_null() {
                drop(unsafe { shared.into_owned() });
            }
        }
    }
}
