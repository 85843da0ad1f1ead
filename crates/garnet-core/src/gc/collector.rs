//! Mark-sweep garbage collector
//!
//! Marking starts from the registered global roots plus the roots passed to
//! [`GarbageCollector::collect`] (task frames and the module registry). After
//! sweeping, the promoted-scope arena is optionally compacted and every scope
//! handle reachable from the roots and the heap is rewritten.

use super::arena::Arena;
use super::ptr::{ObjectRef, ScopeRef};
use super::roots::RootSet;
use super::trace::{Trace, Visitor};
use crate::object::HeapObject;
use crate::options::GcOptions;
use crate::scope::VariableScope;
use crate::value::Value;
use crate::{VmError, VmResult};
use std::time::{Duration, Instant};

/// Garbage collector statistics
#[derive(Debug, Clone, Default)]
pub struct GcStats {
    /// Total number of collections
    pub collections: usize,

    /// Total heap objects freed
    pub objects_freed: usize,

    /// Total promoted scopes freed
    pub scopes_freed: usize,

    /// Total promoted scopes moved by compaction
    pub scopes_relocated: usize,

    /// Total pause time
    pub total_pause_time: Duration,

    /// Last collection duration
    pub last_pause_time: Duration,
}

impl GcStats {
    fn update(&mut self, cycle: &GcCycle) {
        self.collections += 1;
        self.objects_freed += cycle.objects_freed;
        self.scopes_freed += cycle.scopes_freed;
        self.scopes_relocated += cycle.scopes_relocated;
        self.last_pause_time = cycle.pause;
        self.total_pause_time += cycle.pause;
    }
}

/// Heap occupancy snapshot
#[derive(Debug, Clone, Default)]
pub struct HeapStats {
    /// Live heap objects
    pub live_objects: usize,

    /// Live promoted scopes
    pub live_scopes: usize,

    /// Object slots including free ones
    pub object_slots: usize,

    /// Scope slots including free ones
    pub scope_slots: usize,

    /// Allocations since the last collection
    pub allocated_since_collection: usize,

    /// Allocations that trigger the next collection
    pub threshold: usize,
}

/// Result of one collection
#[derive(Debug, Clone, Default)]
pub struct GcCycle {
    /// Heap objects freed
    pub objects_freed: usize,

    /// Promoted scopes freed
    pub scopes_freed: usize,

    /// Promoted scopes that changed slot
    pub scopes_relocated: usize,

    /// Time spent collecting
    pub pause: Duration,
}

/// Pending references discovered while marking
#[derive(Default)]
struct GrayQueue {
    objects: Vec<ObjectRef>,
    scopes: Vec<ScopeRef>,
}

impl Visitor for GrayQueue {
    fn visit_value(&mut self, value: &Value) {
        if let Value::Object(r) = value {
            self.objects.push(*r);
        }
    }

    fn visit_scope(&mut self, scope: &mut ScopeRef) {
        self.scopes.push(*scope);
    }
}

/// Rewrites scope handles through a forwarding table
struct Relocator<'a> {
    forward: &'a [Option<u32>],
}

impl Visitor for Relocator<'_> {
    fn visit_value(&mut self, _value: &Value) {}

    fn visit_scope(&mut self, scope: &mut ScopeRef) {
        if let Some(Some(new_index)) = self.forward.get(scope.index()) {
            *scope = ScopeRef::new(*new_index);
        }
    }
}

/// Mark-sweep garbage collector
pub struct GarbageCollector {
    /// Instances, blocks and tuples
    objects: Arena<HeapObject>,

    /// Promoted variable scopes
    scopes: Arena<VariableScope>,

    /// Embedder roots
    roots: RootSet,

    /// Allocations that trigger the next collection
    threshold: usize,

    /// Configured threshold; the adaptive threshold never drops below it
    base_threshold: usize,

    /// Allocations since the last collection
    allocated: usize,

    /// Compact the scope arena after sweeping
    compact: bool,

    /// Statistics
    stats: GcStats,
}

impl Default for GarbageCollector {
    fn default() -> Self {
        Self::new(&GcOptions::default())
    }
}

impl GarbageCollector {
    /// Create a collector with the given options
    pub fn new(options: &GcOptions) -> Self {
        let threshold = options.threshold.max(1);
        Self {
            objects: Arena::new(),
            scopes: Arena::new(),
            roots: RootSet::new(),
            threshold,
            base_threshold: threshold,
            allocated: 0,
            compact: options.compact,
            stats: GcStats::default(),
        }
    }

    /// Allocate a heap object
    pub fn allocate_object(&mut self, object: HeapObject) -> ObjectRef {
        self.allocated += 1;
        ObjectRef::new(self.objects.insert(object))
    }

    /// Allocate a promoted scope
    pub fn allocate_scope(&mut self, scope: VariableScope) -> ScopeRef {
        self.allocated += 1;
        ScopeRef::new(self.scopes.insert(scope))
    }

    /// Borrow a heap object
    pub fn object(&self, r: ObjectRef) -> VmResult<&HeapObject> {
        self.objects
            .get(r.index())
            .ok_or_else(|| VmError::InvalidReference(format!("{:?}", r)))
    }

    /// Mutably borrow a heap object
    pub fn object_mut(&mut self, r: ObjectRef) -> VmResult<&mut HeapObject> {
        self.objects
            .get_mut(r.index())
            .ok_or_else(|| VmError::InvalidReference(format!("{:?}", r)))
    }

    /// Borrow a promoted scope
    pub fn scope(&self, r: ScopeRef) -> VmResult<&VariableScope> {
        self.scopes
            .get(r.index())
            .ok_or_else(|| VmError::InvalidReference(format!("{:?}", r)))
    }

    /// Mutably borrow a promoted scope
    pub fn scope_mut(&mut self, r: ScopeRef) -> VmResult<&mut VariableScope> {
        self.scopes
            .get_mut(r.index())
            .ok_or_else(|| VmError::InvalidReference(format!("{:?}", r)))
    }

    /// Add a global root
    pub fn add_root(&mut self, value: Value) {
        self.roots.add_global_root(value);
    }

    /// Remove a global root
    pub fn remove_root(&mut self, value: Value) -> bool {
        self.roots.remove_global_root(value)
    }

    /// Check if we should collect
    pub fn should_collect(&self) -> bool {
        self.allocated >= self.threshold
    }

    /// Run garbage collection
    pub fn collect(&mut self, roots: &mut [&mut dyn Trace]) -> GcCycle {
        let start = Instant::now();

        // Mark phase
        self.mark(roots);

        // Sweep phase
        let objects_freed = self.objects.sweep();
        let scopes_freed = self.scopes.sweep();

        // Compaction phase
        let scopes_relocated = if self.compact && self.scopes.fragmentation() > 0 {
            self.relocate_scopes(roots)
        } else {
            0
        };

        let cycle = GcCycle {
            objects_freed,
            scopes_freed,
            scopes_relocated,
            pause: start.elapsed(),
        };
        self.stats.update(&cycle);

        // Adjust threshold (grow by 2x live set)
        let live = self.objects.len() + self.scopes.len();
        self.threshold = (live * 2).max(self.base_threshold);
        self.allocated = 0;

        tracing::debug!(
            objects_freed,
            scopes_freed,
            scopes_relocated,
            live,
            pause_us = cycle.pause.as_micros() as u64,
            "gc cycle complete"
        );
        cycle
    }

    fn mark(&mut self, roots: &mut [&mut dyn Trace]) {
        let mut gray = GrayQueue::default();
        for value in self.roots.iter() {
            gray.visit_value(value);
        }
        for root in roots.iter_mut() {
            root.trace(&mut gray);
        }

        loop {
            if let Some(r) = gray.objects.pop() {
                if self.objects.mark(r.index()) {
                    if let Some(object) = self.objects.get_mut(r.index()) {
                        object.trace(&mut gray);
                    }
                }
                continue;
            }
            if let Some(r) = gray.scopes.pop() {
                if self.scopes.mark(r.index()) {
                    if let Some(scope) = self.scopes.get_mut(r.index()) {
                        scope.trace(&mut gray);
                    }
                }
                continue;
            }
            break;
        }
    }

    fn relocate_scopes(&mut self, roots: &mut [&mut dyn Trace]) -> usize {
        let forward = self.scopes.compact();
        let moved = forward
            .iter()
            .enumerate()
            .filter(|(old, new)| matches!(new, Some(n) if *n as usize != *old))
            .count();
        if moved == 0 {
            return 0;
        }

        let mut relocator = Relocator { forward: &forward };
        for root in roots.iter_mut() {
            root.trace(&mut relocator);
        }
        for object in self.objects.iter_mut() {
            object.trace(&mut relocator);
        }
        for scope in self.scopes.iter_mut() {
            scope.trace(&mut relocator);
        }
        moved
    }

    /// Get GC statistics
    pub fn stats(&self) -> &GcStats {
        &self.stats
    }

    /// Get heap occupancy
    pub fn heap_stats(&self) -> HeapStats {
        HeapStats {
            live_objects: self.objects.len(),
            live_scopes: self.scopes.len(),
            object_slots: self.objects.capacity(),
            scope_slots: self.scopes.capacity(),
            allocated_since_collection: self.allocated,
            threshold: self.threshold,
        }
    }
}
