//! Typed handles into the managed heap

use std::fmt;

/// Handle to a heap object (instance, block or tuple)
///
/// Object slots are never relocated, so an `ObjectRef` stays valid for as
/// long as the object is reachable from a root.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef(u32);

impl ObjectRef {
    pub(crate) fn new(index: u32) -> Self {
        ObjectRef(index)
    }

    /// Slot index
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({})", self.0)
    }
}

/// Handle to a promoted variable scope
///
/// Scope slots may be relocated by compaction. A `ScopeRef` held outside
/// a traced structure must be re-read after anything that can reach a
/// safepoint.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeRef(u32);

impl ScopeRef {
    pub(crate) fn new(index: u32) -> Self {
        ScopeRef(index)
    }

    /// Slot index
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ScopeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeRef({})", self.0)
    }
}
