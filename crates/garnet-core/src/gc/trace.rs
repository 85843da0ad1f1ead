//! Reference enumeration protocol
//!
//! Every structure that holds heap references implements [`Trace`]. The
//! collector calls `trace` with a [`Visitor`] once to mark, and again with a
//! relocating visitor after compaction; scope handles are passed by `&mut`
//! so the visitor can rewrite them in place.

use super::ptr::ScopeRef;
use crate::value::Value;

/// Receives the references of a traced structure
pub trait Visitor {
    /// A value slot. Object handles never move, so values are read-only.
    fn visit_value(&mut self, value: &Value);

    /// A promoted-scope handle, which may be rewritten during relocation
    fn visit_scope(&mut self, scope: &mut ScopeRef);

    /// Convenience for value slices
    fn visit_values(&mut self, values: &[Value]) {
        for value in values {
            self.visit_value(value);
        }
    }
}

/// Structures that hold heap references
pub trait Trace {
    /// Yield every reference held by `self` to `visitor`
    fn trace(&mut self, visitor: &mut dyn Visitor);
}

impl Trace for Value {
    fn trace(&mut self, visitor: &mut dyn Visitor) {
        visitor.visit_value(self);
    }
}

impl<T: Trace> Trace for Vec<T> {
    fn trace(&mut self, visitor: &mut dyn Visitor) {
        for item in self.iter_mut() {
            item.trace(visitor);
        }
    }
}

impl<T: Trace> Trace for Option<T> {
    fn trace(&mut self, visitor: &mut dyn Visitor) {
        if let Some(inner) = self {
            inner.trace(visitor);
        }
    }
}

impl Trace for ScopeRef {
    fn trace(&mut self, visitor: &mut dyn Visitor) {
        visitor.visit_scope(self);
    }
}
