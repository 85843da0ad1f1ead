//! Heap object model
//!
//! Only the shapes dispatch needs are modelled: plain instances with
//! instance variables and an optional singleton class, block closures, and
//! tuples used to collect splat arguments.

use crate::gc::{ScopeRef, Trace, Visitor};
use crate::method::ExecutableMethod;
use crate::module::ModuleId;
use crate::symbol::Symbol;
use crate::value::Value;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Per-object header flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectFlags {
    /// Object may not be mutated
    pub frozen: bool,

    /// Object was derived from untrusted input
    pub tainted: bool,

    /// Object is a metaclass instance
    pub is_meta: bool,

    /// Collector hint: never promote to an older generation
    pub forever_young: bool,

    /// Object needs a finalization pass when freed
    pub requires_cleanup: bool,

    /// References held by the object do not keep their targets alive
    pub refs_are_weak: bool,

    /// Object is a block context
    pub is_block_context: bool,

    /// Object body is raw bytes rather than references
    pub stores_bytes: bool,
}

impl ObjectFlags {
    /// Flags for a duplicate of an object carrying `self`
    ///
    /// Frozen and tainted are never propagated; a caller that wants them on
    /// the copy sets them explicitly.
    pub fn clone_semantics(&self) -> ObjectFlags {
        ObjectFlags {
            frozen: false,
            tainted: false,
            is_meta: self.is_meta,
            forever_young: self.forever_young,
            requires_cleanup: self.requires_cleanup,
            refs_are_weak: self.refs_are_weak,
            is_block_context: self.is_block_context,
            stores_bytes: self.stores_bytes,
        }
    }
}

/// A plain object
#[derive(Debug, Clone)]
pub struct Instance {
    /// Class the object was instantiated from
    pub class: ModuleId,

    /// Per-object class inserted before `class` in lookup
    pub singleton: Option<ModuleId>,

    /// Header flags
    pub flags: ObjectFlags,

    /// Instance variables
    pub ivars: FxHashMap<Symbol, Value>,
}

impl Instance {
    /// Create an instance of `class`
    pub fn new(class: ModuleId) -> Self {
        Self {
            class,
            singleton: None,
            flags: ObjectFlags::default(),
            ivars: FxHashMap::default(),
        }
    }

    /// Shallow copy for `dup`: same class and ivars, no singleton class,
    /// flags filtered through [`ObjectFlags::clone_semantics`]
    pub fn duplicate(&self) -> Self {
        Self {
            class: self.class,
            singleton: None,
            flags: self.flags.clone_semantics(),
            ivars: self.ivars.clone(),
        }
    }
}

/// A closure over a promoted scope
#[derive(Clone)]
pub struct BlockObject {
    /// Block body
    pub code: Arc<ExecutableMethod>,

    /// Immediate lexical parent (the creating activation's scope)
    pub home: ScopeRef,

    /// Method-level scope supplying self, module and block
    pub top: ScopeRef,

    /// Name of the enclosing method, used by `super` inside the block
    pub method_name: Symbol,

    /// Defining module of the enclosing method
    pub module: ModuleId,
}

impl std::fmt::Debug for BlockObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockObject")
            .field("home", &self.home)
            .field("top", &self.top)
            .field("method_name", &self.method_name)
            .field("module", &self.module)
            .finish()
    }
}

/// Heap-allocated object
#[derive(Debug, Clone)]
pub enum HeapObject {
    /// Plain instance
    Instance(Instance),
    /// Block closure
    Block(BlockObject),
    /// Fixed tuple of values
    Tuple(Vec<Value>),
}

impl HeapObject {
    /// Instance payload, if any
    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            HeapObject::Instance(i) => Some(i),
            _ => None,
        }
    }

    /// Mutable instance payload, if any
    pub fn as_instance_mut(&mut self) -> Option<&mut Instance> {
        match self {
            HeapObject::Instance(i) => Some(i),
            _ => None,
        }
    }

    /// Block payload, if any
    pub fn as_block(&self) -> Option<&BlockObject> {
        match self {
            HeapObject::Block(b) => Some(b),
            _ => None,
        }
    }
}

impl Trace for HeapObject {
    fn trace(&mut self, visitor: &mut dyn Visitor) {
        match self {
            HeapObject::Instance(instance) => {
                for value in instance.ivars.values() {
                    visitor.visit_value(value);
                }
            }
            HeapObject::Block(block) => {
                visitor.visit_scope(&mut block.home);
                visitor.visit_scope(&mut block.top);
                block.code.trace_literals(visitor);
            }
            HeapObject::Tuple(values) => visitor.visit_values(values),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_semantics_drops_frozen_and_tainted() {
        let flags = ObjectFlags {
            frozen: true,
            tainted: true,
            requires_cleanup: true,
            stores_bytes: true,
            ..Default::default()
        };
        let copied = flags.clone_semantics();
        assert!(!copied.frozen);
        assert!(!copied.tainted);
        assert!(copied.requires_cleanup);
        assert!(copied.stores_bytes);
    }

    #[test]
    fn test_duplicate_drops_singleton() {
        let symbols = crate::symbol::SymbolTable::new();
        let mut original = Instance::new(ModuleId::new(3));
        original.singleton = Some(ModuleId::new(9));
        original.flags.frozen = true;
        original.ivars.insert(symbols.intern("@a"), Value::Fixnum(1));

        let copy = original.duplicate();
        assert_eq!(copy.class, ModuleId::new(3));
        assert_eq!(copy.singleton, None);
        assert!(!copy.flags.frozen);
        assert_eq!(copy.ivars.len(), 1);
    }
}
