//! Local binding records

use crate::gc::{GarbageCollector, ScopeRef, Trace, Visitor};
use crate::module::ModuleId;
use crate::value::Value;
use crate::{VmError, VmResult};

/// Runtime record of one call's local bindings
#[derive(Debug, Clone, Default)]
pub struct VariableScope {
    /// Enclosing scope for outer local lookups
    pub parent: Option<ScopeRef>,

    /// Receiver
    pub self_value: Value,

    /// Defining module of the running method
    pub module: ModuleId,

    /// Block passed to the method
    pub block: Option<Value>,

    /// Local slots, arguments first
    pub locals: Vec<Value>,
}

impl VariableScope {
    /// Method-level scope with `locals` nil slots
    pub fn new(self_value: Value, module: ModuleId, locals: usize) -> Self {
        Self {
            parent: None,
            self_value,
            module,
            block: None,
            locals: vec![Value::Nil; locals],
        }
    }

    /// Scope for a block activation
    ///
    /// `self`, `module` and `block` come from the method-level scope `top`;
    /// `parent` is the immediate lexical parent used for local walks.
    pub fn setup_as_block(
        heap: &GarbageCollector,
        top: ScopeRef,
        parent: ScopeRef,
        locals: usize,
    ) -> VmResult<Self> {
        let top_scope = heap.scope(top)?;
        Ok(Self {
            parent: Some(parent),
            self_value: top_scope.self_value,
            module: top_scope.module,
            block: top_scope.block,
            locals: vec![Value::Nil; locals],
        })
    }

    /// Local slot `index`
    pub fn get(&self, index: usize) -> VmResult<Value> {
        self.locals
            .get(index)
            .copied()
            .ok_or(VmError::LocalOutOfRange { depth: 0, index })
    }

    /// Overwrite local slot `index`
    pub fn set(&mut self, index: usize, value: Value) -> VmResult<()> {
        let slot = self
            .locals
            .get_mut(index)
            .ok_or(VmError::LocalOutOfRange { depth: 0, index })?;
        *slot = value;
        Ok(())
    }
}

impl Trace for VariableScope {
    fn trace(&mut self, visitor: &mut dyn Visitor) {
        if let Some(parent) = self.parent.as_mut() {
            visitor.visit_scope(parent);
        }
        visitor.visit_value(&self.self_value);
        if let Some(block) = &self.block {
            visitor.visit_value(block);
        }
        visitor.visit_values(&self.locals);
    }
}

/// Follow `hops` parent links from `start`
pub(crate) fn walk_parents(
    heap: &GarbageCollector,
    start: ScopeRef,
    hops: usize,
    depth: usize,
    index: usize,
) -> VmResult<ScopeRef> {
    let mut current = start;
    for _ in 0..hops {
        current = heap
            .scope(current)?
            .parent
            .ok_or(VmError::LocalOutOfRange { depth, index })?;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_as_block_takes_context_from_top() {
        let mut heap = GarbageCollector::default();
        let method_module = ModuleId::new(3);
        let mut method_scope = VariableScope::new(Value::Fixnum(42), method_module, 1);
        method_scope.block = Some(Value::Fixnum(9));
        let top = heap.allocate_scope(method_scope);

        // An intermediate block scope with a different self.
        let mut middle = VariableScope::new(Value::Nil, ModuleId::new(8), 1);
        middle.parent = Some(top);
        let parent = heap.allocate_scope(middle);

        let scope = VariableScope::setup_as_block(&heap, top, parent, 2).unwrap();
        assert_eq!(scope.self_value, Value::Fixnum(42));
        assert_eq!(scope.module, method_module);
        assert_eq!(scope.block, Some(Value::Fixnum(9)));
        assert_eq!(scope.parent, Some(parent));
        assert_eq!(scope.locals.len(), 2);
    }

    #[test]
    fn test_out_of_range_slot() {
        let mut scope = VariableScope::new(Value::Nil, ModuleId::new(0), 1);
        assert!(scope.set(0, Value::Fixnum(1)).is_ok());
        assert!(matches!(
            scope.get(1),
            Err(VmError::LocalOutOfRange { index: 1, .. })
        ));
    }

    #[test]
    fn test_walk_parents() {
        let mut heap = GarbageCollector::default();
        let outer = heap.allocate_scope(VariableScope::new(Value::Nil, ModuleId::new(0), 0));
        let mut inner_scope = VariableScope::new(Value::Nil, ModuleId::new(0), 0);
        inner_scope.parent = Some(outer);
        let inner = heap.allocate_scope(inner_scope);

        assert_eq!(walk_parents(&heap, inner, 1, 2, 0).unwrap(), outer);
        assert!(walk_parents(&heap, inner, 2, 3, 0).is_err());
    }
}
