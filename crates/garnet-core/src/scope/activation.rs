//! Call activations

use super::variable::{walk_parents, VariableScope};
use crate::gc::{GarbageCollector, ScopeRef, Trace, Visitor};
use crate::method::ExecutableMethod;
use crate::module::ModuleId;
use crate::symbol::Symbol;
use crate::value::Value;
use crate::{VmError, VmResult};
use std::sync::Arc;

/// Whether an activation runs a method or a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationKind {
    /// Method body
    Method,
    /// Block body
    Block,
}

/// Backing storage of an activation's locals
#[derive(Debug)]
pub enum ScopeStorage {
    /// Embedded in the activation; dies with it
    Transient(VariableScope),
    /// Moved to the heap; shared with closures
    Promoted(ScopeRef),
}

/// One frame on a task
#[derive(Debug)]
pub struct Activation {
    method: Arc<ExecutableMethod>,
    name: Symbol,
    module: ModuleId,
    kind: ActivationKind,
    storage: ScopeStorage,
    top: Option<ScopeRef>,
    args: Vec<Value>,
    pins: Vec<Value>,
}

impl Activation {
    /// Frame for a method invoked as `name`, defined in `module`
    pub fn for_method(
        method: Arc<ExecutableMethod>,
        name: Symbol,
        module: ModuleId,
        scope: VariableScope,
        args: Vec<Value>,
    ) -> Self {
        Self {
            method,
            name,
            module,
            kind: ActivationKind::Method,
            storage: ScopeStorage::Transient(scope),
            top: None,
            args,
            pins: Vec::new(),
        }
    }

    /// Frame for a block whose method-level scope is `top`
    ///
    /// `name` and `module` are those of the enclosing method so that `super`
    /// inside the block resolves like it would in the method.
    pub fn for_block(
        code: Arc<ExecutableMethod>,
        name: Symbol,
        module: ModuleId,
        scope: VariableScope,
        top: ScopeRef,
        args: Vec<Value>,
    ) -> Self {
        Self {
            method: code,
            name,
            module,
            kind: ActivationKind::Block,
            storage: ScopeStorage::Transient(scope),
            top: Some(top),
            args,
            pins: Vec::new(),
        }
    }

    /// Running code
    pub fn method(&self) -> &Arc<ExecutableMethod> {
        &self.method
    }

    /// Name the method was invoked as
    pub fn name(&self) -> Symbol {
        self.name
    }

    /// Defining module of the running method
    pub fn module(&self) -> ModuleId {
        self.module
    }

    /// Method or block
    pub fn kind(&self) -> ActivationKind {
        self.kind
    }

    /// Arguments as passed
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Current storage
    pub fn storage(&self) -> &ScopeStorage {
        &self.storage
    }

    /// Whether the locals live on the heap
    pub fn is_promoted(&self) -> bool {
        matches!(self.storage, ScopeStorage::Promoted(_))
    }

    /// Heap scope, once promoted
    pub fn scope_ref(&self) -> Option<ScopeRef> {
        match self.storage {
            ScopeStorage::Promoted(r) => Some(r),
            ScopeStorage::Transient(_) => None,
        }
    }

    /// Embedded scope, until promoted
    pub fn transient(&self) -> Option<&VariableScope> {
        match &self.storage {
            ScopeStorage::Transient(scope) => Some(scope),
            ScopeStorage::Promoted(_) => None,
        }
    }

    pub(crate) fn transient_mut(&mut self) -> Option<&mut VariableScope> {
        match &mut self.storage {
            ScopeStorage::Transient(scope) => Some(scope),
            ScopeStorage::Promoted(_) => None,
        }
    }

    /// Method-level scope for blocks created in this frame
    ///
    /// For a method frame this is its own promoted scope; for a block frame
    /// it is inherited from the block.
    pub fn block_top(&self) -> Option<ScopeRef> {
        match self.kind {
            ActivationKind::Method => self.scope_ref(),
            ActivationKind::Block => self.top,
        }
    }

    /// Keep `value` alive for the rest of this frame
    pub fn pin(&mut self, value: Value) {
        if !value.is_immediate() {
            self.pins.push(value);
        }
    }

    /// Drop the most recent pin of `value`
    pub fn unpin(&mut self, value: Value) -> bool {
        match self.pins.iter().rposition(|pinned| *pinned == value) {
            Some(index) => {
                self.pins.remove(index);
                true
            }
            None => false,
        }
    }

    /// Values pinned to this frame, oldest first
    pub fn pins(&self) -> &[Value] {
        &self.pins
    }

    /// Release every pin taken after `mark` (a previous `pins().len()`)
    pub(crate) fn release_pins(&mut self, mark: usize) {
        self.pins.truncate(mark);
    }

    /// Move the locals to the heap
    ///
    /// Idempotent: later calls return the scope allocated by the first one.
    /// The boolean is true only when this call performed the promotion.
    pub fn promote(&mut self, heap: &mut GarbageCollector) -> (ScopeRef, bool) {
        let scope = match &mut self.storage {
            ScopeStorage::Promoted(r) => return (*r, false),
            ScopeStorage::Transient(scope) => std::mem::take(scope),
        };
        let r = heap.allocate_scope(scope);
        self.storage = ScopeStorage::Promoted(r);
        (r, true)
    }

    /// Receiver
    pub fn self_value(&self, heap: &GarbageCollector) -> VmResult<Value> {
        self.with_scope(heap, |scope| scope.self_value)
    }

    /// Block passed to the running method
    pub fn block(&self, heap: &GarbageCollector) -> VmResult<Option<Value>> {
        self.with_scope(heap, |scope| scope.block)
    }

    fn with_scope<R>(
        &self,
        heap: &GarbageCollector,
        f: impl FnOnce(&VariableScope) -> R,
    ) -> VmResult<R> {
        match &self.storage {
            ScopeStorage::Transient(scope) => Ok(f(scope)),
            ScopeStorage::Promoted(r) => Ok(f(heap.scope(*r)?)),
        }
    }

    /// Local `index` at lexical `depth` (0 = this frame)
    pub fn local(&self, heap: &GarbageCollector, depth: usize, index: usize) -> VmResult<Value> {
        let out_of_range = VmError::LocalOutOfRange { depth, index };
        if depth == 0 {
            return self
                .with_scope(heap, |scope| scope.locals.get(index).copied())?
                .ok_or(out_of_range);
        }
        let outer = self.outer_scope(heap, depth, index)?;
        heap.scope(outer)?.locals.get(index).copied().ok_or(out_of_range)
    }

    /// Overwrite local `index` at lexical `depth`
    pub fn set_local(
        &mut self,
        heap: &mut GarbageCollector,
        depth: usize,
        index: usize,
        value: Value,
    ) -> VmResult<()> {
        let target = if depth == 0 {
            match &mut self.storage {
                ScopeStorage::Transient(scope) => {
                    return scope
                        .set(index, value)
                        .map_err(|_| VmError::LocalOutOfRange { depth, index });
                }
                ScopeStorage::Promoted(r) => *r,
            }
        } else {
            self.outer_scope(heap, depth, index)?
        };
        heap.scope_mut(target)?
            .set(index, value)
            .map_err(|_| VmError::LocalOutOfRange { depth, index })
    }

    fn outer_scope(
        &self,
        heap: &GarbageCollector,
        depth: usize,
        index: usize,
    ) -> VmResult<ScopeRef> {
        let parent = self
            .with_scope(heap, |scope| scope.parent)?
            .ok_or(VmError::LocalOutOfRange { depth, index })?;
        walk_parents(heap, parent, depth - 1, depth, index)
    }
}

impl Trace for Activation {
    fn trace(&mut self, visitor: &mut dyn Visitor) {
        self.method.trace_literals(visitor);
        match &mut self.storage {
            ScopeStorage::Transient(scope) => scope.trace(visitor),
            ScopeStorage::Promoted(r) => visitor.visit_scope(r),
        }
        if let Some(top) = self.top.as_mut() {
            visitor.visit_scope(top);
        }
        visitor.visit_values(&self.args);
        visitor.visit_values(&self.pins);
    }
}
