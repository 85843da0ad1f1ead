//! Native call context
//!
//! A [`CallContext`] is what a method body sees: the runtime, the task and
//! its innermost activation. Heap values a body creates through the context
//! are pinned to the current frame so that a collection at a nested
//! safepoint cannot free them before the body returns. Bodies that loop use
//! [`CallContext::pinned`] or [`CallContext::unpin`] to give them back.

use crate::gc::ScopeRef;
use crate::lexical_scope::LexicalScope;
use crate::method::ExecutableMethod;
use crate::method_table::Visibility;
use crate::module::ModuleId;
use crate::runtime::Runtime;
use crate::scope::Activation;
use crate::symbol::Symbol;
use crate::task::Task;
use crate::value::Value;
use crate::{Message, VmError, VmResult};
use std::sync::Arc;

/// Execution context handed to method bodies
pub struct CallContext<'a> {
    runtime: &'a Runtime,
    task: &'a mut Task,
}

impl<'a> CallContext<'a> {
    pub(crate) fn new(runtime: &'a Runtime, task: &'a mut Task) -> Self {
        Self { runtime, task }
    }

    /// Owning runtime
    pub fn runtime(&self) -> &'a Runtime {
        self.runtime
    }

    /// Running task
    pub fn task(&self) -> &Task {
        &*self.task
    }

    /// Innermost activation
    pub fn frame(&self) -> VmResult<&Activation> {
        self.task.current()
    }

    /// Intern `name`
    pub fn symbol(&self, name: &str) -> Symbol {
        self.runtime.symbol(name)
    }

    /// Receiver
    pub fn self_value(&self) -> VmResult<Value> {
        let frame = self.task.current()?;
        match frame.transient() {
            Some(scope) => Ok(scope.self_value),
            None => frame.self_value(&self.runtime.lock_heap()),
        }
    }

    /// Arguments as passed
    pub fn args(&self) -> VmResult<&[Value]> {
        Ok(self.task.current()?.args())
    }

    /// Argument `index`, nil when absent
    pub fn arg(&self, index: usize) -> VmResult<Value> {
        Ok(self.args()?.get(index).copied().unwrap_or(Value::Nil))
    }

    /// Block passed to the running method
    pub fn block(&self) -> VmResult<Option<Value>> {
        let frame = self.task.current()?;
        match frame.transient() {
            Some(scope) => Ok(scope.block),
            None => frame.block(&self.runtime.lock_heap()),
        }
    }

    /// Name the method was invoked as
    pub fn method_name(&self) -> VmResult<Symbol> {
        Ok(self.task.current()?.name())
    }

    /// Module that defined the running method
    pub fn defining_module(&self) -> VmResult<ModuleId> {
        Ok(self.task.current()?.module())
    }

    /// Lexical scope of the running code
    pub fn lexical_scope(&self) -> VmResult<Arc<LexicalScope>> {
        Ok(self
            .task
            .current()?
            .method()
            .lexical_scope()
            .cloned()
            .unwrap_or_else(|| self.runtime.top_scope()))
    }

    // ===== Locals =====

    /// Local slot `index` of this activation
    pub fn local(&self, index: usize) -> VmResult<Value> {
        let frame = self.task.current()?;
        match frame.transient() {
            Some(scope) => scope.get(index),
            None => frame.local(&self.runtime.lock_heap(), 0, index),
        }
    }

    /// Overwrite local slot `index` of this activation
    pub fn set_local(&mut self, index: usize, value: Value) -> VmResult<()> {
        let frame = self.task.current_mut()?;
        if let Some(scope) = frame.transient_mut() {
            return scope.set(index, value);
        }
        frame.set_local(&mut self.runtime.lock_heap(), 0, index, value)
    }

    /// Local `index` of the scope `depth` levels out
    pub fn outer_local(&self, depth: usize, index: usize) -> VmResult<Value> {
        self.task.current()?.local(&self.runtime.lock_heap(), depth, index)
    }

    /// Overwrite local `index` of the scope `depth` levels out
    pub fn set_outer_local(&mut self, depth: usize, index: usize, value: Value) -> VmResult<()> {
        let frame = self.task.current_mut()?;
        frame.set_local(&mut self.runtime.lock_heap(), depth, index, value)
    }

    /// Move this activation's locals to the heap
    pub fn promote(&mut self) -> VmResult<ScopeRef> {
        self.runtime.promote(self.task)
    }

    /// Keep `value` alive until this activation returns
    pub fn pin(&mut self, value: Value) -> VmResult<()> {
        self.task.current_mut()?.pin(value);
        Ok(())
    }

    /// Let `value` die at the next collection unless something else holds it
    pub fn unpin(&mut self, value: Value) -> VmResult<bool> {
        Ok(self.task.current_mut()?.unpin(value))
    }

    /// Run `f`, then release every value it pinned except its result
    ///
    /// Loops that send or allocate per iteration wrap each iteration in
    /// this so the frame's pins stay bounded.
    pub fn pinned<F>(&mut self, f: F) -> VmResult<Value>
    where
        F: FnOnce(&mut Self) -> VmResult<Value>,
    {
        let mark = self.task.current()?.pins().len();
        let result = f(self);
        let frame = self.task.current_mut()?;
        frame.release_pins(mark);
        let value = result?;
        frame.pin(value);
        Ok(value)
    }

    // ===== Sends =====

    /// Call `name` on an explicit receiver
    pub fn send(&mut self, receiver: Value, name: Symbol, args: Vec<Value>) -> VmResult<Value> {
        let sender = self.self_value()?;
        self.dispatch(Message::new(receiver, name, args).from_sender(sender))
    }

    /// Call `name` on an explicit receiver, passing a block
    pub fn send_with_block(
        &mut self,
        receiver: Value,
        name: Symbol,
        args: Vec<Value>,
        block: Value,
    ) -> VmResult<Value> {
        let sender = self.self_value()?;
        self.dispatch(
            Message::new(receiver, name, args)
                .from_sender(sender)
                .with_block(block),
        )
    }

    /// Call `name` on implicit self, reaching private methods
    pub fn send_self(&mut self, name: Symbol, args: Vec<Value>) -> VmResult<Value> {
        let receiver = self.self_value()?;
        self.dispatch(Message::private(receiver, name, args))
    }

    /// Dispatch a prepared message
    pub fn dispatch(&mut self, message: Message) -> VmResult<Value> {
        let result = self.runtime.dispatch(self.task, message)?;
        self.pin(result)?;
        Ok(result)
    }

    /// `super` with explicit arguments
    pub fn send_super(&mut self, args: Vec<Value>) -> VmResult<Value> {
        let result = self.runtime.dispatch_super(self.task, args, None)?;
        self.pin(result)?;
        Ok(result)
    }

    // ===== Blocks =====

    /// Create a block closing over this activation
    pub fn create_block(&mut self, code: ExecutableMethod) -> VmResult<Value> {
        self.runtime.create_block(self.task, code)
    }

    /// Invoke a block value
    pub fn call_block(&mut self, block: Value, args: Vec<Value>) -> VmResult<Value> {
        let result = self.runtime.call_block(self.task, block, args)?;
        self.pin(result)?;
        Ok(result)
    }

    /// Invoke the block passed to the running method
    pub fn yield_block(&mut self, args: Vec<Value>) -> VmResult<Value> {
        let block = self.block()?.ok_or(VmError::NoBlockGiven)?;
        self.call_block(block, args)
    }

    // ===== Constants and objects =====

    /// Resolve a constant in the running code's lexical scope
    pub fn const_get(&mut self, name: Symbol) -> VmResult<Value> {
        let scope = self.lexical_scope()?;
        let value = self.runtime.const_get(self.task, &scope, name)?;
        self.pin(value)?;
        Ok(value)
    }

    /// Allocate an instance of `class`
    pub fn new_object(&mut self, class: ModuleId) -> VmResult<Value> {
        let value = self.runtime.new_object(class)?;
        self.pin(value)?;
        Ok(value)
    }

    /// Allocate a tuple
    pub fn new_tuple(&mut self, values: Vec<Value>) -> VmResult<Value> {
        let value = self.runtime.new_tuple(values);
        self.pin(value)?;
        Ok(value)
    }

    /// Define a method on the current definition target
    pub fn define_method(
        &self,
        name: Symbol,
        method: ExecutableMethod,
        visibility: Visibility,
    ) -> VmResult<Arc<ExecutableMethod>> {
        let scope = self.lexical_scope()?;
        self.runtime.define_method(&scope, name, method, visibility)
    }
}
