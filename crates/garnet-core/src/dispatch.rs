//! Message dispatch
//!
//! ```text
//!   Message ──► lookup class ──► cache probe ──hit──► visibility ──► activate
//!                                    │miss                │violation
//!                                    ▼                    ▼
//!                               ancestor walk        PrivacyViolation
//!                               store(token)
//!                                    │absent / undefined
//!                                    ▼
//!                         method_missing(name, *args) ──► MethodNotFound
//! ```
//!
//! Activation checks arity, binds arguments into a fresh transient scope,
//! pushes the frame and then picks a body: the specialized form for the
//! receiver's instance type when one exists, else the native closure, else
//! the installed executor for bytecode.

use crate::cache::{CacheProbe, CachedMethod};
use crate::context::CallContext;
use crate::lexical_scope::LexicalScope;
use crate::method::{ExecutableMethod, InstanceType, MethodBody};
use crate::method_table::Visibility;
use crate::module::{Lookup, ModuleId};
use crate::object::{BlockObject, HeapObject};
use crate::runtime::Runtime;
use crate::scope::{Activation, VariableScope};
use crate::symbol::Symbol;
use crate::task::Task;
use crate::value::Value;
use crate::{ConstLookup, VmError, VmResult};
use std::sync::Arc;

/// How the call site was written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallPrivacy {
    /// Explicit receiver (`obj.foo`); only public methods are reachable
    #[default]
    Public,
    /// Implicit self (`foo`); any visibility is reachable
    Private,
}

/// A method call about to be dispatched
#[derive(Debug, Clone)]
pub struct Message {
    /// Receiver
    pub receiver: Value,
    /// Selector
    pub name: Symbol,
    /// Positional arguments
    pub args: Vec<Value>,
    /// Block argument
    pub block: Option<Value>,
    /// Call-site privacy
    pub privacy: CallPrivacy,
    /// `self` at the call site, for protected checks
    pub sender: Option<Value>,
}

impl Message {
    /// Call with an explicit receiver
    pub fn new(receiver: Value, name: Symbol, args: Vec<Value>) -> Self {
        Self {
            receiver,
            name,
            args,
            block: None,
            privacy: CallPrivacy::Public,
            sender: None,
        }
    }

    /// Call on implicit self
    pub fn private(receiver: Value, name: Symbol, args: Vec<Value>) -> Self {
        Self {
            privacy: CallPrivacy::Private,
            sender: Some(receiver),
            ..Self::new(receiver, name, args)
        }
    }

    /// Attach a block
    pub fn with_block(mut self, block: Value) -> Self {
        self.block = Some(block);
        self
    }

    /// Record the caller's `self`
    pub fn from_sender(mut self, sender: Value) -> Self {
        self.sender = Some(sender);
        self
    }
}

struct Invocation {
    method: Arc<ExecutableMethod>,
    module: ModuleId,
    name: Symbol,
    receiver: Value,
    args: Vec<Value>,
    block: Option<Value>,
    receiver_type: InstanceType,
}

impl Runtime {
    /// Dispatch `message` on `task`
    pub fn dispatch(&self, task: &mut Task, message: Message) -> VmResult<Value> {
        self.ensure_running()?;
        let class = self.lookup_class(message.receiver)?;

        let Some(found) = self.resolve(class, message.name) else {
            return self.method_missing(task, class, message);
        };
        self.check_visibility(&found, &message, class)?;

        let receiver_type = self.instance_type(class)?;
        self.activate(
            task,
            Invocation {
                method: found.method,
                module: found.module,
                name: message.name,
                receiver: message.receiver,
                args: message.args,
                block: message.block,
                receiver_type,
            },
        )
    }

    /// Public call without a block
    pub fn send(
        &self,
        task: &mut Task,
        receiver: Value,
        name: Symbol,
        args: Vec<Value>,
    ) -> VmResult<Value> {
        self.dispatch(task, Message::new(receiver, name, args))
    }

    /// Resolve `name` for instances of `class`, ignoring visibility
    ///
    /// Consults the global cache first; on a miss walks the ancestors and
    /// publishes the result under the registry read lock.
    pub fn resolve(&self, class: ModuleId, name: Symbol) -> Option<CachedMethod> {
        match self.cache().probe(class, name) {
            CacheProbe::Hit(found) => Some(found),
            CacheProbe::Miss(token) => {
                let modules = self.registry();
                match modules.find_method(class, name) {
                    Lookup::Found {
                        method,
                        module,
                        visibility,
                    } => {
                        self.cache()
                            .store(token, class, name, Arc::clone(&method), module, visibility);
                        Some(CachedMethod {
                            method,
                            module,
                            visibility,
                        })
                    }
                    Lookup::Undefined | Lookup::Absent => None,
                }
            }
        }
    }

    /// Find the method `receiver` would run for `name`
    ///
    /// Non-public methods are only reported when `include_private` is set.
    pub fn locate_method(
        &self,
        receiver: Value,
        name: Symbol,
        include_private: bool,
    ) -> VmResult<Option<(Arc<ExecutableMethod>, ModuleId)>> {
        let class = self.lookup_class(receiver)?;
        Ok(self
            .resolve(class, name)
            .filter(|found| include_private || found.visibility == Visibility::Public)
            .map(|found| (found.method, found.module)))
    }

    /// Whether `receiver` responds to `name`
    pub fn respond_to(
        &self,
        receiver: Value,
        name: Symbol,
        include_private: bool,
    ) -> VmResult<bool> {
        Ok(self.locate_method(receiver, name, include_private)?.is_some())
    }

    fn check_visibility(
        &self,
        found: &CachedMethod,
        message: &Message,
        class: ModuleId,
    ) -> VmResult<()> {
        let allowed = match (found.visibility, message.privacy) {
            (Visibility::Public, _) | (_, CallPrivacy::Private) => true,
            (Visibility::Private, CallPrivacy::Public) => false,
            (Visibility::Protected, CallPrivacy::Public) => match message.sender {
                Some(sender) => self.kind_of(sender, found.module)?,
                None => false,
            },
        };
        if allowed {
            return Ok(());
        }
        Err(VmError::PrivacyViolation {
            name: self.symbol_name(message.name).to_string(),
            visibility: found.visibility,
            receiver: self.module_name(class),
        })
    }

    /// Route an unresolved message to `method_missing`, exactly once
    fn method_missing(
        &self,
        task: &mut Task,
        class: ModuleId,
        message: Message,
    ) -> VmResult<Value> {
        let hook = self.hooks().method_missing;
        let Some(found) = self.resolve(class, hook) else {
            return Err(VmError::MethodNotFound {
                name: self.symbol_name(message.name).to_string(),
                receiver: self.module_name(class),
            });
        };
        tracing::trace!(method = %self.symbol_name(message.name), "routing to method_missing");

        let mut args = Vec::with_capacity(message.args.len() + 1);
        args.push(Value::Symbol(message.name));
        args.extend(message.args);
        let receiver_type = self.instance_type(class)?;
        self.activate(
            task,
            Invocation {
                method: found.method,
                module: found.module,
                name: hook,
                receiver: message.receiver,
                args,
                block: message.block,
                receiver_type,
            },
        )
    }

    /// Call the next definition of the current method after its defining module
    ///
    /// Without an explicit block the current frame's block is passed along.
    pub fn dispatch_super(
        &self,
        task: &mut Task,
        args: Vec<Value>,
        block: Option<Value>,
    ) -> VmResult<Value> {
        self.ensure_running()?;
        let (name, defined_in, receiver, frame_block) = {
            let frame = task.current()?;
            let heap = self.lock_heap();
            (
                frame.name(),
                frame.module(),
                frame.self_value(&heap)?,
                frame.block(&heap)?,
            )
        };
        let block = block.or(frame_block);
        let class = self.lookup_class(receiver)?;

        let found = self.registry().find_method_after(class, defined_in, name);
        match found {
            Lookup::Found { method, module, .. } => {
                let receiver_type = self.instance_type(class)?;
                self.activate(
                    task,
                    Invocation {
                        method,
                        module,
                        name,
                        receiver,
                        args,
                        block,
                        receiver_type,
                    },
                )
            }
            Lookup::Undefined | Lookup::Absent => {
                let mut message = Message::private(receiver, name, args);
                message.block = block;
                self.method_missing(task, class, message)
            }
        }
    }

    /// Wrap `code` as a block closing over the current activation
    ///
    /// Promotes the current scope first. The block's lexical scope is that
    /// of the enclosing method.
    pub fn create_block(&self, task: &mut Task, code: ExecutableMethod) -> VmResult<Value> {
        let home = self.promote(task)?;
        let frame = task.current()?;
        let top = frame.block_top().unwrap_or(home);
        let scope = frame
            .method()
            .lexical_scope()
            .cloned()
            .unwrap_or_else(|| self.top_scope());
        let block = BlockObject {
            code: Arc::new(code.formalize(scope, self.next_serial())),
            home,
            top,
            method_name: frame.name(),
            module: frame.module(),
        };

        let value = Value::Object(self.lock_heap().allocate_object(HeapObject::Block(block)));
        task.current_mut()?.pin(value);
        Ok(value)
    }

    /// Invoke a block with proc-style argument binding
    ///
    /// Missing arguments are nil and extra ones are dropped unless the
    /// block takes a splat.
    pub fn call_block(&self, task: &mut Task, block: Value, args: Vec<Value>) -> VmResult<Value> {
        self.ensure_running()?;
        let not_a_block = || VmError::TypeError("not a block".to_string());
        let r = block.as_object().ok_or_else(not_a_block)?;

        let (block, mut scope) = {
            let heap = self.lock_heap();
            let block = heap.object(r)?.as_block().ok_or_else(not_a_block)?.clone();
            let scope = VariableScope::setup_as_block(&heap, block.top, block.home, 0)?;
            (block, scope)
        };
        scope.locals = self.bind_arguments(&block.code, &args);

        task.push(Activation::for_block(
            Arc::clone(&block.code),
            block.method_name,
            block.module,
            scope,
            block.top,
            args,
        ))?;
        let result = self.enter(task, &block.code, None);
        task.pop();
        result
    }

    /// Resolve a constant as written in `scope`
    ///
    /// Falls back to `const_missing` on the innermost module, then fails
    /// with `ConstantNotFound`.
    pub fn const_get(
        &self,
        task: &mut Task,
        scope: &LexicalScope,
        name: Symbol,
    ) -> VmResult<Value> {
        if let ConstLookup::Found { value, .. } = self.resolve_constant(scope, name) {
            return Ok(value);
        }

        let owner = Value::Module(scope.module());
        let hook = self.hooks().const_missing;
        if self.resolve(self.lookup_class(owner)?, hook).is_some() {
            return self.dispatch(task, Message::private(owner, hook, vec![Value::Symbol(name)]));
        }

        let name = self.symbol_name(name);
        Err(VmError::ConstantNotFound(if scope.module() == self.specials().object {
            name.to_string()
        } else {
            format!("{}::{}", self.module_name(scope.module()), name)
        }))
    }

    fn activate(&self, task: &mut Task, invocation: Invocation) -> VmResult<Value> {
        let arity = invocation.method.arity();
        if !arity.accepts(invocation.args.len()) {
            return Err(VmError::ArgumentError {
                name: self.symbol_name(invocation.name).to_string(),
                given: invocation.args.len(),
                expected: arity.describe(),
            });
        }

        let scope = VariableScope {
            parent: None,
            self_value: invocation.receiver,
            module: invocation.module,
            block: invocation.block,
            locals: self.bind_arguments(&invocation.method, &invocation.args),
        };
        task.push(Activation::for_method(
            Arc::clone(&invocation.method),
            invocation.name,
            invocation.module,
            scope,
            invocation.args,
        ))?;
        let result = self.enter(task, &invocation.method, Some(invocation.receiver_type));
        task.pop();
        result
    }

    fn enter(
        &self,
        task: &mut Task,
        method: &Arc<ExecutableMethod>,
        receiver_type: Option<InstanceType>,
    ) -> VmResult<Value> {
        self.safepoint(task);
        let specialized = receiver_type.and_then(|t| method.specialized_for(t));
        let mut ctx = CallContext::new(self, task);

        if let Some(code) = specialized {
            return code.invoke(&mut ctx);
        }
        match method.body() {
            MethodBody::Native(body) => body(&mut ctx),
            MethodBody::Bytecode(code) => match self.executor() {
                Some(executor) => executor.execute(method, code, &mut ctx),
                None => Err(VmError::NoExecutor(self.symbol_name(method.name()).to_string())),
            },
        }
    }

    fn bind_arguments(&self, method: &ExecutableMethod, args: &[Value]) -> Vec<Value> {
        let arity = method.arity();
        let positional = arity.required + arity.optional;
        let mut locals = vec![Value::Nil; method.locals_count()];
        for (slot, arg) in locals.iter_mut().zip(args.iter().take(positional)) {
            *slot = *arg;
        }
        if arity.splat {
            let rest: Vec<Value> = args.iter().skip(positional).copied().collect();
            let tuple = self.lock_heap().allocate_object(HeapObject::Tuple(rest));
            if let Some(slot) = locals.get_mut(positional) {
                *slot = Value::Object(tuple);
            }
        }
        locals
    }
}
