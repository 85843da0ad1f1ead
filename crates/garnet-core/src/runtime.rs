//! Runtime state
//!
//! A [`Runtime`] is the explicit process-wide state of one VM instance:
//! symbols, the module registry, the global method cache, the managed heap
//! and the pluggable backends. Every core operation goes through it; there
//! are no implicit globals.
//!
//! # Locking
//!
//! The module registry sits behind a read-write lock, the heap behind a
//! mutex. When both are needed the registry is taken first. No lock is held
//! while a method body runs, so bodies may re-enter the runtime freely.
//!
//! # Safepoints
//!
//! Collection only happens inside [`Runtime::safepoint`], which the runtime
//! polls on activation entry and after promoting a scope. Values that are
//! held outside task frames across a safepoint must be registered with
//! [`Runtime::add_global_root`].
//!
//! A collection traces only the task it runs on. While any other task from
//! [`Runtime::new_task`] has live frames the collection is deferred and
//! stays requested, so it runs at the first safepoint after those tasks
//! unwind.

use crate::cache::{CacheStats, GlobalMethodCache};
use crate::constants::{self, ConstLookup};
use crate::gc::{GarbageCollector, GcCycle, GcStats, HeapStats, ScopeRef, Trace, Visitor};
use crate::lexical_scope::LexicalScope;
use crate::method::{ExecutableMethod, Executor, InstanceType, Specializer};
use crate::method_table::Visibility;
use crate::module::{ModuleId, ModuleKind, ModuleRegistry, SpecialClasses};
use crate::object::{HeapObject, Instance};
use crate::options::VmOptions;
use crate::symbol::{Symbol, SymbolTable};
use crate::task::Task;
use crate::value::Value;
use crate::{VmError, VmResult};
use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Unique identifier for a Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuntimeId(u64);

impl RuntimeId {
    /// Create a new unique runtime ID
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        RuntimeId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for RuntimeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Symbols the runtime itself dispatches on
#[derive(Debug, Clone, Copy)]
pub(crate) struct HookNames {
    pub(crate) method_missing: Symbol,
    pub(crate) const_missing: Symbol,
}

struct RegistryRoots<'a>(&'a ModuleRegistry);

impl Trace for RegistryRoots<'_> {
    fn trace(&mut self, visitor: &mut dyn Visitor) {
        self.0.trace_roots(visitor);
    }
}

/// One VM instance
pub struct Runtime {
    id: RuntimeId,
    options: VmOptions,
    symbols: SymbolTable,
    hooks: HookNames,
    specials: SpecialClasses,
    top_scope: Arc<LexicalScope>,
    modules: RwLock<ModuleRegistry>,
    cache: GlobalMethodCache,
    heap: Mutex<GarbageCollector>,
    serials: AtomicU64,
    executor: Option<Arc<dyn Executor>>,
    specializer: Option<Arc<dyn Specializer>>,
    specialization_failures: AtomicU64,
    gc_requested: AtomicBool,
    busy_tasks: Arc<AtomicUsize>,
    running: AtomicBool,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(VmOptions::default())
    }
}

impl Runtime {
    /// Boot a runtime: intern hook names, build the bootstrap hierarchy,
    /// allocate the cache and the heap
    pub fn new(options: VmOptions) -> Self {
        let symbols = SymbolTable::new();
        let hooks = HookNames {
            method_missing: symbols.intern("method_missing"),
            const_missing: symbols.intern("const_missing"),
        };
        let registry = ModuleRegistry::bootstrap(&symbols);
        let specials = *registry.specials();
        let cache = GlobalMethodCache::new(&options.cache);
        let heap = GarbageCollector::new(&options.gc);
        let id = RuntimeId::new();

        tracing::info!(
            runtime = id.as_u64(),
            cache_capacity = cache.capacity(),
            invalidation = ?options.cache.invalidation,
            gc_threshold = options.gc.threshold,
            "runtime booted"
        );

        Self {
            id,
            top_scope: LexicalScope::root(specials.object),
            options,
            symbols,
            hooks,
            specials,
            modules: RwLock::new(registry),
            cache,
            heap: Mutex::new(heap),
            serials: AtomicU64::new(1),
            executor: None,
            specializer: None,
            specialization_failures: AtomicU64::new(0),
            gc_requested: AtomicBool::new(false),
            busy_tasks: Arc::new(AtomicUsize::new(0)),
            running: AtomicBool::new(true),
        }
    }

    /// Install the interpreter used for bytecode bodies
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Install the backend consulted when methods are installed on classes
    pub fn with_specializer(mut self, specializer: Arc<dyn Specializer>) -> Self {
        self.specializer = Some(specializer);
        self
    }

    /// Stop accepting dispatches and drop every cache entry
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        self.cache.clear_all();
        let cache = self.cache.stats();
        let gc = self.gc_stats();
        tracing::info!(
            runtime = self.id.as_u64(),
            cache_hits = cache.hits,
            cache_misses = cache.misses,
            gc_collections = gc.collections,
            "runtime shut down"
        );
    }

    /// Whether [`Runtime::shutdown`] has not been called
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_running(&self) -> VmResult<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(VmError::RuntimeShutdown)
        }
    }

    /// Runtime id
    pub fn id(&self) -> RuntimeId {
        self.id
    }

    /// Boot options
    pub fn options(&self) -> &VmOptions {
        &self.options
    }

    /// Symbol table
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Intern `name`
    pub fn symbol(&self, name: &str) -> Symbol {
        self.symbols.intern(name)
    }

    /// Name of `sym`
    pub fn symbol_name(&self, sym: Symbol) -> Arc<str> {
        self.symbols.name(sym)
    }

    pub(crate) fn hooks(&self) -> HookNames {
        self.hooks
    }

    /// Bootstrap classes
    pub fn specials(&self) -> &SpecialClasses {
        &self.specials
    }

    /// Top-level lexical scope (`Object`)
    pub fn top_scope(&self) -> Arc<LexicalScope> {
        Arc::clone(&self.top_scope)
    }

    /// Global method cache
    pub fn cache(&self) -> &GlobalMethodCache {
        &self.cache
    }

    /// Read access to the class hierarchy
    pub fn registry(&self) -> RwLockReadGuard<'_, ModuleRegistry> {
        self.modules.read()
    }

    pub(crate) fn lock_heap(&self) -> MutexGuard<'_, GarbageCollector> {
        self.heap.lock()
    }

    pub(crate) fn executor(&self) -> Option<&Arc<dyn Executor>> {
        self.executor.as_ref()
    }

    pub(crate) fn next_serial(&self) -> u64 {
        self.serials.fetch_add(1, Ordering::Relaxed)
    }

    /// Create an empty task sized by the configured call depth
    pub fn new_task(&self) -> Task {
        Task::attached(self.options.max_call_depth, Arc::clone(&self.busy_tasks))
    }

    /// Display name of a module
    pub fn module_name(&self, id: ModuleId) -> String {
        self.modules.read().qualified_name(id, &self.symbols)
    }

    /// Method resolution order of `id`
    pub fn ancestors(&self, id: ModuleId) -> Vec<ModuleId> {
        self.modules.read().ancestors(id)
    }

    // ===== Hierarchy =====

    /// Reopen or create a top-level class
    pub fn define_class(&self, name: &str, superclass: Option<ModuleId>) -> VmResult<ModuleId> {
        self.open_class(self.specials.object, self.symbol(name), superclass)
    }

    /// Reopen or create a top-level module
    pub fn define_module(&self, name: &str) -> VmResult<ModuleId> {
        self.open_module(self.specials.object, self.symbol(name))
    }

    /// Reopen or create class `name` under `under`
    ///
    /// Fails with `SuperclassMismatch` when an existing class was created
    /// with a different superclass than the one given.
    pub fn open_class(
        &self,
        under: ModuleId,
        name: Symbol,
        superclass: Option<ModuleId>,
    ) -> VmResult<ModuleId> {
        let mut modules = self.modules.write();
        let (id, created) = modules.open_class(under, name, superclass, &self.symbols)?;
        if created {
            tracing::debug!(class = %modules.qualified_name(id, &self.symbols), "class defined");
        }
        Ok(id)
    }

    /// Reopen or create module `name` under `under`
    pub fn open_module(&self, under: ModuleId, name: Symbol) -> VmResult<ModuleId> {
        let mut modules = self.modules.write();
        let (id, _) = modules.open_module(under, name, &self.symbols)?;
        Ok(id)
    }

    /// Reassign a superclass; rejects cycles
    pub fn set_superclass(&self, class: ModuleId, superclass: ModuleId) -> VmResult<()> {
        let mut modules = self.modules.write();
        self.cache.clear_all();
        modules.set_superclass(class, superclass)
    }

    /// Include `module` into `target`; rejects cycles
    pub fn include_module(&self, target: ModuleId, module: ModuleId) -> VmResult<()> {
        let mut modules = self.modules.write();
        self.cache.clear_all();
        if modules.include_module(target, module)? {
            tracing::debug!(
                target = %modules.qualified_name(target, &self.symbols),
                module = %modules.qualified_name(module, &self.symbols),
                "module included"
            );
        }
        Ok(())
    }

    /// Singleton class of `value`, created on demand
    pub fn singleton_class(&self, value: Value) -> VmResult<ModuleId> {
        match value {
            Value::Module(id) => {
                let mut modules = self.modules.write();
                if let Some(existing) = modules.module(id)?.singleton {
                    return Ok(existing);
                }
                self.cache.clear_all();
                modules.module_singleton(id)
            }
            Value::Object(r) => {
                let mut modules = self.modules.write();
                let mut heap = self.heap.lock();
                let instance = heap
                    .object_mut(r)?
                    .as_instance_mut()
                    .ok_or_else(|| VmError::TypeError("can't define singleton".to_string()))?;
                if let Some(existing) = instance.singleton {
                    return Ok(existing);
                }
                let singleton = modules.object_singleton(value, instance.class)?;
                instance.singleton = Some(singleton);
                Ok(singleton)
            }
            _ => Err(VmError::TypeError("can't define singleton".to_string())),
        }
    }

    // ===== Methods =====

    /// Install `method` as `name` on `module`
    ///
    /// Binds the method to `scope`, stamps a fresh serial, invalidates the
    /// cache for `(module, name)` and publishes the definition. When `module`
    /// is a class the specializer is consulted afterwards; its failure is
    /// logged and the generic body stays in use.
    pub fn install(
        &self,
        module: ModuleId,
        name: Symbol,
        method: ExecutableMethod,
        scope: &Arc<LexicalScope>,
        visibility: Visibility,
    ) -> VmResult<Arc<ExecutableMethod>> {
        self.ensure_running()?;
        let method = Arc::new(method.formalize(Arc::clone(scope), self.next_serial()));

        let type_info = {
            let mut modules = self.modules.write();
            let target = modules.module_mut(module)?;
            target
                .methods
                .store(&self.cache, name, Arc::clone(&method), visibility);
            let is_class = target.is_class();
            tracing::debug!(
                module = %modules.qualified_name(module, &self.symbols),
                method = %self.symbols.name(name),
                serial = method.serial(),
                %visibility,
                "method installed"
            );
            if is_class {
                Some(modules.type_info(module, &self.symbols)?)
            } else {
                None
            }
        };

        if let (Some(info), Some(specializer)) = (type_info, self.specializer.as_ref()) {
            if let Err(err) = method.specialize(specializer.as_ref(), &info) {
                self.specialization_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    class = %info.class_name,
                    method = %self.symbols.name(name),
                    error = %err,
                    "specialization failed; generic body stays in use"
                );
            }
        }
        Ok(method)
    }

    /// Install `method` on the definition target of `scope`
    pub fn define_method(
        &self,
        scope: &Arc<LexicalScope>,
        name: Symbol,
        method: ExecutableMethod,
        visibility: Visibility,
    ) -> VmResult<Arc<ExecutableMethod>> {
        self.install(scope.for_method_definition(), name, method, scope, visibility)
    }

    /// Define a singleton method on `receiver`
    ///
    /// When the receiver is a module the method's lexical scope is nested
    /// inside that module, as for `def self.name` in its body.
    pub fn attach_method(
        &self,
        receiver: Value,
        name: Symbol,
        method: ExecutableMethod,
        scope: &Arc<LexicalScope>,
        visibility: Visibility,
    ) -> VmResult<Arc<ExecutableMethod>> {
        let singleton = self.singleton_class(receiver)?;
        let scope = match receiver {
            Value::Module(m) if scope.module() != m => scope.push(m),
            _ => Arc::clone(scope),
        };
        self.install(singleton, name, method, &scope, visibility)
    }

    /// Make `name` undefined on `module`, hiding ancestor definitions
    pub fn undefine_method(&self, module: ModuleId, name: Symbol) -> VmResult<()> {
        let mut modules = self.modules.write();
        modules.module_mut(module)?.methods.undefine(&self.cache, name);
        tracing::debug!(method = %self.symbols.name(name), "method undefined");
        Ok(())
    }

    /// Remove `name` from `module`, exposing ancestor definitions
    pub fn remove_method(&self, module: ModuleId, name: Symbol) -> VmResult<()> {
        let mut modules = self.modules.write();
        if modules.module_mut(module)?.methods.remove(&self.cache, name).is_none() {
            return Err(VmError::NameError(format!(
                "method `{}' not defined in {}",
                self.symbols.name(name),
                modules.qualified_name(module, &self.symbols)
            )));
        }
        tracing::debug!(method = %self.symbols.name(name), "method removed");
        Ok(())
    }

    /// Change the visibility of `name` as defined directly on `module`
    pub fn set_visibility(
        &self,
        module: ModuleId,
        name: Symbol,
        visibility: Visibility,
    ) -> VmResult<()> {
        let mut modules = self.modules.write();
        if !modules
            .module_mut(module)?
            .methods
            .set_visibility(&self.cache, name, visibility)
        {
            return Err(VmError::NameError(format!(
                "undefined method `{}' for {}",
                self.symbols.name(name),
                modules.qualified_name(module, &self.symbols)
            )));
        }
        Ok(())
    }

    /// Installs whose specialization failed
    pub fn specialization_failures(&self) -> u64 {
        self.specialization_failures.load(Ordering::Relaxed)
    }

    // ===== Constants =====

    /// Bind constant `name` on `module`
    pub fn set_const(&self, module: ModuleId, name: Symbol, value: Value) -> VmResult<()> {
        self.modules
            .write()
            .module_mut(module)?
            .constants
            .insert(name, value);
        Ok(())
    }

    /// Unbind constant `name` from `module`, returning its value
    pub fn remove_const(&self, module: ModuleId, name: Symbol) -> VmResult<Value> {
        let mut modules = self.modules.write();
        match modules.module_mut(module)?.constants.remove(&name) {
            Some(value) => Ok(value),
            None => Err(VmError::NameError(format!(
                "constant {}::{} not defined",
                modules.qualified_name(module, &self.symbols),
                self.symbols.name(name)
            ))),
        }
    }

    /// Lexical constant lookup without the `const_missing` fallback
    pub fn resolve_constant(&self, scope: &LexicalScope, name: Symbol) -> ConstLookup {
        constants::resolve_constant(&self.modules.read(), scope, name)
    }

    /// Scoped constant lookup (`Mod::Name`) without the fallback
    pub fn const_get_under(&self, module: ModuleId, name: Symbol) -> ConstLookup {
        constants::resolve_under(&self.modules.read(), module, name)
    }

    // ===== Objects =====

    /// Allocate an instance of `class`
    pub fn new_object(&self, class: ModuleId) -> VmResult<Value> {
        {
            let modules = self.modules.read();
            if modules.module(class)?.kind != ModuleKind::Class {
                return Err(VmError::TypeError(format!(
                    "{} cannot be instantiated",
                    modules.qualified_name(class, &self.symbols)
                )));
            }
        }
        let r = self
            .heap
            .lock()
            .allocate_object(HeapObject::Instance(Instance::new(class)));
        Ok(Value::Object(r))
    }

    /// Shallow copy (`dup`)
    ///
    /// Header flags go through [`crate::ObjectFlags::clone_semantics`]; the
    /// copy is never frozen and has no singleton class.
    pub fn duplicate(&self, value: Value) -> VmResult<Value> {
        let Value::Object(r) = value else {
            return Ok(value);
        };
        let mut heap = self.heap.lock();
        let copy = match heap.object(r)? {
            HeapObject::Instance(instance) => HeapObject::Instance(instance.duplicate()),
            other => other.clone(),
        };
        Ok(Value::Object(heap.allocate_object(copy)))
    }

    /// Freeze an instance
    pub fn freeze(&self, value: Value) -> VmResult<()> {
        if let Value::Object(r) = value {
            if let Some(instance) = self.heap.lock().object_mut(r)?.as_instance_mut() {
                instance.flags.frozen = true;
            }
        }
        Ok(())
    }

    /// Whether `value` is a frozen instance
    pub fn is_frozen(&self, value: Value) -> VmResult<bool> {
        match value {
            Value::Object(r) => Ok(self
                .heap
                .lock()
                .object(r)?
                .as_instance()
                .is_some_and(|i| i.flags.frozen)),
            _ => Ok(value.is_immediate()),
        }
    }

    /// Read an instance variable (nil when unset)
    pub fn ivar_get(&self, value: Value, name: Symbol) -> VmResult<Value> {
        let Value::Object(r) = value else {
            return Ok(Value::Nil);
        };
        let heap = self.heap.lock();
        Ok(heap
            .object(r)?
            .as_instance()
            .and_then(|i| i.ivars.get(&name).copied())
            .unwrap_or(Value::Nil))
    }

    /// Write an instance variable
    pub fn ivar_set(&self, value: Value, name: Symbol, ivar: Value) -> VmResult<()> {
        let Value::Object(r) = value else {
            return Err(VmError::TypeError(
                "immediate values have no instance variables".to_string(),
            ));
        };
        let frozen_class = {
            let mut heap = self.heap.lock();
            let instance = heap
                .object_mut(r)?
                .as_instance_mut()
                .ok_or_else(|| VmError::TypeError("not an instance".to_string()))?;
            if instance.flags.frozen {
                Some(instance.class)
            } else {
                instance.ivars.insert(name, ivar);
                None
            }
        };
        match frozen_class {
            Some(class) => Err(VmError::FrozenError(self.module_name(class))),
            None => Ok(()),
        }
    }

    /// Allocate a tuple
    pub fn new_tuple(&self, values: Vec<Value>) -> Value {
        Value::Object(self.heap.lock().allocate_object(HeapObject::Tuple(values)))
    }

    /// Elements of a tuple
    pub fn tuple_values(&self, value: Value) -> VmResult<Vec<Value>> {
        let not_a_tuple = || VmError::TypeError("not a tuple".to_string());
        let r = value.as_object().ok_or_else(not_a_tuple)?;
        match self.heap.lock().object(r)? {
            HeapObject::Tuple(values) => Ok(values.clone()),
            _ => Err(not_a_tuple()),
        }
    }

    /// Class of `value`, ignoring singleton classes
    pub fn class_of(&self, value: Value) -> VmResult<ModuleId> {
        self.class_for(value, false)
    }

    /// Class where method lookup for `value` starts
    pub fn lookup_class(&self, value: Value) -> VmResult<ModuleId> {
        self.class_for(value, true)
    }

    fn class_for(&self, value: Value, singleton: bool) -> VmResult<ModuleId> {
        let s = &self.specials;
        Ok(match value {
            Value::Nil => s.nil,
            Value::Bool(true) => s.true_class,
            Value::Bool(false) => s.false_class,
            Value::Fixnum(_) => s.integer,
            Value::Symbol(_) => s.symbol,
            Value::Object(r) => match self.heap.lock().object(r)? {
                HeapObject::Instance(i) => match i.singleton {
                    Some(meta) if singleton => meta,
                    _ => i.class,
                },
                HeapObject::Block(_) => s.proc,
                HeapObject::Tuple(_) => s.tuple,
            },
            Value::Module(id) => {
                let modules = self.modules.read();
                let module = modules.module(id)?;
                match module.kind {
                    _ if !singleton => {}
                    // A class without its own metaclass looks up through the
                    // nearest superclass metaclass.
                    ModuleKind::Class => {
                        let mut current = Some(id);
                        while let Some(class) = current {
                            let entry = modules.module(class)?;
                            if let Some(meta) = entry.singleton {
                                return Ok(meta);
                            }
                            current = entry.superclass;
                        }
                    }
                    ModuleKind::Module | ModuleKind::Singleton => {
                        if let Some(meta) = module.singleton {
                            return Ok(meta);
                        }
                    }
                }
                if module.kind == ModuleKind::Module {
                    s.module
                } else {
                    s.class
                }
            }
        })
    }

    pub(crate) fn instance_type(&self, class: ModuleId) -> VmResult<InstanceType> {
        Ok(self.modules.read().module(class)?.instance_type)
    }

    /// Whether `module` is among the ancestors of `value`'s lookup class
    pub fn kind_of(&self, value: Value, module: ModuleId) -> VmResult<bool> {
        let class = self.lookup_class(value)?;
        Ok(self.modules.read().is_kind_of(class, module))
    }

    // ===== Garbage collection =====

    /// Keep `value` alive independently of any task
    pub fn add_global_root(&self, value: Value) {
        self.heap.lock().add_root(value);
    }

    /// Drop a global root registration
    pub fn remove_global_root(&self, value: Value) -> bool {
        self.heap.lock().remove_root(value)
    }

    /// Ask for a collection at the next safepoint; callable from any thread
    pub fn request_collection(&self) {
        self.gc_requested.store(true, Ordering::Release);
    }

    /// Collect if requested or if the allocation threshold was reached
    pub fn safepoint(&self, task: &mut Task) -> Option<GcCycle> {
        let requested = self.gc_requested.swap(false, Ordering::AcqRel);
        if !requested && !self.heap.lock().should_collect() {
            return None;
        }
        self.collect_garbage(task)
    }

    /// Collect now, with `task`, the registry and the global roots as roots
    ///
    /// Returns `None` and leaves a collection requested when another task
    /// of this runtime has live frames, since those frames are not reachable
    /// from here.
    pub fn collect_garbage(&self, task: &mut Task) -> Option<GcCycle> {
        let modules = self.modules.read();
        let mut heap = self.heap.lock();

        let own = usize::from(task.depth() > 0);
        let others = self.busy_tasks.load(Ordering::Acquire).saturating_sub(own);
        if others > 0 {
            self.gc_requested.store(true, Ordering::Release);
            tracing::debug!(
                task = task.id().as_u64(),
                busy_tasks = others,
                "collection deferred"
            );
            return None;
        }

        let mut registry = RegistryRoots(&modules);
        let mut roots: [&mut dyn Trace; 2] = [&mut registry, &mut *task];
        Some(heap.collect(&mut roots))
    }

    /// Promote the current activation's locals to the heap
    ///
    /// Idempotent. Allocation may trigger a collection that relocates the
    /// new scope, so the handle returned is re-read from the activation.
    pub fn promote(&self, task: &mut Task) -> VmResult<ScopeRef> {
        let (scope, fresh) = {
            let mut heap = self.heap.lock();
            task.current_mut()?.promote(&mut heap)
        };
        if !fresh {
            return Ok(scope);
        }
        tracing::debug!(task = task.id().as_u64(), depth = task.depth(), "scope promoted");
        self.safepoint(task);
        task.current()?
            .scope_ref()
            .ok_or_else(|| VmError::InvalidReference("promoted scope".to_string()))
    }

    /// Collector counters
    pub fn gc_stats(&self) -> GcStats {
        self.heap.lock().stats().clone()
    }

    /// Heap occupancy
    pub fn heap_stats(&self) -> HeapStats {
        self.heap.lock().heap_stats()
    }

    /// Method cache counters
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
