//! Garnet VM Runtime Core
//!
//! This crate provides the runtime core of the Garnet bytecode VM:
//! - Message dispatch with a deterministic method resolution order
//! - Global method cache with invalidate-then-publish coherence
//! - Executable method lifecycle (install, specialize, activate)
//! - Lexical scopes and constant resolution
//! - Variable scopes with lazy stack-to-heap promotion for closures
//! - Tracing hooks and a mark-sweep collector hosting promoted scopes
//!
//! The interpreter loop, compiler and JIT backend live outside this crate and
//! plug in through the [`Executor`] and [`Specializer`] traits.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod cache;
pub mod constants;
pub mod context;
pub mod defaults;
pub mod dispatch;
pub mod gc;
pub mod lexical_scope;
pub mod method;
pub mod method_table;
pub mod module;
pub mod object;
pub mod options;
pub mod runtime;
pub mod scope;
pub mod symbol;
pub mod task;
pub mod value;

pub use cache::{CacheProbe, CacheStats, CachedMethod, GlobalMethodCache, InvalidationGranularity};
pub use constants::ConstLookup;
pub use context::CallContext;
pub use dispatch::{CallPrivacy, Message};
pub use gc::{GarbageCollector, GcStats, HeapStats, ObjectRef, ScopeRef, Trace, Visitor};
pub use lexical_scope::LexicalScope;
pub use method::{
    Arity, ExecutableMethod, Executor, InstanceType, InstructionSequence, MethodBody,
    SpecializationError, SpecializedCode, Specializer, TypeInfo,
};
pub use method_table::{MethodEntry, MethodTable, Visibility};
pub use module::{Module, ModuleId, ModuleKind, ModuleRegistry, SpecialClasses};
pub use object::{BlockObject, HeapObject, Instance, ObjectFlags};
pub use options::{CacheOptions, GcOptions, VmOptions};
pub use runtime::{Runtime, RuntimeId};
pub use scope::{Activation, ActivationKind, ScopeStorage, VariableScope};
pub use symbol::{Symbol, SymbolTable};
pub use task::{Task, TaskId};
pub use value::Value;

/// VM execution errors
#[derive(Debug, thiserror::Error)]
pub enum VmError {
    /// Method resolution exhausted the ancestor chain and no `method_missing` hook exists
    #[error("undefined method `{name}' for {receiver}")]
    MethodNotFound {
        /// Attempted method name
        name: String,
        /// Description of the receiver's class
        receiver: String,
    },

    /// Method was found but is not visible to the call site
    #[error("{visibility} method `{name}' called for {receiver}")]
    PrivacyViolation {
        /// Method name
        name: String,
        /// Visibility of the found method
        visibility: Visibility,
        /// Description of the receiver's class
        receiver: String,
    },

    /// Constant resolution exhausted and no `const_missing` hook exists
    #[error("uninitialized constant {0}")]
    ConstantNotFound(String),

    /// A class was reopened with a different explicit superclass
    #[error("superclass mismatch for class {name}: given {given} but previously set to {previous}")]
    SuperclassMismatch {
        /// Class being reopened
        name: String,
        /// Superclass given at the reopen site
        given: String,
        /// Superclass recorded at creation
        previous: String,
    },

    /// A superclass assignment or include would introduce a cycle
    #[error("cyclic hierarchy: {0}")]
    HierarchyCycle(String),

    /// Wrong number of arguments passed to a method
    #[error("wrong number of arguments for `{name}' (given {given}, expected {expected})")]
    ArgumentError {
        /// Method name
        name: String,
        /// Number of arguments passed
        given: usize,
        /// Accepted arity, e.g. `1..2` or `2+`
        expected: String,
    },

    /// Call depth limit exceeded
    #[error("Stack overflow")]
    StackOverflow,

    /// Type error
    #[error("Type error: {0}")]
    TypeError(String),

    /// Name error (removing an absent method or constant)
    #[error("Name error: {0}")]
    NameError(String),

    /// Attempt to mutate a frozen object
    #[error("can't modify frozen {0}")]
    FrozenError(String),

    /// Local variable access outside the scope's slots
    #[error("local variable slot {index} out of range at depth {depth}")]
    LocalOutOfRange {
        /// Lexical depth of the access
        depth: usize,
        /// Slot index
        index: usize,
    },

    /// A bytecode method was activated without an executor installed
    #[error("no executor installed for bytecode method `{0}'")]
    NoExecutor(String),

    /// Heap reference or module id that does not resolve
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// `yield` without a block
    #[error("no block given (yield)")]
    NoBlockGiven,

    /// The task has no current activation
    #[error("no active frame")]
    NoActiveFrame,

    /// Operation attempted after [`Runtime::shutdown`]
    #[error("runtime has been shut down")]
    RuntimeShutdown,
}

/// VM execution result
pub type VmResult<T> = Result<T, VmError>;
