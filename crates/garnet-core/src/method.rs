//! Executable methods
//!
//! An [`ExecutableMethod`] is produced by the compiler (or written natively
//! in Rust), installed into a module by [`crate::Runtime::install`], and
//! immutable from then on apart from its specialization table. Redefinition
//! installs a new method with a newer serial; the old one lives on only
//! while a cache entry or an activation still holds it.
//!
//! # Lifecycle
//!
//! ```text
//!   compiler ──► ExecutableMethod (serial 0, no scope)
//!                      │ install(module, name, scope)
//!                      ▼
//!              formalized: scope + serial, stored in MethodTable
//!                      │ module is a class
//!                      ▼
//!              specialize(TypeInfo)  ── failure is logged, not fatal
//!                      │
//!                      ▼
//!              activate() on each dispatch
//! ```

use crate::context::CallContext;
use crate::gc::Visitor;
use crate::lexical_scope::LexicalScope;
use crate::module::ModuleId;
use crate::symbol::Symbol;
use crate::value::Value;
use crate::VmResult;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// Argument shape of a method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Arity {
    /// Required positional arguments
    pub required: usize,

    /// Optional positional arguments (default to nil)
    pub optional: usize,

    /// Extra arguments are collected into a tuple
    pub splat: bool,
}

impl Arity {
    /// Exactly `n` arguments
    pub const fn fixed(n: usize) -> Self {
        Self {
            required: n,
            optional: 0,
            splat: false,
        }
    }

    /// General arity
    pub const fn new(required: usize, optional: usize, splat: bool) -> Self {
        Self {
            required,
            optional,
            splat,
        }
    }

    /// Whether `given` positional arguments are acceptable
    pub fn accepts(&self, given: usize) -> bool {
        given >= self.required && (self.splat || given <= self.required + self.optional)
    }

    /// Local slots consumed by arguments
    pub fn slots(&self) -> usize {
        self.required + self.optional + usize::from(self.splat)
    }

    /// Human readable form for error messages
    pub fn describe(&self) -> String {
        if self.splat {
            format!("{}+", self.required)
        } else if self.optional > 0 {
            format!("{}..{}", self.required, self.required + self.optional)
        } else {
            self.required.to_string()
        }
    }
}

/// Representation id of instances of a class, used to key specializations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceType(pub u32);

/// What a specializer learns about the class a method was installed on
#[derive(Debug, Clone)]
pub struct TypeInfo {
    /// Class receiving the method
    pub class: ModuleId,

    /// Representation of its instances
    pub instance_type: InstanceType,

    /// Display name of the class
    pub class_name: String,
}

/// Opaque bytecode, executed by an [`Executor`]
#[derive(Debug, Clone)]
pub struct InstructionSequence {
    code: Arc<[u8]>,
}

impl InstructionSequence {
    /// Wrap compiled bytes
    pub fn new(code: impl Into<Arc<[u8]>>) -> Self {
        Self { code: code.into() }
    }

    /// Raw bytes
    pub fn bytes(&self) -> &[u8] {
        &self.code
    }
}

/// Signature of a native method body
pub type NativeFn = dyn Fn(&mut CallContext<'_>) -> VmResult<Value> + Send + Sync;

/// Generic body of a method
#[derive(Clone)]
pub enum MethodBody {
    /// Rust closure
    Native(Arc<NativeFn>),
    /// Bytecode for the external interpreter
    Bytecode(InstructionSequence),
}

/// Interpreter backend for bytecode bodies
pub trait Executor: Send + Sync {
    /// Run `code` in the activation prepared behind `ctx`
    fn execute(
        &self,
        method: &ExecutableMethod,
        code: &InstructionSequence,
        ctx: &mut CallContext<'_>,
    ) -> VmResult<Value>;
}

/// Backend-tuned form of a method for one receiver representation
pub trait SpecializedCode: Send + Sync {
    /// Run in the activation prepared behind `ctx`
    fn invoke(&self, ctx: &mut CallContext<'_>) -> VmResult<Value>;
}

/// Produces specialized code at install time
pub trait Specializer: Send + Sync {
    /// Specialize `method` for instances described by `info`
    fn specialize(
        &self,
        method: &ExecutableMethod,
        info: &TypeInfo,
    ) -> Result<Arc<dyn SpecializedCode>, SpecializationError>;
}

/// Non-fatal specialization failure; the generic body stays valid
#[derive(Debug, thiserror::Error)]
pub enum SpecializationError {
    /// The backend does not handle this method shape
    #[error("unsupported method shape: {0}")]
    Unsupported(String),

    /// The backend failed while compiling
    #[error("backend failure: {0}")]
    Backend(String),
}

/// A callable body plus its metadata
pub struct ExecutableMethod {
    name: Symbol,
    arity: Arity,
    locals_count: usize,
    literals: Vec<Value>,
    body: MethodBody,
    lexical_scope: Option<Arc<LexicalScope>>,
    serial: u64,
    specializations: RwLock<FxHashMap<InstanceType, Arc<dyn SpecializedCode>>>,
}

impl ExecutableMethod {
    /// Native method backed by a Rust closure
    pub fn native<F>(name: Symbol, arity: Arity, body: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> VmResult<Value> + Send + Sync + 'static,
    {
        Self::with_body(name, arity, MethodBody::Native(Arc::new(body)))
    }

    /// Bytecode method
    pub fn bytecode(name: Symbol, arity: Arity, code: InstructionSequence) -> Self {
        Self::with_body(name, arity, MethodBody::Bytecode(code))
    }

    fn with_body(name: Symbol, arity: Arity, body: MethodBody) -> Self {
        Self {
            name,
            arity,
            locals_count: arity.slots(),
            literals: Vec::new(),
            body,
            lexical_scope: None,
            serial: 0,
            specializations: RwLock::new(FxHashMap::default()),
        }
    }

    /// Reserve `count` local slots (never fewer than the arguments need)
    pub fn with_locals(mut self, count: usize) -> Self {
        self.locals_count = count.max(self.arity.slots());
        self
    }

    /// Attach a literal pool
    pub fn with_literals(mut self, literals: Vec<Value>) -> Self {
        self.literals = literals;
        self
    }

    /// Bind the defining lexical scope and stamp a serial
    pub(crate) fn formalize(mut self, scope: Arc<LexicalScope>, serial: u64) -> Self {
        self.lexical_scope = Some(scope);
        self.serial = serial;
        self
    }

    /// Method name as compiled
    pub fn name(&self) -> Symbol {
        self.name
    }

    /// Argument shape
    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// Local slots in an activation
    pub fn locals_count(&self) -> usize {
        self.locals_count
    }

    /// Literal pool
    pub fn literals(&self) -> &[Value] {
        &self.literals
    }

    /// Generic body
    pub fn body(&self) -> &MethodBody {
        &self.body
    }

    /// Scope the method was defined in; `None` before install
    pub fn lexical_scope(&self) -> Option<&Arc<LexicalScope>> {
        self.lexical_scope.as_ref()
    }

    /// Install serial; zero before install
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Whether the method has been installed
    pub fn is_installed(&self) -> bool {
        self.serial != 0
    }

    /// Ask `specializer` for a tuned form for `info.instance_type`
    pub fn specialize(
        &self,
        specializer: &dyn Specializer,
        info: &TypeInfo,
    ) -> Result<(), SpecializationError> {
        let code = specializer.specialize(self, info)?;
        self.specializations.write().insert(info.instance_type, code);
        Ok(())
    }

    /// Specialized form for receivers of `instance_type`, if one exists
    pub fn specialized_for(&self, instance_type: InstanceType) -> Option<Arc<dyn SpecializedCode>> {
        self.specializations.read().get(&instance_type).cloned()
    }

    /// Number of specialized forms
    pub fn specialization_count(&self) -> usize {
        self.specializations.read().len()
    }

    /// Yield literal pool references to the collector
    pub fn trace_literals(&self, visitor: &mut dyn Visitor) {
        visitor.visit_values(&self.literals);
    }
}

impl fmt::Debug for ExecutableMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.body {
            MethodBody::Native(_) => "native",
            MethodBody::Bytecode(_) => "bytecode",
        };
        f.debug_struct("ExecutableMethod")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("locals_count", &self.locals_count)
            .field("serial", &self.serial)
            .field("body", &kind)
            .finish()
    }
}
