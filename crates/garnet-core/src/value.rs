//! Value representation
//!
//! Immediates are stored inline; heap objects are referenced through
//! [`ObjectRef`] handles into the managed heap and modules by [`ModuleId`].

use crate::gc::ObjectRef;
use crate::module::ModuleId;
use crate::symbol::Symbol;

/// A VM value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Value {
    /// nil
    #[default]
    Nil,
    /// true / false
    Bool(bool),
    /// Small integer
    Fixnum(i64),
    /// Interned symbol
    Symbol(Symbol),
    /// Heap object (instance, block or tuple)
    Object(ObjectRef),
    /// Class or module
    Module(ModuleId),
}

impl Value {
    /// Whether this value is `nil`
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Ruby-style truthiness: everything except nil and false
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Integer payload, if any
    pub fn as_fixnum(&self) -> Option<i64> {
        match self {
            Value::Fixnum(n) => Some(*n),
            _ => None,
        }
    }

    /// Symbol payload, if any
    pub fn as_symbol(&self) -> Option<Symbol> {
        match self {
            Value::Symbol(s) => Some(*s),
            _ => None,
        }
    }

    /// Heap reference, if any
    pub fn as_object(&self) -> Option<ObjectRef> {
        match self {
            Value::Object(r) => Some(*r),
            _ => None,
        }
    }

    /// Module id, if any
    pub fn as_module(&self) -> Option<ModuleId> {
        match self {
            Value::Module(id) => Some(*id),
            _ => None,
        }
    }

    /// Whether the value lives inline (no heap identity)
    pub fn is_immediate(&self) -> bool {
        matches!(
            self,
            Value::Nil | Value::Bool(_) | Value::Fixnum(_) | Value::Symbol(_)
        )
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Fixnum(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Symbol> for Value {
    fn from(s: Symbol) -> Self {
        Value::Symbol(s)
    }
}
