//! Constant resolution
//!
//! Lexical lookup runs in three phases:
//!
//! 1. each enclosing lexical scope's module, innermost first, stopping at
//!    the top-level scope (so `Object` is not consulted here);
//! 2. the ancestors of the innermost module;
//! 3. `Object` itself.
//!
//! Absence is returned as [`ConstLookup::NotFound`]; the runtime decides
//! whether to call `const_missing` or raise.

use crate::lexical_scope::LexicalScope;
use crate::module::{ModuleId, ModuleRegistry};
use crate::symbol::Symbol;
use crate::value::Value;

/// Outcome of a constant lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstLookup {
    /// Constant found
    Found {
        /// Bound value
        value: Value,
        /// Module whose table held it
        module: ModuleId,
    },
    /// No binding anywhere on the search path
    NotFound,
}

impl ConstLookup {
    /// Bound value, if found
    pub fn value(&self) -> Option<Value> {
        match self {
            ConstLookup::Found { value, .. } => Some(*value),
            ConstLookup::NotFound => None,
        }
    }
}

fn probe(registry: &ModuleRegistry, module: ModuleId, name: Symbol) -> Option<ConstLookup> {
    registry
        .get(module)?
        .get_const(name)
        .map(|value| ConstLookup::Found { value, module })
}

/// Resolve `name` as written inside `scope`
pub fn resolve_constant(
    registry: &ModuleRegistry,
    scope: &LexicalScope,
    name: Symbol,
) -> ConstLookup {
    let object = registry.specials().object;

    for level in scope.iter() {
        if level.is_top_level() || level.module() == object {
            break;
        }
        if let Some(found) = probe(registry, level.module(), name) {
            return found;
        }
    }

    resolve_under(registry, scope.module(), name)
}

/// Resolve `name` on `module` and its ancestors, then `Object` (`Mod::Name`)
pub fn resolve_under(registry: &ModuleRegistry, module: ModuleId, name: Symbol) -> ConstLookup {
    let object = registry.specials().object;

    for ancestor in registry.ancestors(module) {
        if ancestor == object {
            break;
        }
        if let Some(found) = probe(registry, ancestor, name) {
            return found;
        }
    }

    probe(registry, object, name).unwrap_or(ConstLookup::NotFound)
}
