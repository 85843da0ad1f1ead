//! Lexical scope chains
//!
//! A [`LexicalScope`] records the module a piece of code was written inside,
//! linked to the scope around it. Chains are immutable and shared between
//! every method compiled in the same nesting.

use crate::module::ModuleId;
use std::sync::Arc;

/// One level of source nesting
#[derive(Debug)]
pub struct LexicalScope {
    module: ModuleId,
    parent: Option<Arc<LexicalScope>>,
    current_module: Option<ModuleId>,
}

impl LexicalScope {
    /// Outermost scope, normally for `Object`
    pub fn root(module: ModuleId) -> Arc<Self> {
        Arc::new(Self {
            module,
            parent: None,
            current_module: None,
        })
    }

    /// Nest `module` inside this scope
    pub fn push(self: &Arc<Self>, module: ModuleId) -> Arc<Self> {
        Arc::new(Self {
            module,
            parent: Some(Arc::clone(self)),
            current_module: None,
        })
    }

    /// Same nesting, but methods defined here go to `target`
    ///
    /// Used by `class_eval`-style evaluation, where constants still resolve
    /// lexically while `def` targets another module.
    pub fn with_definition_target(self: &Arc<Self>, target: ModuleId) -> Arc<Self> {
        Arc::new(Self {
            module: self.module,
            parent: self.parent.clone(),
            current_module: Some(target),
        })
    }

    /// Module of this nesting level
    pub fn module(&self) -> ModuleId {
        self.module
    }

    /// Enclosing scope
    pub fn parent(&self) -> Option<&Arc<LexicalScope>> {
        self.parent.as_ref()
    }

    /// Module receiving `def` at this point
    pub fn for_method_definition(&self) -> ModuleId {
        self.current_module.unwrap_or(self.module)
    }

    /// Whether this is the outermost scope
    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }

    /// Innermost to outermost
    pub fn iter(&self) -> impl Iterator<Item = &LexicalScope> + '_ {
        std::iter::successors(Some(self), |scope| scope.parent.as_deref())
    }

    /// Nesting depth (root is 0)
    pub fn depth(&self) -> usize {
        self.iter().count() - 1
    }
}
