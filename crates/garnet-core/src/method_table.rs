//! Per-module method tables
//!
//! Every mutator takes the [`GlobalMethodCache`] and invalidates
//! `(owner, name)` before the new entry is written, so a definition is never
//! observable while a stale cache entry for it can still be returned.

use crate::cache::GlobalMethodCache;
use crate::method::ExecutableMethod;
use crate::module::ModuleId;
use crate::symbol::Symbol;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// Method visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    /// Callable from anywhere
    #[default]
    Public,
    /// Callable from self-calls or from instances of the defining module
    Protected,
    /// Callable only as a self-call
    Private,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::Private => "private",
        })
    }
}

/// A method table slot
#[derive(Debug, Clone)]
pub enum MethodEntry {
    /// A defined method
    Defined {
        /// Method body
        method: Arc<ExecutableMethod>,
        /// Visibility at this module
        visibility: Visibility,
    },
    /// Explicit undefinition; lookup stops here and reports absence
    Undefined,
}

/// Name-to-method mapping owned by one module
#[derive(Debug)]
pub struct MethodTable {
    owner: ModuleId,
    entries: FxHashMap<Symbol, MethodEntry>,
}

impl MethodTable {
    /// Create an empty table for `owner`
    pub fn new(owner: ModuleId) -> Self {
        Self {
            owner,
            entries: FxHashMap::default(),
        }
    }

    /// Module this table belongs to
    pub fn owner(&self) -> ModuleId {
        self.owner
    }

    /// Entry for `name`
    pub fn lookup(&self, name: Symbol) -> Option<&MethodEntry> {
        self.entries.get(&name)
    }

    /// Define or redefine `name`
    pub fn store(
        &mut self,
        cache: &GlobalMethodCache,
        name: Symbol,
        method: Arc<ExecutableMethod>,
        visibility: Visibility,
    ) {
        cache.clear(self.owner, name);
        self.entries
            .insert(name, MethodEntry::Defined { method, visibility });
    }

    /// Mark `name` undefined so lookup stops at this module
    pub fn undefine(&mut self, cache: &GlobalMethodCache, name: Symbol) {
        cache.clear(self.owner, name);
        self.entries.insert(name, MethodEntry::Undefined);
    }

    /// Delete the entry for `name`, letting lookup continue to ancestors
    pub fn remove(&mut self, cache: &GlobalMethodCache, name: Symbol) -> Option<MethodEntry> {
        if !self.entries.contains_key(&name) {
            return None;
        }
        cache.clear(self.owner, name);
        self.entries.remove(&name)
    }

    /// Change the visibility of a defined method; false if `name` is not defined here
    pub fn set_visibility(
        &mut self,
        cache: &GlobalMethodCache,
        name: Symbol,
        visibility: Visibility,
    ) -> bool {
        match self.entries.get(&name) {
            Some(MethodEntry::Defined { .. }) => {}
            _ => return false,
        }
        cache.clear(self.owner, name);
        if let Some(MethodEntry::Defined { visibility: v, .. }) = self.entries.get_mut(&name) {
            *v = visibility;
        }
        true
    }

    /// Names with an entry (defined or undefined)
    pub fn names(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.entries.keys().copied()
    }

    /// Defined methods
    pub fn methods(
        &self,
    ) -> impl Iterator<Item = (Symbol, &Arc<ExecutableMethod>, Visibility)> + '_ {
        self.entries.iter().filter_map(|(name, entry)| match entry {
            MethodEntry::Defined { method, visibility } => Some((*name, method, *visibility)),
            MethodEntry::Undefined => None,
        })
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
