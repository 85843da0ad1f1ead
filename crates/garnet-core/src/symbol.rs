//! Symbol interning
//!
//! Method and constant names are interned once and compared by id afterwards.
//! The table is shared by every thread of a runtime and grows monotonically;
//! symbols are never collected.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// Interned name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

impl Symbol {
    /// Raw id of this symbol
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.0)
    }
}

#[derive(Default)]
struct Interned {
    names: Vec<Arc<str>>,
    index: FxHashMap<Arc<str>, Symbol>,
}

/// Thread-safe symbol interner
#[derive(Default)]
pub struct SymbolTable {
    inner: RwLock<Interned>,
}

impl SymbolTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `name`, returning the existing symbol if already present
    pub fn intern(&self, name: &str) -> Symbol {
        if let Some(sym) = self.inner.read().index.get(name) {
            return *sym;
        }

        let mut inner = self.inner.write();
        // Another thread may have won the race between the two locks.
        if let Some(sym) = inner.index.get(name) {
            return *sym;
        }
        let sym = Symbol(inner.names.len() as u32);
        let shared: Arc<str> = Arc::from(name);
        inner.names.push(shared.clone());
        inner.index.insert(shared, sym);
        sym
    }

    /// Look up a symbol without interning
    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        self.inner.read().index.get(name).copied()
    }

    /// Name of an interned symbol
    pub fn name(&self, sym: Symbol) -> Arc<str> {
        self.inner
            .read()
            .names
            .get(sym.0 as usize)
            .cloned()
            .unwrap_or_else(|| Arc::from("<unknown>"))
    }

    /// Number of interned symbols
    pub fn len(&self) -> usize {
        self.inner.read().names.len()
    }

    /// Whether no symbol has been interned
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
