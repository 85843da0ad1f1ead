//! GC root tracking
//!
//! Embedder-registered roots. Task frames and the module registry are passed
//! to each collection separately.

use crate::value::Value;

/// Global roots registered by the embedder
#[derive(Debug, Default)]
pub struct RootSet {
    global_roots: Vec<Value>,
}

impl RootSet {
    /// Create an empty root set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a global root. Immediates are ignored.
    pub fn add_global_root(&mut self, value: Value) {
        if !value.is_immediate() {
            self.global_roots.push(value);
        }
    }

    /// Remove one registration of `value`, returning whether it was present
    pub fn remove_global_root(&mut self, value: Value) -> bool {
        match self.global_roots.iter().position(|v| *v == value) {
            Some(pos) => {
                self.global_roots.swap_remove(pos);
                true
            }
            None => false,
        }
    }

    /// Iterate over all roots
    pub fn iter(&self) -> impl Iterator<Item = &Value> + '_ {
        self.global_roots.iter()
    }

    /// Get total number of roots
    pub fn len(&self) -> usize {
        self.global_roots.len()
    }

    /// Check if there are no roots
    pub fn is_empty(&self) -> bool {
        self.global_roots.is_empty()
    }
}
