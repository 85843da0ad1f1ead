//! Class hierarchy
//!
//! The [`ModuleRegistry`] owns every class, module and singleton class of a
//! runtime. Modules are never unloaded, so a [`ModuleId`] stays valid for the
//! lifetime of the registry.
//!
//! # Method Resolution Order
//!
//! For a class `C` the ancestor list is built by repeating, along the
//! superclass chain:
//!
//! ```text
//! C, modules included into C (last included first, each followed by
//!    the modules it includes), superclass of C, ...
//! ```
//!
//! A module that appears more than once keeps only its first position.
//!
//! Superclass assignment and inclusion are validated against the current
//! graph; a change that would introduce a cycle is rejected before anything
//! is modified.

use crate::gc::Visitor;
use crate::method::{ExecutableMethod, InstanceType, TypeInfo};
use crate::method_table::{MethodEntry, MethodTable, Visibility};
use crate::symbol::{Symbol, SymbolTable};
use crate::value::Value;
use crate::{VmError, VmResult};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

/// Identifier of a class or module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ModuleId(u32);

impl ModuleId {
    /// Create from a raw index
    pub const fn new(index: u32) -> Self {
        ModuleId(index)
    }

    /// Raw index
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// What a module is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// Mixin; may be included, cannot be instantiated
    Module,
    /// Instantiable class with a superclass
    Class,
    /// Per-object class (including metaclasses)
    Singleton,
}

/// A class, module or singleton class
#[derive(Debug)]
pub struct Module {
    /// Registry id
    pub id: ModuleId,

    /// Constant name; `None` for anonymous modules and singletons
    pub name: Option<Symbol>,

    /// Kind of module
    pub kind: ModuleKind,

    /// Module this one was defined under
    pub lexical_parent: Option<ModuleId>,

    /// Superclass (classes and singletons only)
    pub superclass: Option<ModuleId>,

    /// Included modules in inclusion order
    pub includes: Vec<ModuleId>,

    /// Method table
    pub methods: MethodTable,

    /// Constant table
    pub constants: FxHashMap<Symbol, Value>,

    /// Singleton class (metaclass) of this module
    pub singleton: Option<ModuleId>,

    /// For singleton classes: the object it belongs to. Not traced.
    pub attached: Option<Value>,

    /// Representation of instances
    pub instance_type: InstanceType,
}

impl Module {
    /// Classes and singleton classes
    pub fn is_class(&self) -> bool {
        matches!(self.kind, ModuleKind::Class | ModuleKind::Singleton)
    }

    /// Singleton classes only
    pub fn is_singleton(&self) -> bool {
        self.kind == ModuleKind::Singleton
    }

    /// Constant defined directly on this module
    pub fn get_const(&self, name: Symbol) -> Option<Value> {
        self.constants.get(&name).copied()
    }
}

/// Bootstrap classes every runtime has
#[derive(Debug, Clone, Copy)]
pub struct SpecialClasses {
    /// Root of the class hierarchy
    pub object: ModuleId,
    /// Class of modules
    pub module: ModuleId,
    /// Class of classes
    pub class: ModuleId,
    /// Class of nil
    pub nil: ModuleId,
    /// Class of true
    pub true_class: ModuleId,
    /// Class of false
    pub false_class: ModuleId,
    /// Class of fixnums
    pub integer: ModuleId,
    /// Class of symbols
    pub symbol: ModuleId,
    /// Class of blocks
    pub proc: ModuleId,
    /// Class of tuples
    pub tuple: ModuleId,
}

/// Outcome of a method table walk
#[derive(Debug, Clone)]
pub enum Lookup {
    /// First definition along the ancestors
    Found {
        /// Method body
        method: Arc<ExecutableMethod>,
        /// Module whose table held it
        module: ModuleId,
        /// Visibility at that module
        visibility: Visibility,
    },
    /// An undefined marker ended the walk
    Undefined,
    /// No module in the chain has an entry
    Absent,
}

/// Owner of every module of a runtime
#[derive(Debug)]
pub struct ModuleRegistry {
    modules: Vec<Module>,
    specials: SpecialClasses,
    next_type: u32,
}

impl ModuleRegistry {
    /// Build the bootstrap hierarchy and bind its constants on `Object`
    pub fn bootstrap(symbols: &SymbolTable) -> Self {
        let mut registry = Self {
            modules: Vec::new(),
            specials: SpecialClasses {
                object: ModuleId(0),
                module: ModuleId(0),
                class: ModuleId(0),
                nil: ModuleId(0),
                true_class: ModuleId(0),
                false_class: ModuleId(0),
                integer: ModuleId(0),
                symbol: ModuleId(0),
                proc: ModuleId(0),
                tuple: ModuleId(0),
            },
            next_type: 0,
        };

        let object = registry.push(Some(symbols.intern("Object")), ModuleKind::Class, None, None);
        let mut boot = |name: &str, superclass: ModuleId| {
            registry.push(
                Some(symbols.intern(name)),
                ModuleKind::Class,
                Some(superclass),
                Some(object),
            )
        };
        let module = boot("Module", object);
        let class = boot("Class", module);
        let nil = boot("NilClass", object);
        let true_class = boot("TrueClass", object);
        let false_class = boot("FalseClass", object);
        let integer = boot("Integer", object);
        let symbol = boot("Symbol", object);
        let proc = boot("Proc", object);
        let tuple = boot("Tuple", object);

        registry.specials = SpecialClasses {
            object,
            module,
            class,
            nil,
            true_class,
            false_class,
            integer,
            symbol,
            proc,
            tuple,
        };

        for id in [
            object, module, class, nil, true_class, false_class, integer, symbol, proc, tuple,
        ] {
            if let Some(name) = registry.modules[id.0 as usize].name {
                registry.modules[object.0 as usize]
                    .constants
                    .insert(name, Value::Module(id));
            }
        }
        registry
    }

    fn push(
        &mut self,
        name: Option<Symbol>,
        kind: ModuleKind,
        superclass: Option<ModuleId>,
        lexical_parent: Option<ModuleId>,
    ) -> ModuleId {
        let id = ModuleId(self.modules.len() as u32);
        let instance_type = InstanceType(self.next_type);
        self.next_type += 1;
        self.modules.push(Module {
            id,
            name,
            kind,
            lexical_parent,
            superclass,
            includes: Vec::new(),
            methods: MethodTable::new(id),
            constants: FxHashMap::default(),
            singleton: None,
            attached: None,
            instance_type,
        });
        id
    }

    /// Bootstrap classes
    pub fn specials(&self) -> &SpecialClasses {
        &self.specials
    }

    /// Module by id
    pub fn get(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(id.0 as usize)
    }

    /// Module by id, or `InvalidReference`
    pub fn module(&self, id: ModuleId) -> VmResult<&Module> {
        self.get(id)
            .ok_or_else(|| VmError::InvalidReference(format!("module {}", id.0)))
    }

    /// Mutable module by id, or `InvalidReference`
    pub fn module_mut(&mut self, id: ModuleId) -> VmResult<&mut Module> {
        self.modules
            .get_mut(id.0 as usize)
            .ok_or_else(|| VmError::InvalidReference(format!("module {}", id.0)))
    }

    /// Number of modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Always false after bootstrap
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Create a class under `lexical_parent` inheriting from `superclass`
    pub fn create_class(
        &mut self,
        name: Option<Symbol>,
        superclass: ModuleId,
        lexical_parent: Option<ModuleId>,
    ) -> VmResult<ModuleId> {
        if !self.module(superclass)?.is_class() {
            return Err(VmError::TypeError(
                "superclass must be a Class".to_string(),
            ));
        }
        let id = self.push(name, ModuleKind::Class, Some(superclass), lexical_parent);
        tracing::debug!(id = id.0, superclass = superclass.0, "class created");
        Ok(id)
    }

    /// Create a mixin module under `lexical_parent`
    pub fn create_module(
        &mut self,
        name: Option<Symbol>,
        lexical_parent: Option<ModuleId>,
    ) -> ModuleId {
        let id = self.push(name, ModuleKind::Module, None, lexical_parent);
        tracing::debug!(id = id.0, "module created");
        id
    }

    /// Reassign the superclass of `class`, rejecting cycles
    ///
    /// An existing metaclass of `class` is re-linked to the metaclass of the
    /// new superclass so class-level methods follow the new chain.
    pub fn set_superclass(&mut self, class: ModuleId, superclass: ModuleId) -> VmResult<()> {
        if !self.module(class)?.is_class() || !self.module(superclass)?.is_class() {
            return Err(VmError::TypeError(
                "superclass must be a Class".to_string(),
            ));
        }
        let mut current = Some(superclass);
        while let Some(c) = current {
            if c == class {
                return Err(VmError::HierarchyCycle(format!(
                    "{} would become its own ancestor",
                    class.0
                )));
            }
            current = self.module(c)?.superclass;
        }
        self.module_mut(class)?.superclass = Some(superclass);
        let meta = self.module(class)?.singleton;
        if let Some(meta) = meta {
            let super_meta = self.module_singleton(superclass)?;
            self.module_mut(meta)?.superclass = Some(super_meta);
        }
        Ok(())
    }

    /// Include `module` into `target`
    ///
    /// Returns false when `module` is already directly included.
    pub fn include_module(&mut self, target: ModuleId, module: ModuleId) -> VmResult<bool> {
        if self.module(module)?.kind != ModuleKind::Module {
            return Err(VmError::TypeError(
                "wrong argument type Class (expected Module)".to_string(),
            ));
        }
        if module == target || self.module_ancestors(module).contains(&target) {
            return Err(VmError::HierarchyCycle(format!(
                "including module {} into {} is cyclic",
                module.0, target.0
            )));
        }
        let includes = &mut self.module_mut(target)?.includes;
        if includes.contains(&module) {
            return Ok(false);
        }
        includes.push(module);
        Ok(true)
    }

    /// Method resolution order starting at `id`
    pub fn ancestors(&self, id: ModuleId) -> Vec<ModuleId> {
        let mut out = Vec::new();
        let mut seen = FxHashSet::default();
        let mut current = Some(id);
        while let Some(c) = current {
            let Some(module) = self.get(c) else { break };
            if seen.insert(c) {
                out.push(c);
            }
            for included in module.includes.iter().rev() {
                self.push_module_ancestors(*included, &mut out, &mut seen);
            }
            current = module.superclass;
        }
        out
    }

    fn module_ancestors(&self, id: ModuleId) -> Vec<ModuleId> {
        let mut out = Vec::new();
        let mut seen = FxHashSet::default();
        self.push_module_ancestors(id, &mut out, &mut seen);
        out
    }

    fn push_module_ancestors(
        &self,
        id: ModuleId,
        out: &mut Vec<ModuleId>,
        seen: &mut FxHashSet<ModuleId>,
    ) {
        if !seen.insert(id) {
            return;
        }
        out.push(id);
        if let Some(module) = self.get(id) {
            for included in module.includes.iter().rev() {
                self.push_module_ancestors(*included, out, seen);
            }
        }
    }

    /// Whether `module` appears among the ancestors of `class`
    pub fn is_kind_of(&self, class: ModuleId, module: ModuleId) -> bool {
        self.ancestors(class).contains(&module)
    }

    /// Walk the ancestors of `class` for `name`
    pub fn find_method(&self, class: ModuleId, name: Symbol) -> Lookup {
        self.find_in(self.ancestors(class).into_iter(), name)
    }

    /// Walk the ancestors of `class` that come after `after` (for `super`)
    pub fn find_method_after(&self, class: ModuleId, after: ModuleId, name: Symbol) -> Lookup {
        let chain = self.ancestors(class);
        let start = chain
            .iter()
            .position(|m| *m == after)
            .map(|p| p + 1)
            .unwrap_or(chain.len());
        self.find_in(chain.into_iter().skip(start), name)
    }

    fn find_in(&self, chain: impl Iterator<Item = ModuleId>, name: Symbol) -> Lookup {
        for id in chain {
            let Some(module) = self.get(id) else { continue };
            match module.methods.lookup(name) {
                Some(MethodEntry::Defined { method, visibility }) => {
                    return Lookup::Found {
                        method: Arc::clone(method),
                        module: id,
                        visibility: *visibility,
                    };
                }
                Some(MethodEntry::Undefined) => return Lookup::Undefined,
                None => {}
            }
        }
        Lookup::Absent
    }

    /// Singleton class of a module, creating it (and its superclass's) on demand
    pub fn module_singleton(&mut self, id: ModuleId) -> VmResult<ModuleId> {
        let module = self.module(id)?;
        if let Some(existing) = module.singleton {
            return Ok(existing);
        }
        let (kind, superclass) = (module.kind, module.superclass);
        let super_meta = match (kind, superclass) {
            (ModuleKind::Class, Some(sup)) => self.module_singleton(sup)?,
            (ModuleKind::Module, _) => self.specials.module,
            _ => self.specials.class,
        };
        let meta = self.push(None, ModuleKind::Singleton, Some(super_meta), None);
        let entry = self.module_mut(meta)?;
        entry.attached = Some(Value::Module(id));
        self.module_mut(id)?.singleton = Some(meta);
        tracing::debug!(module = id.0, meta = meta.0, "metaclass created");
        Ok(meta)
    }

    /// Create a singleton class for an object whose class is `class`
    pub fn object_singleton(&mut self, attached: Value, class: ModuleId) -> VmResult<ModuleId> {
        let instance_type = self.module(class)?.instance_type;
        let meta = self.push(None, ModuleKind::Singleton, Some(class), None);
        let entry = self.module_mut(meta)?;
        entry.attached = Some(attached);
        entry.instance_type = instance_type;
        Ok(meta)
    }

    /// Class-level view of a module for specializers
    pub fn type_info(&self, class: ModuleId, symbols: &SymbolTable) -> VmResult<TypeInfo> {
        Ok(TypeInfo {
            class,
            instance_type: self.module(class)?.instance_type,
            class_name: self.qualified_name(class, symbols),
        })
    }

    /// Display name, qualified by lexical parents (`A::B`)
    pub fn qualified_name(&self, id: ModuleId, symbols: &SymbolTable) -> String {
        let Some(module) = self.get(id) else {
            return format!("#<invalid module {}>", id.0);
        };
        if module.is_singleton() {
            return match module.attached {
                Some(Value::Module(m)) => format!("#<Class:{}>", self.qualified_name(m, symbols)),
                _ => match module.superclass {
                    Some(sup) => format!("#<Class:#<{}>>", self.qualified_name(sup, symbols)),
                    None => "#<Class:?>".to_string(),
                },
            };
        }
        let Some(name) = module.name else {
            return match module.kind {
                ModuleKind::Module => format!("#<Module:{}>", id.0),
                _ => format!("#<Class:{}>", id.0),
            };
        };
        match module.lexical_parent {
            Some(parent) if parent != self.specials.object => {
                format!("{}::{}", self.qualified_name(parent, symbols), symbols.name(name))
            }
            _ => symbols.name(name).to_string(),
        }
    }

    /// Reopen or create class `name` under `under`
    ///
    /// Returns the class and whether it was newly created.
    pub fn open_class(
        &mut self,
        under: ModuleId,
        name: Symbol,
        superclass: Option<ModuleId>,
        symbols: &SymbolTable,
    ) -> VmResult<(ModuleId, bool)> {
        if let Some(existing) = self.module(under)?.get_const(name) {
            let Value::Module(id) = existing else {
                return Err(VmError::TypeError(format!("{} is not a class", symbols.name(name))));
            };
            let module = self.module(id)?;
            if module.kind != ModuleKind::Class {
                return Err(VmError::TypeError(format!("{} is not a class", symbols.name(name))));
            }
            if let Some(given) = superclass {
                if module.superclass != Some(given) {
                    let previous = module
                        .superclass
                        .map(|s| self.qualified_name(s, symbols))
                        .unwrap_or_else(|| "nil".to_string());
                    return Err(VmError::SuperclassMismatch {
                        name: self.qualified_name(id, symbols),
                        given: self.qualified_name(given, symbols),
                        previous,
                    });
                }
            }
            return Ok((id, false));
        }

        let superclass = superclass.unwrap_or(self.specials.object);
        let id = self.create_class(Some(name), superclass, Some(under))?;
        self.module_mut(under)?.constants.insert(name, Value::Module(id));
        Ok((id, true))
    }

    /// Reopen or create module `name` under `under`
    pub fn open_module(
        &mut self,
        under: ModuleId,
        name: Symbol,
        symbols: &SymbolTable,
    ) -> VmResult<(ModuleId, bool)> {
        if let Some(existing) = self.module(under)?.get_const(name) {
            return match existing {
                Value::Module(id) if self.module(id)?.kind == ModuleKind::Module => Ok((id, false)),
                _ => Err(VmError::TypeError(format!("{} is not a module", symbols.name(name)))),
            };
        }
        let id = self.create_module(Some(name), Some(under));
        self.module_mut(under)?.constants.insert(name, Value::Module(id));
        Ok((id, true))
    }

    /// Yield constants and method literals to the collector
    pub fn trace_roots(&self, visitor: &mut dyn Visitor) {
        for module in &self.modules {
            for value in module.constants.values() {
                visitor.visit_value(value);
            }
            for (_, method, _) in module.methods.methods() {
                method.trace_literals(visitor);
            }
        }
    }
}
