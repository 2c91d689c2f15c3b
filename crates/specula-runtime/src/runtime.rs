//! The object runtime
//!
//! `Runtime` owns the module/object arena and implements the language-level
//! operations on it: naming, constants with autoload, variables, method
//! tables, singleton classes, ancestor linearization and dynamic dispatch.
//!
//! Dispatch (`send`) honours whatever the program defined, including
//! overrides and `undef` of the core introspection natives. Tools that must
//! not be fooled by that go through the pristine natives captured at
//! bootstrap instead (see [`Runtime::pristine_method`]).

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet, FxHasher};

use crate::class_registry::ClassRegistry;
use crate::natives;
use crate::error::{RtResult, RuntimeError};
use crate::module::{
    AutoloadHook, ConstEntry, MethodBody, MethodEntry, ModuleKind, RModule, RObject, Visibility,
};
use crate::value::{MethodRef, ModuleId, ObjectId, SourceLocation, Value};

/// Namespace separator in qualified names
pub const NAMESPACE_SEPARATOR: &str = "::";

const MODULE_ADDRESS_BASE: u64 = 0x0000_7f3a_1c00_0000;
const OBJECT_ADDRESS_BASE: u64 = 0x0000_7f3a_4e00_0000;
const SLOT_SIZE: u64 = 0x28;

/// Handles of the types created at bootstrap
#[derive(Debug, Clone, Copy)]
pub struct CoreTypes {
    /// Root of the class hierarchy
    pub basic_object: ModuleId,
    /// Default superclass, top-level namespace
    pub object: ModuleId,
    /// Class of every module
    pub module: ModuleId,
    /// Class of every class
    pub class: ModuleId,
    /// Mixed into `Object`
    pub kernel: ModuleId,
    /// Mixed into `Integer` and `String`
    pub comparable: ModuleId,
    /// Integers
    pub integer: ModuleId,
    /// Strings
    pub string: ModuleId,
    /// Symbols
    pub symbol: ModuleId,
    /// Arrays
    pub array: ModuleId,
    /// Class of `nil`
    pub nil_class: ModuleId,
    /// Class of `true`
    pub true_class: ModuleId,
    /// Class of `false`
    pub false_class: ModuleId,
    /// Class of unbound method values
    pub unbound_method: ModuleId,
}

impl CoreTypes {
    fn named(&self) -> [(&'static str, ModuleId); 14] {
        [
            ("BasicObject", self.basic_object),
            ("Object", self.object),
            ("Module", self.module),
            ("Class", self.class),
            ("Kernel", self.kernel),
            ("Comparable", self.comparable),
            ("Integer", self.integer),
            ("String", self.string),
            ("Symbol", self.symbol),
            ("Array", self.array),
            ("NilClass", self.nil_class),
            ("TrueClass", self.true_class),
            ("FalseClass", self.false_class),
            ("UnboundMethod", self.unbound_method),
        ]
    }
}

/// The object runtime
#[derive(Debug)]
pub struct Runtime {
    classes: ClassRegistry,
    core: CoreTypes,
    /// Core natives as installed at bootstrap, keyed by (owner, name)
    pristine: FxHashMap<(ModuleId, String), MethodEntry>,
    /// Autoloads currently running, to stop recursive loads
    loading: FxHashSet<(ModuleId, String)>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Create a runtime with the core types bootstrapped
    pub fn new() -> Self {
        let mut classes = ClassRegistry::new();
        let basic_object = classes.register_module(ModuleKind::Class { superclass: None });
        let object = classes.register_module(ModuleKind::Class {
            superclass: Some(basic_object),
        });
        let module = classes.register_module(ModuleKind::Class {
            superclass: Some(object),
        });
        let class = classes.register_module(ModuleKind::Class {
            superclass: Some(module),
        });
        let kernel = classes.register_module(ModuleKind::Module);
        let comparable = classes.register_module(ModuleKind::Module);
        let mut subclass_of_object = || {
            classes.register_module(ModuleKind::Class {
                superclass: Some(object),
            })
        };
        let integer = subclass_of_object();
        let string = subclass_of_object();
        let symbol = subclass_of_object();
        let array = subclass_of_object();
        let nil_class = subclass_of_object();
        let true_class = subclass_of_object();
        let false_class = subclass_of_object();
        let unbound_method = subclass_of_object();

        let core = CoreTypes {
            basic_object,
            object,
            module,
            class,
            kernel,
            comparable,
            integer,
            string,
            symbol,
            array,
            nil_class,
            true_class,
            false_class,
            unbound_method,
        };

        for (target, mixin) in [(object, kernel), (integer, comparable), (string, comparable)] {
            if let Some(m) = classes.get_mut(target) {
                m.includes.insert(0, mixin);
            }
        }

        let mut rt = Self {
            classes,
            core,
            pristine: FxHashMap::default(),
            loading: FxHashSet::default(),
        };

        for (name, id) in core.named() {
            rt.bind_core_name(name, id);
        }
        natives::install(&mut rt);
        rt.capture_pristine();
        rt
    }

    fn bind_core_name(&mut self, name: &str, id: ModuleId) {
        if let Some(m) = self.classes.get_mut(id) {
            m.name = Some(name.to_string());
        }
        self.classes.register_name(name.to_string(), id);
        if let Some(object) = self.classes.get_mut(self.core.object) {
            object
                .constants
                .insert(name, ConstEntry::Value(Value::Module(id)));
        }
    }

    fn capture_pristine(&mut self) {
        for (_, id) in self.core.named() {
            if let Some(m) = self.classes.get(id) {
                for (name, entry) in m.methods.iter() {
                    self.pristine.insert((id, name.to_string()), entry.clone());
                }
            }
        }
    }

    // ========================================================================
    // Arena access
    // ========================================================================

    /// Core type handles
    pub fn core(&self) -> &CoreTypes {
        &self.core
    }

    /// The arena
    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    /// Get a module by handle
    pub fn module(&self, id: ModuleId) -> RtResult<&RModule> {
        self.classes
            .get(id)
            .ok_or_else(|| RuntimeError::TypeError(format!("unknown module handle {}", id.index())))
    }

    fn module_mut(&mut self, id: ModuleId) -> RtResult<&mut RModule> {
        self.classes
            .get_mut(id)
            .ok_or_else(|| RuntimeError::TypeError(format!("unknown module handle {}", id.index())))
    }

    /// Get an object by handle
    pub fn object(&self, id: ObjectId) -> RtResult<&RObject> {
        self.classes
            .object(id)
            .ok_or_else(|| RuntimeError::TypeError(format!("unknown object handle {}", id.index())))
    }

    fn object_mut(&mut self, id: ObjectId) -> RtResult<&mut RObject> {
        self.classes
            .object_mut(id)
            .ok_or_else(|| RuntimeError::TypeError(format!("unknown object handle {}", id.index())))
    }

    /// Look up a named module by its qualified name
    ///
    /// The name must still be bound along its whole path from `Object`.
    pub fn lookup(&self, qualified_name: &str) -> Option<ModuleId> {
        let id = self.classes.get_by_name(qualified_name)?;
        let mut namespace = self.core.object;
        for segment in qualified_name.split(NAMESPACE_SEPARATOR) {
            match self.classes.get(namespace)?.constants.get(segment)? {
                ConstEntry::Value(Value::Module(next)) => namespace = *next,
                _ => return None,
            }
        }
        (namespace == id).then_some(id)
    }

    /// Every module and class currently in the arena, singleton classes included
    pub fn live_modules(&self) -> Vec<ModuleId> {
        self.classes.iter().map(RModule::id).collect()
    }

    // ========================================================================
    // Definition
    // ========================================================================

    /// Create an anonymous class
    pub fn new_class(&mut self, superclass: ModuleId) -> RtResult<ModuleId> {
        let parent = self.module(superclass)?;
        if !parent.is_class() {
            return Err(RuntimeError::TypeError(format!(
                "superclass must be a Class ({} given)",
                self.display_module(superclass)
            )));
        }
        if parent.is_singleton() {
            return Err(RuntimeError::TypeError(
                "can't make subclass of singleton class".to_string(),
            ));
        }
        Ok(self.classes.register_module(ModuleKind::Class {
            superclass: Some(superclass),
        }))
    }

    /// Create an anonymous module
    pub fn new_module(&mut self) -> ModuleId {
        self.classes.register_module(ModuleKind::Module)
    }

    /// Define (or reopen) a class bound to `namespace::name`
    ///
    /// `superclass` defaults to `Object` for new classes. When reopening,
    /// a given superclass must match the existing one.
    pub fn define_class(
        &mut self,
        namespace: ModuleId,
        name: &str,
        superclass: Option<ModuleId>,
    ) -> RtResult<ModuleId> {
        if let Some(existing) = self.own_module_constant(namespace, name)? {
            let m = self.module(existing)?;
            if !m.is_class() {
                return Err(RuntimeError::TypeError(format!("{} is not a class", name)));
            }
            if let Some(expected) = superclass {
                if m.superclass() != Some(expected) {
                    return Err(RuntimeError::TypeError(format!(
                        "superclass mismatch for class {}",
                        name
                    )));
                }
            }
            return Ok(existing);
        }
        let id = self.new_class(superclass.unwrap_or(self.core.object))?;
        self.const_set(namespace, name, Value::Module(id))?;
        Ok(id)
    }

    /// Define (or reopen) a module bound to `namespace::name`
    pub fn define_module(&mut self, namespace: ModuleId, name: &str) -> RtResult<ModuleId> {
        if let Some(existing) = self.own_module_constant(namespace, name)? {
            if self.module(existing)?.is_class() {
                return Err(RuntimeError::TypeError(format!("{} is not a module", name)));
            }
            return Ok(existing);
        }
        let id = self.new_module();
        self.const_set(namespace, name, Value::Module(id))?;
        Ok(id)
    }

    fn own_module_constant(&self, namespace: ModuleId, name: &str) -> RtResult<Option<ModuleId>> {
        Ok(match self.module(namespace)?.constants.get(name) {
            Some(ConstEntry::Value(Value::Module(id))) => Some(*id),
            Some(ConstEntry::Value(_)) => {
                return Err(RuntimeError::TypeError(format!(
                    "{} is not a class/module",
                    name
                )))
            }
            _ => None,
        })
    }

    /// Mix `mixin` into `target`
    ///
    /// Including a module that is already an ancestor is a no-op.
    pub fn include_module(&mut self, target: ModuleId, mixin: ModuleId) -> RtResult<()> {
        if self.module(mixin)?.is_class() {
            return Err(RuntimeError::TypeError(format!(
                "wrong argument type Class (expected Module): {}",
                self.display_module(mixin)
            )));
        }
        if self.ancestors(mixin)?.contains(&target) {
            return Err(RuntimeError::ArgumentError("cyclic include detected".to_string()));
        }
        if self.ancestors(target)?.contains(&mixin) {
            return Ok(());
        }
        self.module_mut(target)?.includes.insert(0, mixin);
        Ok(())
    }

    // ========================================================================
    // Constants
    // ========================================================================

    /// Bind a constant; binding an unnamed module names it
    pub fn const_set(&mut self, namespace: ModuleId, name: &str, value: Value) -> RtResult<()> {
        self.check_constant_name(namespace, name)?;
        if let Value::Module(id) = &value {
            self.assign_name(namespace, name, *id)?;
        }
        self.module_mut(namespace)?
            .constants
            .insert(name, ConstEntry::Value(value));
        Ok(())
    }

    fn assign_name(&mut self, namespace: ModuleId, name: &str, id: ModuleId) -> RtResult<()> {
        let target = self.module(id)?;
        if target.is_singleton() {
            return Ok(());
        }
        let unnamed = target.name.is_none();
        let qualified = self.qualify(namespace, name);
        if target.has_permanent_name() {
            // Rebinding under the original path makes it resolvable again
            if target.name() == Some(qualified.as_str()) {
                self.classes.register_name(qualified, id);
            }
            return Ok(());
        }
        if namespace == self.core.object || self.module(namespace)?.has_permanent_name() {
            return self.name_permanently(id, qualified);
        }
        if unnamed {
            let m = self.module_mut(id)?;
            m.name = Some(qualified);
            m.temporary_name = true;
        }
        Ok(())
    }

    fn qualify(&self, namespace: ModuleId, name: &str) -> String {
        if namespace == self.core.object {
            return name.to_string();
        }
        format!("{}{}{}", self.display_module(namespace), NAMESPACE_SEPARATOR, name)
    }

    /// Fix the name of `id` and of the unnamed modules bound beneath it
    fn name_permanently(&mut self, id: ModuleId, qualified: String) -> RtResult<()> {
        let m = self.module_mut(id)?;
        m.name = Some(qualified.clone());
        m.temporary_name = false;
        self.classes.register_name(qualified, id);

        let children: Vec<(String, ModuleId)> = self
            .module(id)?
            .constants
            .iter()
            .filter_map(|(name, entry)| match entry {
                ConstEntry::Value(Value::Module(child)) => Some((name.to_string(), *child)),
                _ => None,
            })
            .collect();
        for (name, child) in children {
            self.assign_name(id, &name, child)?;
        }
        Ok(())
    }

    fn unregister_binding(&mut self, namespace: ModuleId, name: &str, id: ModuleId) {
        let qualified = self.qualify(namespace, name);
        if self.classes.get_by_name(&qualified) == Some(id) {
            self.classes.unregister_name(&qualified);
        }
    }

    /// Register `name` to be loaded by `hook` on first access
    ///
    /// Ignored when the constant is already defined.
    pub fn autoload(
        &mut self,
        namespace: ModuleId,
        name: &str,
        path: impl Into<String>,
        hook: AutoloadHook,
    ) -> RtResult<()> {
        self.check_constant_name(namespace, name)?;
        let module = self.module_mut(namespace)?;
        if !module.constants.contains(name) {
            module.constants.insert(
                name,
                ConstEntry::Autoload {
                    path: path.into(),
                    hook,
                },
            );
        }
        Ok(())
    }

    /// Remove a constant, returning its value (nil for a pending autoload)
    ///
    /// A module keeps its name but no longer resolves by it.
    pub fn remove_const(&mut self, namespace: ModuleId, name: &str) -> RtResult<Value> {
        match self.module_mut(namespace)?.constants.remove(name) {
            Some(ConstEntry::Value(v)) => {
                if let Value::Module(id) = &v {
                    self.unregister_binding(namespace, name, *id);
                }
                Ok(v)
            }
            Some(ConstEntry::Autoload { .. }) => Ok(Value::Nil),
            None => Err(RuntimeError::NameError {
                owner: self.display_module(namespace),
                name: name.to_string(),
            }),
        }
    }

    /// Read a constant, searching ancestors; runs a pending autoload
    pub fn const_get(&mut self, namespace: ModuleId, name: &str) -> RtResult<Value> {
        self.check_constant_name(namespace, name)?;
        let owner = self
            .const_owner(namespace, name)?
            .ok_or_else(|| RuntimeError::NameError {
                owner: self.display_module(namespace),
                name: name.to_string(),
            })?;
        self.materialize(owner, name)
    }

    fn materialize(&mut self, owner: ModuleId, name: &str) -> RtResult<Value> {
        let entry = self.module(owner)?.constants.get(name).cloned();
        match entry {
            Some(ConstEntry::Value(v)) => Ok(v),
            Some(ConstEntry::Autoload { path, hook }) => {
                let key = (owner, name.to_string());
                if !self.loading.insert(key.clone()) {
                    return Err(RuntimeError::NameError {
                        owner: self.display_module(owner),
                        name: name.to_string(),
                    });
                }
                let loaded = hook(self);
                self.loading.remove(&key);
                let failed = |reason: String| RuntimeError::AutoloadFailed {
                    name: name.to_string(),
                    path: path.clone(),
                    reason,
                };
                loaded.map_err(|err| failed(err.to_string()))?;
                match self.module(owner)?.constants.get(name) {
                    Some(ConstEntry::Value(v)) => Ok(v.clone()),
                    _ => Err(failed("constant was not defined by the loaded file".to_string())),
                }
            }
            None => Err(RuntimeError::NameError {
                owner: self.display_module(owner),
                name: name.to_string(),
            }),
        }
    }

    /// Module whose table holds `name`, searching ancestors (and `Object` for modules)
    fn const_owner(&self, namespace: ModuleId, name: &str) -> RtResult<Option<ModuleId>> {
        let mut search = self.ancestors(namespace)?;
        if !self.module(namespace)?.is_class() {
            search.push(self.core.object);
        }
        Ok(search.into_iter().find(|id| {
            self.classes
                .get(*id)
                .is_some_and(|m| m.constants.contains(name))
        }))
    }

    /// Whether a constant is defined; true for pending autoloads, never loads
    pub fn const_defined(&self, namespace: ModuleId, name: &str) -> RtResult<bool> {
        self.check_constant_name(namespace, name)?;
        Ok(self.const_owner(namespace, name)?.is_some())
    }

    /// Path of a pending autoload for `name`, if any
    pub fn autoload_path(&self, namespace: ModuleId, name: &str) -> RtResult<Option<String>> {
        let Some(owner) = self.const_owner(namespace, name)? else {
            return Ok(None);
        };
        Ok(match self.module(owner)?.constants.get(name) {
            Some(ConstEntry::Autoload { path, .. }) => Some(path.clone()),
            _ => None,
        })
    }

    /// Constant names; with `inherit`, ancestors' constants too (stopping at `Object`)
    pub fn constant_names(&self, namespace: ModuleId, inherit: bool) -> RtResult<Vec<String>> {
        let mut names: Vec<String> = self
            .module(namespace)?
            .constants
            .names()
            .map(str::to_string)
            .collect();
        if inherit {
            for ancestor in self.ancestors(namespace)?.into_iter().skip(1) {
                if ancestor == self.core.object && namespace != self.core.object {
                    break;
                }
                for name in self.module(ancestor)?.constants.names() {
                    if !names.iter().any(|n| n == name) {
                        names.push(name.to_string());
                    }
                }
            }
        }
        Ok(names)
    }

    fn check_constant_name(&self, namespace: ModuleId, name: &str) -> RtResult<()> {
        if is_constant_name(name) {
            Ok(())
        } else {
            Err(RuntimeError::NameError {
                owner: self.display_module(namespace),
                name: name.to_string(),
            })
        }
    }

    // ========================================================================
    // Variables
    // ========================================================================

    /// Set a class variable (`@@name`)
    pub fn class_variable_set(
        &mut self,
        module: ModuleId,
        name: &str,
        value: Value,
    ) -> RtResult<()> {
        if !is_class_variable_name(name) {
            return Err(RuntimeError::NameError {
                owner: self.display_module(module),
                name: name.to_string(),
            });
        }
        self.module_mut(module)?.class_variables.insert(name, value);
        Ok(())
    }

    /// Read a class variable, searching ancestors
    pub fn class_variable_get(&self, module: ModuleId, name: &str) -> RtResult<Value> {
        for ancestor in self.ancestors(module)? {
            if let Some(v) = self.module(ancestor)?.class_variables.get(name) {
                return Ok(v.clone());
            }
        }
        Err(RuntimeError::UndefinedClassVariable {
            owner: self.display_module(module),
            name: name.to_string(),
        })
    }

    /// Own class variable names
    pub fn class_variable_names(&self, module: ModuleId) -> RtResult<Vec<String>> {
        Ok(self
            .module(module)?
            .class_variables
            .names()
            .map(str::to_string)
            .collect())
    }

    /// Set an instance variable (`@name`) on an object or module
    pub fn instance_variable_set(
        &mut self,
        target: &Value,
        name: &str,
        value: Value,
    ) -> RtResult<()> {
        if !is_instance_variable_name(name) {
            return Err(RuntimeError::NameError {
                owner: self.inspect(target),
                name: name.to_string(),
            });
        }
        match target {
            Value::Object(id) => self.object_mut(*id)?.instance_variables.insert(name, value),
            Value::Module(id) => self.module_mut(*id)?.instance_variables.insert(name, value),
            other => {
                return Err(RuntimeError::TypeError(format!(
                    "can't modify frozen {}",
                    self.inspect(other)
                )))
            }
        }
        Ok(())
    }

    /// Read an instance variable; unset variables read as nil
    pub fn instance_variable_get(&self, target: &Value, name: &str) -> RtResult<Value> {
        let table = match target {
            Value::Object(id) => &self.object(*id)?.instance_variables,
            Value::Module(id) => &self.module(*id)?.instance_variables,
            _ => return Ok(Value::Nil),
        };
        Ok(table.get(name).cloned().unwrap_or_default())
    }

    /// Instance variable names of an object or module
    pub fn instance_variable_names(&self, target: &Value) -> RtResult<Vec<String>> {
        let table = match target {
            Value::Object(id) => &self.object(*id)?.instance_variables,
            Value::Module(id) => &self.module(*id)?.instance_variables,
            _ => return Ok(Vec::new()),
        };
        Ok(table.names().map(str::to_string).collect())
    }

    // ========================================================================
    // Objects
    // ========================================================================

    /// Allocate an instance of `class`
    pub fn allocate(&mut self, class: ModuleId) -> RtResult<ObjectId> {
        let m = self.module(class)?;
        if !m.is_class() || m.is_singleton() {
            return Err(RuntimeError::TypeError(format!(
                "can't create instance of {}",
                self.display_module(class)
            )));
        }
        Ok(self.classes.register_object(class))
    }

    // ========================================================================
    // Methods
    // ========================================================================

    /// Define a method
    pub fn define_method(
        &mut self,
        module: ModuleId,
        name: &str,
        visibility: Visibility,
        location: Option<SourceLocation>,
        body: MethodBody,
    ) -> RtResult<()> {
        self.module_mut(module)?
            .methods
            .insert(name, MethodEntry::new(name, visibility, location, body));
        Ok(())
    }

    /// Define a method implemented by a Rust function
    pub fn define_native<F>(
        &mut self,
        module: ModuleId,
        name: &str,
        visibility: Visibility,
        f: F,
    ) -> RtResult<()>
    where
        F: Fn(&mut Runtime, &Value, &[Value]) -> RtResult<Value> + Send + Sync + 'static,
    {
        self.define_method(module, name, visibility, None, Arc::new(f))
    }

    pub(crate) fn install_native<F>(
        &mut self,
        module: ModuleId,
        name: &str,
        visibility: Visibility,
        f: F,
    ) where
        F: Fn(&mut Runtime, &Value, &[Value]) -> RtResult<Value> + Send + Sync + 'static,
    {
        if let Some(m) = self.classes.get_mut(module) {
            m.methods
                .insert(name, MethodEntry::new(name, visibility, None, Arc::new(f)));
        }
    }

    /// Stop lookup of `name` at `module`
    pub fn undef_method(&mut self, module: ModuleId, name: &str) -> RtResult<()> {
        if self.find_method(module, name)?.is_none() {
            return Err(RuntimeError::UndefinedMethod {
                owner: self.display_module(module),
                name: name.to_string(),
            });
        }
        self.module_mut(module)?
            .methods
            .insert(name, MethodEntry::undefined(name));
        Ok(())
    }

    /// Remove `module`'s own definition of `name`, exposing inherited ones
    pub fn remove_method(&mut self, module: ModuleId, name: &str) -> RtResult<()> {
        let defined = self
            .module(module)?
            .methods
            .get(name)
            .is_some_and(|e| !e.is_undefined());
        if !defined {
            return Err(RuntimeError::UndefinedMethod {
                owner: self.display_module(module),
                name: name.to_string(),
            });
        }
        self.module_mut(module)?.methods.remove(name);
        Ok(())
    }

    /// Change the visibility of an own method
    pub fn set_visibility(
        &mut self,
        module: ModuleId,
        name: &str,
        visibility: Visibility,
    ) -> RtResult<()> {
        let owner = self.display_module(module);
        match self.module_mut(module)?.methods.get_mut(name) {
            Some(entry) if !entry.is_undefined() => {
                entry.visibility = visibility;
                Ok(())
            }
            _ => Err(RuntimeError::UndefinedMethod {
                owner,
                name: name.to_string(),
            }),
        }
    }

    /// Resolve `name` through `module`'s ancestors
    ///
    /// Returns the owning module and entry; an `undef` tombstone ends the
    /// search with `None`.
    pub fn find_method(
        &self,
        module: ModuleId,
        name: &str,
    ) -> RtResult<Option<(ModuleId, MethodEntry)>> {
        for ancestor in self.ancestors(module)? {
            if let Some(entry) = self.module(ancestor)?.methods.get(name) {
                if entry.is_undefined() {
                    return Ok(None);
                }
                return Ok(Some((ancestor, entry.clone())));
            }
        }
        Ok(None)
    }

    /// The entry a method reference points at
    pub fn method_entry(&self, method: &MethodRef) -> RtResult<MethodEntry> {
        match self.module(method.owner)?.methods.get(&method.name) {
            Some(entry) if !entry.is_undefined() => Ok(entry.clone()),
            _ => Err(RuntimeError::UndefinedMethod {
                owner: self.display_module(method.owner),
                name: method.name.clone(),
            }),
        }
    }

    /// The core native `owner` installed for `name` at bootstrap
    pub fn pristine_method(&self, owner: ModuleId, name: &str) -> Option<&MethodEntry> {
        self.pristine.get(&(owner, name.to_string()))
    }

    /// Method names visible on `module` whose visibility passes `filter`
    ///
    /// Without `inherit` only `module`'s own table is listed. Names shadowed
    /// by a nearer definition (or tombstone) are reported once, with the
    /// nearer visibility.
    pub fn method_names(
        &self,
        module: ModuleId,
        inherit: bool,
        filter: impl Fn(Visibility) -> bool,
    ) -> RtResult<Vec<String>> {
        let chain = if inherit {
            self.ancestors(module)?
        } else {
            vec![module]
        };
        let mut seen = FxHashSet::default();
        let mut names = Vec::new();
        for ancestor in chain {
            for (name, entry) in self.module(ancestor)?.methods.iter() {
                if !seen.insert(name.to_string()) {
                    continue;
                }
                if !entry.is_undefined() && filter(entry.visibility) {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    /// Dynamic dispatch
    pub fn send(&mut self, receiver: &Value, name: &str, args: &[Value]) -> RtResult<Value> {
        let class = self.class_of(receiver)?;
        let body = self
            .find_method(class, name)?
            .and_then(|(_, entry)| entry.body().cloned())
            .ok_or_else(|| RuntimeError::NoMethodError {
                receiver: self.inspect(receiver),
                name: name.to_string(),
            })?;
        body(self, receiver, args)
    }

    /// Run a specific method entry with `receiver` as self, skipping dispatch
    pub fn invoke(
        &mut self,
        entry: &MethodEntry,
        receiver: &Value,
        args: &[Value],
    ) -> RtResult<Value> {
        let body = entry.body().cloned().ok_or_else(|| RuntimeError::NoMethodError {
            receiver: self.inspect(receiver),
            name: entry.name.clone(),
        })?;
        body(self, receiver, args)
    }

    // ========================================================================
    // Classes and ancestry
    // ========================================================================

    /// Class ignoring any singleton class
    pub fn real_class_of(&self, value: &Value) -> RtResult<ModuleId> {
        Ok(match value {
            Value::Nil => self.core.nil_class,
            Value::Bool(true) => self.core.true_class,
            Value::Bool(false) => self.core.false_class,
            Value::Int(_) => self.core.integer,
            Value::Sym(_) => self.core.symbol,
            Value::Str(_) => self.core.string,
            Value::Array(_) => self.core.array,
            Value::Method(_) => self.core.unbound_method,
            Value::Object(id) => self.object(*id)?.class,
            Value::Module(id) => {
                if self.module(*id)?.is_class() {
                    self.core.class
                } else {
                    self.core.module
                }
            }
        })
    }

    /// Class used for dispatch on `value`
    ///
    /// A class without its own singleton class dispatches through the
    /// nearest superclass that has one; that singleton would be the new
    /// singleton's superclass, so the lookup result is the same.
    pub fn class_of(&self, value: &Value) -> RtResult<ModuleId> {
        match value {
            Value::Object(id) => {
                let obj = self.object(*id)?;
                Ok(obj.singleton.unwrap_or(obj.class))
            }
            Value::Module(id) => {
                let mut current = Some(*id);
                while let Some(m) = current {
                    let module = self.module(m)?;
                    if let Some(singleton) = module.singleton {
                        return Ok(singleton);
                    }
                    current = module.superclass();
                }
                self.real_class_of(value)
            }
            _ => self.real_class_of(value),
        }
    }

    /// Singleton class of `value`, created on first request
    pub fn singleton_class(&mut self, value: &Value) -> RtResult<ModuleId> {
        match value {
            Value::Object(id) => {
                let obj = self.object(*id)?;
                if let Some(existing) = obj.singleton {
                    return Ok(existing);
                }
                let superclass = obj.class;
                let singleton = self.new_singleton(superclass, value.clone());
                self.object_mut(*id)?.singleton = Some(singleton);
                Ok(singleton)
            }
            Value::Module(id) => {
                let (existing, kind) = {
                    let m = self.module(*id)?;
                    (m.singleton, m.kind)
                };
                if let Some(existing) = existing {
                    return Ok(existing);
                }
                let superclass = match kind {
                    ModuleKind::Module => self.core.module,
                    ModuleKind::Class { superclass: None } => self.core.class,
                    ModuleKind::Class {
                        superclass: Some(parent),
                    } => self.singleton_class(&Value::Module(parent))?,
                };
                let singleton = self.new_singleton(superclass, value.clone());
                self.module_mut(*id)?.singleton = Some(singleton);
                Ok(singleton)
            }
            other => Err(RuntimeError::TypeError(format!(
                "can't define singleton for {}",
                self.inspect(other)
            ))),
        }
    }

    fn new_singleton(&mut self, superclass: ModuleId, attached: Value) -> ModuleId {
        let id = self.classes.register_module(ModuleKind::Class {
            superclass: Some(superclass),
        });
        if let Some(m) = self.classes.get_mut(id) {
            m.attached = Some(attached);
        }
        id
    }

    /// Linearized ancestors, starting with `module` itself
    ///
    /// Order: the module, its includes (most recent first, each expanded),
    /// then the superclass's ancestors. A mixin already present further up
    /// the chain is listed only there.
    pub fn ancestors(&self, module: ModuleId) -> RtResult<Vec<ModuleId>> {
        let m = self.module(module)?;
        let tail = match m.superclass() {
            Some(parent) => self.ancestors(parent)?,
            None => Vec::new(),
        };
        let mut head = vec![module];
        for mixin in &m.includes {
            for ancestor in self.ancestors(*mixin)? {
                if !head.contains(&ancestor) && !tail.contains(&ancestor) {
                    head.push(ancestor);
                }
            }
        }
        head.extend(tail);
        Ok(head)
    }

    /// Whether `value` is an instance of `module` or one of its descendants
    pub fn is_a(&self, value: &Value, module: ModuleId) -> RtResult<bool> {
        let class = self.class_of(value)?;
        Ok(self.ancestors(class)?.contains(&module))
    }

    // ========================================================================
    // Display
    // ========================================================================

    /// Display representation of a value
    pub fn inspect(&self, value: &Value) -> String {
        match value {
            Value::Nil => "nil".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Sym(s) => format!(":{}", s),
            Value::Str(s) => format!("{:?}", s),
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().map(|v| self.inspect(v)).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Object(id) => {
                let class = match self.classes.object(*id) {
                    Some(obj) => self.display_module(obj.class),
                    None => "Object".to_string(),
                };
                format!("#<{}:{}>", class, object_address(*id))
            }
            Value::Module(id) => self.display_module(*id),
            Value::Method(method) => format!(
                "#<UnboundMethod: {}#{}>",
                self.display_module(method.owner),
                method.name
            ),
        }
    }

    /// Display representation of a module
    ///
    /// Named modules show their qualified name, singleton classes show
    /// `#<Class:X>` with `X` the attached object, and anything else shows
    /// `#<Class:0x…>` / `#<Module:0x…>`.
    pub fn display_module(&self, id: ModuleId) -> String {
        let Some(m) = self.classes.get(id) else {
            return format!("#<Module:{}>", module_address(id));
        };
        if let Some(name) = &m.name {
            return name.clone();
        }
        if let Some(attached) = &m.attached {
            return format!("#<Class:{}>", self.inspect(attached));
        }
        let kind = if m.is_class() { "Class" } else { "Module" };
        format!("#<{}:{}>", kind, module_address(id))
    }

    /// Stable integer identity of a value
    pub fn object_id(&self, value: &Value) -> i64 {
        match value {
            Value::Nil => 8,
            Value::Bool(true) => 20,
            Value::Bool(false) => 0,
            Value::Int(i) => i.wrapping_mul(2).wrapping_add(1),
            Value::Module(id) => (MODULE_ADDRESS_BASE + id.0 as u64 * SLOT_SIZE) as i64 / 8,
            Value::Object(id) => (OBJECT_ADDRESS_BASE + id.0 as u64 * SLOT_SIZE) as i64 / 8,
            other => {
                let mut hasher = FxHasher::default();
                other.hash(&mut hasher);
                (hasher.finish() >> 2) as i64
            }
        }
    }
}

fn module_address(id: ModuleId) -> String {
    format!("0x{:016x}", MODULE_ADDRESS_BASE + id.0 as u64 * SLOT_SIZE)
}

fn object_address(id: ObjectId) -> String {
    format!("0x{:016x}", OBJECT_ADDRESS_BASE + id.0 as u64 * SLOT_SIZE)
}

fn is_identifier_tail(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `Name`, `HTTP2`, `Max_Age`
pub fn is_constant_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_uppercase()) && is_identifier_tail(chars.as_str())
}

/// `@@count`
pub fn is_class_variable_name(name: &str) -> bool {
    name.strip_prefix("@@")
        .is_some_and(|rest| {
            !rest.is_empty()
                && !rest.starts_with(|c: char| c.is_ascii_digit())
                && is_identifier_tail(rest)
        })
}

/// `@count` (but not `@@count`)
pub fn is_instance_variable_name(name: &str) -> bool {
    name.strip_prefix('@').is_some_and(|rest| {
        !rest.is_empty()
            && !rest.starts_with('@')
            && !rest.starts_with(|c: char| c.is_ascii_digit())
            && is_identifier_tail(rest)
    })
}
