//! Class mirror: structural queries over a class or module
//!
//! Every query on the subject goes through [`crate::rebind`] against one of
//! the trusted owners (`BasicObject`, `Module`, `Class`), so a subject that
//! redefines `name`, `ancestors` or `instance_methods` on itself, or removes
//! them with `undef`, is still described by what the runtime actually holds.
//!
//! Field and method mirrors are interned per class mirror: asking for the same
//! name twice hands back the same `Arc`.

use std::path::PathBuf;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use specula_runtime::{CoreTypes, ModuleId, Value, Vm};

use crate::debug::debug_log;
use crate::error::{ReflectError, ReflectResult};
use crate::field_mirror::{FieldKind, FieldMirror};
use crate::heuristics;
use crate::method_mirror::MethodMirror;
use crate::object_mirror::{
    expect_module, expect_modules, expect_names, expect_str, ObjectMirror,
};
use crate::rebind::call_trusted;
use crate::registry::Registry;

/// Mirror over a class or module
#[derive(Debug)]
pub struct ClassMirror {
    object: ObjectMirror,
    id: ModuleId,
    fields: Mutex<FxHashMap<String, Arc<FieldMirror>>>,
    methods: Mutex<FxHashMap<String, Arc<MethodMirror>>>,
}

impl ClassMirror {
    pub(crate) fn new(vm: Arc<Vm>, registry: Weak<Registry>, id: ModuleId) -> Self {
        Self {
            object: ObjectMirror::new(vm, registry, Value::Module(id)),
            id,
            fields: Mutex::new(FxHashMap::default()),
            methods: Mutex::new(FxHashMap::default()),
        }
    }

    /// The reflected module
    pub fn subject(&self) -> ModuleId {
        self.id
    }

    /// The generic object view of the subject
    pub fn as_object(&self) -> &ObjectMirror {
        &self.object
    }

    /// The runtime the subject lives in
    pub fn vm(&self) -> &Arc<Vm> {
        self.object.vm()
    }

    /// The registry this mirror came from
    ///
    /// Fails with [`ReflectError::RegistryDropped`] once the registry is gone.
    pub fn registry(&self) -> ReflectResult<Arc<Registry>> {
        self.object.registry()
    }

    // ========================================================================
    // Naming
    // ========================================================================

    /// Full display name (`Outer::Inner`, `#<Class:Dog>`, `#<Class:0x…>`)
    pub fn name(&self) -> ReflectResult<String> {
        let value = self.call(self.core().module, "inspect", &[])?;
        expect_str(value, "inspect")
    }

    /// Last namespace component of [`ClassMirror::name`]
    pub fn demodulized_name(&self) -> ReflectResult<String> {
        Ok(heuristics::demodulize(&self.name()?).to_string())
    }

    /// Whether the subject looks like a singleton class, judged by its name
    ///
    /// Never fails; an unreadable name counts as "no".
    pub fn is_singleton_class(&self) -> bool {
        self.classify_name(heuristics::is_singleton_name)
    }

    /// Whether the subject looks unnamed, judged by its name
    ///
    /// Never fails; an unreadable name counts as "no".
    pub fn is_anonymous(&self) -> bool {
        self.classify_name(heuristics::is_anonymous_name)
    }

    fn classify_name(&self, heuristic: fn(&str) -> bool) -> bool {
        match self.name() {
            Ok(name) => heuristic(&name),
            Err(err) => {
                debug_log!("could not read name of module {:?}: {}", self.id, err);
                false
            }
        }
    }

    // ========================================================================
    // Kind and hierarchy
    // ========================================================================

    /// Whether the subject is a class rather than a plain module
    pub fn is_class(&self) -> ReflectResult<bool> {
        let core = self.core();
        let value = self.call(core.basic_object, "is_a?", &[Value::Module(core.class)])?;
        Ok(value.is_truthy())
    }

    /// Whether the subject is a plain module
    pub fn is_module(&self) -> ReflectResult<bool> {
        Ok(!self.is_class()?)
    }

    /// Linearized ancestors, the subject first
    pub fn ancestors(&self) -> ReflectResult<Vec<Arc<ClassMirror>>> {
        let value = self.call(self.core().module, "ancestors", &[])?;
        expect_modules(&value, "ancestors")?
            .into_iter()
            .map(|id| self.reflect(id))
            .collect()
    }

    /// Ancestors that are modules rather than classes
    pub fn mixins(&self) -> ReflectResult<Vec<Arc<ClassMirror>>> {
        let mut mixins = Vec::new();
        for ancestor in self.ancestors()? {
            if !ancestor.is_class()? {
                mixins.push(ancestor);
            }
        }
        Ok(mixins)
    }

    /// Direct superclass; `None` for the root class
    ///
    /// Modules have no superclass and fail with [`ReflectError::Unsupported`].
    pub fn superclass(&self) -> ReflectResult<Option<Arc<ClassMirror>>> {
        if !self.is_class()? {
            return Err(ReflectError::Unsupported(format!(
                "{} is a module; only classes have a superclass",
                self.name()?
            )));
        }
        match self.call(self.core().class, "superclass", &[])? {
            Value::Nil => Ok(None),
            value => Ok(Some(self.reflect(expect_module(value, "superclass")?)?)),
        }
    }

    /// Live classes whose direct superclass is the subject
    ///
    /// Scans every module in the runtime. Singleton classes of instances also
    /// have the subject as superclass; they are left out by name.
    pub fn subclasses(&self) -> ReflectResult<Vec<Arc<ClassMirror>>> {
        if !self.is_class()? {
            return Ok(Vec::new());
        }
        let core = self.core();
        let vm = self.vm();
        let candidates = vm.with(|rt| rt.live_modules());

        let mut subclasses = Vec::new();
        for id in candidates {
            if id == self.id {
                continue;
            }
            let candidate = Value::Module(id);
            let class = [Value::Module(core.class)];
            let is_class = call_trusted(vm, core.basic_object, &candidate, "is_a?", &class)?;
            if !is_class.is_truthy() {
                continue;
            }
            let superclass = call_trusted(vm, core.class, &candidate, "superclass", &[])?;
            if superclass != Value::Module(self.id) {
                continue;
            }
            let name = call_trusted(vm, core.module, &candidate, "inspect", &[])?;
            if heuristics::is_singleton_name(&expect_str(name, "inspect")?) {
                continue;
            }
            subclasses.push(self.reflect(id)?);
        }
        Ok(subclasses)
    }

    /// Mirror of the subject's singleton class, created if needed
    pub fn singleton_class(&self) -> ReflectResult<Arc<ClassMirror>> {
        let value = self.call(self.core().basic_object, "singleton_class", &[])?;
        self.reflect(expect_module(value, "singleton_class")?)
    }

    // ========================================================================
    // Fields
    // ========================================================================

    /// Own constants
    pub fn constants(&self) -> ReflectResult<Vec<Arc<FieldMirror>>> {
        let value = self.call(self.core().module, "constants", &[Value::Bool(false)])?;
        Ok(self.intern_fields(expect_names(&value, "constants")?, FieldKind::Constant))
    }

    /// Own class variables (`@@name`)
    pub fn class_variables(&self) -> ReflectResult<Vec<Arc<FieldMirror>>> {
        let value = self.call(self.core().module, "class_variables", &[])?;
        Ok(self.intern_fields(
            expect_names(&value, "class_variables")?,
            FieldKind::ClassVariable,
        ))
    }

    /// Instance variables of the class object itself (`@name`)
    pub fn class_instance_variables(&self) -> ReflectResult<Vec<Arc<FieldMirror>>> {
        let value = self.call(self.core().basic_object, "instance_variables", &[])?;
        Ok(self.intern_fields(
            expect_names(&value, "instance_variables")?,
            FieldKind::ClassInstanceVariable,
        ))
    }

    /// Constants, then class variables, then class instance variables
    pub fn fields(&self) -> ReflectResult<Vec<Arc<FieldMirror>>> {
        let mut fields = self.constants()?;
        fields.extend(self.class_variables()?);
        fields.extend(self.class_instance_variables()?);
        Ok(fields)
    }

    /// Resolve a constant path such as `Inner::LIMIT` relative to the subject
    ///
    /// Every segment but the last is read with `const_get`, which may run a
    /// pending autoload. The last is only located, never read: the field is
    /// interned on the module whose table holds it, which may be an ancestor
    /// of the namespace (or `Object`, for modules). A missing segment anywhere
    /// yields `Ok(None)` for the whole path; with `SPECULA_LOG=debug` the
    /// failing segment is reported.
    pub fn constant(&self, path: &str) -> ReflectResult<Option<Arc<FieldMirror>>> {
        let segments = heuristics::split_path(path);
        let Some((last, outer)) = segments.split_last() else {
            debug_log!("empty constant path {:?}", path);
            return Ok(None);
        };
        let module = self.core().module;
        let vm = self.vm();

        let mut namespace = self.id;
        for segment in outer {
            let value = match call_trusted(
                vm,
                module,
                &Value::Module(namespace),
                "const_get",
                &[Value::sym(*segment)],
            ) {
                Ok(value) => value,
                Err(ReflectError::Runtime(err)) if err.is_missing_name() => {
                    debug_log!("constant {} not found while resolving {}: {}", segment, path, err);
                    return Ok(None);
                }
                Err(err) => return Err(err),
            };
            namespace = match value {
                Value::Module(id) => id,
                other => {
                    return Err(ReflectError::Unsupported(format!(
                        "{} in {} is not a class/module ({:?})",
                        segment, path, other
                    )))
                }
            };
        }

        let Some(holder) = self.constant_holder(namespace, last)? else {
            debug_log!("constant {} not found while resolving {}", last, path);
            return Ok(None);
        };
        let field = if holder == self.id {
            self.intern_field(last, FieldKind::Constant)
        } else {
            self.reflect(holder)?.intern_field(last, FieldKind::Constant)
        };
        Ok(Some(field))
    }

    /// The module whose own table binds `name`, searched the way `const_get` does
    fn constant_holder(&self, namespace: ModuleId, name: &str) -> ReflectResult<Option<ModuleId>> {
        let core = self.core();
        let vm = self.vm();
        let target = Value::Module(namespace);
        let ancestors = call_trusted(vm, core.module, &target, "ancestors", &[])?;
        let mut search = expect_modules(&ancestors, "ancestors")?;
        let class = [Value::Module(core.class)];
        if !call_trusted(vm, core.basic_object, &target, "is_a?", &class)?.is_truthy() {
            search.push(core.object);
        }
        for candidate in search {
            let own = call_trusted(
                vm,
                core.module,
                &Value::Module(candidate),
                "constants",
                &[Value::Bool(false)],
            )?;
            if expect_names(&own, "constants")?.iter().any(|own| own == name) {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    /// Lexical nesting, innermost first
    ///
    /// Derived from the qualified name. Anything that does not resolve back
    /// to the subject falls back to the subject alone; the only failure is a
    /// dropped registry.
    pub fn nesting(&self) -> ReflectResult<Vec<Arc<ClassMirror>>> {
        match self.resolve_nesting() {
            Ok(Some(chain)) => chain.into_iter().map(|id| self.reflect(id)).collect(),
            Ok(None) => Ok(vec![self.reflect(self.id)?]),
            Err(err) => {
                debug_log!("nesting of module {:?} fell back: {}", self.id, err);
                Ok(vec![self.reflect(self.id)?])
            }
        }
    }

    /// Module ids of the nesting chain, innermost first
    fn resolve_nesting(&self) -> ReflectResult<Option<Vec<ModuleId>>> {
        let name = self.name()?;
        if heuristics::is_anonymous_name(&name) || heuristics::is_singleton_name(&name) {
            return Ok(None);
        }
        let core = self.core();
        let mut namespace = core.object;
        let mut chain = Vec::new();
        for segment in heuristics::split_path(&name) {
            let value = call_trusted(
                self.vm(),
                core.module,
                &Value::Module(namespace),
                "const_get",
                &[Value::sym(segment)],
            )?;
            match value {
                Value::Module(id) => {
                    chain.push(id);
                    namespace = id;
                }
                _ => return Ok(None),
            }
        }
        if chain.last() != Some(&self.id) {
            debug_log!("{} does not resolve back to module {:?}", name, self.id);
            return Ok(None);
        }
        chain.reverse();
        Ok(Some(chain))
    }

    /// Own constants bound to classes or modules, sorted by name
    ///
    /// Constants still waiting for an autoload are skipped, never loaded.
    pub fn nested_classes(&self) -> ReflectResult<Vec<Arc<ClassMirror>>> {
        let module = self.core().module;
        let value = self.call(module, "constants", &[Value::Bool(false)])?;
        let mut nested = Vec::new();
        for name in expect_names(&value, "constants")? {
            let symbol = [Value::sym(name.as_str())];
            if self.call(module, "autoload?", &symbol)?.is_truthy() {
                continue;
            }
            if let Value::Module(id) = self.call(module, "const_get", &symbol)? {
                let mirror = self.reflect(id)?;
                nested.push((mirror.name()?, mirror));
            }
        }
        nested.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(nested.into_iter().map(|(_, mirror)| mirror).collect())
    }

    /// Number of [`ClassMirror::nested_classes`]
    pub fn nested_class_count(&self) -> ReflectResult<usize> {
        Ok(self.nested_classes()?.len())
    }

    // ========================================================================
    // Methods
    // ========================================================================

    /// Own instance methods: public and protected by name, then private by name
    pub fn instance_methods(&self) -> ReflectResult<Vec<Arc<MethodMirror>>> {
        let module = self.core().module;
        let own = [Value::Bool(false)];
        let mut visible = expect_names(
            &self.call(module, "public_instance_methods", &own)?,
            "public_instance_methods",
        )?;
        visible.extend(expect_names(
            &self.call(module, "protected_instance_methods", &own)?,
            "protected_instance_methods",
        )?);
        visible.sort();
        let mut private = expect_names(
            &self.call(module, "private_instance_methods", &own)?,
            "private_instance_methods",
        )?;
        private.sort();

        visible
            .iter()
            .chain(private.iter())
            .map(|name| self.instance_method(name))
            .collect()
    }

    /// Methods defined on the singleton class, ordered like [`ClassMirror::instance_methods`]
    pub fn class_methods(&self) -> ReflectResult<Vec<Arc<MethodMirror>>> {
        self.singleton_class()?.instance_methods()
    }

    /// A single instance method, inherited ones included
    pub fn instance_method(&self, name: &str) -> ReflectResult<Arc<MethodMirror>> {
        let value = self
            .call(self.core().module, "instance_method", &[Value::sym(name)])
            .map_err(|err| match err {
                ReflectError::Runtime(inner) => ReflectError::missing(inner, "method", name),
                other => other,
            })?;
        let method = value
            .as_method()
            .cloned()
            .ok_or_else(|| ReflectError::UnexpectedResult {
                operation: "instance_method",
                got: format!("{:?}", value),
            })?;
        if let Some(existing) = self.interned_method(name) {
            return Ok(existing);
        }
        let mirror = self.registry()?.reflect_method(self.vm(), method)?;
        Ok(self.intern_method(mirror))
    }

    /// A single method of the singleton class, inherited ones included
    pub fn class_method(&self, name: &str) -> ReflectResult<Arc<MethodMirror>> {
        self.singleton_class()?.instance_method(name)
    }

    /// Distinct files defining the subject's own instance methods, first seen first
    ///
    /// Best effort: natives have no location and are skipped.
    pub fn source_files(&self) -> ReflectResult<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = Vec::new();
        for file in self.method_files()? {
            if !files.contains(&file) {
                files.push(file);
            }
        }
        Ok(files)
    }

    /// One file per own instance method that has a location, duplicates kept
    pub fn method_files(&self) -> ReflectResult<Vec<PathBuf>> {
        Ok(self
            .instance_methods()?
            .iter()
            .filter_map(|method| method.file().map(PathBuf::from))
            .collect())
    }

    // ========================================================================
    // Provenance
    // ========================================================================

    /// Best-effort defining file
    pub fn file(&self) -> Option<PathBuf> {
        self.registry().ok()?.resolver().resolve(self)
    }

    /// Best-effort owning package
    pub fn package(&self) -> Option<String> {
        self.registry().ok()?.resolver().package(self)
    }

    // ========================================================================
    // Interning
    // ========================================================================

    /// The field mirror for `name`, created on first request
    pub fn intern_field(&self, name: &str, kind: FieldKind) -> Arc<FieldMirror> {
        let mut fields = self.fields.lock();
        if let Some(existing) = fields.get(name) {
            return Arc::clone(existing);
        }
        let mirror = Arc::new(FieldMirror::new(
            Arc::clone(self.vm()),
            Weak::clone(self.object.registry_handle()),
            self.id,
            name.to_string(),
            kind,
        ));
        fields.insert(name.to_string(), Arc::clone(&mirror));
        mirror
    }

    /// Keep `mirror` unless a method mirror of the same name is already held
    pub fn intern_method(&self, mirror: Arc<MethodMirror>) -> Arc<MethodMirror> {
        let mut methods = self.methods.lock();
        Arc::clone(methods.entry(mirror.name().to_string()).or_insert(mirror))
    }

    pub(crate) fn interned_method(&self, name: &str) -> Option<Arc<MethodMirror>> {
        self.methods.lock().get(name).cloned()
    }

    fn intern_fields(&self, names: Vec<String>, kind: FieldKind) -> Vec<Arc<FieldMirror>> {
        names
            .iter()
            .map(|name| self.intern_field(name, kind))
            .collect()
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn core(&self) -> CoreTypes {
        self.object.core()
    }

    fn call(
        &self,
        trusted_owner: ModuleId,
        operation: &str,
        args: &[Value],
    ) -> ReflectResult<Value> {
        self.object.call(trusted_owner, operation, args)
    }

    fn reflect(&self, id: ModuleId) -> ReflectResult<Arc<ClassMirror>> {
        Ok(self.registry()?.reflect_class(self.vm(), id))
    }
}
