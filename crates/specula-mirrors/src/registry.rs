//! Mirror registry: the one way raw runtime entities become mirrors
//!
//! The registry keys mirrors by `(VmId, Value)` so the same entity always
//! comes back as the same `Arc`. Method values are interned on the class
//! mirror of their owner, so `reflect` and `ClassMirror::instance_method`
//! agree on one mirror per method.
//!
//! The registry owns its mirrors; mirrors only hold a `Weak` back-reference.
//! Dropping the last `Arc<Registry>` frees every mirror it cached and the
//! runtimes they kept alive.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use specula_runtime::{MethodRef, ModuleId, Value, Vm, VmId};

use crate::class_mirror::ClassMirror;
use crate::error::{ReflectError, ReflectResult};
use crate::field_mirror::{FieldKind, FieldMirror};
use crate::method_mirror::MethodMirror;
use crate::object_mirror::ObjectMirror;
use crate::package::{PackageInference, PackageResolver};
use crate::rebind::{self, Rebound};

static GLOBAL: Lazy<Arc<Registry>> = Lazy::new(|| Arc::new(Registry::new()));

/// Any kind of mirror
#[derive(Debug, Clone)]
pub enum Mirror {
    /// Plain value or object
    Object(Arc<ObjectMirror>),
    /// Class or module
    Class(Arc<ClassMirror>),
    /// Constant or class-level variable
    Field(Arc<FieldMirror>),
    /// Method
    Method(Arc<MethodMirror>),
}

impl Mirror {
    /// Whether both are the same mirror instance
    pub fn ptr_eq(&self, other: &Mirror) -> bool {
        match (self, other) {
            (Mirror::Object(a), Mirror::Object(b)) => Arc::ptr_eq(a, b),
            (Mirror::Class(a), Mirror::Class(b)) => Arc::ptr_eq(a, b),
            (Mirror::Field(a), Mirror::Field(b)) => Arc::ptr_eq(a, b),
            (Mirror::Method(a), Mirror::Method(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Object mirror, for values that are not modules or methods
    pub fn as_object(&self) -> Option<&Arc<ObjectMirror>> {
        match self {
            Mirror::Object(m) => Some(m),
            _ => None,
        }
    }

    /// Class mirror, for modules and classes
    pub fn as_class(&self) -> Option<&Arc<ClassMirror>> {
        match self {
            Mirror::Class(m) => Some(m),
            _ => None,
        }
    }

    /// Field mirror
    pub fn as_field(&self) -> Option<&Arc<FieldMirror>> {
        match self {
            Mirror::Field(m) => Some(m),
            _ => None,
        }
    }

    /// Method mirror
    pub fn as_method(&self) -> Option<&Arc<MethodMirror>> {
        match self {
            Mirror::Method(m) => Some(m),
            _ => None,
        }
    }
}

#[derive(Default)]
struct Cache {
    classes: FxHashMap<(VmId, ModuleId), Arc<ClassMirror>>,
    objects: FxHashMap<(VmId, Value), Arc<ObjectMirror>>,
    /// Method values whose owner's interned mirror is for another method
    methods: FxHashMap<(VmId, MethodRef), Arc<MethodMirror>>,
}

/// Identity-preserving mirror factory
pub struct Registry {
    cache: Mutex<Cache>,
    resolver: RwLock<Arc<dyn PackageResolver>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("mirrors", &self.len()).finish()
    }
}

impl Registry {
    /// An empty registry using the default package resolver
    pub fn new() -> Self {
        Self::with_resolver(Arc::new(PackageInference::default()))
    }

    /// An empty registry using `resolver` for file and package attribution
    pub fn with_resolver(resolver: Arc<dyn PackageResolver>) -> Self {
        Self {
            cache: Mutex::new(Cache::default()),
            resolver: RwLock::new(resolver),
        }
    }

    /// The process-wide registry
    pub fn global() -> Arc<Registry> {
        Arc::clone(&GLOBAL)
    }

    /// Mirror of any value
    ///
    /// Modules become class mirrors, method values become method mirrors,
    /// everything else becomes an object mirror.
    pub fn reflect(self: &Arc<Self>, vm: &Arc<Vm>, value: Value) -> ReflectResult<Mirror> {
        match value {
            Value::Module(id) => Ok(Mirror::Class(self.reflect_class(vm, id))),
            Value::Method(method) => Ok(Mirror::Method(self.reflect_method(vm, method)?)),
            other => {
                let mut cache = self.cache.lock();
                let mirror = cache
                    .objects
                    .entry((vm.id(), other.clone()))
                    .or_insert_with(|| {
                        Arc::new(ObjectMirror::new(Arc::clone(vm), Arc::downgrade(self), other))
                    });
                Ok(Mirror::Object(Arc::clone(mirror)))
            }
        }
    }

    /// Class mirror of a module or class
    pub fn reflect_class(self: &Arc<Self>, vm: &Arc<Vm>, id: ModuleId) -> Arc<ClassMirror> {
        let mut cache = self.cache.lock();
        let mirror = cache.classes.entry((vm.id(), id)).or_insert_with(|| {
            Arc::new(ClassMirror::new(Arc::clone(vm), Arc::downgrade(self), id))
        });
        Arc::clone(mirror)
    }

    /// Method mirror of a method value
    ///
    /// The mirror is interned on the owner's class mirror under the method
    /// name. If that slot already holds a mirror of a different method (an
    /// inherited method interned before the owner redefined it), the mirror
    /// is cached here instead.
    pub fn reflect_method(
        self: &Arc<Self>,
        vm: &Arc<Vm>,
        method: MethodRef,
    ) -> ReflectResult<Arc<MethodMirror>> {
        let owner = self.reflect_class(vm, method.owner);
        if let Some(existing) = owner.interned_method(&method.name) {
            if existing.method_ref() == &method {
                return Ok(existing);
            }
        }
        let key = (vm.id(), method);
        if let Some(existing) = self.cache.lock().methods.get(&key) {
            return Ok(Arc::clone(existing));
        }

        let fresh = self.method_mirror(vm, key.1.clone())?;
        let interned = owner.intern_method(Arc::clone(&fresh));
        if interned.method_ref() == &key.1 {
            return Ok(interned);
        }
        let mut cache = self.cache.lock();
        Ok(Arc::clone(cache.methods.entry(key).or_insert(fresh)))
    }

    /// Class mirror of the module bound to a qualified name
    pub fn reflect_named(
        self: &Arc<Self>,
        vm: &Arc<Vm>,
        qualified_name: &str,
    ) -> ReflectResult<Arc<ClassMirror>> {
        let id = vm
            .with(|rt| rt.lookup(qualified_name))
            .ok_or_else(|| ReflectError::NotFound {
                kind: "class",
                name: qualified_name.to_string(),
            })?;
        Ok(self.reflect_class(vm, id))
    }

    /// Fresh field mirror; never cached here
    pub fn field_mirror(
        self: &Arc<Self>,
        vm: &Arc<Vm>,
        owner: ModuleId,
        name: &str,
        kind: FieldKind,
    ) -> Arc<FieldMirror> {
        Arc::new(FieldMirror::new(
            Arc::clone(vm),
            Arc::downgrade(self),
            owner,
            name.to_string(),
            kind,
        ))
    }

    /// Fresh method mirror; never cached here
    pub fn method_mirror(
        self: &Arc<Self>,
        vm: &Arc<Vm>,
        method: MethodRef,
    ) -> ReflectResult<Arc<MethodMirror>> {
        let entry = vm
            .with(|rt| rt.method_entry(&method))
            .map_err(|err| ReflectError::missing(err, "method", &method.name))?;
        Ok(Arc::new(MethodMirror::new(
            Arc::clone(vm),
            Arc::downgrade(self),
            method,
            entry.visibility,
            entry.location,
        )))
    }

    /// See [`rebind::rebind`]
    pub fn rebind(
        &self,
        vm: &Arc<Vm>,
        trusted_owner: ModuleId,
        target: &Value,
        operation: &str,
    ) -> ReflectResult<Rebound> {
        rebind::rebind(vm, trusted_owner, target, operation)
    }

    /// Resolver used by class mirrors for file and package attribution
    pub fn resolver(&self) -> Arc<dyn PackageResolver> {
        Arc::clone(&self.resolver.read())
    }

    /// Replace the resolver
    pub fn set_resolver(&self, resolver: Arc<dyn PackageResolver>) {
        *self.resolver.write() = resolver;
    }

    /// Drop every cached mirror
    ///
    /// Mirrors handed out earlier keep working but are no longer the ones
    /// `reflect` returns.
    pub fn reset(&self) {
        let mut cache = self.cache.lock();
        cache.classes.clear();
        cache.objects.clear();
        cache.methods.clear();
    }

    /// Number of mirrors cached directly by the registry
    ///
    /// Method mirrors interned on a class mirror are not counted.
    pub fn len(&self) -> usize {
        let cache = self.cache.lock();
        cache.classes.len() + cache.objects.len() + cache.methods.len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
