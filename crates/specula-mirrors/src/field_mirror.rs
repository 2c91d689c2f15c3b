//! Field mirror: one constant or class-level variable

use std::fmt;
use std::sync::{Arc, Weak};

use specula_runtime::{ModuleId, Value, Vm};

use crate::class_mirror::ClassMirror;
use crate::error::{ReflectError, ReflectResult};
use crate::object_mirror::upgrade;
use crate::rebind::call_trusted;
use crate::registry::Registry;

/// What kind of binding a field mirror describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// `Outer::NAME`
    Constant,
    /// `@@name`
    ClassVariable,
    /// `@name` on the class object itself
    ClassInstanceVariable,
}

impl FieldKind {
    /// Lowercase label
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Constant => "constant",
            FieldKind::ClassVariable => "class variable",
            FieldKind::ClassInstanceVariable => "class instance variable",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mirror over one named binding of a module
///
/// Holds the owner by id only; [`FieldMirror::owner`] goes back through the
/// registry.
#[derive(Debug)]
pub struct FieldMirror {
    vm: Arc<Vm>,
    registry: Weak<Registry>,
    owner: ModuleId,
    name: String,
    kind: FieldKind,
}

impl FieldMirror {
    pub(crate) fn new(
        vm: Arc<Vm>,
        registry: Weak<Registry>,
        owner: ModuleId,
        name: String,
        kind: FieldKind,
    ) -> Self {
        Self {
            vm,
            registry,
            owner,
            name,
            kind,
        }
    }

    /// Binding name (`MAX_AGE`, `@@count`, `@registry`)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Binding kind
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Mirror of the module that holds the binding
    pub fn owner(&self) -> ReflectResult<Arc<ClassMirror>> {
        Ok(upgrade(&self.registry)?.reflect_class(&self.vm, self.owner))
    }

    /// Current value
    ///
    /// Reading a constant that is registered for autoload runs the loader.
    pub fn value(&self) -> ReflectResult<Value> {
        let (module, basic_object) = self
            .vm
            .with(|rt| (rt.core().module, rt.core().basic_object));
        let (trusted_owner, getter) = match self.kind {
            FieldKind::Constant => (module, "const_get"),
            FieldKind::ClassVariable => (module, "class_variable_get"),
            FieldKind::ClassInstanceVariable => (basic_object, "instance_variable_get"),
        };
        call_trusted(
            &self.vm,
            trusted_owner,
            &Value::Module(self.owner),
            getter,
            &[Value::sym(self.name.as_str())],
        )
        .map_err(|err| match err {
            ReflectError::Runtime(inner) => {
                ReflectError::missing(inner, self.kind.as_str(), &self.name)
            }
            other => other,
        })
    }

    /// Whether this is a constant still waiting for its autoload
    pub fn is_pending_autoload(&self) -> ReflectResult<bool> {
        if self.kind != FieldKind::Constant {
            return Ok(false);
        }
        let module = self.vm.with(|rt| rt.core().module);
        let path = call_trusted(
            &self.vm,
            module,
            &Value::Module(self.owner),
            "autoload?",
            &[Value::sym(self.name.as_str())],
        )?;
        Ok(path.is_truthy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use specula_runtime::{RtResult, RuntimeError};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn zoo() -> (Arc<Vm>, ModuleId, Arc<AtomicBool>) {
        let vm = Vm::new();
        let loaded = Arc::new(AtomicBool::new(false));
        let marker = Arc::clone(&loaded);
        let zoo = vm
            .with(|rt| -> RtResult<ModuleId> {
                let object = rt.core().object;
                let zoo = rt.define_module(object, "Zoo")?;
                rt.const_set(zoo, "CAPACITY", Value::Int(120))?;
                rt.class_variable_set(zoo, "@@visitors", Value::Int(7))?;
                rt.instance_variable_set(&Value::Module(zoo), "@keeper", Value::str("Sam"))?;
                rt.autoload(
                    zoo,
                    "Aviary",
                    "zoo/aviary.rb",
                    Arc::new(move |rt: &mut specula_runtime::Runtime| -> RtResult<()> {
                        marker.store(true, Ordering::SeqCst);
                        rt.define_module(zoo, "Aviary").map(|_| ())
                    }),
                )?;
                Ok(zoo)
            })
            .unwrap();
        (vm, zoo, loaded)
    }

    fn field(
        registry: &Arc<Registry>,
        vm: &Arc<Vm>,
        owner: ModuleId,
        name: &str,
        kind: FieldKind,
    ) -> Arc<FieldMirror> {
        registry.field_mirror(vm, owner, name, kind)
    }

    #[test]
    fn test_field_values() {
        let (vm, zoo, _) = zoo();
        let registry = Arc::new(Registry::new());
        let capacity = field(&registry, &vm, zoo, "CAPACITY", FieldKind::Constant);
        assert_eq!(capacity.value().unwrap(), Value::Int(120));
        assert_eq!(capacity.owner().unwrap().name().unwrap(), "Zoo");

        let visitors = field(&registry, &vm, zoo, "@@visitors", FieldKind::ClassVariable);
        assert_eq!(visitors.value().unwrap(), Value::Int(7));

        let keeper = field(&registry, &vm, zoo, "@keeper", FieldKind::ClassInstanceVariable);
        assert_eq!(keeper.value().unwrap(), Value::str("Sam"));
        assert_eq!(keeper.kind().to_string(), "class instance variable");
    }

    #[test]
    fn test_pending_autoload_until_read() {
        let (vm, zoo, loaded) = zoo();
        let registry = Arc::new(Registry::new());
        let aviary = field(&registry, &vm, zoo, "Aviary", FieldKind::Constant);
        assert!(aviary.is_pending_autoload().unwrap());
        assert!(!loaded.load(Ordering::SeqCst));

        assert!(matches!(aviary.value().unwrap(), Value::Module(_)));
        assert!(loaded.load(Ordering::SeqCst));
        assert!(!aviary.is_pending_autoload().unwrap());
    }

    #[test]
    fn test_missing_field_is_not_found() {
        let (vm, zoo, _) = zoo();
        let registry = Arc::new(Registry::new());
        let err = field(&registry, &vm, zoo, "@@nobody", FieldKind::ClassVariable)
            .value()
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_owner_after_registry_dropped() {
        let (vm, zoo, _) = zoo();
        let registry = Arc::new(Registry::new());
        let capacity = field(&registry, &vm, zoo, "CAPACITY", FieldKind::Constant);
        drop(registry);

        assert_eq!(capacity.value().unwrap(), Value::Int(120));
        assert_eq!(capacity.owner().unwrap_err(), ReflectError::RegistryDropped);
    }

    #[test]
    fn test_not_found_keeps_other_runtime_errors() {
        let err = ReflectError::missing(RuntimeError::TypeError("boom".into()), "constant", "X");
        assert!(matches!(err, ReflectError::Runtime(_)));
    }
}
