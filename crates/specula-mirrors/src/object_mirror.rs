//! Object mirror: introspection any value supports

use std::sync::{Arc, Weak};

use specula_runtime::{CoreTypes, ModuleId, Value, Vm};

use crate::class_mirror::ClassMirror;
use crate::error::{ReflectError, ReflectResult};
use crate::rebind::call_trusted;
use crate::registry::Registry;

/// Mirror over an arbitrary runtime value
///
/// Every query is answered by `BasicObject`'s natives bound to the subject,
/// so a subject that overrides `inspect` or `class` on itself is still
/// described accurately.
///
/// Mirrors point back at their registry weakly; the registry owns them.
#[derive(Debug)]
pub struct ObjectMirror {
    vm: Arc<Vm>,
    registry: Weak<Registry>,
    subject: Value,
}

impl ObjectMirror {
    pub(crate) fn new(vm: Arc<Vm>, registry: Weak<Registry>, subject: Value) -> Self {
        Self {
            vm,
            registry,
            subject,
        }
    }

    /// The reflected value
    pub fn subject(&self) -> &Value {
        &self.subject
    }

    /// The runtime the subject lives in
    pub fn vm(&self) -> &Arc<Vm> {
        &self.vm
    }

    /// The registry this mirror came from
    ///
    /// Fails with [`ReflectError::RegistryDropped`] once the registry is gone.
    pub fn registry(&self) -> ReflectResult<Arc<Registry>> {
        upgrade(&self.registry)
    }

    pub(crate) fn registry_handle(&self) -> &Weak<Registry> {
        &self.registry
    }

    /// Display representation
    pub fn name(&self) -> ReflectResult<String> {
        let basic_object = self.core().basic_object;
        let value = call_trusted(&self.vm, basic_object, &self.subject, "inspect", &[])?;
        expect_str(value, "inspect")
    }

    /// Mirror of the subject's class (singleton classes skipped)
    pub fn target_class(&self) -> ReflectResult<Arc<ClassMirror>> {
        let basic_object = self.core().basic_object;
        let value = call_trusted(&self.vm, basic_object, &self.subject, "class", &[])?;
        let class = expect_module(value, "class")?;
        Ok(self.registry()?.reflect_class(&self.vm, class))
    }

    /// Instance variables and their current values, in definition order
    pub fn variables(&self) -> ReflectResult<Vec<(String, Value)>> {
        let basic_object = self.core().basic_object;
        let names = self.call(basic_object, "instance_variables", &[])?;
        expect_names(&names, "instance_variables")?
            .into_iter()
            .map(|name| {
                let value = self.call(
                    basic_object,
                    "instance_variable_get",
                    &[Value::sym(name.clone())],
                )?;
                Ok((name, value))
            })
            .collect()
    }

    /// Stable integer identity of the subject
    pub fn reflectee_id(&self) -> ReflectResult<i64> {
        let basic_object = self.core().basic_object;
        let value = self.call(basic_object, "__id__", &[])?;
        value.as_int().ok_or_else(|| ReflectError::UnexpectedResult {
            operation: "__id__",
            got: format!("{:?}", value),
        })
    }

    pub(crate) fn call(
        &self,
        trusted_owner: ModuleId,
        operation: &str,
        args: &[Value],
    ) -> ReflectResult<Value> {
        call_trusted(&self.vm, trusted_owner, &self.subject, operation, args)
    }

    pub(crate) fn core(&self) -> CoreTypes {
        self.vm.with(|rt| *rt.core())
    }
}

pub(crate) fn upgrade(registry: &Weak<Registry>) -> ReflectResult<Arc<Registry>> {
    registry.upgrade().ok_or(ReflectError::RegistryDropped)
}

pub(crate) fn expect_str(value: Value, operation: &'static str) -> ReflectResult<String> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(ReflectError::UnexpectedResult {
            operation,
            got: format!("{:?}", other),
        }),
    }
}

pub(crate) fn expect_module(value: Value, operation: &'static str) -> ReflectResult<ModuleId> {
    value.as_module().ok_or_else(|| ReflectError::UnexpectedResult {
        operation,
        got: format!("{:?}", value),
    })
}

/// Names from a symbol array (`constants`, `instance_methods`, ...)
pub(crate) fn expect_names(value: &Value, operation: &'static str) -> ReflectResult<Vec<String>> {
    let unexpected = || ReflectError::UnexpectedResult {
        operation,
        got: format!("{:?}", value),
    };
    value
        .as_array()
        .ok_or_else(unexpected)?
        .iter()
        .map(|item| item.as_name().map(str::to_string).ok_or_else(unexpected))
        .collect()
}

/// Module ids from a module array (`ancestors`)
pub(crate) fn expect_modules(
    value: &Value,
    operation: &'static str,
) -> ReflectResult<Vec<ModuleId>> {
    let unexpected = || ReflectError::UnexpectedResult {
        operation,
        got: format!("{:?}", value),
    };
    value
        .as_array()
        .ok_or_else(unexpected)?
        .iter()
        .map(|item| item.as_module().ok_or_else(unexpected))
        .collect()
}
