//! Rebinding trusted implementations onto untrusted receivers
//!
//! Inspected programs can redefine or `undef` any introspection method on
//! themselves (`Dog.name`, `Module#ancestors`, ...). Every structural query a
//! mirror makes goes through [`rebind`] instead of dispatch: the operation is
//! looked up on a trusted owner, preferring the native captured when the
//! runtime booted, and then run with the target as `self`.

use std::sync::Arc;

use specula_runtime::{MethodEntry, ModuleId, Runtime, Value, Vm};

use crate::error::{ReflectError, ReflectResult};

/// A trusted method bound to a receiver
#[derive(Debug, Clone)]
pub struct Rebound {
    vm: Arc<Vm>,
    receiver: Value,
    owner: ModuleId,
    entry: MethodEntry,
}

impl Rebound {
    /// Run the trusted implementation with the bound receiver as `self`
    pub fn call(&self, args: &[Value]) -> ReflectResult<Value> {
        let value = self
            .vm
            .with(|rt| rt.invoke(&self.entry, &self.receiver, args))?;
        Ok(value)
    }

    /// The module the implementation was found on
    pub fn owner(&self) -> ModuleId {
        self.owner
    }

    /// Operation name
    pub fn operation(&self) -> &str {
        &self.entry.name
    }

    /// The bound receiver
    pub fn receiver(&self) -> &Value {
        &self.receiver
    }
}

/// Bind `trusted_owner`'s implementation of `operation` to `target`
///
/// Fails with [`ReflectError::Lookup`] if no ancestor of `trusted_owner`
/// defines `operation`, and with [`ReflectError::IncompatibleReceiver`] if
/// `target` is not an instance of `trusted_owner`. Nothing runs until
/// [`Rebound::call`].
pub fn rebind(
    vm: &Arc<Vm>,
    trusted_owner: ModuleId,
    target: &Value,
    operation: &str,
) -> ReflectResult<Rebound> {
    let (owner, entry) = vm.with(|rt| -> ReflectResult<(ModuleId, MethodEntry)> {
        let found = trusted_entry(rt, trusted_owner, operation)?;
        if !rt.is_a(target, trusted_owner)? {
            return Err(ReflectError::IncompatibleReceiver {
                owner: rt.display_module(trusted_owner),
                target: rt.inspect(target),
            });
        }
        Ok(found)
    })?;
    Ok(Rebound {
        vm: Arc::clone(vm),
        receiver: target.clone(),
        owner,
        entry,
    })
}

/// Bind and call in one step
pub fn call_trusted(
    vm: &Arc<Vm>,
    trusted_owner: ModuleId,
    target: &Value,
    operation: &str,
    args: &[Value],
) -> ReflectResult<Value> {
    rebind(vm, trusted_owner, target, operation)?.call(args)
}

fn trusted_entry(
    rt: &Runtime,
    trusted_owner: ModuleId,
    operation: &str,
) -> ReflectResult<(ModuleId, MethodEntry)> {
    for ancestor in rt.ancestors(trusted_owner)? {
        if let Some(entry) = rt.pristine_method(ancestor, operation) {
            return Ok((ancestor, entry.clone()));
        }
        match rt.module(ancestor)?.methods().get(operation) {
            Some(entry) if entry.is_undefined() => break,
            Some(entry) => return Ok((ancestor, entry.clone())),
            None => {}
        }
    }
    Err(ReflectError::Lookup {
        owner: rt.display_module(trusted_owner),
        operation: operation.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use specula_runtime::{RtResult, Visibility};

    fn dog(vm: &Arc<Vm>) -> ModuleId {
        vm.with(|rt| {
            let object = rt.core().object;
            rt.define_class(object, "Dog", None)
        })
        .unwrap()
    }

    #[test]
    fn test_rebind_bypasses_singleton_override() {
        let vm = Vm::new();
        let dog = dog(&vm);
        vm.with(|rt| -> RtResult<()> {
            let singleton = rt.singleton_class(&Value::Module(dog))?;
            rt.define_native(singleton, "name", Visibility::Public, |_, _, _| {
                Ok(Value::str("Cat"))
            })
        })
        .unwrap();

        assert_eq!(
            vm.send(&Value::Module(dog), "name", &[]).unwrap(),
            Value::str("Cat")
        );
        let module = vm.with(|rt| rt.core().module);
        let name = call_trusted(&vm, module, &Value::Module(dog), "name", &[]).unwrap();
        assert_eq!(name, Value::str("Dog"));
    }

    #[test]
    fn test_rebind_prefers_pristine_over_redefinition_on_owner() {
        let vm = Vm::new();
        let dog = dog(&vm);
        let module = vm.with(|rt| rt.core().module);
        vm.with(|rt| -> RtResult<()> {
            rt.define_native(module, "inspect", Visibility::Public, |_, _, _| {
                Ok(Value::str("hijacked"))
            })?;
            rt.undef_method(module, "ancestors")
        })
        .unwrap();

        let name = call_trusted(&vm, module, &Value::Module(dog), "inspect", &[]).unwrap();
        assert_eq!(name, Value::str("Dog"));
        let ancestors = call_trusted(&vm, module, &Value::Module(dog), "ancestors", &[]).unwrap();
        assert_eq!(ancestors.as_array().unwrap()[0], Value::Module(dog));
    }

    #[test]
    fn test_rebind_lookup_error() {
        let vm = Vm::new();
        let dog = dog(&vm);
        let class = vm.with(|rt| rt.core().class);
        let err = rebind(&vm, class, &Value::Module(dog), "no_such_thing").unwrap_err();
        assert!(matches!(err, ReflectError::Lookup { .. }));
    }

    #[test]
    fn test_rebind_incompatible_receiver() {
        let vm = Vm::new();
        let module = vm.with(|rt| rt.core().module);
        let err = rebind(&vm, module, &Value::Int(3), "name").unwrap_err();
        assert!(matches!(err, ReflectError::IncompatibleReceiver { .. }));
    }

    #[test]
    fn test_rebound_reports_owner() {
        let vm = Vm::new();
        let dog = dog(&vm);
        let (class, basic_object) = vm.with(|rt| (rt.core().class, rt.core().basic_object));
        let rebound = rebind(&vm, class, &Value::Module(dog), "is_a?").unwrap();
        assert_eq!(rebound.owner(), basic_object);
        assert_eq!(rebound.operation(), "is_a?");
        assert_eq!(rebound.receiver(), &Value::Module(dog));
    }
}
