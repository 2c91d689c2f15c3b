//! Core natives
//!
//! Introspection primitives installed on `BasicObject`, `Module`, `Class`
//! and `Kernel` at bootstrap. Programs may override or `undef` any of these
//! through dispatch; the runtime keeps the originals as pristine entries.
//!
//! | Owner       | Methods                                                                 |
//! |-------------|-------------------------------------------------------------------------|
//! | BasicObject | `__id__` `equal?` `==` `class` `singleton_class` `is_a?` `inspect` `to_s` `instance_variables` `instance_variable_get` `methods` |
//! | Kernel      | `respond_to?`                                                           |
//! | Module      | `name` `inspect` `to_s` `==` `constants` `const_get` `const_defined?` `autoload?` `class_variables` `class_variable_get` `ancestors` `included_modules` `instance_methods` `public_instance_methods` `protected_instance_methods` `private_instance_methods` `instance_method` `method_defined?` |
//! | Class       | `superclass` `allocate`                                                 |

use crate::error::{RtResult, RuntimeError};
use crate::module::Visibility;
use crate::runtime::Runtime;
use crate::value::{MethodRef, ModuleId, Value};

pub(crate) fn install(rt: &mut Runtime) {
    let core = *rt.core();
    let public = Visibility::Public;

    rt.install_native(core.basic_object, "__id__", public, |rt, recv, _| {
        Ok(Value::Int(rt.object_id(recv)))
    });
    rt.install_native(core.basic_object, "equal?", public, identical);
    rt.install_native(core.basic_object, "==", public, identical);
    rt.install_native(core.basic_object, "class", public, |rt, recv, _| {
        Ok(Value::Module(rt.real_class_of(recv)?))
    });
    rt.install_native(core.basic_object, "singleton_class", public, |rt, recv, _| {
        Ok(Value::Module(rt.singleton_class(recv)?))
    });
    rt.install_native(core.basic_object, "is_a?", public, |rt, recv, args| {
        let module = module_arg(rt, args, 0, "is_a?")?;
        Ok(Value::Bool(rt.is_a(recv, module)?))
    });
    rt.install_native(core.basic_object, "inspect", public, |rt, recv, _| {
        Ok(Value::Str(rt.inspect(recv)))
    });
    rt.install_native(core.basic_object, "to_s", public, |rt, recv, _| {
        Ok(Value::Str(rt.inspect(recv)))
    });
    rt.install_native(core.basic_object, "instance_variables", public, |rt, recv, _| {
        Ok(symbols(rt.instance_variable_names(recv)?))
    });
    rt.install_native(core.basic_object, "instance_variable_get", public, |rt, recv, args| {
        let name = name_arg(args, 0, "instance_variable_get")?;
        rt.instance_variable_get(recv, name)
    });
    rt.install_native(core.basic_object, "methods", public, |rt, recv, _| {
        let class = rt.class_of(recv)?;
        Ok(symbols(rt.method_names(class, true, |v| v != Visibility::Private)?))
    });

    rt.install_native(core.kernel, "respond_to?", public, |rt, recv, args| {
        let name = name_arg(args, 0, "respond_to?")?;
        let class = rt.class_of(recv)?;
        let found = rt.find_method(class, name)?;
        Ok(Value::Bool(found.is_some_and(|(_, e)| e.visibility == Visibility::Public)))
    });

    rt.install_native(core.module, "name", public, |rt, recv, _| {
        let id = receiver_module(rt, recv, "name")?;
        Ok(match rt.module(id)?.name() {
            Some(name) => Value::str(name),
            None => Value::Nil,
        })
    });
    rt.install_native(core.module, "inspect", public, module_display);
    rt.install_native(core.module, "to_s", public, module_display);
    rt.install_native(core.module, "==", public, identical);
    rt.install_native(core.module, "constants", public, |rt, recv, args| {
        let id = receiver_module(rt, recv, "constants")?;
        Ok(symbols(rt.constant_names(id, flag_arg(args, 0, true))?))
    });
    rt.install_native(core.module, "const_get", public, |rt, recv, args| {
        let id = receiver_module(rt, recv, "const_get")?;
        let name = name_arg(args, 0, "const_get")?;
        rt.const_get(id, name)
    });
    rt.install_native(core.module, "const_defined?", public, |rt, recv, args| {
        let id = receiver_module(rt, recv, "const_defined?")?;
        let name = name_arg(args, 0, "const_defined?")?;
        Ok(Value::Bool(rt.const_defined(id, name)?))
    });
    rt.install_native(core.module, "autoload?", public, |rt, recv, args| {
        let id = receiver_module(rt, recv, "autoload?")?;
        let name = name_arg(args, 0, "autoload?")?;
        Ok(match rt.autoload_path(id, name)? {
            Some(path) => Value::Str(path),
            None => Value::Nil,
        })
    });
    rt.install_native(core.module, "class_variables", public, |rt, recv, _| {
        let id = receiver_module(rt, recv, "class_variables")?;
        Ok(symbols(rt.class_variable_names(id)?))
    });
    rt.install_native(core.module, "class_variable_get", public, |rt, recv, args| {
        let id = receiver_module(rt, recv, "class_variable_get")?;
        let name = name_arg(args, 0, "class_variable_get")?;
        rt.class_variable_get(id, name)
    });
    rt.install_native(core.module, "ancestors", public, |rt, recv, _| {
        let id = receiver_module(rt, recv, "ancestors")?;
        Ok(modules(rt.ancestors(id)?))
    });
    rt.install_native(core.module, "included_modules", public, |rt, recv, _| {
        let id = receiver_module(rt, recv, "included_modules")?;
        let mut mixins = Vec::new();
        for ancestor in rt.ancestors(id)? {
            if !rt.module(ancestor)?.is_class() {
                mixins.push(ancestor);
            }
        }
        Ok(modules(mixins))
    });
    rt.install_native(core.module, "instance_methods", public, |rt, recv, args| {
        method_list(rt, recv, args, "instance_methods", |v| v != Visibility::Private)
    });
    rt.install_native(core.module, "public_instance_methods", public, |rt, recv, args| {
        method_list(rt, recv, args, "public_instance_methods", |v| v == Visibility::Public)
    });
    rt.install_native(core.module, "protected_instance_methods", public, |rt, recv, args| {
        method_list(rt, recv, args, "protected_instance_methods", |v| {
            v == Visibility::Protected
        })
    });
    rt.install_native(core.module, "private_instance_methods", public, |rt, recv, args| {
        method_list(rt, recv, args, "private_instance_methods", |v| v == Visibility::Private)
    });
    rt.install_native(core.module, "instance_method", public, |rt, recv, args| {
        let id = receiver_module(rt, recv, "instance_method")?;
        let name = name_arg(args, 0, "instance_method")?;
        match rt.find_method(id, name)? {
            Some((owner, _)) => Ok(Value::Method(MethodRef {
                owner,
                name: name.to_string(),
            })),
            None => Err(RuntimeError::UndefinedMethod {
                owner: rt.display_module(id),
                name: name.to_string(),
            }),
        }
    });
    rt.install_native(core.module, "method_defined?", public, |rt, recv, args| {
        let id = receiver_module(rt, recv, "method_defined?")?;
        let name = name_arg(args, 0, "method_defined?")?;
        let found = rt.find_method(id, name)?;
        Ok(Value::Bool(found.is_some_and(|(_, e)| e.visibility != Visibility::Private)))
    });

    rt.install_native(core.class, "superclass", public, |rt, recv, _| {
        let id = receiver_module(rt, recv, "superclass")?;
        let m = rt.module(id)?;
        if !m.is_class() {
            return Err(RuntimeError::TypeError(format!(
                "{} is not a class",
                rt.display_module(id)
            )));
        }
        Ok(match m.superclass() {
            Some(parent) => Value::Module(parent),
            None => Value::Nil,
        })
    });
    rt.install_native(core.class, "allocate", public, |rt, recv, _| {
        let id = receiver_module(rt, recv, "allocate")?;
        Ok(Value::Object(rt.allocate(id)?))
    });
}

fn identical(_rt: &mut Runtime, recv: &Value, args: &[Value]) -> RtResult<Value> {
    Ok(Value::Bool(args.first() == Some(recv)))
}

fn module_display(rt: &mut Runtime, recv: &Value, _args: &[Value]) -> RtResult<Value> {
    let id = receiver_module(rt, recv, "inspect")?;
    Ok(Value::Str(rt.display_module(id)))
}

fn method_list(
    rt: &mut Runtime,
    recv: &Value,
    args: &[Value],
    method: &str,
    filter: impl Fn(Visibility) -> bool,
) -> RtResult<Value> {
    let id = receiver_module(rt, recv, method)?;
    Ok(symbols(rt.method_names(id, flag_arg(args, 0, true), filter)?))
}

fn receiver_module(rt: &Runtime, recv: &Value, method: &str) -> RtResult<ModuleId> {
    recv.as_module().ok_or_else(|| {
        RuntimeError::TypeError(format!("{} called on non-module {}", method, rt.inspect(recv)))
    })
}

fn module_arg(rt: &Runtime, args: &[Value], index: usize, method: &str) -> RtResult<ModuleId> {
    match args.get(index) {
        Some(Value::Module(id)) => Ok(*id),
        Some(other) => Err(RuntimeError::TypeError(format!(
            "{}: class or module required, got {}",
            method,
            rt.inspect(other)
        ))),
        None => Err(RuntimeError::ArgumentError(format!(
            "{}: wrong number of arguments (given {}, expected {})",
            method,
            args.len(),
            index + 1
        ))),
    }
}

fn name_arg<'a>(args: &'a [Value], index: usize, method: &str) -> RtResult<&'a str> {
    match args.get(index) {
        Some(v) => v.as_name().ok_or_else(|| {
            RuntimeError::TypeError(format!("{}: {:?} is not a symbol nor a string", method, v))
        }),
        None => Err(RuntimeError::ArgumentError(format!(
            "{}: wrong number of arguments (given {}, expected {})",
            method,
            args.len(),
            index + 1
        ))),
    }
}

fn flag_arg(args: &[Value], index: usize, default: bool) -> bool {
    args.get(index).map(Value::is_truthy).unwrap_or(default)
}

fn symbols(names: Vec<String>) -> Value {
    Value::Array(names.into_iter().map(Value::Sym).collect())
}

fn modules(ids: Vec<ModuleId>) -> Value {
    Value::Array(ids.into_iter().map(Value::Module).collect())
}
