//! Method mirror

use std::path::Path;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use specula_runtime::{MethodRef, SourceLocation, Visibility, Vm};

use crate::class_mirror::ClassMirror;
use crate::error::ReflectResult;
use crate::object_mirror::upgrade;
use crate::registry::Registry;

/// Mirror over one method as found on its owner
///
/// Visibility and location are captured when the mirror is built; a class
/// mirror hands out the same instance for a name on every query, so
/// annotations attached to it stick.
#[derive(Debug)]
pub struct MethodMirror {
    vm: Arc<Vm>,
    registry: Weak<Registry>,
    method: MethodRef,
    visibility: Visibility,
    location: Option<SourceLocation>,
    annotations: Mutex<FxHashMap<String, String>>,
}

impl MethodMirror {
    pub(crate) fn new(
        vm: Arc<Vm>,
        registry: Weak<Registry>,
        method: MethodRef,
        visibility: Visibility,
        location: Option<SourceLocation>,
    ) -> Self {
        Self {
            vm,
            registry,
            method,
            visibility,
            location,
            annotations: Mutex::new(FxHashMap::default()),
        }
    }

    /// Method name
    pub fn name(&self) -> &str {
        &self.method.name
    }

    /// The underlying method reference
    pub fn method_ref(&self) -> &MethodRef {
        &self.method
    }

    /// Mirror of the module whose table defines the method
    pub fn owner(&self) -> ReflectResult<Arc<ClassMirror>> {
        Ok(upgrade(&self.registry)?.reflect_class(&self.vm, self.method.owner))
    }

    /// Visibility
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Definition site; `None` for natives
    pub fn source_location(&self) -> Option<&SourceLocation> {
        self.location.as_ref()
    }

    /// Definition file
    pub fn file(&self) -> Option<&Path> {
        self.location.as_ref().map(|loc| loc.file.as_path())
    }

    /// Definition line
    pub fn line(&self) -> Option<u32> {
        self.location.as_ref().map(|loc| loc.line)
    }

    /// Attach a note to this method
    pub fn annotate(&self, key: impl Into<String>, value: impl Into<String>) {
        self.annotations.lock().insert(key.into(), value.into());
    }

    /// Read a note attached with [`MethodMirror::annotate`]
    pub fn annotation(&self, key: &str) -> Option<String> {
        self.annotations.lock().get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use specula_runtime::{ModuleId, RtResult, Runtime, Value};

    fn greeter() -> (Arc<Vm>, ModuleId) {
        let vm = Vm::new();
        let greeter = vm
            .with(|rt| -> RtResult<ModuleId> {
                let object = rt.core().object;
                let greeter = rt.define_class(object, "Greeter", None)?;
                rt.define_method(
                    greeter,
                    "hello",
                    Visibility::Protected,
                    Some(SourceLocation::new("lib/greeter.rb", 12)),
                    Arc::new(|_: &mut Runtime, _: &Value, _: &[Value]| -> RtResult<Value> {
                        Ok(Value::str("hi"))
                    }),
                )?;
                Ok(greeter)
            })
            .unwrap();
        (vm, greeter)
    }

    #[test]
    fn test_method_mirror_fields() {
        let (vm, greeter) = greeter();
        let registry = Arc::new(Registry::new());
        let hello = registry
            .method_mirror(
                &vm,
                MethodRef {
                    owner: greeter,
                    name: "hello".to_string(),
                },
            )
            .unwrap();

        assert_eq!(hello.name(), "hello");
        assert_eq!(hello.visibility(), Visibility::Protected);
        assert_eq!(hello.file(), Some(Path::new("lib/greeter.rb")));
        assert_eq!(hello.line(), Some(12));
        assert_eq!(hello.owner().unwrap().name().unwrap(), "Greeter");
    }

    #[test]
    fn test_natives_have_no_location() {
        let vm = Vm::new();
        let module = vm.with(|rt| rt.core().module);
        let registry = Arc::new(Registry::new());
        let name = registry
            .method_mirror(
                &vm,
                MethodRef {
                    owner: module,
                    name: "name".to_string(),
                },
            )
            .unwrap();
        assert!(name.source_location().is_none());
        assert!(name.file().is_none());
    }

    #[test]
    fn test_annotations() {
        let (vm, greeter) = greeter();
        let registry = Arc::new(Registry::new());
        let hello = registry
            .method_mirror(
                &vm,
                MethodRef {
                    owner: greeter,
                    name: "hello".to_string(),
                },
            )
            .unwrap();
        assert_eq!(hello.annotation("deprecated"), None);
        hello.annotate("deprecated", "use #greet");
        assert_eq!(hello.annotation("deprecated").as_deref(), Some("use #greet"));
    }

    #[test]
    fn test_missing_method_is_not_found() {
        let (vm, greeter) = greeter();
        let registry = Arc::new(Registry::new());
        let err = registry
            .method_mirror(
                &vm,
                MethodRef {
                    owner: greeter,
                    name: "goodbye".to_string(),
                },
            )
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
