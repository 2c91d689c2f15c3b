//! Integration tests for images loaded into a shared runtime

use std::sync::Arc;
use std::thread;

use specula_runtime::{Image, ModuleId, RuntimeError, Value, Vm};

const SHELTER: &str = r#"
[[module]]
name = "Shelter"
constants = { CAPACITY = 40 }
autoload = { Vet = "shelter/vet.rb" }

[[module]]
name = "Named"

[[class]]
name = "Shelter::Dog"
superclass = "Animal"
include = ["Named"]

[[class.method]]
name = "bark"
file = "shelter/dog.rb"
line = 4
returns = "woof"

[[class.method]]
name = "inspect"
returns = "a very good dog"

[[class.singleton_method]]
name = "name"
returns = "Cat"

[[class]]
name = "Animal"

[[class.method]]
name = "breathe"
returns = true
"#;

fn load() -> Arc<Vm> {
    let vm = Vm::new();
    Image::from_str(SHELTER).unwrap().load(&vm).unwrap();
    vm
}

fn lookup(vm: &Vm, name: &str) -> ModuleId {
    vm.with(|rt| rt.lookup(name)).unwrap()
}

fn names(value: Value) -> Vec<String> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_name().unwrap().to_string())
        .collect()
}

// ============================================================================
// Dispatch
// ============================================================================

mod dispatch {
    use super::*;

    #[test]
    fn test_inherited_and_own_methods() {
        let vm = load();
        let dog = lookup(&vm, "Shelter::Dog");
        let rex = Value::Object(vm.with(|rt| rt.allocate(dog)).unwrap());

        assert_eq!(vm.send(&rex, "bark", &[]).unwrap(), Value::str("woof"));
        assert_eq!(vm.send(&rex, "breathe", &[]).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_overrides_win_through_send() {
        let vm = load();
        let dog = lookup(&vm, "Shelter::Dog");
        let rex = Value::Object(vm.with(|rt| rt.allocate(dog)).unwrap());

        assert_eq!(vm.send(&rex, "inspect", &[]).unwrap(), Value::str("a very good dog"));
        assert_eq!(vm.send(&Value::Module(dog), "name", &[]).unwrap(), Value::str("Cat"));
        // The arena still knows the real name
        assert_eq!(vm.with(|rt| rt.display_module(dog)), "Shelter::Dog");
    }

    #[test]
    fn test_undef_stops_lookup() {
        let vm = load();
        let dog = lookup(&vm, "Shelter::Dog");
        vm.with(|rt| rt.undef_method(dog, "breathe")).unwrap();
        let rex = Value::Object(vm.with(|rt| rt.allocate(dog)).unwrap());

        let err = vm.send(&rex, "breathe", &[]).unwrap_err();
        assert!(matches!(err, RuntimeError::NoMethodError { .. }));

        let animal = lookup(&vm, "Animal");
        let generic = Value::Object(vm.with(|rt| rt.allocate(animal)).unwrap());
        assert_eq!(vm.send(&generic, "breathe", &[]).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_pristine_survives_override() {
        let vm = load();
        let module = vm.with(|rt| rt.core().module);
        vm.with(|rt| {
            let owner = rt.core().basic_object;
            assert!(rt.pristine_method(owner, "inspect").is_some());
            assert!(rt.pristine_method(module, "ancestors").is_some());
            assert!(rt.pristine_method(module, "bark").is_none());
        });
    }
}

// ============================================================================
// Hierarchy
// ============================================================================

mod hierarchy {
    use super::*;

    #[test]
    fn test_ancestors_with_mixin() {
        let vm = load();
        let dog = lookup(&vm, "Shelter::Dog");
        let chain = names_of(&vm, vm.with(|rt| rt.ancestors(dog)).unwrap());
        assert_eq!(
            chain,
            vec!["Shelter::Dog", "Named", "Animal", "Object", "Kernel", "BasicObject"]
        );
    }

    #[test]
    fn test_singleton_superclass_follows_class() {
        let vm = load();
        let dog = lookup(&vm, "Shelter::Dog");
        let animal = lookup(&vm, "Animal");
        vm.with(|rt| {
            let dog_meta = rt.singleton_class(&Value::Module(dog)).unwrap();
            let animal_meta = rt.singleton_class(&Value::Module(animal)).unwrap();
            assert_eq!(rt.module(dog_meta).unwrap().superclass(), Some(animal_meta));
            assert_eq!(rt.display_module(dog_meta), "#<Class:Shelter::Dog>");
        });
    }

    #[test]
    fn test_live_modules_include_image_classes() {
        let vm = load();
        let dog = lookup(&vm, "Shelter::Dog");
        let shelter = lookup(&vm, "Shelter");
        let live = vm.with(|rt| rt.live_modules());
        assert!(live.contains(&dog));
        assert!(live.contains(&shelter));
    }

    fn names_of(vm: &Vm, ids: Vec<ModuleId>) -> Vec<String> {
        vm.with(|rt| ids.into_iter().map(|id| rt.display_module(id)).collect())
    }
}

// ============================================================================
// Constants
// ============================================================================

mod constants {
    use super::*;

    #[test]
    fn test_autoload_is_pending_until_read() {
        let vm = load();
        let shelter = Value::Module(lookup(&vm, "Shelter"));

        assert_eq!(
            vm.send(&shelter, "autoload?", &[Value::sym("Vet")]).unwrap(),
            Value::str("shelter/vet.rb")
        );
        assert!(vm.send(&shelter, "const_defined?", &[Value::sym("Vet")]).unwrap().is_truthy());
        assert!(vm.with(|rt| rt.lookup("Shelter::Vet")).is_none());

        vm.send(&shelter, "const_get", &[Value::sym("Vet")]).unwrap();
        assert!(vm.with(|rt| rt.lookup("Shelter::Vet")).is_some());
        assert_eq!(vm.send(&shelter, "autoload?", &[Value::sym("Vet")]).unwrap(), Value::Nil);
    }

    #[test]
    fn test_own_constants_in_definition_order() {
        // Nested classes are bound while defining, before bodies are populated
        let vm = load();
        let shelter = Value::Module(lookup(&vm, "Shelter"));
        let own = names(vm.send(&shelter, "constants", &[Value::Bool(false)]).unwrap());
        assert_eq!(own, vec!["Dog", "CAPACITY", "Vet"]);
    }

    #[test]
    fn test_missing_constant() {
        let vm = load();
        let shelter = Value::Module(lookup(&vm, "Shelter"));
        let err = vm.send(&shelter, "const_get", &[Value::sym("Nope")]).unwrap_err();
        assert!(err.is_missing_name());
    }
}

// ============================================================================
// Sharing
// ============================================================================

mod sharing {
    use super::*;

    #[test]
    fn test_vm_shared_across_threads() {
        let vm = load();
        let dog = lookup(&vm, "Shelter::Dog");

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let vm = Arc::clone(&vm);
                thread::spawn(move || {
                    let rex = Value::Object(vm.with(|rt| rt.allocate(dog)).unwrap());
                    vm.send(&rex, "bark", &[]).unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Value::str("woof"));
        }
    }

    #[test]
    fn test_vm_ids_are_distinct() {
        assert_ne!(Vm::new().id(), Vm::new().id());
    }
}
