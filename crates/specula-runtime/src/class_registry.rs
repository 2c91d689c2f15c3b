//! Class registry: arena storage for modules, classes and objects

use rustc_hash::FxHashMap;

use crate::module::{ModuleKind, RModule, RObject};
use crate::value::{ModuleId, ObjectId};

/// Arena of every module and object in a runtime
#[derive(Debug, Default)]
pub struct ClassRegistry {
    /// Modules indexed by ID
    modules: Vec<RModule>,
    /// Objects indexed by ID
    objects: Vec<RObject>,
    /// Qualified name to ID mapping
    name_to_id: FxHashMap<String, ModuleId>,
}

impl ClassRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new module or class
    pub fn register_module(&mut self, kind: ModuleKind) -> ModuleId {
        let id = ModuleId(self.modules.len() as u32);
        self.modules.push(RModule::new(id, kind));
        id
    }

    /// Allocate a new object of `class`
    pub fn register_object(&mut self, class: ModuleId) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(RObject::new(class));
        id
    }

    /// Record the qualified name of a module
    pub fn register_name(&mut self, name: String, id: ModuleId) {
        self.name_to_id.insert(name, id);
    }

    /// Forget a qualified name
    pub fn unregister_name(&mut self, name: &str) -> Option<ModuleId> {
        self.name_to_id.remove(name)
    }

    /// Get module by ID
    pub fn get(&self, id: ModuleId) -> Option<&RModule> {
        self.modules.get(id.index())
    }

    /// Get mutable module by ID
    pub fn get_mut(&mut self, id: ModuleId) -> Option<&mut RModule> {
        self.modules.get_mut(id.index())
    }

    /// Get object by ID
    pub fn object(&self, id: ObjectId) -> Option<&RObject> {
        self.objects.get(id.index())
    }

    /// Get mutable object by ID
    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut RObject> {
        self.objects.get_mut(id.index())
    }

    /// Get module by qualified name
    pub fn get_by_name(&self, name: &str) -> Option<ModuleId> {
        self.name_to_id.get(name).copied()
    }

    /// Iterate over all modules
    pub fn iter(&self) -> impl Iterator<Item = &RModule> {
        self.modules.iter()
    }

    /// Number of modules (including singleton classes)
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Number of objects
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_module() {
        let mut registry = ClassRegistry::new();
        let a = registry.register_module(ModuleKind::Module);
        let b = registry.register_module(ModuleKind::Class { superclass: None });
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert!(!registry.get(a).unwrap().is_class());
        assert!(registry.get(b).unwrap().is_class());
        assert_eq!(registry.module_count(), 2);
    }

    #[test]
    fn test_get_by_name() {
        let mut registry = ClassRegistry::new();
        let id = registry.register_module(ModuleKind::Class { superclass: None });
        registry.register_name("Point".to_string(), id);
        assert_eq!(registry.get_by_name("Point"), Some(id));
        assert_eq!(registry.get_by_name("Circle"), None);
    }

    #[test]
    fn test_register_object() {
        let mut registry = ClassRegistry::new();
        let class = registry.register_module(ModuleKind::Class { superclass: None });
        let obj = registry.register_object(class);
        assert_eq!(registry.object(obj).unwrap().class(), class);
        assert_eq!(registry.object_count(), 1);
    }
}
