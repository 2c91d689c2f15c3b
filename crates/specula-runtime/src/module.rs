//! Module and class representation
//!
//! A module owns four name tables: constants, class variables, class-level
//! instance variables and methods. Tables keep declaration order, which is
//! the order enumeration natives report names in.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::RtResult;
use crate::runtime::Runtime;
use crate::value::{ModuleId, SourceLocation, Value};

/// Native or scripted method body
pub type MethodBody = Arc<dyn Fn(&mut Runtime, &Value, &[Value]) -> RtResult<Value> + Send + Sync>;

/// Hook run when an autoloaded constant is first read
pub type AutoloadHook = Arc<dyn Fn(&mut Runtime) -> RtResult<()> + Send + Sync>;

/// Insertion-ordered name table
#[derive(Debug, Clone)]
pub struct Table<T> {
    indices: FxHashMap<String, usize>,
    entries: Vec<(String, T)>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            indices: FxHashMap::default(),
            entries: Vec::new(),
        }
    }
}

impl<T> Table<T> {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry; replacing keeps the original position
    pub fn insert(&mut self, name: impl Into<String>, value: T) {
        let name = name.into();
        if let Some(&index) = self.indices.get(&name) {
            self.entries[index].1 = value;
        } else {
            self.indices.insert(name.clone(), self.entries.len());
            self.entries.push((name, value));
        }
    }

    /// Look up an entry
    pub fn get(&self, name: &str) -> Option<&T> {
        self.indices.get(name).map(|&i| &self.entries[i].1)
    }

    /// Look up an entry mutably
    pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        match self.indices.get(name) {
            Some(&i) => Some(&mut self.entries[i].1),
            None => None,
        }
    }

    /// Remove an entry, returning it
    pub fn remove(&mut self, name: &str) -> Option<T> {
        let index = self.indices.remove(name)?;
        let (_, value) = self.entries.remove(index);
        for slot in self.indices.values_mut() {
            if *slot > index {
                *slot -= 1;
            }
        }
        Some(value)
    }

    /// Check if an entry exists
    pub fn contains(&self, name: &str) -> bool {
        self.indices.contains_key(name)
    }

    /// Names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Entries in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Method visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Visibility {
    /// Callable from anywhere
    Public,
    /// Callable from instances of the owner's descendants
    Protected,
    /// Callable without an explicit receiver only
    Private,
}

impl Visibility {
    /// Lowercase keyword
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::Private => "private",
        }
    }

    /// Parse a lowercase keyword
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Visibility::Public),
            "protected" => Some(Visibility::Protected),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One slot in a method table
#[derive(Clone)]
pub struct MethodEntry {
    /// Method name
    pub name: String,
    /// Visibility
    pub visibility: Visibility,
    /// Definition site (None for natives)
    pub location: Option<SourceLocation>,
    /// Body; None marks an `undef` tombstone that stops lookup
    body: Option<MethodBody>,
}

impl MethodEntry {
    /// Create a method entry
    pub fn new(
        name: impl Into<String>,
        visibility: Visibility,
        location: Option<SourceLocation>,
        body: MethodBody,
    ) -> Self {
        Self {
            name: name.into(),
            visibility,
            location,
            body: Some(body),
        }
    }

    /// Create an `undef` tombstone
    pub fn undefined(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::Public,
            location: None,
            body: None,
        }
    }

    /// Whether this entry is an `undef` tombstone
    pub fn is_undefined(&self) -> bool {
        self.body.is_none()
    }

    /// Body, if this is a real method
    pub fn body(&self) -> Option<&MethodBody> {
        self.body.as_ref()
    }
}

impl fmt::Debug for MethodEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodEntry")
            .field("name", &self.name)
            .field("visibility", &self.visibility)
            .field("location", &self.location)
            .field("undefined", &self.is_undefined())
            .finish()
    }
}

/// One slot in a constant table
#[derive(Clone)]
pub enum ConstEntry {
    /// Materialized constant
    Value(Value),
    /// Registered for autoload, not loaded yet
    Autoload {
        /// Path the constant is loaded from
        path: String,
        /// Hook that defines the constant
        hook: AutoloadHook,
    },
}

impl ConstEntry {
    /// Whether the constant is still waiting to be loaded
    pub fn is_pending(&self) -> bool {
        matches!(self, ConstEntry::Autoload { .. })
    }
}

impl fmt::Debug for ConstEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstEntry::Value(v) => f.debug_tuple("Value").field(v).finish(),
            ConstEntry::Autoload { path, .. } => {
                f.debug_struct("Autoload").field("path", path).finish()
            }
        }
    }
}

/// Module or class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// Plain module (mixin / namespace)
    Module,
    /// Class with an optional superclass (None only for the root class)
    Class {
        /// Direct superclass
        superclass: Option<ModuleId>,
    },
}

/// A module or class in the runtime
#[derive(Debug, Clone)]
pub struct RModule {
    pub(crate) id: ModuleId,
    pub(crate) kind: ModuleKind,
    /// Qualified name, assigned when first bound to a constant
    pub(crate) name: Option<String>,
    /// `name` is a placeholder under an unnamed namespace and is not indexed
    pub(crate) temporary_name: bool,
    /// Object this is the singleton class of
    pub(crate) attached: Option<Value>,
    /// Lazily created singleton class
    pub(crate) singleton: Option<ModuleId>,
    /// Included modules, most recent first
    pub(crate) includes: Vec<ModuleId>,
    pub(crate) constants: Table<ConstEntry>,
    pub(crate) class_variables: Table<Value>,
    pub(crate) instance_variables: Table<Value>,
    pub(crate) methods: Table<MethodEntry>,
}

impl RModule {
    pub(crate) fn new(id: ModuleId, kind: ModuleKind) -> Self {
        Self {
            id,
            kind,
            name: None,
            temporary_name: false,
            attached: None,
            singleton: None,
            includes: Vec::new(),
            constants: Table::new(),
            class_variables: Table::new(),
            instance_variables: Table::new(),
            methods: Table::new(),
        }
    }

    /// Arena handle
    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// Module or class
    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    /// Check if this is a class
    pub fn is_class(&self) -> bool {
        matches!(self.kind, ModuleKind::Class { .. })
    }

    /// Direct superclass (None for modules and the root class)
    pub fn superclass(&self) -> Option<ModuleId> {
        match self.kind {
            ModuleKind::Class { superclass } => superclass,
            ModuleKind::Module => None,
        }
    }

    /// Qualified name, if one was ever assigned
    ///
    /// A module bound under an unnamed namespace carries a temporary name
    /// such as `#<Module:0x…>::Inner` until that namespace is named.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Whether the name is final and registered for lookup
    pub fn has_permanent_name(&self) -> bool {
        self.name.is_some() && !self.temporary_name
    }

    /// The object this is the singleton class of
    pub fn attached(&self) -> Option<&Value> {
        self.attached.as_ref()
    }

    /// Check if this is a singleton class
    pub fn is_singleton(&self) -> bool {
        self.attached.is_some()
    }

    /// Singleton class, if one was created
    pub fn singleton(&self) -> Option<ModuleId> {
        self.singleton
    }

    /// Directly included modules, most recent first
    pub fn includes(&self) -> &[ModuleId] {
        &self.includes
    }

    /// Own constant table
    pub fn constants(&self) -> &Table<ConstEntry> {
        &self.constants
    }

    /// Own class variables (`@@x`)
    pub fn class_variables(&self) -> &Table<Value> {
        &self.class_variables
    }

    /// Own class-level instance variables (`@x`)
    pub fn instance_variables(&self) -> &Table<Value> {
        &self.instance_variables
    }

    /// Own method table
    pub fn methods(&self) -> &Table<MethodEntry> {
        &self.methods
    }
}

/// A plain object instance
#[derive(Debug, Clone)]
pub struct RObject {
    pub(crate) class: ModuleId,
    pub(crate) singleton: Option<ModuleId>,
    pub(crate) instance_variables: Table<Value>,
}

impl RObject {
    pub(crate) fn new(class: ModuleId) -> Self {
        Self {
            class,
            singleton: None,
            instance_variables: Table::new(),
        }
    }

    /// Real (non-singleton) class
    pub fn class(&self) -> ModuleId {
        self.class
    }

    /// Singleton class, if one was created
    pub fn singleton(&self) -> Option<ModuleId> {
        self.singleton
    }

    /// Instance variables
    pub fn instance_variables(&self) -> &Table<Value> {
        &self.instance_variables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_keeps_order() {
        let mut table = Table::new();
        table.insert("b", 1);
        table.insert("a", 2);
        table.insert("c", 3);
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_table_replace_keeps_position() {
        let mut table = Table::new();
        table.insert("x", 1);
        table.insert("y", 2);
        table.insert("x", 10);
        assert_eq!(table.get("x"), Some(&10));
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["x", "y"]);
    }

    #[test]
    fn test_table_remove_reindexes() {
        let mut table = Table::new();
        table.insert("a", 1);
        table.insert("b", 2);
        table.insert("c", 3);
        assert_eq!(table.remove("a"), Some(1));
        assert_eq!(table.get("b"), Some(&2));
        assert_eq!(table.get("c"), Some(&3));
        assert_eq!(table.len(), 2);
        assert_eq!(table.remove("missing"), None);
    }

    #[test]
    fn test_visibility_parse() {
        assert_eq!(Visibility::parse("private"), Some(Visibility::Private));
        assert_eq!(Visibility::parse("Private"), None);
        assert_eq!(Visibility::Protected.to_string(), "protected");
    }

    #[test]
    fn test_tombstone() {
        let entry = MethodEntry::undefined("name");
        assert!(entry.is_undefined());
        assert!(entry.body().is_none());
    }
}
