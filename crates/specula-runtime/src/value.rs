//! Runtime values
//!
//! Values are small and cheap to clone. Heap entities (objects and modules)
//! are referenced through arena handles, so equality on those variants is
//! identity. Immediates compare by value, which makes `Value` usable as an
//! identity key for caches that sit outside the runtime.

use std::fmt;
use std::path::PathBuf;

/// Handle to a module or class in the runtime arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub(crate) u32);

impl ModuleId {
    /// Arena index of this module
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle to a plain object instance in the runtime arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub(crate) u32);

impl ObjectId {
    /// Arena index of this object
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Reference to a method as found on a particular owner
///
/// This is what `Module#instance_method` hands back: the module whose table
/// holds the entry, plus the method name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    /// Module whose method table defines the method
    pub owner: ModuleId,
    /// Method name
    pub name: String,
}

/// Where a method was defined, when known
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    /// Source file
    pub file: PathBuf,
    /// 1-based line number
    pub line: u32,
}

impl SourceLocation {
    /// Create a new source location
    pub fn new(file: impl Into<PathBuf>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// A runtime value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Value {
    /// `nil`
    #[default]
    Nil,
    /// `true` / `false`
    Bool(bool),
    /// Integer
    Int(i64),
    /// Symbol (`:name`)
    Sym(String),
    /// String
    Str(String),
    /// Array of values (value semantics, no identity)
    Array(Vec<Value>),
    /// Object instance
    Object(ObjectId),
    /// Module or class
    Module(ModuleId),
    /// Unbound method
    Method(MethodRef),
}

impl Value {
    /// Create a symbol
    pub fn sym(name: impl Into<String>) -> Self {
        Value::Sym(name.into())
    }

    /// Create a string
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// Check for nil
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Everything except `nil` and `false` is truthy
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Module handle, if this is a module
    pub fn as_module(&self) -> Option<ModuleId> {
        match self {
            Value::Module(id) => Some(*id),
            _ => None,
        }
    }

    /// Object handle, if this is a plain object
    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Value::Object(id) => Some(*id),
            _ => None,
        }
    }

    /// Symbol or string contents
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Value::Sym(s) | Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// String contents (strings only)
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer value
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Array elements
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Unbound method reference
    pub fn as_method(&self) -> Option<&MethodRef> {
        match self {
            Value::Method(m) => Some(m),
            _ => None,
        }
    }

    /// Whether this value lives in the heap arena (has identity)
    pub fn is_heap(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Module(_))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<ModuleId> for Value {
    fn from(id: ModuleId) -> Self {
        Value::Module(id)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::Object(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Int(0).is_truthy());
        assert!(Value::str("").is_truthy());
    }

    #[test]
    fn test_heap_identity() {
        let a = Value::Module(ModuleId(3));
        let b = Value::Module(ModuleId(3));
        let c = Value::Module(ModuleId(4));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.is_heap());
        assert!(!Value::Int(1).is_heap());
    }

    #[test]
    fn test_name_accessor() {
        assert_eq!(Value::sym("bark").as_name(), Some("bark"));
        assert_eq!(Value::str("bark").as_name(), Some("bark"));
        assert_eq!(Value::Int(1).as_name(), None);
    }

    #[test]
    fn test_source_location_display() {
        let loc = SourceLocation::new("lib/dog.rb", 12);
        assert_eq!(loc.to_string(), "lib/dog.rb:12");
    }
}
