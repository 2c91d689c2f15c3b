//! Runtime images
//!
//! An image is a TOML document describing modules and classes to load into
//! a runtime. It is how the object browser gets something to browse.
//!
//! ```toml
//! [[module]]
//! name = "Named"
//!
//! [[class]]
//! name = "Dog"
//! superclass = "Animal"
//! include = ["Named"]
//! constants = { MAX_AGE = 30 }
//! autoload = { Puppy = "lib/dog/puppy.rb" }
//!
//! [[class.method]]
//! name = "bark"
//! file = "lib/dog.rb"
//! line = 3
//! returns = "woof"
//! ```
//!
//! Entries may appear in any order; a class is defined once its namespace
//! and superclass exist.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{RtResult, RuntimeError};
use crate::module::Visibility;
use crate::runtime::{is_constant_name, Runtime, NAMESPACE_SEPARATOR};
use crate::value::{ModuleId, SourceLocation, Value};
use crate::vm::Vm;

/// Errors that can occur while reading or loading an image
#[derive(Debug, Error)]
pub enum ImageError {
    /// Failed to read image file
    #[error("Failed to read image file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse image: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid image: {0}")]
    ValidationError(String),

    /// Entries whose namespace or superclass never became available
    #[error("Unresolved definitions: {0}")]
    Unresolved(String),

    /// The runtime rejected a definition
    #[error("Runtime error while loading image: {0}")]
    Runtime(#[from] RuntimeError),
}

/// A runtime image
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Image {
    /// Plain modules
    #[serde(default, rename = "module")]
    pub modules: Vec<ModuleSpec>,

    /// Classes
    #[serde(default, rename = "class")]
    pub classes: Vec<ModuleSpec>,
}

/// One module or class definition
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModuleSpec {
    /// Qualified name (`Outer::Inner`)
    pub name: String,

    /// Superclass name (classes only, defaults to `Object`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superclass: Option<String>,

    /// Modules to include, in inclusion order
    #[serde(default)]
    pub include: Vec<String>,

    /// Constants
    #[serde(default)]
    pub constants: BTreeMap<String, toml::Value>,

    /// Class variables (`@@name`)
    #[serde(default)]
    pub class_variables: BTreeMap<String, toml::Value>,

    /// Class-level instance variables (`@name`)
    #[serde(default)]
    pub instance_variables: BTreeMap<String, toml::Value>,

    /// Constants loaded on first access (name -> file)
    #[serde(default)]
    pub autoload: BTreeMap<String, String>,

    /// Instance methods
    #[serde(default, rename = "method")]
    pub methods: Vec<MethodSpec>,

    /// Methods on the singleton class
    #[serde(default, rename = "singleton_method")]
    pub singleton_methods: Vec<MethodSpec>,

    /// Instance methods to `undef`
    #[serde(default)]
    pub undef: Vec<String>,

    /// Singleton methods to `undef` (hides core natives from dispatch)
    #[serde(default)]
    pub singleton_undef: Vec<String>,
}

/// One method definition
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MethodSpec {
    /// Method name
    pub name: String,

    /// `public` (default), `protected` or `private`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,

    /// Source file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Source line (defaults to 1 when a file is given)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,

    /// Literal the method returns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<toml::Value>,
}

impl MethodSpec {
    fn visibility(&self) -> Result<Visibility, ImageError> {
        match &self.visibility {
            None => Ok(Visibility::Public),
            Some(v) => Visibility::parse(v).ok_or_else(|| {
                ImageError::ValidationError(format!(
                    "Method '{}' has invalid visibility '{}'",
                    self.name, v
                ))
            }),
        }
    }

    fn location(&self) -> Option<SourceLocation> {
        self.file
            .as_ref()
            .map(|file| SourceLocation::new(file, self.line.unwrap_or(1)))
    }
}

impl Image {
    /// Load an image from a file
    pub fn from_file(path: &Path) -> Result<Self, ImageError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse an image from a string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ImageError> {
        let image: Image = toml::from_str(content)?;
        image.validate()?;
        Ok(image)
    }

    /// Validate names, visibilities and literal values
    pub fn validate(&self) -> Result<(), ImageError> {
        for spec in self.modules.iter().chain(&self.classes) {
            if spec.name.is_empty() {
                return Err(ImageError::ValidationError(
                    "Module name cannot be empty".to_string(),
                ));
            }
            if !spec.name.split(NAMESPACE_SEPARATOR).all(is_constant_name) {
                return Err(ImageError::ValidationError(format!(
                    "Invalid module name: {}. Each segment must start with an uppercase letter",
                    spec.name
                )));
            }
            for method in spec.methods.iter().chain(&spec.singleton_methods) {
                if method.name.is_empty() {
                    return Err(ImageError::ValidationError(format!(
                        "Method name cannot be empty in {}",
                        spec.name
                    )));
                }
                method.visibility()?;
                if let Some(literal) = &method.returns {
                    to_value(literal)?;
                }
            }
            for literal in spec
                .constants
                .values()
                .chain(spec.class_variables.values())
                .chain(spec.instance_variables.values())
            {
                to_value(literal)?;
            }
        }
        for spec in &self.modules {
            if spec.superclass.is_some() {
                return Err(ImageError::ValidationError(format!(
                    "Module {} cannot have a superclass",
                    spec.name
                )));
            }
        }
        Ok(())
    }

    /// Load the image into a shared runtime
    pub fn load(&self, vm: &Vm) -> Result<Vec<ModuleId>, ImageError> {
        vm.with(|rt| self.apply(rt))
    }

    /// Load the image into a runtime, returning the defined modules in definition order
    pub fn apply(&self, rt: &mut Runtime) -> Result<Vec<ModuleId>, ImageError> {
        let mut pending: Vec<(&ModuleSpec, bool)> = self
            .modules
            .iter()
            .map(|spec| (spec, false))
            .chain(self.classes.iter().map(|spec| (spec, true)))
            .collect();
        let mut defined = Vec::new();

        // Definitions can depend on each other in any order; keep sweeping
        // until a pass makes no progress.
        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();
            for (spec, is_class) in pending {
                match define(rt, spec, is_class)? {
                    Some(id) => defined.push((id, spec)),
                    None => deferred.push((spec, is_class)),
                }
            }
            if deferred.len() == before {
                let names: Vec<&str> = deferred.iter().map(|(s, _)| s.name.as_str()).collect();
                return Err(ImageError::Unresolved(names.join(", ")));
            }
            pending = deferred;
        }

        // Bodies go in once every name exists, so includes can refer to
        // modules defined later in the file.
        for (id, spec) in &defined {
            populate(rt, *id, spec)?;
        }
        Ok(defined.into_iter().map(|(id, _)| id).collect())
    }
}

fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.rsplit_once(NAMESPACE_SEPARATOR) {
        Some((outer, last)) => (Some(outer), last),
        None => (None, name),
    }
}

fn define(
    rt: &mut Runtime,
    spec: &ModuleSpec,
    is_class: bool,
) -> Result<Option<ModuleId>, ImageError> {
    let (outer, last) = split_qualified(&spec.name);
    let namespace = match outer {
        Some(outer) => match rt.lookup(outer) {
            Some(id) => id,
            None => return Ok(None),
        },
        None => rt.core().object,
    };
    if !is_class {
        return Ok(Some(rt.define_module(namespace, last)?));
    }
    let superclass = match &spec.superclass {
        Some(name) => match rt.lookup(name) {
            Some(id) => Some(id),
            None => return Ok(None),
        },
        None => None,
    };
    Ok(Some(rt.define_class(namespace, last, superclass)?))
}

fn populate(rt: &mut Runtime, id: ModuleId, spec: &ModuleSpec) -> Result<(), ImageError> {
    for mixin in &spec.include {
        let mixin_id = rt.lookup(mixin).ok_or_else(|| {
            ImageError::Unresolved(format!("{} (included by {})", mixin, spec.name))
        })?;
        rt.include_module(id, mixin_id)?;
    }
    for (name, literal) in &spec.constants {
        rt.const_set(id, name, to_value(literal)?)?;
    }
    for (name, literal) in &spec.class_variables {
        rt.class_variable_set(id, name, to_value(literal)?)?;
    }
    for (name, literal) in &spec.instance_variables {
        rt.instance_variable_set(&Value::Module(id), name, to_value(literal)?)?;
    }
    for (name, path) in &spec.autoload {
        let constant = name.clone();
        rt.autoload(
            id,
            name,
            path.clone(),
            Arc::new(move |rt: &mut Runtime| rt.define_module(id, &constant).map(|_| ())),
        )?;
    }
    for method in &spec.methods {
        define_method(rt, id, method)?;
    }
    if !spec.singleton_methods.is_empty() || !spec.singleton_undef.is_empty() {
        let meta = rt.singleton_class(&Value::Module(id))?;
        for method in &spec.singleton_methods {
            define_method(rt, meta, method)?;
        }
        for name in &spec.singleton_undef {
            rt.undef_method(meta, name)?;
        }
    }
    for name in &spec.undef {
        rt.undef_method(id, name)?;
    }
    Ok(())
}

fn define_method(rt: &mut Runtime, module: ModuleId, spec: &MethodSpec) -> Result<(), ImageError> {
    let result = match &spec.returns {
        Some(literal) => to_value(literal)?,
        None => Value::Nil,
    };
    rt.define_method(
        module,
        &spec.name,
        spec.visibility()?,
        spec.location(),
        Arc::new(move |_: &mut Runtime, _: &Value, _: &[Value]| -> RtResult<Value> {
            Ok(result.clone())
        }),
    )?;
    Ok(())
}

fn to_value(literal: &toml::Value) -> Result<Value, ImageError> {
    Ok(match literal {
        toml::Value::Integer(i) => Value::Int(*i),
        toml::Value::String(s) => Value::Str(s.clone()),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Array(items) => {
            Value::Array(items.iter().map(to_value).collect::<Result<_, _>>()?)
        }
        other => {
            return Err(ImageError::ValidationError(format!(
                "Unsupported literal {} (use integers, strings, booleans or arrays)",
                other
            )))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZOO: &str = r#"
[[class]]
name = "Dog"
superclass = "Animal"
include = ["Named"]
constants = { MAX_AGE = 30 }

[[class.method]]
name = "bark"
file = "lib/dog.rb"
line = 3
returns = "woof"

[[class]]
name = "Animal"

[[module]]
name = "Named"
"#;

    #[test]
    fn test_parse_and_load_out_of_order() {
        let image = Image::from_str(ZOO).unwrap();
        let mut rt = Runtime::new();
        let defined = image.apply(&mut rt).unwrap();
        assert_eq!(defined.len(), 3);

        let dog = rt.lookup("Dog").unwrap();
        let animal = rt.lookup("Animal").unwrap();
        assert_eq!(rt.module(dog).unwrap().superclass(), Some(animal));
        assert_eq!(rt.const_get(dog, "MAX_AGE").unwrap(), Value::Int(30));

        let bark = rt.module(dog).unwrap().methods().get("bark").cloned().unwrap();
        assert_eq!(bark.location, Some(SourceLocation::new("lib/dog.rb", 3)));
    }

    #[test]
    fn test_method_returns_literal() {
        let image = Image::from_str(ZOO).unwrap();
        let vm = Vm::new();
        image.load(&vm).unwrap();
        let dog = vm.with(|rt| rt.lookup("Dog")).unwrap();
        let obj = vm.with(|rt| rt.allocate(dog)).unwrap();
        assert_eq!(
            vm.send(&Value::Object(obj), "bark", &[]).unwrap(),
            Value::str("woof")
        );
    }

    #[test]
    fn test_unknown_superclass_unresolved() {
        let src = "[[class]]\nname = \"Orphan\"\nsuperclass = \"Missing\"\n";
        let image = Image::from_str(src).unwrap();
        let mut rt = Runtime::new();
        assert!(matches!(image.apply(&mut rt), Err(ImageError::Unresolved(_))));
    }

    #[test]
    fn test_invalid_visibility() {
        let src = concat!(
            "[[class]]\nname = \"A\"\n",
            "[[class.method]]\nname = \"x\"\nvisibility = \"secret\"\n",
        );
        assert!(matches!(
            Image::from_str(src),
            Err(ImageError::ValidationError(_))
        ));
    }

    #[test]
    fn test_invalid_name() {
        assert!(matches!(
            Image::from_str("[[module]]\nname = \"lower::Case\"\n"),
            Err(ImageError::ValidationError(_))
        ));
    }

    #[test]
    fn test_float_literal_rejected() {
        let src = "[[class]]\nname = \"A\"\nconstants = { PI = 3.14 }\n";
        assert!(matches!(
            Image::from_str(src),
            Err(ImageError::ValidationError(_))
        ));
    }

    #[test]
    fn test_autoload_defines_module_on_access() {
        let src = "[[module]]\nname = \"Net\"\nautoload = { Http = \"lib/net/http.rb\" }\n";
        let image = Image::from_str(src).unwrap();
        let mut rt = Runtime::new();
        image.apply(&mut rt).unwrap();
        let net = rt.lookup("Net").unwrap();
        assert!(rt.lookup("Net::Http").is_none());
        rt.const_get(net, "Http").unwrap();
        assert!(rt.lookup("Net::Http").is_some());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zoo.toml");
        std::fs::write(&path, ZOO).unwrap();
        let image = Image::from_file(&path).unwrap();
        assert_eq!(image.classes.len(), 2);
        assert_eq!(image.modules.len(), 1);
    }
}
