//! Specula Object Runtime
//!
//! A live, dynamically typed object runtime that reflection tooling runs
//! against:
//! - **Modules and classes** with mixins, nesting and lazily created
//!   singleton classes (`module`, `class_registry`)
//! - **Constants** with autoload, class variables and class-level instance
//!   variables (`runtime`)
//! - **Method tables** with visibility, source locations, `undef` and
//!   dynamic dispatch that honours program overrides (`runtime`, `natives`)
//! - **Images**: TOML descriptions of a program's classes (`image`)
//!
//! # Example
//!
//! ```rust,ignore
//! use specula_runtime::{Value, Vm};
//!
//! let vm = Vm::new();
//! let dog = vm.with(|rt| {
//!     let object = rt.core().object;
//!     rt.define_class(object, "Dog", None)
//! })?;
//! let name = vm.send(&Value::Module(dog), "name", &[])?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod class_registry;
pub mod error;
pub mod image;
pub mod module;
mod natives;
pub mod runtime;
pub mod value;
pub mod vm;

pub use class_registry::ClassRegistry;
pub use error::{RtResult, RuntimeError};
pub use image::{Image, ImageError, MethodSpec, ModuleSpec};
pub use module::{
    AutoloadHook, ConstEntry, MethodBody, MethodEntry, ModuleKind, RModule, RObject, Table,
    Visibility,
};
pub use runtime::{CoreTypes, Runtime, NAMESPACE_SEPARATOR};
pub use value::{MethodRef, ModuleId, ObjectId, SourceLocation, Value};
pub use vm::{Vm, VmId};
