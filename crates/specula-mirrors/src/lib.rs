//! Specula Mirrors
//!
//! Reflection over a live Specula runtime that keeps working when the
//! inspected program redefines its own introspection:
//! - **Rebinding**: structural queries run the trusted natives of
//!   `BasicObject`, `Module` and `Class` against the subject (`rebind`)
//! - **Registry**: one mirror per runtime entity, process-wide or scoped
//!   (`registry`)
//! - **Mirrors**: objects, classes and modules, fields, methods
//!   (`object_mirror`, `class_mirror`, `field_mirror`, `method_mirror`)
//! - **Heuristics**: singleton and anonymous classification by display name
//!   (`heuristics`)
//! - **Provenance**: best-effort file and package attribution (`package`,
//!   `config`)
//!
//! # Example
//!
//! ```rust,ignore
//! use specula_mirrors::Registry;
//!
//! let registry = Registry::global();
//! let dog = registry.reflect_named(&vm, "Dog")?;
//! for ancestor in dog.ancestors()? {
//!     println!("{}", ancestor.name()?);
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod class_mirror;
pub mod config;
pub mod debug;
pub mod error;
pub mod field_mirror;
pub mod heuristics;
pub mod method_mirror;
pub mod object_mirror;
pub mod package;
pub mod rebind;
pub mod registry;

pub use class_mirror::ClassMirror;
pub use config::{ColorMode, ConfigError, OutputConfig, PackageRoot, ResolverConfig, SpeculaConfig};
pub use error::{ReflectError, ReflectResult};
pub use field_mirror::{FieldKind, FieldMirror};
pub use method_mirror::MethodMirror;
pub use object_mirror::ObjectMirror;
pub use package::{PackageInference, PackageResolver};
pub use rebind::{call_trusted, rebind, Rebound};
pub use registry::{Mirror, Registry};
