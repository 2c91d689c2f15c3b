//! Name-based classification
//!
//! The runtime has no flag for "singleton class" or "anonymous module" that
//! survives a program redefining its own introspection, so mirrors classify
//! by display name instead:
//!
//! | Display name                         | Singleton | Anonymous |
//! |--------------------------------------|-----------|-----------|
//! | `Dog`                                | no        | no        |
//! | `#<Class:Dog>`                       | yes       | no        |
//! | `#<Class:#<Dog:0x00007f3a4e000000>>` | yes       | no        |
//! | `#<Class:#<Class:0x00007f3a1c000028>>` | yes     | no        |
//! | `#<Class:0x00007f3a1c000028>`        | no        | yes       |
//! | `#<Module:0x00007f3a1c000028>`       | no        | yes       |
//!
//! These are heuristics: an unconventional display name can misclassify,
//! in which case the answer degrades to `false` rather than failing.

use once_cell::sync::Lazy;
use regex::Regex;

use specula_runtime::NAMESPACE_SEPARATOR;

static SINGLETON_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#<Class:.+>$").expect("singleton regex"));
static ADDRESS_SINGLETON_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#<Class:0x[0-9a-fA-F]+>$").expect("address singleton regex"));
static ANONYMOUS_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#<(?:Class|Module):0x[0-9a-fA-F]+>$").expect("anonymous regex"));

/// `#<Class:X>` where `X` is not a bare address
pub fn is_singleton_name(name: &str) -> bool {
    SINGLETON_NAME.is_match(name) && !ADDRESS_SINGLETON_NAME.is_match(name)
}

/// `#<Class:0x…>` or `#<Module:0x…>`
pub fn is_anonymous_name(name: &str) -> bool {
    ANONYMOUS_NAME.is_match(name)
}

/// Last namespace component: `Outer::Inner` -> `Inner`
pub fn demodulize(name: &str) -> &str {
    match name.rfind(NAMESPACE_SEPARATOR) {
        Some(index) => &name[index + NAMESPACE_SEPARATOR.len()..],
        None => name,
    }
}

/// Path segments, ignoring a leading `::` and empty components
pub fn split_path(path: &str) -> Vec<&str> {
    path.split(NAMESPACE_SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .collect()
}
