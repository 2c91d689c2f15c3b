//! Runtime errors

use thiserror::Error;

/// Errors raised by the runtime
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuntimeError {
    /// Undefined constant
    #[error("uninitialized constant {owner}::{name}")]
    NameError {
        /// Display name of the namespace searched
        owner: String,
        /// Constant name
        name: String,
    },

    /// Undefined method on a module (`instance_method`, `remove_method`)
    #[error("undefined method `{name}' for `{owner}'")]
    UndefinedMethod {
        /// Display name of the module searched
        owner: String,
        /// Method name
        name: String,
    },

    /// Dispatch found no method for a receiver
    #[error("undefined method `{name}' for {receiver}")]
    NoMethodError {
        /// Display representation of the receiver
        receiver: String,
        /// Method name
        name: String,
    },

    /// Undefined class variable
    #[error("uninitialized class variable {name} in {owner}")]
    UndefinedClassVariable {
        /// Display name of the module searched
        owner: String,
        /// Variable name (with `@@`)
        name: String,
    },

    /// Type error
    #[error("Type error: {0}")]
    TypeError(String),

    /// Argument error
    #[error("Argument error: {0}")]
    ArgumentError(String),

    /// An autoload hook failed or did not define its constant
    #[error("autoload of {name} from {path} failed: {reason}")]
    AutoloadFailed {
        /// Constant name
        name: String,
        /// Registered path
        path: String,
        /// Why it failed
        reason: String,
    },
}

impl RuntimeError {
    /// Whether this is one of the "name does not exist" errors
    pub fn is_missing_name(&self) -> bool {
        matches!(
            self,
            RuntimeError::NameError { .. }
                | RuntimeError::UndefinedMethod { .. }
                | RuntimeError::UndefinedClassVariable { .. }
        )
    }
}

/// Runtime result
pub type RtResult<T> = Result<T, RuntimeError>;
