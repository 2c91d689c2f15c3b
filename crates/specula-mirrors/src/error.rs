//! Reflection errors

use specula_runtime::RuntimeError;
use thiserror::Error;

/// Errors surfaced by mirror queries
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReflectError {
    /// A named field, method or constant does not exist
    #[error("no such {kind} `{name}'")]
    NotFound {
        /// What was looked up (`constant`, `method`, ...)
        kind: &'static str,
        /// The name that was looked up
        name: String,
    },

    /// The query does not apply to this subject
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// The trusted owner does not define the operation being rebound
    #[error("{owner} does not define `{operation}'")]
    Lookup {
        /// Display name of the trusted owner
        owner: String,
        /// Operation name
        operation: String,
    },

    /// The target is not an instance of the trusted owner
    #[error("bind argument must be an instance of {owner} (got {target})")]
    IncompatibleReceiver {
        /// Display name of the trusted owner
        owner: String,
        /// Display representation of the target
        target: String,
    },

    /// A trusted native returned something other than what it is specified to
    #[error("unexpected result from {operation}: {got}")]
    UnexpectedResult {
        /// Operation name
        operation: &'static str,
        /// What came back
        got: String,
    },

    /// The registry that built the mirror has been dropped
    #[error("the mirror's registry has been dropped")]
    RegistryDropped,

    /// Any other runtime failure
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl ReflectError {
    /// Turn the runtime's "no such name" errors into `NotFound`
    pub(crate) fn missing(err: RuntimeError, kind: &'static str, name: &str) -> Self {
        if err.is_missing_name() {
            ReflectError::NotFound {
                kind,
                name: name.to_string(),
            }
        } else {
            ReflectError::Runtime(err)
        }
    }

    /// Check for `NotFound`
    pub fn is_not_found(&self) -> bool {
        matches!(self, ReflectError::NotFound { .. })
    }
}

/// Reflection result
pub type ReflectResult<T> = Result<T, ReflectError>;
