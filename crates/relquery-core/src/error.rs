//! Error types for relquery operations.

use std::fmt;

/// The primary error type for all relquery operations.
#[derive(Debug)]
pub enum Error {
    /// Bad caller input (filter/order/pagination trees, relation path
    /// references). An API layer should map these to "bad request".
    Input(InputError),
    /// Invariant violations and misconfigured relation graphs. These
    /// indicate a logic bug, not a bad request.
    Internal(InternalError),
    /// Startup/configuration errors (schema registration).
    Config(ConfigError),
    /// Errors surfaced by the underlying data store during execution.
    Execution(ExecutionError),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct InputError {
    pub kind: InputErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputErrorKind {
    /// A relation path reference did not match any analyzed relation.
    InvalidRelationPath,
    /// A field condition was explicitly null.
    NullCondition,
    /// A field condition was an empty object.
    EmptyCondition,
    /// An operator object contained no recognized operator.
    NoOperator,
    /// An operator key was not recognized.
    UnknownOperator,
    /// A filter/order tree was not structurally valid.
    MalformedFilter,
    /// A dotted reference carried more segments than one hop allows.
    MalformedPath,
    /// A pagination object could not be interpreted.
    InvalidPagination,
}

#[derive(Debug)]
pub struct InternalError {
    pub kind: InternalErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalErrorKind {
    /// A join through a relation with multiplying aggregated cardinality
    /// was demanded.
    MultiplyingJoin,
    /// Recursive compilation exceeded the safety bound.
    DepthExceeded,
    /// Relation metadata was missing during query assembly.
    RelationNotFound,
    /// An entity name was not present in the schema.
    UnknownEntity,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
}

#[derive(Debug)]
pub struct ExecutionError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Build an input error.
    pub fn input(kind: InputErrorKind, message: impl Into<String>) -> Self {
        Error::Input(InputError {
            kind,
            message: message.into(),
        })
    }

    /// Build an internal error.
    pub fn internal(kind: InternalErrorKind, message: impl Into<String>) -> Self {
        Error::Internal(InternalError {
            kind,
            message: message.into(),
        })
    }

    /// Build a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(ConfigError {
            message: message.into(),
        })
    }

    /// Build an execution error without a source.
    pub fn execution(message: impl Into<String>) -> Self {
        Error::Execution(ExecutionError {
            message: message.into(),
            source: None,
        })
    }

    /// Is this an error the caller caused (maps to "bad request")?
    pub fn is_input_error(&self) -> bool {
        matches!(self, Error::Input(_))
    }

    /// Is this an invariant violation (maps to "internal error")?
    pub fn is_internal_error(&self) -> bool {
        matches!(self, Error::Internal(_))
    }

    /// Get the input error kind, if this is an input error.
    pub fn input_kind(&self) -> Option<InputErrorKind> {
        match self {
            Error::Input(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Get the internal error kind, if this is an internal error.
    pub fn internal_kind(&self) -> Option<InternalErrorKind> {
        match self {
            Error::Internal(e) => Some(e.kind),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Input(e) => write!(f, "Input error: {}", e.message),
            Error::Internal(e) => write!(f, "Internal error: {}", e.message),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Execution(e) => write!(f, "Execution error: {}", e.message),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Execution(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<InputError> for Error {
    fn from(err: InputError) -> Self {
        Error::Input(err)
    }
}

impl From<InternalError> for Error {
    fn from(err: InternalError) -> Self {
        Error::Internal(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<ExecutionError> for Error {
    fn from(err: ExecutionError) -> Self {
        Error::Execution(err)
    }
}

/// Result type alias for relquery operations.
pub type Result<T> = std::result::Result<T, Error>;
