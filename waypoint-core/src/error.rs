// Error types for the Waypoint routing core

use thiserror::Error;

/// Malformed route pattern, raised while compiling a route at registration time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Unterminated variable in pattern '{pattern}' at byte {position}")]
    UnterminatedVariable { pattern: String, position: usize },

    #[error("Invalid variable name '{name}' in pattern '{pattern}'")]
    InvalidVariableName { pattern: String, name: String },

    #[error("Invalid regex for variable '{name}' in pattern '{pattern}': {reason}")]
    InvalidRegex {
        pattern: String,
        name: String,
        reason: String,
    },

    #[error("Wildcard '**' must be the last segment of pattern '{pattern}'")]
    MisplacedWildcard { pattern: String },

    #[error("Missing value for variable '{name}' while reversing '{pattern}'")]
    MissingVariable { pattern: String, name: String },
}

/// A caller-supplied name or value could not be bound. Always a client error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("Type '{type_name}' has no property '{property}'")]
    UnknownProperty { type_name: String, property: String },

    #[error("Invalid property path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Property '{property}' of '{type_name}' is not a list")]
    NotIndexable { type_name: String, property: String },

    #[error("Cannot traverse into '{property}': '{type_name}' is not a bean")]
    NotTraversable { type_name: String, property: String },

    #[error("Property '{property}' of '{type_name}' has no setter")]
    ReadOnly { type_name: String, property: String },

    #[error("Missing required value '{0}'")]
    Missing(String),

    #[error("Cannot convert '{value}' to {type_name} for '{name}': {reason}")]
    Conversion {
        name: String,
        value: String,
        type_name: String,
        reason: String,
    },

    #[error("Type mismatch at '{path}': expected {expected}")]
    TypeMismatch { path: String, expected: String },

    #[error("No value present at '{0}'")]
    Absent(String),
}

/// A structured parameter type cannot be constructed. Configuration error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstructionError {
    #[error("Type '{0}' is not registered as a bean")]
    Unregistered(String),

    #[error("Type '{0}' has no default constructor")]
    NoDefault(String),

    #[error("Lookup scope '{scope}' of '{type_name}' must be registered first")]
    UnknownScope { type_name: String, scope: String },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Pattern error: {0}")]
    Pattern(#[from] PatternError),

    #[error("Binding error: {0}")]
    Binding(#[from] BindingError),

    #[error("Construction error: {0}")]
    Construction(#[from] ConstructionError),

    #[error("Route not found: {0}")]
    RouteNotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl Error {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Binding(_) | Error::BadRequest(_) | Error::Deserialization(_) => 400,
            Error::RouteNotFound(_) => 404,
            Error::Pattern(_)
            | Error::Construction(_)
            | Error::Serialization(_)
            | Error::Internal(_) => 500,
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}
