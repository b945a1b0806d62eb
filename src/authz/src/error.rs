//! Error types for the host binding layer

use thiserror::Error;
use warden_core::EngineError;

/// Host binding errors
///
/// Errors raised inside host callbacks (constructors, role resolution,
/// marshaling) travel through the engine and come back out as the same
/// variant they started as.
#[derive(Debug, Error)]
pub enum PolarError {
    /// Policy file does not carry the configured extension
    #[error("Invalid source extension: {path} (expected .{expected})")]
    InvalidSourceExtension { path: String, expected: String },

    /// Policy file could not be read
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Name already bound to a different type
    #[error("Duplicate registration: {name} is already registered as {existing}")]
    DuplicateRegistration { name: String, existing: String },

    /// No constructor for the class named in an instance literal
    #[error("No constructor registered for class {0}")]
    UnknownConstructor(String),

    /// An inline query embedded in a source had no solutions
    #[error("Inline query failed in {source_name}: {query}")]
    InlineQueryFailed { source_name: String, query: String },

    /// Value could not be converted between host and engine representation
    #[error("Marshal error: {0}")]
    Marshal(String),

    /// Role order is not a list of role names
    #[error("Invalid role order: {0}")]
    InvalidRoleOrder(String),

    /// Query API used out of sequence
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// Policy or query source failed to parse
    #[error("Parse error in {source_name} at line {line}, column {column}: {message}")]
    Parse {
        source_name: String,
        line: usize,
        column: usize,
        message: String,
    },

    /// Evaluation error reported by the engine
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<EngineError> for PolarError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Parse {
                source_name,
                line,
                column,
                message,
            } => PolarError::Parse {
                source_name,
                line,
                column,
                message,
            },
            EngineError::Runtime(msg) => PolarError::Runtime(msg),
            EngineError::UnboundVariable(name) => {
                PolarError::Runtime(format!("unbound variable `{}`", name))
            }
            EngineError::Host(inner) => match inner.downcast::<PolarError>() {
                Ok(polar) => *polar,
                Err(other) => PolarError::Runtime(other.to_string()),
            },
        }
    }
}

impl From<PolarError> for EngineError {
    fn from(err: PolarError) -> Self {
        EngineError::host(err)
    }
}

/// Result type for host binding operations
pub type Result<T> = std::result::Result<T, PolarError>;
