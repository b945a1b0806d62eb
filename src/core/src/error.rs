//! Error types for the rule engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Rule engine error type
#[derive(Debug, Error)]
pub enum EngineError {
    /// Policy or query source failed to parse
    #[error("Parse error in {source_name} at line {line}, column {column}: {message}")]
    Parse {
        source_name: String,
        line: usize,
        column: usize,
        message: String,
    },

    /// Evaluation failed (type errors, malformed goals)
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// A goal needed the value of a variable that has none
    #[error("Unbound variable: {0}")]
    UnboundVariable(String),

    /// Error raised by the host through a callback; passed through untouched
    #[error("{0}")]
    Host(Box<dyn std::error::Error + Send + Sync>),
}

impl EngineError {
    /// Create a runtime error
    pub fn runtime<S: Into<String>>(msg: S) -> Self {
        EngineError::Runtime(msg.into())
    }

    /// Wrap a host error for transport through the engine
    pub fn host<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        EngineError::Host(Box::new(err))
    }
}
