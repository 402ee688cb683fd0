//! Error types for the chat-facing side of the bridge.

use thiserror::Error;

/// Main error type for interpreter operations.
#[derive(Error, Debug)]
pub enum InterpreterError {
    /// I/O error (log tail, stdin, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error bubbled up from the core crate.
    #[error(transparent)]
    Core(#[from] apbridge_core::Error),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A chat message could not be delivered.
    #[error("Delivery failed: {0}")]
    Delivery(String),

    /// The message catalog could not be loaded.
    #[error("Message catalog error: {0}")]
    Catalog(String),

    /// The service was used in the wrong state.
    #[error("Service error: {0}")]
    Service(String),
}

impl InterpreterError {
    /// Create a delivery error.
    pub fn delivery(msg: impl Into<String>) -> Self {
        Self::Delivery(msg.into())
    }

    /// Create a catalog error.
    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }
}

/// Result alias for interpreter operations.
pub type InterpreterResult<T> = Result<T, InterpreterError>;
