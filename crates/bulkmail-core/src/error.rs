//! Error types for the core library.

use thiserror::Error;

use crate::validation::ValidationError;

/// Errors that abort a dispatch run before any message is sent.
///
/// Per-recipient delivery failures are never reported through this type; they
/// end up in the [`DispatchReport`](crate::DispatchReport).
#[derive(Debug, Error)]
pub enum Error {
    /// Pre-flight validation failed; nothing was enqueued.
    #[error("Validation failed: {}", join_messages(.0))]
    Validation(Vec<ValidationError>),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

fn join_messages(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<Vec<ValidationError>> for Error {
    fn from(errors: Vec<ValidationError>) -> Self {
        Self::Validation(errors)
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
