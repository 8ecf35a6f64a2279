//! Error types and result aliases for Capstan foundations.
//!
//! This module defines the shared error type used by the core primitives.
//! Errors are structured for programmatic handling and include context for
//! debugging.

/// The result type used throughout the Capstan foundation crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Capstan core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An invalid identifier was provided.
    #[error("invalid identifier: {message}")]
    InvalidId {
        /// Description of what made the identifier invalid.
        message: String,
    },
}

impl Error {
    /// Creates a new invalid identifier error with the given message.
    #[must_use]
    pub fn invalid_id(message: impl Into<String>) -> Self {
        Self::InvalidId {
            message: message.into(),
        }
    }
}
