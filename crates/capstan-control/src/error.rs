//! Error types for the task-control domain.

use capstan_core::TaskId;

/// The result type used throughout capstan-control.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in control-plane operations.
///
/// Rejections that are part of normal operation (task not in a legal state,
/// engine declining a cancel) are not errors; they are reported through
/// [`crate::outcome::ControlOutcome`]. This enum covers the failures a caller
/// cannot act on by reading the task: missing records, denied permissions,
/// and broken collaborators.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A task was not found in the Record Store.
    #[error("task not found: {task_id}")]
    TaskNotFound {
        /// The task ID that was not found.
        task_id: TaskId,
    },

    /// The caller is not allowed to invoke the operation.
    ///
    /// Raised when the dangerous-action gate is closed or the authorizer
    /// denies the required permission. Distinct from a state rejection:
    /// the task itself was never consulted.
    #[error("operation {operation} not permitted: {reason}")]
    Unauthorized {
        /// The operation that was denied, e.g. `force_unlock` or `summary`.
        operation: String,
        /// Why the operation was denied.
        reason: String,
    },

    /// A storage operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Delivery to the Worker Event Bus failed at the transport level.
    ///
    /// The control plane converts this into a dispatch-failed outcome for
    /// the caller; it never aborts an operation fatally.
    #[error("dispatch error: {message}")]
    Dispatch {
        /// Description of the delivery failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A serialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// Configuration was missing or unparseable.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// An error from capstan-core.
    #[error("core error: {0}")]
    Core(#[from] capstan_core::error::Error),
}

impl Error {
    /// Creates a new storage error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new dispatch error.
    #[must_use]
    pub fn dispatch(message: impl Into<String>) -> Self {
        Self::Dispatch {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new dispatch error with a source.
    #[must_use]
    pub fn dispatch_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Dispatch {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new unauthorized error.
    #[must_use]
    pub fn unauthorized(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this is an authorization failure.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn task_not_found_display() {
        let err = Error::TaskNotFound {
            task_id: TaskId::generate(),
        };
        assert!(err.to_string().contains("task not found"));
    }

    #[test]
    fn unauthorized_display_names_operation() {
        let err = Error::unauthorized("force_unlock", "dangerous actions disabled");
        let msg = err.to_string();
        assert!(msg.contains("force_unlock"));
        assert!(msg.contains("dangerous actions disabled"));
        assert!(err.is_unauthorized());
    }

    #[test]
    fn storage_error_with_source() {
        let source = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "store down");
        let err = Error::storage_with_source("failed to load record", source);
        assert!(err.to_string().contains("storage error"));
        assert!(StdError::source(&err).is_some());
    }

    #[test]
    fn dispatch_error_display() {
        let err = Error::dispatch("worker event bus unreachable");
        assert!(err.to_string().contains("dispatch error"));
        assert!(StdError::source(&err).is_none());
    }

    #[test]
    fn core_error_converts() {
        let core = capstan_core::Error::invalid_id("bad ulid");
        let err: Error = core.into();
        assert!(err.to_string().contains("core error"));
    }
}
