//! Structured outcomes of control operations.

use serde::{Deserialize, Serialize};

/// The outcome of a control operation.
///
/// `Applied` may mean no more than "accepted for asynchronous processing":
/// the carried message keeps that distinction visible ("Trying to cancel the
/// task" for a fire-and-forget request versus "The task resources were
/// unlocked." for a completed write). Callers must not treat `Applied` as
/// proof the underlying execution already changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ControlOutcome {
    /// The operation was accepted; the message describes what was set in motion.
    Applied {
        /// User-facing description of the accepted operation.
        message: String,
    },
    /// The operation is not legal for the task right now.
    Rejected {
        /// User-facing, operation-specific reason.
        reason: String,
    },
    /// The operation could not be delivered or confirmed.
    ///
    /// The task's state is unchanged by the control plane; the worker
    /// subsystem remains the source of truth.
    DispatchFailed {
        /// User-facing description of the delivery failure.
        reason: String,
    },
}

impl ControlOutcome {
    /// Creates an applied outcome.
    #[must_use]
    pub fn applied(message: impl Into<String>) -> Self {
        Self::Applied {
            message: message.into(),
        }
    }

    /// Creates a rejected outcome.
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Creates a dispatch-failed outcome.
    #[must_use]
    pub fn dispatch_failed(reason: impl Into<String>) -> Self {
        Self::DispatchFailed {
            reason: reason.into(),
        }
    }

    /// Returns true if the operation was accepted.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    /// Returns true if the operation was rejected by a state or capability check.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// Returns true if delivery to a collaborator failed or was not confirmed.
    #[must_use]
    pub const fn is_dispatch_failed(&self) -> bool {
        matches!(self, Self::DispatchFailed { .. })
    }

    /// Returns the user-facing text of the outcome.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Applied { message } => message,
            Self::Rejected { reason } | Self::DispatchFailed { reason } => reason,
        }
    }

    /// Returns a label suitable for metrics.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::Applied { .. } => "applied",
            Self::Rejected { .. } => "rejected",
            Self::DispatchFailed { .. } => "dispatch_failed",
        }
    }
}

impl std::fmt::Display for ControlOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.as_label(), self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates_match_variants() {
        assert!(ControlOutcome::applied("Trying to cancel the task").is_applied());
        assert!(ControlOutcome::rejected("The execution has to be paused.").is_rejected());
        assert!(ControlOutcome::dispatch_failed("bus unreachable").is_dispatch_failed());
        assert!(!ControlOutcome::applied("x").is_rejected());
    }

    #[test]
    fn message_exposes_reason_text() {
        let outcome = ControlOutcome::rejected("The execution has to be resumable.");
        assert_eq!(outcome.message(), "The execution has to be resumable.");
        assert_eq!(outcome.as_label(), "rejected");
    }

    #[test]
    fn serializes_with_outcome_tag() {
        let outcome = ControlOutcome::applied("The task resources were unlocked.");
        let json = serde_json::to_value(&outcome).expect("serialize");
        assert_eq!(json["outcome"], "applied");
        assert_eq!(json["message"], "The task resources were unlocked.");
    }
}
