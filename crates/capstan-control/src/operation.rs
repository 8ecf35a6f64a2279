//! Control operations, their categories, and required permissions.
//!
//! Operations are an enumerated type rather than free-form action names, so
//! the category (safe vs. dangerous) and the permission an operation requires
//! are total functions the compiler checks.

use serde::{Deserialize, Serialize};

/// A control operation a caller may request against a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlOperation {
    /// Cancel a single step of the running execution plan.
    CancelStep,
    /// Ask the execution engine to cancel the whole task.
    Cancel,
    /// Ask the execution engine to stop the task abruptly.
    Abort,
    /// Re-submit the execution plan of a resumable task.
    Resume,
    /// Release a paused task's resource locks by stopping it.
    Unlock,
    /// Release resource locks unconditionally, bypassing the paused check.
    ForceUnlock,
}

/// Operation category.
///
/// Safe operations are always legal to attempt; at worst they are rejected
/// with a reason. Dangerous operations can corrupt in-flight execution or
/// violate locking, and pass the dangerous-action gate first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Idempotent, always legal to attempt.
    Safe,
    /// Bypasses engine safety checks; gated.
    Dangerous,
}

/// Permission level an operation requires from the authorizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Read task records, sub-tasks, and summaries.
    View,
    /// Invoke control operations against a task.
    Edit,
}

impl ControlOperation {
    /// Returns the operation's category.
    ///
    /// `unlock` and `force_unlock` override the engine's own locking and are
    /// the only dangerous operations; everything else delegates to the engine,
    /// which enforces its own safety.
    #[must_use]
    pub const fn category(&self) -> Category {
        match self {
            Self::CancelStep | Self::Cancel | Self::Abort | Self::Resume => Category::Safe,
            Self::Unlock | Self::ForceUnlock => Category::Dangerous,
        }
    }

    /// Returns true if the operation is in the dangerous category.
    #[must_use]
    pub const fn is_dangerous(&self) -> bool {
        matches!(self.category(), Category::Dangerous)
    }

    /// Returns the permission the authorizer must grant for this operation.
    #[must_use]
    pub const fn required_permission(&self) -> Permission {
        match self {
            Self::CancelStep
            | Self::Cancel
            | Self::Abort
            | Self::Resume
            | Self::Unlock
            | Self::ForceUnlock => Permission::Edit,
        }
    }

    /// Returns a snake_case name suitable for metrics and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CancelStep => "cancel_step",
            Self::Cancel => "cancel",
            Self::Abort => "abort",
            Self::Resume => "resume",
            Self::Unlock => "unlock",
            Self::ForceUnlock => "force_unlock",
        }
    }

    /// Returns every operation, in declaration order.
    #[must_use]
    pub const fn all() -> [Self; 6] {
        [
            Self::CancelStep,
            Self::Cancel,
            Self::Abort,
            Self::Resume,
            Self::Unlock,
            Self::ForceUnlock,
        ]
    }
}

impl std::fmt::Display for ControlOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Permission {
    /// Returns a snake_case name suitable for metrics and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Edit => "edit",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
