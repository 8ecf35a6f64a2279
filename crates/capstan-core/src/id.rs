//! Strongly-typed identifiers for Capstan entities.
//!
//! Identifiers minted by Capstan are:
//! - **Strongly typed**: Prevents mixing up different ID kinds at compile time
//! - **Lexicographically sortable**: ULIDs encode creation time and sort naturally
//! - **Globally unique**: No coordination required for generation
//!
//! Identifiers issued by the worker subsystem ([`ExecutionPlanId`], [`StepId`])
//! are opaque to Capstan and wrapped without interpretation.
//!
//! # Example
//!
//! ```rust
//! use capstan_core::id::{ExecutionPlanId, TaskId};
//!
//! let task = TaskId::generate();
//! let plan = ExecutionPlanId::new("3f3a78f0-4b63-4b90-8a8e-9a3f5c2d1e77");
//!
//! // IDs are different types - this won't compile:
//! // let wrong: TaskId = plan;
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

use crate::error::{Error, Result};

/// A unique identifier for a task record.
///
/// This is the Record Store's primary key, stable for the task's lifetime
/// and distinct from any identifier the worker subsystem assigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Ulid);

impl TaskId {
    /// Generates a new unique task ID.
    ///
    /// Uses ULID generation which is:
    /// - Lexicographically sortable by creation time
    /// - Globally unique without coordination
    /// - URL-safe and case-insensitive
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    /// Creates a task ID from a raw ULID.
    #[must_use]
    pub const fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    /// Returns the underlying ULID.
    #[must_use]
    pub const fn as_ulid(&self) -> Ulid {
        self.0
    }

    /// Returns the creation timestamp encoded in the ID.
    #[must_use]
    pub fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        let ms = self.0.timestamp_ms();
        chrono::DateTime::from_timestamp_millis(ms as i64).unwrap_or_else(chrono::Utc::now)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| Error::InvalidId {
                message: format!("invalid task ID '{s}': {e}"),
            })
    }
}

/// The identifier addressing a task's execution within the worker subsystem.
///
/// The worker engine owns this identifier's format; Capstan treats it as an
/// opaque string. The same identifier addresses step events and plan
/// re-execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionPlanId(String);

impl ExecutionPlanId {
    /// Wraps an identifier issued by the worker subsystem.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutionPlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ExecutionPlanId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for ExecutionPlanId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The index of a step within an execution plan.
///
/// The worker subsystem numbers the steps of a plan; callers quote that
/// number when cancelling a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(u64);

impl StepId {
    /// Wraps a step index assigned by the worker subsystem.
    #[must_use]
    pub const fn new(index: u64) -> Self {
        Self(index)
    }

    /// Returns the raw step index.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StepId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<u64>().map(Self).map_err(|e| Error::InvalidId {
            message: format!("invalid step ID '{s}': {e}"),
        })
    }
}
