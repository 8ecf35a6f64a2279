//! Pluggable access to the Task Record Store.
//!
//! The Record Store is an external collaborator: it owns the durable task
//! rows, their `resumable` bookkeeping, and retention. The control plane
//! consumes it through the [`RecordStore`] trait: find-by-id, a
//! compare-and-set state write, and two narrow read queries.
//!
//! ## CAS Semantics
//!
//! State writes (`unlock`, `force_unlock`) go through [`RecordStore::cas_state`],
//! the only protection against lost updates between concurrent callers. A
//! mismatch is not an error; the caller re-reads and re-validates.
//!
//! ## Thread Safety
//!
//! All methods are `Send + Sync` to support concurrent callers.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use capstan_core::TaskId;

use crate::error::Result;
use crate::task::{TaskRecord, TaskState};

/// Result of a compare-and-set state write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasOutcome {
    /// The write was applied.
    Applied,
    /// No row exists for the task id.
    NotFound,
    /// The row's state did not match the expected value.
    StateMismatch {
        /// The state actually found.
        actual: TaskState,
    },
}

impl CasOutcome {
    /// Returns true if the write was applied.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }

    /// Returns true if no row exists for the task id.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Storage abstraction over durable task rows.
///
/// Implementations must provide:
/// - Durability appropriate for the deployment (in-memory for tests, a
///   database in production)
/// - CAS semantics for state writes
/// - The result-iff-terminal invariant: a write that lands a row in a
///   terminal state installs [`TaskState::implied_result`] and stamps
///   `ended_at` if unset
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Gets a task row by id.
    ///
    /// Returns `None` if no row exists.
    async fn find(&self, task_id: &TaskId) -> Result<Option<TaskRecord>>;

    /// Atomically writes `target` if the row's current state equals `expected`.
    ///
    /// # Returns
    ///
    /// - [`CasOutcome::Applied`] if the write landed
    /// - [`CasOutcome::NotFound`] if no row exists
    /// - [`CasOutcome::StateMismatch`] if the current state differs from
    ///   `expected`
    async fn cas_state(
        &self,
        task_id: &TaskId,
        expected: TaskState,
        target: TaskState,
    ) -> Result<CasOutcome>;

    /// Lists the direct sub-tasks of a parent task.
    async fn sub_tasks(&self, parent_id: &TaskId) -> Result<Vec<TaskRecord>>;

    /// Lists rows with activity (start or end) on or after `since`.
    ///
    /// Feeds summary aggregation; rows no worker has touched yet are not
    /// included.
    async fn recent(&self, since: DateTime<Utc>) -> Result<Vec<TaskRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cas_outcome_is_applied() {
        assert!(CasOutcome::Applied.is_applied());
        assert!(!CasOutcome::NotFound.is_applied());
        assert!(!CasOutcome::StateMismatch {
            actual: TaskState::Running
        }
        .is_applied());
    }

    #[test]
    fn cas_outcome_is_not_found() {
        assert!(CasOutcome::NotFound.is_not_found());
        assert!(!CasOutcome::Applied.is_not_found());
    }
}
