//! Task records and the control-plane state machine.
//!
//! This module provides:
//! - `TaskState`: The states a task record moves through
//! - `TaskResult`: Terminal outcome classification
//! - `ExecutionBinding`: Whether a record is addressable on the worker subsystem
//! - `TaskRecord`: The durable row the control plane reads and conditionally writes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use capstan_core::{ExecutionPlanId, TaskId};

/// Task lifecycle state.
///
/// The worker subsystem owns almost every transition; it reports progress and
/// final states out-of-band through the Record Store. The control plane writes
/// `state` in exactly two places: `unlock` (paused to stopped) and
/// `force_unlock` (any state to stopped).
///
/// ```text
/// ┌─────────┐  worker starts  ┌─────────┐  engine pauses  ┌────────┐
/// │ PENDING │────────────────►│ RUNNING │────────────────►│ PAUSED │
/// └─────────┘                 └─────────┘                 └────────┘
///      │                           │                          │
///      │                           │ worker reports           │ unlock /
///      │                           ▼                          ▼ force_unlock
///      │                ┌───────────────────────┐        ┌─────────┐
///      └───────────────►│ SUCCESS ERROR CANCELLED│        │ STOPPED │
///        cancelled      └───────────────────────┘        └─────────┘
///        before start
/// ```
///
/// `PAUSED` is the system's documented resource lock: a paused task holds
/// exclusive locks on external resources until a human or policy decides how
/// to continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Accepted for execution, not yet started by a worker.
    Pending,
    /// A worker is actively executing the plan.
    Running,
    /// Execution halted mid-plan, holding resource locks.
    Paused,
    /// Execution stopped without completing; locks released.
    Stopped,
    /// Execution cancelled before completion.
    Cancelled,
    /// Execution completed successfully.
    Success,
    /// Execution completed with a failure.
    Error,
}

impl TaskState {
    /// Returns true if this is a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Stopped | Self::Cancelled | Self::Success | Self::Error
        )
    }

    /// Returns true if the task is still live on the worker subsystem.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Running | Self::Paused)
    }

    /// Returns the result a record must carry once it enters this state.
    ///
    /// `None` for active states. A forced stop classifies as [`TaskResult::Warning`]:
    /// the execution neither completed nor was cleanly cancelled.
    #[must_use]
    pub const fn implied_result(&self) -> Option<TaskResult> {
        match self {
            Self::Pending | Self::Running | Self::Paused => None,
            Self::Stopped => Some(TaskResult::Warning),
            Self::Cancelled => Some(TaskResult::Cancelled),
            Self::Success => Some(TaskResult::Success),
            Self::Error => Some(TaskResult::Error),
        }
    }

    /// Returns a lowercase label suitable for metrics and logs.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Cancelled => "cancelled",
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    /// Returns every state, in declaration order.
    ///
    /// Handy for exercising state-independent behavior such as forced stops.
    #[must_use]
    pub const fn all() -> [Self; 7] {
        [
            Self::Pending,
            Self::Running,
            Self::Paused,
            Self::Stopped,
            Self::Cancelled,
            Self::Success,
            Self::Error,
        ]
    }
}

impl Default for TaskState {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Running => write!(f, "RUNNING"),
            Self::Paused => write!(f, "PAUSED"),
            Self::Stopped => write!(f, "STOPPED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Success => write!(f, "SUCCESS"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Terminal outcome classification.
///
/// Present on a record if and only if its state is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskResult {
    /// All steps completed successfully.
    Success,
    /// Completed, but not cleanly (e.g. stopped by an operator).
    Warning,
    /// One or more steps failed.
    Error,
    /// The execution was cancelled.
    Cancelled,
}

impl TaskResult {
    /// Returns a lowercase label suitable for metrics and logs.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TaskResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Whether a record's execution is addressable on the worker subsystem.
///
/// Operations that talk to the Worker Event Bus (`cancel_step`, `cancel`,
/// `abort`, `resume`) require the `Worker` binding; a `Detached` record
/// rejects them at the boundary. `unlock` and `force_unlock` operate on the
/// record alone and accept either binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionBinding {
    /// The execution runs on the worker subsystem.
    Worker {
        /// Identifier addressing the execution within the worker engine.
        /// The same identifier addresses step events and plan re-execution.
        external_id: ExecutionPlanId,
    },
    /// No live worker execution is associated with the record.
    Detached,
}

impl ExecutionBinding {
    /// Creates a worker binding for the given external identifier.
    #[must_use]
    pub fn worker(external_id: impl Into<ExecutionPlanId>) -> Self {
        Self::Worker {
            external_id: external_id.into(),
        }
    }

    /// Returns the external identifier if the execution is worker-bound.
    #[must_use]
    pub const fn external_id(&self) -> Option<&ExecutionPlanId> {
        match self {
            Self::Worker { external_id } => Some(external_id),
            Self::Detached => None,
        }
    }

    /// Returns true if the execution is addressable on the worker subsystem.
    #[must_use]
    pub const fn is_worker_bound(&self) -> bool {
        matches!(self, Self::Worker { .. })
    }
}

/// The durable task row as the control plane sees it.
///
/// The Record Store owns the row; the control plane reads it and writes
/// `state` only through [`crate::store::RecordStore::cas_state`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    /// Primary key, stable for the task's lifetime.
    pub id: TaskId,
    /// Human-readable description of the work.
    pub action: String,
    /// Worker-subsystem addressability.
    pub execution: ExecutionBinding,
    /// Current lifecycle state.
    pub state: TaskState,
    /// Terminal outcome classification; `Some` iff `state` is terminal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
    /// Whether the last durable checkpoint allows a safe restart.
    ///
    /// Maintained by the Record Store's own bookkeeping; the control plane
    /// only reads it.
    #[serde(default)]
    pub resumable: bool,
    /// Parent task, when this record is a sub-task of a larger unit of work.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TaskId>,
    /// When a worker first picked the task up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal state; unset while active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    /// Creates a pending record with no worker binding and no timestamps.
    #[must_use]
    pub fn new(id: TaskId, action: impl Into<String>) -> Self {
        Self {
            id,
            action: action.into(),
            execution: ExecutionBinding::Detached,
            state: TaskState::default(),
            result: None,
            resumable: false,
            parent_id: None,
            started_at: None,
            ended_at: None,
        }
    }

    /// Sets the execution binding.
    #[must_use]
    pub fn with_execution(mut self, execution: ExecutionBinding) -> Self {
        self.execution = execution;
        self
    }

    /// Sets the state, installing the implied result for terminal states.
    #[must_use]
    pub fn with_state(mut self, state: TaskState) -> Self {
        self.state = state;
        self.result = state.implied_result();
        self
    }

    /// Sets the resumable flag.
    #[must_use]
    pub const fn with_resumable(mut self, resumable: bool) -> Self {
        self.resumable = resumable;
        self
    }

    /// Sets the parent task.
    #[must_use]
    pub const fn with_parent(mut self, parent_id: TaskId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Returns true iff the record is in the paused state.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state == TaskState::Paused
    }

    /// Returns the external identifier if the execution is worker-bound.
    #[must_use]
    pub const fn external_id(&self) -> Option<&ExecutionPlanId> {
        self.execution.external_id()
    }

    /// Returns the timestamp of the record's most recent activity.
    ///
    /// `ended_at` when terminal, otherwise `started_at`; `None` for records
    /// no worker has touched yet.
    #[must_use]
    pub const fn last_activity_at(&self) -> Option<DateTime<Utc>> {
        match self.ended_at {
            Some(ended) => Some(ended),
            None => self.started_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_imply_results() {
        for state in TaskState::all() {
            assert_eq!(state.is_terminal(), state.implied_result().is_some());
        }
        assert_eq!(TaskState::Stopped.implied_result(), Some(TaskResult::Warning));
        assert_eq!(
            TaskState::Cancelled.implied_result(),
            Some(TaskResult::Cancelled)
        );
    }

    #[test]
    fn active_and_terminal_partition_the_states() {
        for state in TaskState::all() {
            assert_ne!(state.is_active(), state.is_terminal());
        }
    }

    #[test]
    fn paused_predicate_tracks_state() {
        let record = TaskRecord::new(TaskId::generate(), "Sync repository");
        assert!(!record.is_paused());
        let record = record.with_state(TaskState::Paused);
        assert!(record.is_paused());
    }

    #[test]
    fn with_state_installs_implied_result() {
        let record =
            TaskRecord::new(TaskId::generate(), "Sync repository").with_state(TaskState::Error);
        assert_eq!(record.result, Some(TaskResult::Error));

        let record = record.with_state(TaskState::Running);
        assert_eq!(record.result, None);
    }

    #[test]
    fn binding_exposes_external_id() {
        let binding = ExecutionBinding::worker("plan-123");
        assert!(binding.is_worker_bound());
        assert_eq!(binding.external_id().map(ExecutionPlanId::as_str), Some("plan-123"));
        assert_eq!(ExecutionBinding::Detached.external_id(), None);
    }

    #[test]
    fn last_activity_prefers_ended_at() {
        let started = Utc::now();
        let ended = started + chrono::Duration::minutes(5);

        let mut record = TaskRecord::new(TaskId::generate(), "Sync repository");
        assert_eq!(record.last_activity_at(), None);

        record.started_at = Some(started);
        assert_eq!(record.last_activity_at(), Some(started));

        record.ended_at = Some(ended);
        assert_eq!(record.last_activity_at(), Some(ended));
    }

    #[test]
    fn record_serializes_camel_case() {
        let record = TaskRecord::new(TaskId::generate(), "Sync repository")
            .with_execution(ExecutionBinding::worker("plan-9"))
            .with_state(TaskState::Paused);
        let json = serde_json::to_value(&record).expect("serialize");

        assert_eq!(json["state"], "PAUSED");
        assert_eq!(json["execution"]["kind"], "worker");
        assert_eq!(json["execution"]["external_id"], "plan-9");
        // Active record: no result, no timestamps in the payload.
        assert!(json.get("result").is_none());
        assert!(json.get("endedAt").is_none());
    }
}
