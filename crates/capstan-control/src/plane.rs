//! The task control plane.
//!
//! [`ControlPlane`] is the single entry point for control operations against
//! a task. Every operation runs the same pipeline:
//!
//! 1. **Authorize**: the [`Authorizer`] must grant the operation's required
//!    permission for the task.
//! 2. **Gate**: dangerous-category operations pass the
//!    [`DangerousActionGate`]; a closed gate denies them before the Record
//!    Store is even read.
//! 3. **Load**: the task row is fetched; a missing row is
//!    [`Error::TaskNotFound`].
//! 4. **Validate**: state and capability checks. Failures here are
//!    [`ControlOutcome::Rejected`] with a user-facing reason, never errors.
//! 5. **Act**: a dispatch to the Worker Event Bus, a compare-and-set state
//!    write, or both.
//!
//! The returned [`ControlOutcome::Applied`] can mean no more than "accepted
//! for asynchronous processing"; the carried message keeps the distinction
//! visible to callers.

use std::sync::Arc;

use chrono::Utc;

use capstan_core::{StepId, TaskId};

use crate::authz::{Authorizer, PermitAllAuthorizer};
use crate::bus::{EventDelivery, StepEventKind, WorkerEventBus};
use crate::config::ControlPlaneConfig;
use crate::error::{Error, Result};
use crate::gate::DangerousActionGate;
use crate::metrics::{ControlMetrics, TimingGuard};
use crate::operation::{ControlOperation, Permission};
use crate::outcome::ControlOutcome;
use crate::store::{CasOutcome, RecordStore};
use crate::summary::TaskSummary;
use crate::task::{TaskRecord, TaskState};

/// Canonical user-facing messages carried by outcomes.
///
/// Outcome text is part of the control surface; callers display it verbatim.
pub mod messages {
    /// `cancel` was accepted for dispatch.
    pub const TRYING_TO_CANCEL: &str = "Trying to cancel the task";
    /// `abort` was accepted for dispatch.
    pub const TRYING_TO_ABORT: &str = "Trying to abort the task";
    /// `resume` submitted the plan for re-execution.
    pub const RESUMED: &str = "The execution was resumed.";
    /// `unlock` persisted the stop.
    pub const UNLOCKED: &str = "The task resources were unlocked.";
    /// `force_unlock` persisted the stop.
    pub const FORCE_UNLOCKED: &str = "The task resources were unlocked with force.";
    /// The engine declined the cancel request.
    pub const CANNOT_CANCEL: &str = "The task cannot be cancelled at the moment.";
    /// The engine declined the abort request.
    pub const CANNOT_ABORT: &str = "The task cannot be aborted at the moment.";
    /// `resume` requires the resumable flag.
    pub const HAS_TO_BE_RESUMABLE: &str = "The execution has to be resumable.";
    /// `unlock` requires the paused state.
    pub const HAS_TO_BE_PAUSED: &str = "The execution has to be paused.";
    /// The record has no live worker execution to address.
    pub const NO_WORKER_EXECUTION: &str = "The task is not bound to a worker execution.";
}

/// The task-control state machine and its collaborators.
///
/// ## Example
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use capstan_control::bus::memory::InMemoryWorkerBus;
/// use capstan_control::gate::DangerousActionGate;
/// use capstan_control::plane::ControlPlane;
/// use capstan_control::store::memory::InMemoryRecordStore;
///
/// let plane = ControlPlane::new(
///     Arc::new(InMemoryRecordStore::new()),
///     Arc::new(InMemoryWorkerBus::new()),
/// )
/// .with_gate(DangerousActionGate::open());
/// ```
pub struct ControlPlane {
    store: Arc<dyn RecordStore>,
    bus: Arc<dyn WorkerEventBus>,
    authorizer: Arc<dyn Authorizer>,
    gate: DangerousActionGate,
    config: ControlPlaneConfig,
    metrics: ControlMetrics,
}

impl ControlPlane {
    /// Creates a control plane with default policy.
    ///
    /// Defaults: a permit-all authorizer, a closed dangerous-action gate,
    /// and the default configuration.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, bus: Arc<dyn WorkerEventBus>) -> Self {
        Self {
            store,
            bus,
            authorizer: Arc::new(PermitAllAuthorizer),
            gate: DangerousActionGate::closed(),
            config: ControlPlaneConfig::default(),
            metrics: ControlMetrics::new(),
        }
    }

    /// Sets the authorizer.
    #[must_use]
    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    /// Sets the dangerous-action gate.
    #[must_use]
    pub fn with_gate(mut self, gate: DangerousActionGate) -> Self {
        self.gate = gate;
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ControlPlaneConfig) -> Self {
        self.config = config;
        self
    }

    /// Cancels a single step of the task's running execution plan.
    ///
    /// Blocks until the worker acknowledges receipt of the cancel event or
    /// the configured timeout elapses. Acknowledgement means the cancel was
    /// registered, not that the step halted.
    ///
    /// # Errors
    ///
    /// Returns an error if the caller is not authorized, the task does not
    /// exist, or the store fails.
    #[tracing::instrument(skip(self), fields(task_id = %task_id, step_id = %step_id))]
    pub async fn cancel_step(&self, task_id: &TaskId, step_id: StepId) -> Result<ControlOutcome> {
        let operation = ControlOperation::CancelStep;
        self.authorize(operation, task_id).await?;
        let record = self.load(task_id).await?;
        let Some(external_id) = record.external_id() else {
            return Ok(self.finish(operation, ControlOutcome::rejected(messages::NO_WORKER_EXECUTION)));
        };

        let delivery = {
            let _wait = TimingGuard::new(|elapsed| self.metrics.observe_ack_wait(elapsed));
            tokio::time::timeout(
                self.config.step_cancel_ack_timeout,
                self.bus
                    .send_step_event(external_id, step_id, StepEventKind::Cancel),
            )
            .await
        };

        let outcome = match delivery {
            Err(_elapsed) => ControlOutcome::dispatch_failed(format!(
                "the worker did not acknowledge the cancel of step {step_id} within {:?}",
                self.config.step_cancel_ack_timeout
            )),
            Ok(Err(err)) => ControlOutcome::dispatch_failed(err.to_string()),
            Ok(Ok(EventDelivery::Acknowledged { .. })) => {
                ControlOutcome::applied(format!("Trying to cancel step {step_id}"))
            }
            Ok(Ok(EventDelivery::UnknownTarget { detail })) => {
                ControlOutcome::dispatch_failed(detail)
            }
        };
        Ok(self.finish(operation, outcome))
    }

    /// Asks the execution engine to cancel the task.
    ///
    /// Fire-and-forget: an applied outcome means the engine accepted the
    /// request, not that the task already stopped.
    ///
    /// # Errors
    ///
    /// Returns an error if the caller is not authorized, the task does not
    /// exist, or the store fails.
    #[tracing::instrument(skip(self), fields(task_id = %task_id))]
    pub async fn cancel(&self, task_id: &TaskId) -> Result<ControlOutcome> {
        let operation = ControlOperation::Cancel;
        self.authorize(operation, task_id).await?;
        let record = self.load(task_id).await?;
        let Some(external_id) = record.external_id() else {
            return Ok(self.finish(operation, ControlOutcome::rejected(messages::NO_WORKER_EXECUTION)));
        };

        let outcome = match self.bus.request_cancel(external_id).await {
            Ok(true) => ControlOutcome::applied(messages::TRYING_TO_CANCEL),
            Ok(false) => ControlOutcome::rejected(messages::CANNOT_CANCEL),
            Err(err) => ControlOutcome::dispatch_failed(err.to_string()),
        };
        Ok(self.finish(operation, outcome))
    }

    /// Asks the execution engine to stop the task abruptly.
    ///
    /// Best-effort; may race with in-flight steps.
    ///
    /// # Errors
    ///
    /// Returns an error if the caller is not authorized, the task does not
    /// exist, or the store fails.
    #[tracing::instrument(skip(self), fields(task_id = %task_id))]
    pub async fn abort(&self, task_id: &TaskId) -> Result<ControlOutcome> {
        let operation = ControlOperation::Abort;
        self.authorize(operation, task_id).await?;
        let record = self.load(task_id).await?;
        let Some(external_id) = record.external_id() else {
            return Ok(self.finish(operation, ControlOutcome::rejected(messages::NO_WORKER_EXECUTION)));
        };

        let outcome = match self.bus.request_abort(external_id).await {
            Ok(true) => ControlOutcome::applied(messages::TRYING_TO_ABORT),
            Ok(false) => ControlOutcome::rejected(messages::CANNOT_ABORT),
            Err(err) => ControlOutcome::dispatch_failed(err.to_string()),
        };
        Ok(self.finish(operation, outcome))
    }

    /// Re-submits the task's execution plan for restart.
    ///
    /// Never writes task state; the worker subsystem reports the resulting
    /// state asynchronously through the Record Store.
    ///
    /// # Errors
    ///
    /// Returns an error if the caller is not authorized, the task does not
    /// exist, or the store fails.
    #[tracing::instrument(skip(self), fields(task_id = %task_id))]
    pub async fn resume(&self, task_id: &TaskId) -> Result<ControlOutcome> {
        let operation = ControlOperation::Resume;
        self.authorize(operation, task_id).await?;
        let record = self.load(task_id).await?;
        if !record.resumable {
            return Ok(self.finish(operation, ControlOutcome::rejected(messages::HAS_TO_BE_RESUMABLE)));
        }
        let Some(plan_id) = record.external_id() else {
            return Ok(self.finish(operation, ControlOutcome::rejected(messages::NO_WORKER_EXECUTION)));
        };

        let outcome = match self.bus.execute_plan(plan_id).await {
            Ok(()) => ControlOutcome::applied(messages::RESUMED),
            Err(err) => ControlOutcome::dispatch_failed(err.to_string()),
        };
        Ok(self.finish(operation, outcome))
    }

    /// Stops a paused task, releasing its resource locks.
    ///
    /// Dangerous: bypasses the engine's own lock handling, so the gate must
    /// be open. Only legal while the task is paused.
    ///
    /// # Errors
    ///
    /// Returns an error if the caller is not authorized, the gate is closed,
    /// the task does not exist, or the store fails.
    #[tracing::instrument(skip(self), fields(task_id = %task_id))]
    pub async fn unlock(&self, task_id: &TaskId) -> Result<ControlOutcome> {
        let operation = ControlOperation::Unlock;
        self.authorize(operation, task_id).await?;
        self.check_gate(operation)?;
        let record = self.load(task_id).await?;
        if !record.is_paused() {
            return Ok(self.finish(operation, ControlOutcome::rejected(messages::HAS_TO_BE_PAUSED)));
        }

        let outcome = match self.stop_from(task_id, TaskState::Paused).await? {
            CasOutcome::Applied => ControlOutcome::applied(messages::UNLOCKED),
            CasOutcome::NotFound => return Err(Error::TaskNotFound { task_id: *task_id }),
            CasOutcome::StateMismatch { .. } => {
                // Lost a race. One fresh read decides whether the
                // precondition still holds.
                let fresh = self.load(task_id).await?;
                if !fresh.is_paused() {
                    ControlOutcome::rejected(messages::HAS_TO_BE_PAUSED)
                } else {
                    match self.stop_from(task_id, TaskState::Paused).await? {
                        CasOutcome::Applied => ControlOutcome::applied(messages::UNLOCKED),
                        CasOutcome::NotFound => {
                            return Err(Error::TaskNotFound { task_id: *task_id });
                        }
                        CasOutcome::StateMismatch { .. } => ControlOutcome::dispatch_failed(
                            "the task state changed concurrently; the unlock was not applied",
                        ),
                    }
                }
            }
        };
        Ok(self.finish(operation, outcome))
    }

    /// Stops a task unconditionally, releasing its resource locks.
    ///
    /// Dangerous: bypasses the paused check entirely. No task state rejects
    /// it; only the gate or the authorizer can.
    ///
    /// # Errors
    ///
    /// Returns an error if the caller is not authorized, the gate is closed,
    /// the task does not exist, or the store fails.
    #[tracing::instrument(skip(self), fields(task_id = %task_id))]
    pub async fn force_unlock(&self, task_id: &TaskId) -> Result<ControlOutcome> {
        let operation = ControlOperation::ForceUnlock;
        self.authorize(operation, task_id).await?;
        self.check_gate(operation)?;
        let record = self.load(task_id).await?;

        let outcome = match self.stop_from(task_id, record.state).await? {
            CasOutcome::Applied => ControlOutcome::applied(messages::FORCE_UNLOCKED),
            CasOutcome::NotFound => return Err(Error::TaskNotFound { task_id: *task_id }),
            CasOutcome::StateMismatch { actual } => {
                // Lost a race; the forced stop holds for any state, so retry
                // against what the store actually saw.
                match self.stop_from(task_id, actual).await? {
                    CasOutcome::Applied => ControlOutcome::applied(messages::FORCE_UNLOCKED),
                    CasOutcome::NotFound => {
                        return Err(Error::TaskNotFound { task_id: *task_id });
                    }
                    CasOutcome::StateMismatch { .. } => ControlOutcome::dispatch_failed(
                        "the task state changed concurrently; the force unlock was not applied",
                    ),
                }
            }
        };
        Ok(self.finish(operation, outcome))
    }

    /// Lists the direct sub-tasks of a parent task.
    ///
    /// # Errors
    ///
    /// Returns an error if the caller is not authorized or the store fails.
    pub async fn sub_tasks(&self, parent_id: &TaskId) -> Result<Vec<TaskRecord>> {
        self.authorize_read("sub_tasks", Some(parent_id)).await?;
        self.store.sub_tasks(parent_id).await
    }

    /// Summarizes tasks with activity inside the trailing window.
    ///
    /// # Errors
    ///
    /// Returns an error if the caller is not authorized or the store fails.
    pub async fn summary(&self, window: chrono::Duration) -> Result<TaskSummary> {
        self.authorize_read("summary", None).await?;
        let since = Utc::now() - window;
        let records = self.store.recent(since).await?;
        Ok(TaskSummary::aggregate(since, &records))
    }

    /// Summarizes recent activity and serializes the result to JSON.
    ///
    /// The summary is a JSON payload in the control surface; callers that
    /// render it themselves use [`ControlPlane::summary`] instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the caller is not authorized, the store fails, or
    /// serialization fails.
    pub async fn summary_json(&self, window: chrono::Duration) -> Result<String> {
        let summary = self.summary(window).await?;
        summary.to_json().map_err(|e| Error::Serialization {
            message: format!("failed to serialize task summary: {e}"),
        })
    }

    async fn authorize(&self, operation: ControlOperation, task_id: &TaskId) -> Result<()> {
        let permission = operation.required_permission();
        if self.authorizer.allows(permission, Some(task_id)).await? {
            Ok(())
        } else {
            Err(Error::unauthorized(
                operation.as_str(),
                format!("caller lacks the {permission} permission"),
            ))
        }
    }

    async fn authorize_read(&self, name: &str, scope: Option<&TaskId>) -> Result<()> {
        if self.authorizer.allows(Permission::View, scope).await? {
            Ok(())
        } else {
            Err(Error::unauthorized(
                name,
                format!("caller lacks the {} permission", Permission::View),
            ))
        }
    }

    fn check_gate(&self, operation: ControlOperation) -> Result<()> {
        if operation.is_dangerous() && !self.gate.is_dangerous_action_allowed() {
            return Err(Error::unauthorized(
                operation.as_str(),
                "dangerous actions are disabled",
            ));
        }
        Ok(())
    }

    async fn load(&self, task_id: &TaskId) -> Result<TaskRecord> {
        self.store
            .find(task_id)
            .await?
            .ok_or(Error::TaskNotFound { task_id: *task_id })
    }

    async fn stop_from(&self, task_id: &TaskId, expected: TaskState) -> Result<CasOutcome> {
        let outcome = self
            .store
            .cas_state(task_id, expected, TaskState::Stopped)
            .await?;
        if outcome.is_applied() {
            self.metrics
                .record_state_write(TaskState::Stopped.as_label());
        }
        Ok(outcome)
    }

    fn finish(&self, operation: ControlOperation, outcome: ControlOutcome) -> ControlOutcome {
        self.metrics
            .record_operation(operation.as_str(), outcome.as_label());
        tracing::info!(
            operation = operation.as_str(),
            outcome = outcome.as_label(),
            detail = outcome.message(),
            "control operation finished"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::memory::{ExecutionScript, InMemoryWorkerBus};
    use crate::store::memory::InMemoryRecordStore;
    use crate::task::ExecutionBinding;

    fn plane_with(
        store: Arc<InMemoryRecordStore>,
        bus: Arc<InMemoryWorkerBus>,
    ) -> ControlPlane {
        ControlPlane::new(store, bus).with_gate(DangerousActionGate::open())
    }

    #[tokio::test]
    async fn unlock_of_paused_task_stops_it() -> Result<()> {
        let store = Arc::new(InMemoryRecordStore::new());
        let bus = Arc::new(InMemoryWorkerBus::new());
        let record = TaskRecord::new(TaskId::generate(), "Sync repository")
            .with_state(TaskState::Paused);
        let id = record.id;
        store.insert(record)?;

        let plane = plane_with(Arc::clone(&store), bus);
        let outcome = plane.unlock(&id).await?;
        assert_eq!(outcome, ControlOutcome::applied(messages::UNLOCKED));

        let stored = store.find(&id).await?.expect("row exists");
        assert_eq!(stored.state, TaskState::Stopped);
        Ok(())
    }

    #[tokio::test]
    async fn closed_gate_denies_before_any_store_access() -> Result<()> {
        let store = Arc::new(InMemoryRecordStore::new());
        let bus = Arc::new(InMemoryWorkerBus::new());
        let record = TaskRecord::new(TaskId::generate(), "Sync repository")
            .with_state(TaskState::Paused);
        let id = record.id;
        store.insert(record)?;

        // Default gate is closed.
        let plane = ControlPlane::new(Arc::clone(&store) as Arc<dyn RecordStore>, bus);
        let err = plane.unlock(&id).await.expect_err("gate must deny");
        assert!(err.is_unauthorized());
        assert_eq!(store.cas_attempts(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn cancel_step_against_unknown_step_is_dispatch_failure() -> Result<()> {
        let store = Arc::new(InMemoryRecordStore::new());
        let bus = Arc::new(InMemoryWorkerBus::new());
        bus.register("plan-1", ExecutionScript::new())?;

        let record = TaskRecord::new(TaskId::generate(), "Sync repository")
            .with_execution(ExecutionBinding::worker("plan-1"))
            .with_state(TaskState::Running);
        let id = record.id;
        store.insert(record)?;

        let plane = plane_with(store, bus);
        let outcome = plane.cancel_step(&id, StepId::new(9)).await?;
        assert!(outcome.is_dispatch_failed());
        Ok(())
    }

    #[tokio::test]
    async fn missing_task_is_an_error() {
        let store = Arc::new(InMemoryRecordStore::new());
        let bus = Arc::new(InMemoryWorkerBus::new());
        let plane = plane_with(store, bus);

        let err = plane
            .cancel(&TaskId::generate())
            .await
            .expect_err("must not resolve");
        assert!(matches!(err, Error::TaskNotFound { .. }));
    }
}
